use std::{mem::take, sync::Arc};

use thiserror::Error;

use crate::{
    context::DialogueContext,
    function::{FunctionEnv, FunctionError, Library},
    handler::{DialogueHandler, Delivery, InterruptHandle, Line, OptionChoice, OptionItem},
    report::ExecutionReport,
    saliency::{BoxedSaliencyStrategy, ContentKind, ContentSaliencyOption, SaliencyStrategy},
    smart::SmartVariableEvaluator,
    state::{CallSite, ExecutionState, MachineState},
    utils::format_substitutions,
    Instruction, Node, Opcode, Program, ProgramError, Value, VariableStorage,
};

/// An executor for compiled dialogue programs.
///
/// The executor walks the instructions of the current node, delivering lines, commands and
/// options to its [`DialogueHandler`]. A handler may resolve each delivery immediately or defer
/// it, in which case the executor parks and waits for [`Executor::continue_dialogue`] or
/// [`Executor::select_option`].
pub struct Executor<H: DialogueHandler> {
    /// The loaded program.
    pub(crate) program: Program,

    /// The variables of the dialogue. Survive node changes and resets.
    pub(crate) storage: VariableStorage,

    /// The functions callable from scripts.
    pub(crate) library: Library,

    /// The maximum number of instructions a single run may execute.
    pub(crate) max_steps: Option<u64>,

    /// The stacks, program counter and pending content of the current run.
    pub(crate) state: MachineState,

    /// The state of the state machine.
    pub(crate) execution_state: ExecutionState,

    /// The policy used by `SelectSaliencyCandidate`.
    saliency_strategy: BoxedSaliencyStrategy,

    /// Receives content and events.
    handler: H,

    /// Set to stop at the next checkpoint.
    interrupt: InterruptHandle,

    /// Counts of the instructions and functions executed so far.
    pub report: ExecutionReport,
}

/// Errors that the [`Executor`] can throw.
///
/// Every variant but [`ExecutionError::Script`] is fatal: the executor stops, resets its state,
/// and returns the error without firing the dialogue-complete callback. Script errors are raised
/// by library functions; the dispatch loop logs them and moves on to the next instruction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// A node transfer named a node the program does not have.
    #[error("no node named `{0}` in the program")]
    NodeNotFound(String),

    /// An instruction that needs a current node ran without one.
    #[error("`{0}` needs a current node")]
    NoCurrentNode(Opcode),

    /// A peek-variant node transfer found no node name on the stack.
    #[error("top of stack is not a node name")]
    ExpectedNodeName,

    /// A node's tracking variable had no numeric initial value.
    #[error("tracking variable `{variable}` for node `{node}` was not declared as a number")]
    TrackingVariableNotNumeric {
        /// The node being completed.
        node: String,
        /// Its tracking variable.
        variable: String,
    },

    /// A saliency candidate was added with an empty content id.
    #[error("saliency candidate in node `{0}` has an empty content id")]
    EmptyContentId(String),

    /// A smart variable used an instruction outside its restricted subset.
    #[error("`{opcode}` is not supported in smart variable `{node}`")]
    UnsupportedInSmartVariable {
        /// The smart variable's node.
        node: String,
        /// The offending opcode.
        opcode: Opcode,
    },

    /// A smart variable's program counter failed to move forward.
    #[error("smart variable `{node}` jumped backwards from {from} to {to}")]
    SmartVariableBackwardJump {
        /// The smart variable's node.
        node: String,
        /// The program counter before the step.
        from: usize,
        /// The program counter after it.
        to: usize,
    },

    /// A smart variable finished with other than exactly one value on its stack.
    #[error("smart variable `{node}` left {count} values on its stack instead of 1")]
    SmartVariableResultCount {
        /// The smart variable's node.
        node: String,
        /// The number of values left.
        count: usize,
    },

    /// A smart variable depends on itself.
    #[error("smart variable `{node}` depends on itself")]
    SmartVariableCycle {
        /// The smart variable's node.
        node: String,
    },

    /// A smart variable's stack did not hold what an instruction needed.
    #[error("smart variable `{node}` is malformed: {reason}")]
    MalformedSmartVariable {
        /// The smart variable's node.
        node: String,
        /// What went wrong.
        reason: String,
    },

    /// A function called by a smart variable failed.
    #[error("smart variable `{node}` failed: {source}")]
    SmartVariableFunction {
        /// The smart variable's node.
        node: String,
        /// The function's error.
        #[source]
        source: FunctionError,
    },

    /// A smart variable read a variable with no stored or initial value.
    #[error("variable `{name}` has no value and no initial value")]
    UndefinedVariable {
        /// The variable.
        name: String,
    },

    /// A single run executed more instructions than the context allows.
    #[error("exceeded step limit of {0}")]
    StepLimitExceeded(u64),

    /// A library function failed. Not fatal.
    #[error(transparent)]
    Script(#[from] FunctionError),
}

impl ExecutionError {
    /// Whether this error aborts the run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExecutionError::Script(_))
    }
}

impl<H: DialogueHandler> Executor<H> {
    /// Create a new executor with the builtin library and default settings.
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self::with_context(handler, DialogueContext::default())
    }

    /// Create a new executor from a [`DialogueContext`].
    #[must_use]
    pub fn with_context(handler: H, context: DialogueContext) -> Self {
        Self {
            program: Program::default(),
            storage: VariableStorage::default(),
            library: context.resolved_library(),
            max_steps: context.max_steps,
            state: MachineState::default(),
            execution_state: ExecutionState::Stopped,
            saliency_strategy: context.saliency_strategy.build(),
            handler,
            interrupt: InterruptHandle::default(),
            report: ExecutionReport::default(),
        }
    }

    /// Load a program, replacing any previous one.
    ///
    /// The program's declared initial values are written into variable storage. The executor is
    /// stopped and left without a current node.
    pub fn load_program(&mut self, program: Program) -> Result<(), ProgramError> {
        program.validate()?;
        for (name, value) in &program.initial_values {
            self.storage.set(name.clone(), value.clone());
        }
        tracing::debug!("loaded program with {} nodes", program.nodes.len());
        self.program = program;
        self.stop();
        Ok(())
    }

    /// Make `name` the current node, starting at its first instruction.
    ///
    /// With `clear_state`, the stacks, option batch and saliency candidates are reset first.
    /// Returns `false` and changes nothing if the program has no such node.
    pub fn set_node(&mut self, name: &str, clear_state: bool) -> bool {
        let Some(node) = self.program.node(name).cloned() else {
            tracing::error!("no node named {name}");
            return false;
        };
        if clear_state {
            self.state.reset();
        }
        tracing::debug!("entering node {name}");
        self.state.current_node = Some(node);
        self.state.pc = 0;
        true
    }

    /// Run the dialogue from the current node until it completes, parks, or fails.
    ///
    /// Does nothing if there is no current node, or if the executor is waiting on an option
    /// selection.
    pub fn start(&mut self) -> Result<(), ExecutionError> {
        let Some(name) = self.state.current_node_name() else {
            tracing::error!("unable to start dialogue, have no node");
            return Ok(());
        };
        match self.execution_state {
            ExecutionState::WaitingOnOptionSelection => {
                tracing::error!("unable to start dialogue while waiting on an option selection");
                return Ok(());
            }
            ExecutionState::Stopped => self.interrupt.reset(),
            ExecutionState::WaitingForContinue if self.interrupt.is_interrupted() => {
                self.finish_interrupted();
                return Ok(());
            }
            ExecutionState::Running | ExecutionState::WaitingForContinue => {}
        }

        tracing::debug!("starting the dialogue at node {name}");
        self.execution_state = ExecutionState::Running;
        self.run()
    }

    /// Resume a dialogue parked in [`ExecutionState::WaitingForContinue`].
    pub fn continue_dialogue(&mut self) -> Result<(), ExecutionError> {
        if self.execution_state != ExecutionState::WaitingForContinue {
            tracing::error!(
                "asked to continue when not waiting for continue (state is {})",
                self.execution_state
            );
            return Ok(());
        }
        if self.interrupt.is_interrupted() {
            self.finish_interrupted();
            return Ok(());
        }

        self.execution_state = ExecutionState::Running;
        self.run()
    }

    /// Choose an option from the batch being shown.
    ///
    /// Pushes the option's destination for the script to jump to and moves to
    /// [`ExecutionState::WaitingForContinue`]. Returns `false` if no batch is being shown or the
    /// index is out of range.
    pub fn select_option(&mut self, index: usize) -> bool {
        tracing::debug!("selecting option number {index}");
        if self.execution_state != ExecutionState::WaitingOnOptionSelection {
            tracing::error!("asked to select option when options are not awaited");
            return false;
        }
        let Some(option) = self.state.options.get(index) else {
            tracing::error!(
                "asked to select option {index}, but only {} are available",
                self.state.options.len()
            );
            return false;
        };

        let destination = option.destination;
        self.state.stack.push(Value::Number(destination as f64));
        self.state.options.clear();
        self.execution_state = ExecutionState::WaitingForContinue;
        true
    }

    /// Stop the dialogue and reset the run state. Variable storage is kept.
    pub fn stop(&mut self) {
        tracing::debug!("stopping all execution");
        self.execution_state = ExecutionState::Stopped;
        self.state.reset();
    }

    /// Ask the dialogue to stop at its next checkpoint.
    ///
    /// The checkpoint follows every instruction, so content already delivered stays delivered and
    /// nothing after it is delivered. The dialogue-complete callback fires once the stop happens.
    pub fn interrupt(&self) {
        self.interrupt.interrupt();
    }

    /// A handle that can request an interrupt from elsewhere, such as inside a handler callback.
    #[must_use]
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// Evaluate the smart variable named `name`, returning `Ok(None)` if there is no such node.
    pub fn evaluate_smart_variable(&self, name: &str) -> Result<Option<Value>, ExecutionError> {
        SmartVariableEvaluator::new(&self.program, &self.storage, &self.library).evaluate(name)
    }

    /// Replace the saliency strategy. Takes effect from the next selection.
    pub fn set_saliency_strategy(
        &mut self,
        strategy: impl SaliencyStrategy + Send + Sync + 'static,
    ) {
        self.saliency_strategy = Box::new(strategy);
    }

    /// Replace the handler, returning the previous one.
    ///
    /// Must not be called while a dialogue is parked waiting for the host.
    pub fn set_handler(&mut self, handler: H) -> H {
        std::mem::replace(&mut self.handler, handler)
    }

    /// The handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// The handler, mutably.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// The loaded program.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// The variables of the dialogue.
    #[must_use]
    pub fn storage(&self) -> &VariableStorage {
        &self.storage
    }

    /// The variables of the dialogue, mutably.
    pub fn storage_mut(&mut self) -> &mut VariableStorage {
        &mut self.storage
    }

    /// The state of the state machine.
    #[must_use]
    pub fn execution_state(&self) -> ExecutionState {
        self.execution_state
    }

    /// The stacks, program counter and pending content of the current run.
    #[must_use]
    pub fn machine_state(&self) -> &MachineState {
        &self.state
    }

    /// The name of the current node.
    #[must_use]
    pub fn current_node_name(&self) -> Option<&str> {
        self.state.current_node_name()
    }

    /// The options being shown, if the executor is waiting on a selection.
    #[must_use]
    pub fn pending_options(&self) -> &[OptionItem] {
        &self.state.options
    }

    fn run(&mut self) -> Result<(), ExecutionError> {
        let mut steps = 0u64;
        while self.execution_state == ExecutionState::Running {
            let Some(node) = self.state.current_node.clone() else {
                self.finish();
                return Ok(());
            };
            let Some(instruction) = node.instructions.get(self.state.pc) else {
                self.finish();
                return Ok(());
            };

            steps += 1;
            if let Some(max_steps) = self.max_steps.filter(|max| steps > *max) {
                return Err(self.abort(ExecutionError::StepLimitExceeded(max_steps)));
            }

            let pc = self.state.pc;
            tracing::trace!(node = %node.name, pc, ?instruction, "dispatch");
            self.report.count_opcode(instruction.opcode());
            match self.execute_instruction(instruction) {
                Ok(()) => {}
                Err(ExecutionError::Script(e)) => {
                    tracing::error!("error in node {} at instruction {pc}: {e}", node.name);
                }
                Err(e) => return Err(self.abort(e)),
            }

            let same_node =
                self.state.current_node.as_ref().is_some_and(|current| Arc::ptr_eq(current, &node));
            if same_node {
                self.state.pc = self.state.pc.wrapping_add(1);
            }

            if self.interrupt.is_interrupted() && self.execution_state != ExecutionState::Stopped {
                self.finish_interrupted();
                return Ok(());
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        tracing::debug!("dialogue complete");
        self.execution_state = ExecutionState::Stopped;
        self.handler.on_dialogue_complete();
    }

    fn finish_interrupted(&mut self) {
        tracing::debug!("dialogue interrupted");
        self.stop();
        self.handler.on_dialogue_complete();
    }

    fn abort(&mut self, error: ExecutionError) -> ExecutionError {
        tracing::error!("fatal error: {error}");
        self.stop();
        error
    }

    #[allow(clippy::too_many_lines)]
    fn execute_instruction(&mut self, instruction: &Instruction) -> Result<(), ExecutionError> {
        match instruction {
            Instruction::JumpTo { destination } => {
                self.state.pc = destination.wrapping_sub(1);
            }
            Instruction::PeekAndJump => match self.state.peek().and_then(Value::as_index) {
                Some(destination) => self.state.pc = destination.wrapping_sub(1),
                None => tracing::error!("top of stack is not an instruction index"),
            },
            Instruction::RunLine { line_id, substitution_count } => {
                let substitutions = self.state.pop_substitutions(*substitution_count, "a line");
                let line = Line { id: line_id.clone(), substitutions };
                tracing::debug!("running line {line_id}");

                self.execution_state = ExecutionState::WaitingForContinue;
                if self.handler.on_line(&line) == Delivery::Continue {
                    self.execution_state = ExecutionState::Running;
                }
            }
            Instruction::RunCommand { command_text, substitution_count } => {
                let substitutions = self.state.pop_substitutions(*substitution_count, "a command");
                let command = format_substitutions(command_text, &substitutions);
                tracing::debug!("running command <<{command}>>");

                self.execution_state = ExecutionState::WaitingForContinue;
                if self.handler.on_command(&command) == Delivery::Continue {
                    self.execution_state = ExecutionState::Running;
                }
            }
            Instruction::AddOption { line_id, destination, substitution_count, has_condition } => {
                let substitutions = self.state.pop_substitutions(*substitution_count, "an option");
                let is_available = !has_condition
                    || match self.state.pop() {
                        Some(Value::Bool(available)) => available,
                        Some(_) => true,
                        None => {
                            tracing::error!("option {line_id} has a condition, stack is empty");
                            true
                        }
                    };
                tracing::debug!("adding option {line_id}: {is_available}");

                let id = self.state.options.len();
                self.state.options.push(OptionItem {
                    id,
                    line: Line { id: line_id.clone(), substitutions },
                    destination: *destination,
                    is_available,
                });
            }
            Instruction::ShowOptions => {
                if self.state.options.is_empty() {
                    tracing::error!("asked to show options but have none");
                    return Ok(());
                }
                tracing::debug!("presenting {} options", self.state.options.len());

                self.execution_state = ExecutionState::WaitingOnOptionSelection;
                if let OptionChoice::Select(index) = self.handler.on_options(&self.state.options) {
                    if self.select_option(index) {
                        self.execution_state = ExecutionState::Running;
                    }
                }
            }
            Instruction::PushString(value) => self.state.stack.push(Value::String(value.clone())),
            Instruction::PushFloat(value) => self.state.stack.push(Value::Number(*value)),
            Instruction::PushBool(value) => self.state.stack.push(Value::Bool(*value)),
            Instruction::JumpIfFalse { destination } => {
                if self.state.peek() == Some(&Value::Bool(false)) {
                    self.state.pc = destination.wrapping_sub(1);
                }
            }
            Instruction::Pop => {
                if self.state.pop().is_none() {
                    tracing::error!("asked to pop, but the stack is empty");
                }
            }
            Instruction::CallFunc { function_name } => self.call_function(function_name)?,
            Instruction::PushVariable { variable_name } => {
                if let Some(value) = self.storage.get(variable_name) {
                    self.state.stack.push(value.clone());
                } else if let Some(value) = self.evaluate_smart_variable(variable_name)? {
                    self.state.stack.push(value);
                }
            }
            Instruction::StoreVariable { variable_name } => match self.state.peek().cloned() {
                Some(value) => {
                    self.storage.set(variable_name.clone(), value.clone());
                    self.handler.on_variable_set(variable_name, &value);
                }
                None => tracing::error!("asked to store {variable_name}, but the stack is empty"),
            },
            Instruction::Stop => {
                self.state.current_node = None;
                self.finish();
            }
            Instruction::RunNode { node_name } => self.run_node(node_name)?,
            Instruction::PeekAndRunNode => {
                let node_name = self.peek_node_name()?;
                self.run_node(&node_name)?;
            }
            Instruction::DetourToNode { node_name } => self.detour_to_node(node_name)?,
            Instruction::PeekAndDetourToNode => {
                let node_name = self.peek_node_name()?;
                self.detour_to_node(&node_name)?;
            }
            Instruction::Return => self.return_from_node()?,
            Instruction::AddSaliencyCandidate { content_id, complexity_score, destination } => {
                if content_id.is_empty() {
                    let node = self.state.current_node_name().unwrap_or_default().to_string();
                    return Err(ExecutionError::EmptyContentId(node));
                }
                let passed = match self.state.pop() {
                    Some(Value::Bool(passed)) => passed,
                    other => {
                        tracing::error!(
                            "saliency candidate {content_id} expected a condition, got {other:?}"
                        );
                        false
                    }
                };
                self.state.saliency_candidates.push(ContentSaliencyOption {
                    content_id: content_id.clone(),
                    passing_condition_count: usize::from(passed),
                    failing_condition_count: usize::from(!passed),
                    complexity_score: *complexity_score,
                    content_kind: ContentKind::Line,
                    destination: *destination,
                });
            }
            Instruction::AddSaliencyCandidateFromNode { node_name, destination } => {
                self.add_node_candidate(node_name, *destination)?;
            }
            Instruction::SelectSaliencyCandidate => {
                let candidates = take(&mut self.state.saliency_candidates);
                let selected = self
                    .saliency_strategy
                    .query_best_content(&candidates, &self.storage)
                    .cloned();
                match selected {
                    Some(content) => {
                        tracing::debug!("selected salient content {}", content.content_id);
                        self.state.stack.push(Value::Number(content.destination as f64));
                        self.state.stack.push(Value::Bool(true));
                        self.saliency_strategy.content_was_selected(&content, &mut self.storage);
                    }
                    None => self.state.stack.push(Value::Bool(false)),
                }
            }
        }
        Ok(())
    }

    fn call_function(&mut self, function_name: &str) -> Result<(), ExecutionError> {
        let Some(count) = self.state.pop().as_ref().and_then(Value::as_index) else {
            tracing::error!("top of stack is not a parameter count for {function_name}");
            return Ok(());
        };
        if count > self.state.stack.len() {
            tracing::error!("stack was empty when popping parameters for {function_name}");
            self.state.stack.clear();
            return Ok(());
        }
        let args = self.state.stack.split_off(self.state.stack.len() - count);

        let Some(function) = self.library.get(function_name) else {
            tracing::error!(
                "encountered invalid function: {function_name} with parameters: {args:?}"
            );
            return Ok(());
        };
        self.report.count_function(function_name);

        let env = FunctionEnv { storage: &self.storage, program: &self.program };
        match function.call(env, &args)? {
            Some(result) => self.state.stack.push(result),
            None => tracing::error!("{function_name} did not return a valid result"),
        }
        Ok(())
    }

    fn peek_node_name(&self) -> Result<String, ExecutionError> {
        self.state
            .peek()
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(ExecutionError::ExpectedNodeName)
    }

    fn current_node(&self, opcode: Opcode) -> Result<Arc<Node>, ExecutionError> {
        self.state.current_node.clone().ok_or(ExecutionError::NoCurrentNode(opcode))
    }

    fn lookup_node(&self, name: &str) -> Result<Arc<Node>, ExecutionError> {
        self.program
            .node(name)
            .cloned()
            .ok_or_else(|| ExecutionError::NodeNotFound(name.to_string()))
    }

    /// Make `node` current at `pc`. When `node` is the node that was running, the dispatch loop
    /// will still increment the counter, so the target is pre-decremented.
    fn enter(&mut self, node: Arc<Node>, pc: usize, previous: &Arc<Node>) {
        tracing::debug!("entering node {}", node.name);
        self.state.pc = if Arc::ptr_eq(&node, previous) { pc.wrapping_sub(1) } else { pc };
        self.state.current_node = Some(node);
    }

    fn run_node(&mut self, node_name: &str) -> Result<(), ExecutionError> {
        let current = self.current_node(Opcode::RunNode)?;
        let target = self.lookup_node(node_name)?;

        self.complete_node(&current)?;
        while let Some(frame) = self.state.call_stack.pop() {
            let node = self.lookup_node(&frame.node_name)?;
            self.complete_node(&node)?;
        }

        self.state.reset();
        self.enter(target, 0, &current);
        Ok(())
    }

    fn detour_to_node(&mut self, node_name: &str) -> Result<(), ExecutionError> {
        let current = self.current_node(Opcode::DetourToNode)?;
        let target = self.lookup_node(node_name)?;

        self.state
            .call_stack
            .push(CallSite { node_name: current.name.clone(), instruction: self.state.pc });
        self.enter(target, 0, &current);
        Ok(())
    }

    fn return_from_node(&mut self) -> Result<(), ExecutionError> {
        let current = self.current_node(Opcode::Return)?;
        self.complete_node(&current)?;

        match self.state.call_stack.pop() {
            Some(site) => {
                let node = self.lookup_node(&site.node_name)?;
                self.enter(node, site.instruction + 1, &current);
            }
            None => {
                // Nowhere to return to. The loop ends the dialogue on its next check.
                self.state.current_node = None;
                self.state.stack.clear();
            }
        }
        Ok(())
    }

    /// Fire the node-complete callback and bump the node's tracking variable.
    fn complete_node(&mut self, node: &Node) -> Result<(), ExecutionError> {
        self.handler.on_node_complete(&node.name);

        let Some(variable) = node.tracking_variable_name() else {
            return Ok(());
        };
        let current = match self.storage.get(variable) {
            Some(value) => value.clone(),
            None => match self.program.initial_value(variable) {
                Some(Value::Number(initial)) => Value::Number(*initial),
                _ => {
                    return Err(ExecutionError::TrackingVariableNotNumeric {
                        node: node.name.clone(),
                        variable: variable.to_string(),
                    });
                }
            },
        };
        match current {
            Value::Number(count) => {
                self.storage.set(variable, count + 1.0);
            }
            _ => tracing::error!("failed to get the tracking variable for node {}", node.name),
        }
        Ok(())
    }

    fn add_node_candidate(
        &mut self,
        node_name: &str,
        destination: usize,
    ) -> Result<(), ExecutionError> {
        let Some(node) = self.program.node(node_name).cloned() else {
            tracing::error!("saliency candidate node {node_name} is not in the program");
            return Ok(());
        };

        let evaluator = SmartVariableEvaluator::new(&self.program, &self.storage, &self.library);
        let (mut passing, mut failing) = (0, 0);
        for condition in node.condition_variables() {
            let value = match self.storage.get(condition) {
                Some(value) => Some(value.clone()),
                None => evaluator.evaluate(condition)?,
            };
            if value == Some(Value::Bool(true)) {
                passing += 1;
            } else {
                failing += 1;
            }
        }

        self.state.saliency_candidates.push(ContentSaliencyOption {
            content_id: node.name.clone(),
            passing_condition_count: passing,
            failing_condition_count: failing,
            complexity_score: node.complexity_score(),
            content_kind: ContentKind::Node,
            destination,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        programs::tests::{
            call, detour_program, line_group_program, node_group_program, options_program,
            run_line, smart_variable_program, three_lines_program, tracking_program,
            unwind_program, Event, RecordingHandler,
        },
        saliency::SaliencyStrategyKind,
        TRACKING_VARIABLE_HEADER,
    };

    fn executor_at(program: Program, node: &str) -> Executor<RecordingHandler> {
        executor_with(program, node, RecordingHandler::new())
    }

    fn executor_with(
        program: Program,
        node: &str,
        handler: RecordingHandler,
    ) -> Executor<RecordingHandler> {
        let mut executor = Executor::new(handler);
        executor.load_program(program).unwrap();
        assert!(executor.set_node(node, true));
        executor
    }

    fn start_node(instructions: Vec<Instruction>) -> Program {
        Program::new().with_node(Node::new("Start", instructions))
    }

    #[test]
    fn push_and_pop() {
        let mut executor = executor_at(
            start_node(vec![
                Instruction::PushFloat(1.0),
                Instruction::PushString("x".into()),
                Instruction::PushBool(true),
                Instruction::Pop,
                Instruction::Pop,
                Instruction::Stop,
            ]),
            "Start",
        );
        executor.start().unwrap();
        assert_eq!(executor.machine_state().stack, vec![Value::Number(1.0)]);
        assert_eq!(executor.execution_state(), ExecutionState::Stopped);
    }

    #[test]
    fn jump_lands_on_destination() {
        let mut executor = executor_at(
            start_node(vec![
                Instruction::JumpTo { destination: 5 },
                run_line("1"),
                run_line("2"),
                run_line("3"),
                run_line("4"),
                run_line("5"),
            ]),
            "Start",
        );
        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["5"]);
    }

    #[test]
    fn jump_if_false_only_on_false() {
        let mut executor = executor_at(
            start_node(vec![
                Instruction::PushBool(true),
                Instruction::JumpIfFalse { destination: 3 },
                run_line("kept"),
                Instruction::PushBool(false),
                Instruction::JumpIfFalse { destination: 6 },
                run_line("skipped"),
                run_line("end"),
            ]),
            "Start",
        );
        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["kept", "end"]);
    }

    #[test]
    fn function_arguments_keep_push_order() {
        let mut instructions = vec![Instruction::PushFloat(10.0), Instruction::PushFloat(3.0)];
        instructions.extend(call("Number.Minus", 2));
        instructions.push(Instruction::StoreVariable { variable_name: "$r".into() });
        let mut executor = executor_at(start_node(instructions), "Start");

        executor.start().unwrap();
        assert_eq!(executor.storage().get("$r"), Some(&Value::Number(7.0)));
        assert_eq!(
            executor.handler().events,
            [Event::VariableSet("$r".into(), Value::Number(7.0)), Event::DialogueComplete]
        );
        assert_eq!(executor.report.function_counts["Number.Minus"], 1);
    }

    #[test]
    fn script_errors_do_not_stop_the_dialogue() {
        let mut instructions =
            vec![Instruction::PushString("x".into()), Instruction::PushFloat(1.0)];
        instructions.extend(call("Number.Add", 2));
        instructions.push(run_line("after"));
        let mut executor = executor_at(start_node(instructions), "Start");

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["after"]);
        assert_eq!(executor.handler().dialogue_completions(), 1);
    }

    #[test]
    fn unknown_functions_are_skipped() {
        let mut instructions = vec![Instruction::PushFloat(1.0)];
        instructions.extend(call("no_such_function", 1));
        instructions.push(run_line("after"));
        let mut executor = executor_at(start_node(instructions), "Start");

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["after"]);
    }

    #[test]
    fn detour_returns_after_the_call() {
        let mut executor = executor_at(detour_program(), "Start");
        executor.start().unwrap();

        let handler = executor.handler();
        assert_eq!(handler.line_ids(), ["before", "aside", "after"]);
        assert_eq!(handler.completed_nodes(), ["Aside"]);
        assert_eq!(handler.dialogue_completions(), 1);
    }

    #[test]
    fn run_node_unwinds_the_call_stack() {
        let mut executor = executor_at(unwind_program(), "Start");
        executor.start().unwrap();

        let handler = executor.handler();
        assert_eq!(handler.completed_nodes(), ["Inner", "Middle", "Start"]);
        assert_eq!(handler.line_ids(), ["target"]);
        assert!(executor.machine_state().call_stack.is_empty());
    }

    #[test]
    fn peek_variants_read_the_node_name() {
        let program = start_node(vec![
            Instruction::PushString("Aside".into()),
            Instruction::PeekAndDetourToNode,
            run_line("back"),
        ])
        .with_node(Node::new("Aside", vec![run_line("aside"), Instruction::Return]));
        let mut executor = executor_at(program, "Start");

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["aside", "back"]);
    }

    #[test]
    fn peek_and_run_node_jumps_to_the_named_node() {
        let program = start_node(vec![
            Instruction::PushString("Target".into()),
            Instruction::PeekAndRunNode,
            run_line("unreachable"),
        ])
        .with_node(Node::new("Target", vec![run_line("target")]));
        let mut executor = executor_at(program, "Start");

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["target"]);
        assert_eq!(executor.handler().completed_nodes(), ["Start"]);
        assert!(executor.machine_state().stack.is_empty());
    }

    #[rstest]
    #[case(Instruction::PeekAndRunNode)]
    #[case(Instruction::PeekAndDetourToNode)]
    fn peek_variants_without_a_node_name_are_fatal(#[case] instruction: Instruction) {
        let program = start_node(vec![Instruction::PushFloat(1.0), instruction, run_line("after")]);
        let mut executor = executor_at(program, "Start");

        let error = executor.start().unwrap_err();
        assert_eq!(error, ExecutionError::ExpectedNodeName);
        assert!(error.is_fatal());
        assert_eq!(executor.execution_state(), ExecutionState::Stopped);
        assert!(executor.handler().events.is_empty());
    }

    #[test]
    fn peek_and_jump_without_an_index_is_skipped() {
        let program = start_node(vec![
            Instruction::PushString("nowhere".into()),
            Instruction::PeekAndJump,
            run_line("after"),
        ]);
        let mut executor = executor_at(program, "Start");

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["after"]);
        assert_eq!(executor.handler().dialogue_completions(), 1);
    }

    #[test]
    fn jumping_to_the_running_node_restarts_it() {
        let program = start_node(vec![
            Instruction::PushVariable { variable_name: "$loops".into() },
            Instruction::JumpIfFalse { destination: 6 },
            Instruction::PushBool(false),
            Instruction::StoreVariable { variable_name: "$loops".into() },
            run_line("looping"),
            Instruction::RunNode { node_name: "Start".into() },
            run_line("done"),
        ])
        .with_initial_value("$loops", true);
        let mut executor = executor_at(program, "Start");

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["looping", "done"]);
        assert_eq!(executor.handler().completed_nodes(), ["Start"]);
    }

    #[test]
    fn tracking_variable_counts_visits() {
        let mut executor = executor_at(tracking_program(), "Counted");
        executor.start().unwrap();
        assert!(executor.set_node("Counted", true));
        executor.start().unwrap();

        assert_eq!(executor.storage().get("$visits"), Some(&Value::Number(2.0)));
        assert_eq!(executor.handler().dialogue_completions(), 2);
        assert_eq!(executor.evaluate_smart_variable("$visits"), Ok(None));
    }

    #[test]
    fn tracking_variable_without_initial_value_is_fatal() {
        let program = Program::new().with_node(
            Node::new("Counted", vec![Instruction::Return])
                .with_header(TRACKING_VARIABLE_HEADER, "$undeclared"),
        );
        let mut executor = executor_at(program, "Counted");

        assert_eq!(
            executor.start(),
            Err(ExecutionError::TrackingVariableNotNumeric {
                node: "Counted".into(),
                variable: "$undeclared".into(),
            })
        );
        assert_eq!(executor.execution_state(), ExecutionState::Stopped);
        assert_eq!(executor.handler().dialogue_completions(), 0);
    }

    #[test]
    fn missing_nodes_are_fatal() {
        let program = start_node(vec![Instruction::RunNode { node_name: "Nowhere".into() }]);
        let mut executor = executor_at(program, "Start");
        let error = executor.start().unwrap_err();

        assert_eq!(error, ExecutionError::NodeNotFound("Nowhere".into()));
        assert!(error.is_fatal());
        assert!(executor.current_node_name().is_none());
        assert!(executor.handler().events.is_empty());
    }

    #[test]
    fn interrupt_stops_after_the_current_line() {
        let mut executor = executor_at(three_lines_program(), "Start");
        let handle = executor.interrupt_handle();
        executor.handler_mut().interrupt_on = Some(("b".into(), handle));

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["a", "b"]);
        assert_eq!(executor.handler().dialogue_completions(), 1);
        assert_eq!(executor.execution_state(), ExecutionState::Stopped);
    }

    #[test]
    fn interrupt_while_parked_stops_on_continue() {
        let mut executor =
            executor_with(three_lines_program(), "Start", RecordingHandler::deferring());
        executor.start().unwrap();
        executor.interrupt();

        executor.continue_dialogue().unwrap();
        assert_eq!(executor.handler().line_ids(), ["a"]);
        assert_eq!(executor.handler().dialogue_completions(), 1);
        assert_eq!(executor.execution_state(), ExecutionState::Stopped);
    }

    #[test]
    fn interrupt_while_parked_stops_on_start() {
        let mut executor =
            executor_with(three_lines_program(), "Start", RecordingHandler::deferring());
        executor.start().unwrap();
        executor.interrupt();

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), ["a"]);
        assert_eq!(executor.handler().dialogue_completions(), 1);
        assert_eq!(executor.execution_state(), ExecutionState::Stopped);
    }

    #[test]
    fn deferred_lines_wait_for_continue() {
        let mut executor =
            executor_with(three_lines_program(), "Start", RecordingHandler::deferring());

        executor.start().unwrap();
        assert_eq!(executor.execution_state(), ExecutionState::WaitingForContinue);
        assert_eq!(executor.handler().line_ids(), ["a"]);

        executor.continue_dialogue().unwrap();
        executor.continue_dialogue().unwrap();
        assert_eq!(executor.handler().line_ids(), ["a", "b", "c"]);
        assert_eq!(executor.handler().dialogue_completions(), 0);

        executor.continue_dialogue().unwrap();
        assert_eq!(executor.handler().dialogue_completions(), 1);
        assert_eq!(executor.execution_state(), ExecutionState::Stopped);
        assert_eq!(executor.report.opcode_counts[&Opcode::RunLine], 3);
    }

    #[test]
    fn immediate_option_selection() {
        let mut executor =
            executor_with(options_program(), "Start", RecordingHandler::choosing([1]));
        executor.start().unwrap();

        let handler = executor.handler();
        assert_eq!(handler.events[0], Event::Options(vec!["line:yes".into(), "line:no".into()]));
        assert_eq!(handler.line_ids(), ["line:chose-no"]);
        assert_eq!(handler.dialogue_completions(), 1);
        assert!(executor.machine_state().stack.is_empty());
    }

    #[test]
    fn deferred_option_selection() {
        let mut executor = executor_at(options_program(), "Start");
        executor.start().unwrap();
        assert_eq!(executor.execution_state(), ExecutionState::WaitingOnOptionSelection);
        assert_eq!(executor.pending_options().len(), 2);

        // Starting again is refused while options are awaited.
        executor.start().unwrap();
        assert_eq!(executor.handler().events.len(), 1);

        assert!(!executor.select_option(2));
        assert!(executor.select_option(0));
        assert_eq!(executor.execution_state(), ExecutionState::WaitingForContinue);
        assert!(executor.pending_options().is_empty());

        executor.continue_dialogue().unwrap();
        assert_eq!(executor.handler().line_ids(), ["line:chose-yes"]);
        assert_eq!(executor.handler().dialogue_completions(), 1);
    }

    #[test]
    fn conditional_options_report_availability() {
        let program = start_node(vec![
            Instruction::PushBool(false),
            Instruction::AddOption {
                line_id: "line:locked".into(),
                destination: 3,
                substitution_count: 0,
                has_condition: true,
            },
            Instruction::ShowOptions,
        ]);
        let mut executor = executor_at(program, "Start");
        executor.start().unwrap();

        let [option] = executor.pending_options() else { panic!("expected one option") };
        assert!(!option.is_available);
        assert_eq!(option.destination, 3);
    }

    #[test]
    fn showing_no_options_is_skipped() {
        let mut executor = executor_at(start_node(vec![Instruction::ShowOptions]), "Start");
        executor.start().unwrap();
        assert_eq!(executor.handler().events, [Event::DialogueComplete]);
    }

    #[test]
    fn commands_are_substituted() {
        let program = start_node(vec![
            Instruction::PushFloat(2.5),
            Instruction::PushString("gold".into()),
            Instruction::RunCommand { command_text: "give {0} {1}".into(), substitution_count: 2 },
        ]);
        let mut executor = executor_at(program, "Start");
        executor.start().unwrap();
        assert_eq!(executor.handler().events[0], Event::Command("give 2.5 gold".into()));
    }

    #[test]
    fn command_booleans_are_capitalised() {
        let program = start_node(vec![
            Instruction::PushBool(true),
            Instruction::PushBool(false),
            Instruction::PushFloat(0.25),
            Instruction::RunCommand {
                command_text: "flags {0} {1} {2}".into(),
                substitution_count: 3,
            },
        ]);
        let mut executor = executor_at(program, "Start");
        executor.start().unwrap();
        assert_eq!(executor.handler().events[0], Event::Command("flags True False 0.3".into()));
    }

    #[test]
    fn stop_ends_the_dialogue() {
        let program = start_node(vec![run_line("a"), Instruction::Stop, run_line("b")]);
        let mut executor = executor_at(program, "Start");
        executor.start().unwrap();

        assert_eq!(executor.handler().line_ids(), ["a"]);
        assert_eq!(executor.handler().dialogue_completions(), 1);
        assert!(executor.current_node_name().is_none());
    }

    #[test]
    fn step_limit_aborts_runaway_loops() {
        let context = DialogueContext::builder().max_steps(100).build();
        let mut executor = Executor::with_context(RecordingHandler::new(), context);
        executor.load_program(start_node(vec![Instruction::JumpTo { destination: 0 }])).unwrap();
        assert!(executor.set_node("Start", true));

        assert_eq!(executor.start(), Err(ExecutionError::StepLimitExceeded(100)));
        assert_eq!(executor.execution_state(), ExecutionState::Stopped);
        assert!(executor.handler().events.is_empty());
    }

    #[test]
    fn push_variable_falls_back_to_smart_variables() {
        let program = smart_variable_program()
            .with_node(Node::new(
                "Start",
                vec![
                    Instruction::PushVariable { variable_name: "$is_rich".into() },
                    Instruction::StoreVariable { variable_name: "$was_rich".into() },
                ],
            ));
        let mut executor = executor_at(program, "Start");
        executor.storage_mut().set("$gold", 20);

        executor.start().unwrap();
        assert_eq!(executor.storage().get("$was_rich"), Some(&Value::Bool(true)));
        assert_eq!(executor.evaluate_smart_variable("$is_not_rich"), Ok(Some(Value::Bool(false))));
    }

    #[rstest]
    #[case(SaliencyStrategyKind::First, true, true, "line:a")]
    #[case(SaliencyStrategyKind::Best, true, true, "line:b")]
    #[case(SaliencyStrategyKind::Best, true, false, "line:a")]
    #[case(SaliencyStrategyKind::First, false, false, "line:none")]
    fn line_groups_select_salient_content(
        #[case] strategy: SaliencyStrategyKind,
        #[case] a_ok: bool,
        #[case] b_ok: bool,
        #[case] expected: &str,
    ) {
        let context = DialogueContext::builder().saliency_strategy(strategy).build();
        let mut executor = Executor::with_context(RecordingHandler::new(), context);
        executor.load_program(line_group_program()).unwrap();
        executor.storage_mut().set("$a_ok", a_ok);
        executor.storage_mut().set("$b_ok", b_ok);
        assert!(executor.set_node("Start", true));

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), [expected]);
    }

    #[test]
    fn least_recently_viewed_rotates() {
        let mut executor = executor_at(line_group_program(), "Start");
        executor.set_saliency_strategy(crate::BestLeastRecentlyViewedSaliencyStrategy::new(false));

        for _ in 0..3 {
            assert!(executor.set_node("Start", true));
            executor.start().unwrap();
        }
        assert_eq!(executor.handler().line_ids(), ["line:b", "line:a", "line:b"]);
    }

    #[test]
    fn empty_content_ids_are_fatal() {
        let program = start_node(vec![
            Instruction::PushBool(true),
            Instruction::AddSaliencyCandidate {
                content_id: String::new(),
                complexity_score: 0,
                destination: 0,
            },
        ]);
        let mut executor = executor_at(program, "Start");
        assert_eq!(executor.start(), Err(ExecutionError::EmptyContentId("Start".into())));
    }

    #[rstest]
    #[case(0, "line:poor")]
    #[case(50, "line:rich")]
    fn node_groups_run_the_salient_member(#[case] gold: i32, #[case] expected: &str) {
        let mut executor = executor_at(node_group_program(), "Greeting");
        executor.storage_mut().set("$gold", gold);

        executor.start().unwrap();
        assert_eq!(executor.handler().line_ids(), [expected]);
        assert_eq!(executor.handler().completed_nodes(), ["Greeting"]);
    }

    #[test]
    fn load_program_validates_and_seeds_storage() {
        let mut executor = Executor::new(RecordingHandler::new());
        let bad = start_node(vec![Instruction::JumpTo { destination: 9 }]);
        assert!(matches!(
            executor.load_program(bad),
            Err(ProgramError::DestinationOutOfRange { destination: 9, .. })
        ));

        executor.load_program(tracking_program()).unwrap();
        assert_eq!(executor.storage().get("$visits"), Some(&Value::Number(0.0)));
        assert!(!executor.set_node("Nowhere", true));
        assert!(executor.current_node_name().is_none());
    }

    #[test]
    fn start_without_a_node_does_nothing() {
        let mut executor = Executor::new(RecordingHandler::new());
        executor.start().unwrap();
        assert!(executor.handler().events.is_empty());
    }
}
