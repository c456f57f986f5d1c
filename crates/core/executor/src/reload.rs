use thiserror::Error;

use crate::{DialogueHandler, ExecutionState, Executor, Program, ProgramError};

/// Errors raised by [`Executor::hot_reload`]. The executor is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReloadError {
    /// The executor was not parked after delivering a line or command.
    #[error("can only reload while waiting for continue, state is {0}")]
    NotWaitingForContinue(ExecutionState),

    /// The executor is inside a detour.
    #[error("can only reload with an empty call stack, it has {0} frames")]
    InDetour(usize),

    /// The replacement program does not have the node being run.
    #[error("the new program has no node named `{0}`")]
    MissingNode(String),

    /// The resume point is past the end of the node.
    #[error("instruction {instruction} is out of range for node `{node}` ({len} instructions)")]
    InstructionOutOfRange {
        /// The current node.
        node: String,
        /// The requested resume point.
        instruction: usize,
        /// The number of instructions in the new node.
        len: usize,
    },

    /// The replacement program is malformed.
    #[error(transparent)]
    Program(#[from] ProgramError),
}

impl<H: DialogueHandler> Executor<H> {
    /// Swap in a recompiled program under a parked dialogue.
    ///
    /// Only legal while the executor is in [`ExecutionState::WaitingForContinue`] with an empty
    /// call stack. The current node is looked up by name in `program`, and the next
    /// [`Executor::continue_dialogue`] resumes it at `instruction`. Initial values the new program
    /// declares are seeded for variables that have no value yet; existing values are kept.
    pub fn hot_reload(&mut self, program: Program, instruction: usize) -> Result<(), ReloadError> {
        if self.execution_state != ExecutionState::WaitingForContinue {
            return Err(ReloadError::NotWaitingForContinue(self.execution_state));
        }
        if !self.state.call_stack.is_empty() {
            return Err(ReloadError::InDetour(self.state.call_stack.len()));
        }
        let name = self.state.current_node_name().unwrap_or_default().to_string();
        let node = program.node(&name).cloned().ok_or_else(|| ReloadError::MissingNode(name))?;
        if instruction >= node.instructions.len() {
            return Err(ReloadError::InstructionOutOfRange {
                node: node.name.clone(),
                instruction,
                len: node.instructions.len(),
            });
        }
        program.validate()?;

        for (name, value) in &program.initial_values {
            if !self.storage.contains(name) {
                self.storage.set(name.clone(), value.clone());
            }
        }
        tracing::debug!("reloaded program, resuming {} at {instruction}", node.name);
        self.program = program;
        self.state.current_node = Some(node);
        self.state.pc = instruction;
        Ok(())
    }
}
