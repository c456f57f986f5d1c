use crate::{
    ExecutionError, FunctionEnv, Instruction, Library, Node, Program, Value, VariableStorage,
};

/// Evaluates smart variables: nodes that compute a single value from a restricted subset of
/// the instruction set, with a private stack and no effect on the main loop.
///
/// Only pushes, pops, function calls, variable reads, forward conditional jumps and `stop` are
/// allowed. Jump destinations are absolute here, and every step must move the program counter
/// forward, which rules out loops.
pub struct SmartVariableEvaluator<'a> {
    program: &'a Program,
    storage: &'a VariableStorage,
    library: &'a Library,
}

impl<'a> SmartVariableEvaluator<'a> {
    /// Create a new evaluator over a loaded program.
    #[must_use]
    pub fn new(program: &'a Program, storage: &'a VariableStorage, library: &'a Library) -> Self {
        Self { program, storage, library }
    }

    /// Evaluate the smart variable named `name`.
    ///
    /// Returns `Ok(None)` if the program has no such node.
    pub fn evaluate(&self, name: &str) -> Result<Option<Value>, ExecutionError> {
        self.evaluate_nested(name, &mut Vec::new())
    }

    fn evaluate_nested(
        &self,
        name: &str,
        active: &mut Vec<String>,
    ) -> Result<Option<Value>, ExecutionError> {
        let Some(node) = self.program.node(name) else {
            return Ok(None);
        };
        if active.iter().any(|n| n == name) {
            return Err(ExecutionError::SmartVariableCycle { node: name.to_string() });
        }

        active.push(name.to_string());
        let result = self.run(node, active);
        active.pop();
        result.map(Some)
    }

    fn run(&self, node: &Node, active: &mut Vec<String>) -> Result<Value, ExecutionError> {
        let mut stack: Vec<Value> = Vec::new();
        let mut pc = 0;

        while let Some(instruction) = node.instructions.get(pc) {
            tracing::trace!(node = %node.name, pc, ?instruction, "smart variable step");
            let next = match instruction {
                Instruction::PushString(s) => {
                    stack.push(Value::String(s.clone()));
                    pc + 1
                }
                Instruction::PushFloat(n) => {
                    stack.push(Value::Number(*n));
                    pc + 1
                }
                Instruction::PushBool(b) => {
                    stack.push(Value::Bool(*b));
                    pc + 1
                }
                Instruction::Pop => {
                    pop(node, &mut stack)?;
                    pc + 1
                }
                Instruction::CallFunc { function_name } => {
                    self.call(node, function_name, &mut stack)?;
                    pc + 1
                }
                Instruction::PushVariable { variable_name } => {
                    stack.push(self.variable(variable_name, active)?);
                    pc + 1
                }
                Instruction::JumpIfFalse { destination } => {
                    if stack.last() == Some(&Value::Bool(false)) {
                        *destination
                    } else {
                        pc + 1
                    }
                }
                Instruction::Stop => break,
                other => {
                    return Err(ExecutionError::UnsupportedInSmartVariable {
                        node: node.name.clone(),
                        opcode: other.opcode(),
                    });
                }
            };

            if next <= pc {
                return Err(ExecutionError::SmartVariableBackwardJump {
                    node: node.name.clone(),
                    from: pc,
                    to: next,
                });
            }
            pc = next;
        }

        match stack.as_slice() {
            [value] => Ok(value.clone()),
            _ => Err(ExecutionError::SmartVariableResultCount {
                node: node.name.clone(),
                count: stack.len(),
            }),
        }
    }

    fn call(
        &self,
        node: &Node,
        function_name: &str,
        stack: &mut Vec<Value>,
    ) -> Result<(), ExecutionError> {
        let count = pop(node, stack)?
            .as_index()
            .ok_or_else(|| malformed(node, "argument count is not a count"))?;
        if count > stack.len() {
            return Err(malformed(node, "not enough arguments on the stack"));
        }
        let args = stack.split_off(stack.len() - count);

        let Some(function) = self.library.get(function_name) else {
            tracing::error!("smart variable {} called unknown function {function_name}", node.name);
            return Ok(());
        };
        let env = FunctionEnv { storage: self.storage, program: self.program };
        match function.call(env, &args) {
            Ok(Some(value)) => stack.push(value),
            Ok(None) => {
                tracing::error!(
                    "{function_name} did not return a value in smart variable {}",
                    node.name
                );
            }
            Err(source) => {
                return Err(ExecutionError::SmartVariableFunction {
                    node: node.name.clone(),
                    source,
                });
            }
        }
        Ok(())
    }

    fn variable(&self, name: &str, active: &mut Vec<String>) -> Result<Value, ExecutionError> {
        if let Some(value) = self.storage.get(name).or_else(|| self.program.initial_value(name)) {
            return Ok(value.clone());
        }
        self.evaluate_nested(name, active)?
            .ok_or_else(|| ExecutionError::UndefinedVariable { name: name.to_string() })
    }
}

fn pop(node: &Node, stack: &mut Vec<Value>) -> Result<Value, ExecutionError> {
    stack.pop().ok_or_else(|| malformed(node, "popped an empty stack"))
}

fn malformed(node: &Node, reason: &str) -> ExecutionError {
    ExecutionError::MalformedSmartVariable { node: node.name.clone(), reason: reason.to_string() }
}
