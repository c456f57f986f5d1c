use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{ContentSaliencyOption, Node, OptionItem, Value};

/// The state of the dialogue state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ExecutionState {
    /// Not running. The initial and terminal state.
    #[default]
    Stopped,
    /// Dispatching instructions.
    Running,
    /// Parked after delivering a line or command, or after an option was selected.
    WaitingForContinue,
    /// Parked until the host selects an option.
    WaitingOnOptionSelection,
}

/// A saved return address on the call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    /// The node to return to.
    pub node_name: String,
    /// The index of the instruction that made the detour.
    pub instruction: usize,
}

/// Holds data describing the current state of a dialogue's execution.
#[derive(Debug, Clone, Default)]
pub struct MachineState {
    /// The node being executed.
    pub current_node: Option<Arc<Node>>,

    /// The program counter, an index into the current node's instructions.
    ///
    /// Jumps write `destination - 1` (wrapping) and rely on the dispatch loop's increment.
    pub pc: usize,

    /// The operand stack. Grows at the tail.
    pub stack: Vec<Value>,

    /// Saved return addresses, most recent last.
    pub call_stack: Vec<CallSite>,

    /// The option batch being assembled.
    pub options: Vec<OptionItem>,

    /// The saliency candidates recorded since the last selection.
    pub saliency_candidates: Vec<ContentSaliencyOption>,
}

impl MachineState {
    /// Clear the stacks, the pending option batch and saliency candidates, and forget the
    /// current node.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.call_stack.clear();
        self.options.clear();
        self.saliency_candidates.clear();
        self.current_node = None;
        self.pc = 0;
    }

    /// The name of the current node.
    #[must_use]
    pub fn current_node_name(&self) -> Option<&str> {
        self.current_node.as_deref().map(|node| node.name.as_str())
    }

    /// The top of the operand stack.
    #[must_use]
    pub fn peek(&self) -> Option<&Value> {
        self.stack.last()
    }

    /// Pop the top of the operand stack.
    pub fn pop(&mut self) -> Option<Value> {
        self.stack.pop()
    }

    /// Pop `count` values, returning them in the order they were pushed.
    ///
    /// Stops early if the stack runs out, logging the underflow.
    pub fn pop_substitutions(&mut self, count: usize, context: &str) -> Vec<Value> {
        let available = count.min(self.stack.len());
        if available < count {
            tracing::error!(
                "asked to pop {count} values for {context}, but the stack has {available}"
            );
        }
        self.stack.split_off(self.stack.len() - available)
    }
}
