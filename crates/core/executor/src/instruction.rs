//! Instructions for the dialogue executor.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumDiscriminants};

/// A single instruction inside a [`crate::Node`].
///
/// Each variant carries only the operands its opcode needs. Jump destinations are indices into
/// the instruction list of the node that contains the instruction. The operand stack grows at the
/// tail; "pop" removes the tail and "peek" reads it without removing it.
///
/// The [`Opcode`] enum is derived from this type and names each variant without its operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(Opcode), derive(Hash, PartialOrd, Ord, Display, Serialize, Deserialize))]
pub enum Instruction {
    /// pc ← destination
    JumpTo {
        /// The instruction to continue at.
        destination: usize,
    },
    /// pc ← peek() (must be a number)
    PeekAndJump,
    /// Pops `substitution_count` values and delivers the line to the host.
    RunLine {
        /// The id of the line in the host's string table.
        line_id: String,
        /// The number of substitution values to pop.
        substitution_count: usize,
    },
    /// Pops `substitution_count` values, formats them into the command and delivers it.
    RunCommand {
        /// The raw command text, with `{0}`, `{1}`, ... substitution markers.
        command_text: String,
        /// The number of substitution values to pop.
        substitution_count: usize,
    },
    /// Appends an option to the pending option batch.
    AddOption {
        /// The id of the option's line.
        line_id: String,
        /// The instruction to continue at when this option is chosen.
        destination: usize,
        /// The number of substitution values to pop.
        substitution_count: usize,
        /// Whether an availability flag must be popped after the substitutions.
        has_condition: bool,
    },
    /// Presents the pending option batch to the host.
    ShowOptions,
    /// push(value)
    PushString(String),
    /// push(value)
    PushFloat(f64),
    /// push(value)
    PushBool(bool),
    /// pc ← destination if peek() is `false`
    JumpIfFalse {
        /// The instruction to continue at.
        destination: usize,
    },
    /// pop()
    Pop,
    /// Pops an argument count and that many arguments, then pushes the function's result.
    CallFunc {
        /// The name the function is registered under.
        function_name: String,
    },
    /// push(storage[name]), if present
    PushVariable {
        /// The variable to read.
        variable_name: String,
    },
    /// storage[name] ← peek()
    StoreVariable {
        /// The variable to write.
        variable_name: String,
    },
    /// Ends the dialogue.
    Stop,
    /// Unwinds the call stack and starts the named node afresh.
    RunNode {
        /// The node to run.
        node_name: String,
    },
    /// Like [`Instruction::RunNode`], with the node name taken from peek().
    PeekAndRunNode,
    /// Saves a return address and enters the named node.
    DetourToNode {
        /// The node to enter.
        node_name: String,
    },
    /// Like [`Instruction::DetourToNode`], with the node name taken from peek().
    PeekAndDetourToNode,
    /// Completes the current node and resumes the most recent detour's caller.
    Return,
    /// Pops a condition flag and records a saliency candidate.
    AddSaliencyCandidate {
        /// The content id. Must be non-empty.
        content_id: String,
        /// The complexity of the candidate's conditions.
        complexity_score: i32,
        /// The instruction to continue at when this candidate is chosen.
        destination: usize,
    },
    /// Records a saliency candidate whose conditions are declared on a node.
    AddSaliencyCandidateFromNode {
        /// The node declaring the candidate's conditions.
        node_name: String,
        /// The instruction to continue at when this candidate is chosen.
        destination: usize,
    },
    /// Asks the saliency strategy to choose among the recorded candidates.
    SelectSaliencyCandidate,
}

impl Instruction {
    /// The opcode of this instruction.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        Opcode::from(self)
    }

    /// The jump destination this instruction carries, if any.
    #[must_use]
    pub fn destination(&self) -> Option<usize> {
        match self {
            Instruction::JumpTo { destination }
            | Instruction::JumpIfFalse { destination }
            | Instruction::AddOption { destination, .. }
            | Instruction::AddSaliencyCandidate { destination, .. }
            | Instruction::AddSaliencyCandidateFromNode { destination, .. } => Some(*destination),
            _ => None,
        }
    }
}
