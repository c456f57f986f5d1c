//! Programs that can be executed by the dialogue executor.

use std::sync::Arc;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{instruction::Instruction, Value};

/// Header naming the variable that counts how often a node has completed.
pub const TRACKING_VARIABLE_HEADER: &str = "$Yarn.Internal.TrackingVariable";

/// Header marking a node as the hub of a node group.
pub const NODE_GROUP_HUB_HEADER: &str = "$Yarn.Internal.NodeGroupHub";

/// Header naming the node group a node belongs to.
pub const NODE_GROUP_HEADER: &str = "$Yarn.Internal.NodeGroup";

/// Header naming a smart variable that must hold for a node to be salient. May repeat.
pub const CONTENT_SALIENCY_CONDITION_HEADER: &str = "$Yarn.Internal.ContentSaliencyVariable";

/// Header carrying the complexity score of a node's saliency conditions.
pub const CONTENT_SALIENCY_COMPLEXITY_HEADER: &str = "$Yarn.Internal.ContentSaliencyComplexity";

/// Prefix of the per-node visit counters read by `visited` and `visited_count`.
pub const VISITING_PREFIX: &str = "$Yarn.Internal.Visiting.";

/// An error found while validating a [`Program`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgramError {
    /// A node is stored under a key that differs from its own name.
    #[error("node `{name}` is stored under the key `{key}`")]
    NameMismatch {
        /// The key in the node table.
        key: String,
        /// The node's own name.
        name: String,
    },

    /// A jump destination points past the end of its node.
    #[error("instruction {instruction} in node `{node}` jumps to {destination}, past the end")]
    DestinationOutOfRange {
        /// The node containing the instruction.
        node: String,
        /// The index of the offending instruction.
        instruction: usize,
        /// The destination it carries.
        destination: usize,
    },
}

/// A key/value header declared on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// The header key. Keys may repeat within a node.
    pub key: String,
    /// The header value.
    pub value: String,
}

/// A named, linearly addressed sequence of instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// The name of the node, unique within its program.
    pub name: String,
    /// The instructions of the node.
    pub instructions: Vec<Instruction>,
    /// The headers of the node, in declaration order.
    pub headers: Vec<Header>,
}

impl Node {
    /// Create a new [`Node`] with no headers.
    #[must_use]
    pub fn new(name: impl Into<String>, instructions: Vec<Instruction>) -> Self {
        Self { name: name.into(), instructions, headers: Vec::new() }
    }

    /// Append a header and return the node.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header { key: key.into(), value: value.into() });
        self
    }

    /// The value of the first header named `key`.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.iter().find(|h| h.key == key).map(|h| h.value.as_str())
    }

    /// The values of every header named `key`, in declaration order.
    pub fn header_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.iter().filter(move |h| h.key == key).map(|h| h.value.as_str())
    }

    /// The variable incremented each time this node completes.
    #[must_use]
    pub fn tracking_variable_name(&self) -> Option<&str> {
        self.header(TRACKING_VARIABLE_HEADER)
    }

    /// Whether this node is the hub of a node group.
    #[must_use]
    pub fn is_node_group_hub(&self) -> bool {
        self.header(NODE_GROUP_HUB_HEADER).is_some()
    }

    /// The node group this node belongs to.
    #[must_use]
    pub fn node_group_name(&self) -> Option<&str> {
        self.header(NODE_GROUP_HEADER)
    }

    /// The smart variables that must all hold for this node to be salient.
    pub fn condition_variables(&self) -> impl Iterator<Item = &str> + '_ {
        self.header_values(CONTENT_SALIENCY_CONDITION_HEADER)
    }

    /// The declared complexity of this node's saliency conditions.
    ///
    /// Absent or unparseable headers score zero.
    #[must_use]
    pub fn complexity_score(&self) -> i32 {
        self.header(CONTENT_SALIENCY_COMPLEXITY_HEADER)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// A program that can be executed by the dialogue executor.
///
/// Contains the nodes, keyed by name, along with the declared initial values of its variables.
/// A program is immutable once loaded; nodes are shared behind [`Arc`] so the executor can hold
/// the current node while reading the rest of the program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    /// The nodes of the program.
    pub nodes: HashMap<String, Arc<Node>>,
    /// The declared initial values of the program's variables.
    pub initial_values: HashMap<String, Value>,
}

impl Program {
    /// Create an empty [`Program`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, replacing any node of the same name, and return the program.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.insert_node(node);
        self
    }

    /// Declare an initial value and return the program.
    #[must_use]
    pub fn with_initial_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.initial_values.insert(name.into(), value.into());
        self
    }

    /// Add a node, replacing any node of the same name.
    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.name.clone(), Arc::new(node));
    }

    /// Look up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Arc<Node>> {
        self.nodes.get(name)
    }

    /// The declared initial value of a variable.
    #[must_use]
    pub fn initial_value(&self, name: &str) -> Option<&Value> {
        self.initial_values.get(name)
    }

    /// Check the structural invariants the executor relies on.
    ///
    /// Every node must be keyed by its own name and every jump destination must lie within its
    /// node. A destination equal to the node length is allowed and ends the node.
    pub fn validate(&self) -> Result<(), ProgramError> {
        for (key, node) in &self.nodes {
            if *key != node.name {
                return Err(ProgramError::NameMismatch {
                    key: key.clone(),
                    name: node.name.clone(),
                });
            }
            for (index, instruction) in node.instructions.iter().enumerate() {
                match instruction.destination() {
                    Some(destination) if destination > node.instructions.len() => {
                        return Err(ProgramError::DestinationOutOfRange {
                            node: node.name.clone(),
                            instruction: index,
                            destination,
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_helpers() {
        let node = Node::new("Greeting", vec![])
            .with_header(TRACKING_VARIABLE_HEADER, "$Yarn.Internal.Visiting.Greeting")
            .with_header(NODE_GROUP_HEADER, "Greetings")
            .with_header(CONTENT_SALIENCY_CONDITION_HEADER, "$cond_a")
            .with_header(CONTENT_SALIENCY_CONDITION_HEADER, "$cond_b")
            .with_header(CONTENT_SALIENCY_COMPLEXITY_HEADER, "3");

        assert_eq!(node.tracking_variable_name(), Some("$Yarn.Internal.Visiting.Greeting"));
        assert_eq!(node.node_group_name(), Some("Greetings"));
        assert!(!node.is_node_group_hub());
        assert_eq!(node.condition_variables().collect::<Vec<_>>(), ["$cond_a", "$cond_b"]);
        assert_eq!(node.complexity_score(), 3);
        assert_eq!(Node::new("Empty", vec![]).complexity_score(), 0);
    }

    #[test]
    fn hub_detection() {
        let hub = Node::new("Greetings", vec![]).with_header(NODE_GROUP_HUB_HEADER, "");
        assert!(hub.is_node_group_hub());
    }

    #[test]
    fn validate_accepts_end_destination() {
        let program = Program::new().with_node(Node::new(
            "Start",
            vec![Instruction::JumpTo { destination: 1 }],
        ));
        assert_eq!(program.validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_out_of_range_destination() {
        let program = Program::new().with_node(Node::new(
            "Start",
            vec![Instruction::Pop, Instruction::JumpIfFalse { destination: 7 }],
        ));
        assert_eq!(
            program.validate(),
            Err(ProgramError::DestinationOutOfRange {
                node: "Start".into(),
                instruction: 1,
                destination: 7
            })
        );
    }

    #[test]
    fn validate_rejects_mismatched_keys() {
        let mut program = Program::new();
        program.nodes.insert("Alias".into(), Arc::new(Node::new("Start", vec![])));
        assert!(matches!(program.validate(), Err(ProgramError::NameMismatch { .. })));
    }
}
