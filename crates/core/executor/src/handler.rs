use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};

use crate::{utils::format_substitutions, Value};

/// A line delivered to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// The id of the line in the host's string table.
    pub id: String,
    /// The values to substitute into the line's text, in marker order.
    pub substitutions: Vec<Value>,
}

impl Line {
    /// Render `template` (the text of this line) with its `{n}` markers substituted.
    #[must_use]
    pub fn substitute(&self, template: &str) -> String {
        format_substitutions(template, &self.substitutions)
    }
}

/// An option in a batch presented to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    /// The position of this option within its batch.
    pub id: usize,
    /// The option's line.
    pub line: Line,
    /// The instruction to continue at when this option is chosen.
    pub destination: usize,
    /// Whether the option's condition passed.
    pub is_available: bool,
}

/// How the host resolved a line or command delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The content was consumed; keep running.
    Continue,
    /// The host will call [`crate::Executor::continue_dialogue`] later.
    Defer,
}

/// How the host resolved an option batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionChoice {
    /// The option at this index was chosen.
    Select(usize),
    /// The host will call [`crate::Executor::select_option`] later.
    Defer,
}

/// Receives the content and events produced by a running dialogue.
///
/// Line, command, and option callbacks are the executor's only suspension points: returning a
/// deferred resolution parks the executor until the host resumes it. The remaining callbacks are
/// notifications and never suspend.
///
/// A handler must not be replaced while a dialogue is running or parked.
pub trait DialogueHandler {
    /// A line is ready to be shown.
    fn on_line(&mut self, line: &Line) -> Delivery;

    /// A batch of options is ready to be chosen from.
    fn on_options(&mut self, options: &[OptionItem]) -> OptionChoice;

    /// A command is ready to be dispatched.
    fn on_command(&mut self, _command: &str) -> Delivery {
        Delivery::Continue
    }

    /// The dialogue ran to completion or was interrupted.
    fn on_dialogue_complete(&mut self) {}

    /// A node was exited by a return, an unwind, or a jump.
    fn on_node_complete(&mut self, _node_name: &str) {}

    /// A script stored a variable.
    fn on_variable_set(&mut self, _name: &str, _value: &Value) {}
}

/// A cloneable flag that asks an [`crate::Executor`] to stop at its next checkpoint.
///
/// Handlers typically hold one so they can interrupt the dialogue from inside a callback.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    /// Request an interrupt.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether an interrupt has been requested.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
