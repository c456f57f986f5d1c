//! An executor for compiled branching-dialogue programs.
//!
//! A [`Program`] is a set of named [`Node`]s, each a linear list of [`Instruction`]s for a small
//! stack machine. The [`Executor`] runs them, delivering lines, commands and options to a
//! [`DialogueHandler`] and keeping variables in a [`VariableStorage`]. Scripts call into a
//! [`Library`] of functions, and line groups and node groups pick their content through a
//! [`SaliencyStrategy`].

#![warn(clippy::pedantic)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::should_panic_without_expect)]
#![allow(clippy::field_reassign_with_default)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::explicit_iter_loop)]
#![allow(clippy::struct_excessive_bools)]
#![warn(missing_docs)]

pub mod builtins;
mod context;
mod executor;
mod function;
mod handler;
mod instruction;
mod program;
#[cfg(any(test, feature = "programs"))]
pub mod programs;
mod reload;
mod report;
mod saliency;
mod smart;
mod state;
mod storage;
mod utils;
mod value;

pub use context::*;
pub use executor::*;
pub use function::*;
pub use handler::*;
pub use instruction::*;
pub use program::*;
pub use reload::*;
pub use report::*;
pub use saliency::*;
pub use smart::*;
pub use state::*;
pub use storage::*;
pub use utils::*;
pub use value::*;
