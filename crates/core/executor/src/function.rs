use core::fmt::Debug;

use std::sync::Arc;

use hashbrown::HashMap;
use thiserror::Error;

use crate::{builtins::default_function_map, Program, Value, ValueKind, VariableStorage};

/// A library function, wrapped in a smart pointer.
pub type BoxedFunction = Arc<dyn Function + Send + Sync>;

/// The result of calling a library function. `Ok(None)` means the function returned no value.
pub type FunctionResult = Result<Option<Value>, FunctionError>;

/// An error raised by a library function.
///
/// These are script-level errors: the executor logs them and carries on with the next
/// instruction, leaving out whatever the call would have pushed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// A parameter had the wrong runtime type.
    #[error("expected parameter of type {expected}, got {found}")]
    TypeMismatch {
        /// The kind the function needed.
        expected: ValueKind,
        /// The kind it was given.
        found: ValueKind,
    },

    /// The function was called with the wrong number of parameters.
    #[error("expected {expected} parameters, got {found}")]
    Arity {
        /// The number of parameters the function takes.
        expected: usize,
        /// The number it was given.
        found: usize,
    },

    /// Two enum cases of different underlying kinds were compared.
    #[error("can't compare {left} and {right}, because they are of different underlying types")]
    EnumKindMismatch {
        /// The first operand.
        left: Value,
        /// The second operand.
        right: Value,
    },

    /// A function-specific failure, such as a failed assertion.
    #[error("{0}")]
    Custom(String),
}

/// A function callable from a dialogue script.
pub trait Function {
    /// Call the function with a read-only view of the executor and the call's arguments, in the
    /// order the script wrote them.
    fn call(&self, env: FunctionEnv<'_>, args: &[Value]) -> FunctionResult;
}

impl<F: Fn(FunctionEnv<'_>, &[Value]) -> FunctionResult> Function for F {
    /// Invokes the closure `self` as a function.
    fn call(&self, env: FunctionEnv<'_>, args: &[Value]) -> FunctionResult {
        self(env, args)
    }
}

/// Wrap a function in a smart pointer so it may be placed in a [`Library`].
pub fn functionify(
    f: impl Fn(FunctionEnv<'_>, &[Value]) -> FunctionResult + Send + Sync + 'static,
) -> BoxedFunction {
    Arc::new(f)
}

/// Environment that a function may read from.
#[derive(Clone, Copy)]
pub struct FunctionEnv<'a> {
    /// The variables of the running dialogue.
    pub storage: &'a VariableStorage,
    /// The loaded program.
    pub program: &'a Program,
}

/// A registry of functions to call, indexed by the names scripts use for them.
#[derive(Clone)]
pub struct Library {
    /// Table of registered functions. Prefer [`Library::get`] over reading this directly.
    pub(crate) table: HashMap<String, BoxedFunction>,
}

impl Library {
    /// Create a [`Library`] holding the builtin functions.
    #[must_use]
    pub fn new() -> Self {
        Library::default()
    }

    /// Create an empty [`Library`].
    #[must_use]
    pub fn empty() -> Self {
        Self { table: HashMap::default() }
    }

    /// Get a function, if it exists.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BoxedFunction> {
        self.table.get(name)
    }

    /// Whether a function is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    /// Register a function, replacing any function of the same name.
    pub fn insert(&mut self, name: impl Into<String>, f: BoxedFunction) {
        self.table.insert(name.into(), f);
    }

    /// The number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no functions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for Library {
    fn default() -> Self {
        Self { table: default_function_map() }
    }
}

impl Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.table.keys().collect::<Vec<_>>();
        names.sort_unstable();
        f.debug_struct("Library")
            .field(
                "table",
                &format_args!("{{{} functions registered: {:?}}}", self.table.len(), names),
            )
            .finish()
    }
}

/// Check that a call received exactly `N` arguments.
pub fn expect_args<const N: usize>(args: &[Value]) -> Result<&[Value; N], FunctionError> {
    args.try_into().map_err(|_| FunctionError::Arity { expected: N, found: args.len() })
}

/// Check that an argument is a number.
pub fn expect_number(value: &Value) -> Result<f64, FunctionError> {
    value.as_number().ok_or(FunctionError::TypeMismatch {
        expected: ValueKind::Number,
        found: value.kind(),
    })
}

/// Check that an argument is a string.
pub fn expect_string(value: &Value) -> Result<&str, FunctionError> {
    value.as_str().ok_or(FunctionError::TypeMismatch {
        expected: ValueKind::String,
        found: value.kind(),
    })
}

/// Check that an argument is a boolean.
pub fn expect_bool(value: &Value) -> Result<bool, FunctionError> {
    value.as_bool().ok_or(FunctionError::TypeMismatch {
        expected: ValueKind::Bool,
        found: value.kind(),
    })
}
