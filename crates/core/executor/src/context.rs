use core::mem::take;

use crate::{
    function::{functionify, BoxedFunction, FunctionEnv, FunctionResult, Library},
    saliency::SaliencyStrategyKind,
    Value,
};

/// Context to run a dialogue inside the executor.
#[derive(Clone, Debug, Default)]
pub struct DialogueContext {
    /// The functions callable from scripts.
    ///
    /// Note: `None` denotes the builtin library.
    pub library: Option<Library>,

    /// The saliency strategy the executor starts with.
    pub saliency_strategy: SaliencyStrategyKind,

    /// The maximum number of instructions a single `start` or `continue_dialogue` call may run.
    pub max_steps: Option<u64>,
}

/// A builder for [`DialogueContext`].
#[derive(Clone, Default)]
pub struct DialogueContextBuilder {
    no_builtins: bool,
    function_entries: Vec<(String, BoxedFunction)>,
    saliency_strategy: SaliencyStrategyKind,
    max_steps: Option<u64>,
}

impl DialogueContext {
    /// Create a new context builder. See [`DialogueContextBuilder`] for more details.
    #[must_use]
    pub fn builder() -> DialogueContextBuilder {
        DialogueContextBuilder::new()
    }

    /// The library scripts call into, resolving `None` to the builtins.
    #[must_use]
    pub fn resolved_library(&self) -> Library {
        self.library.clone().unwrap_or_default()
    }
}

impl DialogueContextBuilder {
    /// Create a new [`DialogueContextBuilder`].
    ///
    /// Prefer using [`DialogueContext::builder`].
    #[must_use]
    pub fn new() -> Self {
        DialogueContextBuilder::default()
    }

    /// Build and return the [`DialogueContext`].
    ///
    /// Clears and resets the builder, allowing it to be reused.
    pub fn build(&mut self) -> DialogueContext {
        // A nonempty list of entries, or opting out of the builtins, means the library differs
        // from the default one.
        let library = (!self.function_entries.is_empty() || self.no_builtins).then(|| {
            let mut library =
                if take(&mut self.no_builtins) { Library::empty() } else { Library::default() };

            self.function_entries
                .iter()
                .map(|(name, _)| name)
                .filter(|name| library.contains(name))
                .for_each(|name| {
                    tracing::warn!("Overriding builtin function {}", name);
                });

            // Allows overwriting builtins.
            for (name, f) in take(&mut self.function_entries) {
                library.insert(name, f);
            }
            library
        });

        DialogueContext {
            library,
            saliency_strategy: take(&mut self.saliency_strategy),
            max_steps: take(&mut self.max_steps),
        }
    }

    /// Add a host [Function](crate::Function) into the context.
    ///
    /// Registering a function under a builtin's name replaces the builtin.
    pub fn function(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(FunctionEnv<'_>, &[Value]) -> FunctionResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.function_entries.push((name.into(), functionify(f)));
        self
    }

    /// Avoid registering the builtin functions.
    ///
    /// It is not necessary to call this to override builtins. Instead, register a function
    /// with the same name by calling [`Self::function`].
    pub fn without_builtins(&mut self) -> &mut Self {
        self.no_builtins = true;
        self
    }

    /// Set the saliency strategy the executor starts with.
    pub fn saliency_strategy(&mut self, kind: SaliencyStrategyKind) -> &mut Self {
        self.saliency_strategy = kind;
        self
    }

    /// Set the maximum number of instructions a single run may execute.
    pub fn max_steps(&mut self, max_steps: u64) -> &mut Self {
        self.max_steps = Some(max_steps);
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::{saliency::SaliencyStrategyKind, DialogueContext, Value};

    #[test]
    fn defaults() {
        let DialogueContext { library, saliency_strategy, max_steps } =
            DialogueContext::builder().build();
        assert!(library.is_none());
        assert_eq!(saliency_strategy, SaliencyStrategyKind::First);
        assert!(max_steps.is_none());
    }

    #[test]
    fn without_builtins() {
        let DialogueContext { library, .. } = DialogueContext::builder().without_builtins().build();
        assert!(library.unwrap().is_empty());
    }

    #[test]
    fn with_custom_function() {
        let DialogueContext { library, .. } =
            DialogueContext::builder().function("greet", |_, _| Ok(None)).build();
        let library = library.unwrap();
        assert!(library.contains("greet"));
        assert!(library.contains("Number.Add"));
    }

    #[test]
    fn without_builtins_with_custom_function() {
        let DialogueContext { library, .. } = DialogueContext::builder()
            .without_builtins()
            .function("greet", |_, _| Ok(None))
            .build();
        assert_eq!(&library.unwrap().table.into_keys().collect::<Vec<_>>(), &["greet"]);
    }

    #[test]
    fn overrides_replace_builtins() {
        let context = DialogueContext::builder()
            .function("dice", |_, _| Ok(Some(Value::Number(4.0))))
            .build();
        let library = context.resolved_library();
        let storage = crate::VariableStorage::new();
        let program = crate::Program::new();
        let env = crate::FunctionEnv { storage: &storage, program: &program };
        assert_eq!(
            library.get("dice").unwrap().call(env, &[Value::Number(6.0)]),
            Ok(Some(Value::Number(4.0)))
        );
    }

    #[test]
    fn builder_resets_after_build() {
        let mut builder = DialogueContext::builder();
        builder.max_steps(10).saliency_strategy(SaliencyStrategyKind::Best);
        let first = builder.build();
        let second = builder.build();
        assert_eq!(first.max_steps, Some(10));
        assert_eq!(first.saliency_strategy, SaliencyStrategyKind::Best);
        assert!(second.max_steps.is_none());
        assert_eq!(second.saliency_strategy, SaliencyStrategyKind::First);
    }
}
