use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use cloudstorm_core::prelude::Args;

use crate::definition::{ScenarioDefinition, ScenarioDefinitionBuilder, ScenarioMethod};
use crate::error::RunError;

/// A `Class.method` name split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScenarioSpec {
    pub class_name: String,
    pub method_name: String,
}

impl ScenarioSpec {
    pub fn parse(name: &str) -> Result<Self, RunError> {
        match name.split_once('.') {
            Some((class_name, method_name))
                if !class_name.is_empty()
                    && !method_name.is_empty()
                    && !method_name.contains('.') =>
            {
                Ok(Self {
                    class_name: class_name.to_string(),
                    method_name: method_name.to_string(),
                })
            }
            _ => Err(RunError::unknown(name)),
        }
    }
}

impl Display for ScenarioSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)
    }
}

/// Every scenario the runner can be asked to run, keyed by class name.
///
/// Registration happens at start up. After that the registry is only read.
#[derive(Default)]
pub struct ScenarioRegistry {
    classes: BTreeMap<String, Arc<ScenarioDefinition>>,
}

/// A scenario method looked up by name, ready to be run.
#[derive(Clone)]
pub(crate) struct ResolvedScenario {
    pub(crate) spec: ScenarioSpec,
    pub(crate) definition: Arc<ScenarioDefinition>,
    pub(crate) method: ScenarioMethod,
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ScenarioDefinitionBuilder) -> &mut Self {
        let definition = definition.build();
        if self.classes.contains_key(&definition.class_name) {
            panic!("Scenario [{}] is already registered", definition.class_name);
        }

        log::trace!(
            "Registered scenario {} with methods {:?}",
            definition.class_name,
            definition.methods.keys().collect::<Vec<_>>()
        );
        self.classes
            .insert(definition.class_name.clone(), Arc::new(definition));
        self
    }

    pub(crate) fn resolve(&self, name: &str) -> Result<ResolvedScenario, RunError> {
        let spec = ScenarioSpec::parse(name)?;
        let definition = self
            .classes
            .get(&spec.class_name)
            .ok_or_else(|| RunError::unknown(name))?;
        let method = *definition
            .methods
            .get(&spec.method_name)
            .ok_or_else(|| RunError::unknown(name))?;

        Ok(ResolvedScenario {
            spec,
            definition: definition.clone(),
            method,
        })
    }

    /// Check that `name` resolves and that its method accepts `args`, without running anything.
    pub fn check(&self, name: &str, args: &Args) -> Result<(), RunError> {
        self.resolve(name)?.validate_args(args)
    }

    /// Every runnable `Class.method` name, sorted.
    pub fn list(&self) -> Vec<String> {
        self.classes
            .iter()
            .flat_map(|(class_name, definition)| {
                definition
                    .methods
                    .keys()
                    .map(move |method_name| format!("{class_name}.{method_name}"))
            })
            .collect()
    }
}

impl ResolvedScenario {
    pub(crate) fn validate_args(&self, args: &Args) -> Result<(), RunError> {
        match self.method.validate {
            Some(validate) => validate(args).map_err(|e| RunError::invalid(format!("{e:#}"))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::IterationContext;
    use crate::definition::HookResult;
    use pretty_assertions::assert_eq;

    fn noop(_ctx: &mut IterationContext, _args: &Args) -> HookResult<Option<serde_json::Value>> {
        Ok(None)
    }

    fn needs_flavor(args: &Args) -> HookResult {
        if args.contains_key("flavor_id") {
            Ok(())
        } else {
            anyhow::bail!("flavor_id is required")
        }
    }

    fn registry() -> ScenarioRegistry {
        let mut registry = ScenarioRegistry::new();
        registry
            .register(
                ScenarioDefinitionBuilder::new("Fake")
                    .use_method("do_it", noop)
                    .use_validated_method("boot", noop, needs_flavor),
            )
            .register(ScenarioDefinitionBuilder::new("Other").use_method("run", noop));
        registry
    }

    #[test]
    fn lists_sorted_dotted_names() {
        assert_eq!(
            vec!["Fake.boot", "Fake.do_it", "Other.run"],
            registry().list()
        );
    }

    #[test]
    fn resolves_known_methods() {
        let resolved = registry().resolve("Fake.do_it").unwrap();

        assert_eq!("Fake.do_it", resolved.spec.to_string());
        assert_eq!("Fake", resolved.definition.class_name);
    }

    #[test]
    fn unknown_names_are_rejected() {
        let registry = registry();

        for name in ["Fake", "Fake.", ".do_it", "Fake.nope", "Nope.do_it", "Fake.do_it.x"] {
            match registry.resolve(name) {
                Err(RunError::UnknownScenario { name: reported }) => assert_eq!(name, reported),
                _ => panic!("`{name}` should not resolve"),
            }
        }
    }

    #[test]
    fn argument_validation_is_an_invalid_config() {
        let registry = registry();

        let err = registry.check("Fake.boot", &Args::new()).unwrap_err();
        assert_eq!(
            "This config is invalid: `flavor_id is required`",
            err.to_string()
        );

        let mut args = Args::new();
        args.insert("flavor_id".to_string(), serde_json::json!("m1.tiny"));
        registry.check("Fake.boot", &args).unwrap();
    }

    #[test]
    #[should_panic(expected = "Scenario [Fake] is already registered")]
    fn duplicate_classes_panic() {
        let mut registry = registry();
        registry.register(ScenarioDefinitionBuilder::new("Fake"));
    }

    #[test]
    #[should_panic(expected = "Method [Fake.do_it] is already defined")]
    fn duplicate_methods_panic() {
        let _ = ScenarioDefinitionBuilder::new("Fake")
            .use_method("do_it", noop)
            .use_method("do_it", noop);
    }
}
