use std::collections::BTreeMap;
use std::error::Error;

use cloudstorm_client::prelude::CloudError;
use cloudstorm_core::prelude::{Args, CancelledError, ErrorClassifier};

use crate::context::{InitContext, InvalidArgumentsError, IterationContext};

pub type HookResult<T = ()> = anyhow::Result<T>;

/// Creates the shared context for a run. The returned value is handed unchanged to every
/// iteration.
pub type InitHook = fn(&mut InitContext, &Args) -> HookResult<serde_json::Value>;
/// Removes what [InitHook] created. Called with the value that `init` returned.
pub type CleanupHook = fn(&mut InitContext, &serde_json::Value) -> HookResult;
/// One iteration of the workload.
pub type MethodHook = fn(&mut IterationContext, &Args) -> HookResult<Option<serde_json::Value>>;
/// Checks a method's arguments before anything is provisioned for the run.
pub type ArgsValidator = fn(&Args) -> HookResult;

#[derive(Clone, Copy)]
pub(crate) struct ScenarioMethod {
    pub(crate) run: MethodHook,
    pub(crate) validate: Option<ArgsValidator>,
}

/// The builder for a scenario definition.
///
/// A scenario groups the methods that share an `init` and a `cleanup`. Each method is run as
/// `Class.method`, for example `NovaServers.boot_and_delete_server`.
pub struct ScenarioDefinitionBuilder {
    /// The class name, which must be unique within a registry.
    class_name: String,
    /// Called once per run before any iteration. Without it the context is an empty object.
    init_fn: Option<InitHook>,
    /// Called once per run during teardown, if `init` succeeded.
    cleanup_fn: Option<CleanupHook>,
    methods: BTreeMap<String, ScenarioMethod>,
    classifier: ErrorClassifier,
}

pub(crate) struct ScenarioDefinition {
    pub(crate) class_name: String,
    pub(crate) init_fn: Option<InitHook>,
    pub(crate) cleanup_fn: Option<CleanupHook>,
    pub(crate) methods: BTreeMap<String, ScenarioMethod>,
    pub(crate) classifier: ErrorClassifier,
}

/// The error types every scenario knows how to name.
fn default_classifier() -> ErrorClassifier {
    ErrorClassifier::new()
        .with::<CloudError>()
        .with::<CancelledError>()
        .with::<InvalidArgumentsError>()
        .with::<std::io::Error>()
        .with::<serde_json::Error>()
}

impl ScenarioDefinitionBuilder {
    pub fn new(class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            init_fn: None,
            cleanup_fn: None,
            methods: BTreeMap::new(),
            classifier: default_classifier(),
        }
    }

    /// Set the [ScenarioDefinitionBuilder::init_fn] for this scenario.
    pub fn use_init(mut self, init_fn: InitHook) -> Self {
        self.init_fn = Some(init_fn);
        self
    }

    /// Set the [ScenarioDefinitionBuilder::cleanup_fn] for this scenario.
    pub fn use_cleanup(mut self, cleanup_fn: CleanupHook) -> Self {
        self.cleanup_fn = Some(cleanup_fn);
        self
    }

    /// Add a method that can be run with any arguments.
    pub fn use_method(self, name: &str, method: MethodHook) -> Self {
        self.add_method(name, method, None)
    }

    /// Add a method whose arguments are checked by `validate` before the run starts. A failed
    /// check is reported as an invalid config.
    pub fn use_validated_method(
        self,
        name: &str,
        method: MethodHook,
        validate: ArgsValidator,
    ) -> Self {
        self.add_method(name, method, Some(validate))
    }

    /// Report errors of type `E` found in a failed iteration's error chain by the type's name.
    pub fn with_error_kind<E: Error + 'static>(mut self) -> Self {
        self.classifier.register::<E>();
        self
    }

    fn add_method(mut self, name: &str, run: MethodHook, validate: Option<ArgsValidator>) -> Self {
        let previous = self
            .methods
            .insert(name.to_string(), ScenarioMethod { run, validate });

        if previous.is_some() {
            panic!("Method [{}.{}] is already defined", self.class_name, name);
        }

        self
    }

    pub(crate) fn build(self) -> ScenarioDefinition {
        ScenarioDefinition {
            class_name: self.class_name,
            init_fn: self.init_fn,
            cleanup_fn: self.cleanup_fn,
            methods: self.methods,
            classifier: self.classifier,
        }
    }
}

impl ScenarioDefinition {
    pub(crate) fn init(&self, ctx: &mut InitContext, args: &Args) -> HookResult<serde_json::Value> {
        match self.init_fn {
            Some(init_fn) => init_fn(ctx, args),
            None => Ok(serde_json::Value::Object(Default::default())),
        }
    }
}
