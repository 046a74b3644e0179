use std::error::Error;

use crate::result::IterationError;

/// Inspects one link of an error chain and names its kind if it recognises it.
pub type ErrorProbe = fn(&(dyn Error + 'static)) -> Option<String>;

/// An error that carries its kind explicitly.
///
/// Useful for ad-hoc failures in scenario code that should still be told apart in the results.
#[derive(derive_more::Error, derive_more::Display, Debug, Clone)]
#[display("{message}")]
pub struct TaggedError {
    kind: String,
    message: String,
}

impl TaggedError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

/// The type name without its module path or generic parameters.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

fn probe_tagged(cause: &(dyn Error + 'static)) -> Option<String> {
    cause
        .downcast_ref::<TaggedError>()
        .map(|tagged| tagged.kind.clone())
}

fn probe_type<E: Error + 'static>(cause: &(dyn Error + 'static)) -> Option<String> {
    cause
        .is::<E>()
        .then(|| short_type_name::<E>().to_string())
}

/// Turns errors raised by scenario code into [IterationError]s.
///
/// Type information is erased once an error is inside an [anyhow::Error], so the classifier only
/// knows the kinds of types that were registered with it. The outermost recognised link of the
/// chain wins. Unrecognised errors get [ErrorClassifier::UNCLASSIFIED].
#[derive(Clone)]
pub struct ErrorClassifier {
    probes: Vec<ErrorProbe>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("probes", &self.probes.len())
            .finish()
    }
}

impl ErrorClassifier {
    pub const UNCLASSIFIED: &'static str = "Error";

    pub fn new() -> Self {
        Self {
            probes: vec![probe_tagged as ErrorProbe],
        }
    }

    pub fn register<E: Error + 'static>(&mut self) {
        self.probes.push(probe_type::<E>);
    }

    pub fn with<E: Error + 'static>(mut self) -> Self {
        self.register::<E>();
        self
    }

    pub fn register_probe(&mut self, probe: ErrorProbe) {
        self.probes.push(probe);
    }

    pub fn kind_of(&self, err: &anyhow::Error) -> String {
        err.chain()
            .find_map(|cause| self.probes.iter().find_map(|probe| probe(cause)))
            .unwrap_or_else(|| Self::UNCLASSIFIED.to_string())
    }

    pub fn classify(&self, err: &anyhow::Error) -> IterationError {
        IterationError::new(self.kind_of(err), err.to_string(), format!("{err:?}"))
    }
}
