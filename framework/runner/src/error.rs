use std::path::PathBuf;

/// Failures that stop a run from producing results.
///
/// Problems inside a scenario body are never reported through this type, they are recorded in the
/// [IterationResult](cloudstorm_core::prelude::IterationResult) of the affected iteration.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("There is no benchmark scenario with name `{name}`")]
    UnknownScenario { name: String },
    #[error("This config is invalid: `{0}`")]
    InvalidConfig(String),
    /// Temporary identities, client bundles or the scenario's shared context could not be created.
    #[error("Provisioning failed: {0:#}")]
    Provisioning(#[source] anyhow::Error),
    /// The strategy could not keep dispatching, for example because no worker thread could start.
    #[error("Dispatch failed: {0:#}")]
    Dispatch(#[source] anyhow::Error),
    #[error("Could not read `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub(crate) fn unknown(name: &str) -> Self {
        Self::UnknownScenario {
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn messages_name_the_problem() {
        assert_eq!(
            "There is no benchmark scenario with name `Nope.nothing`",
            RunError::unknown("Nope.nothing").to_string()
        );
        assert_eq!(
            "This config is invalid: `times must be at least 1`",
            RunError::invalid("times must be at least 1").to_string()
        );
    }

    #[test]
    fn provisioning_shows_the_cause() {
        let err = RunError::Provisioning(
            anyhow::anyhow!("quota exceeded").context("Could not create user"),
        );

        assert_eq!(
            "Provisioning failed: Could not create user: quota exceeded",
            err.to_string()
        );
    }
}
