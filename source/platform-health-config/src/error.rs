use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Everything that can go wrong between a config file and a built component
/// tree. Load-time only: probe failures are response data, never errors.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("include cycle: {chain} (duplicate content)")]
    #[diagnostic(help(
        "cycles are detected by file content, so two identically-bodied files count as one"
    ))]
    IncludeCycle { chain: String },

    #[error("{reason}")]
    Invalid { reason: String },

    #[error("unknown provider type '{kind}' for component '{name}'")]
    UnknownType { name: String, kind: String },

    #[error("unused key '{key}' in spec of component '{name}'")]
    UnusedKey { name: String, key: String },

    #[error("setup failed for component '{name}': {reason}")]
    SetupFailed { name: String, reason: String },
}

impl ConfigError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    /// In lenient mode these degrade to warnings instead of failing the load.
    pub fn is_lenient(&self) -> bool {
        matches!(
            self,
            Self::UnknownType { .. } | Self::UnusedKey { .. } | Self::SetupFailed { .. }
        )
    }

    /// Lenient handling: does the offending instance survive?
    /// Unused keys keep the instance; a type or setup problem drops it.
    pub fn keeps_instance(&self) -> bool {
        matches!(self, Self::UnusedKey { .. })
    }
}
