//! YAML configuration pipeline for Platform Health.
//!
//! This crate owns everything between a file on disk and the raw component
//! maps handed to the provider builder: include resolution with content-hash
//! cycle detection, deep merging, framework/spec key partitioning, and
//! environment-variable overrides. It knows nothing about providers; the
//! server crate resolves `type` fields against its registry.

pub mod error;
pub mod includes;
pub mod loader;
pub mod merge;
pub mod raw;

pub use error::ConfigError;
pub use loader::{ConfigDocument, DocumentSource, FileSource};

#[macro_export]
macro_rules! assert_err_contains {
    ($msg:expr, $needle:expr) => {
        assert!(
            $msg.contains($needle),
            "error `{}` does not contain `{}`",
            $msg,
            $needle
        )
    };
}
