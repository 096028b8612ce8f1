//! File-include composition.
//!
//! Any map in a config file may carry an `includes:` list. Each entry names a
//! YAML file whose resolved content is merged *under* the local map: includes
//! merge in list order (later overrides earlier), the local map merges last
//! and wins. Cycles are detected by content hash rather than path identity,
//! so two differently-named files with identical bodies still count as a
//! revisit, while diamond-shaped include graphs stay legal because each
//! branch carries its own stack.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use sha2::{Digest, Sha256};

use crate::error::ConfigError;
use crate::merge::merge_mapping;

/// Suffixes tried, in order, when resolving an include entry.
pub const YAML_SUFFIXES: &[&str] = &["", ".yaml", ".yml"];

const INCLUDES_KEY: &str = "includes";

/// One frame of the include traversal. The stack is passed by value down the
/// call chain; it is the sole authority for cycle detection.
#[derive(Debug, Clone)]
pub struct IncludeEntry {
    pub path: PathBuf,
    pub hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct IncludeStack {
    entries: Vec<IncludeEntry>,
}

impl IncludeStack {
    pub fn root(path: &Path, hash: String) -> Self {
        Self {
            entries: vec![IncludeEntry {
                path: path.to_path_buf(),
                hash,
            }],
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.iter().any(|e| e.hash == hash)
    }

    pub fn push(&self, path: &Path, hash: String) -> Self {
        let mut next = self.clone();
        next.entries.push(IncludeEntry {
            path: path.to_path_buf(),
            hash,
        });
        next
    }

    /// `a.yaml -> b.yaml -> a.yaml`, for cycle reports.
    pub fn chain(&self, duplicate: &Path) -> String {
        self.entries
            .iter()
            .map(|e| display_name(&e.path))
            .chain(std::iter::once(display_name(duplicate)))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 16 hex chars: the first 8 bytes of the SHA-256 of the file body.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// Resolve every `includes:` list reachable from `map`, producing the fully
/// merged mapping. `base_dir` anchors relative include paths; it moves to the
/// directory of each included file while that file's own includes resolve.
pub fn resolve(map: Mapping, base_dir: &Path, stack: &IncludeStack) -> Result<Mapping, ConfigError> {
    let mut include_paths: Vec<Value> = Vec::new();
    let mut local = Mapping::new();

    for (key, value) in map {
        if key.as_str() == Some(INCLUDES_KEY) {
            match value {
                Value::Sequence(entries) => include_paths = entries,
                other => {
                    return Err(ConfigError::invalid(format!(
                        "'includes' must be a list of file paths, got {}",
                        type_name(&other)
                    )))
                }
            }
        } else {
            local.insert(key, value);
        }
    }

    let mut merged = Mapping::new();

    for entry in include_paths {
        let Some(relative) = entry.as_str() else {
            return Err(ConfigError::invalid(format!(
                "'includes' entries must be strings, got {}",
                type_name(&entry)
            )));
        };

        let path = locate(base_dir, relative)?;
        let bytes = std::fs::read(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let hash = content_hash(&bytes);
        if stack.contains(&hash) {
            return Err(ConfigError::IncludeCycle {
                chain: stack.chain(&path),
            });
        }

        tracing::debug!(path = %path.display(), hash, "resolving include");

        let value: Value =
            serde_yaml::from_slice(&bytes).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        let Value::Mapping(child) = value else {
            return Err(ConfigError::invalid(format!(
                "include {} must contain a mapping",
                path.display()
            )));
        };

        let child_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let resolved = resolve(child, child_dir, &stack.push(&path, hash))?;
        merge_mapping(&mut merged, resolved);
    }

    // Nested maps may carry their own includes. Local priority: merged last.
    let mut local_resolved = Mapping::new();
    for (key, value) in local {
        let value = match value {
            Value::Mapping(nested) => Value::Mapping(resolve(nested, base_dir, stack)?),
            other => other,
        };
        local_resolved.insert(key, value);
    }
    merge_mapping(&mut merged, local_resolved);

    Ok(merged)
}

fn locate(base_dir: &Path, relative: &str) -> Result<PathBuf, ConfigError> {
    for suffix in YAML_SUFFIXES {
        let candidate = base_dir.join(format!("{relative}{suffix}"));
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(ConfigError::Io {
        path: base_dir.join(relative),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no file for include '{relative}' (tried {YAML_SUFFIXES:?})"),
        ),
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
