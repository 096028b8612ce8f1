//! Entry-point loading: file -> include resolution -> env overrides ->
//! ordered component maps. Provider resolution happens in the server crate;
//! this layer stops at raw mappings.

use std::path::Path;

use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;
use crate::includes::{content_hash, resolve, IncludeStack};

/// Prefix for environment overrides: `PH_COMPONENTS_WEB_TIMEOUT=10s`.
pub const ENV_PREFIX: &str = "PH_";

#[derive(Debug, Clone, Default)]
pub struct ConfigDocument {
    /// Top-level instances, in declared order.
    pub components: Vec<(String, Mapping)>,
    pub parallelism: Option<usize>,
    pub server_id: Option<String>,
}

/// Where documents come from. The file source is the real one; tests swap in
/// canned maps.
pub trait DocumentSource {
    fn load(&self, path: &Path) -> Result<ConfigDocument, ConfigError>;
}

#[derive(Debug, Clone, Default)]
pub struct FileSource;

impl DocumentSource for FileSource {
    fn load(&self, path: &Path) -> Result<ConfigDocument, ConfigError> {
        tracing::info!(path = %path.display(), "loading configuration");

        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hash = content_hash(&bytes);

        let value: Value = serde_yaml::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let Value::Mapping(map) = value else {
            return Err(ConfigError::invalid(format!(
                "{} must contain a mapping",
                path.display()
            )));
        };

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut merged = resolve(map, base_dir, &IncludeStack::root(path, hash))?;

        apply_env_overrides(&mut merged, std::env::vars());

        document_from_mapping(merged)
    }
}

pub fn document_from_mapping(map: Mapping) -> Result<ConfigDocument, ConfigError> {
    let mut document = ConfigDocument::default();
    let mut saw_components = false;

    for (key, value) in map {
        match key.as_str() {
            Some("components") => {
                saw_components = true;
                let Value::Mapping(components) = value else {
                    return Err(ConfigError::invalid(
                        "'components' must be a mapping of name to component",
                    ));
                };
                for (name, component) in components {
                    let name = name
                        .as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| ConfigError::invalid("component names must be strings"))?;
                    let Value::Mapping(component) = component else {
                        return Err(ConfigError::invalid(format!(
                            "component '{name}' must be a mapping"
                        )));
                    };
                    document.components.push((name, component));
                }
            }
            Some("parallelism") => {
                document.parallelism = value.as_u64().map(|n| n as usize);
                if document.parallelism.is_none() {
                    return Err(ConfigError::invalid("'parallelism' must be a positive integer"));
                }
            }
            Some("server-id") | Some("server_id") => {
                document.server_id = value.as_str().map(str::to_owned);
            }
            Some(other) => {
                return Err(ConfigError::invalid(format!(
                    "unexpected top-level key '{other}'"
                )))
            }
            None => return Err(ConfigError::invalid("top-level keys must be strings")),
        }
    }

    if !saw_components {
        return Err(ConfigError::invalid("missing top-level 'components'"));
    }

    Ok(document)
}

/// Fold `PH_`-prefixed environment variables into the merged map. Segments of
/// the variable name (split on `_`) are matched case-insensitively against
/// nested keys, with `-` and `_` treated as the same character; consecutive
/// segments are re-joined when a key itself contains `_` or `-`. Values parse
/// as YAML scalars.
pub fn apply_env_overrides(map: &mut Mapping, vars: impl Iterator<Item = (String, String)>) {
    for (name, value) in vars {
        let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> = rest.split('_').map(str::to_lowercase).collect();
        if segments.iter().any(String::is_empty) {
            continue;
        }
        if override_path(map, &segments, &value) {
            tracing::debug!(var = %name, "applied environment override");
        } else {
            tracing::warn!(var = %name, "environment override matched no config key");
        }
    }
}

fn override_path(map: &mut Mapping, segments: &[String], value: &str) -> bool {
    for split in 1..=segments.len() {
        let candidate = segments[..split].join("_");
        let Some(key) = find_key(map, &candidate) else {
            continue;
        };

        if split == segments.len() {
            let parsed: Value =
                serde_yaml::from_str(value).unwrap_or_else(|_| Value::String(value.to_owned()));
            map.insert(key, parsed);
            return true;
        }

        if let Some(Value::Mapping(nested)) = map.get_mut(&key) {
            if override_path(nested, &segments[split..], value) {
                return true;
            }
        }
    }
    false
}

fn find_key(map: &Mapping, normalized: &str) -> Option<Value> {
    map.keys()
        .find(|key| {
            key.as_str()
                .map(|k| k.to_lowercase().replace('-', "_") == normalized)
                .unwrap_or(false)
        })
        .cloned()
}
