//! The raw, provider-agnostic shape of a component entry.
//!
//! Six keys are reserved for the framework at the top of an instance map:
//! `type`, `name`, `checks`, `components`, `timeout`, `includes`. Everything
//! else belongs to the provider and lands in `spec`, whether it was written
//! under an explicit `spec:` map or at the top level.

use std::time::Duration;

use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;
use crate::merge::merge_mapping;

pub const FRAMEWORK_KEYS: &[&str] = &["type", "name", "checks", "components", "timeout", "includes"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    #[default]
    Aggregate,
    Each,
}

/// One expression record from a `checks:` list, still uncompiled.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCheck {
    pub check: String,
    pub message: Option<String>,
    pub mode: CheckMode,
}

#[derive(Debug, Clone, Default)]
pub struct RawInstance {
    pub kind: String,
    pub timeout: Option<Duration>,
    pub checks: Vec<RawCheck>,
    /// Declared order preserved; response order mirrors it.
    pub components: Vec<(String, Mapping)>,
    pub spec: Mapping,
}

impl RawInstance {
    pub fn from_mapping(name: &str, map: Mapping) -> Result<Self, ConfigError> {
        let mut raw = RawInstance::default();
        let mut explicit_spec = Mapping::new();

        for (key, value) in map {
            let Some(key) = key.as_str().map(str::to_owned) else {
                return Err(ConfigError::invalid(format!(
                    "component '{name}' has a non-string key"
                )));
            };

            match key.as_str() {
                "type" => {
                    raw.kind = value
                        .as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| {
                            ConfigError::invalid(format!(
                                "component '{name}': 'type' must be a string"
                            ))
                        })?;
                }
                "name" => {
                    // The authoritative name is the key in the parent map;
                    // an inline `name` is tolerated and ignored.
                }
                "timeout" => raw.timeout = Some(parse_timeout(name, &value)?),
                "checks" => raw.checks = parse_checks(name, value)?,
                "components" => raw.components = parse_components(name, value)?,
                "includes" => {
                    // Consumed by the include resolver before maps reach us.
                }
                "spec" => match value {
                    Value::Mapping(map) => explicit_spec = map,
                    other => {
                        return Err(ConfigError::invalid(format!(
                            "component '{name}': 'spec' must be a mapping, got {other:?}"
                        )))
                    }
                },
                _ => {
                    raw.spec.insert(Value::String(key), value);
                }
            }
        }

        // An explicit spec map wins over loose top-level keys.
        merge_mapping(&mut raw.spec, explicit_spec);

        if raw.kind.is_empty() {
            return Err(ConfigError::invalid(format!(
                "component '{name}' is missing a 'type'"
            )));
        }

        Ok(raw)
    }
}

fn parse_timeout(name: &str, value: &Value) -> Result<Duration, ConfigError> {
    match value {
        Value::String(text) => humantime::parse_duration(text).map_err(|e| {
            ConfigError::invalid(format!("component '{name}': bad timeout '{text}': {e}"))
        }),
        Value::Number(n) => n
            .as_u64()
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::invalid(format!(
                    "component '{name}': numeric timeout must be whole seconds"
                ))
            }),
        other => Err(ConfigError::invalid(format!(
            "component '{name}': timeout must be a duration string or seconds, got {other:?}"
        ))),
    }
}

fn parse_checks(name: &str, value: Value) -> Result<Vec<RawCheck>, ConfigError> {
    let Value::Sequence(entries) = value else {
        return Err(ConfigError::invalid(format!(
            "component '{name}': 'checks' must be a list"
        )));
    };

    entries
        .into_iter()
        .map(|entry| parse_check(name, entry))
        .collect()
}

fn parse_check(name: &str, entry: Value) -> Result<RawCheck, ConfigError> {
    let Value::Mapping(map) = entry else {
        return Err(ConfigError::invalid(format!(
            "component '{name}': each checks entry must be a mapping"
        )));
    };

    let mut check = None;
    let mut message = None;
    let mut mode = CheckMode::default();

    for (key, value) in map {
        match key.as_str() {
            // `expr` and `expression` are accepted as legacy synonyms.
            Some("check") | Some("expr") | Some("expression") => {
                check = value.as_str().map(str::to_owned);
            }
            Some("message") => message = value.as_str().map(str::to_owned),
            Some("mode") => {
                mode = match value.as_str() {
                    Some("aggregate") | None => CheckMode::Aggregate,
                    Some("each") => CheckMode::Each,
                    Some(other) => {
                        return Err(ConfigError::invalid(format!(
                            "component '{name}': check mode must be 'aggregate' or 'each', got '{other}'"
                        )))
                    }
                };
            }
            _ => {
                return Err(ConfigError::invalid(format!(
                    "component '{name}': unexpected key {key:?} in checks entry"
                )))
            }
        }
    }

    let Some(check) = check else {
        return Err(ConfigError::invalid(format!(
            "component '{name}': checks entry is missing an expression"
        )));
    };

    Ok(RawCheck {
        check,
        message,
        mode,
    })
}

fn parse_components(name: &str, value: Value) -> Result<Vec<(String, Mapping)>, ConfigError> {
    let Value::Mapping(map) = value else {
        return Err(ConfigError::invalid(format!(
            "component '{name}': 'components' must be a mapping of name to component"
        )));
    };

    map.into_iter()
        .map(|(key, value)| {
            let child_name = key.as_str().map(str::to_owned).ok_or_else(|| {
                ConfigError::invalid(format!("component '{name}' has a non-string child name"))
            })?;
            match value {
                Value::Mapping(child) => Ok((child_name, child)),
                other => Err(ConfigError::invalid(format!(
                    "component '{name}/{child_name}' must be a mapping, got {other:?}"
                ))),
            }
        })
        .collect()
}
