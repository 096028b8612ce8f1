//! Raw component maps become live instances here.
//!
//! Strict mode turns every problem into a load failure. Lenient mode (the
//! default for a running server) degrades: an unknown type or failed setup
//! drops the instance with a warning, unused spec keys warn but keep it.
//! Either way a hot reload that fails leaves the previous tree in place.

use std::path::Path;

use platform_health_config::error::ConfigError;
use platform_health_config::loader::{ConfigDocument, DocumentSource, FileSource};
use platform_health_config::raw::RawInstance;
use serde_yaml::Mapping;

use super::registry::{ProviderArgs, ProviderRegistry};
use super::Instance;
use crate::checks::CheckSet;

/// A fully-built component tree plus everything the server needs to run it.
pub struct LoadedConfig {
    pub instances: Vec<Instance>,
    pub warnings: Vec<ConfigError>,
    pub parallelism: usize,
    pub server_id: Option<String>,
}

/// Load a config file end to end: YAML pipeline, then instance construction.
pub fn load(
    path: &Path,
    registry: &ProviderRegistry,
    strict: bool,
) -> Result<LoadedConfig, ConfigError> {
    let document = FileSource.load(path)?;
    build_document(&document, registry, strict)
}

pub fn build_document(
    document: &ConfigDocument,
    registry: &ProviderRegistry,
    strict: bool,
) -> Result<LoadedConfig, ConfigError> {
    let builder = InstanceBuilder::new(registry, strict);
    let mut warnings = Vec::new();
    let mut instances = Vec::new();

    for (name, map) in &document.components {
        if let Some(instance) = builder.build_instance(name, map.clone(), &mut warnings)? {
            instances.push(instance);
        }
    }

    Ok(LoadedConfig {
        instances,
        warnings,
        parallelism: document.parallelism.unwrap_or_else(num_cpus::get),
        server_id: document.server_id.clone(),
    })
}

pub struct InstanceBuilder<'r> {
    registry: &'r ProviderRegistry,
    strict: bool,
}

impl<'r> InstanceBuilder<'r> {
    pub fn new(registry: &'r ProviderRegistry, strict: bool) -> Self {
        Self { registry, strict }
    }

    /// Build one instance. `Ok(None)` means the instance was dropped in
    /// lenient mode; the reason is on the warnings list.
    pub fn build_instance(
        &self,
        name: &str,
        map: Mapping,
        warnings: &mut Vec<ConfigError>,
    ) -> Result<Option<Instance>, ConfigError> {
        let raw = RawInstance::from_mapping(name, map)?;

        let Some(provider_type) = self.registry.get(&raw.kind) else {
            let err = ConfigError::UnknownType {
                name: name.to_string(),
                kind: raw.kind.clone(),
            };
            return self.degrade(err, warnings);
        };

        // Keys the declared field list does not account for.
        for key in raw.spec.keys() {
            let known = key
                .as_str()
                .map(|k| provider_type.fields.iter().any(|f| f.name == k))
                .unwrap_or(false);
            if !known {
                let err = ConfigError::UnusedKey {
                    name: name.to_string(),
                    key: key.as_str().unwrap_or("<non-string>").to_string(),
                };
                if self.strict {
                    return Err(err);
                }
                tracing::warn!("config warning: {err}");
                warnings.push(err);
            }
        }

        if !raw.components.is_empty() && !provider_type.container {
            return Err(ConfigError::invalid(format!(
                "component '{name}': type '{}' does not take child components",
                raw.kind
            )));
        }

        // Children first, so a container aggregates its children's problems
        // without abandoning its own construction.
        let mut children = Vec::new();
        for (child_name, child_map) in &raw.components {
            match self.build_instance(child_name, child_map.clone(), warnings) {
                Ok(Some(child)) => children.push(child),
                Ok(None) => {}
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    warnings.push(e);
                }
            }
        }

        let checks = match CheckSet::compile(&raw.checks) {
            Ok(checks) => checks,
            Err(e) => {
                let err = ConfigError::SetupFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                };
                return self.degrade(err, warnings);
            }
        };

        let args = ProviderArgs {
            name: name.to_string(),
            spec: raw.spec,
            children,
        };
        let mut provider = match (provider_type.build)(args) {
            Ok(provider) => provider,
            Err(e) => {
                let err = ConfigError::SetupFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                };
                return self.degrade(err, warnings);
            }
        };

        if let Err(e) = provider.setup() {
            let err = ConfigError::SetupFailed {
                name: name.to_string(),
                reason: e.to_string(),
            };
            return self.degrade(err, warnings);
        }

        Ok(Some(Instance {
            name: name.to_string(),
            kind: raw.kind,
            timeout: raw.timeout,
            checks,
            provider,
        }))
    }

    fn degrade(
        &self,
        err: ConfigError,
        warnings: &mut Vec<ConfigError>,
    ) -> Result<Option<Instance>, ConfigError> {
        if self.strict {
            return Err(err);
        }
        tracing::warn!("config warning: {err}, dropping instance");
        warnings.push(err);
        Ok(None)
    }
}
