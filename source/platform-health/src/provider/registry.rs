use std::collections::HashMap;

use serde_yaml::Mapping;

use super::{FieldSpec, Instance, Provider};

/// Everything a provider constructor receives: the instance name, its spec
/// map, and (for containers) the already-built children.
pub struct ProviderArgs {
    pub name: String,
    pub spec: Mapping,
    pub children: Vec<Instance>,
}

type BuildFn = fn(ProviderArgs) -> miette::Result<Box<dyn Provider>>;

/// One registered provider kind: its declarative field list, its capability
/// flags, and its constructor.
pub struct ProviderType {
    pub kind: &'static str,
    pub help: &'static str,
    pub fields: &'static [FieldSpec],
    pub container: bool,
    pub remote: bool,
    pub build: BuildFn,
}

/// The central repository of provider kinds.
///
/// Maps kind strings (e.g. `"http"`) to constructors and field descriptors.
/// Consulted when the builder resolves an instance's `type`, and when the CLI
/// synthesizes ad-hoc probe flags. Populated once at startup, then shared
/// immutably.
#[derive(Default)]
pub struct ProviderRegistry {
    types: HashMap<&'static str, ProviderType>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in provider kinds.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(super::dns::provider_type());
        registry.register(super::http::provider_type());
        registry.register(super::mock::provider_type());
        registry.register(super::satellite::provider_type());
        registry.register(super::system::provider_type());
        registry.register(super::tcp::provider_type());
        registry
    }

    pub fn register(&mut self, provider_type: ProviderType) {
        let kind = provider_type.kind;
        if self.types.insert(kind, provider_type).is_some() {
            tracing::warn!("provider type '{}' was overwritten", kind);
        }
    }

    pub fn get(&self, kind: &str) -> Option<&ProviderType> {
        self.types.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.types.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.types.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderType> {
        self.types.values()
    }
}
