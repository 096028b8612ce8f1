//! Provider types and the capability surface the engine programs against.
//!
//! A provider type is a registered kind of check. Capabilities beyond plain
//! probing are optional trait methods the engine queries per instance:
//! containers expose children, remotes federate to another server. CEL checks
//! are framework-owned and live on the [`Instance`], not the provider.

pub mod builder;
pub mod dns;
pub mod http;
pub mod mock;
pub mod registry;
pub mod satellite;
pub mod system;
pub mod tcp;

use std::time::Duration;

use async_trait::async_trait;

use crate::checks::CheckSet;
use crate::engine::context::CheckContext;
use crate::pb::v1::{HealthCheckResponse, Status};

/// A declaratively described configurable field, used to decode specs, flag
/// unused keys, and synthesize ad-hoc CLI flags.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: Option<&'static str>,
    pub alias: Option<char>,
    pub help: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Int,
    Bool,
    Duration,
    StringList,
    List,
    Map,
}

/// What one probe produced. Everything here is response data; probe failures
/// are statuses and messages, never errors.
#[derive(Debug)]
pub struct Probe {
    pub status: Status,
    pub messages: Vec<String>,
    pub details: Vec<prost_types::Any>,
    /// Variables exposed to aggregate checks, e.g. `response`.
    pub bindings: serde_json::Map<String, serde_json::Value>,
    /// Per-item payloads for `mode: each` checks.
    pub items: Vec<ProbeItem>,
    /// Pre-built subtree, spliced in by remote providers.
    pub children: Vec<HealthCheckResponse>,
}

#[derive(Debug, Clone)]
pub struct ProbeItem {
    pub name: String,
    pub value: serde_json::Value,
}

impl Default for Probe {
    fn default() -> Self {
        Self {
            status: Status::Unknown,
            messages: Vec::new(),
            details: Vec::new(),
            bindings: serde_json::Map::new(),
            items: Vec::new(),
            children: Vec::new(),
        }
    }
}

impl Probe {
    pub fn healthy() -> Self {
        Self {
            status: Status::Healthy,
            ..Self::default()
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: Status::Unhealthy,
            messages: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: Status::Unknown,
            messages: vec![message.into()],
            ..Self::default()
        }
    }

    pub fn bind(mut self, name: &str, value: serde_json::Value) -> Self {
        self.bindings.insert(name.to_string(), value);
        self
    }
}

/// A configured check. `setup` runs exactly once after construction; `probe`
/// is re-entrant and must not mutate shared state.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Validate the spec and compile anything reusable.
    fn setup(&mut self) -> miette::Result<()> {
        Ok(())
    }

    async fn probe(&self, ctx: &CheckContext) -> Probe;

    /// Containers own child instances; the engine traverses them instead of
    /// probing the container itself.
    fn as_container(&self) -> Option<&dyn Container> {
        None
    }

    /// Remote providers federate to another Platform Health server.
    fn is_remote(&self) -> bool {
        false
    }
}

pub trait Container: Send + Sync {
    fn children(&self) -> &[Instance];

    /// Replace the child tree with flattened failure messages.
    fn summarize(&self) -> bool {
        false
    }
}

/// A configured occurrence of a provider type: the unit the engine schedules.
pub struct Instance {
    pub name: String,
    pub kind: String,
    pub timeout: Option<Duration>,
    pub checks: CheckSet,
    pub provider: Box<dyn Provider>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Instance {
    pub fn is_container(&self) -> bool {
        self.provider.as_container().is_some()
    }
}

/// YAML specs cross into the JSON world of CEL bindings through here.
pub fn yaml_to_json(value: &serde_yaml::Value) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}
