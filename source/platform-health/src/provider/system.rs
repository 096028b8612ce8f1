//! The `system` container: a named grouping of child instances. The engine
//! traverses the children and rolls their statuses up; the container itself
//! never probes anything.

use async_trait::async_trait;
use miette::miette;
use serde::Deserialize;

use super::{Container, FieldKind, FieldSpec, Instance, Probe, Provider};
use crate::engine::context::CheckContext;
use crate::provider::registry::{ProviderArgs, ProviderType};

pub const FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "summarize",
    kind: FieldKind::Bool,
    default: Some("false"),
    alias: None,
    help: "Flatten child failures into this node's messages instead of returning the child tree",
}];

pub fn provider_type() -> ProviderType {
    ProviderType {
        kind: "system",
        help: "Container grouping child components",
        fields: FIELDS,
        container: true,
        remote: false,
        build: |args: ProviderArgs| {
            let provider = SystemProvider::from_spec(args.spec, args.children)?;
            Ok(Box::new(provider))
        },
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct SystemSpec {
    summarize: bool,
}

pub struct SystemProvider {
    children: Vec<Instance>,
    summarize: bool,
}

impl SystemProvider {
    fn from_spec(spec: serde_yaml::Mapping, children: Vec<Instance>) -> miette::Result<Self> {
        let spec: SystemSpec = serde_yaml::from_value(serde_yaml::Value::Mapping(spec))
            .map_err(|e| miette!("bad system spec: {e}"))?;
        Ok(Self::new(children, spec.summarize))
    }

    pub fn new(children: Vec<Instance>, summarize: bool) -> Self {
        Self {
            children,
            summarize,
        }
    }
}

#[async_trait]
impl Provider for SystemProvider {
    async fn probe(&self, _ctx: &CheckContext) -> Probe {
        // Never reached: the engine traverses containers instead.
        Probe::healthy()
    }

    fn as_container(&self) -> Option<&dyn Container> {
        Some(self)
    }
}

impl Container for SystemProvider {
    fn children(&self) -> &[Instance] {
        &self.children
    }

    fn summarize(&self) -> bool {
        self.summarize
    }
}
