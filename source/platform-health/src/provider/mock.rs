//! A provider that reports whatever its spec tells it to. The workhorse of
//! config smoke tests and of this repository's own test suites.

use std::time::Duration;

use async_trait::async_trait;
use miette::miette;
use serde::Deserialize;
use serde_json::json;

use super::{yaml_to_json, FieldKind, FieldSpec, Probe, ProbeItem, Provider};
use crate::engine::context::CheckContext;
use crate::pb::v1::Status;
use crate::provider::registry::{ProviderArgs, ProviderType};

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "status",
        kind: FieldKind::String,
        default: Some("HEALTHY"),
        alias: Some('s'),
        help: "Status to report: HEALTHY, UNHEALTHY, UNKNOWN or LOOP_DETECTED",
    },
    FieldSpec {
        name: "message",
        kind: FieldKind::String,
        default: None,
        alias: Some('m'),
        help: "Message attached to every probe",
    },
    FieldSpec {
        name: "delay",
        kind: FieldKind::Duration,
        default: None,
        alias: None,
        help: "Artificial probe latency",
    },
    FieldSpec {
        name: "items",
        kind: FieldKind::List,
        default: None,
        alias: None,
        help: "Item payloads exposed to 'mode: each' checks as 'resource'",
    },
];

pub fn provider_type() -> ProviderType {
    ProviderType {
        kind: "mock",
        help: "Fixed-outcome check for configuration tests",
        fields: FIELDS,
        container: false,
        remote: false,
        build: |args: ProviderArgs| {
            let provider = MockProvider::from_spec(args.spec)?;
            Ok(Box::new(provider))
        },
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct MockSpec {
    status: Option<String>,
    message: Option<String>,
    delay: Option<String>,
    items: Vec<serde_yaml::Value>,
}

pub struct MockProvider {
    spec: MockSpec,
    status: Status,
    delay: Option<Duration>,
    items: Vec<ProbeItem>,
}

impl MockProvider {
    fn from_spec(spec: serde_yaml::Mapping) -> miette::Result<Self> {
        let spec: MockSpec = serde_yaml::from_value(serde_yaml::Value::Mapping(spec))
            .map_err(|e| miette!("bad mock spec: {e}"))?;
        Ok(Self {
            spec,
            status: Status::Healthy,
            delay: None,
            items: Vec::new(),
        })
    }

    /// Build one directly, bypassing the spec. Used by tests all over the
    /// workspace.
    pub fn fixed(status: Status) -> Self {
        Self {
            spec: MockSpec::default(),
            status,
            delay: None,
            items: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.spec.message = Some(message.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_items(mut self, items: Vec<serde_json::Value>) -> Self {
        self.items = items.into_iter().enumerate().map(to_item).collect();
        self
    }
}

fn to_item((index, value): (usize, serde_json::Value)) -> ProbeItem {
    let name = value
        .get("name")
        .and_then(|n| n.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| index.to_string());
    ProbeItem { name, value }
}

fn parse_status(text: &str) -> miette::Result<Status> {
    let normalized = text.to_uppercase().replace('-', "_");
    Status::from_str_name(&normalized)
        .ok_or_else(|| miette!("unknown status '{text}'"))
}

#[async_trait]
impl Provider for MockProvider {
    fn setup(&mut self) -> miette::Result<()> {
        if let Some(status) = &self.spec.status {
            self.status = parse_status(status)?;
        }
        if let Some(delay) = &self.spec.delay {
            self.delay = Some(
                humantime::parse_duration(delay).map_err(|e| miette!("bad delay '{delay}': {e}"))?,
            );
        }
        self.items = self
            .spec
            .items
            .iter()
            .map(yaml_to_json)
            .enumerate()
            .map(to_item)
            .collect();
        Ok(())
    }

    async fn probe(&self, _ctx: &CheckContext) -> Probe {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut probe = Probe {
            status: self.status,
            ..Probe::default()
        };
        if let Some(message) = &self.spec.message {
            probe.messages.push(message.clone());
        }
        probe
            .bindings
            .insert("status".to_string(), json!(self.status.as_str_name()));
        probe.items = self.items.clone();
        probe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(input: &str) -> serde_yaml::Mapping {
        serde_yaml::from_str(input).expect("test YAML must parse")
    }

    #[tokio::test]
    async fn test_default_is_healthy() {
        let mut provider = MockProvider::from_spec(mapping("{}")).unwrap();
        provider.setup().unwrap();

        let ctx = CheckContext::new("test", 1);
        let probe = provider.probe(&ctx).await;
        assert_eq!(probe.status, Status::Healthy);
    }

    #[tokio::test]
    async fn test_spec_status_and_message() {
        let mut provider =
            MockProvider::from_spec(mapping("status: unhealthy\nmessage: down for maintenance\n"))
                .unwrap();
        provider.setup().unwrap();

        let probe = provider.probe(&CheckContext::new("test", 1)).await;
        assert_eq!(probe.status, Status::Unhealthy);
        assert_eq!(probe.messages, vec!["down for maintenance".to_string()]);
    }

    #[test]
    fn test_unknown_status_fails_setup() {
        let mut provider = MockProvider::from_spec(mapping("status: wobbly\n")).unwrap();
        let err = provider.setup().unwrap_err();
        assert!(err.to_string().contains("unknown status 'wobbly'"));
    }

    #[tokio::test]
    async fn test_items_get_names() {
        let mut provider = MockProvider::from_spec(mapping(
            "items:\n  - name: r1\n    ready: true\n  - ready: false\n",
        ))
        .unwrap();
        provider.setup().unwrap();

        let probe = provider.probe(&CheckContext::new("test", 1)).await;
        assert_eq!(probe.items.len(), 2);
        assert_eq!(probe.items[0].name, "r1");
        assert_eq!(probe.items[1].name, "1");
    }
}
