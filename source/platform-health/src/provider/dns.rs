//! DNS resolution probe via the system resolver. Healthy when the name
//! resolves to at least `min-records` addresses; the records travel back as a
//! `DetailDns` payload and bind as `records` for checks.

use async_trait::async_trait;
use itertools::Itertools;
use miette::miette;
use serde::Deserialize;
use serde_json::json;

use super::{FieldKind, FieldSpec, Probe, Provider};
use crate::detail;
use crate::engine::context::CheckContext;
use crate::provider::registry::{ProviderArgs, ProviderType};

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "host",
        kind: FieldKind::String,
        default: None,
        alias: Some('H'),
        help: "Name to resolve",
    },
    FieldSpec {
        name: "min-records",
        kind: FieldKind::Int,
        default: Some("1"),
        alias: None,
        help: "Minimum number of resolved addresses",
    },
];

pub fn provider_type() -> ProviderType {
    ProviderType {
        kind: "dns",
        help: "DNS resolution check",
        fields: FIELDS,
        container: false,
        remote: false,
        build: |args: ProviderArgs| {
            let provider = DnsProvider::from_spec(args.spec)?;
            Ok(Box::new(provider))
        },
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct DnsSpec {
    host: String,
    min_records: usize,
}

impl Default for DnsSpec {
    fn default() -> Self {
        Self {
            host: String::new(),
            min_records: 1,
        }
    }
}

pub struct DnsProvider {
    spec: DnsSpec,
}

impl DnsProvider {
    fn from_spec(spec: serde_yaml::Mapping) -> miette::Result<Self> {
        let spec: DnsSpec = serde_yaml::from_value(serde_yaml::Value::Mapping(spec))
            .map_err(|e| miette!("bad dns spec: {e}"))?;
        Ok(Self { spec })
    }
}

#[async_trait]
impl Provider for DnsProvider {
    fn setup(&mut self) -> miette::Result<()> {
        if self.spec.host.is_empty() {
            return Err(miette!("dns check needs a 'host'"));
        }
        Ok(())
    }

    async fn probe(&self, _ctx: &CheckContext) -> Probe {
        let DnsSpec { host, min_records } = &self.spec;

        match tokio::net::lookup_host((host.as_str(), 0u16)).await {
            Ok(addrs) => {
                let records: Vec<String> =
                    addrs.map(|addr| addr.ip().to_string()).unique().collect();

                let mut probe = if records.len() >= *min_records {
                    Probe::healthy()
                } else {
                    Probe::unhealthy(format!(
                        "{host} resolved {} records, expected at least {min_records}",
                        records.len()
                    ))
                };
                probe.details.push(detail::pack_dns(records.clone()));
                probe.bind("records", json!(records))
            }
            Err(e) => Probe::unhealthy(format!("resolve {host}: {e}")),
        }
    }
}
