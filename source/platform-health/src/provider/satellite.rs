//! Satellite federation: a probe that is itself a `Check` call against
//! another Platform Health server. The remote tree is spliced in as this
//! instance's components. Hops travel with the call so the far side can
//! detect federation loops (the local server id is already on the list by
//! the time a probe runs).

use async_trait::async_trait;
use miette::miette;
use serde::Deserialize;

use super::{FieldKind, FieldSpec, Probe, Provider};
use crate::engine::context::CheckContext;
use crate::pb::v1::{health_client::HealthClient, HealthCheckRequest};
use crate::provider::registry::{ProviderArgs, ProviderType};

pub const FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "address",
    kind: FieldKind::String,
    default: None,
    alias: Some('a'),
    help: "Address of the remote Platform Health server (host:port or URL)",
}];

pub fn provider_type() -> ProviderType {
    ProviderType {
        kind: "satellite",
        help: "Federated check against another Platform Health server",
        fields: FIELDS,
        container: false,
        remote: true,
        build: |args: ProviderArgs| {
            let provider = SatelliteProvider::from_spec(args.spec)?;
            Ok(Box::new(provider))
        },
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct SatelliteSpec {
    address: String,
}

pub struct SatelliteProvider {
    endpoint: String,
}

impl SatelliteProvider {
    fn from_spec(spec: serde_yaml::Mapping) -> miette::Result<Self> {
        let spec: SatelliteSpec = serde_yaml::from_value(serde_yaml::Value::Mapping(spec))
            .map_err(|e| miette!("bad satellite spec: {e}"))?;
        Ok(Self {
            endpoint: normalize_endpoint(&spec.address),
        })
    }

    pub fn new(address: &str) -> Self {
        Self {
            endpoint: normalize_endpoint(address),
        }
    }
}

fn normalize_endpoint(address: &str) -> String {
    if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

#[async_trait]
impl Provider for SatelliteProvider {
    fn setup(&mut self) -> miette::Result<()> {
        if self.endpoint == "http://" {
            return Err(miette!("satellite check needs an 'address'"));
        }
        Ok(())
    }

    async fn probe(&self, ctx: &CheckContext) -> Probe {
        let mut client = match HealthClient::connect(self.endpoint.clone()).await {
            Ok(client) => client,
            Err(e) => return Probe::unhealthy(format!("satellite {}: {e}", self.endpoint)),
        };

        let request = HealthCheckRequest {
            components: Vec::new(),
            hops: ctx.hops.clone(),
            fail_fast: ctx.fail_fast,
        };

        match client.check(request).await {
            Ok(response) => {
                let root = response.into_inner();
                Probe {
                    status: root.status(),
                    messages: root.messages,
                    details: root.details,
                    children: root.components,
                    ..Probe::default()
                }
            }
            Err(status) => Probe::unhealthy(format!(
                "satellite {}: {}",
                self.endpoint,
                status.message()
            )),
        }
    }

    fn is_remote(&self) -> bool {
        true
    }
}
