//! TCP connect probe: healthy when the remote accepts the connection.

use async_trait::async_trait;
use miette::miette;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;

use super::{FieldKind, FieldSpec, Probe, Provider};
use crate::engine::context::CheckContext;
use crate::provider::registry::{ProviderArgs, ProviderType};

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "host",
        kind: FieldKind::String,
        default: None,
        alias: Some('H'),
        help: "Host to connect to",
    },
    FieldSpec {
        name: "port",
        kind: FieldKind::Int,
        default: None,
        alias: Some('p'),
        help: "Port to connect to",
    },
];

pub fn provider_type() -> ProviderType {
    ProviderType {
        kind: "tcp",
        help: "TCP connection check",
        fields: FIELDS,
        container: false,
        remote: false,
        build: |args: ProviderArgs| {
            let provider = TcpProvider::from_spec(args.spec)?;
            Ok(Box::new(provider))
        },
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct TcpSpec {
    host: String,
    port: u16,
}

pub struct TcpProvider {
    spec: TcpSpec,
}

impl TcpProvider {
    fn from_spec(spec: serde_yaml::Mapping) -> miette::Result<Self> {
        let spec: TcpSpec = serde_yaml::from_value(serde_yaml::Value::Mapping(spec))
            .map_err(|e| miette!("bad tcp spec: {e}"))?;
        Ok(Self { spec })
    }
}

#[async_trait]
impl Provider for TcpProvider {
    fn setup(&mut self) -> miette::Result<()> {
        if self.spec.host.is_empty() {
            return Err(miette!("tcp check needs a 'host'"));
        }
        if self.spec.port == 0 {
            return Err(miette!("tcp check needs a non-zero 'port'"));
        }
        Ok(())
    }

    async fn probe(&self, _ctx: &CheckContext) -> Probe {
        let TcpSpec { host, port } = &self.spec;
        match TcpStream::connect((host.as_str(), *port)).await {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_default();
                Probe::healthy().bind("connection", json!({ "address": peer }))
            }
            Err(e) => Probe::unhealthy(format!("connect {host}:{port}: {e}")),
        }
    }
}
