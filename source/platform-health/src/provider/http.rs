//! HTTP(S) probe. A completed request with a status below 400 is healthy;
//! anything stricter belongs in a check against the bound `response`
//! variable, e.g. `response.status in [200, 204]`.

use std::time::Instant;

use async_trait::async_trait;
use miette::{miette, IntoDiagnostic};
use serde::Deserialize;
use serde_json::json;

use super::{FieldKind, FieldSpec, Probe, Provider};
use crate::engine::context::CheckContext;
use crate::provider::registry::{ProviderArgs, ProviderType};

pub const FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "url",
        kind: FieldKind::String,
        default: None,
        alias: Some('u'),
        help: "URL to request",
    },
    FieldSpec {
        name: "method",
        kind: FieldKind::String,
        default: Some("GET"),
        alias: Some('X'),
        help: "HTTP method",
    },
    FieldSpec {
        name: "insecure",
        kind: FieldKind::Bool,
        default: Some("false"),
        alias: Some('k'),
        help: "Skip TLS certificate verification",
    },
];

pub fn provider_type() -> ProviderType {
    ProviderType {
        kind: "http",
        help: "HTTP request check",
        fields: FIELDS,
        container: false,
        remote: false,
        build: |args: ProviderArgs| {
            let provider = HttpProvider::from_spec(args.spec)?;
            Ok(Box::new(provider))
        },
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct HttpSpec {
    url: String,
    method: String,
    insecure: bool,
}

pub struct HttpProvider {
    spec: HttpSpec,
    method: reqwest::Method,
    client: Option<reqwest::Client>,
}

impl HttpProvider {
    fn from_spec(spec: serde_yaml::Mapping) -> miette::Result<Self> {
        let spec: HttpSpec = serde_yaml::from_value(serde_yaml::Value::Mapping(spec))
            .map_err(|e| miette!("bad http spec: {e}"))?;
        Ok(Self {
            spec,
            method: reqwest::Method::GET,
            client: None,
        })
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn setup(&mut self) -> miette::Result<()> {
        reqwest::Url::parse(&self.spec.url)
            .map_err(|e| miette!("bad url '{}': {e}", self.spec.url))?;

        if !self.spec.method.is_empty() {
            self.method = reqwest::Method::from_bytes(self.spec.method.to_uppercase().as_bytes())
                .map_err(|e| miette!("bad method '{}': {e}", self.spec.method))?;
        }

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.spec.insecure)
            .build()
            .into_diagnostic()?;
        self.client = Some(client);
        Ok(())
    }

    async fn probe(&self, _ctx: &CheckContext) -> Probe {
        let Some(client) = &self.client else {
            return Probe::unknown("http client not set up");
        };

        let started = Instant::now();
        match client
            .request(self.method.clone(), &self.spec.url)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                let time_ms = started.elapsed().as_secs_f64() * 1000.0;

                let probe = if status.as_u16() < 400 {
                    Probe::healthy()
                } else {
                    Probe::unhealthy(format!("{} {}: {status}", self.method, self.spec.url))
                };
                probe.bind(
                    "response",
                    json!({ "status": status.as_u16(), "time_ms": time_ms }),
                )
            }
            Err(e) => Probe::unhealthy(format!("{} {}: {e}", self.method, self.spec.url)),
        }
    }
}
