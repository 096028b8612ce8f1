//! The gRPC `Health` service: loop detection, component-path filtering, and
//! the engine run, wrapped around an atomically swappable config tree.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use miette::IntoDiagnostic;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response};

use crate::detail;
use crate::engine;
use crate::engine::context::CheckContext;
use crate::engine::filter::ComponentFilter;
use crate::engine::rollup::rollup;
use crate::pb::v1::health_server::{Health, HealthServer};
use crate::pb::v1::{HealthCheckRequest, HealthCheckResponse, Status};
use crate::provider::builder::LoadedConfig;

pub type SharedConfig = Arc<ArcSwap<LoadedConfig>>;

pub struct HealthService {
    state: SharedConfig,
    server_id: String,
}

impl HealthService {
    pub fn new(state: SharedConfig, server_id: impl Into<String>) -> Self {
        Self {
            state,
            server_id: server_id.into(),
        }
    }

    /// The whole `Check` pipeline, callable without a transport. The gRPC
    /// method and the ad-hoc CLI both come through here.
    pub async fn run_check(&self, request: HealthCheckRequest) -> HealthCheckResponse {
        let started = Instant::now();
        let config = self.state.load_full();

        // Loop detection decides before any provider is scheduled.
        if let Some(first) = request.hops.iter().position(|h| h == &self.server_id) {
            let mut chain: Vec<String> = request.hops[first..].to_vec();
            chain.push(self.server_id.clone());
            tracing::warn!(chain = chain.join(" -> "), "federation loop detected");

            let mut response = self.root_response(started);
            response.set_status(Status::LoopDetected);
            response
                .messages
                .push(format!("loop detected: {}", chain.join(" -> ")));
            response.details.push(detail::pack_loop(chain));
            return response;
        }

        let mut hops = request.hops;
        hops.push(self.server_id.clone());

        let filter = match ComponentFilter::from_paths(&request.components, &config.instances) {
            Ok(filter) => filter,
            Err(invalid) => {
                let mut response = self.root_response(started);
                response.set_status(Status::Unhealthy);
                response
                    .messages
                    .push(format!("invalid components: {}", invalid.join(", ")));
                return response;
            }
        };

        let ctx = CheckContext {
            server_id: self.server_id.clone(),
            hops,
            filter,
            limiter: Arc::new(Semaphore::new(config.parallelism.max(1))),
            cancel: CancellationToken::new(),
            fail_fast: request.fail_fast,
        };

        let components = engine::check_instances(&ctx, &config.instances).await;
        let status = rollup(components.iter().map(|c| c.status()));

        let mut response = self.root_response(started);
        response.set_status(status);
        response.components = components;
        response
    }

    fn root_response(&self, started: Instant) -> HealthCheckResponse {
        let elapsed = started.elapsed();
        HealthCheckResponse {
            name: self.server_id.clone(),
            r#type: "server".to_string(),
            server_id: self.server_id.clone(),
            duration: Some(prost_types::Duration {
                seconds: elapsed.as_secs() as i64,
                nanos: elapsed.subsec_nanos() as i32,
            }),
            ..HealthCheckResponse::default()
        }
    }
}

#[tonic::async_trait]
impl Health for HealthService {
    async fn check(
        &self,
        request: Request<HealthCheckRequest>,
    ) -> Result<Response<HealthCheckResponse>, tonic::Status> {
        let response = self.run_check(request.into_inner()).await;
        Ok(Response::new(response))
    }
}

/// Serve the `Health` service plus the standard grpc.health.v1 service
/// (always SERVING) on `addr`. Runs until the process exits; a bind failure
/// is the one error class that terminates.
pub async fn serve(addr: SocketAddr, service: HealthService) -> miette::Result<()> {
    let (mut health_reporter, standard_health) = tonic_health::server::health_reporter();
    health_reporter
        .set_service_status("", tonic_health::ServingStatus::Serving)
        .await;

    tracing::info!(%addr, server_id = %service.server_id, "serving gRPC health checks");

    tonic::transport::Server::builder()
        .add_service(standard_health)
        .add_service(HealthServer::new(service))
        .serve(addr)
        .await
        .into_diagnostic()
}
