//! Server bootstrap: registry, initial load, watcher, gRPC listener.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::provider::builder;
use crate::provider::registry::ProviderRegistry;
use crate::server::{self, HealthService, SharedConfig};
use crate::watcher::ConfigWatcher;

pub struct ServerOptions {
    pub config: PathBuf,
    pub listen: SocketAddr,
    pub server_id: Option<String>,
    pub strict: bool,
    pub parallelism: Option<usize>,
    pub watch: bool,
}

pub struct AppContext {
    state: SharedConfig,
    listen: SocketAddr,
    server_id: String,
    watcher: Option<ConfigWatcher>,
}

impl AppContext {
    pub fn bootstrap(options: ServerOptions) -> miette::Result<AppContext> {
        let registry = Arc::new(ProviderRegistry::builtin());

        tracing::info!(config = %options.config.display(), "loading configuration");
        let mut config = builder::load(&options.config, &registry, options.strict)?;

        if let Some(parallelism) = options.parallelism {
            config.parallelism = parallelism;
        }
        tracing::info!(
            components = config.instances.len(),
            parallelism = config.parallelism,
            warnings = config.warnings.len(),
            "configuration loaded"
        );

        // Precedence: flag, then config file, then the listen address.
        let server_id = options
            .server_id
            .or_else(|| config.server_id.clone())
            .unwrap_or_else(|| options.listen.to_string());

        let state: SharedConfig = Arc::new(ArcSwap::from_pointee(config));

        let watcher = options.watch.then(|| {
            ConfigWatcher::new(
                state.clone(),
                registry.clone(),
                options.config.clone(),
                options.strict,
            )
        });

        Ok(AppContext {
            state,
            listen: options.listen,
            server_id,
            watcher,
        })
    }

    pub async fn run(self) -> miette::Result<()> {
        if let Some(watcher) = self.watcher {
            tokio::spawn(async move {
                if let Err(e) = watcher.watch().await {
                    tracing::error!("config watcher failed: {e}");
                }
            });
        }

        let service = HealthService::new(self.state.clone(), self.server_id);
        server::serve(self.listen, service).await
    }
}
