//! Hot reload: watch the config file's directory, debounce bursts of
//! filesystem events, rebuild the whole tree, and swap it in atomically.
//! A reload that fails for any reason keeps the previous tree.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::provider::builder;
use crate::provider::registry::ProviderRegistry;
use crate::server::SharedConfig;

pub struct ConfigWatcher {
    state: SharedConfig,
    registry: Arc<ProviderRegistry>,
    config_path: PathBuf,
    strict: bool,
}

impl ConfigWatcher {
    pub fn new(
        state: SharedConfig,
        registry: Arc<ProviderRegistry>,
        config_path: PathBuf,
        strict: bool,
    ) -> Self {
        Self {
            state,
            registry,
            config_path,
            strict,
        }
    }

    pub async fn watch(&self) -> Result<Infallible, Box<dyn std::error::Error + Send + Sync>> {
        // Watch the directory, not the file: editors and deploy tooling
        // replace files by rename, which drops a file-level watch.
        let watch_root = self
            .config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        tracing::info!(path = %watch_root.display(), "starting config watcher");

        let (tx, mut rx) = mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                if event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove() {
                    let _ = tx.blocking_send(event);
                }
            }
        })?;

        watcher.watch(&watch_root, RecursiveMode::Recursive)?;

        loop {
            if rx.recv().await.is_some() {
                tokio::time::sleep(Duration::from_millis(100)).await;

                while rx.try_recv().is_ok() {}

                self.reload();
            }
        }
    }

    /// One reload attempt. Swap is all-or-nothing: readers see either the
    /// previous tree or the next one, never a mix.
    pub fn reload(&self) {
        tracing::info!(path = %self.config_path.display(), "reloading configuration");

        match builder::load(&self.config_path, &self.registry, self.strict) {
            Ok(config) => {
                tracing::info!(
                    components = config.instances.len(),
                    warnings = config.warnings.len(),
                    "configuration swapped in"
                );
                self.state.store(Arc::new(config));
            }
            Err(e) => {
                tracing::warn!("failed to reload config: {e}. Keeping old configuration.");
            }
        }
    }
}
