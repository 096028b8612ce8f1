//! Named server contexts for the client, persisted as TOML under the user
//! config directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use miette::{miette, IntoDiagnostic, WrapErr};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextStore {
    pub current: Option<String>,
    #[serde(default)]
    pub contexts: BTreeMap<String, ContextEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub server: String,
}

pub fn store_path() -> miette::Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| miette!("no user config directory"))?;
    Ok(base.join("platform-health").join("contexts.toml"))
}

impl ContextStore {
    pub fn load() -> miette::Result<Self> {
        let path = store_path()?;
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to parse {}", path.display()))
    }

    pub fn save(&self) -> miette::Result<()> {
        let path = store_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).into_diagnostic()?;
        }
        let text = toml::to_string_pretty(self).into_diagnostic()?;
        std::fs::write(&path, text)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))
    }

    pub fn get(&self, name: &str) -> miette::Result<&ContextEntry> {
        self.contexts
            .get(name)
            .ok_or_else(|| miette!("no context named '{name}'"))
    }

    /// Resolve where the client should connect: an explicit `--server` wins,
    /// then a named `--context`, then the stored current context.
    pub fn resolve(&self, server: Option<String>, context: Option<String>) -> miette::Result<String> {
        if let Some(server) = server {
            return Ok(server);
        }
        if let Some(name) = context {
            return Ok(self.get(&name)?.server.clone());
        }
        if let Some(name) = &self.current {
            return Ok(self.get(name)?.server.clone());
        }
        Err(miette!(
            "no server given: pass --server, --context, or set one with 'context use'"
        ))
    }
}
