//! Request-scoped state threaded through a check.
//!
//! There are no process-wide singletons here: the hops list, the component
//! filter, the probe limiter, and the cancellation token all travel with the
//! request.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::filter::ComponentFilter;

#[derive(Clone)]
pub struct CheckContext {
    /// This server's identifier, already appended to `hops`.
    pub server_id: String,
    /// Server ids the request has traversed, forwarded verbatim to satellites.
    pub hops: Vec<String>,
    pub filter: ComponentFilter,
    /// Global bound on in-flight probes. Nested containers share it.
    pub limiter: Arc<Semaphore>,
    pub cancel: CancellationToken,
    pub fail_fast: bool,
}

impl CheckContext {
    pub fn new(server_id: impl Into<String>, parallelism: usize) -> Self {
        Self {
            server_id: server_id.into(),
            hops: Vec::new(),
            filter: ComponentFilter::All,
            limiter: Arc::new(Semaphore::new(parallelism.max(1))),
            cancel: CancellationToken::new(),
            fail_fast: false,
        }
    }

    /// The context a child named `name` runs under, or `None` when the
    /// component filter excludes it.
    pub fn descend(&self, name: &str) -> Option<CheckContext> {
        let filter = self.filter.child(name)?;
        Some(CheckContext {
            filter,
            ..self.clone()
        })
    }
}
