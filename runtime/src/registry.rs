//! Job handler registry.
//!
//! Maps each [`JobName`] to an async handler. The worker validates a job's
//! payload before dispatching, so handlers receive a typed [`JobPayload`]
//! and never see raw JSON.

use futures::future::BoxFuture;
use herald_core::job::{JobName, JobPayload};
use herald_core::{HeraldError, Result};
use std::collections::HashMap;
use std::future::Future;

type BoxedHandler = Box<dyn Fn(JobPayload) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Registry that maps job names to handlers.
///
/// # Example
///
/// ```ignore
/// let mut registry = HandlerRegistry::new();
/// registry.register(JobName::RemoveStream, move |payload| {
///     let engine = engine.clone();
///     async move { engine.handle(payload).await }
/// });
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobName, BoxedHandler>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for a job name.
    pub fn register<F, Fut>(&mut self, name: JobName, handler: F)
    where
        F: Fn(JobPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.handlers
            .insert(name, Box::new(move |payload| Box::pin(handler(payload))));
    }

    /// Start the handler for a validated payload.
    ///
    /// The returned future owns everything it needs, so it can be spawned.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::UnknownJob`] if no handler is registered.
    pub fn dispatch(&self, payload: JobPayload) -> Result<BoxFuture<'static, Result<()>>> {
        let name = payload.name();
        let handler = self
            .handlers
            .get(&name)
            .ok_or_else(|| HeraldError::UnknownJob(name.as_str().to_string()))?;
        Ok(handler(payload))
    }

    /// Check if a job name has a handler.
    #[must_use]
    pub fn is_registered(&self, name: JobName) -> bool {
        self.handlers.contains_key(&name)
    }

    /// Job names without a handler.
    #[must_use]
    pub fn missing(&self) -> Vec<JobName> {
        JobName::ALL
            .into_iter()
            .filter(|name| !self.is_registered(*name))
            .collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerRegistry").field("handlers", &names).finish()
    }
}
