//! # Herald Runtime
//!
//! Runtime for herald's deferred work.
//!
//! This crate turns the [`JobQueue`](herald_core::providers::JobQueue)
//! contract into a running system:
//!
//! ## Pieces
//!
//! - **Scheduler**: stamps typed payloads into job envelopes and enqueues them
//! - **Handler registry**: maps job names to async handlers
//! - **Worker**: leases due jobs, runs each in its own task under a timeout,
//!   and routes the outcome (ack, retry with backoff, dead-letter)
//! - **Health and dead letters**: bounded in-memory DLQ plus health reporting
//!
//! ## Example
//!
//! ```ignore
//! use herald_runtime::{HandlerRegistry, Scheduler, Worker, WorkerConfig};
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register(JobName::Starboard, move |payload| {
//!     let engine = engine.clone();
//!     async move { engine.handle(payload).await }
//! });
//!
//! let worker = Worker::new(queue, clock, Arc::new(registry), WorkerConfig::default());
//! worker.run(shutdown_rx).await;
//! ```

/// Retry with exponential backoff
pub mod retry;

/// Prometheus recorder and herald's metric helpers
pub mod metrics;

/// Component health and the aggregated report
pub mod health;

/// Jobs the worker gave up on
pub mod dead_letter;

/// Job name to handler mapping
pub mod registry;

/// Typed enqueueing on top of a job queue
pub mod scheduler;

/// Job worker
pub mod worker;

pub use dead_letter::{DeadLetter, DeadLetterQueue};
pub use health::{HealthCheck, HealthReport, HealthStatus};
pub use registry::HandlerRegistry;
pub use retry::RetryPolicy;
pub use scheduler::Scheduler;
pub use worker::{Settlement, Worker, WorkerConfig};
