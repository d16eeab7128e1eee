//! # Herald Engine
//!
//! Reconciliation logic for herald's two tracked signals.
//!
//! - **Starboard**: reaction events feed an actor set per message; a
//!   `starboard` job creates the pinned summary once the set reaches the
//!   tenant threshold and keeps its count current afterwards.
//! - **Liveness**: a fixed-interval poll discovers which followed streamers are
//!   online and enqueues `update-stream` / `remove-stream` jobs; each
//!   announcement re-polls itself through a chained `refresh-stream` job until
//!   the stream ends.
//!
//! Decisions live in pure reducers ([`reducers`]); the methods on
//! [`EngineEnvironment`] read the facts, run the reducer and interpret the
//! effects against the injected providers. Nothing here holds a lock across
//! an await: per-entity consistency comes from create-if-absent writes
//! (claim keys, the unique link constraint) and idempotent edits.
//!
//! ## Example
//!
//! ```ignore
//! let env = EngineEnvironment::new(messaging, status, settings, links, follows, store, scheduler, config);
//!
//! let mut registry = HandlerRegistry::new();
//! register_handlers(&mut registry, &env);
//!
//! tokio::spawn({ let env = env.clone(); async move { env.run_poller(shutdown_rx).await } });
//! ```

/// Engine tunables
pub mod config;

/// Dependency injection for the engine
pub mod environment;

/// Ephemeral store key layout
pub mod keys;

/// Read-through cache helper
pub mod cache;

/// Outbound message rendering
pub mod render;

/// Pure state machines
pub mod reducers;

/// Reaction ingestion and pin reconciliation
pub mod starboard;

/// Status polling and announcement reconciliation
pub mod liveness;

/// Job handler registration
pub mod handlers;

pub use config::EngineConfig;
pub use environment::EngineEnvironment;
pub use handlers::register_handlers;
pub use liveness::PollReport;
pub use starboard::{Ingested, ReactionEvent, ReactionKind};
