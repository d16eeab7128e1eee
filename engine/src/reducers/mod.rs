//! Pure state machines for both tracked signals.
//!
//! The engine loads the current facts (link record, status record, counts),
//! feeds them in as actions and interprets the returned effects. Keeping the
//! decisions here makes every transition testable without I/O.

pub mod liveness;
pub mod starboard;

pub use liveness::{LiveAction, LiveEffect, LiveReducer, LiveState};
pub use starboard::{PinAction, PinEffect, PinReducer, PinState};
