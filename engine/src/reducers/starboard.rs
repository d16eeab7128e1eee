//! Starboard pin state machine.
//!
//! ```text
//! Untracked ──(count ≥ threshold)──► Create ──► Linked(Inserted) ──► Pinned
//!                                          └──► Linked(Existing) ──► DeleteOrphan + UpdateCount
//! Pinned ──(any count)──► UpdateCount
//! ```
//!
//! There is no transition out of `Pinned`; a pin deleted downstream is
//! observed by the engine and never recreated.

use herald_core::model::{LinkOutcome, LinkRecord};
use herald_core::reducer::{Effects, Reducer};
use smallvec::smallvec;

/// What the engine knows about one source message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinState {
    /// Stored link, if the message is pinned.
    pub link: Option<LinkRecord>,
    /// Last measured actor count.
    pub count: usize,
}

impl PinState {
    /// State for a message with the given link.
    #[must_use]
    pub const fn linked(link: Option<LinkRecord>) -> Self {
        Self { link, count: 0 }
    }
}

/// Observations and outcomes fed to [`PinReducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinAction {
    /// The actor set was measured by a reconcile job.
    Observed {
        /// Net actor count.
        count: usize,
        /// Tenant threshold.
        threshold: usize,
    },
    /// A pin was sent and the link insert returned.
    Linked {
        /// The link this job tried to store.
        sent: LinkRecord,
        /// What the store kept.
        outcome: LinkOutcome,
    },
    /// An actor left; only an existing pin is touched.
    Removed {
        /// Net actor count after the removal.
        count: usize,
    },
}

/// Writes requested by [`PinReducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinEffect {
    /// Send a new pin showing `count`.
    Create {
        /// Count to display.
        count: usize,
    },
    /// Edit the visible count of an existing pin.
    UpdateCount {
        /// Link to the pin.
        link: LinkRecord,
        /// Count to display.
        count: usize,
    },
    /// Delete a pin that lost the insert race.
    DeleteOrphan {
        /// Channel holding the orphan.
        location_id: String,
        /// Orphan message id.
        representation_id: String,
    },
}

/// Reducer for starboard pins.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinReducer;

impl Reducer for PinReducer {
    type State = PinState;
    type Action = PinAction;
    type Effect = PinEffect;

    fn reduce(&self, state: &mut PinState, action: PinAction) -> Effects<PinEffect> {
        match action {
            // ═══════════════════════════════════════════════════════════
            // Observed: create at threshold, otherwise keep the count current
            // ═══════════════════════════════════════════════════════════
            PinAction::Observed { count, threshold } => {
                state.count = count;
                match &state.link {
                    Some(link) => smallvec![PinEffect::UpdateCount {
                        link: link.clone(),
                        count,
                    }],
                    None if count >= threshold.max(1) => smallvec![PinEffect::Create { count }],
                    None => Effects::new(),
                }
            }

            // ═══════════════════════════════════════════════════════════
            // Linked: the stored row wins
            // ═══════════════════════════════════════════════════════════
            PinAction::Linked { sent, outcome } => match outcome {
                LinkOutcome::Inserted(record) => {
                    state.link = Some(record);
                    Effects::new()
                }
                LinkOutcome::Existing(record) => {
                    let mut effects = Effects::new();
                    if record.representation_id != sent.representation_id {
                        effects.push(PinEffect::DeleteOrphan {
                            location_id: sent.representation_location_id,
                            representation_id: sent.representation_id,
                        });
                        effects.push(PinEffect::UpdateCount {
                            link: record.clone(),
                            count: state.count,
                        });
                    }
                    state.link = Some(record);
                    effects
                }
            },

            // ═══════════════════════════════════════════════════════════
            // Removed: count-only update, never a creation
            // ═══════════════════════════════════════════════════════════
            PinAction::Removed { count } => {
                state.count = count;
                state
                    .link
                    .iter()
                    .map(|link| PinEffect::UpdateCount {
                        link: link.clone(),
                        count,
                    })
                    .collect()
            }
        }
    }
}
