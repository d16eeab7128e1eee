//! Stream announcement state machine, one instance per `(subject, channel)`.
//!
//! ```text
//! Offline ──Online──► Announce ──Announced──► Live (Persist + ScheduleRefresh)
//! Live ──Online──► Refresh + ResumeRefresh
//! Live ──Polled(Some)──► Refresh + ScheduleRefresh
//! Live ──Polled(None) / Offline──► Finalize + Forget ──► Offline
//! Live ──TargetGone──► Forget ──► Offline
//! ```

use herald_core::model::{ActiveStatusRecord, StreamStatus};
use herald_core::reducer::{Effects, Reducer};
use smallvec::smallvec;

/// What the engine knows about one announcement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveState {
    /// Stored status record, if the subject is live here.
    pub record: Option<ActiveStatusRecord>,
}

impl LiveState {
    /// State for the given stored record.
    #[must_use]
    pub const fn from_record(record: Option<ActiveStatusRecord>) -> Self {
        Self { record }
    }
}

/// Observations fed to [`LiveReducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveAction {
    /// The global poll reported the subject online.
    Online(StreamStatus),
    /// An announcement was sent.
    Announced(ActiveStatusRecord),
    /// A chained re-poll returned the subject's status.
    Polled(Option<StreamStatus>),
    /// The global poll no longer lists the subject.
    Offline,
    /// The announcement or its channel no longer exists downstream.
    TargetGone,
}

/// Writes requested by [`LiveReducer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEffect {
    /// Send a new announcement.
    Announce(StreamStatus),
    /// Edit the announcement in place.
    Refresh {
        /// Where the announcement lives.
        record: ActiveStatusRecord,
        /// Fresh status.
        stream: StreamStatus,
    },
    /// Store the status record.
    Persist(ActiveStatusRecord),
    /// Enqueue the next `refresh-stream` job.
    ScheduleRefresh,
    /// Enqueue a `refresh-stream` job unless one is already pending.
    ResumeRefresh,
    /// Terminal edit of the announcement.
    Finalize(ActiveStatusRecord),
    /// Delete the status record.
    Forget,
}

/// Reducer for stream announcements.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveReducer;

impl Reducer for LiveReducer {
    type State = LiveState;
    type Action = LiveAction;
    type Effect = LiveEffect;

    fn reduce(&self, state: &mut LiveState, action: LiveAction) -> Effects<LiveEffect> {
        match action {
            LiveAction::Online(stream) => match &state.record {
                Some(record) => smallvec![
                    LiveEffect::Refresh {
                        record: record.clone(),
                        stream,
                    },
                    LiveEffect::ResumeRefresh
                ],
                None => smallvec![LiveEffect::Announce(stream)],
            },

            LiveAction::Announced(record) => {
                state.record = Some(record.clone());
                smallvec![LiveEffect::Persist(record), LiveEffect::ScheduleRefresh]
            }

            LiveAction::Polled(Some(stream)) => match &state.record {
                Some(record) => smallvec![
                    LiveEffect::Refresh {
                        record: record.clone(),
                        stream,
                    },
                    LiveEffect::ScheduleRefresh
                ],
                None => Effects::new(),
            },

            LiveAction::Polled(None) | LiveAction::Offline => match state.record.take() {
                Some(record) => smallvec![LiveEffect::Finalize(record), LiveEffect::Forget],
                None => Effects::new(),
            },

            LiveAction::TargetGone => match state.record.take() {
                Some(_) => smallvec![LiveEffect::Forget],
                None => Effects::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_testing::assertions::{assert_effects, assert_no_effects};
    use herald_testing::{epoch, fixtures, ReducerTest};

    fn record() -> ActiveStatusRecord {
        ActiveStatusRecord {
            subject: "nyx".into(),
            location_id: "200".into(),
            guild_id: "g1".into(),
            representation_id: "sent-1".into(),
            external_ref_id: "nyx-vod".into(),
            started_at: epoch(),
        }
    }

    #[test]
    fn first_sighting_announces() {
        let stream = fixtures::stream("nyx", 5);
        ReducerTest::new(LiveReducer)
            .given_state(LiveState::default())
            .when_action(LiveAction::Online(stream.clone()))
            .then_effects(move |effects| assert_effects(effects, &[LiveEffect::Announce(stream)]))
            .run();
    }

    #[test]
    fn announcement_persists_and_chains() {
        ReducerTest::new(LiveReducer)
            .given_state(LiveState::default())
            .when_action(LiveAction::Announced(record()))
            .then_effects(|effects| {
                assert_effects(effects, &[LiveEffect::Persist(record()), LiveEffect::ScheduleRefresh]);
            })
            .then_state(|state| assert_eq!(state.record, Some(record())))
            .run();
    }

    #[test]
    fn global_poll_refreshes_and_resumes_a_lost_chain() {
        let stream = fixtures::stream("nyx", 9);
        ReducerTest::new(LiveReducer)
            .given_state(LiveState::from_record(Some(record())))
            .when_action(LiveAction::Online(stream.clone()))
            .then_effects(move |effects| {
                assert_effects(
                    effects,
                    &[LiveEffect::Refresh { record: record(), stream }, LiveEffect::ResumeRefresh],
                );
            })
            .run();
    }

    #[test]
    fn re_poll_refreshes_and_chains() {
        let stream = fixtures::stream("nyx", 9);
        ReducerTest::new(LiveReducer)
            .given_state(LiveState::from_record(Some(record())))
            .when_action(LiveAction::Polled(Some(stream.clone())))
            .then_effects(move |effects| {
                assert_effects(
                    effects,
                    &[LiveEffect::Refresh { record: record(), stream }, LiveEffect::ScheduleRefresh],
                );
            })
            .run();
    }

    #[test]
    fn going_offline_finalizes_once() {
        ReducerTest::new(LiveReducer)
            .given_state(LiveState::from_record(Some(record())))
            .when_action(LiveAction::Polled(None))
            .then_effects(|effects| {
                assert_effects(effects, &[LiveEffect::Finalize(record()), LiveEffect::Forget]);
            })
            .then_state(|state| assert!(state.record.is_none()))
            .run();

        ReducerTest::new(LiveReducer)
            .given_state(LiveState::from_record(Some(record())))
            .when_action(LiveAction::Polled(None))
            .when_action(LiveAction::Offline)
            .then_effects(assert_no_effects)
            .run();
    }

    #[test]
    fn missing_target_forgets_the_record() {
        ReducerTest::new(LiveReducer)
            .given_state(LiveState::from_record(Some(record())))
            .when_action(LiveAction::TargetGone)
            .then_effects(|effects| assert_effects(effects, &[LiveEffect::Forget]))
            .run();
    }

    #[test]
    fn re_poll_without_record_ends_the_chain() {
        ReducerTest::new(LiveReducer)
            .given_state(LiveState::default())
            .when_action(LiveAction::Polled(Some(fixtures::stream("nyx", 1))))
            .then_effects(assert_no_effects)
            .run();
    }
}
