//! Status polling and announcement reconciliation.
//!
//! ```text
//! poller (every poll_interval)
//!     ├─► follows.subjects() in batches of MAX_BATCH ──► status.streams()
//!     ├─► online subject            ──► enqueue `update-stream {stream}`
//!     └─► previously active, absent ──► enqueue `remove-stream {user}`
//!
//! `update-stream`  ──► per follow: announce (claimed) or refresh in place
//! `refresh-stream` ──► re-poll one subject: refresh + re-chain, or finalize
//! `remove-stream`  ──► finalize every announcement of the subject
//! ```
//!
//! The previously active set is read from the store's active-stream keys on
//! every cycle, never from memory, so a restarted process resumes where the
//! last one stopped. Each chain records its pending job id under a chain
//! marker; when the global poll finds a live announcement whose job is no
//! longer queued (lost in a restart, dead-lettered, never enqueued) it starts
//! a new chain.

use crate::environment::EngineEnvironment;
use crate::keys;
use crate::reducers::{LiveAction, LiveEffect, LiveReducer, LiveState};
use crate::render;
use herald_core::content::MessageContent;
use herald_core::environment::Clock;
use herald_core::job::{JobId, JobPayload};
use herald_core::model::{ActiveStatusRecord, Follow, StreamStatus, SubjectProfile};
use herald_core::providers::{
    ConfigurationStore, EphemeralStore, FollowRegistry, JobQueue, LinkStore, MessagingClient,
    StatusApi,
};
use herald_core::reducer::{Effects, Reducer};
use herald_core::{HeraldError, Result};
use herald_runtime::metrics::{PollMetrics, RepresentationMetrics};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::time::Duration;
use tokio::sync::{watch, OnceCell};
use tokio::time::MissedTickBehavior;

/// Profile and box art, fetched at most once per `update-stream` job.
type Extras = (Option<SubjectProfile>, Option<String>);

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Followed subjects polled.
    pub subjects: usize,
    /// Subjects reported online, sorted.
    pub online: Vec<String>,
    /// Subjects a `remove-stream` job was enqueued for, sorted.
    pub retired: Vec<String>,
    /// Status batches that failed.
    pub failed_batches: usize,
}

/// Per-follow facts an announcement needs.
struct Announcement<'a> {
    follow: &'a Follow,
    extras: &'a OnceCell<Extras>,
}

impl<M, S, C, L, F, E, Q, K> EngineEnvironment<M, S, C, L, F, E, Q, K>
where
    M: MessagingClient + Clone,
    S: StatusApi + Clone,
    C: ConfigurationStore + Clone,
    L: LinkStore + Clone,
    F: FollowRegistry + Clone,
    E: EphemeralStore + Clone,
    Q: JobQueue + Clone,
    K: Clock + Clone,
{
    /// Run one discovery cycle.
    ///
    /// A failed batch is logged and skipped: its members are neither
    /// refreshed nor retired this cycle, since a timeout is not an offline.
    ///
    /// # Errors
    ///
    /// Returns error if the follow registry or the store cannot be read.
    pub async fn poll_once(&self) -> Result<PollReport> {
        let subjects = self.follows.subjects().await?;
        let previously = self.active_subjects().await?;

        let mut report = PollReport {
            subjects: subjects.len(),
            ..PollReport::default()
        };
        let mut online = BTreeSet::new();
        let mut unknown = HashSet::new();

        for batch in subjects.chunks(S::MAX_BATCH.max(1)) {
            match self.status.streams(batch).await {
                Ok(streams) => {
                    for stream in streams {
                        if !online.insert(stream.subject()) {
                            continue;
                        }
                        let user = stream.user_login.clone();
                        let payload = JobPayload::UpdateStream { stream };
                        if let Err(e) = self.scheduler.enqueue(&payload, Duration::ZERO).await {
                            tracing::warn!(user, error = %e, "Failed to enqueue stream update");
                        }
                    }
                }
                Err(e) => {
                    PollMetrics::record_batch_error();
                    report.failed_batches += 1;
                    tracing::warn!(size = batch.len(), error = %e, "Status batch failed, skipping its subjects");
                    unknown.extend(batch.iter().map(|subject| subject.to_lowercase()));
                }
            }
        }

        for subject in previously {
            if online.contains(&subject) || unknown.contains(&subject) {
                continue;
            }
            let payload = JobPayload::RemoveStream { user: subject.clone() };
            match self.scheduler.enqueue(&payload, Duration::ZERO).await {
                Ok(_) => report.retired.push(subject),
                Err(e) => tracing::warn!(user = %subject, error = %e, "Failed to enqueue stream removal"),
            }
        }

        PollMetrics::record_cycle(online.len());
        report.online = online.into_iter().collect();
        tracing::info!(
            subjects = report.subjects,
            online = report.online.len(),
            retired = report.retired.len(),
            failed_batches = report.failed_batches,
            "Liveness poll finished"
        );
        Ok(report)
    }

    /// Poll every `poll_interval` until `shutdown` flips to `true`.
    pub async fn run_poller(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_secs = self.config.poll_interval.as_secs(), "Liveness poller started");
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::warn!(error = %e, "Liveness poll failed");
                    }
                }
            }
        }

        tracing::info!("Liveness poller stopped");
    }

    /// Announce or refresh `stream` in every following channel
    /// (`update-stream` job).
    ///
    /// Channels are handled independently; one failing does not stop the
    /// others.
    ///
    /// # Errors
    ///
    /// Returns the first retryable per-channel error, after every channel was
    /// attempted, or a registry error.
    pub async fn update_stream(&self, stream: &StreamStatus) -> Result<()> {
        let subject = stream.subject();
        let targets = self.follows.targets(&subject).await?;
        if targets.is_empty() {
            tracing::debug!(subject, "Stream has no followers");
            return Ok(());
        }

        let extras = OnceCell::new();
        let mut first_error = None;
        for follow in &targets {
            let announcement = Announcement {
                follow,
                extras: &extras,
            };
            if let Err(e) = self.update_target(stream, &announcement).await {
                tracing::warn!(
                    subject,
                    channel = %follow.location_id,
                    error = %e,
                    "Failed to update stream announcement"
                );
                if e.is_retryable() && first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Re-poll one announcement (`refresh-stream` job).
    ///
    /// Refreshes and re-chains while the subject is online; finalizes and
    /// ends the chain once it is not. A missing record ends the chain.
    ///
    /// # Errors
    ///
    /// - [`HeraldError::MalformedPayload`] if `key` is not an active stream key
    /// - the status API's error, so the job retries instead of finalizing
    pub async fn refresh_stream(&self, key: &str) -> Result<()> {
        let (subject, _location) = keys::parse_active_stream(key)
            .ok_or_else(|| HeraldError::malformed("refresh-stream", format!("not an active stream key: {key}")))?;

        let Some(record) = self.load_record(key).await? else {
            tracing::debug!(key, "Announcement no longer tracked, ending refresh chain");
            return Ok(());
        };

        let streams = self.status.streams(std::slice::from_ref(&subject)).await?;
        let current = streams.into_iter().find(|stream| stream.subject() == subject);

        let mut state = LiveState::from_record(Some(record));
        let effects = LiveReducer.reduce(&mut state, LiveAction::Polled(current));
        self.run_live_effects(key, &mut state, effects, None).await
    }

    /// Finalize every announcement of `user` (`remove-stream` job).
    ///
    /// # Errors
    ///
    /// Returns the first retryable per-announcement error, after every
    /// announcement was attempted, or a store error.
    pub async fn remove_stream(&self, user: &str) -> Result<()> {
        let active = self.store.keys(&keys::active_stream_pattern(user)).await?;
        let mut first_error = None;

        for key in active {
            let state = self.load_record(&key).await.map(LiveState::from_record);
            let result = match state {
                Ok(mut state) => {
                    let effects = LiveReducer.reduce(&mut state, LiveAction::Offline);
                    self.run_live_effects(&key, &mut state, effects, None).await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!(key, error = %e, "Failed to retire stream announcement");
                if e.is_retryable() && first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn update_target(&self, stream: &StreamStatus, announcement: &Announcement<'_>) -> Result<()> {
        let key = keys::active_stream(&stream.user_login, &announcement.follow.location_id);
        let mut state = LiveState::from_record(self.load_record(&key).await?);
        let effects = LiveReducer.reduce(&mut state, LiveAction::Online(stream.clone()));
        self.run_live_effects(&key, &mut state, effects, Some(announcement)).await
    }

    async fn run_live_effects(
        &self,
        key: &str,
        state: &mut LiveState,
        effects: Effects<LiveEffect>,
        announcement: Option<&Announcement<'_>>,
    ) -> Result<()> {
        let mut pending: VecDeque<LiveEffect> = effects.into_iter().collect();

        while let Some(effect) = pending.pop_front() {
            match effect {
                LiveEffect::Announce(stream) => {
                    let Some(announcement) = announcement else {
                        return Err(HeraldError::Internal("announcement outside update-stream".into()));
                    };
                    pending.extend(self.announce(key, state, &stream, announcement).await?);
                }
                LiveEffect::Refresh { record, stream } => {
                    match self.refresh_announcement(&record, &stream).await {
                        Ok(()) => RepresentationMetrics::record("stream", "update"),
                        Err(e) if e.is_not_found() => {
                            tracing::warn!(key, error = %e, "Announcement gone, forgetting it");
                            pending.clear();
                            pending.extend(LiveReducer.reduce(state, LiveAction::TargetGone));
                        }
                        Err(e) => return Err(e),
                    }
                }
                LiveEffect::Persist(record) => self.store.hset(key, &record.to_fields()).await?,
                LiveEffect::ScheduleRefresh => self.schedule_refresh(key).await?,
                LiveEffect::ResumeRefresh => {
                    if !self.refresh_pending(key).await? {
                        tracing::info!(key, "Refresh chain lost, resuming it");
                        self.schedule_refresh(key).await?;
                    }
                }
                LiveEffect::Finalize(record) => self.finalize_announcement(&record).await?,
                LiveEffect::Forget => {
                    self.store.del(key).await?;
                    self.store.del(&chain_key(key)?).await?;
                    tracing::debug!(key, "Forgot announcement");
                }
            }
        }
        Ok(())
    }

    async fn schedule_refresh(&self, key: &str) -> Result<()> {
        let payload = JobPayload::RefreshStream { key: key.to_string() };
        let id = self.scheduler.enqueue(&payload, self.config.repoll_delay).await?;
        self.store
            .set_ex(&chain_key(key)?, &id.to_string(), self.config.chain_ttl())
            .await
    }

    async fn refresh_pending(&self, key: &str) -> Result<bool> {
        let Some(raw) = self.store.get(&chain_key(key)?).await? else {
            return Ok(false);
        };
        match JobId::parse(&raw) {
            Some(id) => self.scheduler.is_queued(&id).await,
            None => Ok(false),
        }
    }

    async fn announce(
        &self,
        key: &str,
        state: &mut LiveState,
        stream: &StreamStatus,
        announcement: &Announcement<'_>,
    ) -> Result<Effects<LiveEffect>> {
        let follow = announcement.follow;
        let claim = keys::twitch_claim(&stream.user_login, &follow.location_id);
        if !self.store.set_nx_ex(&claim, "1", self.config.claim_ttl).await? {
            tracing::debug!(key, "Announcement already in progress elsewhere");
            return Ok(Effects::new());
        }

        let result = self.announce_claimed(key, state, stream, announcement).await;
        if let Err(e) = self.store.del(&claim).await {
            tracing::warn!(key, error = %e, "Failed to release announcement claim");
        }
        result
    }

    async fn announce_claimed(
        &self,
        key: &str,
        state: &mut LiveState,
        stream: &StreamStatus,
        announcement: &Announcement<'_>,
    ) -> Result<Effects<LiveEffect>> {
        // Another job may have announced between our read and the claim.
        if let Some(record) = self.load_record(key).await? {
            state.record = Some(record);
            return Ok(LiveReducer.reduce(state, LiveAction::Online(stream.clone())));
        }

        let follow = announcement.follow;
        let (profile, box_art) = announcement
            .extras
            .get_or_init(|| self.fetch_extras(stream))
            .await;
        let content = render::live_announcement(stream, profile.as_ref(), box_art.as_deref(), &follow.mentions);

        let representation_id = match self.messaging.send(&follow.location_id, &content).await {
            Ok(id) => id,
            Err(e) if e.is_not_found() => {
                tracing::warn!(channel = %follow.location_id, subject = %stream.subject(), "Announcement channel is gone");
                return Ok(Effects::new());
            }
            Err(e) => return Err(e),
        };

        RepresentationMetrics::record("stream", "create");
        tracing::info!(
            subject = %stream.subject(),
            channel = %follow.location_id,
            message_id = %representation_id,
            "Announced live stream"
        );

        let record = ActiveStatusRecord {
            subject: stream.subject(),
            location_id: follow.location_id.clone(),
            guild_id: follow.guild_id.clone(),
            representation_id,
            external_ref_id: stream.id.clone(),
            started_at: stream.started_at,
        };
        Ok(LiveReducer.reduce(state, LiveAction::Announced(record)))
    }

    async fn fetch_extras(&self, stream: &StreamStatus) -> Extras {
        let profile = self.status.profile(&stream.user_login).await.unwrap_or_else(|e| {
            tracing::warn!(subject = %stream.subject(), error = %e, "Failed to fetch profile");
            None
        });
        let box_art = self.status.category_art(&stream.game_id).await.unwrap_or_else(|e| {
            tracing::warn!(game_id = %stream.game_id, error = %e, "Failed to fetch box art");
            None
        });
        (profile, box_art)
    }

    async fn refresh_announcement(&self, record: &ActiveStatusRecord, stream: &StreamStatus) -> Result<()> {
        let message = self
            .messaging
            .fetch(&record.location_id, &record.representation_id)
            .await?;
        let embed = message.embeds.into_iter().next().unwrap_or_default();
        let content = MessageContent::embeds(vec![render::refresh_embed(embed, stream)]);
        self.messaging
            .edit(&record.location_id, &record.representation_id, &content)
            .await
    }

    async fn finalize_announcement(&self, record: &ActiveStatusRecord) -> Result<()> {
        let edited = async {
            let message = self
                .messaging
                .fetch(&record.location_id, &record.representation_id)
                .await?;
            let embed = message.embeds.into_iter().next().unwrap_or_default();
            let embed = render::offline_embed(embed, &record.subject, &record.external_ref_id);
            self.messaging
                .edit(&record.location_id, &record.representation_id, &MessageContent::embeds(vec![embed]))
                .await
        }
        .await;

        match edited {
            Ok(()) => {
                RepresentationMetrics::record("stream", "finalize");
                tracing::info!(
                    subject = %record.subject,
                    channel = %record.location_id,
                    "Finalized stream announcement"
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    subject = %record.subject,
                    channel = %record.location_id,
                    error = %e,
                    "Announcement gone before its final edit"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn load_record(&self, key: &str) -> Result<Option<ActiveStatusRecord>> {
        let fields = self.store.hgetall(key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        match ActiveStatusRecord::from_fields(&fields) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(key, error = %e, "Removing malformed active stream record");
                self.store.del(key).await?;
                Ok(None)
            }
        }
    }

    async fn active_subjects(&self) -> Result<BTreeSet<String>> {
        let active = self.store.keys(keys::ACTIVE_STREAM_ALL).await?;
        Ok(active
            .iter()
            .filter_map(|key| keys::parse_active_stream(key))
            .map(|(subject, _)| subject)
            .collect())
    }
}

fn chain_key(active_key: &str) -> Result<String> {
    keys::parse_active_stream(active_key)
        .map(|(subject, location)| keys::refresh_chain(&subject, &location))
        .ok_or_else(|| HeraldError::Internal(format!("not an active stream key: {active_key}")))
}
