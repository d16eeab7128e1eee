//! Reaction ingestion and pin reconciliation.
//!
//! ```text
//! reaction add ──► threshold gate ──► record source + SADD actor ──► enqueue `starboard`
//! reaction remove ──► SREM actor ──► count-only edit if pinned
//! `starboard` job ──► resync actors ──► PinReducer ──► claim / send / insert link / edit
//! ```
//!
//! Two jobs for the same message may run at once. Creation is serialized by a
//! claim key and, behind it, the unique link constraint: whichever pin the
//! store keeps wins, and a pin that lost the insert is deleted.

use crate::cache;
use crate::environment::EngineEnvironment;
use crate::keys;
use crate::reducers::{PinAction, PinEffect, PinReducer, PinState};
use crate::render;
use herald_core::environment::Clock;
use herald_core::job::{JobId, JobPayload};
use herald_core::model::{LinkOutcome, LinkRecord, Message, SettingKey, SourceEntity};
use herald_core::providers::{
    ConfigurationStore, EphemeralStore, FollowRegistry, JobQueue, LinkStore, MessagingClient,
    StatusApi,
};
use herald_core::reducer::{Effects, Reducer};
use herald_core::{HeraldError, Result};
use herald_runtime::metrics::RepresentationMetrics;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The only reaction that counts.
pub const STAR: &str = "⭐";

/// Reaction added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    /// A user reacted.
    Add,
    /// A user took their reaction back.
    Remove,
}

/// A reaction notification from the messaging surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// Added or removed.
    pub kind: ReactionKind,
    /// Tenant; direct messages carry none.
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel (or thread) holding the message.
    pub channel_id: String,
    /// Parent channel when `channel_id` is a thread.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Reacted message.
    pub message_id: String,
    /// Author of the reacted message.
    pub author_id: String,
    /// User who reacted.
    pub user_id: String,
    /// Emoji name.
    pub emoji: String,
    /// Reaction count reported with the event.
    #[serde(default)]
    pub count: usize,
}

impl ReactionEvent {
    fn source(&self, guild_id: &str) -> SourceEntity {
        let (location_id, thread_id) = match &self.parent_id {
            Some(parent) => (parent.clone(), Some(self.channel_id.clone())),
            None => (self.channel_id.clone(), None),
        };
        SourceEntity {
            id: self.message_id.clone(),
            owner_id: self.author_id.clone(),
            location_id,
            thread_id,
            guild_id: guild_id.to_string(),
        }
    }
}

/// What ingestion did with an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Ingested {
    /// Not a tracked signal.
    Ignored {
        /// Why the event was skipped.
        reason: &'static str,
    },
    /// Below the tenant threshold.
    BelowThreshold {
        /// Reported count.
        count: usize,
        /// Tenant threshold.
        threshold: usize,
    },
    /// A `starboard` job was enqueued.
    Scheduled {
        /// The job.
        job_id: JobId,
    },
    /// An actor was removed.
    Removed {
        /// Net actor count.
        count: usize,
        /// Whether an existing pin was edited.
        updated: bool,
    },
}

/// Facts a pin creation needs.
struct PinSource<'a> {
    source: &'a SourceEntity,
    message: &'a Message,
    starboard_channel: Option<&'a str>,
    threshold: usize,
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
    /// Apply a reaction event.
    ///
    /// # Errors
    ///
    /// Returns error if a store or the queue is unreachable.
    pub async fn ingest_reaction(&self, event: &ReactionEvent) -> Result<Ingested> {
        if event.emoji != STAR {
            return Ok(Ingested::Ignored { reason: "emoji" });
        }
        let Some(guild_id) = event.guild_id.as_deref() else {
            return Ok(Ingested::Ignored { reason: "no_guild" });
        };

        match event.kind {
            ReactionKind::Add => self.reaction_added(event, guild_id).await,
            ReactionKind::Remove => self.reaction_removed(event).await,
        }
    }

    async fn reaction_added(&self, event: &ReactionEvent, guild_id: &str) -> Result<Ingested> {
        let Some(starboard_channel) = self.setting(guild_id, SettingKey::StarboardChannel).await? else {
            return Ok(Ingested::Ignored { reason: "no_starboard" });
        };
        if event.channel_id == starboard_channel || event.parent_id.as_deref() == Some(starboard_channel.as_str()) {
            return Ok(Ingested::Ignored { reason: "starboard_channel" });
        }

        let threshold = self.threshold(guild_id).await?;
        if event.count < threshold {
            tracing::debug!(message_id = %event.message_id, count = event.count, threshold, "Below starboard threshold");
            return Ok(Ingested::BelowThreshold {
                count: event.count,
                threshold,
            });
        }

        self.links.record_source(&event.source(guild_id)).await?;
        self.store
            .sadd(&keys::actor_set(&event.message_id), std::slice::from_ref(&event.user_id))
            .await?;

        let payload = JobPayload::Starboard {
            message_id: event.message_id.clone(),
        };
        let job_id = self.scheduler.enqueue(&payload, self.config.debounce).await?;
        tracing::debug!(message_id = %event.message_id, %job_id, "Starboard reconcile scheduled");
        Ok(Ingested::Scheduled { job_id })
    }

    async fn reaction_removed(&self, event: &ReactionEvent) -> Result<Ingested> {
        let key = keys::actor_set(&event.message_id);
        self.store.srem(&key, &event.user_id).await?;

        let link = self.links.link(&event.message_id).await?;
        let count = self.store.scard(&key).await?;

        let mut state = PinState::linked(link);
        let effects = PinReducer.reduce(&mut state, PinAction::Removed { count });
        let updated = !effects.is_empty();
        self.run_pin_effects(&mut state, effects, None).await?;

        Ok(Ingested::Removed { count, updated })
    }

    /// Reconcile the pin of one source message (`starboard` job).
    ///
    /// Resynchronises the actor set from the messaging surface, then creates
    /// the pin at threshold or updates its count.
    ///
    /// # Errors
    ///
    /// - [`HeraldError::NotFound`] if the source message is unknown or was
    ///   deleted (its actor set is dropped first)
    /// - [`HeraldError::Transient`] if another job holds the creation claim
    /// - any provider error
    pub async fn reconcile(&self, message_id: &str) -> Result<()> {
        let source = self
            .links
            .source(message_id)
            .await?
            .ok_or_else(|| HeraldError::not_found("source message", message_id))?;
        let key = keys::actor_set(message_id);

        let message = match self.messaging.fetch(source.container_id(), message_id).await {
            Ok(message) => message,
            Err(e) if e.is_not_found() => {
                tracing::info!(message_id, "Source message gone, dropping its actor set");
                if let Err(del) = self.store.del(&key).await {
                    tracing::warn!(message_id, error = %del, "Failed to drop actor set");
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let reactors = self
            .messaging
            .reactors(source.container_id(), message_id, STAR)
            .await?;
        // The snapshot can still predate a removal ingested after the fetch;
        // the next reaction event corrects the count.
        let count = self.store.replace_set(&key, &reactors).await?;

        let starboard_channel = self.setting(&source.guild_id, SettingKey::StarboardChannel).await?;
        let threshold = self.threshold(&source.guild_id).await?;

        let mut state = PinState::linked(self.links.link(message_id).await?);
        let effects = PinReducer.reduce(&mut state, PinAction::Observed { count, threshold });
        tracing::debug!(message_id, count, threshold, effects = effects.len(), "Starboard reconciled");

        let context = PinSource {
            source: &source,
            message: &message,
            starboard_channel: starboard_channel.as_deref(),
            threshold,
        };
        self.run_pin_effects(&mut state, effects, Some(&context)).await
    }

    async fn run_pin_effects(
        &self,
        state: &mut PinState,
        effects: Effects<PinEffect>,
        context: Option<&PinSource<'_>>,
    ) -> Result<()> {
        let mut pending: VecDeque<PinEffect> = effects.into_iter().collect();

        while let Some(effect) = pending.pop_front() {
            match effect {
                PinEffect::Create { count } => {
                    let Some(context) = context else {
                        return Err(HeraldError::Internal("pin creation outside a reconcile job".into()));
                    };
                    pending.extend(self.create_pin(state, context, count).await?);
                }
                PinEffect::UpdateCount { link, count } => self.update_pin(&link, count).await?,
                PinEffect::DeleteOrphan {
                    location_id,
                    representation_id,
                } => self.delete_orphan(&location_id, &representation_id).await,
            }
        }
        Ok(())
    }

    async fn create_pin(&self, state: &mut PinState, context: &PinSource<'_>, count: usize) -> Result<Effects<PinEffect>> {
        let source_id = context.source.id.as_str();
        let Some(starboard_channel) = context.starboard_channel else {
            tracing::info!(message_id = source_id, "Tenant has no starboard channel, not pinning");
            return Ok(Effects::new());
        };

        let claim = keys::starboard_claim(source_id);
        if !self.store.set_nx_ex(&claim, "1", self.config.claim_ttl).await? {
            return Err(HeraldError::Transient(format!(
                "pin creation for {source_id} already in progress"
            )));
        }

        let result = self.create_claimed(state, context, starboard_channel, count).await;
        if let Err(e) = self.store.del(&claim).await {
            tracing::warn!(message_id = source_id, error = %e, "Failed to release pin claim");
        }
        result
    }

    async fn create_claimed(
        &self,
        state: &mut PinState,
        context: &PinSource<'_>,
        starboard_channel: &str,
        count: usize,
    ) -> Result<Effects<PinEffect>> {
        let source = context.source;

        // A job that held the claim before us may have finished.
        if let Some(link) = self.links.link(&source.id).await? {
            state.link = Some(link);
            return Ok(PinReducer.reduce(
                state,
                PinAction::Observed {
                    count,
                    threshold: context.threshold,
                },
            ));
        }

        let channel = self.messaging.channel(source.container_id()).await?;
        let content = render::starboard_pin(context.message, &channel.name, count, &source.guild_id);
        let representation_id = self.messaging.send(starboard_channel, &content).await?;

        let sent = LinkRecord {
            source_id: source.id.clone(),
            guild_id: source.guild_id.clone(),
            location_id: source.location_id.clone(),
            thread_id: source.thread_id.clone(),
            owner_id: source.owner_id.clone(),
            representation_location_id: starboard_channel.to_string(),
            representation_id,
        };

        let outcome = match self.links.insert_link(&sent).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(message_id = %source.id, error = %e, "Failed to store link, removing pin");
                self.delete_orphan(&sent.representation_location_id, &sent.representation_id)
                    .await;
                return Err(e);
            }
        };

        if let LinkOutcome::Inserted(record) = &outcome {
            RepresentationMetrics::record("starboard", "create");
            tracing::info!(
                message_id = %record.source_id,
                pin_id = %record.representation_id,
                count,
                "Pinned message to starboard"
            );
        }
        Ok(PinReducer.reduce(state, PinAction::Linked { sent, outcome }))
    }

    async fn update_pin(&self, link: &LinkRecord, count: usize) -> Result<()> {
        let content = render::starboard_count_edit(count);
        match self
            .messaging
            .edit(&link.representation_location_id, &link.representation_id, &content)
            .await
        {
            Ok(()) => {
                RepresentationMetrics::record("starboard", "update");
                tracing::debug!(message_id = %link.source_id, count, "Updated pin count");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(
                    message_id = %link.source_id,
                    pin_id = %link.representation_id,
                    "Pin was deleted downstream, not recreating"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_orphan(&self, location_id: &str, representation_id: &str) {
        match self.messaging.delete(location_id, representation_id).await {
            Ok(()) => {
                RepresentationMetrics::record("starboard", "orphan_deleted");
                tracing::info!(location_id, pin_id = representation_id, "Deleted duplicate pin");
            }
            Err(e) => {
                tracing::warn!(location_id, pin_id = representation_id, error = %e, "Failed to delete duplicate pin");
            }
        }
    }

    async fn setting(&self, guild_id: &str, key: SettingKey) -> Result<Option<String>> {
        cache::read_setting(&self.settings, &self.store, self.config.settings_cache_ttl, guild_id, key).await
    }

    async fn threshold(&self, guild_id: &str) -> Result<usize> {
        let raw = self.setting(guild_id, SettingKey::StarboardCount).await?;
        Ok(cache::threshold(raw.as_deref(), self.config.default_threshold))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn thread_events_record_the_parent_channel() {
        let event: ReactionEvent = serde_json::from_value(json!({
            "kind": "add",
            "guild_id": "g1",
            "channel_id": "thread-1",
            "parent_id": "10",
            "message_id": "42",
            "author_id": "7",
            "user_id": "8",
            "emoji": "⭐",
            "count": 3
        }))
        .unwrap();

        let source = event.source("g1");
        assert_eq!(source.location_id, "10");
        assert_eq!(source.thread_id.as_deref(), Some("thread-1"));
        assert_eq!(source.container_id(), "thread-1");
    }

    #[test]
    fn outcomes_serialize_with_a_tag() {
        let value = serde_json::to_value(Ingested::BelowThreshold { count: 1, threshold: 3 }).unwrap();
        assert_eq!(value, json!({ "outcome": "below_threshold", "count": 1, "threshold": 3 }));
    }
}
