//! Source entities, link records and status records.
//!
//! Identifiers are the source system's snowflakes and logins, kept as strings.

use crate::content::Embed;
use crate::error::{HeraldError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A tracked message, recorded the first time an ingestion trigger sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntity {
    /// Source message id.
    pub id: String,
    /// Author of the source message.
    pub owner_id: String,
    /// Parent channel.
    pub location_id: String,
    /// Thread the message lives in, if any.
    pub thread_id: Option<String>,
    /// Tenant.
    pub guild_id: String,
}

impl SourceEntity {
    /// Channel that actually holds the message (thread first).
    #[must_use]
    pub fn container_id(&self) -> &str {
        self.thread_id.as_deref().unwrap_or(&self.location_id)
    }
}

/// Durable mapping from a source message to its pinned representation.
///
/// At most one per `source_id`; the identity columns never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Source message id (unique).
    pub source_id: String,
    /// Tenant.
    pub guild_id: String,
    /// Channel of the source message.
    pub location_id: String,
    /// Thread of the source message, if any.
    pub thread_id: Option<String>,
    /// Author of the source message.
    pub owner_id: String,
    /// Channel holding the representation.
    pub representation_location_id: String,
    /// Representation message id.
    pub representation_id: String,
}

/// Result of a create-if-absent insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// This call created the row.
    Inserted(LinkRecord),
    /// A row already existed; it is returned as stored.
    Existing(LinkRecord),
}

impl LinkOutcome {
    /// The stored record, whichever call created it.
    #[must_use]
    pub const fn record(&self) -> &LinkRecord {
        match self {
            Self::Inserted(record) | Self::Existing(record) => record,
        }
    }
}

/// Ephemeral record of a live announcement for `(subject, location)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStatusRecord {
    /// Followed login.
    pub subject: String,
    /// Channel holding the announcement.
    pub location_id: String,
    /// Tenant.
    pub guild_id: String,
    /// Announcement message id.
    pub representation_id: String,
    /// Stream id, used to build the VOD link.
    pub external_ref_id: String,
    /// When the stream started.
    pub started_at: DateTime<Utc>,
}

impl ActiveStatusRecord {
    /// Hash fields as stored in the ephemeral store.
    #[must_use]
    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("channel".to_string(), self.location_id.clone()),
            ("guild".to_string(), self.guild_id.clone()),
            ("message".to_string(), self.representation_id.clone()),
            ("streamer".to_string(), self.subject.clone()),
            ("vod".to_string(), self.external_ref_id.clone()),
            ("started_at".to_string(), self.started_at.to_rfc3339()),
        ]
    }

    /// Parse hash fields, rejecting incomplete records.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Serialization`] when a required field is missing
    /// or the timestamp does not parse.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self> {
        let field = |name: &str| {
            fields
                .get(name)
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| HeraldError::Serialization(format!("active status missing `{name}`")))
        };

        let started_at = match fields.get("started_at") {
            Some(raw) => DateTime::parse_from_rfc3339(raw)
                .map_err(|e| HeraldError::Serialization(format!("invalid started_at: {e}")))?
                .with_timezone(&Utc),
            None => DateTime::<Utc>::UNIX_EPOCH,
        };

        Ok(Self {
            subject: field("streamer")?,
            location_id: field("channel")?,
            guild_id: field("guild")?,
            representation_id: field("message")?,
            external_ref_id: field("vod")?,
            started_at,
        })
    }
}

/// One live stream as reported by the status API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStatus {
    /// Stream id (becomes the VOD reference).
    pub id: String,
    /// Broadcaster id.
    pub user_id: String,
    /// Broadcaster login (the followed subject).
    pub user_login: String,
    /// Broadcaster display name.
    pub user_name: String,
    /// Category id.
    pub game_id: String,
    /// Category name.
    pub game_name: String,
    /// Stream title.
    pub title: String,
    /// Current viewers.
    pub viewer_count: u64,
    /// When the stream started.
    pub started_at: DateTime<Utc>,
    /// Thumbnail template containing `-{width}x{height}`.
    pub thumbnail_url: String,
    /// Broadcast language.
    #[serde(default)]
    pub language: String,
    /// Stream tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Mature flag.
    #[serde(default)]
    pub is_mature: bool,
}

impl StreamStatus {
    /// Normalised subject key (logins are case-insensitive).
    #[must_use]
    pub fn subject(&self) -> String {
        self.user_login.to_lowercase()
    }
}

/// A channel following a streamer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    /// Tenant.
    pub guild_id: String,
    /// Channel receiving announcements.
    pub location_id: String,
    /// Followed login.
    pub subject: String,
    /// Roles or users mentioned with each announcement.
    #[serde(default)]
    pub mentions: Vec<String>,
}

/// Per-tenant settings stored in the configuration table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// Channel receiving starboard pins.
    StarboardChannel,
    /// Reactions required before pinning.
    StarboardCount,
}

impl SettingKey {
    /// Property name as stored.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::StarboardChannel => "starboard-channel",
            Self::StarboardCount => "starboard-count",
        }
    }

    /// Parse a stored property name.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Config`] for unknown properties.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "starboard-channel" => Ok(Self::StarboardChannel),
            "starboard-count" => Ok(Self::StarboardCount),
            _ => Err(HeraldError::Config(format!("Unknown setting: {s}"))),
        }
    }
}

/// Author of a fetched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    /// User id.
    pub id: String,
    /// Name shown in summaries.
    pub display_name: String,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
}

/// A message as fetched from the messaging surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id.
    pub id: String,
    /// Channel (or thread) holding it.
    pub channel_id: String,
    /// Author.
    pub author: MessageAuthor,
    /// Text content.
    pub content: String,
    /// Embeds attached to the message.
    pub embeds: Vec<Embed>,
    /// Attachment URLs, in order.
    pub attachments: Vec<String>,
    /// When it was posted.
    pub timestamp: DateTime<Utc>,
    /// The message this one replies to, if any.
    pub referenced: Option<Box<Message>>,
}

/// A channel as fetched from the messaging surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel id.
    pub id: String,
    /// Channel name (without `#`).
    pub name: String,
}

/// Profile data for a followed subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProfile {
    /// Login.
    pub login: String,
    /// Display name.
    pub display_name: String,
    /// Avatar URL.
    pub avatar_url: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record() -> ActiveStatusRecord {
        ActiveStatusRecord {
            subject: "nyx".into(),
            location_id: "200".into(),
            guild_id: "100".into(),
            representation_id: "300".into(),
            external_ref_id: "4001".into(),
            started_at: DateTime::parse_from_rfc3339("2025-01-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn active_status_survives_hash_storage() {
        let fields: HashMap<_, _> = record().to_fields().into_iter().collect();
        assert_eq!(ActiveStatusRecord::from_fields(&fields).unwrap(), record());
    }

    #[test]
    fn incomplete_hash_is_rejected() {
        let mut fields: HashMap<_, _> = record().to_fields().into_iter().collect();
        fields.remove("message");
        assert!(ActiveStatusRecord::from_fields(&fields).is_err());
        assert!(ActiveStatusRecord::from_fields(&HashMap::new()).is_err());
    }

    #[test]
    fn container_prefers_thread() {
        let mut source = SourceEntity {
            id: "1".into(),
            owner_id: "2".into(),
            location_id: "3".into(),
            thread_id: None,
            guild_id: "4".into(),
        };
        assert_eq!(source.container_id(), "3");
        source.thread_id = Some("5".into());
        assert_eq!(source.container_id(), "5");
    }

    #[test]
    fn setting_keys_parse() {
        assert_eq!(SettingKey::parse("starboard-count").unwrap(), SettingKey::StarboardCount);
        assert!(SettingKey::parse("prefix").is_err());
    }
}
