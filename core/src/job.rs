//! Job envelope and typed payloads.
//!
//! The queue carries `{name, payload}` verbatim as JSON. Handlers never see raw
//! JSON: the worker decodes the pair into a [`JobPayload`] first and fails
//! closed on any mismatch.
//!
//! | job              | payload                 |
//! |------------------|-------------------------|
//! | `starboard`      | `{"messageId": "..."}`  |
//! | `update-stream`  | `{"stream": {...}}`     |
//! | `refresh-stream` | `{"key": "..."}`        |
//! | `remove-stream`  | `{"user": "..."}`       |

use crate::error::{HeraldError, Result};
use crate::model::StreamStatus;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id previously rendered with `Display`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registered job names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobName {
    /// Create or update a starboard pin.
    Starboard,
    /// Announce or refresh a stream for all its followers.
    UpdateStream,
    /// Self-chaining re-poll of one active announcement.
    RefreshStream,
    /// Finalise every announcement of a subject that went offline.
    RemoveStream,
}

impl JobName {
    /// All job names, for registration checks.
    pub const ALL: [Self; 4] = [
        Self::Starboard,
        Self::UpdateStream,
        Self::RefreshStream,
        Self::RemoveStream,
    ];

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Starboard => "starboard",
            Self::UpdateStream => "update-stream",
            Self::RefreshStream => "refresh-stream",
            Self::RemoveStream => "remove-stream",
        }
    }

    /// Parse a wire name.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::UnknownJob`] for unregistered names.
    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| HeraldError::UnknownJob(s.to_string()))
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of deferred work as stored in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique id.
    pub id: JobId,
    /// Wire name.
    pub name: String,
    /// Raw payload, delivered verbatim.
    pub payload: serde_json::Value,
    /// Earliest execution time.
    pub not_before: DateTime<Utc>,
    /// Number of failed executions so far.
    pub attempt: u32,
}

impl Job {
    /// Build a first-attempt job from a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Serialization`] if the payload cannot be encoded.
    pub fn new(payload: &JobPayload, not_before: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            id: JobId::new(),
            name: payload.name().as_str().to_string(),
            payload: payload.to_value()?,
            not_before,
            attempt: 0,
        })
    }

    /// Validate the envelope into a typed payload.
    ///
    /// # Errors
    ///
    /// See [`JobPayload::decode`].
    pub fn decode(&self) -> Result<JobPayload> {
        JobPayload::decode(&self.name, &self.payload)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StarboardArgs {
    message_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StreamArgs {
    stream: StreamStatus,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct KeyArgs {
    key: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct UserArgs {
    user: String,
}

/// Typed job payloads, one variant per [`JobName`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    /// `starboard {messageId}`
    Starboard {
        /// Source message id.
        message_id: String,
    },
    /// `update-stream {stream}`
    UpdateStream {
        /// Status as fetched by the poller.
        stream: StreamStatus,
    },
    /// `refresh-stream {key}`
    RefreshStream {
        /// Active status key.
        key: String,
    },
    /// `remove-stream {user}`
    RemoveStream {
        /// Subject login.
        user: String,
    },
}

impl JobPayload {
    /// Job name for this payload.
    #[must_use]
    pub const fn name(&self) -> JobName {
        match self {
            Self::Starboard { .. } => JobName::Starboard,
            Self::UpdateStream { .. } => JobName::UpdateStream,
            Self::RefreshStream { .. } => JobName::RefreshStream,
            Self::RemoveStream { .. } => JobName::RemoveStream,
        }
    }

    /// Encode the payload body (without the name).
    ///
    /// # Errors
    ///
    /// Returns [`HeraldError::Serialization`] if encoding fails.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            Self::Starboard { message_id } => serde_json::to_value(StarboardArgs {
                message_id: message_id.clone(),
            }),
            Self::UpdateStream { stream } => serde_json::to_value(StreamArgs {
                stream: stream.clone(),
            }),
            Self::RefreshStream { key } => serde_json::to_value(KeyArgs { key: key.clone() }),
            Self::RemoveStream { user } => serde_json::to_value(UserArgs { user: user.clone() }),
        };
        Ok(value?)
    }

    /// Validate a raw `{name, payload}` pair.
    ///
    /// # Errors
    ///
    /// - [`HeraldError::UnknownJob`] for unregistered names
    /// - [`HeraldError::MalformedPayload`] when the payload does not match the
    ///   job's schema or carries an empty identifier
    pub fn decode(name: &str, payload: &serde_json::Value) -> Result<Self> {
        let job = JobName::parse(name)?;
        let decoded = match job {
            JobName::Starboard => {
                let args: StarboardArgs = parse(job, payload)?;
                Self::Starboard {
                    message_id: non_empty(job, "messageId", args.message_id)?,
                }
            }
            JobName::UpdateStream => {
                let args: StreamArgs = parse(job, payload)?;
                non_empty(job, "stream.user_login", args.stream.user_login.clone())?;
                Self::UpdateStream { stream: args.stream }
            }
            JobName::RefreshStream => {
                let args: KeyArgs = parse(job, payload)?;
                Self::RefreshStream {
                    key: non_empty(job, "key", args.key)?,
                }
            }
            JobName::RemoveStream => {
                let args: UserArgs = parse(job, payload)?;
                Self::RemoveStream {
                    user: non_empty(job, "user", args.user)?,
                }
            }
        };
        Ok(decoded)
    }
}

fn parse<T: DeserializeOwned>(job: JobName, payload: &serde_json::Value) -> Result<T> {
    T::deserialize(payload).map_err(|e| HeraldError::malformed(job.as_str(), e.to_string()))
}

fn non_empty(job: JobName, field: &str, value: String) -> Result<String> {
    if value.trim().is_empty() {
        return Err(HeraldError::malformed(job.as_str(), format!("`{field}` is empty")));
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn stream_json() -> serde_json::Value {
        json!({
            "id": "4001",
            "user_id": "77",
            "user_login": "nyx",
            "user_name": "Nyx",
            "game_id": "509",
            "game_name": "Celeste",
            "title": "any%",
            "viewer_count": 12,
            "started_at": "2025-01-01T10:00:00Z",
            "thumbnail_url": "https://cdn/nyx-{width}x{height}.jpg"
        })
    }

    #[test]
    fn starboard_payload_uses_camel_case() {
        let payload = JobPayload::Starboard { message_id: "42".into() };
        assert_eq!(payload.to_value().unwrap(), json!({ "messageId": "42" }));
        assert_eq!(
            JobPayload::decode("starboard", &json!({ "messageId": "42" })).unwrap(),
            payload
        );
    }

    #[test]
    fn stream_payload_decodes() {
        let decoded = JobPayload::decode("update-stream", &json!({ "stream": stream_json() })).unwrap();
        match decoded {
            JobPayload::UpdateStream { stream } => {
                assert_eq!(stream.user_login, "nyx");
                assert_eq!(stream.viewer_count, 12);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn wrong_shape_is_malformed() {
        let err = JobPayload::decode("starboard", &json!({ "message": "42" })).unwrap_err();
        assert!(err.is_malformed());

        let err = JobPayload::decode("remove-stream", &json!({ "user": "" })).unwrap_err();
        assert!(matches!(err, HeraldError::MalformedPayload { .. }));

        let err = JobPayload::decode("refresh-stream", &json!("twitch:active-stream/a/b")).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = JobPayload::decode("confessions", &json!({})).unwrap_err();
        assert_eq!(err, HeraldError::UnknownJob("confessions".into()));
    }

    #[test]
    fn envelope_carries_name_and_payload() {
        let payload = JobPayload::RemoveStream { user: "nyx".into() };
        let job = Job::new(&payload, Utc::now()).unwrap();
        assert_eq!(job.name, "remove-stream");
        assert_eq!(job.attempt, 0);
        assert_eq!(job.decode().unwrap(), payload);
    }

    fn id_payload() -> impl Strategy<Value = JobPayload> {
        let id = "[A-Za-z0-9:/_-]{1,40}";
        prop_oneof![
            id.prop_map(|message_id| JobPayload::Starboard { message_id }),
            id.prop_map(|key| JobPayload::RefreshStream { key }),
            id.prop_map(|user| JobPayload::RemoveStream { user }),
        ]
    }

    proptest! {
        #[test]
        fn stored_payloads_decode_to_themselves(payload in id_payload()) {
            let job = Job::new(&payload, Utc::now()).unwrap();
            prop_assert_eq!(JobName::parse(&job.name).unwrap(), payload.name());
            prop_assert_eq!(JobPayload::decode(&job.name, &job.payload).unwrap(), payload);
        }

        #[test]
        fn rendered_ids_parse_back(raw in any::<u128>()) {
            let id = JobId(Uuid::from_u128(raw));
            prop_assert_eq!(JobId::parse(&id.to_string()), Some(id));
        }
    }
}
