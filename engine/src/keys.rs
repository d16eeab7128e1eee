//! Ephemeral store key layout.
//!
//! | key                                       | type   | holds                     |
//! |-------------------------------------------|--------|---------------------------|
//! | `starboard:{message}`                     | set    | ids of star reactors      |
//! | `starboard:claim/{message}`               | string | pin creation claim        |
//! | `twitch:active-stream/{subject}/{channel}`| hash   | [`ActiveStatusRecord`]    |
//! | `twitch:claim/{subject}/{channel}`        | string | announcement claim        |
//! | `twitch:chain/{subject}/{channel}`        | string | id of the pending re-poll |
//! | `guild-settings:{guild}/{property}`       | string | cached tenant setting     |
//!
//! [`ActiveStatusRecord`]: herald_core::model::ActiveStatusRecord

/// Pattern matching every active status record.
pub const ACTIVE_STREAM_ALL: &str = "twitch:active-stream/*";

const ACTIVE_STREAM_PREFIX: &str = "twitch:active-stream/";

/// Actor set of a source message.
#[must_use]
pub fn actor_set(message_id: &str) -> String {
    format!("starboard:{message_id}")
}

/// Pin creation claim of a source message.
#[must_use]
pub fn starboard_claim(message_id: &str) -> String {
    format!("starboard:claim/{message_id}")
}

/// Active status record of `subject` in `location_id`.
#[must_use]
pub fn active_stream(subject: &str, location_id: &str) -> String {
    format!("{ACTIVE_STREAM_PREFIX}{}/{location_id}", subject.to_lowercase())
}

/// Pattern matching every active status record of `subject`.
#[must_use]
pub fn active_stream_pattern(subject: &str) -> String {
    format!("{ACTIVE_STREAM_PREFIX}{}/*", subject.to_lowercase())
}

/// Announcement claim of `subject` in `location_id`.
#[must_use]
pub fn twitch_claim(subject: &str, location_id: &str) -> String {
    format!("twitch:claim/{}/{location_id}", subject.to_lowercase())
}

/// Refresh chain marker of `subject` in `location_id`.
#[must_use]
pub fn refresh_chain(subject: &str, location_id: &str) -> String {
    format!("twitch:chain/{}/{location_id}", subject.to_lowercase())
}

/// Cached tenant setting.
#[must_use]
pub fn guild_setting(guild_id: &str, property: &str) -> String {
    format!("guild-settings:{guild_id}/{property}")
}

/// Split an active status key into `(subject, location)`.
#[must_use]
pub fn parse_active_stream(key: &str) -> Option<(String, String)> {
    let rest = key.strip_prefix(ACTIVE_STREAM_PREFIX)?;
    let (subject, location) = rest.split_once('/')?;
    if subject.is_empty() || location.is_empty() || location.contains('/') {
        return None;
    }
    Some((subject.to_string(), location.to_string()))
}
