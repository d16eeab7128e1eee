//! Fixture builders for messages, streams and follows.

use crate::epoch;
use herald_core::model::{Follow, Message, MessageAuthor, SourceEntity, StreamStatus};

/// A stream status for `login` with the given viewer count.
#[must_use]
pub fn stream(login: &str, viewers: u64) -> StreamStatus {
    StreamStatus {
        id: format!("{login}-vod"),
        user_id: format!("{login}-id"),
        user_login: login.to_string(),
        user_name: capitalize(login),
        game_id: "509658".to_string(),
        game_name: "Just Chatting".to_string(),
        title: format!("{login} live"),
        viewer_count: viewers,
        started_at: epoch(),
        thumbnail_url: format!("https://static-cdn.jtvnw.net/previews-ttv/live_user_{login}-{{width}}x{{height}}.jpg"),
        language: "en".to_string(),
        tags: Vec::new(),
        is_mature: false,
    }
}

/// A follow of `subject` from `location_id` in guild `g1`.
#[must_use]
pub fn follow(location_id: &str, subject: &str) -> Follow {
    Follow {
        guild_id: "g1".to_string(),
        location_id: location_id.to_string(),
        subject: subject.to_string(),
        mentions: Vec::new(),
    }
}

/// A plain text message posted by `author_id`.
#[must_use]
pub fn message(channel_id: &str, id: &str, author_id: &str, content: &str) -> Message {
    Message {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        author: MessageAuthor {
            id: author_id.to_string(),
            display_name: format!("user-{author_id}"),
            avatar_url: Some(format!("https://cdn.example/avatars/{author_id}.png")),
        },
        content: content.to_string(),
        embeds: Vec::new(),
        attachments: Vec::new(),
        timestamp: epoch(),
        referenced: None,
    }
}

/// The source entity matching [`message`] in guild `g1`.
#[must_use]
pub fn source(channel_id: &str, id: &str, author_id: &str) -> SourceEntity {
    SourceEntity {
        id: id.to_string(),
        owner_id: author_id.to_string(),
        location_id: channel_id.to_string(),
        thread_id: None,
        guild_id: "g1".to_string(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}
