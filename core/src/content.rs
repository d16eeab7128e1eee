//! Outbound message content.
//!
//! Embed field names follow the messaging surface's JSON so fetched embeds can
//! be edited and sent back without translation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content for a send or an edit.
///
/// `None` fields are left untouched by an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContent {
    /// Plain text.
    pub text: Option<String>,
    /// Embeds; `Some(vec![])` clears them.
    pub embeds: Option<Vec<Embed>>,
    /// Link buttons rendered under the message.
    pub buttons: Vec<LinkButton>,
}

impl MessageContent {
    /// Text-only content (embeds untouched on edit).
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Embed-only content (text untouched on edit).
    #[must_use]
    pub fn embeds(embeds: Vec<Embed>) -> Self {
        Self {
            embeds: Some(embeds),
            ..Self::default()
        }
    }

    /// Add a link button.
    #[must_use]
    pub fn with_button(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.buttons.push(LinkButton {
            label: label.into(),
            url: url.into(),
        });
        self
    }
}

/// A button that opens a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkButton {
    /// Button label.
    pub label: String,
    /// Target URL.
    pub url: String,
}

/// Rich embed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    /// Title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Title link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Side colour as `0xRRGGBB`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    /// Timestamp shown in the footer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Author line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    /// Footer line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    /// Large image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedMedia>,
    /// Small image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedMedia>,
    /// Name/value fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

/// Embed author line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    /// Name.
    pub name: String,
    /// Icon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// Link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Embed footer line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    /// Footer text.
    pub text: String,
}

/// Embed image or thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedMedia {
    /// Image URL.
    pub url: String,
}

/// Embed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: String,
    /// Render side by side.
    #[serde(default)]
    pub inline: bool,
}

impl EmbedField {
    /// Inline field.
    #[must_use]
    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_parts_are_not_serialized() {
        let embed = Embed {
            title: Some("Speedrun".into()),
            ..Embed::default()
        };
        let json = serde_json::to_value(&embed).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "Speedrun" }));
    }

    #[test]
    fn fetched_embed_parses_without_optional_parts() {
        let embed: Embed = serde_json::from_value(serde_json::json!({
            "type": "rich",
            "fields": [{ "name": "Game", "value": "Celeste" }]
        }))
        .unwrap();
        assert_eq!(embed.fields[0].value, "Celeste");
        assert!(!embed.fields[0].inline);
    }
}
