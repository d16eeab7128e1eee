//! Discord REST client.

use crate::{check, transport_error, HttpClientConfig};
use chrono::{DateTime, Utc};
use herald_core::content::{Embed, LinkButton, MessageContent};
use herald_core::model::{Channel, Message, MessageAuthor};
use herald_core::providers::MessagingClient;
use herald_core::Result;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const API_URL: &str = "https://discord.com/api/v10";
const CDN_URL: &str = "https://cdn.discordapp.com";
/// Largest page the reactions endpoint returns.
const REACTION_PAGE: usize = 100;

/// Discord messaging client authenticated as a bot.
#[derive(Clone)]
pub struct DiscordClient {
    http: Client,
    token: String,
    api_url: String,
}

impl DiscordClient {
    /// Create a client for the public API.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, config: &HttpClientConfig) -> Result<Self> {
        Ok(Self {
            http: config.build()?,
            token: token.into(),
            api_url: API_URL.to_string(),
        })
    }

    /// Point the client at another base URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.api_url))
            .header("Authorization", format!("Bot {}", self.token))
    }
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    avatar: Option<String>,
}

impl From<WireUser> for MessageAuthor {
    fn from(user: WireUser) -> Self {
        let avatar_url = user
            .avatar
            .as_ref()
            .map(|hash| format!("{CDN_URL}/avatars/{}/{hash}.png", user.id));
        Self {
            display_name: user.global_name.unwrap_or(user.username),
            id: user.id,
            avatar_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    channel_id: String,
    author: WireUser,
    #[serde(default)]
    content: String,
    #[serde(default)]
    embeds: Vec<Embed>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    referenced_message: Option<Box<WireMessage>>,
}

impl From<WireMessage> for Message {
    fn from(message: WireMessage) -> Self {
        Self {
            id: message.id,
            channel_id: message.channel_id,
            author: message.author.into(),
            content: message.content,
            embeds: message.embeds,
            attachments: message.attachments.into_iter().map(|a| a.url).collect(),
            timestamp: message.timestamp,
            referenced: message.referenced_message.map(|m| Box::new(Self::from(*m))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embeds: Option<&'a [Embed]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    components: Option<Value>,
}

/// One action row of link buttons (component type 2, style 5).
fn components(buttons: &[LinkButton]) -> Option<Value> {
    if buttons.is_empty() {
        return None;
    }
    let row: Vec<Value> = buttons
        .iter()
        .map(|b| json!({ "type": 2, "style": 5, "label": b.label, "url": b.url }))
        .collect();
    Some(json!([{ "type": 1, "components": row }]))
}

fn payload(content: &MessageContent) -> Payload<'_> {
    Payload {
        content: content.text.as_deref(),
        embeds: content.embeds.as_deref(),
        components: components(&content.buttons),
    }
}

impl MessagingClient for DiscordClient {
    async fn send(&self, location_id: &str, content: &MessageContent) -> Result<String> {
        let response = self
            .request(Method::POST, &format!("/channels/{location_id}/messages"))
            .json(&payload(content))
            .send()
            .await
            .map_err(|e| transport_error("send message", &e))?;

        let created: Created = check(response, "channel", location_id)
            .await?
            .json()
            .await
            .map_err(|e| transport_error("decode sent message", &e))?;

        tracing::debug!(channel_id = location_id, message_id = %created.id, "Message sent");
        Ok(created.id)
    }

    async fn edit(&self, location_id: &str, message_id: &str, content: &MessageContent) -> Result<()> {
        let response = self
            .request(
                Method::PATCH,
                &format!("/channels/{location_id}/messages/{message_id}"),
            )
            .json(&payload(content))
            .send()
            .await
            .map_err(|e| transport_error("edit message", &e))?;

        check(response, "message", message_id).await?;
        Ok(())
    }

    async fn fetch(&self, location_id: &str, message_id: &str) -> Result<Message> {
        let response = self
            .request(
                Method::GET,
                &format!("/channels/{location_id}/messages/{message_id}"),
            )
            .send()
            .await
            .map_err(|e| transport_error("fetch message", &e))?;

        let message: WireMessage = check(response, "message", message_id)
            .await?
            .json()
            .await
            .map_err(|e| transport_error("decode message", &e))?;
        Ok(message.into())
    }

    async fn delete(&self, location_id: &str, message_id: &str) -> Result<()> {
        let response = self
            .request(
                Method::DELETE,
                &format!("/channels/{location_id}/messages/{message_id}"),
            )
            .send()
            .await
            .map_err(|e| transport_error("delete message", &e))?;

        check(response, "message", message_id).await?;
        Ok(())
    }

    async fn channel(&self, location_id: &str) -> Result<Channel> {
        let response = self
            .request(Method::GET, &format!("/channels/{location_id}"))
            .send()
            .await
            .map_err(|e| transport_error("fetch channel", &e))?;

        let channel: WireChannel = check(response, "channel", location_id)
            .await?
            .json()
            .await
            .map_err(|e| transport_error("decode channel", &e))?;
        Ok(Channel {
            name: channel.name.unwrap_or_else(|| channel.id.clone()),
            id: channel.id,
        })
    }

    async fn reactors(&self, location_id: &str, message_id: &str, emoji: &str) -> Result<Vec<String>> {
        let path = format!(
            "/channels/{location_id}/messages/{message_id}/reactions/{}",
            urlencoding::encode(emoji)
        );
        let limit = REACTION_PAGE.to_string();
        let mut users = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![("limit", limit.as_str())];
            if let Some(after) = after.as_deref() {
                query.push(("after", after));
            }

            let response = self
                .request(Method::GET, &path)
                .query(&query)
                .send()
                .await
                .map_err(|e| transport_error("list reactions", &e))?;

            let page: Vec<WireUser> = check(response, "message", message_id)
                .await?
                .json()
                .await
                .map_err(|e| transport_error("decode reactions", &e))?;

            let full = page.len() >= REACTION_PAGE;
            after = page.last().map(|user| user.id.clone());
            users.extend(page.into_iter().map(|user| user.id));

            if !full || after.is_none() {
                break;
            }
        }

        Ok(users)
    }
}

impl std::fmt::Debug for DiscordClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordClient")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
