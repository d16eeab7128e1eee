//! Discord client against a mock HTTP server.

#![allow(clippy::unwrap_used)]

use herald_clients::{DiscordClient, HttpClientConfig};
use herald_core::content::{Embed, MessageContent};
use herald_core::providers::MessagingClient;
use herald_core::HeraldError;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> DiscordClient {
    DiscordClient::new("secret", &HttpClientConfig::default().with_timeout(Duration::from_millis(300)))
        .unwrap()
        .with_api_url(server.uri())
}

#[tokio::test]
async fn send_posts_text_embeds_and_link_buttons() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/channels/900/messages"))
        .and(header("Authorization", "Bot secret"))
        .and(body_json(json!({
            "content": "⭐ 3",
            "embeds": [{ "description": "hello", "color": 16_748_288 }],
            "components": [{
                "type": 1,
                "components": [{
                    "type": 2,
                    "style": 5,
                    "label": "Go to message",
                    "url": "https://discord.com/channels/1/2/3"
                }]
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "555" })))
        .expect(1)
        .mount(&server)
        .await;

    let content = MessageContent {
        text: Some("⭐ 3".into()),
        embeds: Some(vec![Embed {
            description: Some("hello".into()),
            color: Some(0xFF8F00),
            ..Embed::default()
        }]),
        buttons: Vec::new(),
    }
    .with_button("Go to message", "https://discord.com/channels/1/2/3");

    let id = client(&server).await.send("900", &content).await.unwrap();
    assert_eq!(id, "555");
}

#[tokio::test]
async fn text_only_edits_leave_embeds_alone() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/channels/900/messages/555"))
        .and(body_json(json!({ "content": "⭐ 2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "555" })))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .await
        .edit("900", "555", &MessageContent::text("⭐ 2"))
        .await
        .unwrap();
}

#[tokio::test]
async fn fetch_maps_author_attachments_and_reply() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/200/messages/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "42",
            "channel_id": "200",
            "content": "look at this",
            "timestamp": "2025-01-01T10:00:00.000000+00:00",
            "author": { "id": "7", "username": "nyx", "global_name": "Nyx", "avatar": "abc" },
            "attachments": [{ "id": "1", "url": "https://cdn/img.png" }],
            "embeds": [],
            "referenced_message": {
                "id": "41",
                "channel_id": "200",
                "content": "original",
                "timestamp": "2025-01-01T09:00:00+00:00",
                "author": { "id": "8", "username": "vela", "avatar": null }
            }
        })))
        .mount(&server)
        .await;

    let message = client(&server).await.fetch("200", "42").await.unwrap();
    assert_eq!(message.author.display_name, "Nyx");
    assert_eq!(
        message.author.avatar_url.as_deref(),
        Some("https://cdn.discordapp.com/avatars/7/abc.png")
    );
    assert_eq!(message.attachments, vec!["https://cdn/img.png".to_string()]);
    let reply = message.referenced.unwrap();
    assert_eq!(reply.author.display_name, "vela");
    assert_eq!(reply.author.avatar_url, None);
}

#[tokio::test]
async fn missing_messages_are_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/200/messages/404"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "code": 10008 })))
        .mount(&server)
        .await;

    let err = client(&server).await.fetch("200", "404").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn rate_limits_and_server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/1"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/2"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/3"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = client(&server).await;
    assert!(client.channel("1").await.unwrap_err().is_retryable());
    assert!(client.channel("2").await.unwrap_err().is_retryable());
    assert!(!client.channel("3").await.unwrap_err().is_retryable());
}

#[tokio::test]
async fn slow_responses_time_out_rather_than_vanish() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/200/messages/42"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client(&server).await.fetch("200", "42").await.unwrap_err();
    assert!(matches!(err, HeraldError::Timeout { .. }));
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn reactors_follow_pagination() {
    let server = MockServer::start().await;
    let first: Vec<_> = (0..100)
        .map(|i| json!({ "id": format!("u{i:03}"), "username": "x" }))
        .collect();

    Mock::given(method("GET"))
        .and(path_regex(r"^/channels/200/messages/42/reactions/.+$"))
        .and(query_param("after", "u099"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": "u100", "username": "x" }])),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/channels/200/messages/42/reactions/.+$"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(first)))
        .mount(&server)
        .await;

    let users = client(&server).await.reactors("200", "42", "⭐").await.unwrap();
    assert_eq!(users.len(), 101);
    assert_eq!(users.last().map(String::as_str), Some("u100"));
}

#[tokio::test]
async fn channel_names_are_returned() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "200", "name": "general" })))
        .mount(&server)
        .await;

    let channel = client(&server).await.channel("200").await.unwrap();
    assert_eq!(channel.name, "general");
}
