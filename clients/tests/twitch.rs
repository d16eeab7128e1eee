//! Twitch client against a mock HTTP server.

#![allow(clippy::unwrap_used)]

use herald_clients::{HttpClientConfig, TwitchClient, TOKEN_KEY};
use herald_core::providers::{EphemeralStore, StatusApi};
use herald_testing::mocks::InMemoryEphemeralStore;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, store: InMemoryEphemeralStore) -> TwitchClient<InMemoryEphemeralStore> {
    TwitchClient::new("cid", "csecret", store, &HttpClientConfig::default())
        .unwrap()
        .with_urls(
            format!("{}/helix", server.uri()),
            format!("{}/oauth2/token", server.uri()),
        )
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(query_param("grant_type", "client_credentials"))
        .and(query_param("client_id", "cid"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "tok", "expires_in": 3600, "token_type": "bearer" })),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn stream(login: &str) -> serde_json::Value {
    json!({
        "id": "4001",
        "user_id": "77",
        "user_login": login,
        "user_name": "Nyx",
        "game_id": "509",
        "game_name": "Celeste",
        "type": "live",
        "title": "any%",
        "viewer_count": 12,
        "started_at": "2025-01-01T10:00:00Z",
        "language": "en",
        "thumbnail_url": "https://cdn/live_user_nyx-{width}x{height}.jpg",
        "tag_ids": [],
        "tags": ["speedrun"],
        "is_mature": false
    })
}

#[tokio::test]
async fn streams_share_one_cached_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/helix/streams"))
        .and(header("Client-Id", "cid"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [stream("nyx")], "pagination": {} })))
        .expect(2)
        .mount(&server)
        .await;

    let store = InMemoryEphemeralStore::new();
    let client = client(&server, store.clone());

    let subjects = vec!["nyx".to_string(), "vela".to_string()];
    let online = client.streams(&subjects).await.unwrap();
    assert_eq!(online.len(), 1);
    assert_eq!(online[0].subject(), "nyx");
    assert_eq!(online[0].viewer_count, 12);

    client.streams(&subjects).await.unwrap();
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("tok"));
}

#[tokio::test]
async fn every_login_is_sent_as_a_repeated_parameter() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/helix/streams"))
        .and(query_param("user_login", "nyx"))
        .and(query_param("user_login", "vela"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, InMemoryEphemeralStore::new());
    let online = client
        .streams(&["nyx".to_string(), "vela".to_string()])
        .await
        .unwrap();
    assert!(online.is_empty());
}

#[tokio::test]
async fn empty_batches_skip_the_network() {
    let server = MockServer::start().await;
    mount_token(&server, 0).await;
    let client = client(&server, InMemoryEphemeralStore::new());
    assert!(client.streams(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_tokens_are_dropped_and_retried_later() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/helix/streams"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let store = InMemoryEphemeralStore::new();
    let client = client(&server, store.clone());
    let err = client.streams(&["nyx".to_string()]).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
}

#[tokio::test]
async fn profile_and_box_art() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .and(query_param("login", "nyx"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{
            "id": "77",
            "login": "nyx",
            "display_name": "Nyx",
            "profile_image_url": "https://cdn/nyx.png"
        }] })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/helix/games"))
        .and(query_param("id", "509"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{
            "id": "509",
            "name": "Celeste",
            "box_art_url": "https://cdn/celeste-{width}x{height}.jpg"
        }] })))
        .mount(&server)
        .await;

    let client = client(&server, InMemoryEphemeralStore::new());
    let profile = client.profile("nyx").await.unwrap().unwrap();
    assert_eq!(profile.display_name, "Nyx");
    assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn/nyx.png"));

    assert_eq!(
        client.category_art("509").await.unwrap().as_deref(),
        Some("https://cdn/celeste-285x380.jpg")
    );
    assert_eq!(client.category_art("").await.unwrap(), None);
}
