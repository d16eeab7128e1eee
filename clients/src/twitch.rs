//! Twitch Helix client.
//!
//! Uses an app access token obtained with the client-credentials grant. The
//! token is cached in the ephemeral store so every process shares one token
//! and restarts do not mint a new one.

use crate::{check, transport_error, HttpClientConfig};
use herald_core::model::{StreamStatus, SubjectProfile};
use herald_core::providers::{EphemeralStore, StatusApi};
use herald_core::{HeraldError, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const API_URL: &str = "https://api.twitch.tv/helix";
const AUTH_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Ephemeral-store key holding the app access token.
pub const TOKEN_KEY: &str = "twitch:access-token";

/// Tokens are dropped from the cache this long before Twitch expires them.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

/// Box art size requested from the games endpoint.
const BOX_ART_SIZE: &str = "285x380";

/// Twitch Helix client.
#[derive(Clone)]
pub struct TwitchClient<S> {
    http: Client,
    client_id: String,
    client_secret: String,
    store: S,
    api_url: String,
    auth_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    login: String,
    display_name: String,
    #[serde(default)]
    profile_image_url: String,
}

#[derive(Debug, Deserialize)]
struct WireGame {
    #[serde(default)]
    box_art_url: String,
}

impl<S: EphemeralStore> TwitchClient<S> {
    /// Create a client for the public API.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        store: S,
        config: &HttpClientConfig,
    ) -> Result<Self> {
        Ok(Self {
            http: config.build()?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            store,
            api_url: API_URL.to_string(),
            auth_url: AUTH_URL.to_string(),
        })
    }

    /// Point the client at other Helix and token URLs.
    #[must_use]
    pub fn with_urls(mut self, api_url: impl Into<String>, auth_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self.auth_url = auth_url.into();
        self
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.store.get(TOKEN_KEY).await? {
            return Ok(token);
        }

        let response = self
            .http
            .post(&self.auth_url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| transport_error("request twitch token", &e))?;

        let token: TokenResponse = check(response, "twitch token", &self.client_id)
            .await?
            .json()
            .await
            .map_err(|e| transport_error("decode twitch token", &e))?;

        let ttl = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_MARGIN);
        if !ttl.is_zero() {
            self.store.set_ex(TOKEN_KEY, &token.access_token, ttl).await?;
        }
        tracing::info!(expires_in = token.expires_in, "Obtained Twitch app access token");
        Ok(token.access_token)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Page<T>> {
        let token = self.token().await?;
        let request = self
            .http
            .get(format!("{}{path}", self.api_url))
            .header("Client-Id", &self.client_id)
            .bearer_auth(token);

        let response = build(request)
            .send()
            .await
            .map_err(|e| transport_error(path, &e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Revoked or expired early; the retry mints a fresh one.
            self.store.del(TOKEN_KEY).await?;
            return Err(HeraldError::Transient("twitch token rejected".to_string()));
        }

        check(response, "twitch resource", path)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(path, &e))
    }
}

impl<S: EphemeralStore> StatusApi for TwitchClient<S> {
    async fn streams(&self, subjects: &[String]) -> Result<Vec<StreamStatus>> {
        if subjects.is_empty() {
            return Ok(Vec::new());
        }
        let mut query: Vec<(&str, &str)> = vec![("first", "100")];
        query.extend(subjects.iter().map(|login| ("user_login", login.as_str())));

        let page: Page<StreamStatus> = self.get("/streams", |r| r.query(&query)).await?;
        Ok(page.data)
    }

    async fn profile(&self, login: &str) -> Result<Option<SubjectProfile>> {
        let page: Page<WireUser> = self.get("/users", |r| r.query(&[("login", login)])).await?;
        Ok(page.data.into_iter().next().map(|user| SubjectProfile {
            login: user.login,
            display_name: user.display_name,
            avatar_url: Some(user.profile_image_url).filter(|url| !url.is_empty()),
        }))
    }

    async fn category_art(&self, category_id: &str) -> Result<Option<String>> {
        if category_id.is_empty() {
            return Ok(None);
        }
        let page: Page<WireGame> = self.get("/games", |r| r.query(&[("id", category_id)])).await?;
        Ok(page
            .data
            .into_iter()
            .next()
            .map(|game| game.box_art_url.replace("{width}x{height}", BOX_ART_SIZE))
            .filter(|url| !url.is_empty()))
    }
}

impl<S> std::fmt::Debug for TwitchClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchClient")
            .field("client_id", &self.client_id)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}
