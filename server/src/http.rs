//! HTTP surface: reaction intake, follow management, health and metrics.
//!
//! ```text
//! POST   /events/reactions             reaction add/remove event
//! PUT    /follows                      follow a streamer from a channel
//! DELETE /follows/:channel/:streamer   stop following
//! GET    /health                       aggregated health (503 when unhealthy)
//! GET    /metrics                      Prometheus exposition
//! ```

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use herald_core::environment::Clock;
use herald_core::job::Job;
use herald_core::model::Follow;
use herald_core::providers::{
    ConfigurationStore, EphemeralStore, FollowRegistry, JobQueue, LinkStore, MessagingClient,
    StatusApi,
};
use herald_core::HeraldError;
use herald_engine::{EngineEnvironment, Ingested, ReactionEvent};
use herald_runtime::metrics::MetricsServer;
use herald_runtime::{DeadLetterQueue, HealthCheck, HealthReport, HealthStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Operations the HTTP surface drives.
pub trait Service: Send + Sync + 'static {
    /// Apply a reaction event.
    fn ingest(&self, event: &ReactionEvent) -> impl Future<Output = herald_core::Result<Ingested>> + Send;

    /// Register or update a follow.
    fn follow(&self, follow: &Follow) -> impl Future<Output = herald_core::Result<()>> + Send;

    /// Remove a follow; `false` if there was none.
    fn unfollow(&self, location_id: &str, subject: &str) -> impl Future<Output = herald_core::Result<bool>> + Send;
}

impl<M, S, C, L, F, E, Q, K> Service for EngineEnvironment<M, S, C, L, F, E, Q, K>
where
    M: MessagingClient + Clone + 'static,
    S: StatusApi + Clone + 'static,
    C: ConfigurationStore + Clone + 'static,
    L: LinkStore + Clone + 'static,
    F: FollowRegistry + Clone + 'static,
    E: EphemeralStore + Clone + 'static,
    Q: JobQueue + Clone + 'static,
    K: Clock + Clone + 'static,
{
    async fn ingest(&self, event: &ReactionEvent) -> herald_core::Result<Ingested> {
        self.ingest_reaction(event).await
    }

    async fn follow(&self, follow: &Follow) -> herald_core::Result<()> {
        self.follows.follow(follow).await
    }

    async fn unfollow(&self, location_id: &str, subject: &str) -> herald_core::Result<bool> {
        self.follows.unfollow(location_id, subject).await
    }
}

/// A dependency health probe.
pub type Probe = Arc<dyn Fn() -> BoxFuture<'static, HealthCheck> + Send + Sync>;

/// State shared by every handler.
pub struct AppState<A> {
    /// The engine.
    pub app: Arc<A>,
    /// Worker dead letters, reported in health.
    pub dlq: DeadLetterQueue<Job>,
    /// Dependency probes (database, cache).
    pub probes: Arc<Vec<Probe>>,
    /// Prometheus recorder, when installed.
    pub metrics: Option<Arc<MetricsServer>>,
}

impl<A> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            app: Arc::clone(&self.app),
            dlq: self.dlq.clone(),
            probes: Arc::clone(&self.probes),
            metrics: self.metrics.clone(),
        }
    }
}

/// Build the router.
pub fn router<A: Service>(state: AppState<A>) -> Router {
    Router::new()
        .route("/events/reactions", post(ingest_reaction::<A>))
        .route("/follows", put(put_follow::<A>))
        .route("/follows/:channel/:streamer", delete(delete_follow::<A>))
        .route("/health", get(health::<A>))
        .route("/metrics", get(metrics::<A>))
        .with_state(state)
}

async fn ingest_reaction<A: Service>(
    State(state): State<AppState<A>>,
    Json(event): Json<ReactionEvent>,
) -> Result<Json<Ingested>, AppError> {
    let outcome = state.app.ingest(&event).await?;
    Ok(Json(outcome))
}

async fn put_follow<A: Service>(
    State(state): State<AppState<A>>,
    Json(follow): Json<Follow>,
) -> Result<StatusCode, AppError> {
    if follow.subject.trim().is_empty() || follow.location_id.is_empty() {
        return Err(AppError::bad_request("channel and streamer are required"));
    }
    state.app.follow(&follow).await?;
    tracing::info!(channel = %follow.location_id, streamer = %follow.subject, "Follow registered");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_follow<A: Service>(
    State(state): State<AppState<A>>,
    Path((channel, streamer)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    if state.app.unfollow(&channel, &streamer).await? {
        tracing::info!(channel, streamer, "Follow removed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("follow", format!("{channel}/{streamer}")))
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    timestamp: DateTime<Utc>,
    checks: Vec<CheckBody>,
}

#[derive(Debug, Serialize)]
struct CheckBody {
    component: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

impl From<HealthReport> for HealthBody {
    fn from(report: HealthReport) -> Self {
        Self {
            status: report.status.as_str(),
            timestamp: report.timestamp,
            checks: report
                .checks
                .into_iter()
                .map(|check| CheckBody {
                    component: check.component,
                    status: check.status.as_str(),
                    message: check.message,
                    metadata: check.metadata.into_iter().collect(),
                })
                .collect(),
        }
    }
}

/// Aggregated health.
///
/// - 200 OK: Healthy or Degraded
/// - 503 Service Unavailable: Unhealthy
async fn health<A: Service>(State(state): State<AppState<A>>) -> (StatusCode, Json<HealthBody>) {
    let mut checks = join_all(state.probes.iter().map(|probe| probe())).await;
    checks.push(state.dlq.health());
    let report = HealthReport::new(checks);

    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report.into()))
}

async fn metrics<A: Service>(State(state): State<AppState<A>>) -> Response {
    match state.metrics.as_ref().and_then(|metrics| metrics.render()) {
        Some(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        None => AppError::unavailable("metrics recorder not installed").into_response(),
    }
}

/// Error response for handlers.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: &'static str,
}

impl AppError {
    /// Create an error.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code,
        }
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", format!("{resource} {id} not found"))
    }

    /// 503 Service Unavailable.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", message)
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

impl From<HeraldError> for AppError {
    fn from(err: HeraldError) -> Self {
        if err.is_not_found() {
            Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
        } else if err.is_malformed() {
            Self::bad_request(err.to_string())
        } else if err.is_retryable() {
            Self::unavailable(err.to_string())
        } else {
            Self::internal(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, code = self.code, message = %self.message, "Request failed");
        }
        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
