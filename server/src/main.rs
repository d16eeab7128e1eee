//! herald service binary.
//!
//! Run with: `cargo run --bin herald`
//! Health: `GET http://localhost:8080/health`
//! Metrics: `GET http://localhost:8080/metrics`

use anyhow::Context;
use futures::FutureExt;
use herald_clients::{DiscordClient, TwitchClient};
use herald_core::environment::SystemClock;
use herald_core::providers::EphemeralStore;
use herald_core::HeraldError;
use herald_engine::{register_handlers, EngineEnvironment};
use herald_postgres::{PostgresConfigurationStore, PostgresFollowRegistry, PostgresLinkStore};
use herald_redis::{RedisEphemeralStore, RedisJobQueue};
use herald_runtime::metrics::MetricsServer;
use herald_runtime::retry::{retry_while, RetryPolicy};
use herald_runtime::{HandlerRegistry, HealthCheck, Scheduler, Worker};
use herald_server::{router, AppState, Config, Probe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long background tasks get to finish after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env().context("loading configuration")?;
    tracing::info!(address = %config.bind_address(), "Starting herald");

    let mut metrics = MetricsServer::new();
    if let Err(e) = metrics.start() {
        tracing::warn!(error = %e, "Metrics recorder not installed");
    }

    // Stores
    let startup = RetryPolicy::builder()
        .max_attempts(10)
        .initial_delay(Duration::from_millis(500))
        .max_delay(Duration::from_secs(10))
        .build();

    let pool = retry_while(
        startup.clone(),
        || herald_postgres::connect(&config.postgres.url, config.postgres.max_connections),
        HeraldError::is_retryable,
    )
    .await
    .context("connecting to PostgreSQL")?;
    herald_postgres::migrate(&pool).await.context("running migrations")?;
    tracing::info!("PostgreSQL connected");

    let redis = retry_while(startup, || herald_redis::connect(&config.redis.url), HeraldError::is_retryable)
        .await
        .context("connecting to Redis")?;
    let store = RedisEphemeralStore::from_manager(redis.clone());
    let queue = RedisJobQueue::from_manager(redis);
    tracing::info!("Redis connected");

    // Clients
    let http = config.http_client();
    let discord = DiscordClient::new(config.discord.token.clone(), &http).context("building Discord client")?;
    let twitch = TwitchClient::new(
        config.twitch.client_id.clone(),
        config.twitch.client_secret.clone(),
        store.clone(),
        &http,
    )
    .context("building Twitch client")?;

    let env = EngineEnvironment::new(
        discord,
        twitch,
        PostgresConfigurationStore::new(pool.clone()),
        PostgresLinkStore::new(pool.clone()),
        PostgresFollowRegistry::new(pool.clone()),
        store.clone(),
        Scheduler::new(queue.clone(), SystemClock),
        config.engine_config(),
    );

    let mut registry = HandlerRegistry::new();
    register_handlers(&mut registry, &env);
    let worker = Worker::new(queue, SystemClock, Arc::new(registry), config.worker_config());

    // Background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks: Vec<JoinHandle<()>> = vec![
        tokio::spawn({
            let worker = worker.clone();
            let shutdown = shutdown_rx.clone();
            async move { worker.run(shutdown).await }
        }),
        tokio::spawn({
            let env = env.clone();
            let shutdown = shutdown_rx;
            async move { env.run_poller(shutdown).await }
        }),
    ];

    // HTTP
    let probes: Vec<Probe> = vec![
        Arc::new(move || {
            let pool = pool.clone();
            async move { HealthCheck::from_ping("postgres", herald_postgres::ping(&pool).await) }.boxed()
        }),
        Arc::new(move || {
            let store = store.clone();
            async move { HealthCheck::from_ping("redis", store.ping().await) }.boxed()
        }),
    ];
    let state = AppState {
        app: Arc::new(env),
        dlq: worker.dlq(),
        probes: Arc::new(probes),
        metrics: Some(Arc::new(metrics)),
    };

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("binding {}", config.bind_address()))?;
    tracing::info!(address = %config.bind_address(), "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("Shutting down background tasks");
    let _ = shutdown_tx.send(true);
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, futures::future::join_all(tasks)).await;
    if drained.is_err() {
        tracing::warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Background tasks did not stop in time");
    }

    tracing::info!("herald stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("herald=info,herald_server=info,herald_engine=info,herald_runtime=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
