//! TestFlow server binary
//!
//! Loads the configuration, prepares the database and serves the REST API.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use testflow::api::{create_router, AppState};
use testflow::config::{SecurityState, ServerConfig};
use testflow::db::repositories::SettingsRepository;
use testflow::db::{seed_defaults, DatabaseConnection};
use testflow::pipeline::{AgentDirectory, AgentOrchestrator, OpenAiClientFactory};
use testflow::services::GenerationService;
use testflow::tasks::{AdmissionGate, TaskRegistry, TaskRunner};
use tracing_subscriber::EnvFilter;

/// Upper bound for a single upstream request; the executor applies the
/// configured per-call timeout inside it.
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(600);

const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,testflow=debug,tower_http=debug")),
        )
        .init();

    let config = ServerConfig::load().context("failed to load server configuration")?;
    tracing::info!(
        version = testflow::version::VERSION,
        security = ?config.security.mode,
        database = %config.database.url,
        "Starting {}",
        testflow::version::PKG_NAME
    );

    let db = DatabaseConnection::with_max_connections(
        &config.database.url,
        config.database.max_connections,
    )
    .await
    .context("failed to connect to the database")?;
    db.run_migrations().await.context("failed to run migrations")?;
    db.health_check().await?;

    let seeded = seed_defaults(db.pool()).await?;
    if seeded.concurrency {
        SettingsRepository::save_concurrency(db.pool(), &config.concurrency).await?;
    }
    let concurrency = SettingsRepository::load_concurrency(db.pool())
        .await?
        .unwrap_or_else(|| config.concurrency.clone());
    tracing::info!(
        max_concurrent = concurrency.max_concurrent_tasks,
        queue_size = concurrency.queue_size,
        "Concurrency settings loaded"
    );

    let gate = AdmissionGate::new(concurrency);
    let registry = Arc::new(TaskRegistry::new(gate.clone()));
    let deadline = config.pipeline.job_deadline_secs.map(Duration::from_secs);
    let runner = Arc::new(TaskRunner::new(Arc::clone(&registry)).with_deadline(deadline));

    let orchestrator = AgentOrchestrator::new(gate, config.pipeline.clone());
    let factory = Arc::new(OpenAiClientFactory::new(TRANSPORT_TIMEOUT));
    let directory = AgentDirectory::new(db.clone(), factory);
    let generation = GenerationService::new(db.clone(), runner, orchestrator, directory);

    let security = Arc::new(SecurityState::new(config.security.clone()));
    let app = create_router(AppState::new(db, generation, security), &config.server.cors_origins);

    tokio::spawn(prune_finished(registry));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Drop terminal tasks older than a day, once an hour.
async fn prune_finished(registry: Arc<TaskRegistry>) {
    let mut ticker = tokio::time::interval(PRUNE_INTERVAL);
    loop {
        ticker.tick().await;
        let removed = registry.prune_finished(chrono::Duration::hours(24));
        if removed > 0 {
            tracing::debug!(removed = removed, "Pruned finished tasks");
        }
    }
}

/// Signal for graceful shutdown (Ctrl-C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received CTRL-C signal, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM signal, shutting down"),
    }
}
