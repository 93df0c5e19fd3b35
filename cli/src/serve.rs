// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Long-lived engine process: store wiring, startup recovery, queue
//! processor, and the HTTP API with graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use relay_core::application::engine::ExecutionEngine;
use relay_core::application::queue::{recover_interrupted, QueueProcessor};
use relay_core::domain::repository::{ExecutionRepository, WorkflowRepository};
use relay_core::infrastructure::db::Database;
use relay_core::infrastructure::integrations::builtin_registry;
use relay_core::infrastructure::repositories::postgres_execution::PostgresExecutionRepository;
use relay_core::infrastructure::repositories::postgres_workflow::PostgresWorkflowRepository;
use relay_core::infrastructure::repositories::InMemoryStore;
use relay_core::presentation::api;

pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub idle_interval_ms: u64,
    pub error_interval_ms: u64,
}

pub async fn run(config: ServeConfig) -> Result<()> {
    let registry = Arc::new(builtin_registry());
    info!(integrations = registry.stats().total, "Integration registry ready");

    let (workflow_repo, execution_repo): (Arc<dyn WorkflowRepository>, Arc<dyn ExecutionRepository>) =
        match config.database_url.as_deref() {
            Some(url) => {
                info!("Connecting to PostgreSQL");
                let db = Database::connect(url).await?;
                db.migrate().await?;
                (
                    Arc::new(PostgresWorkflowRepository::new(db.pool().clone())),
                    Arc::new(PostgresExecutionRepository::new(db.pool().clone())),
                )
            }
            None => {
                warn!("RELAY_DATABASE_URL not set; using the in-memory store (state is lost on exit)");
                let store = InMemoryStore::new();
                (Arc::new(store.clone()), Arc::new(store))
            }
        };

    // Executions stranded in `running` by a previous process are failed now;
    // there is no partial replay.
    let recovered = recover_interrupted(execution_repo.as_ref()).await?;
    if recovered > 0 {
        warn!(count = recovered, "Failed executions interrupted by previous shutdown");
    }

    let engine = Arc::new(ExecutionEngine::new(execution_repo.clone(), registry.clone()));
    let processor = Arc::new(
        QueueProcessor::new(execution_repo.clone(), engine).with_intervals(
            Duration::from_millis(config.idle_interval_ms),
            Duration::from_millis(config.error_interval_ms),
        ),
    );

    let worker = {
        let processor = processor.clone();
        tokio::spawn(async move { processor.run().await })
    };

    let app = api::app(workflow_repo, execution_repo, registry);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // The HTTP server has drained; let the in-flight execution finish before
    // the process exits.
    processor.stop();
    let _ = worker.await;
    info!("Relay shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
