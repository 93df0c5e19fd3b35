// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Queue Processor
//!
//! The single consumer of pending executions. Each tick atomically claims the
//! oldest pending execution and hands it to the engine; per-tick errors are
//! caught so the loop keeps running. Additional workers are permitted only
//! because the claim itself is atomic.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::application::engine::ExecutionEngine;
use crate::domain::execution::ExecutionStatus;
use crate::domain::repository::ExecutionRepository;

pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_ERROR_INTERVAL: Duration = Duration::from_secs(5);

pub struct QueueProcessor {
    store: Arc<dyn ExecutionRepository>,
    engine: Arc<ExecutionEngine>,
    idle_interval: Duration,
    error_interval: Duration,
    shutdown: CancellationToken,
}

impl QueueProcessor {
    pub fn new(store: Arc<dyn ExecutionRepository>, engine: Arc<ExecutionEngine>) -> Self {
        Self {
            store,
            engine,
            idle_interval: DEFAULT_IDLE_INTERVAL,
            error_interval: DEFAULT_ERROR_INTERVAL,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_intervals(mut self, idle: Duration, error: Duration) -> Self {
        self.idle_interval = idle;
        self.error_interval = error;
        self
    }

    /// Token observers can use to stop the loop; `stop()` is the shorthand.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Cooperative processing loop. Returns once `stop()` is observed; an
    /// in-flight execution finishes before the loop re-checks the flag.
    pub async fn run(&self) {
        info!("Queue processor started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.tick().await {
                Ok(true) => {
                    // Claimed and ran something; look for more work right away.
                }
                Ok(false) => self.sleep(self.idle_interval).await,
                Err(err) => {
                    error!(error = %err, "Queue tick failed");
                    self.sleep(self.error_interval).await;
                }
            }
        }
        info!("Queue processor stopped");
    }

    /// One tick: claim → execute. `Ok(false)` means the queue was empty.
    async fn tick(&self) -> Result<bool> {
        let Some(execution_id) = self.store.claim_next_pending().await? else {
            return Ok(false);
        };
        info!(execution_id = %execution_id, "Claimed queued execution");
        self.engine.execute(execution_id).await?;
        Ok(true)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

/// Startup recovery scan: every execution left `running` by a previous
/// process is terminal-failed. Incomplete runs stay observable; there is no
/// partial replay.
pub async fn recover_interrupted(store: &dyn ExecutionRepository) -> Result<usize> {
    let stuck = store.find_running().await?;
    for execution_id in &stuck {
        warn!(execution_id = %execution_id, "Failing execution interrupted by restart");
        store
            .transition(
                *execution_id,
                ExecutionStatus::Failed,
                Some("Execution interrupted by engine restart".to_string()),
            )
            .await?;
    }
    Ok(stuck.len())
}
