// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Repository Pattern - Storage Backend Abstraction
//
// Defines the pluggable store behind the engine:
// - In-memory storage for development/testing
// - PostgreSQL for production persistence
//
// One repository per aggregate root. Every step transition commits before the
// engine advances to the next node; that contract is what makes the audit
// trail durable across crashes.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::execution::{
    Execution, ExecutionError, ExecutionId, ExecutionStatus, ExecutionStep, StepId,
};
use crate::domain::workflow::{Edge, Node, Workflow, WorkflowId};

/// Joined read: an execution plus its recorded steps, ordered by `created_at`.
#[derive(Debug, Clone)]
pub struct ExecutionWithSteps {
    pub execution: Execution,
    pub steps: Vec<ExecutionStep>,
}

/// Joined read: an execution plus the graph it runs.
#[derive(Debug, Clone)]
pub struct ExecutionWithWorkflow {
    pub execution: Execution,
    pub workflow_name: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Repository interface for Workflow aggregates
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Save workflow (create or update)
    async fn save(&self, workflow: &Workflow) -> Result<(), RepositoryError>;

    /// Find workflow by ID
    async fn find_by_id(&self, id: WorkflowId) -> Result<Option<Workflow>, RepositoryError>;

    /// List all workflows, most-recently-updated first
    async fn list_all(&self) -> Result<Vec<Workflow>, RepositoryError>;

    /// Delete workflow by ID, cascading its executions and steps
    async fn delete(&self, id: WorkflowId) -> Result<(), RepositoryError>;
}

/// Repository interface for Execution aggregates and their step audit trail
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Enqueue a new pending execution for a workflow
    async fn create(&self, workflow_id: WorkflowId) -> Result<Execution, RepositoryError>;

    /// Atomically claim the oldest pending execution, moving it to running
    /// with `started_at = now`. Returns `None` when the queue is empty.
    ///
    /// No two callers may ever receive the same execution.
    async fn claim_next_pending(&self) -> Result<Option<ExecutionId>, RepositoryError>;

    /// Apply a monotonic status transition; `Conflict` otherwise.
    async fn transition(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        error: Option<String>,
    ) -> Result<(), RepositoryError>;

    /// Find execution by ID
    async fn find_by_id(&self, id: ExecutionId) -> Result<Option<Execution>, RepositoryError>;

    /// Execution plus steps ordered by `created_at`
    async fn find_with_steps(
        &self,
        id: ExecutionId,
    ) -> Result<Option<ExecutionWithSteps>, RepositoryError>;

    /// Execution plus the owning workflow's name and graph
    async fn find_with_workflow(
        &self,
        id: ExecutionId,
    ) -> Result<Option<ExecutionWithWorkflow>, RepositoryError>;

    /// Most recent execution of a workflow by `created_at`
    async fn latest_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<Execution>, RepositoryError>;

    /// Executions currently marked running (startup recovery scan)
    async fn find_running(&self) -> Result<Vec<ExecutionId>, RepositoryError>;

    /// Record the beginning of a node evaluation
    async fn create_step(
        &self,
        execution_id: ExecutionId,
        node_id: &str,
    ) -> Result<ExecutionStep, RepositoryError>;

    async fn step_running(&self, step_id: StepId) -> Result<(), RepositoryError>;

    async fn step_completed(&self, step_id: StepId, result: Value) -> Result<(), RepositoryError>;

    async fn step_failed(&self, step_id: StepId, error: &str) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<ExecutionError> for RepositoryError {
    fn from(err: ExecutionError) -> Self {
        RepositoryError::Conflict(err.to_string())
    }
}
