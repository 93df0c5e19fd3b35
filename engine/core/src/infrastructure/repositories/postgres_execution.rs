// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL Execution Repository
//!
//! Persists executions and their step audit trail. The queue claim is a
//! single `UPDATE ... (SELECT ... FOR UPDATE SKIP LOCKED) RETURNING` statement
//! so concurrent workers never receive the same execution, and status
//! transitions are guarded in SQL so the monotonic lifecycle holds even under
//! races.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::execution::{
    Execution, ExecutionId, ExecutionStatus, ExecutionStep, StepId,
};
use crate::domain::repository::{
    ExecutionRepository, ExecutionWithSteps, ExecutionWithWorkflow, RepositoryError,
};
use crate::domain::workflow::{Edge, Node, WorkflowId};

pub struct PostgresExecutionRepository {
    pool: PgPool,
}

impl PostgresExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_execution(row: &PgRow) -> Result<Execution, RepositoryError> {
    let id: uuid::Uuid = row.get("id");
    let workflow_id: uuid::Uuid = row.get("workflow_id");
    let status: String = row.get("status");
    let status = status
        .parse::<ExecutionStatus>()
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

    Ok(Execution {
        id: ExecutionId(id),
        workflow_id: WorkflowId(workflow_id),
        status,
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
    })
}

fn row_to_step(row: &PgRow) -> Result<ExecutionStep, RepositoryError> {
    let id: uuid::Uuid = row.get("id");
    let execution_id: uuid::Uuid = row.get("execution_id");
    let status: String = row.get("status");
    let status = status
        .parse()
        .map_err(|e: crate::domain::execution::ExecutionError| {
            RepositoryError::Database(e.to_string())
        })?;

    Ok(ExecutionStep {
        id: StepId(id),
        execution_id: ExecutionId(execution_id),
        node_id: row.get("node_id"),
        status,
        result: row.get("result"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl ExecutionRepository for PostgresExecutionRepository {
    async fn create(&self, workflow_id: WorkflowId) -> Result<Execution, RepositoryError> {
        let execution = Execution::new(workflow_id);

        sqlx::query(
            r#"
            INSERT INTO workflow_executions (id, workflow_id, status, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(execution.id.0)
        .bind(workflow_id.0)
        .bind(execution.status.as_str())
        .bind(execution.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to create execution: {e}")))?;

        Ok(execution)
    }

    async fn claim_next_pending(&self) -> Result<Option<ExecutionId>, RepositoryError> {
        let row = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = 'running', started_at = NOW()
            WHERE id = (
                SELECT id FROM workflow_executions
                WHERE status = 'pending'
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| ExecutionId(r.get("id"))))
    }

    async fn transition(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        error: Option<String>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET status = $2,
                started_at = CASE WHEN $2 = 'running' THEN NOW() ELSE started_at END,
                completed_at = CASE WHEN $2 IN ('completed', 'failed') THEN NOW() ELSE completed_at END,
                error_message = CASE WHEN $2 = 'failed' THEN $3 ELSE error_message END
            WHERE id = $1
              AND (
                    (status = 'pending' AND $2 = 'running')
                 OR (status = 'running' AND $2 IN ('completed', 'failed'))
              )
            "#,
        )
        .bind(id.0)
        .bind(status.as_str())
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current: Option<String> =
                sqlx::query_scalar("SELECT status FROM workflow_executions WHERE id = $1")
                    .bind(id.0)
                    .fetch_optional(&self.pool)
                    .await?;
            return match current {
                None => Err(RepositoryError::NotFound(format!("Execution {id}"))),
                Some(from) => Err(RepositoryError::Conflict(format!(
                    "Invalid execution status transition: {from} → {}",
                    status.as_str()
                ))),
            };
        }
        Ok(())
    }

    async fn find_by_id(&self, id: ExecutionId) -> Result<Option<Execution>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, workflow_id, status, started_at, completed_at, error_message, created_at
            FROM workflow_executions
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_execution(&r)).transpose()
    }

    async fn find_with_steps(
        &self,
        id: ExecutionId,
    ) -> Result<Option<ExecutionWithSteps>, RepositoryError> {
        let Some(execution) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let rows = sqlx::query(
            r#"
            SELECT id, execution_id, node_id, status, result,
                   started_at, completed_at, error_message, created_at
            FROM execution_steps
            WHERE execution_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        let steps = rows.iter().map(row_to_step).collect::<Result<Vec<_>, _>>()?;
        Ok(Some(ExecutionWithSteps { execution, steps }))
    }

    async fn find_with_workflow(
        &self,
        id: ExecutionId,
    ) -> Result<Option<ExecutionWithWorkflow>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT e.id, e.workflow_id, e.status, e.started_at, e.completed_at,
                   e.error_message, e.created_at,
                   w.name AS workflow_name, w.nodes, w.edges
            FROM workflow_executions e
            JOIN workflows w ON w.id = e.workflow_id
            WHERE e.id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let execution = row_to_execution(&row)?;
        let nodes_json: Value = row.get("nodes");
        let edges_json: Value = row.get("edges");
        let nodes: Vec<Node> = serde_json::from_value(nodes_json)?;
        let edges: Vec<Edge> = serde_json::from_value(edges_json)?;

        Ok(Some(ExecutionWithWorkflow {
            execution,
            workflow_name: row.get("workflow_name"),
            nodes,
            edges,
        }))
    }

    async fn latest_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<Execution>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, workflow_id, status, started_at, completed_at, error_message, created_at
            FROM workflow_executions
            WHERE workflow_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(workflow_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_execution(&r)).transpose()
    }

    async fn find_running(&self) -> Result<Vec<ExecutionId>, RepositoryError> {
        let rows = sqlx::query("SELECT id FROM workflow_executions WHERE status = 'running'")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| ExecutionId(r.get("id"))).collect())
    }

    async fn create_step(
        &self,
        execution_id: ExecutionId,
        node_id: &str,
    ) -> Result<ExecutionStep, RepositoryError> {
        let step = ExecutionStep::new(execution_id, node_id);

        sqlx::query(
            r#"
            INSERT INTO execution_steps (id, execution_id, node_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(step.id.0)
        .bind(execution_id.0)
        .bind(&step.node_id)
        .bind(step.status.as_str())
        .bind(step.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to create step: {e}")))?;

        Ok(step)
    }

    async fn step_running(&self, step_id: StepId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE execution_steps SET status = 'running', started_at = NOW() WHERE id = $1")
            .bind(step_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn step_completed(&self, step_id: StepId, result: Value) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE execution_steps
            SET status = 'completed', result = $2, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(step_id.0)
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn step_failed(&self, step_id: StepId, error: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE execution_steps
            SET status = 'failed', error_message = $2, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(step_id.0)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
