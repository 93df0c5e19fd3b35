// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! PostgreSQL Workflow Repository
//!
//! Persists workflow graphs to the `workflows` table. Nodes and edges are
//! stored as JSONB documents in the editor's wire shape, so the table is
//! readable by the graph editor without another mapping layer.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::repository::{RepositoryError, WorkflowRepository};
use crate::domain::workflow::{Edge, Node, Workflow, WorkflowId, WorkflowStatus};

pub struct PostgresWorkflowRepository {
    pool: PgPool,
}

impl PostgresWorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_workflow(row: &PgRow) -> Result<Workflow, RepositoryError> {
    let id: uuid::Uuid = row.get("id");
    let nodes_json: serde_json::Value = row.get("nodes");
    let edges_json: serde_json::Value = row.get("edges");
    let status: String = row.get("status");

    let nodes: Vec<Node> = serde_json::from_value(nodes_json)?;
    let edges: Vec<Edge> = serde_json::from_value(edges_json)?;
    let status = match status.as_str() {
        "inactive" => WorkflowStatus::Inactive,
        _ => WorkflowStatus::Active,
    };

    Ok(Workflow {
        id: WorkflowId::from_uuid(id),
        name: row.get("name"),
        nodes,
        edges,
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl WorkflowRepository for PostgresWorkflowRepository {
    async fn save(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let nodes = serde_json::to_value(&workflow.nodes)?;
        let edges = serde_json::to_value(&workflow.edges)?;
        let status = match workflow.status {
            WorkflowStatus::Active => "active",
            WorkflowStatus::Inactive => "inactive",
        };

        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, nodes, edges, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                nodes = EXCLUDED.nodes,
                edges = EXCLUDED.edges,
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(workflow.id.0)
        .bind(&workflow.name)
        .bind(nodes)
        .bind(edges)
        .bind(status)
        .bind(workflow.created_at)
        .bind(workflow.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save workflow: {e}")))?;

        Ok(())
    }

    async fn find_by_id(&self, id: WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, nodes, edges, status, created_at, updated_at
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_workflow(&r)).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, nodes, edges, status, created_at, updated_at
            FROM workflows
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_workflow).collect()
    }

    async fn delete(&self, id: WorkflowId) -> Result<(), RepositoryError> {
        // Executions and steps go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Workflow {id}")));
        }
        Ok(())
    }
}
