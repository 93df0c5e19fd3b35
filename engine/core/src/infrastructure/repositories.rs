// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory store implementation.
//!
//! A single mutex over the whole state gives development mode and the test
//! suite the same atomicity the PostgreSQL claim query provides in
//! production: `claim_next_pending` runs inside one critical section, so two
//! workers can never receive the same execution.
//!
//! Entities live in `Vec`s so insertion order backs `created_at` ties
//! deterministically.

pub mod postgres_execution;
pub mod postgres_workflow;

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::execution::{Execution, ExecutionId, ExecutionStatus, ExecutionStep, StepId};
use crate::domain::repository::{
    ExecutionRepository, ExecutionWithSteps, ExecutionWithWorkflow, RepositoryError,
    WorkflowRepository,
};
use crate::domain::workflow::{Workflow, WorkflowId};

#[derive(Default)]
struct SharedState {
    workflows: Vec<Workflow>,
    executions: Vec<Execution>,
    steps: Vec<ExecutionStep>,
}

/// One store implementing both repository traits over shared state, mirroring
/// the foreign keys a relational backend enforces.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<SharedState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, SharedState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Database("Mutex poisoned".to_string()))
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryStore {
    async fn save(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.workflows.iter_mut().find(|w| w.id == workflow.id) {
            Some(existing) => *existing = workflow.clone(),
            None => state.workflows.push(workflow.clone()),
        }
        Ok(())
    }

    async fn find_by_id(&self, id: WorkflowId) -> Result<Option<Workflow>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.workflows.iter().find(|w| w.id == id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Workflow>, RepositoryError> {
        let state = self.lock()?;
        let mut workflows = state.workflows.clone();
        workflows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(workflows)
    }

    async fn delete(&self, id: WorkflowId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let before = state.workflows.len();
        state.workflows.retain(|w| w.id != id);
        if state.workflows.len() == before {
            return Err(RepositoryError::NotFound(format!("Workflow {id}")));
        }
        // Cascade: drop owned executions and their steps.
        let doomed: Vec<ExecutionId> = state
            .executions
            .iter()
            .filter(|e| e.workflow_id == id)
            .map(|e| e.id)
            .collect();
        state.executions.retain(|e| e.workflow_id != id);
        state.steps.retain(|s| !doomed.contains(&s.execution_id));
        Ok(())
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryStore {
    async fn create(&self, workflow_id: WorkflowId) -> Result<Execution, RepositoryError> {
        let mut state = self.lock()?;
        if !state.workflows.iter().any(|w| w.id == workflow_id) {
            return Err(RepositoryError::NotFound(format!("Workflow {workflow_id}")));
        }
        let execution = Execution::new(workflow_id);
        state.executions.push(execution.clone());
        Ok(execution)
    }

    async fn claim_next_pending(&self) -> Result<Option<ExecutionId>, RepositoryError> {
        let mut state = self.lock()?;
        let claimed = state
            .executions
            .iter_mut()
            .filter(|e| e.status == ExecutionStatus::Pending)
            .min_by_key(|e| e.created_at);
        match claimed {
            Some(execution) => {
                execution.transition_to(ExecutionStatus::Running, None)?;
                Ok(Some(execution.id))
            }
            None => Ok(None),
        }
    }

    async fn transition(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        error: Option<String>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let execution = state
            .executions
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| RepositoryError::NotFound(format!("Execution {id}")))?;
        execution.transition_to(status, error)?;
        Ok(())
    }

    async fn find_by_id(&self, id: ExecutionId) -> Result<Option<Execution>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.executions.iter().find(|e| e.id == id).cloned())
    }

    async fn find_with_steps(
        &self,
        id: ExecutionId,
    ) -> Result<Option<ExecutionWithSteps>, RepositoryError> {
        let state = self.lock()?;
        let Some(execution) = state.executions.iter().find(|e| e.id == id).cloned() else {
            return Ok(None);
        };
        let mut steps: Vec<ExecutionStep> = state
            .steps
            .iter()
            .filter(|s| s.execution_id == id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| s.created_at);
        Ok(Some(ExecutionWithSteps { execution, steps }))
    }

    async fn find_with_workflow(
        &self,
        id: ExecutionId,
    ) -> Result<Option<ExecutionWithWorkflow>, RepositoryError> {
        let state = self.lock()?;
        let Some(execution) = state.executions.iter().find(|e| e.id == id).cloned() else {
            return Ok(None);
        };
        let Some(workflow) = state.workflows.iter().find(|w| w.id == execution.workflow_id) else {
            return Ok(None);
        };
        Ok(Some(ExecutionWithWorkflow {
            execution,
            workflow_name: workflow.name.clone(),
            nodes: workflow.nodes.clone(),
            edges: workflow.edges.clone(),
        }))
    }

    async fn latest_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Option<Execution>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .executions
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn find_running(&self) -> Result<Vec<ExecutionId>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Running)
            .map(|e| e.id)
            .collect())
    }

    async fn create_step(
        &self,
        execution_id: ExecutionId,
        node_id: &str,
    ) -> Result<ExecutionStep, RepositoryError> {
        let mut state = self.lock()?;
        if !state.executions.iter().any(|e| e.id == execution_id) {
            return Err(RepositoryError::NotFound(format!("Execution {execution_id}")));
        }
        let step = ExecutionStep::new(execution_id, node_id);
        state.steps.push(step.clone());
        Ok(step)
    }

    async fn step_running(&self, step_id: StepId) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let step = find_step(&mut state, step_id)?;
        step.start();
        Ok(())
    }

    async fn step_completed(&self, step_id: StepId, result: Value) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let step = find_step(&mut state, step_id)?;
        step.complete(result);
        Ok(())
    }

    async fn step_failed(&self, step_id: StepId, error: &str) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let step = find_step(&mut state, step_id)?;
        step.fail(error);
        Ok(())
    }
}

fn find_step(
    state: &mut SharedState,
    step_id: StepId,
) -> Result<&mut ExecutionStep, RepositoryError> {
    state
        .steps
        .iter_mut()
        .find(|s| s.id == step_id)
        .ok_or_else(|| RepositoryError::NotFound(format!("Step {step_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::StepStatus;
    use crate::domain::workflow::{Node, NodeKind, Position};

    fn sample_workflow(name: &str) -> Workflow {
        Workflow::new(
            name,
            vec![Node {
                id: "trigger".to_string(),
                kind: NodeKind::Trigger,
                subtype: "manual_trigger".to_string(),
                config: serde_json::json!({}),
                position: Position::default(),
            }],
            vec![],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_workflow_round_trip() {
        let store = InMemoryStore::new();
        let wf = sample_workflow("alpha");
        store.save(&wf).await.unwrap();

        let loaded = WorkflowRepository::find_by_id(&store, wf.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "alpha");

        assert!(WorkflowRepository::delete(&store, wf.id).await.is_ok());
        assert!(WorkflowRepository::find_by_id(&store, wf.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_by_recent_update() {
        let store = InMemoryStore::new();
        let old = sample_workflow("old");
        store.save(&old).await.unwrap();

        let mut fresh = sample_workflow("fresh");
        fresh.updated_at = old.updated_at + chrono::Duration::seconds(5);
        store.save(&fresh).await.unwrap();

        let listed = store.list_all().await.unwrap();
        assert_eq!(listed[0].name, "fresh");
        assert_eq!(listed[1].name, "old");
    }

    #[tokio::test]
    async fn test_create_requires_existing_workflow() {
        let store = InMemoryStore::new();
        let err = store.create(WorkflowId::new()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_claim_takes_oldest_and_marks_running() {
        let store = InMemoryStore::new();
        let wf = sample_workflow("wf");
        store.save(&wf).await.unwrap();

        let first = store.create(wf.id).await.unwrap();
        let second = store.create(wf.id).await.unwrap();

        let claimed = store.claim_next_pending().await.unwrap().unwrap();
        assert_eq!(claimed, first.id);
        let reloaded = ExecutionRepository::find_by_id(&store, first.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, ExecutionStatus::Running);
        assert!(reloaded.started_at.is_some());

        assert_eq!(store.claim_next_pending().await.unwrap().unwrap(), second.id);
        assert!(store.claim_next_pending().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_never_hands_out_same_execution_twice() {
        let store = InMemoryStore::new();
        let wf = sample_workflow("wf");
        store.save(&wf).await.unwrap();
        for _ in 0..8 {
            store.create(wf.id).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.claim_next_pending().await.unwrap() }));
        }

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            if let Some(id) = handle.await.unwrap() {
                assert!(seen.insert(id), "execution {id} claimed twice");
            }
        }
        assert_eq!(seen.len(), 8);
    }

    #[tokio::test]
    async fn test_invalid_transition_is_conflict() {
        let store = InMemoryStore::new();
        let wf = sample_workflow("wf");
        store.save(&wf).await.unwrap();
        let exec = store.create(wf.id).await.unwrap();

        let err = store
            .transition(exec.id, ExecutionStatus::Completed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_steps_ordered_by_created_at() {
        let store = InMemoryStore::new();
        let wf = sample_workflow("wf");
        store.save(&wf).await.unwrap();
        let exec = store.create(wf.id).await.unwrap();

        let a = store.create_step(exec.id, "a").await.unwrap();
        let b = store.create_step(exec.id, "b").await.unwrap();
        store.step_running(a.id).await.unwrap();
        store.step_completed(a.id, serde_json::json!({"ok": true})).await.unwrap();
        store.step_running(b.id).await.unwrap();
        store.step_failed(b.id, "boom").await.unwrap();

        let with_steps = store.find_with_steps(exec.id).await.unwrap().unwrap();
        assert_eq!(with_steps.steps.len(), 2);
        assert_eq!(with_steps.steps[0].node_id, "a");
        assert_eq!(with_steps.steps[0].status, StepStatus::Completed);
        assert_eq!(with_steps.steps[1].node_id, "b");
        assert_eq!(with_steps.steps[1].error_message.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_delete_cascades_executions_and_steps() {
        let store = InMemoryStore::new();
        let wf = sample_workflow("wf");
        store.save(&wf).await.unwrap();
        let exec = store.create(wf.id).await.unwrap();
        store.create_step(exec.id, "a").await.unwrap();

        WorkflowRepository::delete(&store, wf.id).await.unwrap();
        assert!(ExecutionRepository::find_by_id(&store, exec.id).await.unwrap().is_none());
        assert!(store.find_with_steps(exec.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_for_workflow() {
        let store = InMemoryStore::new();
        let wf = sample_workflow("wf");
        store.save(&wf).await.unwrap();
        assert!(store.latest_for_workflow(wf.id).await.unwrap().is_none());

        let _first = store.create(wf.id).await.unwrap();
        let second = store.create(wf.id).await.unwrap();
        // created_at can tie at clock resolution; latest wins by max.
        let latest = store.latest_for_workflow(wf.id).await.unwrap().unwrap();
        assert!(latest.id == second.id || latest.created_at >= second.created_at);
    }

    #[tokio::test]
    async fn test_find_with_workflow_joins_graph() {
        let store = InMemoryStore::new();
        let wf = sample_workflow("joined");
        store.save(&wf).await.unwrap();
        let exec = store.create(wf.id).await.unwrap();

        let joined = store.find_with_workflow(exec.id).await.unwrap().unwrap();
        assert_eq!(joined.workflow_name, "joined");
        assert_eq!(joined.nodes.len(), 1);
        assert!(joined.edges.is_empty());
    }
}
