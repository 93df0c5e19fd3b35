// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::workflow::WorkflowId;

// ============================================================================
// Identifiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub Uuid);

impl StepId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Execution Entity
// ============================================================================

/// Execution lifecycle. Transitions are monotonic:
/// pending → running → {completed, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Whether moving from `self` to `next` respects the monotonic lifecycle.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        matches!(
            (self, next),
            (ExecutionStatus::Pending, ExecutionStatus::Running)
                | (ExecutionStatus::Running, ExecutionStatus::Completed)
                | (ExecutionStatus::Running, ExecutionStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionStatus::Pending),
            "running" => Ok(ExecutionStatus::Running),
            "completed" => Ok(ExecutionStatus::Completed),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(ExecutionError::UnknownStatus(other.to_string())),
        }
    }
}

/// One run of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Execution {
    pub fn new(workflow_id: WorkflowId) -> Self {
        Self {
            id: ExecutionId::new(),
            workflow_id,
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    /// Apply a lifecycle transition, stamping timestamps at the boundaries.
    pub fn transition_to(
        &mut self,
        next: ExecutionStatus,
        error: Option<String>,
    ) -> Result<(), ExecutionError> {
        if !self.status.can_transition_to(next) {
            return Err(ExecutionError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        match next {
            ExecutionStatus::Running => self.started_at = Some(Utc::now()),
            ExecutionStatus::Completed | ExecutionStatus::Failed => {
                self.completed_at = Some(Utc::now())
            }
            ExecutionStatus::Pending => {}
        }
        if next == ExecutionStatus::Failed {
            self.error_message = error;
        }
        self.status = next;
        Ok(())
    }
}

// ============================================================================
// Execution Step (audit record)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = ExecutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "completed" => Ok(StepStatus::Completed),
            "failed" => Ok(StepStatus::Failed),
            other => Err(ExecutionError::UnknownStatus(other.to_string())),
        }
    }
}

/// The audit record of one node within one execution. Sibling steps order by
/// `created_at`, which the engine guarantees matches topological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub id: StepId,
    pub execution_id: ExecutionId,
    pub node_id: String,
    pub status: StepStatus,
    pub result: Option<serde_json::Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExecutionStep {
    pub fn new(execution_id: ExecutionId, node_id: impl Into<String>) -> Self {
        Self {
            id: StepId::new(),
            execution_id,
            node_id: node_id.into(),
            status: StepStatus::Pending,
            result: None,
            started_at: None,
            completed_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn start(&mut self) {
        self.status = StepStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self, result: serde_json::Value) {
        self.status = StepStatus::Completed;
        self.result = Some(result);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error_message = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Invalid execution status transition: {from:?} → {to:?}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    #[error("Unknown execution status '{0}'")]
    UnknownStatus(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_id_unique() {
        assert_ne!(ExecutionId::new(), ExecutionId::new());
    }

    #[test]
    fn test_new_execution_is_pending() {
        let exec = Execution::new(WorkflowId::new());
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert!(exec.started_at.is_none());
        assert!(exec.completed_at.is_none());
        assert!(exec.error_message.is_none());
    }

    #[test]
    fn test_pending_to_running_stamps_started_at() {
        let mut exec = Execution::new(WorkflowId::new());
        exec.transition_to(ExecutionStatus::Running, None).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Running);
        assert!(exec.started_at.is_some());
    }

    #[test]
    fn test_running_to_failed_records_error() {
        let mut exec = Execution::new(WorkflowId::new());
        exec.transition_to(ExecutionStatus::Running, None).unwrap();
        exec.transition_to(ExecutionStatus::Failed, Some("boom".to_string())).unwrap();
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.error_message.as_deref(), Some("boom"));
        assert!(exec.completed_at.is_some());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        let mut exec = Execution::new(WorkflowId::new());
        // pending cannot finish directly
        assert!(exec.transition_to(ExecutionStatus::Completed, None).is_err());
        exec.transition_to(ExecutionStatus::Running, None).unwrap();
        exec.transition_to(ExecutionStatus::Completed, None).unwrap();
        // terminal states never move again
        let err = exec.transition_to(ExecutionStatus::Running, None).unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidTransition { .. }));
        assert!(exec.transition_to(ExecutionStatus::Failed, None).is_err());
    }

    #[test]
    fn test_status_round_trips_as_str() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ExecutionStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn test_step_lifecycle() {
        let mut step = ExecutionStep::new(ExecutionId::new(), "node-1");
        assert_eq!(step.status, StepStatus::Pending);

        step.start();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.started_at.is_some());

        step.complete(serde_json::json!({"success": true}));
        assert_eq!(step.status, StepStatus::Completed);
        assert!(step.result.is_some());
        assert!(step.completed_at.is_some());
    }

    #[test]
    fn test_step_failure_keeps_message() {
        let mut step = ExecutionStep::new(ExecutionId::new(), "node-1");
        step.start();
        step.fail("integration exploded");
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error_message.as_deref(), Some("integration exploded"));
    }
}
