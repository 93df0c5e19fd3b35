// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Execution Engine Application Service
//!
//! Runs exactly one workflow execution end-to-end and records its audit
//! trail.
//!
//! # Node Loop
//!
//! ```text
//! load execution + graph
//! order = topological_order(nodes, edges)     (short order ⇒ cycle ⇒ fail)
//! for node in order {
//!     skip if an incoming branch edge contradicts a recorded decision
//!     step = create_step(..)        → running
//!     result = registry.execute(node.subtype, node.config, ctx)
//!     record branch decision / node output / set_variable mirror
//!     failure ⇒ step failed, execution failed, halt
//!     otherwise ⇒ step completed
//! }
//! execution completed
//! ```
//!
//! Each step transition is committed before the engine advances, so a crash
//! mid-node leaves a `running` step behind for the startup recovery scan. The
//! engine never resumes a partially run execution.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::registry::IntegrationRegistry;
use crate::domain::context::ExecutionContext;
use crate::domain::execution::{ExecutionId, ExecutionStatus};
use crate::domain::integration::{BRANCH_CONDITION, SET_VARIABLE};
use crate::domain::repository::ExecutionRepository;
use crate::domain::workflow::{topological_order, Edge, WorkflowError};

pub struct ExecutionEngine {
    store: Arc<dyn ExecutionRepository>,
    registry: Arc<IntegrationRegistry>,
}

impl ExecutionEngine {
    pub fn new(store: Arc<dyn ExecutionRepository>, registry: Arc<IntegrationRegistry>) -> Self {
        Self { store, registry }
    }

    /// Execute one claimed workflow run to completion.
    ///
    /// Node failures finalize the execution as `failed` and return `Ok`; an
    /// `Err` here means the engine itself could not make progress (store
    /// failure, vanished execution), in which case a best-effort failed write
    /// is attempted before surfacing the error.
    pub async fn execute(&self, execution_id: ExecutionId) -> Result<()> {
        match self.run(execution_id).await {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(execution_id = %execution_id, error = %err, "Execution aborted");
                let _ = self
                    .store
                    .transition(execution_id, ExecutionStatus::Failed, Some(err.to_string()))
                    .await;
                Err(err)
            }
        }
    }

    async fn run(&self, execution_id: ExecutionId) -> Result<()> {
        let joined = self
            .store
            .find_with_workflow(execution_id)
            .await
            .context("Failed to load execution")?
            .ok_or_else(|| anyhow!("Execution not found"))?;

        match joined.execution.status {
            // Claimed executions arrive running; a direct call may still hold
            // a pending row.
            ExecutionStatus::Running => {}
            ExecutionStatus::Pending => {
                self.store
                    .transition(execution_id, ExecutionStatus::Running, None)
                    .await
                    .context("Failed to mark execution running")?;
            }
            status => {
                return Err(anyhow!("Execution {execution_id} is already {}", status.as_str()));
            }
        }

        info!(
            execution_id = %execution_id,
            workflow = %joined.workflow_name,
            nodes = joined.nodes.len(),
            "Starting workflow execution"
        );

        let order = topological_order(&joined.nodes, &joined.edges);
        if order.len() != joined.nodes.len() {
            let message = WorkflowError::CyclicGraph.to_string();
            warn!(execution_id = %execution_id, "{message}");
            self.store
                .transition(execution_id, ExecutionStatus::Failed, Some(message))
                .await?;
            return Ok(());
        }

        let nodes_by_id: HashMap<&str, _> =
            joined.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut ctx = ExecutionContext::new(execution_id);
        // Branch decisions are scoped to this run only.
        let mut branch_decisions: HashMap<String, bool> = HashMap::new();

        for node_id in &order {
            let node = nodes_by_id[node_id.as_str()];

            if should_skip(node_id, &joined.edges, &branch_decisions) {
                debug!(execution_id = %execution_id, node = %node_id, "Skipping branch-pruned node");
                continue;
            }

            let step = self.store.create_step(execution_id, node_id).await?;
            self.store.step_running(step.id).await?;

            let result = self.registry.execute(&node.subtype, &node.config, &ctx).await;

            if node.subtype == BRANCH_CONDITION {
                if let Some(decision) = result
                    .data
                    .as_ref()
                    .and_then(|d| d.get("result"))
                    .and_then(Value::as_bool)
                {
                    debug!(execution_id = %execution_id, node = %node_id, decision, "Recorded branch decision");
                    branch_decisions.insert(node_id.clone(), decision);
                }
            }

            let result_value =
                serde_json::to_value(&result).context("Failed to serialize step result")?;
            ctx.record_output(node_id.clone(), result_value.clone());

            if result.success && node.subtype == SET_VARIABLE {
                if let Some(data) = result.data.as_ref() {
                    if let Some(name) = data.get("variableName").and_then(Value::as_str) {
                        let value = data.get("value").cloned().unwrap_or(Value::Null);
                        ctx.set_variable(name, value);
                    }
                }
            }

            if !result.success {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "Integration failed".to_string());
                self.store.step_failed(step.id, &message).await?;
                self.store
                    .transition(execution_id, ExecutionStatus::Failed, Some(message.clone()))
                    .await?;
                info!(
                    execution_id = %execution_id,
                    node = %node_id,
                    error = %message,
                    "Node failed; halting remaining nodes"
                );
                return Ok(());
            }

            self.store.step_completed(step.id, result_value).await?;
        }

        self.store
            .transition(execution_id, ExecutionStatus::Completed, None)
            .await?;
        info!(execution_id = %execution_id, "Workflow execution completed");
        Ok(())
    }
}

/// Whether `node_id` must be skipped given the branch decisions recorded so
/// far.
///
/// The `sourceHandle` label is authoritative; the `-true-` / `-false-` edge id
/// substring is a legacy fallback kept for editor compatibility. A node is
/// skipped iff any classified incoming edge contradicts its source's recorded
/// decision. Edges from undecided or non-branch sources never cause a skip.
fn should_skip(node_id: &str, edges: &[Edge], decisions: &HashMap<String, bool>) -> bool {
    for edge in edges.iter().filter(|e| e.target == node_id) {
        let Some(&decision) = decisions.get(edge.source.as_str()) else {
            continue;
        };
        let (true_edge, false_edge) = match edge.source_handle.as_deref() {
            Some("true") => (true, false),
            Some("false") => (false, true),
            _ => (edge.id.contains("-true-"), edge.id.contains("-false-")),
        };
        if (true_edge && !decision) || (false_edge && decision) {
            return true;
        }
    }
    false
}
