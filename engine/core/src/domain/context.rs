// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Runtime execution context.
//!
//! The context carries named variables and per-node outputs across the nodes
//! of a single run. It lives only for the duration of that run and is never
//! persisted; a client-side view can be rebuilt from completed steps.

use std::collections::HashMap;

use serde_json::Value;

use crate::domain::execution::{ExecutionId, ExecutionStep, StepStatus};

/// Shared state for one workflow execution.
///
/// `node_outputs[node_id]` is set exactly once, when that node completes
/// successfully. Two executions never share a context.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    pub variables: HashMap<String, Value>,
    pub node_outputs: HashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            variables: HashMap::new(),
            node_outputs: HashMap::new(),
        }
    }

    /// Record a node's full result object, making it addressable as
    /// `{{$node.<id>.<path>}}`.
    pub fn record_output(&mut self, node_id: impl Into<String>, result: Value) {
        self.node_outputs.insert(node_id.into(), result);
    }

    /// Store a named variable. String values that parse as JSON are stored
    /// parsed so nested lookups (`{{$vars.x.y}}`) work; anything else is kept
    /// verbatim. JSON-looking strings the user meant literally are
    /// indistinguishable from structured values here.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        let stored = match &value {
            Value::String(s) => serde_json::from_str::<Value>(s).unwrap_or(value.clone()),
            _ => value,
        };
        self.variables.insert(name.into(), stored);
    }

    /// Rebuild the client-visible context of a finished execution from its
    /// stored steps: completed results repopulate `node_outputs`, and
    /// `set_variable` results are mirrored back into `variables`. The engine
    /// never resumes from a restored context.
    pub fn restore_from_steps(execution_id: ExecutionId, steps: &[ExecutionStep]) -> Self {
        let mut ctx = Self::new(execution_id);
        for step in steps {
            if step.status != StepStatus::Completed {
                continue;
            }
            let Some(result) = &step.result else { continue };
            ctx.record_output(step.node_id.clone(), result.clone());

            let subtype = result
                .get("metadata")
                .and_then(|m| m.get("subtype"))
                .and_then(Value::as_str);
            if subtype == Some("set_variable") {
                if let Some(data) = result.get("data") {
                    if let Some(name) = data.get("variableName").and_then(Value::as_str) {
                        let value = data.get("value").cloned().unwrap_or(Value::Null);
                        ctx.set_variable(name, value);
                    }
                }
            }
        }
        ctx
    }
}
