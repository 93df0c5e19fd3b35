// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration Registry Application Service
//!
//! The registry is the keyed catalog of integration descriptors and the single
//! dispatch point for node execution. It is constructed at startup and passed
//! by reference into the engine; there is no process-wide singleton.
//!
//! Dispatch pipeline:
//!
//! ```text
//! execute(id, config, ctx)
//!     → lookup descriptor (unknown id → failure result)
//!     → hydrate config through the expression evaluator
//!     → time the executor, converting Err and panic into failure results
//!     → enrich metadata (nodeType, subtype, executionTime)
//!     → sanity-check the output envelope
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::context::ExecutionContext;
use crate::domain::expression::ExpressionEvaluator;
use crate::domain::integration::{
    Integration, IntegrationDescriptor, IntegrationResult, ResultMetadata, ValidationOutcome,
    BRANCH_CONDITION,
};
use crate::domain::workflow::NodeKind;

/// Catalog summary for observability endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub total: usize,
    pub by_category: HashMap<String, usize>,
}

pub struct IntegrationRegistry {
    integrations: HashMap<String, Arc<dyn Integration>>,
    evaluator: ExpressionEvaluator,
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self {
            integrations: HashMap::new(),
            evaluator: ExpressionEvaluator::new(),
        }
    }

    // ========================================================================
    // Catalog Management
    // ========================================================================

    /// Register an integration under its descriptor id. Re-registering an id
    /// replaces the previous executor.
    pub fn register(&mut self, integration: Arc<dyn Integration>) {
        let id = integration.descriptor().id.clone();
        debug!(integration = %id, "Registering integration");
        self.integrations.insert(id, integration);
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        self.integrations.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Integration>> {
        self.integrations.get(id)
    }

    pub fn all(&self) -> Vec<&IntegrationDescriptor> {
        let mut descriptors: Vec<_> = self.integrations.values().map(|i| i.descriptor()).collect();
        descriptors.sort_by(|a, b| a.id.cmp(&b.id));
        descriptors
    }

    pub fn by_category(&self, category: NodeKind) -> Vec<&IntegrationDescriptor> {
        self.all()
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Case-insensitive match over id, name, and description.
    pub fn search(&self, query: &str) -> Vec<&IntegrationDescriptor> {
        let needle = query.to_lowercase();
        self.all()
            .into_iter()
            .filter(|d| {
                d.id.to_lowercase().contains(&needle)
                    || d.name.to_lowercase().contains(&needle)
                    || d.description.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn by_version(&self, version: &str) -> Vec<&IntegrationDescriptor> {
        self.all()
            .into_iter()
            .filter(|d| d.version == version)
            .collect()
    }

    pub fn auth_required(&self) -> Vec<&IntegrationDescriptor> {
        self.all().into_iter().filter(|d| d.auth.is_some()).collect()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut by_category: HashMap<String, usize> = HashMap::new();
        for descriptor in self.integrations.values().map(|i| i.descriptor()) {
            *by_category.entry(descriptor.category.to_string()).or_default() += 1;
        }
        RegistryStats {
            total: self.integrations.len(),
            by_category,
        }
    }

    // ========================================================================
    // Validation & Dispatch
    // ========================================================================

    /// Validate a config against an integration: the executor's own validator
    /// when it has one, the schema-driven default otherwise.
    pub fn validate_config(&self, id: &str, config: &Value) -> ValidationOutcome {
        let Some(integration) = self.integrations.get(id) else {
            let mut errors = HashMap::new();
            errors.insert(
                "integration".to_string(),
                format!("Integration '{id}' not found"),
            );
            return ValidationOutcome::invalid(errors);
        };

        match integration.validate(config) {
            Some(outcome) => outcome,
            None => integration.descriptor().schema.validate(config),
        }
    }

    /// Dispatch one node execution. Never raises: executor errors and panics
    /// both come back as `success = false` results.
    pub async fn execute(&self, id: &str, config: &Value, ctx: &ExecutionContext) -> IntegrationResult {
        let Some(integration) = self.integrations.get(id) else {
            return IntegrationResult::failure(
                format!("Integration '{id}' not found"),
                ResultMetadata {
                    node_type: "unknown".to_string(),
                    subtype: Some(id.to_string()),
                    execution_time: None,
                },
            );
        };

        let descriptor = integration.descriptor();
        let hydrated = self.evaluator.hydrate(config, ctx, id == BRANCH_CONDITION);

        let started = Instant::now();
        let outcome = std::panic::AssertUnwindSafe(integration.execute(&hydrated, ctx))
            .catch_unwind()
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let metadata = ResultMetadata {
            node_type: descriptor.category.to_string(),
            subtype: Some(descriptor.id.clone()),
            execution_time: Some(elapsed_ms),
        };

        let result = match outcome {
            Ok(Ok(data)) => IntegrationResult::success(data, metadata),
            Ok(Err(err)) => IntegrationResult::failure(err.to_string(), metadata),
            Err(panic) => IntegrationResult::failure(
                format!("Integration panicked: {}", panic_message(&panic)),
                metadata,
            ),
        };

        // Output-schema sanity check: successful results carry a string
        // timestamp in data. Violations are logged, not rejected.
        if result.success {
            let has_timestamp = result
                .data
                .as_ref()
                .and_then(|d| d.get("timestamp"))
                .map(Value::is_string)
                .unwrap_or(false);
            if !has_timestamp {
                warn!(integration = %id, "Integration result is missing a string data.timestamp");
            }
        }

        result
    }
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::ExecutionId;
    use crate::domain::integration::{ConfigSchema, IntegrationError, SchemaField, FieldType};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;

    struct EchoIntegration {
        descriptor: IntegrationDescriptor,
    }

    impl EchoIntegration {
        fn new() -> Self {
            Self {
                descriptor: IntegrationDescriptor::new(
                    "echo",
                    "Echo",
                    "Returns its hydrated config",
                    NodeKind::Action,
                    ConfigSchema::new(
                        vec![SchemaField::new("message", "Message", FieldType::Text).with_expressions()],
                        &["message"],
                    ),
                ),
            }
        }
    }

    #[async_trait]
    impl Integration for EchoIntegration {
        fn descriptor(&self) -> &IntegrationDescriptor {
            &self.descriptor
        }

        async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
            Ok(json!({
                "echoed": config.get("message").cloned().unwrap_or(Value::Null),
                "timestamp": Utc::now().to_rfc3339(),
            }))
        }
    }

    struct FailingIntegration {
        descriptor: IntegrationDescriptor,
    }

    impl FailingIntegration {
        fn new(id: &str) -> Self {
            Self {
                descriptor: IntegrationDescriptor::new(
                    id,
                    "Failing",
                    "Always fails",
                    NodeKind::Action,
                    ConfigSchema::default(),
                ),
            }
        }
    }

    #[async_trait]
    impl Integration for FailingIntegration {
        fn descriptor(&self) -> &IntegrationDescriptor {
            &self.descriptor
        }

        async fn execute(&self, _config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
            Err(IntegrationError::Failed("downstream unavailable".to_string()))
        }
    }

    struct PanickingIntegration {
        descriptor: IntegrationDescriptor,
    }

    #[async_trait]
    impl Integration for PanickingIntegration {
        fn descriptor(&self) -> &IntegrationDescriptor {
            &self.descriptor
        }

        async fn execute(&self, _config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
            panic!("executor bug");
        }
    }

    fn registry_with_echo() -> IntegrationRegistry {
        let mut registry = IntegrationRegistry::new();
        registry.register(Arc::new(EchoIntegration::new()));
        registry
    }

    #[tokio::test]
    async fn test_unknown_integration_yields_failure_result() {
        let registry = IntegrationRegistry::new();
        let ctx = ExecutionContext::new(ExecutionId::new());
        let result = registry.execute("nonexistent_xyz", &json!({}), &ctx).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("not found"));
        assert_eq!(result.metadata.node_type, "unknown");
    }

    #[tokio::test]
    async fn test_execute_hydrates_config_and_enriches_metadata() {
        let registry = registry_with_echo();
        let mut ctx = ExecutionContext::new(ExecutionId::new());
        ctx.variables.insert("who".to_string(), json!("world"));

        let result = registry
            .execute("echo", &json!({"message": "hello {{$vars.who}}"}), &ctx)
            .await;

        assert!(result.success);
        assert_eq!(result.data.as_ref().unwrap()["echoed"], json!("hello world"));
        assert_eq!(result.metadata.node_type, "action");
        assert_eq!(result.metadata.subtype.as_deref(), Some("echo"));
        assert!(result.metadata.execution_time.is_some());
    }

    #[tokio::test]
    async fn test_executor_error_becomes_failure_result() {
        let mut registry = IntegrationRegistry::new();
        registry.register(Arc::new(FailingIntegration::new("flaky")));
        let ctx = ExecutionContext::new(ExecutionId::new());

        let result = registry.execute("flaky", &json!({}), &ctx).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("downstream unavailable"));
        assert_eq!(result.metadata.subtype.as_deref(), Some("flaky"));
    }

    #[tokio::test]
    async fn test_executor_panic_is_contained() {
        let mut registry = IntegrationRegistry::new();
        registry.register(Arc::new(PanickingIntegration {
            descriptor: IntegrationDescriptor::new(
                "panicky",
                "Panicky",
                "Panics",
                NodeKind::Action,
                ConfigSchema::default(),
            ),
        }));
        let ctx = ExecutionContext::new(ExecutionId::new());

        let result = registry.execute("panicky", &json!({}), &ctx).await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("executor bug"));
    }

    #[tokio::test]
    async fn test_validate_config_unknown_id() {
        let registry = IntegrationRegistry::new();
        let outcome = registry.validate_config("ghost", &json!({}));
        assert!(!outcome.valid);
        assert!(outcome.errors["integration"].contains("not found"));
    }

    #[tokio::test]
    async fn test_validate_config_default_schema_rules() {
        let registry = registry_with_echo();
        assert!(!registry.validate_config("echo", &json!({})).valid);
        assert!(registry.validate_config("echo", &json!({"message": "hi"})).valid);
    }

    #[test]
    fn test_catalog_queries() {
        let mut registry = registry_with_echo();
        registry.register(Arc::new(FailingIntegration::new("always_down")));

        assert_eq!(registry.all().len(), 2);
        assert_eq!(registry.by_category(NodeKind::Action).len(), 2);
        assert_eq!(registry.search("echo").len(), 1);
        assert_eq!(registry.by_version("1.0.0").len(), 2);
        assert!(registry.auth_required().is_empty());

        let stats = registry.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_category["action"], 2);

        assert!(registry.unregister("echo"));
        assert!(!registry.unregister("echo"));
        assert!(registry.get("echo").is_none());
    }
}
