// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Variable management.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::context::ExecutionContext;
use crate::domain::integration::{
    ConfigSchema, FieldType, Integration, IntegrationDescriptor, IntegrationError, SchemaField,
};
use crate::domain::workflow::NodeKind;

/// Publishes a named value into the execution context. The engine mirrors the
/// returned `variableName`/`value` pair into `ctx.variables`, JSON-parsing
/// string values when possible so nested lookups work.
pub struct SetVariable {
    descriptor: IntegrationDescriptor,
}

impl Default for SetVariable {
    fn default() -> Self {
        Self::new()
    }
}

impl SetVariable {
    pub fn new() -> Self {
        Self {
            descriptor: IntegrationDescriptor::new(
                "set_variable",
                "Set Variable",
                "Stores a value under a name for later nodes to reference",
                NodeKind::Action,
                ConfigSchema::new(
                    vec![
                        SchemaField::new("name", "Variable Name", FieldType::Text),
                        SchemaField::new("value", "Value", FieldType::Textarea).with_expressions(),
                    ],
                    &["name"],
                ),
            ),
        }
    }
}

#[async_trait]
impl Integration for SetVariable {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
        // `variableName` is the legacy editor key for the same field.
        let name = config
            .get("name")
            .or_else(|| config.get("variableName"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IntegrationError::InvalidConfig("name is required".to_string()))?;

        let value = config.get("value").cloned().unwrap_or(Value::Null);

        Ok(json!({
            "variableName": name,
            "value": value,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}
