// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Data transformation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::context::ExecutionContext;
use crate::domain::integration::{
    ConfigSchema, FieldType, Integration, IntegrationDescriptor, IntegrationError, SchemaField,
};
use crate::domain::workflow::NodeKind;

/// Applies a named operation to an input value (usually an expression over a
/// prior node's output).
pub struct TransformData {
    descriptor: IntegrationDescriptor,
}

impl Default for TransformData {
    fn default() -> Self {
        Self::new()
    }
}

impl TransformData {
    pub fn new() -> Self {
        Self {
            descriptor: IntegrationDescriptor::new(
                "transform_data",
                "Transform Data",
                "Applies an operation to an input value",
                NodeKind::Action,
                ConfigSchema::new(
                    vec![
                        SchemaField::new("input", "Input", FieldType::Textarea).with_expressions(),
                        SchemaField::new("operation", "Operation", FieldType::Select).with_options(&[
                            "uppercase",
                            "lowercase",
                            "trim",
                            "length",
                            "parse_json",
                            "stringify",
                        ]),
                    ],
                    &["operation"],
                ),
            ),
        }
    }
}

#[async_trait]
impl Integration for TransformData {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
        let operation = config
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| IntegrationError::InvalidConfig("operation is required".to_string()))?;
        let input = config.get("input").cloned().unwrap_or(Value::Null);

        let result = apply(operation, &input)?;

        Ok(json!({
            "result": result,
            "operation": operation,
            "input": input,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

fn apply(operation: &str, input: &Value) -> Result<Value, IntegrationError> {
    let as_text = || match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    match operation {
        "uppercase" => Ok(Value::String(as_text().to_uppercase())),
        "lowercase" => Ok(Value::String(as_text().to_lowercase())),
        "trim" => Ok(Value::String(as_text().trim().to_string())),
        "length" => Ok(match input {
            Value::Array(items) => json!(items.len()),
            Value::Object(map) => json!(map.len()),
            other => json!(scalar_len(other)),
        }),
        "parse_json" => {
            let text = as_text();
            serde_json::from_str(&text)
                .map_err(|e| IntegrationError::Failed(format!("Failed to parse JSON: {e}")))
        }
        "stringify" => Ok(Value::String(
            serde_json::to_string(input)
                .map_err(|e| IntegrationError::Failed(format!("Failed to stringify: {e}")))?,
        )),
        other => Err(IntegrationError::InvalidConfig(format!(
            "unknown operation '{other}'"
        ))),
    }
}

fn scalar_len(value: &Value) -> usize {
    match value {
        Value::String(s) => s.chars().count(),
        Value::Null => 0,
        other => other.to_string().len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::ExecutionId;

    async fn run(config: Value) -> Result<Value, IntegrationError> {
        let ctx = ExecutionContext::new(ExecutionId::new());
        TransformData::new().execute(&config, &ctx).await
    }

    #[tokio::test]
    async fn test_string_operations() {
        let data = run(json!({"input": "  Hello  ", "operation": "trim"})).await.unwrap();
        assert_eq!(data["result"], json!("Hello"));

        let data = run(json!({"input": "abc", "operation": "uppercase"})).await.unwrap();
        assert_eq!(data["result"], json!("ABC"));
    }

    #[tokio::test]
    async fn test_length_shapes() {
        let data = run(json!({"input": [1, 2, 3], "operation": "length"})).await.unwrap();
        assert_eq!(data["result"], json!(3));

        let data = run(json!({"input": "four", "operation": "length"})).await.unwrap();
        assert_eq!(data["result"], json!(4));
    }

    #[tokio::test]
    async fn test_parse_json_round_trip() {
        let data = run(json!({"input": "{\"a\": 1}", "operation": "parse_json"})).await.unwrap();
        assert_eq!(data["result"]["a"], json!(1));

        let data = run(json!({"input": {"a": 1}, "operation": "stringify"})).await.unwrap();
        assert_eq!(data["result"], json!("{\"a\":1}"));
    }

    #[tokio::test]
    async fn test_bad_json_fails() {
        assert!(run(json!({"input": "not json", "operation": "parse_json"})).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_operation_rejected() {
        assert!(run(json!({"input": "x", "operation": "frobnicate"})).await.is_err());
    }
}
