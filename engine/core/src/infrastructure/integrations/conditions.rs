// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Branch and filter conditions.
//!
//! Conditions arrive already hydrated by the registry (with string scalars
//! quoted, so `{{$vars.status}} === "active"` becomes a well-formed
//! comparison). The evaluator understands JS-style comparison operators over
//! JSON literals; a bare operand falls back to truthiness.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::context::ExecutionContext;
use crate::domain::integration::{
    ConfigSchema, FieldType, Integration, IntegrationDescriptor, IntegrationError, SchemaField,
};
use crate::domain::workflow::NodeKind;

/// Comparison operators, longest first so `===` is found before `==`.
const OPERATORS: [&str; 8] = ["===", "!==", "==", "!=", ">=", "<=", ">", "<"];

/// Evaluate a hydrated condition expression to a boolean.
pub(crate) fn evaluate_condition(expression: &str) -> Result<bool, IntegrationError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(IntegrationError::InvalidConfig(
            "condition is empty".to_string(),
        ));
    }

    for op in OPERATORS {
        if let Some(index) = expression.find(op) {
            let lhs = parse_operand(&expression[..index]);
            let rhs = parse_operand(&expression[index + op.len()..]);
            return Ok(compare(&lhs, op, &rhs));
        }
    }

    Ok(is_truthy_literal(expression))
}

/// Parse one side of a comparison: JSON literals (numbers, booleans, null,
/// quoted strings) parse as themselves, anything else is a bare string.
fn parse_operand(raw: &str) -> Value {
    let raw = raw.trim();
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn compare(lhs: &Value, op: &str, rhs: &Value) -> bool {
    match op {
        "===" | "==" => loosely_equal(lhs, rhs),
        "!==" | "!=" => !loosely_equal(lhs, rhs),
        _ => {
            // Ordering: numeric when both sides are numbers, lexicographic for
            // strings, false for anything incomparable.
            if let (Some(l), Some(r)) = (lhs.as_f64(), rhs.as_f64()) {
                match op {
                    ">" => l > r,
                    "<" => l < r,
                    ">=" => l >= r,
                    "<=" => l <= r,
                    _ => false,
                }
            } else if let (Some(l), Some(r)) = (lhs.as_str(), rhs.as_str()) {
                match op {
                    ">" => l > r,
                    "<" => l < r,
                    ">=" => l >= r,
                    "<=" => l <= r,
                    _ => false,
                }
            } else {
                false
            }
        }
    }
}

fn loosely_equal(lhs: &Value, rhs: &Value) -> bool {
    if lhs == rhs {
        return true;
    }
    // "42" == 42: compare rendered forms when the JSON types differ.
    scalar_text(lhs) == scalar_text(rhs)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy_literal(raw: &str) -> bool {
    !matches!(raw, "false" | "null" | "undefined" | "0" | "\"\"" | "''" | "")
}

// ============================================================================
// branch_condition
// ============================================================================

/// Logic node whose boolean outcome prunes downstream traversal: the engine
/// records `data.result` as the branch decision for this node.
pub struct BranchCondition {
    descriptor: IntegrationDescriptor,
}

impl Default for BranchCondition {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchCondition {
    pub fn new() -> Self {
        Self {
            descriptor: IntegrationDescriptor::new(
                "branch_condition",
                "Branch",
                "Evaluates a condition and routes execution down the true or false path",
                NodeKind::Logic,
                ConfigSchema::new(
                    vec![SchemaField::new("condition", "Condition", FieldType::Textarea)
                        .with_expressions()],
                    &["condition"],
                ),
            ),
        }
    }
}

#[async_trait]
impl Integration for BranchCondition {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
        let condition = config
            .get("condition")
            .and_then(Value::as_str)
            .ok_or_else(|| IntegrationError::InvalidConfig("condition is required".to_string()))?;

        let result = evaluate_condition(condition)?;

        Ok(json!({
            "result": result,
            "condition": condition,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

// ============================================================================
// filter_condition
// ============================================================================

/// Logic node reporting whether its condition passes. Unlike a branch it
/// records no decision; downstream nodes always run and can inspect
/// `data.passed`.
pub struct FilterCondition {
    descriptor: IntegrationDescriptor,
}

impl Default for FilterCondition {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterCondition {
    pub fn new() -> Self {
        Self {
            descriptor: IntegrationDescriptor::new(
                "filter_condition",
                "Filter",
                "Evaluates a condition and reports whether the data passes",
                NodeKind::Logic,
                ConfigSchema::new(
                    vec![SchemaField::new("condition", "Condition", FieldType::Textarea)
                        .with_expressions()],
                    &["condition"],
                ),
            ),
        }
    }
}

#[async_trait]
impl Integration for FilterCondition {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
        let condition = config
            .get("condition")
            .and_then(Value::as_str)
            .ok_or_else(|| IntegrationError::InvalidConfig("condition is required".to_string()))?;

        let passed = evaluate_condition(condition)?;

        Ok(json!({
            "passed": passed,
            "condition": condition,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::ExecutionId;

    #[test]
    fn test_bare_literals() {
        assert!(evaluate_condition("true").unwrap());
        assert!(!evaluate_condition("false").unwrap());
        assert!(!evaluate_condition("null").unwrap());
        assert!(!evaluate_condition("0").unwrap());
        assert!(evaluate_condition("anything else").unwrap());
        assert!(evaluate_condition("  true  ").unwrap());
    }

    #[test]
    fn test_strict_equality() {
        assert!(evaluate_condition("\"active\" === \"active\"").unwrap());
        assert!(!evaluate_condition("\"active\" === \"inactive\"").unwrap());
        assert!(evaluate_condition("5 === 5").unwrap());
    }

    #[test]
    fn test_loose_equality_crosses_types() {
        assert!(evaluate_condition("\"42\" == 42").unwrap());
        assert!(evaluate_condition("42 != \"41\"").unwrap());
    }

    #[test]
    fn test_numeric_ordering() {
        assert!(evaluate_condition("5 > 3").unwrap());
        assert!(!evaluate_condition("3 > 5").unwrap());
        assert!(evaluate_condition("3.5 >= 3.5").unwrap());
        assert!(evaluate_condition("2 <= 10").unwrap());
    }

    #[test]
    fn test_string_ordering_is_lexicographic() {
        assert!(evaluate_condition("\"b\" > \"a\"").unwrap());
        assert!(!evaluate_condition("\"a\" > \"b\"").unwrap());
    }

    #[test]
    fn test_empty_condition_is_an_error() {
        assert!(evaluate_condition("   ").is_err());
    }

    #[tokio::test]
    async fn test_branch_condition_payload() {
        let ctx = ExecutionContext::new(ExecutionId::new());
        let data = BranchCondition::new()
            .execute(&json!({"condition": "true"}), &ctx)
            .await
            .unwrap();
        assert_eq!(data["result"], json!(true));
        assert!(data["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_filter_condition_payload() {
        let ctx = ExecutionContext::new(ExecutionId::new());
        let data = FilterCondition::new()
            .execute(&json!({"condition": "1 > 2"}), &ctx)
            .await
            .unwrap();
        assert_eq!(data["passed"], json!(false));
    }

    #[tokio::test]
    async fn test_missing_condition_rejected() {
        let ctx = ExecutionContext::new(ExecutionId::new());
        assert!(BranchCondition::new().execute(&json!({}), &ctx).await.is_err());
    }
}
