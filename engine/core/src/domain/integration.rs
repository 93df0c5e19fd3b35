// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration Contract
//!
//! An integration binds a node subtype to a config schema, an optional
//! validator, and an async executor. Executors signal failure as `Err`
//! values; the registry converts panics at the boundary, so a failing
//! integration can never take the engine down with it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::context::ExecutionContext;
use crate::domain::workflow::NodeKind;

/// Subtypes the engine itself is aware of: branch decisions prune downstream
/// traversal, and set-variable results are mirrored into the context.
pub const BRANCH_CONDITION: &str = "branch_condition";
pub const SET_VARIABLE: &str = "set_variable";

// ============================================================================
// Result Envelope
// ============================================================================

/// Envelope attached to every integration result by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// Wall-clock executor time in milliseconds.
    #[serde(rename = "executionTime", skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
}

/// Outcome of one integration dispatch.
///
/// `data` is structured-but-opaque: a nested key/value tree carrying a string
/// `timestamp`. Consumers reach into it only through the expression
/// evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: ResultMetadata,
}

impl IntegrationResult {
    pub fn success(data: Value, metadata: ResultMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata,
        }
    }

    pub fn failure(error: impl Into<String>, metadata: ResultMetadata) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata,
        }
    }
}

// ============================================================================
// Config Schema
// ============================================================================

/// Editor-facing field type; the runtime only distinguishes shapes through
/// validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Select,
    Number,
    Boolean,
    Email,
    Url,
}

/// Per-field validation predicate.
pub type FieldValidator = fn(&Value) -> Result<(), String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default)]
    pub support_expressions: bool,
    #[serde(skip)]
    pub validator: Option<FieldValidator>,
}

impl SchemaField {
    pub fn new(key: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            field_type,
            options: Vec::new(),
            support_expressions: false,
            validator: None,
        }
    }

    pub fn with_expressions(mut self) -> Self {
        self.support_expressions = true;
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_validator(mut self, validator: FieldValidator) -> Self {
        self.validator = Some(validator);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub fields: Vec<SchemaField>,
    #[serde(default)]
    pub required: Vec<String>,
}

/// Result of config validation: field key → message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub errors: HashMap<String, String>,
}

impl ValidationOutcome {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: HashMap::new(),
        }
    }

    pub fn invalid(errors: HashMap<String, String>) -> Self {
        Self {
            valid: false,
            errors,
        }
    }
}

impl ConfigSchema {
    pub fn new(fields: Vec<SchemaField>, required: &[&str]) -> Self {
        Self {
            fields,
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Default validation: every `required` key present and truthy, then each
    /// field validator applied to defined values. Errors accumulate per
    /// field.
    pub fn validate(&self, config: &Value) -> ValidationOutcome {
        let mut errors = HashMap::new();

        for key in &self.required {
            let present = config.get(key).map(is_truthy).unwrap_or(false);
            if !present {
                errors.insert(key.clone(), format!("'{key}' is required"));
            }
        }

        for field in &self.fields {
            let Some(validator) = field.validator else { continue };
            let Some(value) = config.get(&field.key) else { continue };
            if value.is_null() {
                continue;
            }
            if let Err(message) = validator(value) {
                errors.entry(field.key.clone()).or_insert(message);
            }
        }

        if errors.is_empty() {
            ValidationOutcome::ok()
        } else {
            ValidationOutcome::invalid(errors)
        }
    }
}

/// JS-style truthiness, matching how the editor treats unset fields.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Descriptor & Executor
// ============================================================================

/// Informational auth requirement, surfaced to the editor only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequirement {
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: NodeKind,
    pub version: String,
    pub schema: ConfigSchema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthRequirement>,
}

impl IntegrationDescriptor {
    pub fn new(id: &str, name: &str, description: &str, category: NodeKind, schema: ConfigSchema) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category,
            version: "1.0.0".to_string(),
            schema,
            auth: None,
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_auth(mut self, kind: &str) -> Self {
        self.auth = Some(AuthRequirement {
            kind: kind.to_string(),
        });
        self
    }
}

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("{0}")]
    Failed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// The uniform executor contract behind every node subtype.
///
/// `execute` returns the result's `data` payload; the registry wraps it into
/// an [`IntegrationResult`] with timing and category metadata. A custom
/// `validate` overrides the schema-driven default when present.
#[async_trait]
pub trait Integration: Send + Sync {
    fn descriptor(&self) -> &IntegrationDescriptor;

    fn validate(&self, _config: &Value) -> Option<ValidationOutcome> {
        None
    }

    async fn execute(&self, config: &Value, ctx: &ExecutionContext) -> Result<Value, IntegrationError>;
}
