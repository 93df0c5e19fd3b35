// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Timing integrations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::context::ExecutionContext;
use crate::domain::integration::{
    ConfigSchema, FieldType, Integration, IntegrationDescriptor, IntegrationError, SchemaField,
};
use crate::domain::workflow::NodeKind;

/// Pauses the execution for a configured duration. The engine imposes no
/// timeout of its own, so the delay bounds itself through its config.
pub struct Delay {
    descriptor: IntegrationDescriptor,
}

impl Default for Delay {
    fn default() -> Self {
        Self::new()
    }
}

impl Delay {
    pub fn new() -> Self {
        Self {
            descriptor: IntegrationDescriptor::new(
                "delay",
                "Delay",
                "Pauses the workflow for a fixed duration",
                NodeKind::Action,
                ConfigSchema::new(
                    vec![
                        SchemaField::new("amount", "Amount", FieldType::Number).with_validator(|v| {
                            match v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())) {
                                Some(amount) if amount >= 0.0 => Ok(()),
                                _ => Err("must be a non-negative number".to_string()),
                            }
                        }),
                        SchemaField::new("unit", "Unit", FieldType::Select)
                            .with_options(&["milliseconds", "seconds", "minutes", "hours"]),
                    ],
                    &["amount"],
                ),
            ),
        }
    }
}

#[async_trait]
impl Integration for Delay {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
        // Hydrated expressions arrive as strings; accept both shapes.
        let amount = config
            .get("amount")
            .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
            .ok_or_else(|| IntegrationError::InvalidConfig("amount is required".to_string()))?;
        if amount < 0.0 {
            return Err(IntegrationError::InvalidConfig(
                "amount must be non-negative".to_string(),
            ));
        }

        let unit = config.get("unit").and_then(Value::as_str).unwrap_or("seconds");
        let factor = match unit {
            "milliseconds" => 1.0,
            "seconds" => 1_000.0,
            "minutes" => 60_000.0,
            "hours" => 3_600_000.0,
            other => {
                return Err(IntegrationError::InvalidConfig(format!(
                    "unknown unit '{other}'"
                )))
            }
        };
        let millis = (amount * factor) as u64;

        tokio::time::sleep(Duration::from_millis(millis)).await;

        Ok(json!({
            "delayedMs": millis,
            "amount": amount,
            "unit": unit,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}
