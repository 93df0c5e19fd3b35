// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Trigger integrations.
//!
//! Triggers are the launch points of a graph. Execution here is on-demand:
//! when a run reaches a trigger node it simply records what launched the
//! workflow. Live webhook listeners and schedulers are collaborators that
//! enqueue executions through the same API entry.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::context::ExecutionContext;
use crate::domain::integration::{
    ConfigSchema, FieldType, Integration, IntegrationDescriptor, IntegrationError, SchemaField,
};
use crate::domain::workflow::NodeKind;

pub struct ManualTrigger {
    descriptor: IntegrationDescriptor,
}

impl Default for ManualTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self {
            descriptor: IntegrationDescriptor::new(
                "manual_trigger",
                "Manual Trigger",
                "Starts the workflow when executed on demand",
                NodeKind::Trigger,
                ConfigSchema::default(),
            ),
        }
    }
}

#[async_trait]
impl Integration for ManualTrigger {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    async fn execute(&self, _config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
        Ok(json!({
            "triggered": true,
            "triggeredBy": "manual",
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

pub struct WebhookTrigger {
    descriptor: IntegrationDescriptor,
}

impl Default for WebhookTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookTrigger {
    pub fn new() -> Self {
        Self {
            descriptor: IntegrationDescriptor::new(
                "webhook_trigger",
                "Webhook Trigger",
                "Starts the workflow from an incoming HTTP call",
                NodeKind::Trigger,
                ConfigSchema::new(
                    vec![
                        SchemaField::new("path", "Path", FieldType::Text),
                        SchemaField::new("method", "Method", FieldType::Select)
                            .with_options(&["GET", "POST", "PUT", "DELETE"]),
                    ],
                    &[],
                ),
            ),
        }
    }
}

#[async_trait]
impl Integration for WebhookTrigger {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
        let method = config.get("method").and_then(Value::as_str).unwrap_or("POST");
        let path = config.get("path").and_then(Value::as_str).unwrap_or("/");

        Ok(json!({
            "triggered": true,
            "triggeredBy": "webhook",
            "method": method,
            "path": path,
            "payload": {},
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}

pub struct ScheduleTrigger {
    descriptor: IntegrationDescriptor,
}

impl Default for ScheduleTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleTrigger {
    pub fn new() -> Self {
        Self {
            descriptor: IntegrationDescriptor::new(
                "schedule_trigger",
                "Schedule Trigger",
                "Starts the workflow on a recurring schedule",
                NodeKind::Trigger,
                ConfigSchema::new(
                    vec![SchemaField::new("cron", "Cron Expression", FieldType::Text)],
                    &[],
                ),
            ),
        }
    }
}

#[async_trait]
impl Integration for ScheduleTrigger {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
        let cron = config.get("cron").and_then(Value::as_str).unwrap_or("* * * * *");

        Ok(json!({
            "triggered": true,
            "triggeredBy": "schedule",
            "schedule": cron,
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}
