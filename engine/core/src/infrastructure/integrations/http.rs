// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Outbound HTTP requests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};

use crate::domain::context::ExecutionContext;
use crate::domain::integration::{
    ConfigSchema, FieldType, Integration, IntegrationDescriptor, IntegrationError, SchemaField,
};
use crate::domain::workflow::NodeKind;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs an HTTP request against an external service. The engine trusts
/// integrations to bound themselves; this one carries a 30 s client timeout.
pub struct ApiRequest {
    descriptor: IntegrationDescriptor,
    client: reqwest::Client,
}

impl Default for ApiRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiRequest {
    pub fn new() -> Self {
        Self {
            descriptor: IntegrationDescriptor::new(
                "api_request",
                "API Request",
                "Calls an HTTP endpoint and captures the response",
                NodeKind::Action,
                ConfigSchema::new(
                    vec![
                        SchemaField::new("url", "URL", FieldType::Url)
                            .with_expressions()
                            .with_validator(|v| {
                                let url = v.as_str().unwrap_or_default();
                                if url.starts_with("http://") || url.starts_with("https://") {
                                    Ok(())
                                } else {
                                    Err("must be an http(s) URL".to_string())
                                }
                            }),
                        SchemaField::new("method", "Method", FieldType::Select)
                            .with_options(&["GET", "POST", "PUT", "PATCH", "DELETE"]),
                        SchemaField::new("headers", "Headers (JSON)", FieldType::Textarea)
                            .with_expressions(),
                        SchemaField::new("body", "Body", FieldType::Textarea).with_expressions(),
                    ],
                    &["url"],
                ),
            ),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("static client config"),
        }
    }
}

#[async_trait]
impl Integration for ApiRequest {
    fn descriptor(&self) -> &IntegrationDescriptor {
        &self.descriptor
    }

    async fn execute(&self, config: &Value, _ctx: &ExecutionContext) -> Result<Value, IntegrationError> {
        let url = config
            .get("url")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| IntegrationError::InvalidConfig("url is required".to_string()))?;

        let method = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();
        let method = match method.as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            other => {
                return Err(IntegrationError::InvalidConfig(format!(
                    "unknown method '{other}'"
                )))
            }
        };

        let mut request = self.client.request(method.clone(), url);

        // Headers arrive either as a JSON object or as a JSON-encoded string.
        if let Some(headers) = config.get("headers") {
            let headers = match headers {
                Value::String(s) if !s.trim().is_empty() => serde_json::from_str::<Value>(s)
                    .map_err(|e| {
                        IntegrationError::InvalidConfig(format!("headers is not valid JSON: {e}"))
                    })?,
                other => other.clone(),
            };
            if let Value::Object(map) = headers {
                for (name, value) in map {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    request = request.header(&name, value);
                }
            }
        }

        if let Some(body) = config.get("body") {
            match body {
                Value::String(s) if !s.is_empty() => request = request.body(s.clone()),
                Value::Null => {}
                Value::String(_) => {}
                other => request = request.json(other),
            }
        }

        let response = self
            .client
            .execute(request.build().map_err(|e| IntegrationError::Failed(e.to_string()))?)
            .await
            .map_err(|e| IntegrationError::Failed(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IntegrationError::Failed(format!("Failed to read response body: {e}")))?;
        // Structured when possible, raw text otherwise.
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        Ok(json!({
            "status": status.as_u16(),
            "ok": status.is_success(),
            "body": body,
            "url": url,
            "method": method.as_str(),
            "timestamp": Utc::now().to_rfc3339(),
        }))
    }
}
