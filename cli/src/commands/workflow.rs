// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Workflow command implementations
//!
//! Thin client over a running engine's HTTP API.
//!
//! # Commands
//!
//! - `relay workflow list` - List persisted workflows
//! - `relay workflow show <id>` - Show a workflow's graph
//! - `relay workflow execute <id>` - Enqueue an execution, optionally watch it

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// List all persisted workflows
    List,

    /// Show a workflow's nodes and edges
    Show {
        /// Workflow ID
        #[arg(value_name = "WORKFLOW_ID")]
        id: Uuid,
    },

    /// Enqueue an execution of a workflow
    Execute {
        /// Workflow ID
        #[arg(value_name = "WORKFLOW_ID")]
        id: Uuid,

        /// Poll the execution until it reaches a terminal status
        #[arg(long, short = 'w')]
        watch: bool,
    },
}

pub async fn handle_command(command: WorkflowCommand, host: &str, port: u16) -> Result<()> {
    let client = ApiClient::new(host, port);
    match command {
        WorkflowCommand::List => list_workflows(&client).await,
        WorkflowCommand::Show { id } => show_workflow(&client, id).await,
        WorkflowCommand::Execute { id, watch } => execute_workflow(&client, id, watch).await,
    }
}

// ============================================================================
// API Client
// ============================================================================

struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{host}:{port}"),
            http: reqwest::Client::new(),
        }
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .with_context(|| format!("Is the engine running at {}?", self.base_url))?;
        Self::into_json(response).await
    }

    async fn post(&self, path: &str) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .send()
            .await
            .with_context(|| format!("Is the engine running at {}?", self.base_url))?;
        Self::into_json(response).await
    }

    async fn into_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response.json().await.context("Invalid response body")?;
        if !status.is_success() {
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            bail!("{status}: {message}");
        }
        Ok(body)
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn list_workflows(client: &ApiClient) -> Result<()> {
    let workflows = client.get("/workflows").await?;
    let Some(workflows) = workflows.as_array() else {
        bail!("Unexpected response shape");
    };

    if workflows.is_empty() {
        println!("{}", "No workflows.".yellow());
        return Ok(());
    }

    println!("{:<38} {:<24} {:<8} NODES", "ID", "NAME", "STATUS");
    for wf in workflows {
        println!(
            "{:<38} {:<24} {:<8} {}",
            wf["id"].as_str().unwrap_or("-"),
            wf["name"].as_str().unwrap_or("-"),
            wf["status"].as_str().unwrap_or("-"),
            wf["nodes"].as_array().map(Vec::len).unwrap_or(0),
        );
    }
    Ok(())
}

async fn show_workflow(client: &ApiClient, id: Uuid) -> Result<()> {
    let workflows = client.get("/workflows").await?;
    let workflow = workflows
        .as_array()
        .and_then(|list| {
            list.iter()
                .find(|w| w["id"].as_str() == Some(id.to_string().as_str()))
        })
        .cloned();

    match workflow {
        Some(workflow) => {
            println!("{}", serde_json::to_string_pretty(&workflow)?);
            Ok(())
        }
        None => bail!("Workflow {id} not found"),
    }
}

async fn execute_workflow(client: &ApiClient, id: Uuid, watch: bool) -> Result<()> {
    let response = client.post(&format!("/workflows/{id}/execute")).await?;
    let execution_id = response
        .get("executionId")
        .and_then(Value::as_str)
        .context("Response is missing executionId")?
        .to_string();

    println!("Execution {} {}", execution_id.bold(), "queued".green());
    if !watch {
        return Ok(());
    }

    loop {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let status = client.get(&format!("/executions/{execution_id}/status")).await?;
        let state = status["status"].as_str().unwrap_or("unknown");
        match state {
            "completed" => {
                println!("{}", "completed".green().bold());
                print_steps(&status);
                return Ok(());
            }
            "failed" => {
                let reason = status["error_message"].as_str().unwrap_or("unknown error");
                println!("{}: {reason}", "failed".red().bold());
                print_steps(&status);
                bail!("Execution failed");
            }
            other => println!("  {other}…"),
        }
    }
}

fn print_steps(status: &Value) {
    let Some(steps) = status["steps"].as_array() else {
        return;
    };
    for step in steps {
        let node = step["node_id"].as_str().unwrap_or("-");
        let step_status = step["status"].as_str().unwrap_or("-");
        let marker = match step_status {
            "completed" => "✓".green(),
            "failed" => "✗".red(),
            _ => "·".normal(),
        };
        println!("  {marker} {node} ({step_status})");
    }
}
