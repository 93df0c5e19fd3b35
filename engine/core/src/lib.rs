// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # relay-core
//!
//! The runtime heart of Relay, the 100monkeys.ai workflow automation engine.
//! This crate owns the domain model, the queued execution engine, the
//! integration registry, the persistence layer, and the HTTP presentation
//! surface.
//!
//! ## Layer Structure
//!
//! ```text
//! presentation/   ← HTTP API (axum)
//!     ↓
//! application/    ← Execution engine, integration registry, queue processor
//!     ↓
//! domain/         ← Aggregates, value objects, expression evaluator,
//!                   repository traits
//! infrastructure/ ← Postgres + in-memory repositories, builtin integrations
//! ```
//!
//! ## Execution Pipeline
//!
//! ```text
//! POST /executions → Store (pending) → QueueProcessor claims (running)
//!     → ExecutionEngine walks the graph in topological order
//!     → IntegrationRegistry hydrates configs and dispatches executors
//!     → Store records one ExecutionStep per evaluated node
//!     → execution finalized (completed | failed)
//! ```
//!
//! Integration tests covering the end-to-end pipeline live in
//! `engine/core/tests/`.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
