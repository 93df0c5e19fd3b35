// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Builtin integration portfolio.
//!
//! These are the integrations the engine ships with; anything else plugs in
//! through the registry at startup. Executors return their `data` payload and
//! signal failure as `Err`; the registry owns the result envelope.

pub mod conditions;
pub mod http;
pub mod timing;
pub mod transform;
pub mod triggers;
pub mod variables;

use std::sync::Arc;

use crate::application::registry::IntegrationRegistry;

/// Registry preloaded with the bundled integrations, ready to inject into the
/// engine.
pub fn builtin_registry() -> IntegrationRegistry {
    let mut registry = IntegrationRegistry::new();
    registry.register(Arc::new(triggers::ManualTrigger::new()));
    registry.register(Arc::new(triggers::WebhookTrigger::new()));
    registry.register(Arc::new(triggers::ScheduleTrigger::new()));
    registry.register(Arc::new(variables::SetVariable::new()));
    registry.register(Arc::new(timing::Delay::new()));
    registry.register(Arc::new(conditions::BranchCondition::new()));
    registry.register(Arc::new(conditions::FilterCondition::new()));
    registry.register(Arc::new(transform::TransformData::new()));
    registry.register(Arc::new(http::ApiRequest::new()));
    registry
}
