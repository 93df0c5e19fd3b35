// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Expression Evaluator
//!
//! Substitutes `{{ … }}` references inside node configuration strings against
//! the live [`ExecutionContext`]. Two reference forms are recognized:
//!
//! - `$node.<node_id>.<dotted.path>` walks into a prior node's result
//! - `$vars.<name>[.<dotted.path>]` walks into a named variable
//!
//! Anything else between the braces is preserved literally, and a recognized
//! reference that resolves to nothing substitutes the empty string. Evaluation
//! is idempotent on resolved strings.

use std::collections::HashSet;

use regex::{Captures, Regex};
use serde_json::Value;

use crate::domain::context::ExecutionContext;

/// Stateless evaluator owning the compiled `{{ … }}` scanner.
pub struct ExpressionEvaluator {
    pattern: Regex,
}

impl Default for ExpressionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self {
            // Non-greedy, brace-free body: a stray `{{` without a closing pair
            // stays untouched.
            pattern: Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("expression pattern is valid"),
        }
    }

    /// Substitute every `{{ EXPR }}` occurrence in `text`.
    ///
    /// With `quote` set, substituted string scalars are wrapped in
    /// JS-compatible double quotes so the output can form a comparison
    /// expression (`active === "active"`). Only `branch_condition` hydration
    /// uses that mode.
    pub fn evaluate(&self, text: &str, ctx: &ExecutionContext, quote: bool) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures| {
                let expr = &caps[1];
                match self.resolve(expr, ctx) {
                    Some(value) => render(&value, quote),
                    // Unrecognized form: keep the literal `{{ … }}`.
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    /// Recursively hydrate an arbitrary config value: strings are evaluated to
    /// a fixed point (a seen-set guards against cyclic text), arrays
    /// element-wise, map values in place with keys untouched.
    pub fn hydrate(&self, value: &Value, ctx: &ExecutionContext, quote: bool) -> Value {
        match value {
            Value::String(text) => Value::String(self.evaluate_to_fixed_point(text, ctx, quote)),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.hydrate(v, ctx, quote)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.hydrate(v, ctx, quote)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn evaluate_to_fixed_point(&self, text: &str, ctx: &ExecutionContext, quote: bool) -> String {
        let mut current = text.to_string();
        let mut seen = HashSet::new();
        seen.insert(current.clone());
        loop {
            let next = self.evaluate(&current, ctx, quote);
            if next == current || !seen.insert(next.clone()) {
                return next;
            }
            current = next;
        }
    }

    /// Resolve a recognized reference to its value (`Null` when the reference
    /// is recognized but dangling). Returns `None` for foreign expressions.
    fn resolve(&self, expr: &str, ctx: &ExecutionContext) -> Option<Value> {
        if let Some(rest) = expr.strip_prefix("$node.") {
            let (node_id, path) = match rest.split_once('.') {
                Some((id, path)) => (id, path),
                None => (rest, ""),
            };
            let root = ctx.node_outputs.get(node_id).cloned().unwrap_or(Value::Null);
            return Some(walk_path(&root, path));
        }

        if let Some(rest) = expr.strip_prefix("$vars.") {
            let (name, path) = match rest.split_once('.') {
                Some((name, path)) => (name, path),
                None => (rest, ""),
            };
            let root = ctx.variables.get(name).cloned().unwrap_or(Value::Null);
            return Some(walk_path(&root, path));
        }

        None
    }
}

/// Walk a dotted path: maps index by key, arrays by numeric segment
/// (`data.commits.0.author`); anything else is a dead end.
fn walk_path(root: &Value, path: &str) -> Value {
    if path.is_empty() {
        return root.clone();
    }
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => match map.get(segment) {
                Some(v) => v,
                None => return Value::Null,
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(v) => v,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current.clone()
}

/// Render a resolved value into the surrounding string.
fn render(value: &Value, quote: bool) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => {
            if quote {
                format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            } else {
                s.clone()
            }
        }
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
