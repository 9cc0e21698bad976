//! Condition evaluation: the structural JSON condition tree and the
//! detection ladder that routes a condition value to the right interpreter.
//!
//! Evaluation is total. A malformed condition never raises; it either
//! evaluates to `false` (failed leaf, expression error) or falls through
//! the detection ladder to "satisfied", which is the behavior of an absent
//! guard.

use crate::binding;
use crate::context::ExecutionContext;
use crate::expr;
use crate::path::{self, get_by_path};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A predicate over the execution context.
///
/// Carried as raw JSON and interpreted structurally at evaluation time.
/// Three forms are recognized, in this order:
///
/// 1. a **JSON condition** — an object whose single recognized key is one
///    of `exists`, `equals`, `notEquals`, `contains`, `regex`, `and`, `or`,
///    `not`;
/// 2. an **expression condition** — `{"expr": "vars.count > 3"}`, handed to
///    the sandboxed evaluator in [`expr`];
/// 3. a **wrapped JSON condition** — `{"json": {...}}`.
///
/// Anything else is satisfied, matching the semantics of an absent guard;
/// bare booleans evaluate to themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(pub Value);

impl Condition {
    /// Wraps an expression string as a condition.
    pub fn expr(source: impl Into<String>) -> Self {
        let mut map = serde_json::Map::new();
        map.insert("expr".to_string(), Value::String(source.into()));
        Self(Value::Object(map))
    }

    /// Evaluates the condition against the context.
    pub fn is_satisfied(&self, ctx: &ExecutionContext) -> bool {
        evaluate(&self.0, ctx)
    }
}

impl From<Value> for Condition {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Evaluates an optional guard: absent means run.
pub(crate) fn guard_allows(condition: Option<&Condition>, ctx: &ExecutionContext) -> bool {
    condition.map_or(true, |c| c.is_satisfied(ctx))
}

fn evaluate(value: &Value, ctx: &ExecutionContext) -> bool {
    let map = match value {
        Value::Bool(b) => return *b,
        Value::Object(map) => map,
        _ => return true,
    };

    if let Some(path) = map.get("exists") {
        return match path.as_str() {
            Some(path) => get_by_path(ctx, path).is_some(),
            None => false,
        };
    }
    if let Some(operands) = map.get("equals") {
        return eval_equals(operands, ctx);
    }
    if let Some(operands) = map.get("notEquals") {
        return !eval_equals(operands, ctx);
    }
    if let Some(operands) = map.get("contains") {
        return eval_contains(operands, ctx);
    }
    if let Some(operands) = map.get("regex") {
        return eval_regex(operands, ctx);
    }
    if let Some(branches) = map.get("and") {
        return match branches.as_array() {
            Some(branches) => branches.iter().all(|b| evaluate(b, ctx)),
            None => false,
        };
    }
    if let Some(branches) = map.get("or") {
        return match branches.as_array() {
            Some(branches) => branches.iter().any(|b| evaluate(b, ctx)),
            None => false,
        };
    }
    if let Some(inner) = map.get("not") {
        return !evaluate(inner, ctx);
    }
    if let Some(source) = map.get("expr") {
        return match source.as_str() {
            Some(source) => expr::evaluate_bool(source, &ctx.to_value()).unwrap_or(false),
            None => false,
        };
    }
    if let Some(inner) = map.get("json") {
        return evaluate(inner, ctx);
    }
    true
}

/// Resolves a condition operand.
///
/// Strings rooted at a context prefix go through the path resolver (`None`
/// for a miss); other strings interpolate; non-strings are literals.
fn resolve_operand(operand: &Value, ctx: &ExecutionContext) -> Option<Value> {
    match operand {
        Value::String(s) if path::is_context_path(s) => get_by_path(ctx, s),
        Value::String(s) => Some(binding::interpolate(s, ctx)),
        other => Some(other.clone()),
    }
}

fn eval_equals(operands: &Value, ctx: &ExecutionContext) -> bool {
    let left = resolve_operand(&operands["left"], ctx);
    let right = resolve_operand(&operands["right"], ctx);
    match (left, right) {
        (Some(l), Some(r)) => expr::loose_eq(&l, &r),
        (None, None) => true,
        _ => false,
    }
}

fn eval_contains(operands: &Value, ctx: &ExecutionContext) -> bool {
    let value = match resolve_operand(&operands["value"], ctx) {
        Some(v) => v,
        None => return false,
    };
    let search = match resolve_operand(&operands["search"], ctx) {
        Some(s) => binding::display_form(Some(&s)),
        None => return false,
    };
    match value {
        Value::Array(items) => items
            .iter()
            .any(|item| binding::display_form(Some(item)).contains(&search)),
        other => binding::display_form(Some(&other)).contains(&search),
    }
}

fn eval_regex(operands: &Value, ctx: &ExecutionContext) -> bool {
    let value = match resolve_operand(&operands["value"], ctx) {
        Some(v) => binding::display_form(Some(&v)),
        None => return false,
    };
    let pattern = match operands["pattern"].as_str() {
        Some(p) => p,
        None => return false,
    };
    let flags: String = operands["flags"]
        .as_str()
        .unwrap_or("")
        .chars()
        .filter(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
        .collect();
    let full = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{flags}){pattern}")
    };
    match Regex::new(&full) {
        Ok(re) => re.is_match(&value),
        Err(_) => false,
    }
}
