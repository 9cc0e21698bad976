//! Data bindings: `${path}` interpolation and structural resolution of
//! step payloads against the live context.

use crate::context::ExecutionContext;
use crate::path::get_by_path;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid interpolation pattern"));
static WHOLE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{([^}]+)\}$").expect("valid interpolation pattern"));

/// A declarative instruction for deriving a field's runtime value.
///
/// `valueFrom` looks up a context path, `template` interpolates a string,
/// and `default` backstops both. Any object carrying one of the first two
/// keys is treated as a binding by [`resolve_bindings`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Interpolates `${path}` tokens in `template` against the context.
///
/// A string that is exactly one token returns the resolved value
/// unconverted, preserving its type; anything else renders as a string with
/// each token replaced by its display form (`None`/null become empty,
/// objects and arrays their compact JSON text).
///
/// # Examples
///
/// ```
/// use karakuri::{interpolate, ExecutionContext};
/// use serde_json::json;
///
/// let ctx = ExecutionContext::new().with_var("n", json!(42));
///
/// assert_eq!(interpolate("${vars.n}", &ctx), json!(42));
/// assert_eq!(interpolate("n=${vars.n}", &ctx), json!("n=42"));
/// ```
pub fn interpolate(template: &str, ctx: &ExecutionContext) -> Value {
    if let Some(caps) = WHOLE_TOKEN_RE.captures(template) {
        return get_by_path(ctx, &caps[1]).unwrap_or(Value::Null);
    }
    if !template.contains("${") {
        return Value::String(template.to_string());
    }
    let rendered = TOKEN_RE.replace_all(template, |caps: &regex::Captures<'_>| {
        display_form(get_by_path(ctx, &caps[1]).as_ref())
    });
    Value::String(rendered.into_owned())
}

/// Renders `template` to its string form regardless of token shape.
///
/// Used where a string is required no matter what the binding resolves to,
/// e.g. the workflow's target URL.
pub fn render(template: &str, ctx: &ExecutionContext) -> String {
    match interpolate(template, ctx) {
        Value::String(s) => s,
        other => display_form(Some(&other)),
    }
}

/// Resolves one [`Binding`] against the context.
///
/// `valueFrom` falls back to `default` when the lookup misses; `template`
/// falls back when the result is null or empty. Resolution never fails —
/// a binding with neither source yields its `default`, and no `default`
/// yields `Value::Null`.
pub fn resolve_binding(binding: &Binding, ctx: &ExecutionContext) -> Value {
    let fallback = || binding.default.clone().unwrap_or(Value::Null);

    if let Some(path) = &binding.value_from {
        return get_by_path(ctx, path).unwrap_or_else(fallback);
    }
    if let Some(template) = &binding.template {
        let value = interpolate(template, ctx);
        let empty = matches!(value, Value::Null)
            || matches!(&value, Value::String(s) if s.is_empty());
        return if empty { fallback() } else { value };
    }
    fallback()
}

/// Recursively resolves every binding and interpolation token in `value`,
/// preserving its structure.
///
/// Strings interpolate, arrays map element-wise, objects carrying a
/// `valueFrom` or `template` key resolve as a [`Binding`], other objects
/// recurse per key, and remaining values pass through unchanged. This is
/// how a step's entire block payload is resolved before dispatch.
pub fn resolve_bindings(value: &Value, ctx: &ExecutionContext) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => interpolate(s, ctx),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_bindings(v, ctx)).collect())
        }
        Value::Object(map) => {
            if map.contains_key("valueFrom") || map.contains_key("template") {
                let binding = Binding {
                    value_from: map
                        .get("valueFrom")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    template: map
                        .get("template")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    default: map.get("default").cloned(),
                };
                resolve_binding(&binding, ctx)
            } else {
                Value::Object(
                    map.iter()
                        .map(|(k, v)| (k.clone(), resolve_bindings(v, ctx)))
                        .collect(),
                )
            }
        }
        other => other.clone(),
    }
}

/// String form of a resolved value for template substitution.
pub(crate) fn display_form(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(composite) => serde_json::to_string(composite).unwrap_or_default(),
    }
}
