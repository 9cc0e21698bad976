//! Dotted-path resolution over the execution context.
//!
//! Paths are rooted at one of the four context roots — `steps`, `vars`,
//! `forEach`, `loop` — with `.`-separated segments walking into the owned
//! structure, e.g. `steps.login.result.token` or `forEach.item.url`.
//! Numeric segments index into arrays. Resolution is total: any string
//! yields either a value or `None`, never an error. The bare-root
//! convention is canonical throughout the engine; there is no `$.` sigil
//! form.

use crate::context::ExecutionContext;
use serde_json::Value;

const ROOTS: [&str; 4] = ["steps", "vars", "forEach", "loop"];

/// Resolves `path` against the context.
///
/// Returns `None` when the root is not a context root or any intermediate
/// segment is missing; a path that resolves to an explicit JSON `null`
/// returns `Some(Value::Null)`.
///
/// # Examples
///
/// ```
/// use karakuri::{get_by_path, ExecutionContext};
/// use serde_json::json;
///
/// let ctx = ExecutionContext::new().with_var("user", json!({"name": "alice"}));
///
/// assert_eq!(get_by_path(&ctx, "vars.user.name"), Some(json!("alice")));
/// assert_eq!(get_by_path(&ctx, "vars.missing"), None);
/// assert_eq!(get_by_path(&ctx, "nonsense.path"), None);
/// ```
pub fn get_by_path(ctx: &ExecutionContext, path: &str) -> Option<Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    let (root, rest) = match path.split_once('.') {
        Some((root, rest)) => (root, Some(rest)),
        None => (path, None),
    };

    if root == "steps" {
        return resolve_steps(ctx, rest);
    }
    if root == "vars" {
        return resolve_vars(ctx, rest);
    }
    if root == "forEach" || root == "loop" {
        return resolve_loop(ctx, root, rest);
    }
    None
}

/// True when `path` roots at one of the context prefixes.
///
/// Condition operands use this to decide between a context lookup and a
/// literal string.
pub(crate) fn is_context_path(path: &str) -> bool {
    let root = path.trim().split('.').next().unwrap_or("");
    ROOTS.contains(&root)
}

fn resolve_steps(ctx: &ExecutionContext, rest: Option<&str>) -> Option<Value> {
    let rest = match rest {
        None => return serde_json::to_value(&ctx.steps).ok(),
        Some(rest) => rest,
    };
    let mut segments = rest.split('.');
    let id = segments.next()?;
    let record = ctx.steps.steps.get(id)?;
    let value = serde_json::to_value(record).ok()?;
    walk(value, segments)
}

fn resolve_vars(ctx: &ExecutionContext, rest: Option<&str>) -> Option<Value> {
    let rest = match rest {
        None => return serde_json::to_value(&ctx.vars).ok(),
        Some(rest) => rest,
    };
    let mut segments = rest.split('.');
    let key = segments.next()?;
    let value = ctx.vars.vars.get(key)?.clone();
    walk(value, segments)
}

fn resolve_loop(ctx: &ExecutionContext, root: &str, rest: Option<&str>) -> Option<Value> {
    let frame = if root == "forEach" {
        serde_json::to_value(ctx.loops.for_each.as_ref()?).ok()?
    } else {
        serde_json::to_value(ctx.loops.loop_.as_ref()?).ok()?
    };
    match rest {
        None => Some(frame),
        Some(rest) => walk(frame, rest.split('.')),
    }
}

/// Walks `value` segment by segment, short-circuiting to `None` as soon as
/// a segment cannot be followed.
fn walk<'a>(value: Value, segments: impl Iterator<Item = &'a str>) -> Option<Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(mut map) => map.remove(segment)?,
            Value::Array(mut items) => {
                let index: usize = segment.parse().ok()?;
                if index >= items.len() {
                    return None;
                }
                items.swap_remove(index)
            }
            _ => return None,
        };
    }
    Some(current)
}
