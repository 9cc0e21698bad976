//! The immutable execution context threaded through a run.
//!
//! Three independent sub-contexts — step results, user variables, loop
//! state — compose into [`ExecutionContext`]. Every operation returns a new
//! value and leaves its input untouched; callers rebind the result to
//! continue the chain. A context is created once per run, threaded by value
//! through every step, and discarded when the run ends.

use crate::step::{StepId, StepRecord};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Results of the steps visited so far, keyed by step id.
///
/// Append-only: entries are never removed, only added or overwritten by a
/// revisit of the same id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StepContext {
    pub(crate) steps: HashMap<StepId, StepRecord>,
}

/// User-defined key/value store, seeded once from the workflow's `vars`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct VarContext {
    pub(crate) vars: HashMap<String, Value>,
}

/// Current `forEach` iteration frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForEachFrame {
    pub item: Value,
    pub index: u64,
    pub total: u64,
}

/// Current counted-loop frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopFrame {
    pub index: u64,
    pub count: u64,
}

/// Loop state visible at this point of the run.
///
/// At most one of the two frames is set in normal usage, but entering one
/// does not clear the other; only [`ExecutionContext::exiting_loop`] clears
/// both.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoopContext {
    #[serde(rename = "forEach")]
    pub(crate) for_each: Option<ForEachFrame>,
    #[serde(rename = "loop")]
    pub(crate) loop_: Option<LoopFrame>,
}

/// The immutable aggregate of step results, user variables, and loop state.
///
/// # Examples
///
/// ```
/// use karakuri::ExecutionContext;
/// use serde_json::json;
///
/// let ctx = ExecutionContext::new();
/// let seeded = ctx.with_var("name", json!("alice"));
///
/// // the original is untouched; the caller rebinds
/// assert!(ctx.var("name").is_none());
/// assert_eq!(seeded.var("name"), Some(&json!("alice")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionContext {
    pub(crate) steps: StepContext,
    pub(crate) vars: VarContext,
    #[serde(flatten)]
    pub(crate) loops: LoopContext,
}

impl ExecutionContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a context with `record` stored at `steps[id]`.
    pub fn with_step_result(&self, id: impl Into<StepId>, record: StepRecord) -> Self {
        let mut next = self.clone();
        next.steps.steps.insert(id.into(), record);
        next
    }

    /// Returns a context with the variable `key` set.
    pub fn with_var(&self, key: impl Into<String>, value: Value) -> Self {
        let mut next = self.clone();
        next.vars.vars.insert(key.into(), value);
        next
    }

    /// Returns a context extended with every entry of `vars`.
    pub fn with_vars(&self, vars: HashMap<String, Value>) -> Self {
        let mut next = self.clone();
        next.vars.vars.extend(vars);
        next
    }

    /// Returns a context positioned inside a `forEach` iteration.
    pub fn entering_for_each(&self, item: Value, index: u64, total: u64) -> Self {
        let mut next = self.clone();
        next.loops.for_each = Some(ForEachFrame { item, index, total });
        next
    }

    /// Returns a context positioned inside a counted loop.
    pub fn entering_loop(&self, index: u64, count: u64) -> Self {
        let mut next = self.clone();
        next.loops.loop_ = Some(LoopFrame { index, count });
        next
    }

    /// Returns a context with both loop frames cleared.
    pub fn exiting_loop(&self) -> Self {
        let mut next = self.clone();
        next.loops.for_each = None;
        next.loops.loop_ = None;
        next
    }

    /// Looks up a recorded step result.
    pub fn step_result(&self, id: &str) -> Option<&StepRecord> {
        self.steps.steps.get(id)
    }

    /// Looks up a user variable.
    pub fn var(&self, key: &str) -> Option<&Value> {
        self.vars.vars.get(key)
    }

    /// Current `forEach` frame, if any.
    pub fn for_each(&self) -> Option<&ForEachFrame> {
        self.loops.for_each.as_ref()
    }

    /// Current loop frame, if any.
    pub fn current_loop(&self) -> Option<&LoopFrame> {
        self.loops.loop_.as_ref()
    }

    /// Flattens the context to `{steps, vars, forEach, loop}` for the
    /// resolvers and the expression evaluator.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
