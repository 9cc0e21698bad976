use crate::condition::Condition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Type-safe step identifier wrapper.
///
/// Provides compile-time safety for step ids, preventing typos and
/// mismatched ids at the API level.
///
/// # Examples
///
/// ```
/// use karakuri::StepId;
///
/// let id = StepId::new("login");
/// assert_eq!(id.as_str(), "login");
///
/// // From trait for ergonomic conversion
/// let id: StepId = "submit".into();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Creates a new StepId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the step id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Retry policy for block dispatch.
///
/// `attempts` counts every try including the first and is clamped to a
/// minimum of 1. The wait before attempt *k* (k > 1) is
/// `delay_ms * backoff_factor^(k-2)` milliseconds.
///
/// # Examples
///
/// ```
/// use karakuri::RetrySpec;
/// use std::time::Duration;
///
/// let retry = RetrySpec { attempts: 3, delay_ms: 100, backoff_factor: 2.0 };
///
/// // Wait after the first failed attempt, then after the second.
/// assert_eq!(retry.delay_before_attempt(1), Duration::from_millis(100));
/// assert_eq!(retry.delay_before_attempt(2), Duration::from_millis(200));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySpec {
    /// Total attempts including the first. Clamped to at least 1.
    pub attempts: u32,
    /// Base delay between attempts, in milliseconds.
    pub delay_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self {
            attempts: 1,
            delay_ms: 0,
            backoff_factor: 1.0,
        }
    }
}

impl RetrySpec {
    /// Effective attempt count (clamped to at least 1).
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }

    /// Delay to wait after `failed_attempt` (1-indexed) before the next try.
    pub fn delay_before_attempt(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1);
        let millis = self.delay_ms as f64 * self.backoff_factor.powi(exponent as i32);
        if millis.is_finite() && millis > 0.0 {
            Duration::from_millis(millis.round().min(u64::MAX as f64) as u64)
        } else {
            Duration::ZERO
        }
    }
}

/// One branch of a step's `switch` table.
///
/// Cases are evaluated in order after the step's result is recorded; the
/// first matching case decides the next step, ahead of
/// `onSuccess`/`onFailure`/`next`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    pub when: Condition,
    pub next: StepId,
}

/// One unit of work in a workflow graph.
///
/// A step is pure data: an optional guarded action payload (`block`),
/// retry/timeout policy, and branching rules to the next step. The payload
/// content is opaque to the engine — it is resolved against the context and
/// handed to the injected [`BlockExecutor`](crate::BlockExecutor). A step
/// without a `block` is always recorded as skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: StepId,
    /// Opaque action payload; `None` means the step only routes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Value>,
    /// Guard condition; a false guard skips the block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySpec>,
    /// Per-attempt deadline in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Conditional branches, evaluated before `onSuccess`/`onFailure`/`next`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub switch: Vec<SwitchCase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<StepId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<StepId>,
}

impl Step {
    /// Creates a bare step with the given id and no action or branching.
    pub fn new(id: impl Into<StepId>) -> Self {
        Self {
            id: id.into(),
            block: None,
            when: None,
            retry: None,
            timeout_ms: None,
            switch: Vec::new(),
            on_success: None,
            on_failure: None,
            next: None,
        }
    }

    /// Sets the action payload.
    pub fn block(mut self, payload: Value) -> Self {
        self.block = Some(payload);
        self
    }

    /// Sets the guard condition.
    pub fn when(mut self, condition: impl Into<Condition>) -> Self {
        self.when = Some(condition.into());
        self
    }

    /// Sets the retry policy.
    pub fn retry(mut self, retry: RetrySpec) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets the per-attempt timeout in milliseconds.
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Appends a switch case.
    pub fn switch_case(mut self, when: impl Into<Condition>, next: impl Into<StepId>) -> Self {
        self.switch.push(SwitchCase {
            when: when.into(),
            next: next.into(),
        });
        self
    }

    /// Sets the branch taken on success.
    pub fn on_success(mut self, id: impl Into<StepId>) -> Self {
        self.on_success = Some(id.into());
        self
    }

    /// Sets the branch taken on failure.
    pub fn on_failure(mut self, id: impl Into<StepId>) -> Self {
        self.on_failure = Some(id.into());
        self
    }

    /// Sets the unconditional fallback branch.
    pub fn next(mut self, id: impl Into<StepId>) -> Self {
        self.next = Some(id.into());
        self
    }
}

/// What a visited step left in the execution context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub result: Value,
    pub success: bool,
    pub skipped: bool,
}

impl StepRecord {
    /// Record for a step whose guard failed or which had no block.
    pub fn skipped() -> Self {
        Self {
            result: Value::Null,
            success: true,
            skipped: true,
        }
    }

    /// Record for a successful dispatch.
    pub fn success(result: Value) -> Self {
        Self {
            result,
            success: true,
            skipped: false,
        }
    }

    /// Record for a dispatch that failed after exhausting its attempts.
    pub fn failure(result: Value) -> Self {
        Self {
            result,
            success: false,
            skipped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_id() {
        let id = StepId::new("login");
        assert_eq!(id.as_str(), "login");
        assert_eq!(id.to_string(), "login");
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetrySpec::default();
        assert_eq!(retry.attempts(), 1);
        assert_eq!(retry.delay_ms, 0);
        assert_eq!(retry.backoff_factor, 1.0);
        assert_eq!(retry.delay_before_attempt(1), Duration::ZERO);
    }

    #[test]
    fn test_retry_attempts_clamped() {
        let retry = RetrySpec {
            attempts: 0,
            ..RetrySpec::default()
        };
        assert_eq!(retry.attempts(), 1);
    }

    #[test]
    fn test_retry_backoff_arithmetic() {
        let retry = RetrySpec {
            attempts: 4,
            delay_ms: 100,
            backoff_factor: 2.0,
        };
        // delay_ms * factor^(k-1) after failed attempt k
        assert_eq!(retry.delay_before_attempt(1), Duration::from_millis(100));
        assert_eq!(retry.delay_before_attempt(2), Duration::from_millis(200));
        assert_eq!(retry.delay_before_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn test_retry_fixed_delay() {
        let retry = RetrySpec {
            attempts: 3,
            delay_ms: 50,
            backoff_factor: 1.0,
        };
        assert_eq!(retry.delay_before_attempt(1), Duration::from_millis(50));
        assert_eq!(retry.delay_before_attempt(2), Duration::from_millis(50));
    }

    #[test]
    fn test_step_wire_format() {
        let parsed: Step = serde_json::from_value(json!({
            "id": "fetch",
            "block": {"kind": "http"},
            "retry": {"attempts": 3, "delayMs": 100, "backoffFactor": 2.0},
            "timeoutMs": 5000,
            "onFailure": "report",
            "next": "done"
        }))
        .unwrap();

        assert_eq!(parsed.id, StepId::new("fetch"));
        assert_eq!(parsed.timeout_ms, Some(5000));
        assert_eq!(parsed.retry.as_ref().map(|r| r.attempts), Some(3));
        assert_eq!(parsed.on_failure, Some(StepId::new("report")));
        assert_eq!(parsed.next, Some(StepId::new("done")));
        assert!(parsed.switch.is_empty());
        assert!(parsed.when.is_none());
    }

    #[test]
    fn test_step_builder_chain() {
        let step = Step::new("check")
            .block(json!({"kind": "query"}))
            .timeout_ms(1000)
            .switch_case(json!({"exists": "vars.token"}), "authed")
            .on_failure("bail")
            .next("fallthrough");

        assert_eq!(step.switch.len(), 1);
        assert_eq!(step.switch[0].next, StepId::new("authed"));
        assert_eq!(step.next, Some(StepId::new("fallthrough")));
    }

    #[test]
    fn test_step_record_shapes() {
        let skipped = StepRecord::skipped();
        assert!(skipped.skipped);
        assert!(skipped.success);
        assert_eq!(skipped.result, Value::Null);

        let failed = StepRecord::failure(Value::Null);
        assert!(!failed.success);
        assert!(!failed.skipped);
    }
}
