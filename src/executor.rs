//! Single-step execution: guard check, binding resolution, timed and
//! retried dispatch, result recording, and the next-step decision.

use crate::binding::resolve_bindings;
use crate::condition;
use crate::context::ExecutionContext;
use crate::step::{Step, StepId, StepRecord};
use crate::traits::{BlockExecutor, SurfaceId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// One entry of the execution trace.
///
/// Richer than the [`StepRecord`] stored in the context — it carries
/// timing, the attempt count, and the last message — and is accumulated
/// per run without ever being fed back into the context.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub step_id: StepId,
    pub skipped: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub result: Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attempts: u32,
}

/// What executing one step produced: the successor context, the trace
/// entry, and the id of the next step (if any).
#[derive(Debug)]
pub struct StepOutcome {
    pub context: ExecutionContext,
    pub entry: TraceEntry,
    pub next: Option<StepId>,
}

/// Runs one step against the context.
///
/// Failure is local and recoverable: an erroring or timed-out dispatch is
/// retried per the step's policy, and exhausting retries surfaces only as
/// `success=false` in the recorded result — branching decides what happens
/// next. Nothing in here returns an error.
pub async fn run_step(
    step: &Step,
    ctx: &ExecutionContext,
    blocks: &dyn BlockExecutor,
    surface: &SurfaceId,
) -> StepOutcome {
    let started_at = Utc::now();
    let mut attempts = 0u32;

    let (record, message) = if !condition::guard_allows(step.when.as_ref(), ctx) {
        debug!(step = %step.id, "guard condition not met, skipping");
        (StepRecord::skipped(), None)
    } else if let Some(block) = &step.block {
        let retry = step.retry.clone().unwrap_or_default();
        let total = retry.attempts();
        let mut record = StepRecord::failure(Value::Null);
        let mut message = None;

        for attempt in 1..=total {
            attempts = attempt;
            let payload = resolve_bindings(block, ctx);

            match dispatch(blocks, payload, surface, step.timeout_ms).await {
                Ok(output) if !output.has_error => {
                    record = StepRecord::success(output.data);
                    message = output.message;
                    break;
                }
                Ok(output) => {
                    message = output
                        .message
                        .or_else(|| Some("block reported an error".to_string()));
                }
                Err(failure) => {
                    message = Some(failure);
                }
            }

            warn!(
                step = %step.id,
                attempt,
                total,
                message = message.as_deref().unwrap_or(""),
                "block attempt failed"
            );
            if attempt < total {
                sleep(retry.delay_before_attempt(attempt)).await;
            }
        }
        (record, message)
    } else {
        debug!(step = %step.id, "no block to execute, skipping");
        (StepRecord::skipped(), None)
    };

    let context = ctx.with_step_result(step.id.clone(), record.clone());
    let next = decide_next(step, &context, record.success);
    let entry = TraceEntry {
        step_id: step.id.clone(),
        skipped: record.skipped,
        success: record.success,
        message,
        result: record.result,
        started_at,
        finished_at: Utc::now(),
        attempts,
    };

    StepOutcome {
        context,
        entry,
        next,
    }
}

/// Dispatches the resolved payload, racing the optional per-attempt
/// deadline against the call.
///
/// A timeout fails the attempt locally; the losing dispatch is not
/// cancelled and may still run to completion in the background.
async fn dispatch(
    blocks: &dyn BlockExecutor,
    payload: Value,
    surface: &SurfaceId,
    timeout_ms: Option<u64>,
) -> Result<crate::traits::BlockOutput, String> {
    match timeout_ms {
        Some(ms) => match timeout(Duration::from_millis(ms), blocks.execute(payload, surface)).await
        {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("block dispatch timed out after {ms}ms")),
        },
        None => blocks
            .execute(payload, surface)
            .await
            .map_err(|e| e.to_string()),
    }
}

/// Decides the next step, in priority order: the first matching `switch`
/// case, then `onSuccess`/`onFailure`, then `next`, then termination.
///
/// Conditions see the context *including* the step's own freshly recorded
/// result, so a step can branch on its own outcome.
fn decide_next(step: &Step, ctx: &ExecutionContext, success: bool) -> Option<StepId> {
    for case in &step.switch {
        if case.when.is_satisfied(ctx) {
            return Some(case.next.clone());
        }
    }
    if success {
        if let Some(id) = &step.on_success {
            return Some(id.clone());
        }
    } else if let Some(id) = &step.on_failure {
        return Some(id.clone());
    }
    step.next.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::step::RetrySpec;
    use crate::traits::BlockOutput;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records every payload and replies from a fixed script.
    struct ScriptedBlocks {
        calls: Mutex<Vec<Value>>,
        failures_before_success: u32,
        seen: AtomicU32,
        output: BlockOutput,
    }

    impl ScriptedBlocks {
        fn succeeding(output: BlockOutput) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failures_before_success: 0,
                seen: AtomicU32::new(0),
                output,
            }
        }

        fn failing_first(failures: u32, output: BlockOutput) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                failures_before_success: failures,
                seen: AtomicU32::new(0),
                output,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or(0)
        }
    }

    #[async_trait]
    impl BlockExecutor for ScriptedBlocks {
        async fn execute(
            &self,
            payload: Value,
            _surface: &SurfaceId,
        ) -> Result<BlockOutput, EngineError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(payload);
            }
            let n = self.seen.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                Ok(BlockOutput::error("transient failure"))
            } else {
                Ok(self.output.clone())
            }
        }
    }

    struct SlowBlocks;

    #[async_trait]
    impl BlockExecutor for SlowBlocks {
        async fn execute(
            &self,
            _payload: Value,
            _surface: &SurfaceId,
        ) -> Result<BlockOutput, EngineError> {
            sleep(Duration::from_millis(500)).await;
            Ok(BlockOutput::ok(json!("too late")))
        }
    }

    fn surface() -> SurfaceId {
        SurfaceId::new("tab-1")
    }

    #[tokio::test]
    async fn test_successful_step_records_result() {
        let blocks = ScriptedBlocks::succeeding(BlockOutput::ok(json!({"text": "hi"})));
        let step = Step::new("a").block(json!({"kind": "get_text"}));
        let ctx = ExecutionContext::new();

        let outcome = run_step(&step, &ctx, &blocks, &surface()).await;

        assert!(outcome.entry.success);
        assert!(!outcome.entry.skipped);
        assert_eq!(outcome.entry.attempts, 1);
        assert_eq!(
            outcome.context.step_result("a").map(|r| r.result.clone()),
            Some(json!({"text": "hi"}))
        );
        assert!(outcome.entry.finished_at >= outcome.entry.started_at);
        // the input context is untouched
        assert!(ctx.step_result("a").is_none());
    }

    #[tokio::test]
    async fn test_guard_false_skips_without_dispatch() {
        let blocks = ScriptedBlocks::succeeding(BlockOutput::ok(json!(1)));
        let step = Step::new("a")
            .when(json!({"equals": {"left": "vars.flag", "right": true}}))
            .block(json!({"kind": "click"}));
        let ctx = ExecutionContext::new().with_var("flag", json!(false));

        let outcome = run_step(&step, &ctx, &blocks, &surface()).await;

        assert_eq!(blocks.call_count(), 0);
        let record = outcome.context.step_result("a").unwrap();
        assert!(record.skipped);
        assert!(record.success);
        assert_eq!(record.result, Value::Null);
        assert_eq!(outcome.entry.attempts, 0);
    }

    #[tokio::test]
    async fn test_blockless_step_skips() {
        let blocks = ScriptedBlocks::succeeding(BlockOutput::ok(json!(1)));
        let step = Step::new("route").next("elsewhere");
        let ctx = ExecutionContext::new();

        let outcome = run_step(&step, &ctx, &blocks, &surface()).await;

        assert_eq!(blocks.call_count(), 0);
        assert!(outcome.entry.skipped);
        assert_eq!(outcome.next, Some(StepId::new("elsewhere")));
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let blocks = ScriptedBlocks::failing_first(2, BlockOutput::ok(json!("ok")));
        let step = Step::new("a").block(json!({})).retry(RetrySpec {
            attempts: 5,
            delay_ms: 1,
            backoff_factor: 1.0,
        });
        let ctx = ExecutionContext::new();

        let outcome = run_step(&step, &ctx, &blocks, &surface()).await;

        assert!(outcome.entry.success);
        assert_eq!(outcome.entry.attempts, 3);
        assert_eq!(blocks.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_and_backoff_waits() {
        let blocks = ScriptedBlocks::failing_first(u32::MAX, BlockOutput::ok(json!(1)));
        let step = Step::new("a").block(json!({})).retry(RetrySpec {
            attempts: 3,
            delay_ms: 20,
            backoff_factor: 2.0,
        });
        let ctx = ExecutionContext::new();

        let started = Instant::now();
        let outcome = run_step(&step, &ctx, &blocks, &surface()).await;

        // waits of 20ms then 40ms between the three attempts
        assert!(started.elapsed() >= Duration::from_millis(60));
        assert!(!outcome.entry.success);
        assert_eq!(outcome.entry.attempts, 3);
        assert_eq!(blocks.call_count(), 3);
        assert_eq!(
            outcome.entry.message.as_deref(),
            Some("transient failure")
        );
    }

    #[tokio::test]
    async fn test_timeout_fails_attempt() {
        let step = Step::new("a").block(json!({})).timeout_ms(30);
        let ctx = ExecutionContext::new();

        let outcome = run_step(&step, &ctx, &SlowBlocks, &surface()).await;

        assert!(!outcome.entry.success);
        assert!(outcome
            .entry
            .message
            .as_deref()
            .is_some_and(|m| m.contains("timed out")));
    }

    #[tokio::test]
    async fn test_payload_resolved_per_attempt() {
        let blocks = ScriptedBlocks::succeeding(BlockOutput::ok(json!(1)));
        let step = Step::new("a").block(json!({
            "kind": "type_text",
            "text": "hello ${vars.name}",
            "count": {"valueFrom": "vars.n", "default": 0},
        }));
        let ctx = ExecutionContext::new()
            .with_var("name", json!("alice"))
            .with_var("n", json!(3));

        run_step(&step, &ctx, &blocks, &surface()).await;

        let calls = blocks.calls.lock().unwrap();
        assert_eq!(calls[0]["text"], json!("hello alice"));
        assert_eq!(calls[0]["count"], json!(3));
    }

    #[tokio::test]
    async fn test_switch_beats_next() {
        let blocks = ScriptedBlocks::succeeding(BlockOutput::ok(json!(1)));
        let step = Step::new("a")
            .block(json!({}))
            .switch_case(json!({"exists": "steps.a.result"}), "matched")
            .next("fallthrough");
        let ctx = ExecutionContext::new();

        let outcome = run_step(&step, &ctx, &blocks, &surface()).await;

        assert_eq!(outcome.next, Some(StepId::new("matched")));
    }

    #[tokio::test]
    async fn test_branch_on_outcome() {
        let failing = ScriptedBlocks::failing_first(u32::MAX, BlockOutput::ok(json!(1)));
        let step = Step::new("a")
            .block(json!({}))
            .on_success("won")
            .on_failure("lost")
            .next("fallthrough");
        let ctx = ExecutionContext::new();

        let outcome = run_step(&step, &ctx, &failing, &surface()).await;
        assert_eq!(outcome.next, Some(StepId::new("lost")));

        let succeeding = ScriptedBlocks::succeeding(BlockOutput::ok(json!(1)));
        let outcome = run_step(&step, &ctx, &succeeding, &surface()).await;
        assert_eq!(outcome.next, Some(StepId::new("won")));
    }

    #[tokio::test]
    async fn test_no_branch_terminates() {
        let blocks = ScriptedBlocks::succeeding(BlockOutput::ok(json!(1)));
        let step = Step::new("a").block(json!({}));
        let ctx = ExecutionContext::new();

        let outcome = run_step(&step, &ctx, &blocks, &surface()).await;
        assert_eq!(outcome.next, None);
    }
}
