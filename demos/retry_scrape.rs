//! Scrapes a flaky page with retry/backoff and failure branching.
//!
//! Run with: `cargo run --example retry_scrape`

use async_trait::async_trait;
use karakuri::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::info;

/// A browser whose extraction block fails twice before succeeding.
struct FlakyBrowser {
    attempts: AtomicU32,
}

#[async_trait]
impl BlockExecutor for FlakyBrowser {
    async fn execute(
        &self,
        payload: Value,
        _surface: &SurfaceId,
    ) -> Result<BlockOutput, EngineError> {
        if payload["kind"] == json!("extract") {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                info!(attempt = n + 1, "extraction failed, page not ready");
                return Ok(BlockOutput::error("element not found"));
            }
        }
        Ok(BlockOutput::ok(json!({"price": "1280"})))
    }
}

struct OneTab;

#[async_trait]
impl TabCreator for OneTab {
    async fn create(
        &self,
        url: &str,
        _activate: bool,
        _origin: Option<&SurfaceId>,
    ) -> Result<SurfaceId, EngineError> {
        info!(url, "opening tab");
        Ok(SurfaceId::new("tab-scrape"))
    }
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let workflow = Workflow::builder()
        .start("extract")
        .step(
            Step::new("extract")
                .block(json!({"kind": "extract", "selector": ".price"}))
                .retry(RetrySpec {
                    attempts: 5,
                    delay_ms: 100,
                    backoff_factor: 2.0,
                })
                .timeout_ms(2000)
                .on_success("report")
                .on_failure("give_up"),
        )
        .step(
            Step::new("report")
                .when(Condition::expr("steps.extract.result.price != null"))
                .block(json!({
                    "kind": "notify",
                    "text": "price is ${steps.extract.result.price}",
                })),
        )
        .step(Step::new("give_up").block(json!({"kind": "notify", "text": "no price today"})))
        .url("https://shop.example/item/42")
        .build()?;

    let browser = Arc::new(FlakyBrowser {
        attempts: AtomicU32::new(0),
    });
    let runner = WorkflowRunner::new(browser, Arc::new(OneTab));
    let report = runner.run(&workflow).await?;

    for entry in &report.steps {
        println!(
            "{:<10} success={:<5} attempts={} result={}",
            entry.step_id.as_str(),
            entry.success,
            entry.attempts,
            entry.result
        );
    }
    Ok(())
}
