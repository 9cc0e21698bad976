//! Fills and submits a login form against a pretend browser.
//!
//! Run with: `cargo run --example form_fill`

use async_trait::async_trait;
use karakuri::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Pretend browser: prints each dispatched block and fabricates results.
struct PrintingBrowser;

#[async_trait]
impl BlockExecutor for PrintingBrowser {
    async fn execute(
        &self,
        payload: Value,
        surface: &SurfaceId,
    ) -> Result<BlockOutput, EngineError> {
        info!(%surface, %payload, "dispatching block");
        match payload["kind"].as_str() {
            Some("get_text") => Ok(BlockOutput::ok(json!({"text": "Welcome back!"}))),
            Some(_) => Ok(BlockOutput::ok(json!(true))),
            None => Ok(BlockOutput::error("block payload has no kind")),
        }
    }
}

struct PrintingTabs;

#[async_trait]
impl TabCreator for PrintingTabs {
    async fn create(
        &self,
        url: &str,
        activate: bool,
        _origin: Option<&SurfaceId>,
    ) -> Result<SurfaceId, EngineError> {
        info!(url, activate, "opening tab");
        Ok(SurfaceId::new("tab-demo"))
    }
}

struct PrintingStatus;

#[async_trait]
impl StatusController for PrintingStatus {
    async fn show(&self, surface: &SurfaceId, _message: Option<&str>) -> Result<(), EngineError> {
        info!(%surface, "status indicator on");
        Ok(())
    }

    async fn hide(&self, surface: &SurfaceId) -> Result<(), EngineError> {
        info!(%surface, "status indicator off");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let workflow = Workflow::builder()
        .start("fill_user")
        .step(
            Step::new("fill_user")
                .block(json!({
                    "kind": "type_text",
                    "selector": "#username",
                    "text": "${vars.username}",
                }))
                .next("fill_pass"),
        )
        .step(
            Step::new("fill_pass")
                .block(json!({
                    "kind": "type_text",
                    "selector": "#password",
                    "text": {"valueFrom": "vars.password", "default": ""},
                }))
                .next("submit"),
        )
        .step(
            Step::new("submit")
                .block(json!({"kind": "click", "selector": "button[type=submit]"}))
                .next("banner"),
        )
        .step(
            Step::new("banner")
                .block(json!({"kind": "get_text", "selector": ".banner"}))
                .switch_case(
                    json!({"contains": {"value": "steps.banner.result.text", "search": "Welcome"}}),
                    "done",
                ),
        )
        .step(Step::new("done"))
        .var("username", json!("alice"))
        .var("password", json!("hunter2"))
        .url("https://example.com/login?user=${vars.username}")
        .build()?;

    let runner = WorkflowRunner::new(Arc::new(PrintingBrowser), Arc::new(PrintingTabs))
        .with_status(Arc::new(PrintingStatus));
    let report = runner.run(&workflow).await?;

    for entry in &report.steps {
        println!(
            "{:<12} skipped={:<5} success={:<5} attempts={}",
            entry.step_id.as_str(),
            entry.skipped,
            entry.success,
            entry.attempts
        );
    }
    Ok(())
}
