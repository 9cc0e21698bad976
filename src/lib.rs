//! # Karakuri (からくり)
//!
//! A declarative workflow execution engine for browser automation.
//!
//! The name "Karakuri" (からくり) refers to the traditional Japanese
//! mechanized puppets that perform elaborate sequences of movements from a
//! wound spring — the way this engine walks a declarative graph of steps
//! against a live browser surface.
//!
//! ## Features
//!
//! - **Declarative workflows**: steps, retries, timeouts, and branching are
//!   plain serde data, loadable from JSON
//! - **Immutable context**: step results, user variables, and loop state
//!   thread through the run as values; no step ever sees a partially
//!   updated context
//! - **Data bindings**: `${path}` interpolation and structural
//!   `valueFrom`/`template`/`default` bindings over whole payloads
//! - **Conditions**: a JSON condition tree plus a sandboxed boolean
//!   expression language — no arbitrary code execution
//! - **Recoverable failure**: a failed step routes through
//!   `onFailure`/`switch` branching instead of aborting the run
//! - **Injected capabilities**: block dispatch, tab creation, and the
//!   status indicator are `async` traits, trivially faked in tests
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use karakuri::prelude::*;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! /// A block executor that echoes every payload back as its result.
//! struct EchoBlocks;
//!
//! #[async_trait]
//! impl BlockExecutor for EchoBlocks {
//!     async fn execute(
//!         &self,
//!         payload: Value,
//!         _surface: &SurfaceId,
//!     ) -> Result<BlockOutput, EngineError> {
//!         Ok(BlockOutput::ok(payload))
//!     }
//! }
//!
//! /// A tab creator that hands out a fixed surface.
//! struct OneTab;
//!
//! #[async_trait]
//! impl TabCreator for OneTab {
//!     async fn create(
//!         &self,
//!         _url: &str,
//!         _activate: bool,
//!         _origin: Option<&SurfaceId>,
//!     ) -> Result<SurfaceId, EngineError> {
//!         Ok(SurfaceId::new("tab-1"))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), EngineError> {
//! let workflow = Workflow::builder()
//!     .start("greet")
//!     .step(Step::new("greet")
//!         .block(json!({"kind": "type_text", "text": "hello ${vars.name}"}))
//!         .next("done"))
//!     .step(Step::new("done")
//!         .when(json!({"exists": "steps.greet.result"}))
//!         .block(json!({"kind": "click", "selector": "#submit"})))
//!     .var("name", json!("world"))
//!     .url("https://example.com")
//!     .build()?;
//!
//! let runner = WorkflowRunner::new(Arc::new(EchoBlocks), Arc::new(OneTab));
//! let report = runner.run(&workflow).await?;
//!
//! assert_eq!(report.steps.len(), 2);
//! assert_eq!(
//!     report.context.step_result("greet").map(|r| r.result["text"].clone()),
//!     Some(json!("hello world"))
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Bindings and Paths
//!
//! Dotted paths root at `steps`, `vars`, `forEach`, or `loop`. A string
//! that is exactly one `${path}` token keeps the resolved value's type;
//! mixed templates render to strings:
//!
//! ```rust
//! use karakuri::{interpolate, ExecutionContext};
//! use serde_json::json;
//!
//! let ctx = ExecutionContext::new().with_var("n", json!(42));
//!
//! assert_eq!(interpolate("${vars.n}", &ctx), json!(42));
//! assert_eq!(interpolate("n=${vars.n}", &ctx), json!("n=42"));
//! ```
//!
//! ## Conditions
//!
//! A step's `when` guard, and each `switch` case, take either a JSON
//! condition tree or a sandboxed boolean expression:
//!
//! ```rust
//! use karakuri::{Condition, ExecutionContext};
//! use serde_json::json;
//!
//! let ctx = ExecutionContext::new().with_var("count", json!(7));
//!
//! let tree: Condition = json!({"equals": {"left": "vars.count", "right": 7}}).into();
//! assert!(tree.is_satisfied(&ctx));
//!
//! let expr = Condition::expr("vars.count > 3 && vars.count < 10");
//! assert!(expr.is_satisfied(&ctx));
//! ```

mod binding;
mod condition;
mod context;
mod error;
pub mod expr;
mod executor;
mod path;
mod runner;
mod step;
mod traits;
mod workflow;

pub mod prelude;

pub use binding::{interpolate, render, resolve_binding, resolve_bindings, Binding};
pub use condition::Condition;
pub use context::{ExecutionContext, ForEachFrame, LoopFrame};
pub use error::EngineError;
pub use executor::{run_step, StepOutcome, TraceEntry};
pub use path::get_by_path;
pub use runner::{RunOptions, RunReport, WorkflowRunner};
pub use step::{RetrySpec, Step, StepId, StepRecord, SwitchCase};
pub use traits::{BlockExecutor, BlockOutput, StatusController, SurfaceId, TabCreator};
pub use workflow::{Workflow, WorkflowBuilder};
