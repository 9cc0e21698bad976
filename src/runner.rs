//! Whole-run orchestration: surface acquisition, variable seeding, the
//! traversal loop, and trace assembly.

use crate::binding;
use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::executor::{run_step, TraceEntry};
use crate::traits::{BlockExecutor, StatusController, SurfaceId, TabCreator};
use crate::workflow::Workflow;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

/// Per-run tuning knobs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Whether the created tab is brought to the foreground.
    pub activate: bool,
    /// Surface the run was launched from, if any.
    pub origin: Option<SurfaceId>,
    /// Pause between a step and its successor (skipped steps don't pause).
    pub step_delay: Option<Duration>,
    /// Upper bound on visited steps. The step graph is allowed to cycle;
    /// absent a bound, a cyclic workflow runs until something breaks the
    /// cycle.
    pub max_steps: Option<u32>,
    /// Wall-clock bound on the whole traversal.
    pub deadline: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            activate: true,
            origin: None,
            step_delay: None,
            max_steps: None,
            deadline: None,
        }
    }
}

/// What a run produced: the ordered trace, the surface it ran on, and the
/// final context snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub steps: Vec<TraceEntry>,
    pub surface: SurfaceId,
    pub context: ExecutionContext,
}

/// Drives complete workflow runs against injected collaborators.
///
/// The runner owns nothing browser-shaped itself; block dispatch, tab
/// creation, and the status indicator arrive as `Arc<dyn …>` capabilities
/// and may be shared across concurrent runs — runs share no mutable state.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use karakuri::{BlockExecutor, TabCreator, Workflow, WorkflowRunner};
/// # async fn demo(
/// #     blocks: Arc<dyn BlockExecutor>,
/// #     tabs: Arc<dyn TabCreator>,
/// #     workflow: Workflow,
/// # ) -> Result<(), karakuri::EngineError> {
/// let runner = WorkflowRunner::new(blocks, tabs);
/// let report = runner.run(&workflow).await?;
/// for entry in &report.steps {
///     println!("{}: success={}", entry.step_id, entry.success);
/// }
/// # Ok(())
/// # }
/// ```
pub struct WorkflowRunner {
    blocks: Arc<dyn BlockExecutor>,
    tabs: Arc<dyn TabCreator>,
    status: Option<Arc<dyn StatusController>>,
    options: RunOptions,
}

impl WorkflowRunner {
    pub fn new(blocks: Arc<dyn BlockExecutor>, tabs: Arc<dyn TabCreator>) -> Self {
        Self {
            blocks,
            tabs,
            status: None,
            options: RunOptions::default(),
        }
    }

    /// Attaches a status indicator controller.
    pub fn with_status(mut self, status: Arc<dyn StatusController>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs the workflow to completion.
    ///
    /// The only fatal failure is surface creation; everything after that
    /// point resolves into the trace. The status indicator is hidden
    /// before returning on every path.
    pub async fn run(&self, workflow: &Workflow) -> Result<RunReport, EngineError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("workflow_run", %run_id, version = %workflow.version);
        self.run_inner(workflow, run_id).instrument(span).await
    }

    async fn run_inner(
        &self,
        workflow: &Workflow,
        run_id: Uuid,
    ) -> Result<RunReport, EngineError> {
        let mut ctx = ExecutionContext::new().with_vars(workflow.vars.clone());

        let url = workflow
            .url
            .as_deref()
            .map(|template| binding::render(template, &ctx))
            .unwrap_or_default();

        let surface = self
            .tabs
            .create(&url, self.options.activate, self.options.origin.as_ref())
            .await?;
        info!(%surface, url = %url, "execution surface created");

        if let Some(status) = &self.status {
            if let Err(error) = status.show(&surface, None).await {
                warn!(%error, "status indicator show failed");
            }
        }

        let index = workflow.step_index();
        let started = Instant::now();
        let mut trace: Vec<TraceEntry> = Vec::new();
        let mut current = Some(workflow.start.clone());
        let mut visited = 0u32;

        while let Some(id) = current {
            let step = match index.get(id.as_str()) {
                Some(step) => *step,
                None => {
                    debug!(step = %id, "step id not found, ending run");
                    break;
                }
            };
            if let Some(max) = self.options.max_steps {
                if visited >= max {
                    warn!(max, "step budget exhausted, ending run");
                    break;
                }
            }
            if let Some(deadline) = self.options.deadline {
                if started.elapsed() >= deadline {
                    warn!(?deadline, "run deadline reached, ending run");
                    break;
                }
            }

            let outcome = run_step(step, &ctx, self.blocks.as_ref(), &surface).await;
            visited += 1;
            ctx = outcome.context;

            if outcome.entry.success {
                info!(step = %outcome.entry.step_id, skipped = outcome.entry.skipped, "step completed");
            } else {
                warn!(
                    step = %outcome.entry.step_id,
                    attempts = outcome.entry.attempts,
                    "step failed"
                );
            }

            let skipped = outcome.entry.skipped;
            trace.push(outcome.entry);

            if let (Some(delay), Some(_)) = (self.options.step_delay, &outcome.next) {
                if !skipped {
                    sleep(delay).await;
                }
            }
            current = outcome.next;
        }

        if let Some(status) = &self.status {
            if let Err(error) = status.hide(&surface).await {
                warn!(%error, "status indicator hide failed");
            }
        }

        info!(steps = trace.len(), "run finished");
        Ok(RunReport {
            run_id,
            steps: trace,
            surface,
            context: ctx,
        })
    }
}
