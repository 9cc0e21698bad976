//! Commonly used types and traits

pub use crate::condition::Condition;
pub use crate::context::ExecutionContext;
pub use crate::error::EngineError;
pub use crate::runner::{RunOptions, RunReport, WorkflowRunner};
pub use crate::step::{RetrySpec, Step, StepId, StepRecord};
pub use crate::traits::{BlockExecutor, BlockOutput, StatusController, SurfaceId, TabCreator};
pub use crate::workflow::Workflow;
