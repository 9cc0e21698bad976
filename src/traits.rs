//! Capability traits for the external collaborators a run depends on.
//!
//! The engine never talks to a browser directly. Block dispatch, tab
//! creation, and the on-page status indicator are injected behind these
//! traits, which keeps the core runnable against fakes in tests.

use crate::error::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of an execution surface (a browser tab).
///
/// Opaque to the engine; minted by the [`TabCreator`] and handed back to the
/// [`BlockExecutor`] and [`StatusController`] on every call. A surface is
/// exclusively owned by one run for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(String);

impl SurfaceId {
    /// Creates a new SurfaceId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the surface id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SurfaceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SurfaceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for SurfaceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of one block dispatch.
///
/// `has_error` marks the attempt as failed regardless of `data`; otherwise
/// `data` becomes the step result. `message` travels into the execution
/// trace either way.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOutput {
    /// Payload produced by the block (extracted text, captured response, ...).
    #[serde(default)]
    pub data: Value,
    /// Human-readable detail, kept in the trace.
    #[serde(default)]
    pub message: Option<String>,
    /// Marks the dispatch as failed.
    #[serde(default)]
    pub has_error: bool,
}

impl BlockOutput {
    /// A successful outcome carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            message: None,
            has_error: false,
        }
    }

    /// A failed outcome carrying a message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: Value::Null,
            message: Some(message.into()),
            has_error: true,
        }
    }
}

/// Executes one resolved block payload against a surface.
///
/// The payload arrives fully resolved — every `${path}` token and
/// `valueFrom`/`template` binding has already been replaced with live
/// context data. Implementations are free to take as long as they like;
/// the engine applies its own per-attempt timeout around the call and a
/// losing dispatch is *not* cancelled, only ignored.
#[async_trait]
pub trait BlockExecutor: Send + Sync {
    /// Dispatches the payload. An `Err` and an `Ok` with `has_error` set
    /// are both treated as a failed attempt.
    async fn execute(&self, payload: Value, surface: &SurfaceId)
        -> Result<BlockOutput, EngineError>;
}

/// Creates the execution surface a run operates against.
#[async_trait]
pub trait TabCreator: Send + Sync {
    /// Opens a tab at `url`, optionally activating it, optionally anchored
    /// to an originating surface. Failure here is fatal to the run.
    async fn create(
        &self,
        url: &str,
        activate: bool,
        origin: Option<&SurfaceId>,
    ) -> Result<SurfaceId, EngineError>;
}

/// On-page status indicator shown while a run is in progress.
///
/// Optional and best-effort: the runner logs and ignores errors from both
/// calls, and always attempts `hide` before returning.
#[async_trait]
pub trait StatusController: Send + Sync {
    async fn show(&self, surface: &SurfaceId, message: Option<&str>) -> Result<(), EngineError>;

    async fn hide(&self, surface: &SurfaceId) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_surface_id_display() {
        let id = SurfaceId::new("tab-42");
        assert_eq!(id.to_string(), "tab-42");
        assert_eq!(id.as_str(), "tab-42");

        let id: SurfaceId = "tab-7".into();
        assert_eq!(id, SurfaceId::new("tab-7"));
    }

    #[test]
    fn test_block_output_constructors() {
        let ok = BlockOutput::ok(json!({"text": "hello"}));
        assert!(!ok.has_error);
        assert_eq!(ok.data, json!({"text": "hello"}));

        let err = BlockOutput::error("element not found");
        assert!(err.has_error);
        assert_eq!(err.message.as_deref(), Some("element not found"));
        assert_eq!(err.data, Value::Null);
    }

    #[test]
    fn test_block_output_wire_shape() {
        let parsed: BlockOutput =
            serde_json::from_value(json!({"hasError": true, "message": "boom"}))
                .unwrap();
        assert!(parsed.has_error);
        assert_eq!(parsed.message.as_deref(), Some("boom"));
        assert_eq!(parsed.data, Value::Null);

        // absent flags default to a successful, empty outcome
        let parsed: BlockOutput = serde_json::from_value(json!({"data": 3})).unwrap();
        assert!(!parsed.has_error);
        assert_eq!(parsed.data, json!(3));
    }
}
