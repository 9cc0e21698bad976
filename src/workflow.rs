use crate::error::EngineError;
use crate::step::{Step, StepId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_version() -> String {
    "1".to_string()
}

/// A named, versioned graph of steps with an entry point and optional seed
/// variables.
///
/// The definition is plain data: steps are held in order, `start` names the
/// entry point, `vars` seeds the variable context once per run, and `url`
/// is the target-URL template resolved against the seeded context when the
/// execution surface is created.
///
/// Step ids are not uniqueness-checked; a duplicated id silently shadows
/// the earlier definition in the runtime index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    #[serde(default = "default_version")]
    pub version: String,
    pub start: StepId,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vars: HashMap<String, Value>,
    /// Target-URL template, interpolated against the seeded context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    /// Parses a workflow from its JSON wire form.
    pub fn from_json(document: &str) -> Result<Self, EngineError> {
        serde_json::from_str(document).map_err(|e| EngineError::Configuration(e.to_string()))
    }

    /// Looks up a step by id, later definitions shadowing earlier ones.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.step_index().get(id).copied()
    }

    /// Runtime index over the steps. Built per run; insertion order makes
    /// a duplicated id resolve to its last definition.
    pub(crate) fn step_index(&self) -> HashMap<&str, &Step> {
        self.steps
            .iter()
            .map(|step| (step.id.as_str(), step))
            .collect()
    }
}

/// Builder for assembling a [`Workflow`] in code.
///
/// # Examples
///
/// ```
/// use karakuri::{Step, Workflow};
/// use serde_json::json;
///
/// let workflow = Workflow::builder()
///     .start("open")
///     .step(Step::new("open").block(json!({"kind": "navigate"})))
///     .var("name", json!("alice"))
///     .url("https://example.com/${vars.name}")
///     .build()
///     .expect("valid workflow");
///
/// assert_eq!(workflow.steps.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    version: Option<String>,
    start: Option<StepId>,
    steps: Vec<Step>,
    vars: HashMap<String, Value>,
    url: Option<String>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn start(mut self, id: impl Into<StepId>) -> Self {
        self.start = Some(id.into());
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: Value) -> Self {
        self.vars.insert(key.into(), value);
        self
    }

    pub fn vars(mut self, vars: HashMap<String, Value>) -> Self {
        self.vars.extend(vars);
        self
    }

    pub fn url(mut self, template: impl Into<String>) -> Self {
        self.url = Some(template.into());
        self
    }

    /// Validates that a start step was specified and exists.
    ///
    /// Only construction checks the entry point; branch targets are left to
    /// the runtime's silent-termination policy.
    pub fn build(self) -> Result<Workflow, EngineError> {
        let start = self.start.ok_or_else(|| {
            EngineError::Configuration("start step must be specified".to_string())
        })?;

        if !self.steps.iter().any(|s| s.id == start) {
            return Err(EngineError::StepNotFound(start));
        }

        Ok(Workflow {
            version: self.version.unwrap_or_else(default_version),
            start,
            steps: self.steps,
            vars: self.vars,
            url: self.url,
        })
    }
}
