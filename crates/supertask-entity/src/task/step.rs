//! Task step entity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::scalar::Scalar;

/// One executable unit of a task, dispatched by its `uses` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Human-readable step name.
    pub name: String,
    /// Step kind tag: `entrypoint`, `command` or `script`.
    pub uses: String,
    /// Callable reference, program or script path, depending on `uses`.
    pub run: String,
    /// Positional arguments.
    #[serde(default)]
    pub args: Vec<Scalar>,
    /// Keyword arguments.
    #[serde(default)]
    pub kwargs: BTreeMap<String, Scalar>,
    /// When false the step is logged and skipped.
    #[serde(rename = "if", default = "default_true")]
    pub condition: bool,
    /// Extra environment for processes spawned by this step.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl Step {
    /// Create a step with no arguments.
    pub fn new(name: impl Into<String>, uses: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uses: uses.into(),
            run: run.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
            condition: true,
            env: BTreeMap::new(),
        }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Scalar>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Set the run condition.
    pub fn when(mut self, condition: bool) -> Self {
        self.condition = condition;
        self
    }
}

fn default_true() -> bool {
    true
}
