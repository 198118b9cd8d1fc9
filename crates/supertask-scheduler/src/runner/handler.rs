//! Step-kind handlers.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::process::Command;
use tracing::debug;

use supertask_entity::{Scalar, Step};

use super::StepKind;
use super::registry::{CallArgs, CallableRegistry};
use crate::error::ExecutionError;

/// Environment variable telling a script which entry point to run.
pub const ENTRYPOINT_ENV: &str = "SUPERTASK_ENTRYPOINT";

/// Trait for step handler implementations
#[async_trait]
pub trait StepHandler: Send + Sync + std::fmt::Debug {
    /// The step kind this handler executes
    fn kind(&self) -> StepKind;

    /// Execute one step and return its result
    async fn execute(&self, step: &Step) -> Result<Value, ExecutionError>;
}

/// Invokes a registered callable with the step's arguments.
#[derive(Debug, Clone)]
pub struct EntrypointHandler {
    registry: Arc<CallableRegistry>,
}

impl EntrypointHandler {
    pub fn new(registry: Arc<CallableRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl StepHandler for EntrypointHandler {
    fn kind(&self) -> StepKind {
        StepKind::Entrypoint
    }

    async fn execute(&self, step: &Step) -> Result<Value, ExecutionError> {
        let callable = self.registry.resolve(&step.run)?;
        let call = CallArgs {
            args: step.args.clone(),
            kwargs: step.kwargs.clone(),
        };
        callable(call).await.map_err(|e| ExecutionError::StepFailed {
            step: step.name.clone(),
            message: e.to_string(),
        })
    }
}

/// Spawns `run` as a program with `args`, then keyword arguments as `--key=value`.
#[derive(Debug, Clone, Default)]
pub struct CommandHandler;

#[async_trait]
impl StepHandler for CommandHandler {
    fn kind(&self) -> StepKind {
        StepKind::Command
    }

    async fn execute(&self, step: &Step) -> Result<Value, ExecutionError> {
        let mut argv: Vec<String> = step.args.iter().map(ToString::to_string).collect();
        argv.extend(keyword_flags(&step.kwargs));
        run_process(&step.name, &step.run, &[], &argv, &step.env).await
    }
}

/// Runs a script file. `run` has the form `<path>:<entry>`; the entry name
/// is passed in `SUPERTASK_ENTRYPOINT`.
#[derive(Debug, Clone, Default)]
pub struct ScriptHandler;

impl ScriptHandler {
    /// Split `<path>:<entry>`. A missing entry defaults to `run`.
    pub fn split_reference(reference: &str) -> (&str, &str) {
        match reference.rsplit_once(':') {
            Some((path, entry)) if !path.is_empty() && !entry.contains('/') => (path, entry),
            _ => (reference, "run"),
        }
    }

    /// Interpreter for a script, chosen by extension.
    pub fn interpreter(path: &str) -> Option<&'static str> {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some("py") => Some("python3"),
            Some("sh") => Some("sh"),
            Some("bash") => Some("bash"),
            Some("rb") => Some("ruby"),
            Some("pl") => Some("perl"),
            _ => None,
        }
    }
}

#[async_trait]
impl StepHandler for ScriptHandler {
    fn kind(&self) -> StepKind {
        StepKind::Script
    }

    async fn execute(&self, step: &Step) -> Result<Value, ExecutionError> {
        let (path, entry) = Self::split_reference(&step.run);
        let mut env = step.env.clone();
        env.insert(ENTRYPOINT_ENV.to_string(), entry.to_string());

        let mut argv: Vec<String> = step.args.iter().map(ToString::to_string).collect();
        argv.extend(keyword_flags(&step.kwargs));

        match Self::interpreter(path) {
            Some(interpreter) => {
                run_process(&step.name, interpreter, &[path.to_string()], &argv, &env).await
            }
            None => run_process(&step.name, path, &[], &argv, &env).await,
        }
    }
}

fn keyword_flags(kwargs: &BTreeMap<String, Scalar>) -> Vec<String> {
    kwargs.iter().map(|(k, v)| format!("--{k}={v}")).collect()
}

/// Spawn a child, wait for it and report its output.
async fn run_process(
    step: &str,
    program: &str,
    leading: &[String],
    argv: &[String],
    env: &BTreeMap<String, String>,
) -> Result<Value, ExecutionError> {
    debug!(step = %step, program = %program, args = ?argv, "Spawning step process");

    let output = Command::new(program)
        .args(leading)
        .args(argv)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|source| ExecutionError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        return Err(ExecutionError::StepFailed {
            step: step.to_string(),
            message: format!("{} {stderr}", output.status).trim_end().to_string(),
        });
    }

    Ok(json!({ "exit_code": output.status.code(), "stdout": stdout }))
}
