//! Registered callables for `entrypoint` steps.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{Value, json};
use tracing::info;

use supertask_core::error::AppError;
use supertask_core::result::AppResult;
use supertask_entity::Scalar;

use crate::error::ExecutionError;

/// Arguments passed to a callable.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub args: Vec<Scalar>,
    pub kwargs: BTreeMap<String, Scalar>,
}

/// A host-side action invoked by reference string.
pub type Callable = Arc<dyn Fn(CallArgs) -> BoxFuture<'static, AppResult<Value>> + Send + Sync>;

/// Table from reference string to callable, populated at startup.
#[derive(Clone, Default)]
pub struct CallableRegistry {
    callables: HashMap<String, Callable>,
}

impl fmt::Debug for CallableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableRegistry")
            .field("references", &self.references())
            .finish()
    }
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the `supertask:*` built-ins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("supertask:echo", echo);
        registry.register("supertask:sleep", sleep);
        registry
    }

    /// Register a callable under `reference`, replacing any previous one.
    pub fn register<F, Fut>(&mut self, reference: impl Into<String>, callable: F)
    where
        F: Fn(CallArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        let reference = reference.into();
        tracing::debug!(reference = %reference, "Registered callable");
        self.callables.insert(
            reference,
            Arc::new(move |args| Box::pin(callable(args)) as BoxFuture<'static, _>),
        );
    }

    /// Resolve a reference string.
    pub fn resolve(&self, reference: &str) -> Result<Callable, ExecutionError> {
        self.callables
            .get(reference)
            .cloned()
            .ok_or_else(|| ExecutionError::UnresolvedReference(reference.to_string()))
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.callables.contains_key(reference)
    }

    /// Registered references, sorted.
    pub fn references(&self) -> Vec<String> {
        let mut refs: Vec<String> = self.callables.keys().cloned().collect();
        refs.sort();
        refs
    }
}

/// Log and return the arguments.
async fn echo(call: CallArgs) -> AppResult<Value> {
    let args: Vec<Value> = call.args.iter().map(Scalar::to_json).collect();
    let kwargs: serde_json::Map<String, Value> = call
        .kwargs
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    let message = call
        .args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    info!(message = %message, "echo");
    Ok(json!({ "args": args, "kwargs": kwargs }))
}

/// Sleep for `seconds` (keyword or first positional argument, default 1).
async fn sleep(call: CallArgs) -> AppResult<Value> {
    let seconds = call
        .kwargs
        .get("seconds")
        .or_else(|| call.args.first())
        .map(|value| {
            value
                .as_f64()
                .ok_or_else(|| AppError::validation(format!("Invalid sleep duration '{value}'")))
        })
        .transpose()?
        .unwrap_or(1.0);
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(AppError::validation(format!("Invalid sleep duration '{seconds}'")));
    }
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    Ok(json!({ "slept": seconds }))
}
