//! Timetable entity.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ModelError;
use crate::namespace;
use crate::task::Task;

/// All task definitions loaded from one document.
///
/// A timetable is built fresh on every load. Reconciliation diffs a new
/// timetable against the live job set, never against a previous timetable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timetable {
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Timetable {
    /// Meta key holding the path or URL the timetable was loaded from.
    pub const SOURCE_KEY: &'static str = "taskfile";
    /// Meta key holding the namespace identifier.
    pub const NAMESPACE_KEY: &'static str = "namespace";
    /// Meta key holding environment read from an embedded script block.
    pub const ENV_KEY: &'static str = "env";

    /// Create a validated timetable with a namespace.
    pub fn new(meta: Map<String, Value>, tasks: Vec<Task>) -> Result<Self, ModelError> {
        Self { meta, tasks }.finalize()
    }

    /// Validate and fill in the namespace when the document supplies none.
    pub fn finalize(mut self) -> Result<Self, ModelError> {
        self.validate()?;
        let namespace = match self.meta.get(Self::NAMESPACE_KEY) {
            Some(Value::String(ns)) if !ns.trim().is_empty() => ns.trim().to_string(),
            Some(Value::Number(ns)) => ns.to_string(),
            _ => namespace::for_source(self.source()),
        };
        self.meta
            .insert(Self::NAMESPACE_KEY.to_string(), Value::String(namespace));
        Ok(self)
    }

    /// Record the source identifier.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.meta
            .insert(Self::SOURCE_KEY.to_string(), Value::String(source.into()));
        self
    }

    /// Path or URL this timetable was loaded from.
    pub fn source(&self) -> Option<&str> {
        self.meta.get(Self::SOURCE_KEY).and_then(Value::as_str)
    }

    /// Namespace identifier. Derived on the fly when [`finalize`](Self::finalize)
    /// has not run yet.
    pub fn namespace(&self) -> String {
        match self.meta.get(Self::NAMESPACE_KEY).and_then(Value::as_str) {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => namespace::for_source(self.source()),
        }
    }

    /// Validate every task and check that task ids are unique.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut seen = HashSet::new();
        for task in &self.tasks {
            task.validate()?;
            if !seen.insert(task.id()) {
                return Err(ModelError::validation(format!(
                    "Duplicate task id '{}'",
                    task.id()
                )));
            }
        }
        Ok(())
    }

    /// Tasks that should be registered with the scheduler.
    pub fn enabled_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|task| task.meta.enabled)
    }

    /// Look up a task by id.
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{ScheduleItem, Step, TaskMetadata};

    fn task(id: &str, enabled: bool) -> Task {
        let mut meta = TaskMetadata::new(id, id);
        meta.enabled = enabled;
        Task::new(
            meta,
            vec![ScheduleItem::new("* * * * *")],
            vec![Step::new("s", "entrypoint", "supertask:echo")],
        )
        .unwrap()
    }

    #[test]
    fn test_namespace_from_document_is_kept() {
        let mut meta = Map::new();
        meta.insert("namespace".into(), Value::String("acme".into()));
        let timetable = Timetable::new(meta, vec![task("a", true)]).unwrap();
        assert_eq!(timetable.namespace(), "acme");
    }

    #[test]
    fn test_namespace_is_derived_from_source() {
        let a = Timetable::default().with_source("a.yaml").finalize().unwrap();
        let b = Timetable::default().with_source("b.yaml").finalize().unwrap();
        let a_again = Timetable::default().with_source("a.yaml").finalize().unwrap();
        assert_eq!(a.namespace(), a_again.namespace());
        assert_ne!(a.namespace(), b.namespace());
        assert_eq!(
            a.meta.get(Timetable::NAMESPACE_KEY).and_then(Value::as_str),
            Some(a.namespace().as_str())
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Timetable::new(Map::new(), vec![task("a", true), task("a", false)]).unwrap_err();
        assert!(err.to_string().contains("Duplicate task id 'a'"));
    }

    #[test]
    fn test_enabled_tasks() {
        let timetable =
            Timetable::new(Map::new(), vec![task("a", true), task("b", false)]).unwrap();
        let ids: Vec<&str> = timetable.enabled_tasks().map(Task::id).collect();
        assert_eq!(ids, vec!["a"]);
        assert!(timetable.task("b").is_some());
    }
}
