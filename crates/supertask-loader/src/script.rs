//! Embedded script metadata.
//!
//! A script declares its schedule in a fenced comment block:
//!
//! ```text
//! # /// task
//! # cron = "*/5 * * * *"
//! # [env]
//! # OUTPUT = "/tmp/report"
//! # [options]
//! # limit = 10
//! # ///
//! ```
//!
//! The block body is TOML.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use supertask_entity::{ExecutorLane, Scalar, ScheduleItem, Step, Task, TaskMetadata, Timetable};

use crate::error::LoadError;

/// Block type read from scripts.
pub const BLOCK_TYPE: &str = "task";
/// Task id of the single task synthesized from a script.
pub const SCRIPT_TASK_ID: &str = "script";
/// Step kind of the synthesized step.
pub const SCRIPT_STEP_KIND: &str = "script";
/// Entry point name appended to the script path.
pub const SCRIPT_ENTRYPOINT: &str = "run";

static METADATA_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^# /// (?P<type>[a-zA-Z0-9-]+)$\s(?P<content>(^#(| .*)$\s)+)^# ///$").unwrap()
});

/// Contents of a `# /// task` block.
#[derive(Debug, Clone, Deserialize)]
struct ScriptBlock {
    cron: String,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    options: BTreeMap<String, Scalar>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    executor: Option<ExecutorLane>,
}

/// Extract the body of the `# /// {kind}` block, with comment markers removed.
///
/// Returns `None` when the script has no such block and fails when it has
/// more than one.
pub fn read_inline_metadata(kind: &str, script: &str) -> Result<Option<String>, LoadError> {
    let mut blocks = METADATA_BLOCK
        .captures_iter(script)
        .filter(|caps| caps.name("type").is_some_and(|t| t.as_str() == kind));

    let Some(first) = blocks.next() else {
        return Ok(None);
    };
    if blocks.next().is_some() {
        return Err(LoadError::parse(
            "script",
            format!("Multiple {kind} blocks found"),
        ));
    }

    let content = first
        .name("content")
        .map(|m| m.as_str())
        .unwrap_or_default()
        .split_inclusive('\n')
        .map(|line| {
            line.strip_prefix("# ")
                .or_else(|| line.strip_prefix('#'))
                .unwrap_or(line)
        })
        .collect::<String>();
    Ok(Some(content))
}

/// Build a single-task timetable from a script and its text.
///
/// The step runs `<absolute path>:run` with the block's `options` as keyword
/// arguments. The block's `env` is attached to the step and recorded in the
/// timetable meta under `env`.
///
/// The variables are not merged into the scheduler's own process
/// environment. Only processes spawned for the step see them, so loading a
/// script never changes the environment of other tasks.
pub fn timetable_from_script(path: &Path, script: &str) -> Result<Timetable, LoadError> {
    let source_name = path.to_string_lossy().to_string();
    let body = read_inline_metadata(BLOCK_TYPE, script)
        .map_err(|_| LoadError::parse(&source_name, format!("Multiple {BLOCK_TYPE} blocks found")))?
        .ok_or_else(|| {
            LoadError::parse(&source_name, format!("No '# /// {BLOCK_TYPE}' block found"))
        })?;
    let block: ScriptBlock =
        toml::from_str(&body).map_err(|e| LoadError::parse(&source_name, e))?;

    let absolute = std::path::absolute(path).map_err(|source| LoadError::Io {
        path: source_name.clone(),
        source,
    })?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| SCRIPT_TASK_ID.to_string());

    let mut meta = TaskMetadata::new(SCRIPT_TASK_ID, stem.clone());
    meta.description = block.description.unwrap_or_default();
    meta.executor = block.executor.unwrap_or_default();

    let mut step = Step::new(
        stem,
        SCRIPT_STEP_KIND,
        format!("{}:{SCRIPT_ENTRYPOINT}", absolute.display()),
    );
    step.kwargs = block.options;
    step.env = block.env.clone();

    let task = Task::new(meta, vec![ScheduleItem::new(block.cron)], vec![step])?;

    let mut timetable_meta = Map::new();
    if !block.env.is_empty() {
        let env: Map<String, Value> = block
            .env
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        timetable_meta.insert(Timetable::ENV_KEY.to_string(), Value::Object(env));
    }

    Ok(Timetable {
        meta: timetable_meta,
        tasks: vec![task],
    }
    .with_source(source_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "\
#!/usr/bin/env python3
# /// task
# cron = \"*/5 * * * *\"
# [env]
# OUTPUT = \"/tmp/out\"
# [options]
# limit = 10
# verbose = true
# ///
print('hello')
";

    #[test]
    fn test_read_inline_metadata() {
        let body = read_inline_metadata("task", SCRIPT).unwrap().unwrap();
        assert!(body.starts_with("cron = \"*/5 * * * *\"\n"));
        assert!(body.contains("[options]\n"));
        assert!(read_inline_metadata("script", SCRIPT).unwrap().is_none());
    }

    #[test]
    fn test_multiple_blocks_rejected() {
        let twice = format!("{SCRIPT}\n{SCRIPT}");
        assert!(read_inline_metadata("task", &twice).is_err());
    }

    #[test]
    fn test_timetable_from_script() {
        let timetable = timetable_from_script(Path::new("/opt/jobs/report.py"), SCRIPT).unwrap();
        assert_eq!(timetable.source(), Some("/opt/jobs/report.py"));
        assert_eq!(timetable.meta["env"]["OUTPUT"], "/tmp/out");

        let task = &timetable.tasks[0];
        assert_eq!(task.id(), SCRIPT_TASK_ID);
        assert_eq!(task.meta.name, "report");
        assert_eq!(task.cron_expressions(), vec!["*/5 * * * *".to_string()]);

        let step = &task.steps[0];
        assert_eq!(step.uses, "script");
        assert_eq!(step.run, "/opt/jobs/report.py:run");
        assert_eq!(step.kwargs["limit"], Scalar::Int(10));
        assert_eq!(step.kwargs["verbose"], Scalar::Bool(true));
        assert_eq!(step.env["OUTPUT"], "/tmp/out");
    }

    #[test]
    fn test_script_env_stays_on_the_step() {
        let script = SCRIPT.replace("OUTPUT", "SUPERTASK_REPORT_OUTPUT");
        let timetable = timetable_from_script(Path::new("/opt/jobs/report.py"), &script).unwrap();
        assert_eq!(
            timetable.tasks[0].steps[0].env["SUPERTASK_REPORT_OUTPUT"],
            "/tmp/out"
        );
        assert!(std::env::var("SUPERTASK_REPORT_OUTPUT").is_err());
    }

    #[test]
    fn test_script_without_block_rejected() {
        let err = timetable_from_script(Path::new("plain.py"), "print('hi')\n").unwrap_err();
        assert!(err.to_string().contains("No '# /// task' block found"));
    }
}
