//! Integration tests for loading timetable documents from disk.

use supertask_core::error::{AppError, ErrorKind};
use supertask_entity::namespace;
use supertask_loader::load;

const YAML: &str = r#"
meta:
  description: nightly jobs
tasks:
  - meta:
      id: report
      name: Report
    on:
      schedule:
        - cron: "0 2 * * *"
        - cron: "0 0 14 * * 5 *"
    steps:
      - name: build
        uses: command
        run: /usr/bin/true
        args: [1, 2.5, yes-string]
        kwargs: {force: true}
"#;

const JSON: &str = r#"{
  "tasks": [{
    "meta": {"id": "report", "name": "Report"},
    "on": {"schedule": [{"cron": "0 2 * * *"}, {"cron": "0 0 14 * * 5 *"}]},
    "steps": [{"name": "build", "uses": "command", "run": "/usr/bin/true",
               "args": [1, 2.5, "yes-string"], "kwargs": {"force": true}}]
  }]
}"#;

const SCRIPT: &str = "\
#!/bin/sh
# /// task
# cron = \"*/15 * * * *\"
# [env]
# TARGET = \"/tmp/out\"
# [options]
# retries = 3
# ///
echo done
";

#[tokio::test]
async fn test_yaml_and_json_documents_agree() {
    let dir = tempfile::tempdir().unwrap();
    let yaml = dir.path().join("timetable.yaml");
    let json = dir.path().join("timetable.json");
    std::fs::write(&yaml, YAML).unwrap();
    std::fs::write(&json, JSON).unwrap();

    let from_yaml = load(yaml.to_str().unwrap()).await.unwrap();
    let from_json = load(json.to_str().unwrap()).await.unwrap();
    assert_eq!(from_yaml.tasks, from_json.tasks);
    assert_eq!(from_yaml.tasks[0].on.schedule.len(), 2);
    assert_eq!(from_yaml.source(), yaml.to_str());
}

#[tokio::test]
async fn test_namespace_is_derived_and_stable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timetable.yaml");
    std::fs::write(&path, YAML).unwrap();
    let source = path.to_str().unwrap();

    let first = load(source).await.unwrap().namespace();
    let second = load(source).await.unwrap().namespace();
    assert_eq!(first, second);
    assert_eq!(first.len(), 16);
    assert_eq!(first, namespace::for_source(Some(source)));
}

#[tokio::test]
async fn test_script_document_synthesizes_one_task() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cleanup.sh");
    std::fs::write(&path, SCRIPT).unwrap();

    let timetable = load(path.to_str().unwrap()).await.unwrap();
    assert_eq!(timetable.tasks.len(), 1);
    let task = &timetable.tasks[0];
    assert_eq!(task.id(), "script");
    assert_eq!(task.meta.name, "cleanup");
    assert_eq!(task.cron_expressions(), vec!["*/15 * * * *".to_string()]);

    let step = &task.steps[0];
    assert_eq!(step.uses, "script");
    assert!(step.run.ends_with("cleanup.sh:run"));
    assert_eq!(step.env.get("TARGET").map(String::as_str), Some("/tmp/out"));
    assert!(timetable.meta.contains_key("env"));
}

#[tokio::test]
async fn test_script_with_two_blocks_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("twice.py");
    let body = format!("{SCRIPT}{}", SCRIPT.trim_start_matches("#!/bin/sh\n"));
    std::fs::write(&path, body).unwrap();

    let err: AppError = load(path.to_str().unwrap()).await.unwrap_err().into();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_unknown_extension_is_unsupported() {
    let err: AppError = load("timetable.txt").await.unwrap_err().into();
    assert_eq!(err.kind, ErrorKind::UnsupportedFormat);
}
