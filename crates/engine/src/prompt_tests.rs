// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    task_dir: std::path::PathBuf,
    workflow_dir: std::path::PathBuf,
    log: EventLog,
    task_input: Map<String, Value>,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let task_dir = dir.path().join("task");
    let workflow_dir = dir.path().join("flow");
    std::fs::create_dir_all(&task_dir).unwrap();
    std::fs::create_dir_all(&workflow_dir).unwrap();
    let log = EventLog::for_task_dir(&task_dir);

    let mut task_input = Map::new();
    task_input.insert("topic".to_string(), Value::String("rust".to_string()));
    task_input.insert(
        "config".to_string(),
        serde_json::json!({"depth": 2}),
    );

    Fixture {
        _dir: dir,
        task_dir,
        workflow_dir,
        log,
        task_input,
    }
}

fn assemble_with(f: &Fixture, prompt: &str) -> Result<String, PromptError> {
    assemble(
        prompt,
        &PromptInputs {
            team_tone: "Be direct.",
            specialist_text: "\n---\nYou are a writer.",
            task_input: &f.task_input,
            task_dir: &f.task_dir,
            workflow_dir: &f.workflow_dir,
        },
        &f.log,
    )
}

#[test]
fn substitutes_task_inputs() {
    let f = fixture();
    let prompt = assemble_with(&f, "Write about {{ task.input.topic }}.").unwrap();
    assert!(prompt.contains("Write about rust."));
    assert!(prompt.starts_with("Be direct.\n\n"));
    assert!(prompt.contains("You are a writer."));
    assert!(prompt.contains("\n\n---\n\n"));
}

#[test]
fn structured_inputs_render_as_compact_json() {
    let f = fixture();
    let prompt = assemble_with(&f, "Config: {{ task.input.config }}").unwrap();
    assert!(prompt.contains("Config: {\"depth\":2}"));
}

#[test]
fn missing_task_input_is_an_error_listing_fields() {
    let f = fixture();
    let err = assemble_with(&f, "{{ task.input.topic }} and {{ task.input.ghost }}").unwrap_err();
    match err {
        PromptError::UnresolvedPlaceholder { fields } => {
            assert_eq!(fields, vec!["ghost"]);
        }
    }
}

#[test]
fn dependency_output_reference_unwraps_envelope() {
    let f = fixture();
    let outputs = f.task_dir.join("outline").join("outputs");
    std::fs::create_dir_all(&outputs).unwrap();
    std::fs::write(
        outputs.join("result.json"),
        serde_json::json!({
            "stage": "outline",
            "result": "{\"sections\": [\"intro\"]}",
            "timestamp": "2026-01-01T00:00:00Z",
        })
        .to_string(),
    )
    .unwrap();

    let prompt = assemble_with(&f, "Use {{ outline.json }} as the plan.").unwrap();
    assert!(prompt.contains("{\"sections\":[\"intro\"]}"), "{prompt}");
}

#[test]
fn envelope_with_plain_text_result_stays_wrapped() {
    let f = fixture();
    let outputs = f.task_dir.join("outline").join("outputs");
    std::fs::create_dir_all(&outputs).unwrap();
    std::fs::write(
        outputs.join("result.json"),
        serde_json::json!({"stage": "outline", "result": "plain prose"}).to_string(),
    )
    .unwrap();

    let prompt = assemble_with(&f, "{{ outline.json }}").unwrap();
    assert!(prompt.contains("\"result\":\"plain prose\""));
}

#[test]
fn workflow_dir_reference_for_static_data() {
    let f = fixture();
    std::fs::write(
        f.workflow_dir.join("style.json"),
        "{\"voice\": \"active\"}",
    )
    .unwrap();

    let prompt = assemble_with(&f, "Style guide: {{ style.json }}").unwrap();
    assert!(prompt.contains("{\"voice\":\"active\"}"));
}

#[test]
fn task_outputs_beat_workflow_dir() {
    let f = fixture();
    std::fs::create_dir_all(f.task_dir.join("outputs")).unwrap();
    std::fs::write(f.task_dir.join("outputs").join("data.json"), "{\"from\": \"task\"}").unwrap();
    std::fs::write(f.workflow_dir.join("data.json"), "{\"from\": \"flow\"}").unwrap();

    let prompt = assemble_with(&f, "{{ data.json }}").unwrap();
    assert!(prompt.contains("{\"from\":\"task\"}"));
}

#[test]
fn missing_file_reference_is_left_as_is() {
    let f = fixture();
    let prompt = assemble_with(&f, "See {{ ghost.json }} for data.").unwrap();
    assert!(prompt.contains("See {{ ghost.json }} for data."));
    let log = std::fs::read_to_string(f.log.path()).unwrap();
    assert!(log.contains("FILE NOT FOUND | ghost.json"));
}

#[test]
fn assembly_is_deterministic() {
    let f = fixture();
    std::fs::write(f.workflow_dir.join("style.json"), "{\"a\": 1}").unwrap();
    let prompt = "On {{ task.input.topic }}: {{ style.json }}";
    let first = assemble_with(&f, prompt).unwrap();
    let second = assemble_with(&f, prompt).unwrap();
    assert_eq!(first, second);
}

#[test]
fn unbalanced_braces_are_left_alone() {
    let f = fixture();
    let prompt = assemble_with(&f, "odd {{ but fine").unwrap();
    assert!(prompt.contains("odd {{ but fine"));
}
