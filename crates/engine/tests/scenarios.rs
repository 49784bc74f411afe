// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end engine scenarios against a fake provider and real
//! temp-dir task trees.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use rein_core::BlockStatus;
use rein_engine::{Command, Orchestrator, OrchestratorParams, RunReport, TaskContext};
use rein_flow::{AgentsDir, FlowDocument};
use rein_providers::FakeProvider;
use rein_storage::{TaskStatus, TaskStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

struct Harness {
    _dir: TempDir,
    agents_root: PathBuf,
    task_dir: PathBuf,
    workflow_dir: PathBuf,
    provider: FakeProvider,
    flow_yaml: String,
}

fn harness(flow_yaml: &str) -> Harness {
    let dir = TempDir::new().unwrap();
    let agents_root = dir.path().join("agents");
    let task_dir = agents_root.join("tasks").join("task-1");
    let workflow_dir = agents_root.join("flows").join("f");

    std::fs::create_dir_all(&task_dir).unwrap();
    std::fs::create_dir_all(&workflow_dir).unwrap();
    std::fs::create_dir_all(agents_root.join("teams")).unwrap();
    std::fs::write(
        agents_root.join("teams").join("t.yaml"),
        "collaboration_tone: Work together.\n",
    )
    .unwrap();

    Harness {
        _dir: dir,
        agents_root,
        task_dir,
        workflow_dir,
        provider: FakeProvider::new(),
        flow_yaml: flow_yaml.to_string(),
    }
}

impl Harness {
    fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with(|_| {})
    }

    fn orchestrator_with(&self, tweak: impl FnOnce(&mut OrchestratorParams)) -> Orchestrator {
        let flow: FlowDocument = serde_yaml::from_str(&self.flow_yaml).unwrap();
        let mut params = OrchestratorParams {
            flow,
            ctx: TaskContext {
                task_id: "task-1".to_string(),
                task_dir: self.task_dir.clone(),
                workflow_dir: self.workflow_dir.clone(),
                task_input: serde_json::Map::new(),
            },
            agents: AgentsDir::new(&self.agents_root),
            provider: Arc::new(self.provider.clone()),
            start_paused: false,
            max_parallel: None,
            tick: Some(Duration::from_millis(15)),
            shutdown: None,
        };
        tweak(&mut params);
        Orchestrator::new(params).unwrap()
    }

    async fn run(&self) -> RunReport {
        let (_tx, rx) = mpsc::channel(8);
        self.orchestrator().run(rx).await.unwrap()
    }

    fn log(&self) -> String {
        std::fs::read_to_string(self.task_dir.join("state").join("rein.log")).unwrap_or_default()
    }

    fn record_status(&self, name: &str) -> BlockStatus {
        let records = TaskStore::load(&rein_storage::db_path(&self.task_dir)).unwrap();
        records
            .into_iter()
            .find(|r| r.name == name)
            .map(|r| r.status)
            .unwrap_or_else(|| panic!("no record for {name}"))
    }

    fn result_exists(&self, name: &str) -> bool {
        self.task_dir
            .join(name)
            .join("outputs")
            .join("result.json")
            .is_file()
    }

    fn summary(&self) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(self.task_dir.join("summary.json")).unwrap())
            .unwrap()
    }

    fn write_script(&self, name: &str, body: &str) {
        std::fs::write(self.workflow_dir.join(name), body).unwrap();
    }
}

// ── Linear flows ──────────────────────────────────────────────────────────

#[tokio::test]
async fn linear_flow_completes_in_order() {
    let h = harness(
        r#"
name: f
team: t
blocks:
  - name: a
    prompt: first
  - name: b
    prompt: second
    depends_on: [a]
  - name: c
    prompt: third
    depends_on: [b]
"#,
    );

    let report = h.run().await;
    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(report.completed, 3);
    assert_eq!(report.failed, 0);

    for name in ["a", "b", "c"] {
        assert_eq!(h.record_status(name), BlockStatus::Done);
        assert!(h.result_exists(name), "missing result for {name}");
    }

    // markers appear in dependency order
    let log = h.log();
    let pos = |needle: &str| log.find(needle).unwrap_or_else(|| panic!("{needle} missing"));
    assert!(pos("[BLOCK_START] task=task-1 block=a") < pos("[BLOCK_START] task=task-1 block=b"));
    assert!(pos("[BLOCK_START] task=task-1 block=b") < pos("[BLOCK_START] task=task-1 block=c"));
    assert_eq!(log.matches("[BLOCK_DONE]").count(), 3);
    assert!(log.contains("[TASK_DONE] task=task-1 status=completed blocks=3"));

    let summary = h.summary();
    assert_eq!(summary["completed"], 3);
    assert_eq!(summary["failed"], 0);
    assert_eq!(
        rein_storage::read_status(&h.task_dir),
        Some(TaskStatus::Completed)
    );
}

#[tokio::test]
async fn dependents_see_dependency_outputs() {
    let h = harness(
        r#"
name: f
team: t
blocks:
  - name: outline
    prompt: make outline
  - name: draft
    prompt: "expand {{ outline.json }}"
    depends_on: [outline]
"#,
    );
    let report = h.run().await;
    assert_eq!(report.status, TaskStatus::Completed);

    let calls = h.provider.calls();
    let draft_call = calls.iter().find(|c| c.stage == "draft").unwrap();
    // the outline envelope content was substituted into draft's prompt
    assert!(draft_call.prompt.contains("fake reply"), "{}", draft_call.prompt);
}

// ── Conditional branches ─────────────────────────────────────────────────

const BRANCH_FLOW: &str = r#"
name: f
team: t
blocks:
  - name: review
    prompt: review it
    next:
      - if: "{{ result.approved }}"
        goto: publish
      - else: true
        goto: revise
  - name: publish
    prompt: publish it
  - name: revise
    prompt: revise it
"#;

#[tokio::test]
async fn conditional_branch_takes_if_side() {
    let mut h = harness(BRANCH_FLOW);
    h.provider = h.provider.clone().reply_for("review", "{\"approved\": true}");

    let report = h.run().await;
    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(h.record_status("publish"), BlockStatus::Done);
    assert_eq!(h.record_status("revise"), BlockStatus::Waiting);
    assert!(h.result_exists("publish"));
    assert!(!h.result_exists("revise"));
}

#[tokio::test]
async fn conditional_branch_takes_else_side() {
    let mut h = harness(BRANCH_FLOW);
    h.provider = h.provider.clone().reply_for("review", "{\"approved\": false}");

    h.run().await;
    assert_eq!(h.record_status("revise"), BlockStatus::Done);
    assert_eq!(h.record_status("publish"), BlockStatus::Waiting);
}

// ── Bounded loops ─────────────────────────────────────────────────────────

#[tokio::test]
async fn bounded_loop_respects_max_runs() {
    let mut h = harness(
        r#"
name: f
team: t
blocks:
  - name: review
    prompt: review it
    max_runs: 2
    next:
      - if: "{{ result.approved }}"
        goto: publish
      - else: true
        goto: revise
  - name: publish
    prompt: publish it
  - name: revise
    prompt: revise it
    max_runs: 5
    next: review
"#,
    );
    // review always rejects
    h.provider = h.provider.clone().reply_for("review", "{\"approved\": false}");

    let report = h.run().await;
    assert_eq!(report.status, TaskStatus::Completed);

    // initial run plus two re-entries
    assert_eq!(h.provider.call_count("review"), 3);
    let log = h.log();
    assert_eq!(log.matches("NEXT QUEUED | revise -> review").count(), 2);
    assert_eq!(
        log.matches("NEXT BLOCKED | review | run_count=2 >= max_runs=2").count(),
        1
    );
    assert_eq!(h.record_status("publish"), BlockStatus::Waiting);
}

#[tokio::test]
async fn self_loop_with_max_runs_one_rejects_second_enqueue() {
    let h = harness(
        r#"
name: f
team: t
blocks:
  - name: retry
    prompt: go
    next: retry
"#,
    );
    let report = h.run().await;

    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(h.provider.call_count("retry"), 2);
    let log = h.log();
    assert_eq!(log.matches("NEXT QUEUED | retry -> retry").count(), 1);
    assert_eq!(
        log.matches("NEXT BLOCKED | retry | run_count=1 >= max_runs=1").count(),
        1
    );

    // invariant: run_count never exceeds max_runs
    let records = TaskStore::load(&rein_storage::db_path(&h.task_dir)).unwrap();
    for record in records {
        assert!(record.run_count <= record.max_runs);
    }
}

#[tokio::test]
async fn next_reentry_deletes_prior_outputs_before_rerun() {
    let mut h = harness(
        r#"
name: f
team: t
blocks:
  - name: retry
    prompt: go
    max_runs: 2
    next: retry
"#,
    );
    h.provider = h.provider.clone().reply_for("retry", "fresh text");
    h.run().await;

    // after the loop settles the final output exists and is the latest run
    assert!(h.result_exists("retry"));
    assert_eq!(h.provider.call_count("retry"), 3);
}

// ── Crash and resume ──────────────────────────────────────────────────────

#[tokio::test]
async fn interrupted_block_invalidates_downstream_on_resume() {
    let h = harness(
        r#"
name: f
team: t
blocks:
  - name: a
    prompt: first
  - name: b
    prompt: second
    depends_on: [a]
  - name: c
    prompt: third
    depends_on: [b]
"#,
    );

    let report = h.run().await;
    assert_eq!(report.completed, 3);

    // simulate a crash while b was running
    let db = rein_storage::db_path(&h.task_dir);
    let mut store = TaskStore::open(&db, true).unwrap();
    let mut b = store.get("b").unwrap().clone();
    b.status = BlockStatus::Running;
    store.upsert(b).unwrap();
    drop(store);

    // fresh provider so we can count the re-runs
    let resumed = harness_with_existing(&h);
    let report = resumed.run().await;
    assert_eq!(report.status, TaskStatus::Completed);

    // a preserved; b and c re-ran
    assert_eq!(resumed.provider.call_count("a"), 0);
    assert_eq!(resumed.provider.call_count("b"), 1);
    assert_eq!(resumed.provider.call_count("c"), 1);
    assert!(resumed.log().contains("REIN RESUMED"));
}

#[tokio::test]
async fn completed_run_restarts_as_a_no_op() {
    let h = harness(
        r#"
name: f
team: t
blocks:
  - name: a
    prompt: first
  - name: b
    prompt: second
    depends_on: [a]
"#,
    );
    let first = h.run().await;
    assert_eq!(first.completed, 2);

    let resumed = harness_with_existing(&h);
    let report = resumed.run().await;
    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(report.completed, 2);
    assert!(resumed.provider.calls().is_empty());
}

/// Re-open the same task/flow directories with a fresh fake provider.
fn harness_with_existing(h: &Harness) -> Harness {
    Harness {
        _dir: TempDir::new().unwrap(), // placeholder; paths below own the data
        agents_root: h.agents_root.clone(),
        task_dir: h.task_dir.clone(),
        workflow_dir: h.workflow_dir.clone(),
        provider: FakeProvider::new(),
        flow_yaml: h.flow_yaml.clone(),
    }
}

// ── Failure policy ────────────────────────────────────────────────────────

#[tokio::test]
async fn critical_failure_stops_the_workflow() {
    let mut h = harness(
        r#"
name: f
team: t
blocks:
  - name: a
    prompt: first
  - name: b
    prompt: second
    depends_on: [a]
  - name: c
    prompt: third
    depends_on: [b]
"#,
    );
    h.provider = h.provider.clone().fail_for("b", "provider exploded");

    let report = h.run().await;
    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.failed, 1);
    assert!(report.stop_reason.unwrap().contains("critical failure in block 'b'"));

    assert_eq!(h.record_status("b"), BlockStatus::Failed);
    // c never ran
    assert_ne!(h.record_status("c"), BlockStatus::Done);
    assert!(!h.result_exists("c"));
    assert_eq!(
        rein_storage::read_status(&h.task_dir),
        Some(TaskStatus::Failed)
    );
    assert!(h.log().contains("WORKFLOW STOPPED | b | continue_if_failed=false"));
}

#[tokio::test]
async fn tolerated_failure_skips_and_continues() {
    let mut h = harness(
        r#"
name: f
team: t
blocks:
  - name: a
    prompt: first
  - name: b
    prompt: second
    depends_on: [a]
    continue_if_failed: true
  - name: c
    prompt: third
    depends_on: [b]
    skip_if_previous_failed: true
  - name: d
    prompt: fourth
    depends_on: [b]
"#,
    );
    h.provider = h.provider.clone().fail_for("b", "boom");

    let report = h.run().await;
    // workflow ran to the end despite b failing
    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);

    assert_eq!(h.record_status("b"), BlockStatus::Failed);
    assert_eq!(h.record_status("c"), BlockStatus::Skipped);
    // d opted out of skipping: it still runs (testable property 11)
    assert_eq!(h.record_status("d"), BlockStatus::Done);
    // skipped blocks leave no output file
    assert!(!h.result_exists("c"));
    assert!(h.log().contains("BLOCK SKIPPED | c"));

    let summary = h.summary();
    assert_eq!(summary["skipped"], 1);
}

// ── Commands ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_paused_waits_for_resume_workflow() {
    let h = harness(
        r#"
name: f
team: t
blocks:
  - name: a
    prompt: only
"#,
    );
    let (tx, rx) = mpsc::channel(8);
    let orchestrator = h.orchestrator_with(|p| p.start_paused = true);

    let run = tokio::spawn(orchestrator.run(rx));
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(h.provider.calls().is_empty(), "spawned while paused");

    tx.send(Command::ResumeWorkflow).await.unwrap();
    let report = run.await.unwrap().unwrap();
    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(h.provider.call_count("a"), 1);
    assert!(h.log().contains("COMMAND | resume-workflow | SUCCESS"));
}

#[tokio::test]
async fn cancel_running_block_terminates_it() {
    let h = harness(
        r#"
name: f
team: t
blocks:
  - name: slow
    logic:
      custom: slow.sh
"#,
    );
    h.write_script("slow.sh", "#!/bin/bash\nsleep 30\n");

    let (tx, rx) = mpsc::channel(8);
    let run = tokio::spawn(h.orchestrator().run(rx));
    tokio::time::sleep(Duration::from_millis(150)).await;

    tx.send(Command::Cancel("slow".to_string())).await.unwrap();
    let report = run.await.unwrap().unwrap();

    assert_eq!(h.record_status("slow"), BlockStatus::Cancelled);
    assert_eq!(report.cancelled, 1);
    assert!(h.log().contains("COMMAND | cancel slow | SUCCESS"));
}

#[tokio::test]
async fn pause_resume_waiting_block() {
    let h = harness(
        r#"
name: f
team: t
blocks:
  - name: gate
    logic:
      custom: gate.sh
  - name: after
    prompt: later
    depends_on: [gate]
"#,
    );
    // gate takes long enough for commands to land while `after` waits
    h.write_script(
        "gate.sh",
        "#!/bin/bash\nsleep 0.4\nctx=$(cat)\nmkdir -p gate/outputs\nprintf '{\"stage\":\"gate\",\"result\":\"ok\",\"timestamp\":\"t\"}' > gate/outputs/result.json\n",
    );

    let (tx, rx) = mpsc::channel(8);
    let run = tokio::spawn(h.orchestrator().run(rx));
    tokio::time::sleep(Duration::from_millis(100)).await;

    tx.send(Command::Pause("after".to_string())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    // gate finished but `after` is paused
    assert_ne!(h.record_status("after"), BlockStatus::Done);

    tx.send(Command::Resume("after".to_string())).await.unwrap();
    let report = run.await.unwrap().unwrap();
    assert_eq!(report.status, TaskStatus::Completed);
    assert_eq!(h.record_status("after"), BlockStatus::Done);
}

#[tokio::test]
async fn pause_of_unknown_target_fails_in_log() {
    let h = harness(
        r#"
name: f
team: t
blocks:
  - name: slow
    logic:
      custom: slow.sh
"#,
    );
    h.write_script(
        "slow.sh",
        "#!/bin/bash\nsleep 0.3\nctx=$(cat)\nmkdir -p slow/outputs\nprintf '{\"stage\":\"slow\",\"result\":\"ok\",\"timestamp\":\"t\"}' > slow/outputs/result.json\n",
    );

    let (tx, rx) = mpsc::channel(8);
    let run = tokio::spawn(h.orchestrator().run(rx));
    tx.send(Command::Pause("ghost".to_string())).await.unwrap();
    tx.send(Command::Status).await.unwrap();
    let report = run.await.unwrap().unwrap();

    assert_eq!(report.completed, 1);
    let log = h.log();
    assert!(log.contains("COMMAND | pause ghost | FAILED"));
    assert!(log.contains("COMMAND | status |"));
}

// ── Timeout ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn workflow_timeout_terminates_with_failed_status() {
    let h = harness(
        r#"
name: f
team: t
timeout: 1
blocks:
  - name: slow
    logic:
      custom: slow.sh
"#,
    );
    h.write_script("slow.sh", "#!/bin/bash\nsleep 30\n");

    let report = h.run().await;
    assert_eq!(report.status, TaskStatus::Failed);
    assert_eq!(report.stop_reason.as_deref(), Some("timeout exceeded"));
    assert!(h.log().contains("TIMEOUT EXCEEDED"));
}

// ── Concurrency bound ────────────────────────────────────────────────────

#[tokio::test]
async fn max_parallel_bounds_running_blocks() {
    let h = harness(
        r#"
name: f
team: t
max_parallel: 2
blocks:
  - name: w1
    logic: { custom: count.sh }
  - name: w2
    logic: { custom: count.sh }
  - name: w3
    logic: { custom: count.sh }
  - name: w4
    logic: { custom: count.sh }
"#,
    );
    // each worker records overlap with the others via a shared counter dir
    h.write_script(
        "count.sh",
        r#"#!/bin/bash
ctx=$(cat)
out=$(echo "$ctx" | python3 -c 'import json,sys; print(json.load(sys.stdin)["output_file"])')
name=$(echo "$ctx" | python3 -c 'import json,sys; print(json.load(sys.stdin)["block_config"]["name"])')
mkdir -p "$(dirname "$out")" running
touch "running/$name"
count=$(ls running | wc -l)
echo "$count" >> peak.txt
sleep 0.3
rm "running/$name"
printf '{"stage": "%s", "result": "ok", "timestamp": "t"}' "$name" > "$out"
"#,
    );

    let report = h.run().await;
    assert_eq!(report.completed, 4);

    let peaks = std::fs::read_to_string(h.task_dir.join("peak.txt")).unwrap();
    let max_seen = peaks
        .lines()
        .filter_map(|l| l.trim().parse::<u32>().ok())
        .max()
        .unwrap();
    assert!(max_seen <= 2, "saw {max_seen} concurrent workers");
}
