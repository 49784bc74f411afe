// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The coordinator: drives one task's DAG to completion.
//!
//! All mutable scheduling state lives here, owned by a single task. Block
//! workers run as spawned tasks bounded by a counting semaphore and
//! report back over one mpsc channel; the coordinator is the sole writer
//! of the process table and of task-level files.

use crate::channel;
use crate::command::Command;
use crate::cond;
use crate::context::{command_socket_path, TaskContext};
use crate::error::EngineError;
use crate::reconcile;
use crate::summary::{self, RunMetadata, SummaryData};
use crate::worker::{self, BlockJob, BlockOutcome, WorkerMsg};
use rein_core::{BlockStatus, Clock, Marker, ProcessRecord, SystemClock, UsageStats};
use rein_flow::{AgentsDir, FlowDocument, NextSpec};
use rein_logic::LogicRunner;
use rein_providers::Provider;
use rein_storage::{EventLog, TaskStatus, TaskStore};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, info, warn};

/// Why the workflow stopped before draining naturally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    CriticalFailure(String),
    Timeout,
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::CriticalFailure(block) => {
                write!(f, "critical failure in block '{block}' (continue_if_failed=false)")
            }
            StopReason::Timeout => write!(f, "timeout exceeded"),
            StopReason::Interrupted => write!(f, "interrupted by user"),
        }
    }
}

/// Final accounting for one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: TaskStatus,
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub cancelled: u32,
    pub stop_reason: Option<String>,
    pub total_usage: UsageStats,
    pub block_usage: HashMap<String, UsageStats>,
    /// Result file of the flow's last block, when it exists.
    pub final_result: Option<PathBuf>,
}

/// Construction parameters for [`Orchestrator`].
pub struct OrchestratorParams {
    pub flow: FlowDocument,
    pub ctx: TaskContext,
    pub agents: AgentsDir,
    pub provider: Arc<dyn Provider>,
    /// Start with the workflow-wide spawn gate closed.
    pub start_paused: bool,
    /// Override the flow's `max_parallel`.
    pub max_parallel: Option<usize>,
    /// Coordinator tick (default 500 ms; tests shrink it).
    pub tick: Option<Duration>,
    /// External shutdown signal (SIGINT wiring lives in the CLI).
    pub shutdown: Option<watch::Receiver<bool>>,
}

struct RunningWorker {
    uid: String,
    cancel: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

pub struct Orchestrator {
    flow: FlowDocument,
    ctx: TaskContext,
    agents: AgentsDir,
    provider: Arc<dyn Provider>,
    store: TaskStore,
    log: EventLog,
    clock: SystemClock,
    max_parallel: usize,
    tick: Duration,
    shutdown: Option<watch::Receiver<bool>>,
    resumed: bool,
    start_iso: String,

    records: HashMap<String, ProcessRecord>,
    completed: HashSet<String>,
    run_counts: HashMap<String, u32>,
    /// Blocks awaiting their first dependency-scheduled spawn, in
    /// document order. Next-target leaf blocks are excluded: they enter
    /// only through the state machine.
    pending: Vec<String>,
    next_queue: VecDeque<(String, serde_json::Value)>,
    running: HashMap<String, RunningWorker>,
    paused_from: HashMap<String, BlockStatus>,
    workflow_paused: bool,
    stop: Option<StopReason>,
    block_usage: HashMap<String, UsageStats>,
    team_tone: String,

    semaphore: Arc<Semaphore>,
    worker_tx: mpsc::Sender<WorkerMsg>,
    worker_rx: mpsc::Receiver<WorkerMsg>,
}

enum SpawnResult {
    Spawned,
    Skipped,
    AlreadyTerminal,
    Deferred,
    NoPermit,
}

impl Orchestrator {
    pub fn new(params: OrchestratorParams) -> Result<Self, EngineError> {
        rein_flow::validate(&params.flow)?;
        let phases = rein_flow::phases(&params.flow.blocks);

        let db_path = rein_storage::db_path(&params.ctx.task_dir);
        let resumed = db_path.exists();
        let mut store = TaskStore::open(&db_path, resumed)?;
        let log = EventLog::for_task_dir(&params.ctx.task_dir);

        let clock = SystemClock;
        let now_ms = clock.epoch_ms();
        let existing = store.all();
        let reconciled = reconcile::reconcile(&params.flow, &phases, &existing, now_ms);

        if resumed {
            log.append(&format!(
                "REIN RESUMED | run_id={} | preserved={} | invalidated={}",
                params.ctx.task_id,
                reconciled.preserved,
                reconciled.invalidated.len()
            ));
        }

        for name in &reconciled.invalidated {
            params.ctx.clean_outputs(name)?;
            log.append(&format!("CLEANUP | {name} | removed outputs"));
        }

        // Persist everything not preserved verbatim from the previous run.
        for record in reconciled.records.values() {
            if !reconciled.completed.contains(&record.name) || !resumed {
                store.upsert(record.clone())?;
            }
        }

        let max_parallel = params.max_parallel.unwrap_or(params.flow.max_parallel).max(1);
        if !resumed {
            log.append(&format!(
                "REIN STARTED | run_id={} | db={} | max_parallel={max_parallel}",
                params.ctx.task_id,
                db_path.display()
            ));
        }

        let run_counts = reconciled
            .records
            .values()
            .filter(|r| r.run_count > 0)
            .map(|r| (r.name.clone(), r.run_count))
            .collect();

        let next_targets = next_target_leaves(&params.flow);
        let pending = params
            .flow
            .blocks
            .iter()
            .map(|b| b.name.clone())
            .filter(|name| !reconciled.completed.contains(name) && !next_targets.contains(name))
            .collect();

        let (worker_tx, worker_rx) = mpsc::channel(256);
        let team_tone = params.agents.load_team_tone(&params.flow.team);

        Ok(Self {
            completed: reconciled.completed,
            records: reconciled.records,
            run_counts,
            pending,
            next_queue: VecDeque::new(),
            running: HashMap::new(),
            paused_from: HashMap::new(),
            workflow_paused: params.start_paused,
            stop: None,
            block_usage: HashMap::new(),
            team_tone,
            semaphore: Arc::new(Semaphore::new(max_parallel)),
            worker_tx,
            worker_rx,
            max_parallel,
            tick: params.tick.unwrap_or(Duration::from_millis(500)),
            shutdown: params.shutdown,
            resumed,
            start_iso: rein_core::iso_now(),
            store,
            log,
            clock,
            flow: params.flow,
            ctx: params.ctx,
            agents: params.agents,
            provider: params.provider,
        })
    }

    /// Run the workflow to completion, draining `commands` each tick.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Result<RunReport, EngineError> {
        rein_storage::write_status(&self.ctx.task_dir, TaskStatus::Running)?;
        let started = Instant::now();
        let timeout = self.flow.timeout.map(Duration::from_secs);

        loop {
            while let Ok(command) = commands.try_recv() {
                self.apply_command(command)?;
            }
            while let Ok(msg) = self.worker_rx.try_recv() {
                self.on_worker_msg(msg)?;
            }

            if let Some(rx) = &self.shutdown {
                if *rx.borrow() && self.stop.is_none() {
                    self.stop = Some(StopReason::Interrupted);
                }
            }

            if let Some(t) = timeout {
                if started.elapsed() > t && self.stop.is_none() {
                    self.log.append(&format!(
                        "TIMEOUT EXCEEDED | elapsed={:.1}s > limit={}s",
                        started.elapsed().as_secs_f64(),
                        t.as_secs()
                    ));
                    self.stop = Some(StopReason::Timeout);
                }
            }

            if let Some(reason) = self.stop.clone() {
                self.log.append(&format!("WORKFLOW STOPPING | reason={reason}"));
                self.terminate_running();
                break;
            }

            // Past 95% of the timeout, stop spawning; in-flight blocks finish.
            let spawn_allowed = timeout
                .map(|t| started.elapsed() < t.mul_f64(0.95))
                .unwrap_or(true);

            if !self.workflow_paused && spawn_allowed {
                self.spawn_ready()?;
                self.drain_next_queue()?;
            }

            if self.pending.is_empty() && self.next_queue.is_empty() && self.running.is_empty() {
                break;
            }

            tokio::time::sleep(self.tick).await;
        }

        // Late messages from workers that finished during the last tick.
        while let Ok(msg) = self.worker_rx.try_recv() {
            self.on_worker_msg(msg)?;
        }

        self.finalize()
    }

    // ── Spawning ─────────────────────────────────────────────────────────

    fn spawn_ready(&mut self) -> Result<(), EngineError> {
        let ready: Vec<String> = self
            .pending
            .iter()
            .filter(|name| self.is_ready(name))
            .cloned()
            .collect();

        for name in ready {
            match self.try_spawn(&name)? {
                SpawnResult::Spawned | SpawnResult::Skipped | SpawnResult::AlreadyTerminal => {
                    self.pending.retain(|p| p != &name);
                }
                SpawnResult::Deferred => {}
                SpawnResult::NoPermit => break,
            }
        }
        Ok(())
    }

    fn drain_next_queue(&mut self) -> Result<(), EngineError> {
        while let Some((name, data)) = self.next_queue.pop_front() {
            // The state machine owns this block now.
            self.pending.retain(|p| p != &name);
            match self.try_spawn(&name)? {
                SpawnResult::Spawned | SpawnResult::Skipped | SpawnResult::AlreadyTerminal => {
                    self.log.append(&format!("NEXT SPAWN | {name}"));
                }
                SpawnResult::Deferred | SpawnResult::NoPermit => {
                    // Preserve FIFO order for the retry on a later tick.
                    self.next_queue.push_front((name, data));
                    break;
                }
            }
        }
        Ok(())
    }

    fn is_ready(&self, name: &str) -> bool {
        let Some(record) = self.records.get(name) else {
            return false;
        };
        record.status == BlockStatus::Waiting
            && record.depends_on.iter().all(|dep| self.completed.contains(dep))
    }

    fn try_spawn(&mut self, name: &str) -> Result<SpawnResult, EngineError> {
        let record = self
            .records
            .get(name)
            .ok_or_else(|| EngineError::BlockNotFound(name.to_string()))?;

        if record.status.is_terminal() {
            self.completed.insert(name.to_string());
            return Ok(SpawnResult::AlreadyTerminal);
        }
        if record.status == BlockStatus::Paused {
            return Ok(SpawnResult::Deferred);
        }

        // A paused dependency with blocking_pause holds dependents back.
        let blocked = record.depends_on.iter().any(|dep| {
            self.records
                .get(dep)
                .map(|d| d.status == BlockStatus::Paused && d.blocking_pause)
                .unwrap_or(false)
        });
        if blocked {
            return Ok(SpawnResult::Deferred);
        }

        let block = self
            .flow
            .block(name)
            .ok_or_else(|| EngineError::BlockNotFound(name.to_string()))?
            .clone();

        // Failure policy: elide the block entirely when a previous block
        // failed and this block opted out.
        let any_failed = self
            .records
            .values()
            .any(|r| r.status == BlockStatus::Failed);
        if any_failed && block.skip_if_previous_failed {
            let now = self.clock.epoch_ms();
            if let Some(record) = self.records.get_mut(name) {
                record.status = BlockStatus::Skipped;
                record.updated_at_ms = now;
                self.store.upsert(record.clone())?;
            }
            self.completed.insert(name.to_string());
            self.log.append(&format!(
                "BLOCK SKIPPED | {name} | skip_if_previous_failed=true and failures detected"
            ));
            return Ok(SpawnResult::Skipped);
        }

        let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
            return Ok(SpawnResult::NoPermit);
        };

        let now = self.clock.epoch_ms();
        let uid;
        {
            let Some(record) = self.records.get_mut(name) else {
                return Err(EngineError::BlockNotFound(name.to_string()));
            };
            record.status = BlockStatus::Running;
            record.start_time_ms = now;
            record.updated_at_ms = now;
            record.progress = 0;
            record.pid = Some(std::process::id());
            uid = record.uid.clone();
            self.store.upsert(record.clone())?;
        }

        self.emit_marker(&Marker::BlockStart {
            task: self.ctx.task_id.clone(),
            block: name.to_string(),
        });
        let depends = if block.depends_on.is_empty() {
            String::new()
        } else {
            format!(" | depends_on={:?}", block.depends_on)
        };
        self.log.append(&format!(
            "BLOCK STARTED | {name}[{uid}] | phase={}{depends}",
            self.records.get(name).map(|r| r.phase).unwrap_or(0)
        ));

        let specialist_text = match &block.specialist {
            Some(specialist) => format!("\n---\n{}", self.agents.load_specialist(specialist)),
            None => String::new(),
        };
        let mut logic = LogicRunner::new(
            self.ctx.task_dir.clone(),
            self.ctx.workflow_dir.clone(),
            self.log.clone(),
        );
        if let Some(secs) = block.timeout {
            logic = logic.with_timeout(Duration::from_secs(secs));
        }

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let job = BlockJob {
            uid: uid.clone(),
            ctx: self.ctx.clone(),
            team_tone: self.team_tone.clone(),
            specialist_text,
            provider: Arc::clone(&self.provider),
            logic,
            log: self.log.clone(),
            cancel: cancel_rx,
            block,
        };

        let tx = self.worker_tx.clone();
        let worker_name = name.to_string();
        let worker_uid = uid.clone();
        let handle = tokio::spawn(async move {
            let outcome = worker::run_block(&job, &tx).await;
            let _ = tx
                .send(WorkerMsg::Finished {
                    name: worker_name,
                    uid: worker_uid,
                    outcome,
                })
                .await;
            drop(permit);
        });

        self.running.insert(
            name.to_string(),
            RunningWorker {
                uid,
                cancel: cancel_tx,
                handle,
            },
        );
        Ok(SpawnResult::Spawned)
    }

    // ── Worker messages ──────────────────────────────────────────────────

    fn on_worker_msg(&mut self, msg: WorkerMsg) -> Result<(), EngineError> {
        match msg {
            WorkerMsg::Progress { name, progress } => {
                let now = self.clock.epoch_ms();
                if let Some(record) = self.records.get_mut(&name) {
                    if record.status == BlockStatus::Running {
                        record.advance_progress(progress, now);
                        self.store.upsert(record.clone())?;
                    }
                }
            }
            WorkerMsg::Finished { name, uid, outcome } => {
                self.on_finished(&name, &uid, outcome)?;
            }
        }
        Ok(())
    }

    fn on_finished(
        &mut self,
        name: &str,
        uid: &str,
        outcome: BlockOutcome,
    ) -> Result<(), EngineError> {
        // A stale message after cancel or re-entry is ignored.
        let current_uid = self.running.get(name).map(|w| w.uid.clone());
        if current_uid.as_deref() != Some(uid) {
            debug!(name, uid, "stale worker message ignored");
            return Ok(());
        }
        self.running.remove(name);
        self.paused_from.remove(name);

        let now = self.clock.epoch_ms();
        match outcome {
            BlockOutcome::Done { usage } => {
                if let Some(record) = self.records.get_mut(name) {
                    record.status = BlockStatus::Done;
                    record.progress = 100;
                    record.exit_code = Some(0);
                    record.updated_at_ms = now;
                    self.store.upsert(record.clone())?;
                }
                self.completed.insert(name.to_string());
                self.log.append(&format!(
                    "BLOCK COMPLETED | {name}[{uid}] | saved={}",
                    self.ctx.result_path(name).display()
                ));
                self.emit_marker(&Marker::BlockDone {
                    task: self.ctx.task_id.clone(),
                    block: name.to_string(),
                });
                if let Some(usage) = usage {
                    self.block_usage.insert(name.to_string(), usage);
                }
                self.evaluate_next(name)?;
            }
            BlockOutcome::Failed { reason } => {
                if let Some(record) = self.records.get_mut(name) {
                    record.status = BlockStatus::Failed;
                    record.exit_code = Some(1);
                    record.updated_at_ms = now;
                    self.store.upsert(record.clone())?;
                }
                // Failed blocks join the completed set so unrelated
                // downstream blocks still run; dependents decide via
                // their own skip policy.
                self.completed.insert(name.to_string());
                self.log
                    .append(&format!("BLOCK FAILED | {name}[{uid}] | {reason}"));

                let continue_if_failed = self
                    .flow
                    .block(name)
                    .map(|b| b.continue_if_failed)
                    .unwrap_or(false);
                if !continue_if_failed && self.stop.is_none() {
                    self.stop = Some(StopReason::CriticalFailure(name.to_string()));
                    self.log
                        .append(&format!("WORKFLOW STOPPED | {name} | continue_if_failed=false"));
                }
            }
            BlockOutcome::Cancelled => {
                if let Some(record) = self.records.get_mut(name) {
                    record.status = BlockStatus::Cancelled;
                    record.updated_at_ms = now;
                    self.store.upsert(record.clone())?;
                }
                self.completed.insert(name.to_string());
                self.log.append(&format!("BLOCK CANCELLED | {name}[{uid}]"));
            }
        }
        Ok(())
    }

    // ── Next transitions ─────────────────────────────────────────────────

    fn evaluate_next(&mut self, name: &str) -> Result<(), EngineError> {
        let Some(block) = self.flow.block(name) else {
            return Ok(());
        };
        let Some(next) = block.next.clone() else {
            return Ok(());
        };

        let envelope = match rein_core::ResultEnvelope::read(&self.ctx.result_path(name)) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.log.append(&format!("NEXT EVAL ERROR | {name} | {e}"));
                return Ok(());
            }
        };
        let data = serde_json::json!({
            "result": envelope.parsed_result(),
            "_stage": name,
            "_saved": serde_json::to_value(&envelope).unwrap_or_default(),
        });

        let Some(target) = cond::select_next_target(&next, &data) else {
            return Ok(());
        };
        self.log_next_choice(name, &next, &target);

        if self.running.contains_key(&target) {
            self.log
                .append(&format!("NEXT BLOCKED | {target} | still running"));
            return Ok(());
        }

        let max_runs = self
            .flow
            .block(&target)
            .map(|b| b.max_runs)
            .unwrap_or(1);
        let current = self.run_counts.get(&target).copied().unwrap_or(0);
        if current >= max_runs {
            self.log.append(&format!(
                "NEXT BLOCKED | {target} | run_count={current} >= max_runs={max_runs}"
            ));
            return Ok(());
        }

        let new_count = current + 1;
        self.run_counts.insert(target.clone(), new_count);
        self.completed.remove(&target);
        self.ctx.clean_outputs(&target)?;
        let now = self.clock.epoch_ms();
        if let Some(record) = self.records.get_mut(&target) {
            record.reset_to_waiting(now);
            record.run_count = new_count;
            self.store.upsert(record.clone())?;
        }
        self.next_queue.push_back((target.clone(), data));
        self.log.append(&format!(
            "NEXT QUEUED | {name} -> {target} | run={new_count}/{max_runs}"
        ));
        Ok(())
    }

    fn log_next_choice(&self, name: &str, next: &NextSpec, target: &str) {
        match next {
            NextSpec::Name(_) => self.log.append(&format!("NEXT SIMPLE | {name} -> {target}")),
            NextSpec::Conditions(_) => {
                self.log.append(&format!("NEXT MATCH | {name} -> {target}"))
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────────

    fn apply_command(&mut self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::Pause(target) => {
                let ok = self.pause_single(&target)?;
                self.log_command_result("pause", &target, ok);
            }
            Command::Resume(target) => {
                let ok = self.resume_single(&target)?;
                self.log_command_result("resume", &target, ok);
            }
            Command::Cancel(target) => {
                let ok = self.cancel_single(&target)?;
                self.log_command_result("cancel", &target, ok);
            }
            Command::PauseWorkflow => {
                if self.workflow_paused {
                    self.log.append("COMMAND | pause-workflow | FAILED (already paused)");
                } else {
                    self.workflow_paused = true;
                    self.log.append("COMMAND | pause-workflow | SUCCESS");
                }
            }
            Command::ResumeWorkflow => {
                if self.workflow_paused {
                    self.workflow_paused = false;
                    self.log.append("COMMAND | resume-workflow | SUCCESS");
                } else {
                    self.log.append("COMMAND | resume-workflow | FAILED (not paused)");
                }
            }
            Command::Status => {
                let count = |s: BlockStatus| {
                    self.records.values().filter(|r| r.status == s).count()
                };
                self.log.append(&format!(
                    "COMMAND | status | running={} paused={} done={} failed={} waiting={} workflow_paused={}",
                    count(BlockStatus::Running),
                    count(BlockStatus::Paused),
                    count(BlockStatus::Done),
                    count(BlockStatus::Failed),
                    count(BlockStatus::Waiting),
                    if self.workflow_paused { "yes" } else { "no" }
                ));
            }
            Command::List => {
                for record in self.store.all() {
                    self.log.append(&format!(
                        "PROCESS | {}[{}] | status={} pid={:?}",
                        record.name, record.uid, record.status, record.pid
                    ));
                }
            }
            Command::Log(target) => {
                if let Some(record) = self.find_record(&target) {
                    self.log.append(&format!(
                        "COMMAND | log {}[{}] | status={} exit_code={:?} pid={:?} progress={}",
                        record.name,
                        record.uid,
                        record.status,
                        record.exit_code,
                        record.pid,
                        record.progress
                    ));
                } else {
                    self.log.append(&format!("COMMAND | log {target} | FAILED (not found)"));
                }
            }
            Command::Unknown(line) => {
                self.log.append(&format!("COMMAND | unknown | {line}"));
            }
        }
        Ok(())
    }

    fn log_command_result(&self, action: &str, target: &str, ok: bool) {
        let verdict = if ok { "SUCCESS" } else { "FAILED" };
        self.log.append(&format!("COMMAND | {action} {target} | {verdict}"));
    }

    fn find_record(&self, identifier: &str) -> Option<&ProcessRecord> {
        self.records.values().find(|r| r.matches(identifier))
    }

    fn find_record_name(&self, identifier: &str) -> Option<String> {
        self.find_record(identifier).map(|r| r.name.clone())
    }

    fn pause_single(&mut self, identifier: &str) -> Result<bool, EngineError> {
        let Some(name) = self.find_record_name(identifier) else {
            return Ok(false);
        };
        let now = self.clock.epoch_ms();
        let Some(record) = self.records.get_mut(&name) else {
            return Ok(false);
        };
        if record.status.is_terminal() || record.status == BlockStatus::Paused {
            return Ok(false);
        }
        self.paused_from.insert(name.clone(), record.status);
        record.status = BlockStatus::Paused;
        record.updated_at_ms = now;
        self.store.upsert(record.clone())?;
        Ok(true)
    }

    fn resume_single(&mut self, identifier: &str) -> Result<bool, EngineError> {
        let Some(name) = self.find_record_name(identifier) else {
            return Ok(false);
        };
        let now = self.clock.epoch_ms();
        let previous = self.paused_from.remove(&name).unwrap_or(BlockStatus::Waiting);
        let Some(record) = self.records.get_mut(&name) else {
            return Ok(false);
        };
        if record.status != BlockStatus::Paused {
            return Ok(false);
        }
        record.status = previous;
        record.updated_at_ms = now;
        self.store.upsert(record.clone())?;
        Ok(true)
    }

    fn cancel_single(&mut self, identifier: &str) -> Result<bool, EngineError> {
        let Some(name) = self.find_record_name(identifier) else {
            return Ok(false);
        };
        let now = self.clock.epoch_ms();
        {
            let Some(record) = self.records.get_mut(&name) else {
                return Ok(false);
            };
            if record.status.is_terminal() {
                return Ok(false);
            }
            record.status = BlockStatus::Cancelled;
            record.updated_at_ms = now;
            self.store.upsert(record.clone())?;
        }

        if let Some(worker) = self.running.remove(&name) {
            let _ = worker.cancel.send(true);
            worker.handle.abort();
            self.log
                .append(&format!("KILL SENT | {name}[{}]", worker.uid));
        }
        self.paused_from.remove(&name);
        self.pending.retain(|p| p != &name);
        self.completed.insert(name);
        Ok(true)
    }

    // ── Stop & finalize ──────────────────────────────────────────────────

    fn terminate_running(&mut self) {
        for (name, worker) in self.running.drain() {
            let _ = worker.cancel.send(true);
            worker.handle.abort();
            self.log.append(&format!(
                "SIGTERM SENT | {name}[{}] | reason=workflow stop",
                worker.uid
            ));
        }
    }

    fn finalize(self) -> Result<RunReport, EngineError> {
        let end_iso = rein_core::iso_now();
        let count = |s: BlockStatus| {
            self.records.values().filter(|r| r.status == s).count() as u32
        };
        let completed = count(BlockStatus::Done);
        let failed = count(BlockStatus::Failed);
        let skipped = count(BlockStatus::Skipped);
        let cancelled = count(BlockStatus::Cancelled);
        let total = self.records.len() as u32;

        let status = match &self.stop {
            Some(StopReason::Interrupted) => TaskStatus::Cancelled,
            Some(_) => TaskStatus::Failed,
            None if failed > 0 => TaskStatus::Failed,
            None => TaskStatus::Completed,
        };

        if self.flow.readable_outputs {
            for record in self.records.values() {
                if record.status == BlockStatus::Done {
                    summary::write_readable_output(&self.ctx.task_dir, &record.name);
                }
            }
        }

        let metadata = RunMetadata {
            run_id: self.ctx.task_id.clone(),
            run_dir: self.ctx.task_dir.display().to_string(),
            db_path: self.store.path().display().to_string(),
            max_parallel: self.max_parallel,
            start_time: (!self.resumed).then(|| self.start_iso.clone()),
            resumed_at: self.resumed.then(|| self.start_iso.clone()),
            end_time: Some(end_iso.clone()),
            total_blocks: total,
        };
        summary::write_metadata(&self.ctx.task_dir, &metadata)?;

        let stop_reason = self.stop.as_ref().map(|r| r.to_string());
        let total_usage = self
            .block_usage
            .values()
            .fold(UsageStats::default(), |mut acc, u| {
                acc.accumulate(u);
                acc
            });
        summary::write_summary(
            &self.ctx.task_dir,
            &SummaryData {
                run_id: &self.ctx.task_id,
                start_time: metadata.start_time.as_deref(),
                end_time: &end_iso,
                total,
                completed,
                failed,
                skipped,
                cancelled,
                stop_reason: stop_reason.as_deref(),
                total_usage: &total_usage,
                block_usage: &self.block_usage,
            },
        )?;

        rein_storage::write_status(&self.ctx.task_dir, status)?;
        if let Ok(mut descriptor) = rein_flow::TaskDescriptor::load(&self.ctx.task_dir) {
            descriptor.finalize(&status.to_string(), completed, failed, total);
            let _ = descriptor.save(&self.ctx.task_dir);
        }

        if total_usage.total_tokens() > 0 {
            self.log.append(&format!(
                "[COST] Total: ${:.4} | Tokens: {} (in:{} out:{}) | Provider: {} | Model: {}",
                total_usage.cost,
                total_usage.total_tokens(),
                total_usage.input_tokens,
                total_usage.output_tokens,
                total_usage.provider,
                total_usage.model
            ));
        }
        self.log.append(&format!(
            "REIN FINISHED | completed={completed} | failed={failed} | total={total}"
        ));
        self.emit_marker(&Marker::TaskDone {
            task: self.ctx.task_id.clone(),
            status: status.to_string(),
            blocks: total,
        });

        let final_result = self
            .flow
            .blocks
            .last()
            .map(|b| self.ctx.result_path(&b.name))
            .filter(|p| p.is_file());

        info!(task = %self.ctx.task_id, %status, completed, failed, "workflow finished");
        Ok(RunReport {
            status,
            total,
            completed,
            failed,
            skipped,
            cancelled,
            stop_reason,
            total_usage,
            block_usage: self.block_usage,
            final_result,
        })
    }

    fn emit_marker(&self, marker: &Marker) {
        // Stdout is the watcher contract; the event log keeps a copy.
        println!("{marker}");
        self.log.append(&marker.to_string());
    }

    /// Per-task command socket path for this orchestrator's task.
    pub fn socket_path(&self) -> PathBuf {
        command_socket_path(&self.ctx.task_id)
    }

    /// Spawn stdin + socket command readers wired to a fresh channel.
    pub fn spawn_command_readers(
        &self,
    ) -> (mpsc::Receiver<Command>, Option<channel::SocketGuard>) {
        let (tx, rx) = mpsc::channel(64);
        channel::spawn_stdin_reader(tx.clone());
        let guard = match channel::spawn_socket_listener(&self.socket_path(), tx) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!(error = %e, "command socket unavailable, stdin only");
                None
            }
        };
        (rx, guard)
    }
}

/// Blocks entered only via the state machine, never by initial
/// dependency scheduling.
///
/// A forward `next` transition (target declared after the block naming
/// it) defers the target to the state machine; a backward transition is
/// a loop re-entering an already-scheduled block. A block some other
/// block depends on always schedules normally, whatever names it.
fn next_target_leaves(flow: &FlowDocument) -> HashSet<String> {
    let index: HashMap<&str, usize> = flow
        .blocks
        .iter()
        .enumerate()
        .map(|(i, b)| (b.name.as_str(), i))
        .collect();
    let depended_on: HashSet<&str> = flow
        .blocks
        .iter()
        .flat_map(|b| b.depends_on.iter().map(String::as_str))
        .collect();

    let mut leaves = HashSet::new();
    for (i, block) in flow.blocks.iter().enumerate() {
        for target in spec_targets(block.next.as_ref()) {
            let forward = index.get(target.as_str()).map(|t| *t > i).unwrap_or(false);
            if target != block.name && forward && !depended_on.contains(target.as_str()) {
                leaves.insert(target);
            }
        }
    }
    leaves
}

fn spec_targets(next: Option<&NextSpec>) -> Vec<String> {
    match next {
        None => Vec::new(),
        Some(NextSpec::Name(name)) => vec![name.clone()],
        Some(NextSpec::Conditions(rules)) => rules
            .iter()
            .filter_map(|rule| {
                rule.goto.clone().or(match &rule.otherwise {
                    Some(rein_flow::ElseSpec::Target(target)) => Some(target.clone()),
                    _ => None,
                })
            })
            .collect(),
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
