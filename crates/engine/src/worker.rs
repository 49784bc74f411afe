// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Block execution worker.
//!
//! A worker runs one block to a tagged outcome: pre hook, then the body
//! (provider call or custom logic), then post and validate hooks. It
//! communicates with the coordinator only via messages and the files it
//! writes under `<block>/outputs/`. Cooperative cancellation is checked
//! at the coarse boundaries between steps.

use crate::context::TaskContext;
use crate::error::BlockError;
use crate::prompt::{self, PromptError, PromptInputs};
use rein_core::{ResultEnvelope, UsageStats};
use rein_flow::{BlockDef, CustomSpec};
use rein_logic::{LogicContext, LogicRunner};
use rein_providers::Provider;
use rein_storage::EventLog;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Tagged outcome of one block execution.
#[derive(Debug, Clone)]
pub enum BlockOutcome {
    Done { usage: Option<UsageStats> },
    Failed { reason: String },
    Cancelled,
}

/// Messages a worker sends to the coordinator.
#[derive(Debug)]
pub enum WorkerMsg {
    Progress {
        name: String,
        progress: u8,
    },
    Finished {
        name: String,
        uid: String,
        outcome: BlockOutcome,
    },
}

/// Everything one worker needs, cloned out of the coordinator.
pub struct BlockJob {
    pub block: BlockDef,
    pub uid: String,
    pub ctx: TaskContext,
    pub team_tone: String,
    pub specialist_text: String,
    pub provider: Arc<dyn Provider>,
    pub logic: LogicRunner,
    pub log: EventLog,
    pub cancel: watch::Receiver<bool>,
}

impl BlockJob {
    fn cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    fn logic_context(&self, input_dir: &Path) -> LogicContext {
        LogicContext {
            output_file: self.ctx.result_path(&self.block.name),
            workflow_dir: self.ctx.workflow_dir.clone(),
            task_dir: self.ctx.task_dir.clone(),
            task_id: self.ctx.task_id.clone(),
            task_input: self.ctx.task_input_value(),
            block_dir: self.ctx.block_dir(&self.block.name),
            outputs_dir: self.ctx.outputs_dir(&self.block.name),
            input_dir: input_dir.to_owned(),
            depends_on: self.block.depends_on.clone(),
            block_config: serde_json::to_value(&self.block).unwrap_or_default(),
        }
    }
}

/// Run one block. Never panics into the coordinator; every failure path
/// folds into `BlockOutcome::Failed`.
pub async fn run_block(job: &BlockJob, tx: &mpsc::Sender<WorkerMsg>) -> BlockOutcome {
    match execute(job, tx).await {
        Ok(usage) => BlockOutcome::Done { usage },
        Err(Step::Cancelled) => BlockOutcome::Cancelled,
        Err(Step::Failed(e)) => BlockOutcome::Failed {
            reason: e.to_string(),
        },
    }
}

enum Step {
    Failed(BlockError),
    Cancelled,
}

impl From<BlockError> for Step {
    fn from(e: BlockError) -> Self {
        Step::Failed(e)
    }
}

impl From<rein_logic::LogicError> for Step {
    fn from(e: rein_logic::LogicError) -> Self {
        Step::Failed(BlockError::Logic(e))
    }
}

async fn execute(job: &BlockJob, tx: &mpsc::Sender<WorkerMsg>) -> Result<Option<UsageStats>, Step> {
    let name = job.block.name.clone();
    let progress = |p: u8| {
        let tx = tx.clone();
        let name = name.clone();
        async move {
            let _ = tx.send(WorkerMsg::Progress { name, progress: p }).await;
        }
    };

    job.ctx
        .ensure_block_dirs(&name)
        .map_err(BlockError::from)?;
    let input_dir = job
        .logic
        .prepare_input_dir(&name, &job.block.depends_on)
        .map_err(BlockError::from)?;
    let logic_spec = job.block.logic();
    let logic_ctx = job.logic_context(&input_dir);
    let result_path = job.ctx.result_path(&name);

    if job.cancelled() {
        return Err(Step::Cancelled);
    }

    if let Some(pre) = &logic_spec.pre {
        job.logic.run(pre, &logic_ctx).await?;
    }
    progress(25).await;

    if job.cancelled() {
        return Err(Step::Cancelled);
    }

    let mut usage = None;
    match &logic_spec.custom {
        Some(CustomSpec::Script(script)) => {
            job.log
                .append(&format!("CUSTOM SCRIPT | {name} | script={script}"));
            job.logic.run(script, &logic_ctx).await?;
            progress(75).await;
        }
        Some(CustomSpec::Sentinel(_)) => {
            // Validation only admits `true`: the pre hook owns result.json.
            job.log
                .append(&format!("CUSTOM SKIP | {name} | pre hook produced the result"));
            progress(75).await;
        }
        None => {
            let assembled = prompt::assemble(
                &job.block.prompt,
                &PromptInputs {
                    team_tone: &job.team_tone,
                    specialist_text: &job.specialist_text,
                    task_input: &job.ctx.task_input,
                    task_dir: &job.ctx.task_dir,
                    workflow_dir: &job.ctx.workflow_dir,
                },
                &job.log,
            )
            .map_err(|PromptError::UnresolvedPlaceholder { fields }| {
                BlockError::UnresolvedPlaceholder { fields }
            })?;
            job.log
                .append(&format!("ASSEMBLED PROMPT | {name} | len={}", assembled.len()));
            progress(50).await;

            if job.cancelled() {
                return Err(Step::Cancelled);
            }

            let reply = job.provider.call(&assembled, &name).await.map_err(BlockError::from)?;
            progress(75).await;

            let mut envelope = ResultEnvelope::new(
                name.clone(),
                serde_json::Value::String(reply.text),
                rein_core::iso_now(),
            );
            envelope.usage = Some(reply.usage.clone());
            envelope.write(&result_path).map_err(BlockError::from)?;
            usage = Some(reply.usage);
        }
    }

    if job.cancelled() {
        return Err(Step::Cancelled);
    }

    if let Some(post) = &logic_spec.post {
        job.logic.run(post, &logic_ctx).await?;
    }
    if let Some(validate) = &logic_spec.validate {
        job.logic.run(validate, &logic_ctx).await?;
    }

    // A block is done iff its result file exists and is non-empty.
    let non_empty = std::fs::metadata(&result_path)
        .map(|m| m.len() > 0)
        .unwrap_or(false);
    if !non_empty {
        return Err(Step::Failed(BlockError::ResultMissing(
            result_path.display().to_string(),
        )));
    }

    progress(100).await;
    Ok(usage)
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
