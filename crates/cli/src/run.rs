// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task execution modes: direct flow runs and `--task` worker mode.

use anyhow::{bail, Context, Result};
use rein_engine::{Orchestrator, OrchestratorParams, RunReport, TaskContext};
use rein_flow::{task, AgentsDir, FlowDocument, ProviderSpec, TaskDescriptor};
use rein_providers::{create_provider, Provider, ProviderConfig, ProviderError};
use rein_storage::TaskStatus;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, warn};

/// Build the task input map from `--input` and `--question`.
pub fn gather_input(input: Option<&str>, question: Option<&Path>) -> Result<Map<String, Value>> {
    let mut map = match input {
        Some(text) => match serde_json::from_str(text).context("parsing --input")? {
            Value::Object(map) => map,
            _ => bail!("--input must be a JSON object"),
        },
        None => Map::new(),
    };

    if let Some(path) = question {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading question file {}", path.display()))?;
        let question = text.trim().to_string();
        map.insert("task".to_string(), Value::String(question.clone()));
        map.insert("topic".to_string(), Value::String(question));
    }

    Ok(map)
}

/// Create a fresh task directory for the flow and run it.
pub async fn run_new_task(
    agents: &AgentsDir,
    flow_path: &Path,
    input: Map<String, Value>,
    start_paused: bool,
) -> Result<RunReport> {
    let flow = FlowDocument::load(flow_path)?;
    let descriptor = TaskDescriptor::new(rein_core::task_id_now(), flow.name.clone(), input);
    let tasks_root = agents.tasks_root();
    std::fs::create_dir_all(&tasks_root)?;
    let task_dir = task::create_task_dir(&tasks_root, &descriptor)?;
    eprintln!("task created: {}", task_dir.display());

    let report = orchestrate(agents, &task_dir, flow_path, &flow, start_paused).await?;
    print_outcome(&task_dir, &flow, &report);
    Ok(report)
}

/// Worker mode: execute an existing task by id or directory.
///
/// Returns the process exit code (0 success, 1 any failure); the last
/// stdout line before exit is the `[TASK_DONE]` marker.
pub async fn execute_task(agents: &AgentsDir, task: &str, start_paused: bool) -> i32 {
    let task_dir = resolve_task_dir(agents, task);
    let code = match run_task_dir(agents, &task_dir, start_paused).await {
        Ok(report) => exit_code(&report),
        Err(e) => {
            error!(error = %e, "task execution failed");
            let _ = rein_storage::write_status(&task_dir, TaskStatus::Failed);
            1
        }
    };
    let _ = rein_storage::write_exit_code(&task_dir, code);
    code
}

/// Run an existing task directory: load descriptor, flow, and state.
pub async fn run_task_dir(
    agents: &AgentsDir,
    task_dir: &Path,
    start_paused: bool,
) -> Result<RunReport> {
    let descriptor = TaskDescriptor::load(task_dir)?;
    let flow_path = agents.flow_path(&descriptor.flow);
    if !flow_path.is_file() {
        bail!("flow '{}' not found at {}", descriptor.flow, flow_path.display());
    }
    let flow = FlowDocument::load(&flow_path)?;
    orchestrate(agents, task_dir, &flow_path, &flow, start_paused).await
}

async fn orchestrate(
    agents: &AgentsDir,
    task_dir: &Path,
    flow_path: &Path,
    flow: &FlowDocument,
    start_paused: bool,
) -> Result<RunReport> {
    let workflow_dir = flow_path
        .parent()
        .map(Path::to_owned)
        .unwrap_or_else(|| PathBuf::from("."));
    AgentsDir::load_env_file(&workflow_dir);

    let descriptor = TaskDescriptor::load(task_dir).unwrap_or_else(|_| {
        TaskDescriptor::new(
            task_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "task".to_string()),
            flow.name.clone(),
            Map::new(),
        )
    });
    let provided = task::load_task_input(task_dir, &descriptor);
    let task_input = rein_flow::resolve_inputs(flow, provided)?;

    let provider = build_provider(flow)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let orchestrator = Orchestrator::new(OrchestratorParams {
        flow: flow.clone(),
        ctx: TaskContext {
            task_id: descriptor.id.clone(),
            task_dir: task_dir.to_owned(),
            workflow_dir,
            task_input,
        },
        agents: agents.clone(),
        provider,
        start_paused,
        max_parallel: None,
        tick: None,
        shutdown: Some(shutdown_rx),
    })?;

    let (commands, _socket_guard) = orchestrator.spawn_command_readers();
    Ok(orchestrator.run(commands).await?)
}

fn build_provider(flow: &FlowDocument) -> Result<Arc<dyn Provider>> {
    let mut config = ProviderConfig {
        model: flow.model.clone(),
        max_tokens: flow.max_tokens,
        temperature: flow.temperature,
        ..Default::default()
    };
    match &flow.provider {
        Some(ProviderSpec::Name(name)) => config.name = name.clone(),
        Some(ProviderSpec::Config {
            name,
            model,
            max_tokens,
            temperature,
            api_key,
            base_url,
        }) => {
            config.name = name.clone();
            config.model = model.clone().or(config.model);
            config.max_tokens = max_tokens.or(config.max_tokens);
            config.temperature = temperature.or(config.temperature);
            config.api_key = api_key.clone();
            config.base_url = base_url.clone();
        }
        None => {}
    }

    match create_provider(&config) {
        Ok(provider) => Ok(provider),
        Err(ProviderError::NoneDetected) => {
            // Flows built purely from logic scripts need no provider;
            // any block that does call one will fail with this error.
            warn!("no provider configured; provider-backed blocks will fail");
            Ok(Arc::new(rein_providers::provider::UnconfiguredProvider))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_outcome(task_dir: &Path, flow: &FlowDocument, report: &RunReport) {
    eprintln!(
        "run {}: {} completed, {} failed, logs in {}",
        report.status,
        report.completed,
        report.failed,
        task_dir.join("state").display()
    );

    if flow.print_final {
        if let Some(path) = &report.final_result {
            if let Ok(envelope) = rein_core::ResultEnvelope::read(path) {
                let text = match &envelope.result {
                    Value::String(text) => text.clone(),
                    other => serde_json::to_string_pretty(other).unwrap_or_default(),
                };
                eprintln!("\n============ FINAL RESULT ============");
                eprintln!("{}", truncate(&text, 5000));
                eprintln!("======================================");
            }
        }
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

pub fn exit_code(report: &RunReport) -> i32 {
    match report.status {
        TaskStatus::Completed => 0,
        _ => 1,
    }
}

fn resolve_task_dir(agents: &AgentsDir, task: &str) -> PathBuf {
    let as_path = PathBuf::from(task);
    if as_path.is_dir() && as_path.join("task.yaml").is_file() {
        as_path
    } else {
        agents.task_dir(task)
    }
}
