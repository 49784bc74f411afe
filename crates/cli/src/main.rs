// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! rein - multi-agent workflow orchestrator CLI

mod run;
mod status;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rein_daemon::{server, EventBus, Watcher, WatcherConfig};
use rein_flow::AgentsDir;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "rein",
    version,
    about = "rein - declarative multi-agent workflow orchestrator"
)]
struct Cli {
    /// Path to a flow document to run directly
    flow_path: Option<PathBuf>,

    /// Run a flow by name from the agents directory
    #[arg(long, conflicts_with = "flow_path")]
    flow: Option<String>,

    /// Execute an existing task (id under the tasks root, or a directory)
    #[arg(long, value_name = "ID_OR_DIR")]
    task: Option<String>,

    /// Task input as a JSON object string
    #[arg(long, value_name = "JSON")]
    input: Option<String>,

    /// Read a free-form question from a file (populates task.input.task
    /// and task.input.topic)
    #[arg(long, value_name = "FILE")]
    question: Option<PathBuf>,

    /// Start with the workflow-wide spawn gate closed
    #[arg(long)]
    pause: bool,

    /// Join an existing task directory by run id
    #[arg(long, value_name = "RUN_ID")]
    resume: Option<String>,

    /// Root containing flows/, specialists/, teams/, tasks/
    #[arg(long, value_name = "DIR")]
    agents_dir: Option<PathBuf>,

    /// Run the task watcher daemon
    #[arg(long)]
    daemon: bool,

    /// Watcher scan interval in seconds
    #[arg(long, default_value_t = 5)]
    daemon_interval: u64,

    /// Maximum concurrent worker subprocesses in daemon mode
    #[arg(long, default_value_t = 3)]
    max_workflows: usize,

    /// Serve watcher events on this local port (daemon mode)
    #[arg(long, value_name = "PORT")]
    ws_port: Option<u16>,

    /// Print a read-only state view of one task
    #[arg(long, value_name = "TASK_ID")]
    status: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let agents = AgentsDir::resolve(cli.agents_dir.as_deref());

    if let Some(task_id) = &cli.status {
        return status::show(&agents, task_id);
    }

    if cli.daemon {
        return run_daemon(&cli, agents).await;
    }

    if let Some(task) = &cli.task {
        let code = run::execute_task(&agents, task, cli.pause).await;
        std::process::exit(code);
    }

    if let Some(run_id) = &cli.resume {
        let task_dir = agents.task_dir(run_id);
        if !task_dir.is_dir() {
            bail!("no task directory for run id '{run_id}'");
        }
        let report = run::run_task_dir(&agents, &task_dir, cli.pause).await?;
        std::process::exit(run::exit_code(&report));
    }

    if cli.flow_path.is_some() || cli.flow.is_some() {
        let flow_path = match (&cli.flow_path, &cli.flow) {
            (Some(path), _) => path.clone(),
            (None, Some(name)) => {
                let path = agents.flow_path(name);
                if !path.is_file() {
                    bail!("flow '{name}' not found at {}", path.display());
                }
                path
            }
            (None, None) => unreachable!(),
        };
        let input = run::gather_input(cli.input.as_deref(), cli.question.as_deref())?;
        let report = run::run_new_task(&agents, &flow_path, input, cli.pause).await?;
        std::process::exit(run::exit_code(&report));
    }

    bail!("nothing to do: pass a flow document, --flow, --task, --resume, --daemon, or --status");
}

async fn run_daemon(cli: &Cli, agents: AgentsDir) -> Result<()> {
    let tasks_root = agents.tasks_root();
    std::fs::create_dir_all(&tasks_root)
        .with_context(|| format!("creating tasks root {}", tasks_root.display()))?;

    let bus = EventBus::new();
    if let Some(port) = cli.ws_port {
        let listener = server::bind(port)
            .await
            .with_context(|| format!("binding event server on port {port}"))?;
        tokio::spawn(server::serve(listener, tasks_root.clone(), bus.clone()));
    }

    let config = WatcherConfig {
        agents_dir: agents.root().to_owned(),
        tasks_root,
        worker_program: std::env::current_exe().context("locating worker binary")?,
        interval: Duration::from_secs(cli.daemon_interval.max(1)),
        max_workflows: cli.max_workflows.max(1),
    };
    let watcher = Watcher::new(config, bus);

    tokio::select! {
        result = watcher.run() => result.map_err(Into::into),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("watcher shutting down");
            Ok(())
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    // stdout carries the marker lines; diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("REIN_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
