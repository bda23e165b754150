//! # Haymaker: synthetic knowledge-worker activity
//!
//! Provisions a department of simulated workers and keeps them busy sending
//! email, posting messages, writing documents and booking meetings until the
//! configured duration runs out or Ctrl-C is pressed.
//!
//! Usage:
//!   haymaker                                        # 25 operations workers, runs until Ctrl-C
//!   haymaker --workers 5 --department engineering --duration-hours 1
//!   haymaker --ai --directive "Discuss the Q3 migration"
//!   haymaker --simulated --duration-hours 8         # a working day in seconds
//!   haymaker --list                                 # deployments known to the state store
//!   haymaker --resume m365-1a2b3c4d                 # pick up a persisted deployment

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use haymaker_content::OpenAiCompatibleBackend;
use haymaker_core::traits::ContentBackend;
use haymaker_core::{HaymakerConfig, pattern_for};
use haymaker_scheduler::SimulatedClock;
use haymaker_workload::{
    DeploymentServices, InMemoryDirectory, JsonStateStore, LoggingTransport, Workload,
};

#[derive(Parser)]
#[command(
    name = "haymaker",
    version,
    about = "🌾 Haymaker: synthetic knowledge-worker activity engine"
)]
struct Cli {
    /// Config file (default: ~/.haymaker/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Number of workers to provision (1-300)
    #[arg(short, long)]
    workers: Option<u32>,

    /// Department: operations, engineering, sales, hr, finance, executive
    #[arg(short, long)]
    department: Option<String>,

    /// Stop after this many hours (runs until Ctrl-C when omitted)
    #[arg(long)]
    duration_hours: Option<f64>,

    /// Generate email text with the configured content backend
    #[arg(long)]
    ai: bool,

    /// Steer generated email towards a topic
    #[arg(long)]
    directive: Option<String>,

    /// Run on a simulated clock starting at the department's first work hour
    #[arg(long)]
    simulated: bool,

    /// List persisted deployments and exit
    #[arg(long)]
    list: bool,

    /// Resume a persisted deployment instead of creating one
    #[arg(long)]
    resume: Option<String>,

    /// Leave workers provisioned on exit
    #[arg(long)]
    keep: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn load_config(cli: &Cli) -> Result<HaymakerConfig> {
    let mut config = match &cli.config {
        Some(path) => HaymakerConfig::load_from(&expand_path(path))
            .with_context(|| format!("loading {path}"))?,
        None => HaymakerConfig::load()?,
    };

    let deployment = &mut config.deployment;
    if let Some(workers) = cli.workers {
        deployment.workers = workers;
    }
    if let Some(department) = &cli.department {
        deployment.department = department.clone();
    }
    if cli.duration_hours.is_some() {
        deployment.duration_hours = cli.duration_hours;
    }
    if cli.ai {
        deployment.enable_ai_generation = true;
    }
    if cli.directive.is_some() {
        deployment.email_directive = cli.directive.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = [
        "haymaker",
        "haymaker_core",
        "haymaker_content",
        "haymaker_scheduler",
        "haymaker_workload",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = load_config(&cli)?;
    let department = config.validate()?;

    // Expand paths
    let state_dir = expand_path(&config.storage.state_dir);
    let log_dir = expand_path(&config.storage.log_dir);
    std::fs::create_dir_all(&state_dir)?;
    std::fs::create_dir_all(&log_dir)?;

    let mut services = DeploymentServices::new(
        Arc::new(InMemoryDirectory::new()),
        Arc::new(LoggingTransport::new()),
        Arc::new(JsonStateStore::new(&state_dir)),
    )
    .with_scheduler_config(config.scheduler.clone())
    .with_content_config(config.content.clone())
    .with_log_dir(log_dir);

    if config.deployment.enable_ai_generation {
        let backend: Arc<dyn ContentBackend> =
            Arc::new(OpenAiCompatibleBackend::from_config(&config.content)?);
        services = services.with_backend(backend);
    }
    if cli.simulated {
        let start = pattern_for(department).work_start_hour;
        tracing::info!("🕰️ Simulated clock starting at {start:02}:00 UTC");
        services = services.with_clock(Arc::new(SimulatedClock::at_hour(start)));
    }

    let workload = Workload::new(services);

    if cli.list {
        for state in workload.list_deployments().await? {
            println!(
                "{}  {:<20} {:>3}/{:<3} workers  {:>6} activities  {}",
                state.deployment_id,
                state.phase.to_string(),
                state.workers_created,
                state.workers_requested,
                state.counters.total(),
                state.config.department
            );
        }
        return Ok(());
    }

    println!("🌾 Haymaker v{}", env!("CARGO_PKG_VERSION"));
    let id = match &cli.resume {
        Some(id) => {
            workload.resume(id).await?;
            id.clone()
        }
        None => workload.deploy(config.deployment.clone()).await?,
    };
    println!("   Deployment: {id}");
    println!(
        "   Workers:    {} ({department})",
        config.deployment.workers
    );

    let mut logs = workload.get_logs(&id, true).await?;
    let printer = tokio::spawn(async move {
        while let Some(line) = logs.next().await {
            println!("{line}");
        }
    });

    tokio::select! {
        phase = workload.wait_until_finished(&id) => {
            tracing::info!("🏁 Deployment {id} finished: {}", phase?);
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("🛑 Ctrl-C received, stopping {id}");
            workload.stop(&id).await?;
        }
    }

    if !cli.keep {
        let report = workload.cleanup(&id).await?;
        println!("🧹 Cleanup: {}", report.details.join("; "));
    }
    printer.abort();

    let state = workload.get_status(&id).await?;
    let c = &state.counters;
    println!(
        "📊 {}: {} emails, {} messages, {} documents, {} meetings ({} failed)",
        state.phase, c.emails, c.messages, c.documents, c.meetings, c.failed
    );
    Ok(())
}
