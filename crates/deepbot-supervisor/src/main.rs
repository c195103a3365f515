use anyhow::{Context, Result};
use clap::Parser;
use deepbot_supervisor::{Supervisor, SupervisorConfig, SupervisorError, WorkerRole};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Runs the DeepBot Minecraft bot and its web console together.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory containing bot.js, web.js and package.json.
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// Configuration source merged into the workers' environment.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Run a single worker instead of both.
    #[arg(long, value_parser = parse_role)]
    only: Option<WorkerRole>,

    /// Time workers get to exit after SIGTERM before they are killed.
    #[arg(long)]
    grace_period_ms: Option<u64>,

    /// How often worker liveness is checked.
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

impl Cli {
    fn into_config(self) -> Result<SupervisorConfig> {
        let mut config = SupervisorConfig::from_env();

        if let Some(dir) = self.base_dir {
            config.base_dir = dir;
        }
        config.base_dir = std::fs::canonicalize(&config.base_dir).with_context(|| {
            format!("Project directory not found: {}", config.base_dir.display())
        })?;

        if let Some(path) = self.env_file {
            config.env_file = path;
        }
        if let Some(role) = self.only {
            config.workers = vec![role];
        }
        if let Some(ms) = self.grace_period_ms {
            config.grace_period = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_role(value: &str) -> std::result::Result<WorkerRole, String> {
    value.parse().map_err(|e: SupervisorError| e.to_string())
}

/// Log to stderr so worker output on stdout stays readable.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,deepbot_supervisor=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("Failed to set global default tracing subscriber")
}

fn report_failure(err: &SupervisorError) -> ExitCode {
    error!(error = %err, exit_code = err.exit_code(), "Supervisor failed");
    eprintln!("[deepbot-supervisor] Error: {err}");
    if let Some(hint) = err.remediation() {
        eprintln!("[deepbot-supervisor] {hint}");
    }
    ExitCode::from(err.exit_code() as u8)
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("[deepbot-supervisor] {e:#}");
    }

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[deepbot-supervisor] Error: {e:#}");
            return ExitCode::from(deepbot_supervisor::error::EXIT_CONFIG as u8);
        }
    };

    println!("--- DeepBot Supervisor ---");
    let supervisor = match Supervisor::new(config) {
        Ok(supervisor) => supervisor,
        Err(e) => return report_failure(&e),
    };

    match supervisor.run().await {
        Ok(outcome) => {
            println!("[deepbot-supervisor] Session ended: {}", outcome.ended_by);
            for worker in &outcome.workers {
                println!("[deepbot-supervisor]   {}", worker.describe());
            }
            info!(
                signal_initiated = outcome.signal_initiated(),
                "Supervisor exiting"
            );
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}
