//! Supervisor for the DeepBot workers
//!
//! Runs the Minecraft bot (`bot.js`) and its web console (`web.js`) side by
//! side under one Node.js toolchain. Both workers get the same environment:
//! the supervisor's own environment overlaid with the project's `.env`. When
//! one worker exits, or the supervisor receives SIGINT/SIGTERM, the remaining
//! workers are stopped gracefully, killed after a grace period if needed, and
//! the supervisor exits only once every worker is gone.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use deepbot_supervisor::{Supervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> deepbot_supervisor::Result<()> {
//!     let supervisor = Supervisor::new(SupervisorConfig::from_env())?;
//!     let outcome = supervisor.run().await?;
//!     for worker in &outcome.workers {
//!         println!("{}", worker.describe());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dependency;
pub mod error;
pub mod process;
pub mod worker;

pub use config::{EnvironmentMap, SupervisorConfig};
pub use dependency::{Preflight, PreflightConfig, Toolchain};
pub use error::{Result, SupervisorError};
pub use process::{
    ProcessMonitor, SessionOutcome, SessionState, ShutdownCoordinator, ShutdownPhase,
    ShutdownSignal, ShutdownTrigger, WorkerHandle, WorkerReport,
};
pub use worker::{WorkerRole, WorkerSpec, resolve_workers};

use std::sync::Arc;
use tracing::{info, instrument};

/// One supervised session: preflight, launch, monitor, drain
pub struct Supervisor {
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Compose the worker environment from the process environment and the
    /// configuration source, then run the session
    pub async fn run(&self) -> Result<SessionOutcome> {
        let overlay = EnvironmentMap::load(&self.config.env_file_path())?;
        let env = EnvironmentMap::compose(&EnvironmentMap::from_ambient(), &overlay);
        self.run_with_env(env).await
    }

    /// Run the session with an already composed environment
    #[instrument(skip_all, fields(base_dir = %self.config.base_dir.display()))]
    pub async fn run_with_env(&self, env: EnvironmentMap) -> Result<SessionOutcome> {
        let toolchain = Preflight::new(PreflightConfig::from(&self.config))
            .ensure_dependencies(&env)
            .await?;

        let specs = resolve_workers(&self.config.base_dir, &self.config.workers)?;

        let session = Arc::new(SessionState::new());
        let coordinator = ShutdownCoordinator::new(session.clone(), self.config.grace_period);
        if self.config.handle_signals {
            coordinator.install_signal_handlers()?;
        }

        let monitor = ProcessMonitor::new(session.clone(), self.config.poll_interval);
        let handles = monitor
            .launch_all(&specs, &toolchain.runtime, &env, &self.config.base_dir)
            .await?;
        session.register(handles).await;

        let outcome = monitor.monitor(&coordinator).await;
        coordinator.remove_signal_handlers();

        info!(trigger = %outcome.ended_by, "Session finished");
        Ok(outcome)
    }
}
