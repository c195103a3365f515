//! Configuration for the supervisor and the environment handed to workers

pub mod env_file;

pub use env_file::EnvironmentMap;

use crate::error::{Result, SupervisorError};
use crate::worker::WorkerRole;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default name of the configuration source
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Runtime settings for one supervised session
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Project directory holding the worker scripts and `package.json`
    pub base_dir: PathBuf,

    /// Configuration source; relative paths resolve against `base_dir`
    pub env_file: PathBuf,

    /// Executable that runs the worker scripts
    pub runtime: String,

    /// Package manager used to materialise missing dependencies
    pub package_manager: String,

    /// Dependency cache directory, relative to `base_dir`
    pub dependency_dir: PathBuf,

    /// Roles to launch, in launch order
    pub workers: Vec<WorkerRole>,

    /// Liveness polling cadence
    pub poll_interval: Duration,

    /// Bounded wait between graceful and forceful termination
    pub grace_period: Duration,

    /// Whether to listen for SIGINT/SIGTERM
    pub handle_signals: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            runtime: "node".to_string(),
            package_manager: "npm".to_string(),
            dependency_dir: PathBuf::from("node_modules"),
            workers: WorkerRole::ALL.to_vec(),
            poll_interval: Duration::from_millis(500),
            grace_period: Duration::from_secs(5),
            handle_signals: true,
        }
    }
}

impl SupervisorConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("DEEPBOT_BASE_DIR") {
            config.base_dir = PathBuf::from(path);
        }

        if let Ok(path) = std::env::var("DEEPBOT_ENV_FILE") {
            config.env_file = PathBuf::from(path);
        }

        if let Ok(runtime) = std::env::var("DEEPBOT_RUNTIME") {
            config.runtime = runtime;
        }

        if let Ok(tool) = std::env::var("DEEPBOT_PACKAGE_MANAGER") {
            config.package_manager = tool;
        }

        if let Ok(list) = std::env::var("DEEPBOT_WORKERS") {
            match parse_worker_list(&list) {
                Ok(workers) => config.workers = workers,
                Err(e) => warn!(error = %e, "Ignoring DEEPBOT_WORKERS"),
            }
        }

        if let Ok(ms) = std::env::var("DEEPBOT_POLL_INTERVAL_MS") {
            if let Ok(ms) = ms.parse() {
                config.poll_interval = Duration::from_millis(ms);
            }
        }

        if let Ok(ms) = std::env::var("DEEPBOT_GRACE_PERIOD_MS") {
            if let Ok(ms) = ms.parse() {
                config.grace_period = Duration::from_millis(ms);
            }
        }

        config
    }

    /// Absolute-or-base-relative path of the configuration source
    pub fn env_file_path(&self) -> PathBuf {
        if self.env_file.is_absolute() {
            self.env_file.clone()
        } else {
            self.base_dir.join(&self.env_file)
        }
    }

    /// Dependency cache location inside the project
    pub fn dependency_dir_path(&self) -> PathBuf {
        self.base_dir.join(&self.dependency_dir)
    }

    /// Union of the packages the selected roles need, without duplicates
    pub fn required_packages(&self) -> Vec<String> {
        let mut packages: Vec<String> = Vec::new();
        for role in &self.workers {
            for package in role.required_packages() {
                if !packages.iter().any(|p| p == package) {
                    packages.push(package.to_string());
                }
            }
        }
        packages
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.runtime.trim().is_empty() {
            return Err(config_error("runtime cannot be empty"));
        }

        if self.package_manager.trim().is_empty() {
            return Err(config_error("package_manager cannot be empty"));
        }

        if self.workers.is_empty() {
            return Err(config_error("at least one worker role must be selected"));
        }

        for (i, role) in self.workers.iter().enumerate() {
            if self.workers[..i].contains(role) {
                return Err(config_error(&format!("worker role '{role}' listed twice")));
            }
        }

        if self.poll_interval.is_zero() {
            return Err(config_error("poll_interval must be greater than 0"));
        }

        if self.grace_period.is_zero() {
            return Err(config_error("grace_period must be greater than 0"));
        }

        Ok(())
    }
}

/// Parse a comma separated role list such as `bot,web`
pub fn parse_worker_list(list: &str) -> Result<Vec<WorkerRole>> {
    list.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

fn config_error(message: &str) -> SupervisorError {
    SupervisorError::Config {
        message: message.to_string(),
    }
}
