//! Error types for the supervisor
//!
//! Every fatal precondition failure maps onto a distinct process exit code so
//! scripts wrapping the supervisor can tell a broken toolchain apart from a
//! missing worker file or a failed launch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for supervisor operations
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Exit code for a clean shutdown
pub const EXIT_OK: i32 = 0;
/// Exit code for configuration and internal failures
pub const EXIT_CONFIG: i32 = 1;
/// Exit code for toolchain / dependency preflight failures
pub const EXIT_PREFLIGHT: i32 = 2;
/// Exit code for a missing worker entry point
pub const EXIT_MISSING_ENTRY_POINT: i32 = 3;
/// Exit code for a worker that could not be launched
pub const EXIT_LAUNCH: i32 = 4;

/// Fatal supervisor errors
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The worker runtime is not on the search path
    #[error("Runtime '{tool}' is not installed or not in PATH")]
    MissingRuntime { tool: String },

    /// The package manager is not on the search path
    #[error("Package manager '{tool}' is not installed or not in PATH")]
    MissingPackageManager { tool: String },

    /// An install subcommand exited unsuccessfully
    #[error("Dependency install failed: `{command}` ({reason})")]
    DependencyInstallFailed { command: String, reason: String },

    /// A worker's entry-point file does not exist
    #[error("Entry point for worker '{worker}' not found: {}", path.display())]
    MissingEntryPoint { worker: String, path: PathBuf },

    /// The OS refused to start a worker, or it died while siblings were launching
    #[error("Failed to launch worker '{worker}': {reason}")]
    WorkerLaunchFailed { worker: String, reason: String },

    /// Invalid supervisor settings or an unreadable configuration source
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Signal listener installation failed
    #[error("Failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SupervisorError {
    /// Process exit code the binary reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::MissingRuntime { .. }
            | SupervisorError::MissingPackageManager { .. }
            | SupervisorError::DependencyInstallFailed { .. } => EXIT_PREFLIGHT,
            SupervisorError::MissingEntryPoint { .. } => EXIT_MISSING_ENTRY_POINT,
            SupervisorError::WorkerLaunchFailed { .. } => EXIT_LAUNCH,
            SupervisorError::Config { .. }
            | SupervisorError::Signal(_)
            | SupervisorError::Io(_) => EXIT_CONFIG,
        }
    }

    /// Operator-facing hint on how to fix the failure, when one exists
    pub fn remediation(&self) -> Option<String> {
        match self {
            SupervisorError::MissingRuntime { tool } => Some(format!(
                "Install '{tool}' (Node.js), make sure it is on PATH and re-run the supervisor."
            )),
            SupervisorError::MissingPackageManager { tool } => Some(format!(
                "Install '{tool}' (it ships with Node.js) and make sure it is on PATH."
            )),
            SupervisorError::DependencyInstallFailed { command, .. } => Some(format!(
                "Please run `{command}` manually and re-run the supervisor."
            )),
            SupervisorError::MissingEntryPoint { path, .. } => Some(format!(
                "Place the worker script at {} or point --base-dir at the project directory.",
                path.display()
            )),
            SupervisorError::WorkerLaunchFailed { .. } => Some(
                "Check the worker's runtime output above; no worker was left running.".to_string(),
            ),
            SupervisorError::Config { .. }
            | SupervisorError::Signal(_)
            | SupervisorError::Io(_) => None,
        }
    }
}
