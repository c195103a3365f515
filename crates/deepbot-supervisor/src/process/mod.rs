//! Worker process management
//!
//! This module owns the running worker processes: spawning them with the
//! composed environment, observing their exit, and delivering graceful or
//! forceful termination requests.
//!
//! - [`monitor`]: launch and liveness polling
//! - [`lifecycle`]: signal handling and the drain state machine
//! - [`session`]: state shared by the two

pub mod lifecycle;
pub mod monitor;
pub mod session;

pub use lifecycle::{ShutdownCoordinator, ShutdownPhase};
pub use monitor::ProcessMonitor;
pub use session::{SessionOutcome, SessionState, ShutdownSignal, ShutdownTrigger};

use crate::config::EnvironmentMap;
use crate::error::{Result, SupervisorError};
use crate::worker::{WorkerRole, WorkerSpec};
use chrono::{DateTime, Utc};
#[cfg(unix)]
use nix::sys::signal::{Signal, kill};
#[cfg(unix)]
use nix::unistd::Pid;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Runtime record of one launched worker
#[derive(Debug)]
pub struct WorkerHandle {
    spec: WorkerSpec,
    child: Child,
    pid: u32,
    started_at: DateTime<Utc>,
    exit_status: Option<ExitStatus>,
    exited_at: Option<DateTime<Utc>>,
    force_killed: bool,
}

impl WorkerHandle {
    /// Start `runtime <entry_path>` with exactly `env` as its environment
    pub fn spawn(
        spec: WorkerSpec,
        runtime: &Path,
        env: &EnvironmentMap,
        working_dir: &Path,
    ) -> Result<Self> {
        let child = Command::new(runtime)
            .arg(&spec.entry_path)
            .current_dir(working_dir)
            .env_clear()
            .envs(env.iter())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SupervisorError::WorkerLaunchFailed {
                worker: spec.role.to_string(),
                reason: format!("{}: {e}", runtime.display()),
            })?;

        let pid = child.id().ok_or_else(|| SupervisorError::WorkerLaunchFailed {
            worker: spec.role.to_string(),
            reason: "process exited before its pid could be read".to_string(),
        })?;

        info!(
            worker = %spec.role,
            pid,
            entry = %spec.entry_path.display(),
            "Worker started"
        );

        Ok(Self {
            spec,
            child,
            pid,
            started_at: Utc::now(),
            exit_status: None,
            exited_at: None,
            force_killed: false,
        })
    }

    pub fn role(&self) -> WorkerRole {
        self.spec.role
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn is_running(&self) -> bool {
        self.exit_status.is_none()
    }

    /// Non-blocking liveness check; records the exit status the first time it is seen
    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        if self.exit_status.is_some() {
            return self.exit_status;
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.record_exit(status);
                Some(status)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(worker = %self.spec.role, pid = self.pid, error = %e, "Poll failed");
                None
            }
        }
    }

    /// Ask the worker to exit cleanly (SIGTERM on unix)
    pub fn request_graceful_stop(&mut self) {
        if !self.is_running() {
            return;
        }

        info!(worker = %self.spec.role, pid = self.pid, "Requesting graceful stop");

        #[cfg(unix)]
        {
            if let Err(e) = ProcessUtils::send_sigterm(self.pid) {
                warn!(worker = %self.spec.role, pid = self.pid, error = %e, "SIGTERM failed");
            }
        }

        #[cfg(not(unix))]
        {
            // No catchable stop request exists here; the kill is the only option.
            if let Err(e) = self.child.start_kill() {
                warn!(worker = %self.spec.role, pid = self.pid, error = %e, "Stop failed");
            }
        }
    }

    /// Non-catchable kill (SIGKILL on unix)
    pub fn force_kill(&mut self) {
        if !self.is_running() {
            return;
        }

        warn!(worker = %self.spec.role, pid = self.pid, "Force killing worker");
        self.force_killed = true;
        if let Err(e) = self.child.start_kill() {
            warn!(worker = %self.spec.role, pid = self.pid, error = %e, "Failed to kill worker");
        }
    }

    /// Block until the process has exited
    pub async fn wait_for_exit(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        let status = self.child.wait().await?;
        self.record_exit(status);
        Ok(status)
    }

    /// Final summary of this worker
    pub fn report(&self) -> WorkerReport {
        let end = self.exited_at.unwrap_or_else(Utc::now);
        WorkerReport {
            role: self.spec.role,
            pid: self.pid,
            exit_code: self.exit_status.and_then(|s| s.code()),
            signal: self.exit_status.and_then(exit_signal),
            force_killed: self.force_killed,
            uptime: end - self.started_at,
        }
    }

    fn record_exit(&mut self, status: ExitStatus) {
        self.exit_status = Some(status);
        self.exited_at = Some(Utc::now());

        if status.success() {
            info!(worker = %self.spec.role, pid = self.pid, %status, "Worker exited");
        } else {
            warn!(worker = %self.spec.role, pid = self.pid, %status, "Worker exited with failure");
        }
    }
}

/// How a worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub role: WorkerRole,
    pub pid: u32,
    pub exit_code: Option<i32>,
    /// Terminating signal, when the process did not exit on its own
    pub signal: Option<i32>,
    pub force_killed: bool,
    pub uptime: chrono::Duration,
}

impl WorkerReport {
    pub fn describe(&self) -> String {
        let how = match (self.exit_code, self.signal) {
            (Some(code), _) => format!("exit code {code}"),
            (None, Some(signal)) => format!("signal {signal}"),
            (None, None) => "unknown status".to_string(),
        };
        let forced = if self.force_killed { ", force killed" } else { "" };
        format!(
            "{} (pid {}): {how}{forced} after {}s",
            self.role,
            self.pid,
            self.uptime.num_seconds()
        )
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

/// Signal delivery helpers
pub struct ProcessUtils;

impl ProcessUtils {
    /// Send `signal` to `pid`
    #[cfg(unix)]
    pub fn send_signal(pid: u32, signal: Signal) -> std::io::Result<()> {
        let raw = i32::try_from(pid).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range")
        })?;

        kill(Pid::from_raw(raw), signal)?;
        tracing::debug!(pid, signal = signal.as_str(), "Signal delivered");
        Ok(())
    }

    /// Send SIGTERM to process for graceful shutdown
    #[cfg(unix)]
    pub fn send_sigterm(pid: u32) -> std::io::Result<()> {
        Self::send_signal(pid, Signal::SIGTERM)
    }
}
