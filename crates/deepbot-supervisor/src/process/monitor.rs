//! Worker launch and liveness polling

use super::lifecycle::ShutdownCoordinator;
use super::session::{SessionOutcome, SessionState, ShutdownTrigger};
use super::WorkerHandle;
use crate::config::EnvironmentMap;
use crate::error::{Result, SupervisorError};
use crate::worker::{WorkerRole, WorkerSpec};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Launches the workers and watches them until the session ends
pub struct ProcessMonitor {
    session: Arc<SessionState>,
    poll_interval: Duration,
}

impl ProcessMonitor {
    pub fn new(session: Arc<SessionState>, poll_interval: Duration) -> Self {
        Self {
            session,
            poll_interval,
        }
    }

    /// Start every spec in order without waiting for readiness
    ///
    /// Before each spawn the workers already started are polled once. An exit
    /// seen there fails the launch with `WorkerLaunchFailed`; an exit that
    /// lands after the last spawn is a regular worker exit picked up by
    /// [`ProcessMonitor::monitor`]. A worker crashing right at startup can
    /// therefore end either way, depending on whether it dies before its
    /// siblings are spawned. The last spec in the list is never checked here.
    ///
    /// On any failure the workers already started are killed before the
    /// error is returned, so a session is never left half launched.
    pub async fn launch_all(
        &self,
        specs: &[WorkerSpec],
        runtime: &Path,
        env: &EnvironmentMap,
        working_dir: &Path,
    ) -> Result<Vec<WorkerHandle>> {
        let mut handles: Vec<WorkerHandle> = Vec::with_capacity(specs.len());

        for spec in specs {
            if let Some(err) = exited_during_launch(&mut handles) {
                abort_launch(&mut handles).await;
                return Err(err);
            }

            println!(
                "[deepbot-supervisor] Starting {} ({})...",
                spec.name,
                spec.entry_path.display()
            );

            match WorkerHandle::spawn(spec.clone(), runtime, env, working_dir) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(worker = %spec.role, error = %e, "Worker launch failed");
                    abort_launch(&mut handles).await;
                    return Err(e);
                }
            }
        }

        info!(workers = handles.len(), "All workers launched");
        Ok(handles)
    }

    /// Poll until a worker exits or a shutdown is requested, then drain
    pub async fn monitor(&self, coordinator: &ShutdownCoordinator) -> SessionOutcome {
        debug!(
            interval_ms = self.poll_interval.as_millis() as u64,
            "Monitoring workers"
        );

        let ended_by = loop {
            if let Some(trigger) = self.session.trigger() {
                break trigger;
            }

            if let Some(role) = self.poll_once().await {
                if self
                    .session
                    .request_shutdown(ShutdownTrigger::WorkerExited(role))
                {
                    info!(worker = %role, "Worker exited, stopping its siblings");
                }
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.session.shutdown_requested() => {}
            }
        };

        info!(trigger = %ended_by, "Shutting down session");
        let workers = coordinator.drain().await;
        SessionOutcome { ended_by, workers }
    }

    /// Check every worker once; returns the first one found exited
    async fn poll_once(&self) -> Option<WorkerRole> {
        let mut workers = self.session.workers().await;
        let mut exited = None;
        for handle in workers.iter_mut() {
            if handle.poll_exit().is_some() && exited.is_none() {
                exited = Some(handle.role());
            }
        }
        exited
    }
}

fn exited_during_launch(handles: &mut [WorkerHandle]) -> Option<SupervisorError> {
    handles.iter_mut().find_map(|handle| {
        handle
            .poll_exit()
            .map(|status| SupervisorError::WorkerLaunchFailed {
                worker: handle.role().to_string(),
                reason: format!("exited during launch ({status})"),
            })
    })
}

async fn abort_launch(handles: &mut [WorkerHandle]) {
    for handle in handles.iter_mut() {
        handle.force_kill();
        if let Err(e) = handle.wait_for_exit().await {
            error!(worker = %handle.role(), pid = handle.pid(), error = %e, "Reap failed");
        }
    }
}
