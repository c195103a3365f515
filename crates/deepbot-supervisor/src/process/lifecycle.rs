//! Coordinated shutdown of the supervised workers
//!
//! A session moves through `Running → Draining → ForceKilling → Drained`
//! exactly once. Signal listeners never touch the workers themselves; they
//! only flip the session's shutdown flag, and the monitor task runs the
//! drain.

use super::WorkerReport;
use super::session::{SessionState, ShutdownSignal, ShutdownTrigger};
use crate::error::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// How often exits are re-checked inside the grace window
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shutdown state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    /// Workers active, no shutdown requested
    Running,
    /// Graceful termination requested, waiting out the grace period
    Draining,
    /// Grace period expired; stragglers are being killed
    ForceKilling,
    /// Every worker has an exit status
    Drained,
}

/// Owns the signal listeners and the single drain sequence of a session
pub struct ShutdownCoordinator {
    session: Arc<SessionState>,
    grace_period: Duration,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl ShutdownCoordinator {
    pub fn new(session: Arc<SessionState>, grace_period: Duration) -> Self {
        Self {
            session,
            grace_period,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Ask for a shutdown; repeated requests are no-ops
    pub fn request_shutdown(&self, trigger: ShutdownTrigger) -> bool {
        let accepted = self.session.request_shutdown(trigger);
        if accepted {
            warn!(%trigger, "Shutdown requested");
        }
        accepted
    }

    /// Listen for SIGINT and SIGTERM for the rest of the session
    pub fn install_signal_handlers(&self) -> Result<()> {
        #[cfg(unix)]
        {
            use crate::error::SupervisorError;
            use tokio::signal::unix::{SignalKind, signal};

            let sigint = signal(SignalKind::interrupt()).map_err(SupervisorError::Signal)?;
            let sigterm = signal(SignalKind::terminate()).map_err(SupervisorError::Signal)?;

            let mut listeners = self.lock_listeners();
            listeners.push(spawn_listener(
                self.session.clone(),
                sigint,
                ShutdownSignal::Interrupt,
            ));
            listeners.push(spawn_listener(
                self.session.clone(),
                sigterm,
                ShutdownSignal::Terminate,
            ));

            info!("Signal handlers for SIGTERM and SIGINT installed");
        }

        #[cfg(not(unix))]
        {
            let session = self.session.clone();
            let handle = tokio::spawn(async move {
                while tokio::signal::ctrl_c().await.is_ok() {
                    on_signal(&session, ShutdownSignal::Interrupt);
                }
                error!("Ctrl-C listener failed");
            });
            self.lock_listeners().push(handle);

            info!("Ctrl-C handler installed");
        }

        Ok(())
    }

    /// Stop listening for signals
    pub fn remove_signal_handlers(&self) {
        for handle in self.lock_listeners().drain(..) {
            handle.abort();
        }
    }

    /// Run the drain sequence and report how each worker ended
    ///
    /// Graceful stop to every live worker, a bounded wait, a forceful kill of
    /// whatever is left, then an unbounded wait for the final exit statuses.
    /// A second call waits for the first to finish and just reports.
    pub async fn drain(&self) -> Vec<WorkerReport> {
        let mut workers = self.session.workers().await;

        if self.session.phase().await == ShutdownPhase::Drained {
            return workers.iter().map(|w| w.report()).collect();
        }

        self.session.set_phase(ShutdownPhase::Draining).await;
        for worker in workers.iter_mut() {
            if worker.poll_exit().is_none() {
                worker.request_graceful_stop();
            }
        }

        let deadline = Instant::now() + self.grace_period;
        loop {
            let mut live = 0;
            for worker in workers.iter_mut() {
                if worker.poll_exit().is_none() {
                    live += 1;
                }
            }
            if live == 0 {
                break;
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            debug!(live, "Waiting for workers to exit");
            tokio::time::sleep(DRAIN_POLL_INTERVAL.min(deadline - now)).await;
        }

        if workers.iter().any(|w| w.is_running()) {
            self.session.set_phase(ShutdownPhase::ForceKilling).await;
            for worker in workers.iter_mut().filter(|w| w.is_running()) {
                warn!(
                    worker = %worker.role(),
                    pid = worker.pid(),
                    timeout_ms = self.grace_period.as_millis() as u64,
                    "Worker shutdown timed out"
                );
                worker.force_kill();
            }
        }

        for worker in workers.iter_mut() {
            if let Err(e) = worker.wait_for_exit().await {
                error!(
                    worker = %worker.role(),
                    pid = worker.pid(),
                    error = %e,
                    "Failed to wait for worker exit"
                );
            }
        }

        self.session.set_phase(ShutdownPhase::Drained).await;
        info!("All workers stopped");

        workers.iter().map(|w| w.report()).collect()
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ShutdownCoordinator {
    fn drop(&mut self) {
        self.remove_signal_handlers();
    }
}

#[cfg(unix)]
fn spawn_listener(
    session: Arc<SessionState>,
    mut stream: tokio::signal::unix::Signal,
    kind: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while stream.recv().await.is_some() {
            on_signal(&session, kind);
        }
        error!(signal = %kind, "Signal stream was closed");
    })
}

fn on_signal(session: &SessionState, kind: ShutdownSignal) {
    if session.request_shutdown(ShutdownTrigger::Signal(kind)) {
        warn!(signal = %kind, "Received termination signal, stopping workers");
        println!("[deepbot-supervisor] Received {kind}, stopping workers...");
    }
}
