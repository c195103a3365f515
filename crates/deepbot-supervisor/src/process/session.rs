//! State shared between the process monitor and the shutdown coordinator

use super::lifecycle::ShutdownPhase;
use super::{WorkerHandle, WorkerReport};
use crate::worker::WorkerRole;
use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard, Notify, RwLock};
use tracing::debug;

/// External termination requests the supervisor honours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// What started the shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Signal(ShutdownSignal),
    /// A worker exited on its own, clean or crashed
    WorkerExited(WorkerRole),
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Signal(signal) => write!(f, "received {signal}"),
            ShutdownTrigger::WorkerExited(role) => write!(f, "worker '{role}' exited"),
        }
    }
}

/// Worker handles plus the once-only shutdown flag for a single session
#[derive(Debug)]
pub struct SessionState {
    workers: Mutex<Vec<WorkerHandle>>,
    shutdown_requested: AtomicBool,
    trigger: OnceLock<ShutdownTrigger>,
    phase: RwLock<ShutdownPhase>,
    wakeup: Notify,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            workers: Mutex::new(Vec::new()),
            shutdown_requested: AtomicBool::new(false),
            trigger: OnceLock::new(),
            phase: RwLock::new(ShutdownPhase::Running),
            wakeup: Notify::new(),
        }
    }

    /// Hand launched workers over to the session
    pub async fn register(&self, handles: Vec<WorkerHandle>) {
        let mut workers = self.workers.lock().await;
        workers.extend(handles);
    }

    pub(crate) async fn workers(&self) -> MutexGuard<'_, Vec<WorkerHandle>> {
        self.workers.lock().await
    }

    pub async fn worker_count(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Flip the shutdown flag; only the first caller gets `true`
    pub fn request_shutdown(&self, trigger: ShutdownTrigger) -> bool {
        if self.trigger.set(trigger).is_err() {
            debug!(%trigger, "Shutdown already in progress, ignoring request");
            return false;
        }

        self.shutdown_requested.store(true, Ordering::Release);
        self.wakeup.notify_one();
        true
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Trigger of the shutdown sequence, once one was requested
    pub fn trigger(&self) -> Option<ShutdownTrigger> {
        self.trigger.get().copied()
    }

    /// Resolves once a shutdown has been requested
    pub async fn shutdown_requested(&self) {
        while !self.is_shutdown_requested() {
            self.wakeup.notified().await;
        }
    }

    pub async fn phase(&self) -> ShutdownPhase {
        *self.phase.read().await
    }

    pub(crate) async fn set_phase(&self, phase: ShutdownPhase) {
        let mut current = self.phase.write().await;
        debug!(from = ?*current, to = ?phase, "Shutdown phase transition");
        *current = phase;
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate result of a finished session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub ended_by: ShutdownTrigger,
    pub workers: Vec<WorkerReport>,
}

impl SessionOutcome {
    pub fn signal_initiated(&self) -> bool {
        matches!(self.ended_by, ShutdownTrigger::Signal(_))
    }

    pub fn report_for(&self, role: WorkerRole) -> Option<&WorkerReport> {
        self.workers.iter().find(|r| r.role == role)
    }
}
