//! Static description of the supervised worker roles

use crate::error::{Result, SupervisorError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Worker roles the supervisor knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WorkerRole {
    /// Minecraft chat bot
    Bot,
    /// Configuration web console
    Web,
}

impl WorkerRole {
    /// Both roles, in launch order
    pub const ALL: [WorkerRole; 2] = [WorkerRole::Bot, WorkerRole::Web];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::Bot => "bot",
            WorkerRole::Web => "web",
        }
    }

    /// Human readable name used in banners
    pub fn display_name(&self) -> &'static str {
        match self {
            WorkerRole::Bot => "Minecraft bot",
            WorkerRole::Web => "Web console",
        }
    }

    /// Entry-point script, relative to the project directory
    pub fn entry_file(&self) -> &'static str {
        match self {
            WorkerRole::Bot => "bot.js",
            WorkerRole::Web => "web.js",
        }
    }

    /// Packages the worker expects to find in the dependency cache
    pub fn required_packages(&self) -> &'static [&'static str] {
        match self {
            WorkerRole::Bot => &["mineflayer", "node-fetch"],
            WorkerRole::Web => &["express", "body-parser"],
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerRole {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "bot" => Ok(WorkerRole::Bot),
            "web" => Ok(WorkerRole::Web),
            other => Err(SupervisorError::Config {
                message: format!("Unknown worker role '{other}' (expected 'bot' or 'web')"),
            }),
        }
    }
}

/// Resolved, immutable description of one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub role: WorkerRole,
    pub name: String,
    pub entry_path: PathBuf,
    /// File that must exist before the worker may be launched
    pub required_check: PathBuf,
}

impl WorkerSpec {
    pub fn new(role: WorkerRole, base_dir: &Path) -> Self {
        let entry_path = base_dir.join(role.entry_file());
        Self {
            role,
            name: role.display_name().to_string(),
            required_check: entry_path.clone(),
            entry_path,
        }
    }
}

/// Build the specs for `roles`, failing before any launch if a file is missing
pub fn resolve_workers(base_dir: &Path, roles: &[WorkerRole]) -> Result<Vec<WorkerSpec>> {
    let specs: Vec<WorkerSpec> = roles
        .iter()
        .map(|role| WorkerSpec::new(*role, base_dir))
        .collect();

    for spec in &specs {
        if !spec.required_check.is_file() {
            return Err(SupervisorError::MissingEntryPoint {
                worker: spec.role.to_string(),
                path: spec.required_check.clone(),
            });
        }
        debug!(worker = %spec.role, path = %spec.entry_path.display(), "Entry point found");
    }

    Ok(specs)
}
