//! Ordered toolchain and package checks run before any worker starts

use super::{ToolLocator, Toolchain};
use crate::config::{EnvironmentMap, SupervisorConfig};
use crate::error::{Result, SupervisorError};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

/// Inputs of the preflight sequence
#[derive(Debug, Clone)]
pub struct PreflightConfig {
    pub runtime: String,
    pub package_manager: String,
    /// Directory install commands run in
    pub project_dir: PathBuf,
    /// Dependency cache, e.g. `<project>/node_modules`
    pub dependency_dir: PathBuf,
    /// Packages that must exist as `<dependency_dir>/<name>`
    pub required_packages: Vec<String>,
}

impl From<&SupervisorConfig> for PreflightConfig {
    fn from(config: &SupervisorConfig) -> Self {
        Self {
            runtime: config.runtime.clone(),
            package_manager: config.package_manager.clone(),
            project_dir: config.base_dir.clone(),
            dependency_dir: config.dependency_dir_path(),
            required_packages: config.required_packages(),
        }
    }
}

/// Verifies and repairs the worker runtime environment
pub struct Preflight {
    config: PreflightConfig,
    locator: ToolLocator,
}

impl Preflight {
    pub fn new(config: PreflightConfig) -> Self {
        let locator = ToolLocator::new(config.project_dir.clone());
        Self { config, locator }
    }

    /// Run every check in order; the first failure aborts the session
    pub async fn ensure_dependencies(&self, env: &EnvironmentMap) -> Result<Toolchain> {
        let runtime = self
            .locator
            .resolve(&self.config.runtime, env)
            .ok_or_else(|| SupervisorError::MissingRuntime {
                tool: self.config.runtime.clone(),
            })?;

        let package_manager = self
            .locator
            .resolve(&self.config.package_manager, env)
            .ok_or_else(|| SupervisorError::MissingPackageManager {
                tool: self.config.package_manager.clone(),
            })?;

        if !self.config.dependency_dir.is_dir() {
            info!(
                path = %self.config.dependency_dir.display(),
                "Dependency cache missing, installing all dependencies"
            );
            println!(
                "[deepbot-supervisor] Installing dependencies ({} install)...",
                self.config.package_manager
            );
            self.run_install(&package_manager, &[], env).await?;
        }

        let missing = self.missing_packages();
        if !missing.is_empty() {
            info!(packages = ?missing, "Installing missing packages");
            println!(
                "[deepbot-supervisor] Installing missing packages: {}",
                missing.join(" ")
            );
            self.run_install(&package_manager, &missing, env).await?;
        }

        info!(
            runtime = %runtime.display(),
            package_manager = %package_manager.display(),
            "Preflight checks passed"
        );

        Ok(Toolchain {
            runtime,
            package_manager,
        })
    }

    /// Required packages with no directory in the dependency cache
    pub fn missing_packages(&self) -> Vec<String> {
        self.config
            .required_packages
            .iter()
            .filter(|name| !self.config.dependency_dir.join(name.as_str()).is_dir())
            .cloned()
            .collect()
    }

    /// One blocking `<pm> install [packages...]` attempt
    async fn run_install(
        &self,
        package_manager: &Path,
        packages: &[String],
        env: &EnvironmentMap,
    ) -> Result<()> {
        let command_line = install_command_line(&self.config.package_manager, packages);

        let status = Command::new(package_manager)
            .arg("install")
            .args(packages)
            .current_dir(&self.config.project_dir)
            .env_clear()
            .envs(env.iter())
            .status()
            .await
            .map_err(|e| SupervisorError::DependencyInstallFailed {
                command: command_line.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            warn!(command = %command_line, %status, "Install command failed");
            return Err(SupervisorError::DependencyInstallFailed {
                command: command_line,
                reason: status.to_string(),
            });
        }

        info!(command = %command_line, "Install command completed");
        Ok(())
    }
}

fn install_command_line(package_manager: &str, packages: &[String]) -> String {
    if packages.is_empty() {
        format!("{package_manager} install")
    } else {
        format!("{package_manager} install {}", packages.join(" "))
    }
}
