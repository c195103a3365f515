//! Dependency preflight for the worker runtime
//!
//! Before any worker is launched the supervisor makes sure the runtime and
//! package manager can be found on the search path and that the packages the
//! workers `require` are present in the dependency cache. Missing packages
//! are installed on demand with a single, blocking install attempt.
//!
//! - [`ToolLocator`]: search-path lookup of external executables
//! - [`Preflight`]: the ordered check / install sequence

pub mod preflight;

pub use preflight::{Preflight, PreflightConfig};

use crate::config::EnvironmentMap;
use std::path::PathBuf;
use tracing::debug;

/// Absolute locations of the tools a session uses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub runtime: PathBuf,
    pub package_manager: PathBuf,
}

/// Looks executables up on the `PATH` of a composed environment
#[derive(Debug, Clone)]
pub struct ToolLocator {
    cwd: PathBuf,
}

impl ToolLocator {
    /// `cwd` anchors tool names given as relative paths
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self { cwd: cwd.into() }
    }

    /// Resolve `tool` against `env`'s `PATH`
    pub fn resolve(&self, tool: &str, env: &EnvironmentMap) -> Option<PathBuf> {
        let search_path = env.get("PATH");
        match which::which_in(tool, search_path, &self.cwd) {
            Ok(path) => {
                debug!(tool, path = %path.display(), "Resolved tool");
                Some(path)
            }
            Err(e) => {
                debug!(tool, error = %e, "Tool not found on search path");
                None
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn env_with_path(path: &Path) -> EnvironmentMap {
        [("PATH".to_string(), path.display().to_string())]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_resolves_executable_on_env_path() {
        let bin_dir = TempDir::new().unwrap();
        let tool = bin_dir.path().join("node");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let locator = ToolLocator::new(bin_dir.path());
        let resolved = locator.resolve("node", &env_with_path(bin_dir.path()));
        assert_eq!(resolved, Some(tool));
    }

    #[test]
    fn test_missing_tool_is_none() {
        let bin_dir = TempDir::new().unwrap();
        let locator = ToolLocator::new(bin_dir.path());
        assert!(
            locator
                .resolve("definitely-not-a-tool", &env_with_path(bin_dir.path()))
                .is_none()
        );
    }

    #[test]
    fn test_non_executable_file_is_not_resolved() {
        let bin_dir = TempDir::new().unwrap();
        let tool = bin_dir.path().join("npm");
        std::fs::write(&tool, "plain text").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).unwrap();

        let locator = ToolLocator::new(bin_dir.path());
        assert!(locator.resolve("npm", &env_with_path(bin_dir.path())).is_none());
    }
}
