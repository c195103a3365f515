//! Tests for the dependency preflight sequence
//!
//! The runtime and package manager are stand-in shell scripts placed on a
//! private search path; the fake package manager records every invocation.
#![cfg(unix)]

use deepbot_supervisor::error::EXIT_PREFLIGHT;
use deepbot_supervisor::{EnvironmentMap, Preflight, PreflightConfig, SupervisorError};
use serial_test::serial;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const RUNTIME: &str = "deepbot-test-node";
const PACKAGE_MANAGER: &str = "deepbot-test-npm";

struct Fixture {
    _root: TempDir,
    bin_dir: PathBuf,
    project_dir: PathBuf,
    log_file: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let bin_dir = root.path().join("bin");
        let project_dir = root.path().join("project");
        std::fs::create_dir_all(&bin_dir).unwrap();
        std::fs::create_dir_all(&project_dir).unwrap();
        let log_file = root.path().join("install.log");

        Self {
            _root: root,
            bin_dir,
            project_dir,
            log_file,
        }
    }

    fn install_tool(&self, name: &str, script: &str) {
        let path = self.bin_dir.join(name);
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn install_runtime(&self) {
        self.install_tool(RUNTIME, "#!/bin/sh\nexit 0\n");
    }

    /// Package manager that creates the directories it is asked to install
    fn install_working_package_manager(&self) {
        self.install_tool(
            PACKAGE_MANAGER,
            concat!(
                "#!/bin/sh\n",
                "echo \"$@\" >> \"$INSTALL_LOG\"\n",
                "mkdir -p node_modules\n",
                "shift\n",
                "for p in \"$@\"; do mkdir -p \"node_modules/$p\"; done\n",
            ),
        );
    }

    fn install_failing_package_manager(&self) {
        self.install_tool(
            PACKAGE_MANAGER,
            "#!/bin/sh\necho \"$@\" >> \"$INSTALL_LOG\"\nexit 1\n",
        );
    }

    fn env(&self) -> EnvironmentMap {
        [
            (
                "PATH".to_string(),
                format!("{}:/usr/bin:/bin", self.bin_dir.display()),
            ),
            (
                "INSTALL_LOG".to_string(),
                self.log_file.display().to_string(),
            ),
        ]
        .into_iter()
        .collect()
    }

    fn preflight(&self, packages: &[&str]) -> Preflight {
        Preflight::new(PreflightConfig {
            runtime: RUNTIME.to_string(),
            package_manager: PACKAGE_MANAGER.to_string(),
            project_dir: self.project_dir.clone(),
            dependency_dir: self.project_dir.join("node_modules"),
            required_packages: packages.iter().map(|p| p.to_string()).collect(),
        })
    }

    fn install_log(&self) -> Vec<String> {
        match std::fs::read_to_string(&self.log_file) {
            Ok(log) => log.lines().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn create_package(&self, name: &str) {
        std::fs::create_dir_all(self.project_dir.join("node_modules").join(name)).unwrap();
    }
}

fn assert_dir(path: &Path) {
    assert!(path.is_dir(), "expected directory {}", path.display());
}

#[tokio::test]
#[serial]
async fn test_everything_present_runs_no_install() {
    let fixture = Fixture::new();
    fixture.install_runtime();
    fixture.install_working_package_manager();
    fixture.create_package("mineflayer");

    let toolchain = fixture
        .preflight(&["mineflayer"])
        .ensure_dependencies(&fixture.env())
        .await
        .unwrap();

    assert_eq!(toolchain.runtime, fixture.bin_dir.join(RUNTIME));
    assert_eq!(toolchain.package_manager, fixture.bin_dir.join(PACKAGE_MANAGER));
    assert!(fixture.install_log().is_empty());
}

#[tokio::test]
#[serial]
async fn test_missing_cache_installs_all_then_named_packages() {
    let fixture = Fixture::new();
    fixture.install_runtime();
    fixture.install_working_package_manager();

    fixture
        .preflight(&["mineflayer", "express"])
        .ensure_dependencies(&fixture.env())
        .await
        .unwrap();

    assert_eq!(
        fixture.install_log(),
        vec!["install".to_string(), "install mineflayer express".to_string()]
    );
    assert_dir(&fixture.project_dir.join("node_modules/mineflayer"));
    assert_dir(&fixture.project_dir.join("node_modules/express"));
}

#[tokio::test]
#[serial]
async fn test_only_missing_packages_are_installed() {
    let fixture = Fixture::new();
    fixture.install_runtime();
    fixture.install_working_package_manager();
    fixture.create_package("express");

    fixture
        .preflight(&["mineflayer", "express"])
        .ensure_dependencies(&fixture.env())
        .await
        .unwrap();

    assert_eq!(fixture.install_log(), vec!["install mineflayer".to_string()]);
}

#[tokio::test]
#[serial]
async fn test_install_failure_is_fatal_without_retry() {
    let fixture = Fixture::new();
    fixture.install_runtime();
    fixture.install_failing_package_manager();

    let err = fixture
        .preflight(&["mineflayer"])
        .ensure_dependencies(&fixture.env())
        .await
        .unwrap_err();

    match &err {
        SupervisorError::DependencyInstallFailed { command, .. } => {
            assert_eq!(command, &format!("{PACKAGE_MANAGER} install"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), EXIT_PREFLIGHT);
    assert!(err.remediation().unwrap().contains("manually"));
    assert_eq!(fixture.install_log().len(), 1);
}

#[tokio::test]
#[serial]
async fn test_missing_runtime_stops_before_package_manager() {
    let fixture = Fixture::new();
    fixture.install_working_package_manager();

    let err = fixture
        .preflight(&["mineflayer"])
        .ensure_dependencies(&fixture.env())
        .await
        .unwrap_err();

    assert!(matches!(err, SupervisorError::MissingRuntime { ref tool } if tool == RUNTIME));
    assert!(err.to_string().contains(RUNTIME));
    assert!(fixture.install_log().is_empty());
}

#[tokio::test]
#[serial]
async fn test_missing_package_manager() {
    let fixture = Fixture::new();
    fixture.install_runtime();

    let err = fixture
        .preflight(&[])
        .ensure_dependencies(&fixture.env())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SupervisorError::MissingPackageManager { ref tool } if tool == PACKAGE_MANAGER
    ));
    assert_eq!(err.exit_code(), EXIT_PREFLIGHT);
}
