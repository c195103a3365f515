//! Tests for supervisor configuration loading

use deepbot_supervisor::{EnvironmentMap, SupervisorConfig, WorkerRole};
use serial_test::serial;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const VARS: [&str; 7] = [
    "DEEPBOT_BASE_DIR",
    "DEEPBOT_ENV_FILE",
    "DEEPBOT_RUNTIME",
    "DEEPBOT_PACKAGE_MANAGER",
    "DEEPBOT_WORKERS",
    "DEEPBOT_POLL_INTERVAL_MS",
    "DEEPBOT_GRACE_PERIOD_MS",
];

fn clear_vars() {
    for var in VARS {
        unsafe {
            std::env::remove_var(var);
        }
    }
}

#[test]
#[serial]
fn test_config_from_env_defaults() {
    clear_vars();
    let config = SupervisorConfig::from_env();

    assert_eq!(config.base_dir, PathBuf::from("."));
    assert_eq!(config.env_file, PathBuf::from(".env"));
    assert_eq!(config.runtime, "node");
    assert_eq!(config.package_manager, "npm");
    assert_eq!(config.workers, vec![WorkerRole::Bot, WorkerRole::Web]);
    assert_eq!(config.poll_interval, Duration::from_millis(500));
    assert_eq!(config.grace_period, Duration::from_secs(5));
}

#[test]
#[serial]
fn test_config_from_env_overrides() {
    clear_vars();
    unsafe {
        std::env::set_var("DEEPBOT_BASE_DIR", "/srv/deepbot");
        std::env::set_var("DEEPBOT_RUNTIME", "bun");
        std::env::set_var("DEEPBOT_WORKERS", "web");
        std::env::set_var("DEEPBOT_POLL_INTERVAL_MS", "250");
        std::env::set_var("DEEPBOT_GRACE_PERIOD_MS", "1500");
    }

    let config = SupervisorConfig::from_env();
    clear_vars();

    assert_eq!(config.base_dir, PathBuf::from("/srv/deepbot"));
    assert_eq!(config.runtime, "bun");
    assert_eq!(config.workers, vec![WorkerRole::Web]);
    assert_eq!(config.poll_interval, Duration::from_millis(250));
    assert_eq!(config.grace_period, Duration::from_millis(1500));
    assert_eq!(
        config.env_file_path(),
        PathBuf::from("/srv/deepbot/.env")
    );
}

#[test]
#[serial]
fn test_invalid_env_values_keep_defaults() {
    clear_vars();
    unsafe {
        std::env::set_var("DEEPBOT_WORKERS", "bot,database");
        std::env::set_var("DEEPBOT_POLL_INTERVAL_MS", "soon");
    }

    let config = SupervisorConfig::from_env();
    clear_vars();

    assert_eq!(config.workers, vec![WorkerRole::Bot, WorkerRole::Web]);
    assert_eq!(config.poll_interval, Duration::from_millis(500));
}

#[test]
#[serial]
fn test_file_overrides_ambient_and_keeps_the_rest() {
    unsafe {
        std::env::set_var("DEEPBOT_TEST_AMBIENT_ONLY", "kept");
        std::env::set_var("DEEPBOT_TEST_OVERRIDDEN", "ambient");
    }

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(".env");
    std::fs::write(&path, "DEEPBOT_TEST_OVERRIDDEN=\"from-file\"\nMC_PORT=25565\n").unwrap();

    let overlay = EnvironmentMap::load(&path).unwrap();
    let env = EnvironmentMap::compose(&EnvironmentMap::from_ambient(), &overlay);

    unsafe {
        std::env::remove_var("DEEPBOT_TEST_AMBIENT_ONLY");
        std::env::remove_var("DEEPBOT_TEST_OVERRIDDEN");
    }

    assert_eq!(env.get("DEEPBOT_TEST_OVERRIDDEN"), Some("from-file"));
    assert_eq!(env.get("DEEPBOT_TEST_AMBIENT_ONLY"), Some("kept"));
    assert_eq!(env.get("MC_PORT"), Some("25565"));
}
