//! `.env`-style configuration source and the composed worker environment

use crate::error::{Result, SupervisorError};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Ordered variable name → value mapping handed to every worker
///
/// Keys are unique; inserting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentMap {
    vars: BTreeMap<String, String>,
}

impl EnvironmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the supervisor's own environment
    pub fn from_ambient() -> Self {
        let mut map = Self::new();
        for (key, value) in std::env::vars_os() {
            match (key.into_string(), value.into_string()) {
                (Ok(key), Ok(value)) => map.insert(key, value),
                (Ok(key), Err(_)) => {
                    warn!(key = %key, "Skipping ambient variable with non UTF-8 value");
                }
                (Err(key), _) => {
                    warn!(key = ?key, "Skipping ambient variable with non UTF-8 name");
                }
            }
        }
        map
    }

    /// Read the configuration source at `path`
    ///
    /// A missing file yields an empty overlay.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No configuration source, using empty overlay");
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| SupervisorError::Config {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;

        let overlay = Self::parse(&content);
        info!(
            path = %path.display(),
            entries = overlay.len(),
            "Loaded configuration source"
        );
        Ok(overlay)
    }

    /// Parse `KEY=VALUE` lines; malformed lines are skipped
    pub fn parse(content: &str) -> Self {
        let mut map = Self::new();
        for line in content.lines() {
            if let Some((key, value)) = parse_line(line) {
                map.insert(key, value);
            }
        }
        map
    }

    /// Base environment with `overlay` applied on top
    pub fn compose(base: &EnvironmentMap, overlay: &EnvironmentMap) -> Self {
        let mut merged = base.clone();
        for (key, value) in overlay.iter() {
            merged.insert(key.to_string(), value.to_string());
        }
        merged
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.vars.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for EnvironmentMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// Split one source line into a key/value pair
fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    Some((key.trim().to_string(), strip_quotes(value.trim()).to_string()))
}

/// Remove one layer of matching surrounding quotes
fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
