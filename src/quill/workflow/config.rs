// SPDX-License-Identifier: MIT

//! Engine configuration
//!
//! Loaded from a YAML file or assembled from `QUILL_*` environment
//! variables on top of the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::graph::DEFAULT_MAX_TRANSITIONS;
use crate::kit::error::WorkflowError;
use crate::kit::wrappers::RetryPolicy;

pub const DEFAULT_MAX_REVISIONS: u32 = 3;
pub const DEFAULT_CHECKPOINT_DIR: &str = ".quill/checkpoints";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_revisions: u32,
    /// Safety limit on step transitions per run
    pub max_transitions: u32,
    pub retry: RetryPolicy,
    pub checkpoint_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_revisions: DEFAULT_MAX_REVISIONS,
            max_transitions: DEFAULT_MAX_TRANSITIONS,
            retry: RetryPolicy::default(),
            checkpoint_dir: PathBuf::from(DEFAULT_CHECKPOINT_DIR),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self, WorkflowError> {
        let config: Self =
            serde_yaml::from_str(content).map_err(|e| WorkflowError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `QUILL_*` environment variables
    pub fn from_env() -> Result<Self, WorkflowError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup; `from_env` passes the process
    /// environment
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, WorkflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("QUILL_MAX_REVISIONS") {
            self.max_revisions = parse_var("QUILL_MAX_REVISIONS", &value)?;
        }
        if let Some(value) = lookup("QUILL_MAX_TRANSITIONS") {
            self.max_transitions = parse_var("QUILL_MAX_TRANSITIONS", &value)?;
        }
        if let Some(value) = lookup("QUILL_MAX_RETRIES") {
            self.retry.max_retries = parse_var("QUILL_MAX_RETRIES", &value)?;
        }
        if let Some(value) = lookup("QUILL_BACKOFF_FACTOR") {
            self.retry.backoff_factor = parse_var("QUILL_BACKOFF_FACTOR", &value)?;
        }
        if let Some(value) = lookup("QUILL_CHECKPOINT_DIR") {
            self.checkpoint_dir = PathBuf::from(value);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.max_revisions < 1 {
            return Err(WorkflowError::config("max_revisions must be at least 1"));
        }
        if self.max_transitions < 1 {
            return Err(WorkflowError::config("max_transitions must be at least 1"));
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(WorkflowError::config(format!(
                "backoff_factor must be a finite number >= 1, got {}",
                self.retry.backoff_factor
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, WorkflowError> {
    value
        .trim()
        .parse()
        .map_err(|_| WorkflowError::config(format!("{} has invalid value '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_revisions, 3);
        assert_eq!(config.max_transitions, 100);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.checkpoint_dir, PathBuf::from(".quill/checkpoints"));
    }

    #[test]
    fn test_parse_yaml_partial() {
        let yaml = r#"
max_revisions: 5
retry:
  max_retries: 1
  time_unit_ms: 10
checkpoint_dir: /tmp/quill
"#;
        let config = EngineConfig::parse_yaml(yaml).unwrap();
        assert_eq!(config.max_revisions, 5);
        assert_eq!(config.max_transitions, 100);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.backoff_factor, 2.0);
        assert_eq!(config.retry.time_unit, Duration::from_millis(10));
        assert_eq!(config.checkpoint_dir, PathBuf::from("/tmp/quill"));
    }

    #[test]
    fn test_parse_yaml_rejects_zero_revisions() {
        let err = EngineConfig::parse_yaml("max_revisions: 0").unwrap_err();
        assert!(matches!(err, WorkflowError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let config = EngineConfig::default()
            .with_overrides(lookup(&[
                ("QUILL_MAX_REVISIONS", "2"),
                ("QUILL_MAX_RETRIES", "0"),
                ("QUILL_BACKOFF_FACTOR", "1.5"),
                ("QUILL_CHECKPOINT_DIR", "sessions"),
            ]))
            .unwrap();
        assert_eq!(config.max_revisions, 2);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.backoff_factor, 1.5);
        assert_eq!(config.checkpoint_dir, PathBuf::from("sessions"));
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let err = EngineConfig::default()
            .with_overrides(lookup(&[("QUILL_MAX_TRANSITIONS", "lots")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: QUILL_MAX_TRANSITIONS has invalid value 'lots'"
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quill.yaml");
        std::fs::write(&path, "max_transitions: 40\n").unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap().max_transitions, 40);

        assert!(EngineConfig::load(dir.path().join("missing.yaml")).is_err());
    }
}
