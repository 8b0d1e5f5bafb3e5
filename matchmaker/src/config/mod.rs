use crate::error::{MatchmakerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tuning for materialization passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a pass waits for records before returning what it has
    pub deadline_ms: u64,
    /// Capacity of the record channel between document tasks and the collector
    pub channel_capacity: usize,
    /// Upper bound on concurrently running document tasks; unbounded when unset
    pub max_concurrency: Option<usize>,
    /// Run each formatted value through its field type's parse/format pair
    pub coerce_field_types: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            deadline_ms: 20_000,
            channel_capacity: 100,
            max_concurrency: None,
            coerce_field_types: false,
        }
    }
}

impl EngineConfig {
    /// Load a YAML config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    /// Defaults overridden by `MATCHMAKER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `MATCHMAKER_*` overrides read through `lookup`.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Some(v) = lookup("MATCHMAKER_DEADLINE_MS") {
            self.deadline_ms = parse_env("MATCHMAKER_DEADLINE_MS", &v)?;
        }
        if let Some(v) = lookup("MATCHMAKER_CHANNEL_CAPACITY") {
            self.channel_capacity = parse_env("MATCHMAKER_CHANNEL_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("MATCHMAKER_MAX_CONCURRENCY") {
            self.max_concurrency = match v.trim() {
                "" | "0" | "unbounded" => None,
                n => Some(parse_env("MATCHMAKER_MAX_CONCURRENCY", n)?),
            };
        }
        if let Some(v) = lookup("MATCHMAKER_COERCE_FIELD_TYPES") {
            self.coerce_field_types = parse_env("MATCHMAKER_COERCE_FIELD_TYPES", &v)?;
        }
        self.check()?;
        Ok(self)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    fn check(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(MatchmakerError::Other(
                "channel_capacity must be at least 1".into(),
            ));
        }
        if self.max_concurrency == Some(0) {
            return Err(MatchmakerError::Other(
                "max_concurrency must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| MatchmakerError::Other(format!("{key}='{value}': {e}")))
}
