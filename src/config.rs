use crate::SearchError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ENV_MAX_THRESHOLD: &str = "FLIPSEARCH_MAX_THRESHOLD";
pub const ENV_MIN_THRESHOLD: &str = "FLIPSEARCH_MIN_THRESHOLD";
pub const ENV_REPORT_INTERVAL: &str = "FLIPSEARCH_REPORT_INTERVAL";
pub const ENV_STATE_DIR: &str = "FLIPSEARCH_STATE_DIR";

/// Tuning for the frontier and the search loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Window size that triggers a spill to fragments; also the fragment cap.
    pub max_threshold: usize,
    /// Window size kept after a spill; also the fragment chunk size.
    pub min_threshold: usize,
    /// Pops between progress lines. Zero disables progress logging.
    pub report_interval: u64,
    /// Drop dominated terminal children before they reach the frontier.
    pub screen_terminal_children: bool,
    /// Directory for fragment files. `None` means a temporary directory.
    pub state_dir: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl SearchConfig {
    pub fn default_config() -> Self {
        Self {
            max_threshold: 30_000,
            min_threshold: 10_000,
            report_interval: 500,
            screen_terminal_children: true,
            state_dir: None,
        }
    }

    pub fn with_thresholds(mut self, max_threshold: usize, min_threshold: usize) -> Self {
        self.max_threshold = max_threshold;
        self.min_threshold = min_threshold;
        self
    }

    /// Set the cap and keep a tenth of it after each spill.
    pub fn with_max_threshold(self, max_threshold: usize) -> Self {
        let min_threshold = (max_threshold / 10).min(max_threshold.saturating_sub(1));
        self.with_thresholds(max_threshold, min_threshold)
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Defaults overlaid with `FLIPSEARCH_*` environment variables.
    pub fn from_env() -> Result<Self, SearchError> {
        Self::default_config().overlay(|key| std::env::var(key).ok())
    }

    /// Overlay values from a variable lookup onto this config.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, SearchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_THRESHOLD) {
            self.max_threshold = parse_var(ENV_MAX_THRESHOLD, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MIN_THRESHOLD) {
            self.min_threshold = parse_var(ENV_MIN_THRESHOLD, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REPORT_INTERVAL) {
            self.report_interval = parse_var(ENV_REPORT_INTERVAL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STATE_DIR) {
            self.state_dir = Some(PathBuf::from(raw));
        }
        self.validate()?;
        Ok(self)
    }

    /// Read a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, SearchError> {
        let text = fs::read_to_string(path)?;
        let config: SearchConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_threshold == 0 {
            return Err(SearchError::Config("max_threshold must be positive".to_string()));
        }
        if self.min_threshold >= self.max_threshold {
            return Err(SearchError::Config(format!(
                "min_threshold ({}) must be below max_threshold ({})",
                self.min_threshold, self.max_threshold
            )));
        }
        Ok(())
    }

    pub fn log_summary(&self) {
        info!(
            max_threshold = self.max_threshold,
            min_threshold = self.min_threshold,
            report_interval = self.report_interval,
            screen_terminal_children = self.screen_terminal_children,
            state_dir = ?self.state_dir,
            "search configuration"
        );
    }
}

fn parse_var<V: std::str::FromStr>(key: &str, raw: &str) -> Result<V, SearchError> {
    raw.trim()
        .parse()
        .map_err(|_| SearchError::Config(format!("{} has invalid value {:?}", key, raw)))
}
