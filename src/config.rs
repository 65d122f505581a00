//! Configuration: timing, routes and probe lists
//!
//! Loaded from YAML. Every field has a default, so an empty file (or no
//! file at all) yields a working configuration for the stock host markup.
//!
//! ```yaml
//! storage_key: n8nFolderView
//! routes:
//!   workflow_list: /home/workflows
//! timing:
//!   extraction_attempts: 5
//!   observer_debounce_ms: 500
//! probes:
//!   tags:
//!     - kind: cards
//!       card: '[data-test-id="workflows-list-item"]'
//!       label: 'li[data-test-id="tag"] > span'
//! ```

use crate::host::{ChipProbe, FilterInputProbe, SidebarProbe, TagProbe};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderViewConfig {
    /// Namespace key for the persisted state record
    pub storage_key: String,
    pub routes: RouteConfig,
    pub timing: TimingConfig,
    pub probes: ProbeConfig,
    /// Substituted only when the loading safety timeout fires and no
    /// extraction has ever succeeded. Empty by default.
    pub fallback_tags: IndexMap<String, u64>,
}

impl Default for FolderViewConfig {
    fn default() -> Self {
        Self {
            storage_key: "n8nFolderView".to_string(),
            routes: RouteConfig::default(),
            timing: TimingConfig::default(),
            probes: ProbeConfig::default(),
            fallback_tags: IndexMap::new(),
        }
    }
}

impl FolderViewConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid("storage_key must not be empty".into()));
        }
        if !self.routes.workflow_list.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "routes.workflow_list must be an absolute path, got '{}'",
                self.routes.workflow_list
            )));
        }
        if self.timing.extraction_attempts == 0 {
            return Err(ConfigError::Invalid(
                "timing.extraction_attempts must be at least 1".into(),
            ));
        }
        if self.timing.cleanup_every_passes == 0 {
            return Err(ConfigError::Invalid(
                "timing.cleanup_every_passes must be at least 1".into(),
            ));
        }
        if self.timing.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "timing.poll_interval_ms must be at least 1".into(),
            ));
        }
        if self.timing.cleanup_stale_hours < 0
            || chrono::Duration::try_hours(self.timing.cleanup_stale_hours).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "timing.cleanup_stale_hours out of range: {}",
                self.timing.cleanup_stale_hours
            )));
        }
        if self.timing.startup_stale_days < 0
            || chrono::Duration::try_days(self.timing.startup_stale_days).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "timing.startup_stale_days out of range: {}",
                self.timing.startup_stale_days
            )));
        }
        if self.probes.tags.is_empty() {
            return Err(ConfigError::Invalid("probes.tags must list at least one probe".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Path of the unfiltered workflow list
    pub workflow_list: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            workflow_list: "/home/workflows".to_string(),
        }
    }
}

/// All waits, delays and schedules. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub extraction_attempts: u32,
    pub extraction_retry_ms: u64,
    /// How long one extraction attempt waits for the page to be ready
    pub readiness_wait_ms: u64,
    /// Poll spacing for every element-appearance wait
    pub poll_interval_ms: u64,
    pub observer_debounce_ms: u64,
    pub observer_startup_delay_ms: u64,
    pub reset_wait_ms: u64,
    pub chip_wait_ms: u64,
    pub unfiltered_wait_ms: u64,
    pub sidebar_wait_ms: u64,
    pub init_retry_ms: u64,
    pub loading_timeout_ms: u64,
    pub cleanup_stale_hours: i64,
    pub startup_stale_days: i64,
    /// Opportunistic cleanup runs on every Nth reconciliation pass
    pub cleanup_every_passes: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            extraction_attempts: 5,
            extraction_retry_ms: 1_000,
            readiness_wait_ms: 3_000,
            poll_interval_ms: 100,
            observer_debounce_ms: 500,
            observer_startup_delay_ms: 2_000,
            reset_wait_ms: 2_000,
            chip_wait_ms: 2_000,
            unfiltered_wait_ms: 5_000,
            sidebar_wait_ms: 10_000,
            init_retry_ms: 5_000,
            loading_timeout_ms: 8_000,
            cleanup_stale_hours: 24,
            startup_stale_days: 7,
            cleanup_every_passes: 10,
        }
    }
}

impl TimingConfig {
    pub fn extraction_retry(&self) -> Duration {
        Duration::from_millis(self.extraction_retry_ms)
    }

    pub fn readiness_wait(&self) -> Duration {
        Duration::from_millis(self.readiness_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn observer_debounce(&self) -> Duration {
        Duration::from_millis(self.observer_debounce_ms)
    }

    pub fn observer_startup_delay(&self) -> Duration {
        Duration::from_millis(self.observer_startup_delay_ms)
    }

    pub fn reset_wait(&self) -> Duration {
        Duration::from_millis(self.reset_wait_ms)
    }

    pub fn chip_wait(&self) -> Duration {
        Duration::from_millis(self.chip_wait_ms)
    }

    pub fn unfiltered_wait(&self) -> Duration {
        Duration::from_millis(self.unfiltered_wait_ms)
    }

    pub fn sidebar_wait(&self) -> Duration {
        Duration::from_millis(self.sidebar_wait_ms)
    }

    pub fn init_retry(&self) -> Duration {
        Duration::from_millis(self.init_retry_ms)
    }

    pub fn loading_timeout(&self) -> Duration {
        Duration::from_millis(self.loading_timeout_ms)
    }

    /// Saturates when the configured value is out of range.
    pub fn cleanup_staleness(&self) -> chrono::Duration {
        chrono::Duration::try_hours(self.cleanup_stale_hours).unwrap_or(chrono::Duration::MAX)
    }

    pub fn startup_staleness(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.startup_stale_days).unwrap_or(chrono::Duration::MAX)
    }
}

/// Ordered probe lists. Earlier entries win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Any match means the host has rendered enough to read tags
    pub ready: Vec<String>,
    pub tags: Vec<TagProbe>,
    /// Subtree the change observer watches
    pub observe_root: Vec<String>,
    /// A mutated node containing any of these triggers reconciliation
    pub observe_markers: Vec<String>,
    pub sidebar: Vec<SidebarProbe>,
    pub reset: Vec<String>,
    pub chips: Vec<ChipProbe>,
    pub filter_inputs: Vec<FilterInputProbe>,
}

const CARD: &str = r#"[data-test-id="workflows-list-item"]"#;
const RESOURCE_CARD: &str = r#"[data-test-id="resources-list-item"]"#;
const TAG_LABEL: &str = r#"li[data-test-id="tag"] > span"#;
const TAG_ITEM: &str = r#"li[data-test-id="tag"]"#;

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ready: vec![
                TAG_ITEM.to_string(),
                CARD.to_string(),
                r#"[data-test-id="list-empty"]"#.to_string(),
            ],
            tags: vec![
                TagProbe::Cards {
                    card: CARD.to_string(),
                    label: TAG_LABEL.to_string(),
                },
                TagProbe::Cards {
                    card: RESOURCE_CARD.to_string(),
                    label: r#"[data-test-id="tag"]"#.to_string(),
                },
                TagProbe::Labels {
                    label: TAG_LABEL.to_string(),
                    card: format!("{}, {}", CARD, RESOURCE_CARD),
                },
                TagProbe::Empty {
                    marker: r#"[data-test-id="list-empty"]"#.to_string(),
                },
            ],
            observe_root: vec![
                ".workflows-list".to_string(),
                r#"[data-test-id="resources-list-wrapper"]"#.to_string(),
            ],
            observe_markers: vec![TAG_ITEM.to_string(), CARD.to_string()],
            sidebar: vec![
                SidebarProbe::Selector {
                    selector: "#sidebar".to_string(),
                },
                SidebarProbe::Selector {
                    selector: r#"[data-test-id="main-sidebar"]"#.to_string(),
                },
                SidebarProbe::Layout {
                    candidates: "nav, aside, div".to_string(),
                    min_height_ratio: 0.7,
                    max_width: 400.0,
                    max_left: 10.0,
                },
            ],
            reset: vec![
                r#"a[data-test-id="workflows-filter-reset"]"#.to_string(),
                r#"[data-test-id="workflows-filter-reset"]"#.to_string(),
            ],
            chips: vec![
                ChipProbe::new(TAG_ITEM),
                ChipProbe::new(r#"[data-test-id="tags-dropdown"] li"#),
                ChipProbe::new(".el-tag"),
            ],
            filter_inputs: vec![
                FilterInputProbe::new(r#"input[data-test-id="resources-list-search"]"#),
                FilterInputProbe::new(r#"input[type="search"]"#),
                FilterInputProbe::new(r#"input[placeholder^="Search"]"#),
            ],
        }
    }
}
