/*
 *     Copyright 2025 The Netpulse Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use netpulse_core::{
    error::{ErrorType, ExternalError, OrErr},
    Result,
};
use netpulse_util::fs::write_replace;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, instrument};
use validator::Validate;

/// NAME is the name of netpulsed.
pub const NAME: &str = "netpulsed";

/// MIN_SAMPLE_INTERVAL_SECONDS is the shortest allowed tick interval.
pub const MIN_SAMPLE_INTERVAL_SECONDS: u64 = 1;

/// MIN_RETENTION_DAYS is the shortest allowed retention window.
pub const MIN_RETENTION_DAYS: u32 = 1;

/// MAX_RETENTION_DAYS is the longest allowed retention window.
pub const MAX_RETENTION_DAYS: u32 = 365;

/// default_netpulsed_config_path is the default config path for netpulsed.
#[inline]
pub fn default_netpulsed_config_path() -> PathBuf {
    crate::default_config_dir().join("netpulsed.yaml")
}

/// default_netpulsed_log_dir is the default log directory for netpulsed.
#[inline]
pub fn default_netpulsed_log_dir() -> PathBuf {
    crate::default_log_dir().join(NAME)
}

/// default_sample_interval_seconds is the default tick interval, default is 5 seconds.
#[inline]
fn default_sample_interval_seconds() -> u64 {
    5
}

/// default_retention_days is the default retention window of history, default is 30 days.
#[inline]
fn default_retention_days() -> u32 {
    30
}

/// default_auto_start_on_init starts sampling when the daemon starts.
#[inline]
fn default_auto_start_on_init() -> bool {
    true
}

/// default_history_flush_interval is the default cadence of history records, default is 60 seconds.
#[inline]
fn default_history_flush_interval() -> Duration {
    Duration::from_secs(60)
}

/// default_ping_target is the address used to measure latency.
#[inline]
fn default_ping_target() -> String {
    "1.1.1.1:443".to_string()
}

/// default_report_pdf enables the PDF report backend.
#[inline]
fn default_report_pdf() -> bool {
    true
}

/// default_theme is the default theme of the dashboard.
#[inline]
fn default_theme() -> String {
    "light".to_string()
}

/// ProbeKind selects the metrics probe implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// System reads interface counters and measures TCP connect latency.
    #[default]
    System,

    /// Simulated produces randomized readings around fixed baselines.
    Simulated,
}

/// Config is the configuration for netpulsed, persisted as a flat document.
#[derive(Debug, Clone, PartialEq, Validate, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// sample_interval_seconds is the interval between two sampler ticks.
    #[validate(range(min = 1))]
    pub sample_interval_seconds: u64,

    /// retention_days is how long history records are kept.
    #[validate(range(min = 1, max = 365))]
    pub retention_days: u32,

    /// selected_interface is the interface to sample, all interfaces when unset.
    pub selected_interface: Option<String>,

    /// auto_start_on_init starts the sampler when the daemon starts.
    pub auto_start_on_init: bool,

    /// history_flush_interval is the cadence of history records.
    #[serde(with = "humantime_serde")]
    pub history_flush_interval: Duration,

    /// probe is the metrics probe implementation.
    pub probe: ProbeKind,

    /// ping_target is the host:port the system probe connects to for latency.
    pub ping_target: String,

    /// report_pdf enables the PDF report backend, reports fall back to text
    /// when disabled.
    pub report_pdf: bool,

    /// data_dir is the directory of the history ledger.
    pub data_dir: PathBuf,

    /// report_dir is the directory of generated reports, `{dataDir}/reports`
    /// when unset.
    pub report_dir: Option<PathBuf>,

    pub theme: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_interval_seconds: default_sample_interval_seconds(),
            retention_days: default_retention_days(),
            selected_interface: None,
            auto_start_on_init: default_auto_start_on_init(),
            history_flush_interval: default_history_flush_interval(),
            probe: ProbeKind::default(),
            ping_target: default_ping_target(),
            report_pdf: default_report_pdf(),
            data_dir: crate::default_data_dir(),
            report_dir: None,
            theme: default_theme(),
        }
    }
}

impl Config {
    /// Load the configuration from file.
    #[instrument(skip_all)]
    pub async fn load(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).await?;
        let mut config: Config = serde_yaml::from_str(&content).or_err(ErrorType::ConfigError)?;

        config.convert();
        config.validate().or_err(ErrorType::ValidationError)?;
        Ok(config)
    }

    /// Save the configuration to file.
    #[instrument(skip_all)]
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).or_err(ErrorType::SerializeError)?;
        write_replace(path, content.as_bytes())
            .await
            .map_err(|err| {
                ExternalError::new(ErrorType::StorageError)
                    .with_context(format!("write config {}", path.display()))
                    .with_cause(Box::new(err))
            })?;
        Ok(())
    }

    /// sample_interval returns the tick interval, never shorter than one second.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_seconds.max(MIN_SAMPLE_INTERVAL_SECONDS))
    }

    /// history_path returns the path of the history ledger.
    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join("history.json")
    }

    /// report_dir returns the directory of generated reports.
    pub fn report_dir(&self) -> PathBuf {
        self.report_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("reports"))
    }

    /// convert normalizes values that deserialize but carry no meaning.
    fn convert(&mut self) {
        if self
            .selected_interface
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            self.selected_interface = None;
        }
    }
}

/// ConfigPatch is a partial update of the configuration. Numeric values are
/// clamped into their valid ranges instead of being rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigPatch {
    pub sample_interval_seconds: Option<i64>,

    pub retention_days: Option<i64>,

    /// An empty name selects all interfaces.
    pub selected_interface: Option<String>,

    pub auto_start_on_init: Option<bool>,

    pub report_pdf: Option<bool>,

    pub theme: Option<String>,
}

impl ConfigPatch {
    /// apply writes the patch into config.
    pub fn apply(&self, config: &mut Config) {
        if let Some(interval) = self.sample_interval_seconds {
            config.sample_interval_seconds = interval.max(MIN_SAMPLE_INTERVAL_SECONDS as i64) as u64;
        }

        if let Some(days) = self.retention_days {
            config.retention_days =
                days.clamp(MIN_RETENTION_DAYS as i64, MAX_RETENTION_DAYS as i64) as u32;
        }

        if let Some(interface) = self.selected_interface.as_ref() {
            let interface = interface.trim();
            config.selected_interface = if interface.is_empty() {
                None
            } else {
                Some(interface.to_string())
            };
        }

        if let Some(auto_start) = self.auto_start_on_init {
            config.auto_start_on_init = auto_start;
        }

        if let Some(report_pdf) = self.report_pdf {
            config.report_pdf = report_pdf;
        }

        if let Some(theme) = self.theme.as_ref() {
            config.theme = theme.clone();
        }
    }
}

/// ConfigManager owns the live configuration and its file.
pub struct ConfigManager {
    /// path is the path of the configuration file.
    path: PathBuf,

    /// config is the live configuration.
    config: RwLock<Config>,
}

impl ConfigManager {
    /// new loads the configuration from path, writing the defaults when the
    /// file does not exist yet.
    #[instrument(skip_all)]
    pub async fn new(path: PathBuf) -> Result<ConfigManager> {
        let config = if fs::try_exists(&path).await? {
            Config::load(&path).await?
        } else {
            let config = Config::default();
            config.save(&path).await?;
            info!("default config written to {}", path.display());
            config
        };

        Ok(Self::with_config(path, config))
    }

    /// with_config wraps an already loaded configuration.
    pub fn with_config(path: PathBuf, config: Config) -> ConfigManager {
        ConfigManager {
            path,
            config: RwLock::new(config),
        }
    }

    /// path returns the path of the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// get returns a copy of the live configuration.
    pub async fn get(&self) -> Config {
        self.config.read().await.clone()
    }

    /// set applies a patch and persists the result. The live configuration is
    /// updated even if persisting fails, in which case the error is returned.
    #[instrument(skip_all)]
    pub async fn set(&self, patch: &ConfigPatch) -> Result<Config> {
        let mut config = self.config.write().await;
        let mut updated = config.clone();
        patch.apply(&mut updated);
        updated.validate().or_err(ErrorType::ValidationError)?;

        *config = updated.clone();
        updated.save(&self.path).await?;
        info!(
            "config updated interval {}s retention {}d interface {:?}",
            updated.sample_interval_seconds, updated.retention_days, updated.selected_interface
        );
        Ok(updated)
    }
}
