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

use crate::aggregator::{summarize, Summary};
use crate::probe::{new_probe, MetricsProbe};
use crate::report::{
    PdfRenderer, Report, ReportFile, ReportFormat, ReportGenerator, DOWNLOAD_URL_PREFIX,
};
use crate::sampler::Sampler;
use crate::state::{CurrentState, StateStore};
use netpulse_config::netpulsed::{Config, ConfigManager, ConfigPatch};
use netpulse_config::CARGO_PKG_VERSION;
use netpulse_core::{Error, Result};
use netpulse_storage::{now_millis, HistoryLedger, HistoryRecord, Range};
use netpulse_util::humanize::format_hms;
use netpulse_util::sysinfo::network::{list_interfaces, InterfaceInfo};
use netpulse_util::sysinfo::{HostSystemInfo, SystemInfo, SystemInfoProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// ActionResponse is the outcome of a control operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    fn failed(err: &Error) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(err.to_string()),
        }
    }
}

/// StatusResponse is the current state of the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub monitoring: bool,

    pub current: CurrentState,
}

/// HistoryResponse is the history of a range with its summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub range: Range,

    pub records: Vec<HistoryRecord>,

    pub summary: Summary,
}

/// GenerateReportResponse is the outcome of a report request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// ReportListing is a stored report as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListing {
    pub name: String,

    /// Modification time in milliseconds since the unix epoch.
    pub date: i64,

    pub size: u64,

    pub url: String,
}

/// ConfigResponse carries the configuration after a read or an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub success: bool,

    pub config: Config,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// SpeedTestResult is a one-shot reading taken outside the sampling loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedTestResult {
    /// Download speed in Mbps.
    pub download: f64,

    /// Upload speed in Mbps.
    pub upload: f64,

    /// Latency in milliseconds.
    pub ping: f64,

    pub server: String,

    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
}

/// AppStatus reports the liveness of the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub online: bool,

    pub version: String,

    /// Milliseconds since the unix epoch.
    pub timestamp: i64,

    /// Process uptime formatted as HH:MM:SS. Host uptime is `SystemInfo::uptime`.
    pub uptime: String,
}

/// Monitor exposes the collector to request handlers.
pub struct Monitor {
    config: Arc<ConfigManager>,
    state: Arc<StateStore>,
    history: Arc<HistoryLedger>,
    probe: Arc<dyn MetricsProbe>,
    system: Arc<dyn SystemInfoProvider>,
    sampler: Sampler,
    reports: ReportGenerator,
    started_at: Instant,
}

impl Monitor {
    /// build wires the collector from the configuration: the configured probe,
    /// the host system information and, when enabled, the pdf backend.
    pub async fn build(config: Arc<ConfigManager>, history: Arc<HistoryLedger>) -> Monitor {
        let current = config.get().await;
        let probe = new_probe(&current);
        Self::new(config, &current, history, probe, Arc::new(HostSystemInfo))
    }

    /// new wires the collector from explicit parts.
    pub fn new(
        config: Arc<ConfigManager>,
        current: &Config,
        history: Arc<HistoryLedger>,
        probe: Arc<dyn MetricsProbe>,
        system: Arc<dyn SystemInfoProvider>,
    ) -> Monitor {
        let state = Arc::new(StateStore::new());
        let sampler = Sampler::new(config.clone(), state.clone(), history.clone(), probe.clone());

        let reports = ReportGenerator::new(
            current.report_dir(),
            state.clone(),
            history.clone(),
            system.clone(),
        )
        .with_pdf(Arc::new(PdfRenderer));
        info!("report directory {}", reports.dir().display());

        Monitor {
            config,
            state,
            history,
            probe,
            system,
            sampler,
            reports,
            started_at: Instant::now(),
        }
    }

    /// start_monitoring starts the sampler on interface, or on the configured
    /// interface when none is given.
    #[instrument(skip_all)]
    pub async fn start_monitoring(&self, interface: Option<String>) -> ActionResponse {
        match self.sampler.start(interface).await {
            Ok(()) => ActionResponse::ok("monitoring started"),
            Err(err) if err.is_soft() => {
                warn!("start monitoring: {}", err);
                ActionResponse::failed(&err)
            }
            Err(err) => {
                error!("start monitoring failed: {}", err);
                ActionResponse::failed(&err)
            }
        }
    }

    /// stop_monitoring asks the sampler to stop. Stopping a stopped sampler is
    /// reported but is not a failure of the collector.
    #[instrument(skip_all)]
    pub async fn stop_monitoring(&self) -> ActionResponse {
        match self.sampler.stop().await {
            Ok(()) => ActionResponse::ok("monitoring stopped"),
            Err(err) => {
                warn!("stop monitoring: {}", err);
                ActionResponse::failed(&err)
            }
        }
    }

    /// reset_stats zeroes the current metrics and totals.
    pub async fn reset_stats(&self) -> ActionResponse {
        self.state.reset().await;
        ActionResponse::ok("statistics reset")
    }

    pub async fn get_status(&self) -> StatusResponse {
        let current = self.state.get().await;
        StatusResponse {
            monitoring: current.monitoring,
            current,
        }
    }

    /// get_history returns the records of range with their summary. Unknown
    /// ranges are a validation error.
    pub async fn get_history(&self, range: &str) -> Result<HistoryResponse> {
        let range: Range = range.parse()?;
        let records = self.history.query(range).await;
        let summary = summarize(&records);
        Ok(HistoryResponse {
            range,
            records,
            summary,
        })
    }

    /// generate_report writes a report in format, text or pdf. Pdf requests
    /// produce text while `reportPdf` is disabled in the live configuration.
    #[instrument(skip_all)]
    pub async fn generate_report(&self, format: &str) -> GenerateReportResponse {
        let result = match format.parse::<ReportFormat>() {
            Ok(ReportFormat::Pdf) if !self.config.get().await.report_pdf => {
                debug!(
                    "{}, rendering text",
                    Error::BackendUnavailable(ReportFormat::Pdf.to_string())
                );
                self.reports.generate(ReportFormat::Text).await
            }
            Ok(format) => self.reports.generate(format).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(report) => GenerateReportResponse {
                success: true,
                report: Some(report),
                error: None,
            },
            Err(err) => {
                error!("generate report failed: {}", err);
                GenerateReportResponse {
                    success: false,
                    report: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// list_reports returns the stored reports, newest first.
    pub async fn list_reports(&self) -> Result<Vec<ReportListing>> {
        Ok(self
            .reports
            .list()
            .await?
            .into_iter()
            .map(|entry| ReportListing {
                url: format!("{}{}", DOWNLOAD_URL_PREFIX, entry.name),
                name: entry.name,
                date: entry.modified,
                size: entry.size,
            })
            .collect())
    }

    /// download_report returns the content of a stored report.
    pub async fn download_report(&self, filename: &str) -> Result<ReportFile> {
        self.reports.open(filename).await
    }

    pub async fn get_config(&self) -> ConfigResponse {
        ConfigResponse {
            success: true,
            config: self.config.get().await,
            error: None,
        }
    }

    /// set_config applies a partial update. When persisting fails the update
    /// still takes effect in memory and the failure is reported.
    #[instrument(skip_all)]
    pub async fn set_config(&self, patch: ConfigPatch) -> ConfigResponse {
        match self.config.set(&patch).await {
            Ok(config) => ConfigResponse {
                success: true,
                config,
                error: None,
            },
            Err(err) => {
                match &err {
                    Error::ExternalError(external) if external.is_persistence() => {
                        error!("persist config failed, update kept in memory: {}", err)
                    }
                    _ => error!("set config failed: {}", err),
                }

                ConfigResponse {
                    success: false,
                    config: self.config.get().await,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// get_system_info reads the host off the runtime threads.
    pub async fn get_system_info(&self) -> Result<SystemInfo> {
        let system = self.system.clone();
        tokio::task::spawn_blocking(move || system.system_info()).await?
    }

    /// list_interfaces returns the non-loopback network interfaces.
    pub async fn list_interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        Ok(tokio::task::spawn_blocking(list_interfaces).await?)
    }

    /// run_speed_test takes one reading on the configured interface without
    /// touching the current state.
    #[instrument(skip_all)]
    pub async fn run_speed_test(&self) -> Result<SpeedTestResult> {
        let interface = self.config.get().await.selected_interface;
        let measurement = self
            .probe
            .measure(interface.as_deref())
            .await
            .inspect_err(|err| error!("speed test failed: {}", err))?;

        Ok(SpeedTestResult {
            download: measurement.download_mbps,
            upload: measurement.upload_mbps,
            ping: measurement.ping_ms,
            server: self.probe.server(),
            timestamp: now_millis(),
        })
    }

    /// get_app_status reports liveness. The uptime is the uptime of this
    /// process; the host uptime is in `get_system_info`.
    pub fn get_app_status(&self) -> AppStatus {
        AppStatus {
            online: true,
            version: CARGO_PKG_VERSION.to_string(),
            timestamp: now_millis(),
            uptime: format_hms(self.started_at.elapsed()),
        }
    }

    /// shutdown stops the sampler if it runs and waits for the loop to exit.
    /// A sampler that is already stopped is not an error.
    #[instrument(skip_all)]
    pub async fn shutdown(&self) -> Result<()> {
        match self.sampler.stop().await {
            Ok(()) => {}
            Err(err) if err.is_soft() => {}
            Err(err) => return Err(err),
        }

        self.sampler.wait_stopped().await?;
        info!("monitor stopped");
        Ok(())
    }
}
