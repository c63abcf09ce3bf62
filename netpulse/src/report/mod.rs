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

use crate::aggregator::summarize;
use crate::state::StateStore;
use chrono::{DateTime, Local, TimeZone, Utc};
use netpulse_config::CARGO_PKG_VERSION;
use netpulse_core::error::{ErrorType, ExternalError};
use netpulse_core::{Error, Result};
use netpulse_storage::{HistoryLedger, Range};
use netpulse_util::humanize::format_bytes;
use netpulse_util::sysinfo::{SystemInfo, SystemInfoProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, instrument};

pub mod pdf;
pub mod text;

pub use pdf::PdfRenderer;
pub use text::TextRenderer;

/// REPORT_PREFIX starts the name of every generated report.
pub const REPORT_PREFIX: &str = "network_report_";

/// DOWNLOAD_URL_PREFIX is the path reports are downloaded from.
pub const DOWNLOAD_URL_PREFIX: &str = "/api/download-report/";

/// RECENT_RECORDS is the number of history records listed in a report.
const RECENT_RECORDS: usize = 10;

/// MAX_NAME_ATTEMPTS bounds the collision suffixes tried for one timestamp.
const MAX_NAME_ATTEMPTS: usize = 1000;

/// DISPLAY_TIME_FORMAT is the time format shown inside reports.
const DISPLAY_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// ReportFormat is the output format of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Text,
    Pdf,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Text => "text",
            ReportFormat::Pdf => "pdf",
        }
    }

    /// extension returns the file extension of the format.
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Pdf => "pdf",
        }
    }

    /// content_type returns the media type of the format.
    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Text => "text/plain; charset=utf-8",
            ReportFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = Error;

    /// from_str accepts `text`, `txt` and `pdf` in any case.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "pdf" => Ok(ReportFormat::Pdf),
            _ => Err(Error::ValidationError(format!(
                "report format must be text or pdf, got {:?}",
                s
            ))),
        }
    }
}

/// Report describes a generated report file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub filename: String,

    /// Format actually written, text when pdf was unavailable.
    pub format: ReportFormat,

    /// Milliseconds since the unix epoch.
    pub generated_at: i64,

    pub file_path: PathBuf,

    pub download_url: String,
}

/// ReportEntry is a report file found in the report directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub name: String,

    /// Size in bytes.
    pub size: u64,

    /// Modification time in milliseconds since the unix epoch.
    pub modified: i64,
}

/// ReportFile is the content of a stored report.
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub filename: String,

    pub content_type: &'static str,

    pub content: Vec<u8>,
}

/// ReportLine is one line of a report.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportLine {
    Title(String),
    Heading(String),
    Text(String),
    Blank,
}

/// ReportContent is the renderer-independent content of a report.
#[derive(Debug, Clone, Default)]
pub struct ReportContent {
    lines: Vec<ReportLine>,
}

impl ReportContent {
    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    pub fn title(&mut self, title: impl Into<String>) {
        self.lines.push(ReportLine::Title(title.into()));
    }

    pub fn heading(&mut self, heading: impl Into<String>) {
        self.lines.push(ReportLine::Heading(heading.into()));
    }

    pub fn text(&mut self, text: impl Into<String>) {
        self.lines.push(ReportLine::Text(text.into()));
    }

    pub fn blank(&mut self) {
        self.lines.push(ReportLine::Blank);
    }
}

/// ReportRenderer turns report content into the bytes of one format.
pub trait ReportRenderer: Send + Sync {
    /// format returns the format produced by the renderer.
    fn format(&self) -> ReportFormat;

    /// render encodes the content.
    fn render(&self, content: &ReportContent) -> Result<Vec<u8>>;
}

/// ReportGenerator renders the current state and history into report files
/// under a managed directory.
pub struct ReportGenerator {
    /// dir is the directory holding the reports.
    dir: PathBuf,

    /// state supplies the current metrics.
    state: Arc<StateStore>,

    /// history supplies the weekly summary and recent records.
    history: Arc<HistoryLedger>,

    /// system supplies the identity of the host.
    system: Arc<dyn SystemInfoProvider>,

    /// text is the fallback renderer.
    text: TextRenderer,

    /// pdf is the optional pdf backend.
    pdf: Option<Arc<dyn ReportRenderer>>,
}

impl ReportGenerator {
    /// new returns a generator without a pdf backend.
    pub fn new(
        dir: PathBuf,
        state: Arc<StateStore>,
        history: Arc<HistoryLedger>,
        system: Arc<dyn SystemInfoProvider>,
    ) -> Self {
        Self {
            dir,
            state,
            history,
            system,
            text: TextRenderer,
            pdf: None,
        }
    }

    /// with_pdf configures the pdf backend.
    pub fn with_pdf(mut self, renderer: Arc<dyn ReportRenderer>) -> Self {
        self.pdf = Some(renderer);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// generate writes a new report. A pdf request without a working pdf
    /// backend produces a text report, the returned format tells which.
    #[instrument(skip_all)]
    pub async fn generate(&self, format: ReportFormat) -> Result<Report> {
        let now = Utc::now();
        let content = self.content(now.with_timezone(&Local)).await;
        let (format, bytes) = self.render(format, &content)?;

        let stamp = now.with_timezone(&Local).format("%Y%m%d%H%M%S%3f").to_string();
        let (filename, file_path) = self.create(&stamp, format, &bytes).await?;
        info!("generated {} report {}", format, file_path.display());

        Ok(Report {
            download_url: format!("{}{}", DOWNLOAD_URL_PREFIX, filename),
            filename,
            format,
            generated_at: now.timestamp_millis(),
            file_path,
        })
    }

    /// list returns the reports sorted by modification time, newest first. A
    /// missing directory holds no reports.
    pub async fn list(&self) -> Result<Vec<ReportEntry>> {
        let mut dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let modified = metadata
                .modified()
                .map(|modified| DateTime::<Utc>::from(modified).timestamp_millis())
                .unwrap_or_default();
            entries.push(ReportEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: metadata.len(),
                modified,
            });
        }

        entries.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(entries)
    }

    /// open returns a report by name. Names that could leave the report
    /// directory are reported as not found.
    pub async fn open(&self, filename: &str) -> Result<ReportFile> {
        if !is_plain_filename(filename) {
            debug!("rejected report name {:?}", filename);
            return Err(Error::ReportNotFound(filename.to_string()));
        }

        let path = self.dir.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(Error::ReportNotFound(filename.to_string())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::ReportNotFound(filename.to_string()))
            }
            Err(err) => return Err(err.into()),
        }

        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::ReportNotFound(filename.to_string()))
            }
            Err(err) => return Err(err.into()),
        };

        let content_type = if filename.ends_with(".pdf") {
            ReportFormat::Pdf.content_type()
        } else if filename.ends_with(".txt") {
            ReportFormat::Text.content_type()
        } else {
            "application/octet-stream"
        };

        Ok(ReportFile {
            filename: filename.to_string(),
            content_type,
            content,
        })
    }

    /// render encodes the content, falling back to text when pdf fails or is
    /// not configured.
    fn render(
        &self,
        format: ReportFormat,
        content: &ReportContent,
    ) -> Result<(ReportFormat, Vec<u8>)> {
        if format == ReportFormat::Pdf {
            match &self.pdf {
                Some(pdf) => match pdf.render(content) {
                    Ok(bytes) => return Ok((pdf.format(), bytes)),
                    Err(err) => error!("render pdf report failed, falling back to text: {}", err),
                },
                None => debug!(
                    "{}, rendering text",
                    Error::BackendUnavailable(ReportFormat::Pdf.to_string())
                ),
            }
        }

        Ok((self.text.format(), self.text.render(content)?))
    }

    /// create writes bytes to a new file named from stamp. Files are created
    /// exclusively and a numeric suffix resolves collisions.
    async fn create(
        &self,
        stamp: &str,
        format: ReportFormat,
        bytes: &[u8],
    ) -> Result<(String, PathBuf)> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|err| {
            ExternalError::new(ErrorType::StorageError)
                .with_context(format!("create report dir {}", self.dir.display()))
                .with_cause(Box::new(err))
        })?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = match attempt {
                0 => format!("{}{}.{}", REPORT_PREFIX, stamp, format.extension()),
                n => format!("{}{}_{}.{}", REPORT_PREFIX, stamp, n, format.extension()),
            };

            let path = self.dir.join(&filename);
            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(ExternalError::new(ErrorType::StorageError)
                        .with_context(format!("create report {}", path.display()))
                        .with_cause(Box::new(err))
                        .into())
                }
            };

            if let Err(err) = async {
                file.write_all(bytes).await?;
                file.flush().await
            }
            .await
            {
                return Err(ExternalError::new(ErrorType::StorageError)
                    .with_context(format!("write report {}", path.display()))
                    .with_cause(Box::new(err))
                    .into());
            }

            return Ok((filename, path));
        }

        Err(Error::Unknown(format!(
            "no free report name for {} after {} attempts",
            stamp, MAX_NAME_ATTEMPTS
        )))
    }

    /// content gathers the sections of a report.
    async fn content(&self, now: DateTime<Local>) -> ReportContent {
        let system = self.system_info().await;
        let state = self.state.get().await;
        let weekly = summarize(&self.history.query(Range::Week).await);
        let recent = self.history.recent(RECENT_RECORDS).await;

        let mut content = ReportContent::default();
        content.title("Network Monitor Report");
        content.blank();
        content.text(format!("Generated at: {}", now.format(DISPLAY_TIME_FORMAT)));
        content.blank();

        content.heading("System Information");
        match system {
            Some(info) => {
                content.text(format!("Operating System: {}", info.os));
                content.text(format!("Hostname: {}", info.hostname));
                content.text(format!("CPU: {} ({} cores)", info.cpu, info.cpu_cores));
                content.text(format!("Memory: {}", format_bytes(info.memory_total)));
                content.text(format!("Uptime: {}", info.uptime));
            }
            None => content.text("System information unavailable"),
        }
        content.blank();

        content.heading("Current Network Statistics");
        content.text(format!(
            "Monitoring: {}",
            if state.monitoring { "active" } else { "stopped" }
        ));
        content.text(format!(
            "Interface: {}",
            state.interface.as_deref().unwrap_or("all")
        ));
        content.text(format!("Download: {:.2} Mbps", state.download_mbps));
        content.text(format!("Upload: {:.2} Mbps", state.upload_mbps));
        content.text(format!("Ping: {:.2} ms", state.ping_ms));
        content.text(format!("Peak Download: {:.2} Mbps", state.peak_download_mbps));
        content.text(format!("Peak Upload: {:.2} Mbps", state.peak_upload_mbps));
        content.blank();

        content.heading("Cumulative Totals");
        content.text(format!(
            "Total Download: {}",
            format_bytes(state.cumulative_download_bytes)
        ));
        content.text(format!(
            "Total Upload: {}",
            format_bytes(state.cumulative_upload_bytes)
        ));
        content.blank();

        content.heading("Weekly Summary");
        content.text(format!("Average Download: {:.2} Mbps", weekly.avg_download));
        content.text(format!("Average Upload: {:.2} Mbps", weekly.avg_upload));
        content.text(format!("Average Ping: {:.2} ms", weekly.avg_ping));
        content.text(format!("Total Download: {}", format_bytes(weekly.total_download)));
        content.text(format!("Total Upload: {}", format_bytes(weekly.total_upload)));
        content.text(format!("Samples: {}", weekly.samples));
        content.blank();

        content.heading("Recent History");
        if recent.is_empty() {
            content.text("No history recorded");
        }
        for record in recent {
            content.text(format!(
                "{}  down {:.2} Mbps  up {:.2} Mbps  ping {:.2} ms",
                display_millis(record.timestamp),
                record.download_mbps,
                record.upload_mbps,
                record.ping_ms
            ));
        }
        content.blank();

        content.text(format!("Generated by netpulse v{}", CARGO_PKG_VERSION));
        content
    }

    /// system_info reads the host off the runtime threads. Failures leave the
    /// section empty.
    async fn system_info(&self) -> Option<SystemInfo> {
        let system = self.system.clone();
        match tokio::task::spawn_blocking(move || system.system_info()).await {
            Ok(Ok(info)) => Some(info),
            Ok(Err(err)) => {
                error!("get system info failed: {}", err);
                None
            }
            Err(err) => {
                error!("system info task failed: {}", err);
                None
            }
        }
    }
}

/// is_plain_filename returns true for a single, non-hidden path component.
fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.starts_with('.')
        && !filename.contains(['/', '\\'])
        && !filename.contains("..")
}

/// display_millis formats a millisecond timestamp in local time.
fn display_millis(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format(DISPLAY_TIME_FORMAT).to_string(),
        None => millis.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpulse_storage::{now_millis, HistoryRecord};
    use tempfile::{tempdir, TempDir};

    struct StaticSystemInfo;

    impl SystemInfoProvider for StaticSystemInfo {
        fn system_info(&self) -> Result<SystemInfo> {
            Ok(SystemInfo {
                os: "Linux 6.1".to_string(),
                hostname: "probe-host".to_string(),
                cpu: "Test CPU".to_string(),
                cpu_cores: 4,
                memory_total: 8 * 1024 * 1024 * 1024,
                uptime: "01:02:03".to_string(),
                cpu_percent: 12.5,
                memory_percent: 40.0,
            })
        }
    }

    struct BrokenSystemInfo;

    impl SystemInfoProvider for BrokenSystemInfo {
        fn system_info(&self) -> Result<SystemInfo> {
            Err(Error::Unknown("no procfs".to_string()))
        }
    }

    struct BrokenPdf;

    impl ReportRenderer for BrokenPdf {
        fn format(&self) -> ReportFormat {
            ReportFormat::Pdf
        }

        fn render(&self, _content: &ReportContent) -> Result<Vec<u8>> {
            Err(Error::Unknown("font missing".to_string()))
        }
    }

    async fn generator(system: Arc<dyn SystemInfoProvider>) -> (TempDir, ReportGenerator) {
        let dir = tempdir().unwrap();
        let state = Arc::new(StateStore::new());
        state
            .update(|state| {
                state.download_mbps = 50.0;
                state.cumulative_download_bytes = 1536;
                state.cumulative_upload_bytes = 5 * 1024 * 1024;
            })
            .await;

        let history = Arc::new(HistoryLedger::new(dir.path().join("history.json")));
        let now = now_millis();
        for i in 0..12 {
            history
                .append(HistoryRecord {
                    timestamp: now - (12 - i) * 60_000,
                    download_mbps: i as f64,
                    upload_mbps: 1.0,
                    ping_ms: 20.0,
                    cumulative_download_bytes: 1024 * (i as u64 + 1),
                    cumulative_upload_bytes: 256 * (i as u64 + 1),
                })
                .await
                .unwrap();
        }

        let generator = ReportGenerator::new(dir.path().join("reports"), state, history, system);
        (dir, generator)
    }

    #[test]
    fn should_parse_report_format() {
        assert_eq!("pdf".parse::<ReportFormat>().unwrap(), ReportFormat::Pdf);
        assert_eq!("TXT".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert_eq!("text".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert!(matches!(
            "docx".parse::<ReportFormat>(),
            Err(Error::ValidationError(_))
        ));
        assert_eq!(
            serde_json::to_value(ReportFormat::Text).unwrap(),
            serde_json::json!("text")
        );
    }

    #[test]
    fn should_reject_unsafe_filenames() {
        assert!(is_plain_filename("network_report_20250101120000000.txt"));
        assert!(!is_plain_filename(""));
        assert!(!is_plain_filename("../x"));
        assert!(!is_plain_filename(".."));
        assert!(!is_plain_filename(".hidden"));
        assert!(!is_plain_filename("a/b.txt"));
        assert!(!is_plain_filename("a\\b.txt"));
    }

    #[tokio::test]
    async fn should_downgrade_pdf_to_text_without_backend() {
        let (_dir, generator) = generator(Arc::new(StaticSystemInfo)).await;
        let report = generator.generate(ReportFormat::Pdf).await.unwrap();

        assert_eq!(report.format, ReportFormat::Text);
        assert!(report.file_path.exists());
        assert!(report.filename.starts_with(REPORT_PREFIX));
        assert!(report.filename.ends_with(".txt"));
        assert_eq!(
            report.download_url,
            format!("/api/download-report/{}", report.filename)
        );

        let text = tokio::fs::read_to_string(&report.file_path).await.unwrap();
        assert!(text.contains("NETWORK MONITOR REPORT"));
        assert!(text.contains("Hostname: probe-host"));
        assert!(text.contains("Memory: 8.00 GB"));
        assert!(text.contains("Download: 50.00 Mbps"));
        assert!(text.contains("Total Download: 1.50 KB"));
        assert!(text.contains("Total Upload: 5.00 MB"));
        assert!(text.contains("Samples: 12"));
        assert!(text.contains(&format!("Generated by netpulse v{}", CARGO_PKG_VERSION)));
    }

    #[tokio::test]
    async fn should_list_ten_recent_records_in_order() {
        let (_dir, generator) = generator(Arc::new(StaticSystemInfo)).await;
        let report = generator.generate(ReportFormat::Text).await.unwrap();
        let text = tokio::fs::read_to_string(&report.file_path).await.unwrap();

        let rows: Vec<&str> = text.lines().filter(|line| line.contains("  down ")).collect();
        assert_eq!(rows.len(), RECENT_RECORDS);
        assert!(rows[0].contains("down 2.00 Mbps"));
        assert!(rows[9].contains("down 11.00 Mbps"));
    }

    #[tokio::test]
    async fn should_write_pdf_with_backend() {
        let (_dir, generator) = generator(Arc::new(StaticSystemInfo)).await;
        let generator = generator.with_pdf(Arc::new(PdfRenderer));
        let report = generator.generate(ReportFormat::Pdf).await.unwrap();

        assert_eq!(report.format, ReportFormat::Pdf);
        assert!(report.filename.ends_with(".pdf"));
        let content = tokio::fs::read(&report.file_path).await.unwrap();
        assert!(content.starts_with(b"%PDF-1.4"));
    }

    #[tokio::test]
    async fn should_fall_back_to_text_when_pdf_fails() {
        let (_dir, generator) = generator(Arc::new(BrokenSystemInfo)).await;
        let generator = generator.with_pdf(Arc::new(BrokenPdf));
        let report = generator.generate(ReportFormat::Pdf).await.unwrap();

        assert_eq!(report.format, ReportFormat::Text);
        let text = tokio::fs::read_to_string(&report.file_path).await.unwrap();
        assert!(text.contains("System information unavailable"));
    }

    #[tokio::test]
    async fn should_suffix_colliding_names() {
        let (_dir, generator) = generator(Arc::new(StaticSystemInfo)).await;
        let stamp = "20250101120000000";
        let (first, _) = generator
            .create(stamp, ReportFormat::Text, b"a")
            .await
            .unwrap();
        let (second, _) = generator
            .create(stamp, ReportFormat::Text, b"b")
            .await
            .unwrap();

        assert_eq!(first, "network_report_20250101120000000.txt");
        assert_eq!(second, "network_report_20250101120000000_1.txt");
    }

    #[tokio::test]
    async fn should_list_and_open_reports() {
        let (_dir, generator) = generator(Arc::new(StaticSystemInfo)).await;
        assert!(generator.list().await.unwrap().is_empty());

        let first = generator.generate(ReportFormat::Text).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let second = generator.generate(ReportFormat::Text).await.unwrap();

        let entries = generator.list().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].modified >= entries[1].modified);
        assert_eq!(entries[0].name, second.filename);
        assert_eq!(entries[1].name, first.filename);
        assert!(entries[0].size > 0);

        let file = generator.open(&first.filename).await.unwrap();
        assert_eq!(file.content_type, "text/plain; charset=utf-8");
        assert!(!file.content.is_empty());

        assert!(matches!(
            generator.open("../history.json").await,
            Err(Error::ReportNotFound(_))
        ));
        assert!(matches!(
            generator.open("network_report_missing.txt").await,
            Err(Error::ReportNotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_not_open_directories() {
        let (_dir, generator) = generator(Arc::new(StaticSystemInfo)).await;
        std::fs::create_dir_all(generator.dir().join("network_report_dir.txt")).unwrap();

        assert!(matches!(
            generator.open("network_report_dir.txt").await,
            Err(Error::ReportNotFound(_))
        ));
    }
}
