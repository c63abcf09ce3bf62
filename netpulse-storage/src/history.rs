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

use crate::{now_millis, MILLIS_PER_DAY};
use netpulse_core::{
    error::{ErrorType, ExternalError, OrErr},
    Error, Result,
};
use netpulse_util::fs::write_replace;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// HistoryRecord is one persisted sample of the ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,

    pub download_mbps: f64,

    pub upload_mbps: f64,

    pub ping_ms: f64,

    /// Running total of downloaded bytes at the time of the record.
    pub cumulative_download_bytes: u64,

    /// Running total of uploaded bytes at the time of the record.
    pub cumulative_upload_bytes: u64,
}

/// Range is a named window of history relative to now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    #[default]
    Day,
    Week,
    Month,
}

impl Range {
    /// days returns the length of the window in days.
    pub fn days(&self) -> i64 {
        match self {
            Range::Day => 1,
            Range::Week => 7,
            Range::Month => 30,
        }
    }

    /// cutoff_millis returns the oldest timestamp inside the window ending at now.
    pub fn cutoff_millis(&self, now: i64) -> i64 {
        now - self.days() * MILLIS_PER_DAY
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Range::Day => "day",
            Range::Week => "week",
            Range::Month => "month",
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Range {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(Range::Day),
            "week" => Ok(Range::Week),
            "month" => Ok(Range::Month),
            _ => Err(Error::ValidationError(format!(
                "invalid range {}, expected day, week or month",
                s
            ))),
        }
    }
}

/// HistoryLedger is the ordered, persisted sequence of history records.
///
/// The sampler is the only writer. Records are kept in non-decreasing
/// timestamp order, which lets range lookups and pruning use binary search.
/// Every change rewrites the whole file.
pub struct HistoryLedger {
    /// path is the path of the ledger file.
    path: PathBuf,

    /// records are the records in timestamp order.
    records: RwLock<Vec<HistoryRecord>>,
}

impl HistoryLedger {
    /// new returns an empty ledger persisted at path.
    pub fn new(path: PathBuf) -> HistoryLedger {
        HistoryLedger {
            path,
            records: RwLock::new(Vec::new()),
        }
    }

    /// load reads the ledger from path, an absent file yields an empty ledger.
    #[instrument(skip_all)]
    pub async fn load(path: PathBuf) -> Result<HistoryLedger> {
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("history {} not found, starting empty", path.display());
                return Ok(Self::new(path));
            }
            Err(err) => return Err(err.into()),
        };

        let mut records: Vec<HistoryRecord> =
            serde_json::from_slice(&content).or_context(ErrorType::SerializeError, "decode history")?;
        records.sort_by_key(|record| record.timestamp);

        info!(
            "history {} loaded with {} records",
            path.display(),
            records.len()
        );
        Ok(HistoryLedger {
            path,
            records: RwLock::new(records),
        })
    }

    /// path returns the path of the ledger file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// append adds a record to the tail and persists the ledger. A record older
    /// than the current tail takes the tail timestamp. The record stays in
    /// memory when persisting fails.
    #[instrument(skip_all)]
    pub async fn append(&self, mut record: HistoryRecord) -> Result<()> {
        {
            let mut records = self.records.write().await;
            if let Some(last) = records.last() {
                if record.timestamp < last.timestamp {
                    warn!(
                        "history record timestamp {} is older than tail {}, clamping",
                        record.timestamp, last.timestamp
                    );
                    record.timestamp = last.timestamp;
                }
            }

            records.push(record);
        }

        debug!("history record appended at {}", record.timestamp);
        self.persist().await
    }

    /// prune removes records older than retention_days and returns the number
    /// of removed records.
    pub async fn prune(&self, retention_days: u32) -> Result<usize> {
        self.prune_at(retention_days, now_millis()).await
    }

    /// prune_at removes records with a timestamp before
    /// `now - retention_days`, persisting only when something was removed.
    #[instrument(skip_all)]
    pub async fn prune_at(&self, retention_days: u32, now: i64) -> Result<usize> {
        let cutoff = now - retention_days as i64 * MILLIS_PER_DAY;
        let removed = {
            let mut records = self.records.write().await;
            let index = records.partition_point(|record| record.timestamp < cutoff);
            records.drain(..index);
            index
        };

        if removed == 0 {
            return Ok(0);
        }

        info!("history pruned {} records older than {}", removed, cutoff);
        self.persist().await?;
        Ok(removed)
    }

    /// query returns the records inside range, oldest first.
    pub async fn query(&self, range: Range) -> Vec<HistoryRecord> {
        self.query_at(range, now_millis()).await
    }

    /// query_at returns the records with a timestamp at or after the range
    /// cutoff relative to now, oldest first.
    pub async fn query_at(&self, range: Range, now: i64) -> Vec<HistoryRecord> {
        let cutoff = range.cutoff_millis(now);
        let records = self.records.read().await;
        let index = records.partition_point(|record| record.timestamp < cutoff);
        records[index..].to_vec()
    }

    /// recent returns the n newest records, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<HistoryRecord> {
        let records = self.records.read().await;
        records[records.len().saturating_sub(n)..].to_vec()
    }

    /// len returns the number of records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// is_empty returns true if the ledger holds no record.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// persist rewrites the ledger file from the in-memory records.
    async fn persist(&self) -> Result<()> {
        let content = {
            let records = self.records.read().await;
            serde_json::to_vec(&*records).or_context(ErrorType::SerializeError, "encode history")?
        };

        write_replace(&self.path, &content).await.map_err(|err| {
            Error::ExternalError(
                ExternalError::new(ErrorType::StorageError)
                    .with_context(format!("write history {}", self.path.display()))
                    .with_cause(Box::new(err)),
            )
        })
    }
}
