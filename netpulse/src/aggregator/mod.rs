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

use netpulse_storage::HistoryRecord;
use serde::{Deserialize, Serialize};

/// Summary is the aggregate of a set of history records.
///
/// Averages are arithmetic means over the records. Totals are the running
/// counters of the newest record, since each record already carries the total
/// transferred since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub avg_download: f64,

    pub avg_upload: f64,

    pub avg_ping: f64,

    pub total_download: u64,

    pub total_upload: u64,

    /// Number of summarized records.
    pub samples: usize,
}

/// summarize aggregates records, an empty slice yields an all-zero summary.
pub fn summarize(records: &[HistoryRecord]) -> Summary {
    let Some(latest) = records.iter().max_by_key(|record| record.timestamp) else {
        return Summary::default();
    };

    let count = records.len() as f64;
    let (download, upload, ping) = records.iter().fold((0.0, 0.0, 0.0), |acc, record| {
        (
            acc.0 + record.download_mbps,
            acc.1 + record.upload_mbps,
            acc.2 + record.ping_ms,
        )
    });

    Summary {
        avg_download: download / count,
        avg_upload: upload / count,
        avg_ping: ping / count,
        total_download: latest.cumulative_download_bytes,
        total_upload: latest.cumulative_upload_bytes,
        samples: records.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: i64, download: f64, upload: f64, cumulative: u64) -> HistoryRecord {
        HistoryRecord {
            timestamp,
            download_mbps: download,
            upload_mbps: upload,
            ping_ms: 20.0,
            cumulative_download_bytes: cumulative,
            cumulative_upload_bytes: cumulative / 4,
        }
    }

    #[test]
    fn should_summarize_empty_records() {
        let summary = summarize(&[]);
        assert_eq!(summary, Summary::default());
        assert_eq!(summary.avg_download, 0.0);
        assert_eq!(summary.total_download, 0);

        let value = serde_json::to_value(summary).unwrap();
        assert_eq!(value["avgDownload"], 0.0);
        assert_eq!(value["avgUpload"], 0.0);
        assert_eq!(value["totalDownload"], 0);
        assert_eq!(value["totalUpload"], 0);
    }

    #[test]
    fn should_average_speeds() {
        let summary = summarize(&[
            record(1, 10.0, 1.0, 100),
            record(2, 20.0, 2.0, 200),
            record(3, 30.0, 6.0, 300),
        ]);

        assert_eq!(summary.avg_download, 20.0);
        assert_eq!(summary.avg_upload, 3.0);
        assert_eq!(summary.avg_ping, 20.0);
        assert_eq!(summary.samples, 3);
    }

    #[test]
    fn should_take_totals_from_newest_record() {
        // Out of order on purpose, totals come from the max timestamp and are
        // never summed.
        let records = [
            record(3_000, 10.0, 1.0, 9_000),
            record(1_000, 10.0, 1.0, 1_000),
            record(2_000, 10.0, 1.0, 4_000),
        ];

        let summary = summarize(&records);
        assert_eq!(summary.total_download, 9_000);
        assert_eq!(summary.total_upload, 2_250);
        assert_ne!(
            summary.total_download,
            records
                .iter()
                .map(|record| record.cumulative_download_bytes)
                .sum::<u64>()
        );
    }

    #[test]
    fn should_summarize_single_record() {
        let summary = summarize(&[record(5, 42.0, 4.2, 1_024)]);
        assert_eq!(summary.avg_download, 42.0);
        assert_eq!(summary.avg_upload, 4.2);
        assert_eq!(summary.total_download, 1_024);
        assert_eq!(summary.total_upload, 256);
    }
}
