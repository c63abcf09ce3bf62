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

use netpulse_storage::{now_millis, HistoryRecord};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// CurrentState is the latest reading of the sampler plus its running totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentState {
    pub download_mbps: f64,

    pub upload_mbps: f64,

    pub ping_ms: f64,

    /// Bytes downloaded since the last reset.
    pub cumulative_download_bytes: u64,

    /// Bytes uploaded since the last reset.
    pub cumulative_upload_bytes: u64,

    /// Highest download speed since the last reset.
    pub peak_download_mbps: f64,

    /// Highest upload speed since the last reset.
    pub peak_upload_mbps: f64,

    /// Whether the sampler is running.
    pub monitoring: bool,

    /// Interface sampled by the current run, all interfaces when unset.
    pub interface: Option<String>,

    /// Milliseconds since the unix epoch of the last tick or reset.
    pub last_update: Option<i64>,
}

impl CurrentState {
    /// to_record captures the sample fields as a history record.
    pub fn to_record(&self, timestamp: i64) -> HistoryRecord {
        HistoryRecord {
            timestamp,
            download_mbps: self.download_mbps,
            upload_mbps: self.upload_mbps,
            ping_ms: self.ping_ms,
            cumulative_download_bytes: self.cumulative_download_bytes,
            cumulative_upload_bytes: self.cumulative_upload_bytes,
        }
    }
}

/// StateStore owns the current state. Writers are serialized and readers
/// always see a whole snapshot.
#[derive(Debug, Default)]
pub struct StateStore {
    state: RwLock<CurrentState>,
}

impl StateStore {
    /// new returns a store with an all-zero state.
    pub fn new() -> Self {
        Self::default()
    }

    /// get returns a snapshot of the current state.
    pub async fn get(&self) -> CurrentState {
        self.state.read().await.clone()
    }

    /// update applies mutation under the write lock and returns the resulting
    /// snapshot.
    pub async fn update<F>(&self, mutation: F) -> CurrentState
    where
        F: FnOnce(&mut CurrentState),
    {
        let mut state = self.state.write().await;
        mutation(&mut state);
        state.clone()
    }

    /// reset zeroes the readings, totals and peaks and stamps the update time.
    /// The monitoring flag and interface are kept.
    #[instrument(skip_all)]
    pub async fn reset(&self) -> CurrentState {
        let state = self
            .update(|state| {
                *state = CurrentState {
                    monitoring: state.monitoring,
                    interface: state.interface.take(),
                    last_update: Some(now_millis()),
                    ..Default::default()
                };
            })
            .await;

        info!("statistics reset");
        state
    }

    /// set_monitoring records whether the sampler runs and which interface it
    /// samples.
    pub async fn set_monitoring(&self, monitoring: bool, interface: Option<String>) {
        self.update(|state| {
            state.monitoring = monitoring;
            state.interface = interface;
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn should_reset_all_metrics() {
        let store = StateStore::new();
        store.set_monitoring(true, Some("eth0".to_string())).await;
        store
            .update(|state| {
                state.download_mbps = 50.0;
                state.upload_mbps = 10.0;
                state.ping_ms = 20.0;
                state.cumulative_download_bytes = 1_000;
                state.cumulative_upload_bytes = 200;
                state.peak_download_mbps = 60.0;
                state.peak_upload_mbps = 12.0;
                state.last_update = Some(1);
            })
            .await;

        let before = now_millis();
        store.reset().await;
        let state = store.get().await;

        assert_eq!(state.download_mbps, 0.0);
        assert_eq!(state.upload_mbps, 0.0);
        assert_eq!(state.ping_ms, 0.0);
        assert_eq!(state.cumulative_download_bytes, 0);
        assert_eq!(state.cumulative_upload_bytes, 0);
        assert_eq!(state.peak_download_mbps, 0.0);
        assert_eq!(state.peak_upload_mbps, 0.0);
        assert!(state.monitoring);
        assert_eq!(state.interface.as_deref(), Some("eth0"));

        let last_update = state.last_update.unwrap();
        assert!(last_update >= before && last_update <= now_millis());
    }

    #[tokio::test]
    async fn should_never_observe_torn_state() {
        let store = Arc::new(StateStore::new());

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 1..=500u64 {
                    store
                        .update(|state| {
                            state.cumulative_download_bytes = i;
                            state.cumulative_upload_bytes = i * 2;
                        })
                        .await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let state = store.get().await;
                    assert_eq!(
                        state.cumulative_upload_bytes,
                        state.cumulative_download_bytes * 2
                    );
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(store.get().await.cumulative_download_bytes, 500);
    }

    #[test]
    fn should_convert_state_to_record() {
        let state = CurrentState {
            download_mbps: 50.0,
            upload_mbps: 10.0,
            ping_ms: 20.0,
            cumulative_download_bytes: 75_000_000,
            cumulative_upload_bytes: 15_000_000,
            ..Default::default()
        };

        let record = state.to_record(42);
        assert_eq!(record.timestamp, 42);
        assert_eq!(record.download_mbps, 50.0);
        assert_eq!(record.cumulative_download_bytes, 75_000_000);
        assert_eq!(record.cumulative_upload_bytes, 15_000_000);
    }
}
