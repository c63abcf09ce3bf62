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

use crate::probe::MetricsProbe;
use crate::state::StateStore;
use netpulse_config::netpulsed::{Config, ConfigManager};
use netpulse_core::{Error, Result};
use netpulse_storage::{now_millis, HistoryLedger};
use netpulse_util::humanize::bytes_for_speed;
use netpulse_util::shutdown::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

/// PRUNE_PROBABILITY is the chance that a history append is followed by a
/// retention prune.
pub const PRUNE_PROBABILITY: f64 = 0.1;

/// Run is the handle of a spawned sampling loop.
#[derive(Default)]
struct Run {
    /// shutdown stops the loop, unset once stop has been requested.
    shutdown: Option<Shutdown>,

    /// handle is the task of the loop, kept after stop until it is joined.
    handle: Option<JoinHandle<()>>,
}

/// Sampler drives the periodic sampling loop. At most one loop runs at a time.
pub struct Sampler {
    /// config is the configuration manager of netpulsed.
    config: Arc<ConfigManager>,

    /// state is the store of the current state.
    state: Arc<StateStore>,

    /// history is the ledger written by the loop.
    history: Arc<HistoryLedger>,

    /// probe supplies the readings.
    probe: Arc<dyn MetricsProbe>,

    /// prune_probability is the chance that an append is followed by a prune.
    prune_probability: f64,

    /// run is the handle of the current or last loop.
    run: Mutex<Run>,
}

impl Sampler {
    /// new returns a stopped sampler.
    pub fn new(
        config: Arc<ConfigManager>,
        state: Arc<StateStore>,
        history: Arc<HistoryLedger>,
        probe: Arc<dyn MetricsProbe>,
    ) -> Self {
        Self {
            config,
            state,
            history,
            probe,
            prune_probability: PRUNE_PROBABILITY,
            run: Mutex::new(Run::default()),
        }
    }

    /// with_prune_probability overrides the chance of a prune after an append,
    /// clamped to 0.0..=1.0.
    pub fn with_prune_probability(mut self, probability: f64) -> Self {
        self.prune_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// start spawns the sampling loop and returns without waiting for a tick.
    /// An empty or absent interface falls back to the configured one.
    #[instrument(skip_all)]
    pub async fn start(&self, interface: Option<String>) -> Result<()> {
        let mut run = self.run.lock().await;
        if run.shutdown.is_some() {
            return Err(Error::AlreadyRunning);
        }

        // A loop that was asked to stop may still be finishing its tick, wait
        // for it so the ledger keeps a single writer.
        if let Some(handle) = run.handle.take() {
            if let Err(err) = handle.await {
                error!("previous sampling loop failed: {}", err);
            }
        }

        let interface = match interface.filter(|name| !name.trim().is_empty()) {
            Some(name) => Some(name),
            None => self.config.get().await.selected_interface,
        };

        let shutdown = Shutdown::new();
        let worker = Worker {
            config: self.config.clone(),
            state: self.state.clone(),
            history: self.history.clone(),
            probe: self.probe.clone(),
            interface: interface.clone(),
            prune_probability: self.prune_probability,
            shutdown: shutdown.clone(),
        };

        self.state.set_monitoring(true, interface.clone()).await;
        run.handle = Some(tokio::spawn(async move { worker.run().await }));
        run.shutdown = Some(shutdown);

        info!(
            "sampler started on interface {}",
            interface.as_deref().unwrap_or("all")
        );
        Ok(())
    }

    /// stop asks the loop to end and returns immediately. The loop finishes at
    /// most its current tick.
    #[instrument(skip_all)]
    pub async fn stop(&self) -> Result<()> {
        let mut run = self.run.lock().await;
        let Some(shutdown) = run.shutdown.take() else {
            return Err(Error::NotRunning);
        };

        shutdown.trigger();
        self.state.set_monitoring(false, None).await;
        info!("sampler stopping");
        Ok(())
    }

    /// is_running returns true between a start and the next stop.
    pub async fn is_running(&self) -> bool {
        self.run.lock().await.shutdown.is_some()
    }

    /// wait_stopped waits for a stopped loop to exit. It returns immediately
    /// when no loop exists and must not be used while running.
    pub async fn wait_stopped(&self) -> Result<()> {
        let handle = {
            let mut run = self.run.lock().await;
            if run.shutdown.is_some() {
                return Err(Error::AlreadyRunning);
            }

            run.handle.take()
        };

        if let Some(handle) = handle {
            handle.await?;
        }

        Ok(())
    }
}

/// Worker is the body of one sampling loop.
struct Worker {
    config: Arc<ConfigManager>,
    state: Arc<StateStore>,
    history: Arc<HistoryLedger>,
    probe: Arc<dyn MetricsProbe>,
    interface: Option<String>,
    prune_probability: f64,
    shutdown: Shutdown,
}

/// Clock tracks the timing of the previous tick and flush.
struct Clock {
    last_tick: Option<Instant>,
    last_flush: Instant,
}

impl Worker {
    /// run ticks until the shutdown signal is observed.
    async fn run(mut self) {
        let mut clock = Clock {
            last_tick: None,
            last_flush: Instant::now(),
        };

        loop {
            if self.shutdown.is_triggered() {
                break;
            }

            let config = self.config.get().await;
            let interval = config.sample_interval();
            self.tick(&config, interval, &mut clock).await;

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shutdown.recv() => {
                    break;
                }
            }
        }

        info!("sampling loop exited");
    }

    /// tick takes one reading, folds it into the current state and appends a
    /// history record once the flush interval has passed. Failures are logged
    /// and never end the loop.
    #[instrument(skip_all)]
    async fn tick(&self, config: &Config, interval: Duration, clock: &mut Clock) {
        let now = Instant::now();
        let elapsed = clock
            .last_tick
            .map(|last| now.duration_since(last))
            .unwrap_or(interval);
        clock.last_tick = Some(now);

        let measurement = match self.probe.measure(self.interface.as_deref()).await {
            Ok(measurement) => measurement,
            Err(err) => {
                error!("probe failed: {}", err);
                return;
            }
        };

        let download_bytes = bytes_for_speed(measurement.download_mbps, elapsed).round() as u64;
        let upload_bytes = bytes_for_speed(measurement.upload_mbps, elapsed).round() as u64;
        let timestamp = now_millis();
        let state = self
            .state
            .update(|state| {
                state.download_mbps = measurement.download_mbps;
                state.upload_mbps = measurement.upload_mbps;
                state.ping_ms = measurement.ping_ms;
                state.cumulative_download_bytes += download_bytes;
                state.cumulative_upload_bytes += upload_bytes;
                state.peak_download_mbps = state.peak_download_mbps.max(measurement.download_mbps);
                state.peak_upload_mbps = state.peak_upload_mbps.max(measurement.upload_mbps);
                state.last_update = Some(timestamp);
            })
            .await;
        debug!(
            "tick download {:.2} Mbps upload {:.2} Mbps ping {:.2} ms over {:?}",
            measurement.download_mbps, measurement.upload_mbps, measurement.ping_ms, elapsed
        );

        if clock.last_flush.elapsed() < config.history_flush_interval {
            return;
        }
        clock.last_flush = Instant::now();

        if let Err(err) = self.history.append(state.to_record(timestamp)).await {
            error!("append history failed: {}", err);
        }

        if fastrand::f64() < self.prune_probability {
            match self.history.prune(config.retention_days).await {
                Ok(removed) => debug!("pruned {} history records", removed),
                Err(err) => error!("prune history failed: {}", err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{FixedProbe, Measurement};
    use netpulse_storage::HistoryRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{tempdir, TempDir};

    /// FlakyProbe fails the first failures readings, then returns a fixed one.
    struct FlakyProbe {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MetricsProbe for FlakyProbe {
        async fn measure(&self, _interface: Option<&str>) -> Result<Measurement> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(Error::ProbeFailed("link down".to_string()));
            }

            Ok(Measurement {
                download_mbps: 8.0,
                upload_mbps: 8.0,
                ping_ms: 1.0,
            })
        }

        fn server(&self) -> String {
            "flaky".to_string()
        }
    }

    fn sampler_with(
        config: Config,
        probe: Arc<dyn MetricsProbe>,
    ) -> (TempDir, Arc<StateStore>, Arc<HistoryLedger>, Sampler) {
        let dir = tempdir().unwrap();
        let config = Arc::new(ConfigManager::with_config(
            dir.path().join("netpulsed.yaml"),
            config,
        ));
        let state = Arc::new(StateStore::new());
        let history = Arc::new(HistoryLedger::new(dir.path().join("history.json")));
        let sampler = Sampler::new(config, state.clone(), history.clone(), probe);
        (dir, state, history, sampler)
    }

    fn sampler_with_history(
        dir: &TempDir,
        config: Config,
        history: Arc<HistoryLedger>,
    ) -> (Arc<StateStore>, Sampler) {
        let config = Arc::new(ConfigManager::with_config(
            dir.path().join("netpulsed.yaml"),
            config,
        ));
        let state = Arc::new(StateStore::new());
        let sampler = Sampler::new(
            config,
            state.clone(),
            history,
            Arc::new(FixedProbe::new(10.0, 1.0, 1.0)),
        );
        (state, sampler)
    }

    fn config(interval: u64, flush: Duration) -> Config {
        Config {
            sample_interval_seconds: interval,
            history_flush_interval: flush,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_accumulate_fixed_probe_bytes() {
        let (_dir, state, _history, sampler) = sampler_with(
            config(5, Duration::from_secs(60)),
            Arc::new(FixedProbe::new(50.0, 10.0, 20.0)),
        );

        sampler.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_secs(12)).await;

        let current = state.get().await;
        assert!(current.monitoring);
        assert_eq!(current.download_mbps, 50.0);
        assert_eq!(current.ping_ms, 20.0);

        // 12 seconds at 50 Mbps is 75 MB, give or take one 5 second tick.
        let expected = bytes_for_speed(50.0, Duration::from_secs(12));
        let tick = bytes_for_speed(50.0, Duration::from_secs(5));
        let actual = current.cumulative_download_bytes as f64;
        assert!((actual - expected).abs() <= tick, "actual {}", actual);
        assert!(current.cumulative_upload_bytes > 0);

        sampler.stop().await.unwrap();
        sampler.wait_stopped().await.unwrap();
        assert!(!state.get().await.monitoring);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_cumulative_counters_non_decreasing() {
        let (_dir, state, _history, sampler) = sampler_with(
            config(1, Duration::from_secs(3600)),
            Arc::new(FixedProbe::new(1.0, 1.0, 1.0)),
        );

        sampler.start(None).await.unwrap();
        let mut previous = 0;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(700)).await;
            let current = state.get().await.cumulative_download_bytes;
            assert!(current >= previous);
            previous = current;
        }

        assert!(previous > 0);
        sampler.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_survive_probe_failures() {
        let probe = Arc::new(FlakyProbe {
            failures: 3,
            calls: AtomicUsize::new(0),
        });
        let (_dir, state, _history, sampler) =
            sampler_with(config(1, Duration::from_secs(3600)), probe.clone());

        sampler.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(state.get().await.cumulative_download_bytes, 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(probe.calls.load(Ordering::SeqCst) > 3);
        assert!(state.get().await.cumulative_download_bytes > 0);

        sampler.stop().await.unwrap();
        sampler.wait_stopped().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_second_start_and_stop_when_stopped() {
        let (_dir, state, _history, sampler) = sampler_with(
            config(5, Duration::from_secs(60)),
            Arc::new(FixedProbe::new(1.0, 1.0, 1.0)),
        );

        assert!(matches!(sampler.stop().await, Err(Error::NotRunning)));

        sampler.start(Some("eth0".to_string())).await.unwrap();
        assert!(matches!(
            sampler.start(None).await,
            Err(Error::AlreadyRunning)
        ));
        assert!(sampler.is_running().await);
        assert_eq!(state.get().await.interface.as_deref(), Some("eth0"));

        sampler.stop().await.unwrap();
        assert!(!sampler.is_running().await);
        assert!(matches!(sampler.stop().await, Err(Error::NotRunning)));

        // Restart after stop is allowed.
        sampler.start(None).await.unwrap();
        assert!(sampler.is_running().await);
        assert_eq!(state.get().await.interface, None);
        sampler.stop().await.unwrap();
        sampler.wait_stopped().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_within_one_interval() {
        let (_dir, state, _history, sampler) = sampler_with(
            config(5, Duration::from_secs(60)),
            Arc::new(FixedProbe::new(10.0, 1.0, 1.0)),
        );

        sampler.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        sampler.stop().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), sampler.wait_stopped())
            .await
            .unwrap()
            .unwrap();

        let stopped = state.get().await.cumulative_download_bytes;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(state.get().await.cumulative_download_bytes, stopped);
    }

    #[tokio::test]
    async fn should_flush_history_once_per_interval_with_single_loop() {
        let (_dir, _state, history, sampler) = sampler_with(
            config(1, Duration::from_millis(200)),
            Arc::new(FixedProbe::new(10.0, 1.0, 1.0)),
        );

        sampler.start(None).await.unwrap();
        assert!(sampler.start(None).await.is_err());

        // Ticks land at about 0s, 1s and 2s, the first one is before the
        // first flush is due.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        sampler.stop().await.unwrap();
        sampler.wait_stopped().await.unwrap();

        let records = history.recent(10).await;
        assert_eq!(records.len(), 2);
        assert!(records[0].timestamp <= records[1].timestamp);
        assert!(records[0].cumulative_download_bytes < records[1].cumulative_download_bytes);
        assert!(history.path().exists());
    }

    #[tokio::test]
    async fn should_prune_expired_records_after_flush() {
        let dir = tempdir().unwrap();
        let history = Arc::new(HistoryLedger::new(dir.path().join("history.json")));
        history
            .append(HistoryRecord {
                timestamp: 1,
                ..Default::default()
            })
            .await
            .unwrap();

        let (_state, sampler) = sampler_with_history(
            &dir,
            config(1, Duration::from_millis(10)),
            history.clone(),
        );
        let sampler = sampler.with_prune_probability(1.0);

        // The tick at about 1s flushes one record and prunes the expired one.
        sampler.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        sampler.stop().await.unwrap();
        sampler.wait_stopped().await.unwrap();

        let records = history.recent(10).await;
        assert_eq!(records.len(), 1);
        assert!(records[0].timestamp > 1);

        let stored = HistoryLedger::load(history.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(stored.recent(10).await, records);
    }

    #[tokio::test]
    async fn should_keep_sampling_when_history_flush_fails() {
        let dir = tempdir().unwrap();

        // A regular file where the ledger directory should be makes every
        // write fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let history = Arc::new(HistoryLedger::new(blocker.join("history.json")));

        let (state, sampler) =
            sampler_with_history(&dir, config(1, Duration::from_millis(10)), history.clone());
        let sampler = sampler.with_prune_probability(0.0);

        sampler.start(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let after_first_flush = state.get().await.cumulative_download_bytes;

        tokio::time::sleep(Duration::from_secs(1)).await;
        let after_second_flush = state.get().await.cumulative_download_bytes;

        assert!(sampler.is_running().await);
        assert!(after_second_flush > after_first_flush);
        assert_eq!(history.len().await, 2);
        assert!(!blocker.join("history.json").exists());

        sampler.stop().await.unwrap();
        sampler.wait_stopped().await.unwrap();
    }

    #[test]
    fn should_clamp_prune_probability() {
        let dir = tempdir().unwrap();
        let history = Arc::new(HistoryLedger::new(dir.path().join("history.json")));
        let (_state, sampler) =
            sampler_with_history(&dir, Config::default(), history.clone());
        assert_eq!(sampler.prune_probability, PRUNE_PROBABILITY);
        assert_eq!(sampler.with_prune_probability(2.0).prune_probability, 1.0);

        let (_state, sampler) = sampler_with_history(&dir, Config::default(), history);
        assert_eq!(sampler.with_prune_probability(-1.0).prune_probability, 0.0);
    }
}
