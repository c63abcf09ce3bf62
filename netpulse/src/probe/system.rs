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

use super::{Measurement, MetricsProbe};
use netpulse_core::{Error, Result};
use netpulse_util::humanize::megabits_per_second;
use netpulse_util::sysinfo::network::TrafficMeter;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::debug;

/// SystemProbe derives throughput from the interface byte counters and
/// latency from the time to open a TCP connection to a target.
pub struct SystemProbe {
    /// meter holds the counters of the previous reading.
    meter: Mutex<TrafficMeter>,

    /// ping_target is the host:port used to measure latency.
    ping_target: String,

    /// ping_timeout bounds the latency measurement.
    ping_timeout: Duration,
}

impl SystemProbe {
    /// DEFAULT_PING_TIMEOUT is the default timeout of the latency measurement.
    const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(3);

    pub fn new(ping_target: String) -> Self {
        Self {
            meter: Mutex::new(TrafficMeter::new()),
            ping_target,
            ping_timeout: Self::DEFAULT_PING_TIMEOUT,
        }
    }

    /// with_ping_timeout overrides the latency timeout.
    pub fn with_ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.ping_timeout = ping_timeout;
        self
    }

    /// ping returns the TCP connect time to the ping target in milliseconds.
    async fn ping(&self) -> Result<f64> {
        let start = Instant::now();
        match timeout(self.ping_timeout, TcpStream::connect(&self.ping_target)).await {
            Ok(Ok(_)) => Ok(start.elapsed().as_secs_f64() * 1000.0),
            Ok(Err(err)) => Err(Error::ProbeFailed(format!(
                "connect {} failed: {}",
                self.ping_target, err
            ))),
            Err(_) => Err(Error::ProbeFailed(format!(
                "connect {} timed out after {:?}",
                self.ping_target, self.ping_timeout
            ))),
        }
    }
}

#[async_trait::async_trait]
impl MetricsProbe for SystemProbe {
    async fn measure(&self, interface: Option<&str>) -> Result<Measurement> {
        let traffic = {
            let mut meter = self
                .meter
                .lock()
                .map_err(|err| Error::Unknown(format!("traffic meter lock poisoned: {}", err)))?;
            meter.sample(interface)?
        };

        let ping_ms = self.ping().await?;
        let measurement = Measurement {
            download_mbps: megabits_per_second(traffic.received, traffic.elapsed),
            upload_mbps: megabits_per_second(traffic.transmitted, traffic.elapsed),
            ping_ms,
        };

        debug!("system probe measurement {:?}", measurement);
        Ok(measurement)
    }

    fn server(&self) -> String {
        self.ping_target.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn should_measure_against_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((_stream, _)) = listener.accept().await {}
        });

        let probe = SystemProbe::new(addr.to_string());
        let measurement = probe.measure(None).await.unwrap();
        assert!(measurement.ping_ms >= 0.0);
        assert!(measurement.download_mbps >= 0.0);
        assert!(measurement.upload_mbps >= 0.0);
        assert_eq!(probe.server(), addr.to_string());
    }

    #[tokio::test]
    async fn should_fail_when_target_refuses() {
        // Bind then drop to get a port with no listener.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe =
            SystemProbe::new(addr.to_string()).with_ping_timeout(Duration::from_millis(500));
        let err = probe.measure(None).await.unwrap_err();
        assert!(matches!(err, Error::ProbeFailed(_)));
    }

    #[tokio::test]
    async fn should_fail_for_unknown_interface() {
        let probe = SystemProbe::new("127.0.0.1:9".to_string());
        let err = probe.measure(Some("does-not-exist0")).await.unwrap_err();
        assert!(matches!(err, Error::ProbeFailed(_)));
    }
}
