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

use netpulse_config::netpulsed::{Config, ProbeKind};
use netpulse_core::Result;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::info;

pub mod system;

/// Measurement is one instantaneous reading of the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub download_mbps: f64,

    pub upload_mbps: f64,

    pub ping_ms: f64,
}

/// MetricsProbe supplies readings to the sampler.
#[async_trait::async_trait]
pub trait MetricsProbe: Send + Sync {
    /// measure takes one reading, restricted to interface when given.
    async fn measure(&self, interface: Option<&str>) -> Result<Measurement>;

    /// server names the endpoint the probe measures against.
    fn server(&self) -> String;
}

/// new_probe returns the probe selected by the configuration.
pub fn new_probe(config: &Config) -> Arc<dyn MetricsProbe> {
    info!("metrics probe {:?}", config.probe);
    match config.probe {
        ProbeKind::System => Arc::new(system::SystemProbe::new(config.ping_target.clone())),
        ProbeKind::Simulated => Arc::new(SimulatedProbe::new()),
    }
}

/// FixedProbe always returns the same reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedProbe {
    measurement: Measurement,
}

impl FixedProbe {
    pub fn new(download_mbps: f64, upload_mbps: f64, ping_ms: f64) -> Self {
        Self {
            measurement: Measurement {
                download_mbps,
                upload_mbps,
                ping_ms,
            },
        }
    }
}

#[async_trait::async_trait]
impl MetricsProbe for FixedProbe {
    async fn measure(&self, _interface: Option<&str>) -> Result<Measurement> {
        Ok(self.measurement)
    }

    fn server(&self) -> String {
        "fixed".to_string()
    }
}

/// SimulatedProbe produces readings scattered around typical broadband
/// values: download 73-78 Mbps, upload 7.2-9.2 Mbps, ping 20-30 ms.
#[derive(Debug)]
pub struct SimulatedProbe {
    rng: Mutex<fastrand::Rng>,
}

impl SimulatedProbe {
    /// new returns a probe seeded from the system.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// with_seed returns a probe with a reproducible sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    fn next(&self) -> Measurement {
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };

        Measurement {
            download_mbps: 75.5 + (rng.f64() * 5.0 - 2.5),
            upload_mbps: 8.2 + (rng.f64() * 2.0 - 1.0),
            ping_ms: 20.0 + rng.f64() * 10.0,
        }
    }
}

impl Default for SimulatedProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl MetricsProbe for SimulatedProbe {
    async fn measure(&self, _interface: Option<&str>) -> Result<Measurement> {
        Ok(self.next())
    }

    fn server(&self) -> String {
        "simulated".to_string()
    }
}
