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

use netpulse_core::{Error, Result};
use pnet::datalink::{self, NetworkInterface};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use sysinfo::Networks;
use tracing::debug;

/// InterfaceKind is a coarse classification of a network interface by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterfaceKind {
    Wireless,
    Wired,
    Other,
}

impl InterfaceKind {
    /// from_name classifies an interface by its name: `wl`/`wi` are wireless,
    /// `eth`/`en` are wired.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("wl") || name.contains("wi") {
            InterfaceKind::Wireless
        } else if name.contains("eth") || name.contains("en") {
            InterfaceKind::Wired
        } else {
            InterfaceKind::Other
        }
    }
}

/// InterfaceInfo describes one network interface of the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInfo {
    pub name: String,

    /// First IPv4 address, or the first address of any family.
    pub ip: Option<String>,

    pub mac: Option<String>,

    /// `up` or `down`.
    pub status: String,

    #[serde(rename = "type")]
    pub kind: InterfaceKind,
}

impl From<&NetworkInterface> for InterfaceInfo {
    fn from(interface: &NetworkInterface) -> Self {
        let ip = interface
            .ips
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| interface.ips.first())
            .map(|ip| ip.ip().to_string());

        InterfaceInfo {
            name: interface.name.clone(),
            ip,
            mac: interface.mac.map(|mac| mac.to_string()),
            status: if interface.is_up() { "up" } else { "down" }.to_string(),
            kind: InterfaceKind::from_name(&interface.name),
        }
    }
}

/// list_interfaces returns the non-loopback interfaces of the host.
pub fn list_interfaces() -> Vec<InterfaceInfo> {
    datalink::interfaces()
        .iter()
        .filter(|interface| !interface.is_loopback())
        .map(InterfaceInfo::from)
        .collect()
}

/// TrafficSample is the traffic observed on an interface between two refreshes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrafficSample {
    /// Bytes received since the previous refresh.
    pub received: u64,

    /// Bytes transmitted since the previous refresh.
    pub transmitted: u64,

    /// Time between the two refreshes.
    pub elapsed: Duration,
}

/// TrafficMeter measures interface byte counters between successive calls.
pub struct TrafficMeter {
    networks: Networks,
    last_refresh: Instant,
}

impl TrafficMeter {
    /// new creates a meter whose first sample covers the time since creation.
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
            last_refresh: Instant::now(),
        }
    }

    /// sample refreshes the counters and returns the traffic since the previous
    /// call. Without an interface name, all non-loopback interfaces are summed.
    pub fn sample(&mut self, interface: Option<&str>) -> Result<TrafficSample> {
        self.networks.refresh();
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refresh);
        self.last_refresh = now;

        match interface {
            Some(name) => {
                let data = self.networks.get(name).ok_or_else(|| {
                    Error::ProbeFailed(format!("interface {} not found", name))
                })?;

                Ok(TrafficSample {
                    received: data.received(),
                    transmitted: data.transmitted(),
                    elapsed,
                })
            }
            None => {
                let mut sample = TrafficSample {
                    elapsed,
                    ..Default::default()
                };

                for (name, data) in self.networks.iter() {
                    if is_loopback_name(name) {
                        continue;
                    }

                    sample.received += data.received();
                    sample.transmitted += data.transmitted();
                }

                debug!(
                    "traffic sample rx {} tx {} over {:?}",
                    sample.received, sample.transmitted, elapsed
                );
                Ok(sample)
            }
        }
    }
}

impl Default for TrafficMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// is_loopback_name reports whether an interface name is a loopback device.
fn is_loopback_name(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.starts_with("Loopback")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_kind_from_name() {
        let test_cases = vec![
            ("wlan0", InterfaceKind::Wireless),
            ("wlp3s0", InterfaceKind::Wireless),
            ("Wi-Fi", InterfaceKind::Wireless),
            ("eth0", InterfaceKind::Wired),
            ("enp0s31f6", InterfaceKind::Wired),
            ("docker0", InterfaceKind::Other),
            ("tun0", InterfaceKind::Other),
        ];

        for (name, expected) in test_cases {
            assert_eq!(InterfaceKind::from_name(name), expected, "{}", name);
        }
    }

    #[test]
    fn test_is_loopback_name() {
        assert!(is_loopback_name("lo"));
        assert!(is_loopback_name("lo0"));
        assert!(!is_loopback_name("eth0"));
        assert!(!is_loopback_name("low0x"));
    }

    #[test]
    fn should_fail_sampling_unknown_interface() {
        let mut meter = TrafficMeter::new();
        let err = meter.sample(Some("does-not-exist0")).unwrap_err();
        assert!(matches!(err, Error::ProbeFailed(_)));
    }

    #[test]
    fn should_serialize_interface_info() {
        let info = InterfaceInfo {
            name: "eth0".to_string(),
            ip: Some("10.0.0.2".to_string()),
            mac: None,
            status: "up".to_string(),
            kind: InterfaceKind::Wired,
        };

        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["type"], "Wired");
        assert_eq!(value["ip"], "10.0.0.2");
        assert!(value["mac"].is_null());
    }
}
