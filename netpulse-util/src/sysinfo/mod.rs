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

use crate::humanize::format_hms;
use netpulse_core::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

pub mod network;

/// SystemInfo is the identity and load of the host running the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    /// Operating system name and version.
    pub os: String,

    /// Host name of the machine.
    pub hostname: String,

    /// Brand string of the first CPU.
    pub cpu: String,

    /// Number of logical CPUs.
    pub cpu_cores: usize,

    /// Total physical memory in bytes.
    pub memory_total: u64,

    /// Host uptime formatted as HH:MM:SS.
    pub uptime: String,

    /// Global CPU usage percentage (0.0 - 100.0).
    pub cpu_percent: f64,

    /// Memory usage percentage (0.0 - 100.0).
    pub memory_percent: f64,
}

/// SystemInfoProvider supplies the system identity shown in reports and status
/// pages.
pub trait SystemInfoProvider: Send + Sync {
    /// system_info returns a fresh reading of the host.
    fn system_info(&self) -> Result<SystemInfo>;
}

/// HostSystemInfo reads the local host through sysinfo.
#[derive(Debug, Clone, Default)]
pub struct HostSystemInfo;

impl SystemInfoProvider for HostSystemInfo {
    fn system_info(&self) -> Result<SystemInfo> {
        let sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        let cpu = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let memory_total = sys.total_memory();
        let memory_percent = if memory_total == 0 {
            0.0
        } else {
            (sys.used_memory() as f64 / memory_total as f64) * 100.0
        };

        Ok(SystemInfo {
            os: System::long_os_version()
                .or_else(System::name)
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            cpu,
            cpu_cores: sys.cpus().len(),
            memory_total,
            uptime: format_hms(Duration::from_secs(System::uptime())),
            cpu_percent: sys.global_cpu_usage() as f64,
            memory_percent,
        })
    }
}
