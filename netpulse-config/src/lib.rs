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

use std::path::PathBuf;

pub mod netpulsed;

/// NAME is the name of the package.
pub const NAME: &str = "netpulse";

/// CARGO_PKG_VERSION is the version of the cargo package.
pub const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// home_dir returns the home directory of the current user, or the working
/// directory when it can not be resolved.
#[allow(dead_code)]
fn home_dir() -> PathBuf {
    home::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// default_config_dir is the default config directory for netpulse.
pub fn default_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    return PathBuf::from("/etc/netpulse/");

    #[cfg(not(target_os = "linux"))]
    return home_dir().join(".netpulse").join("config");
}

/// default_data_dir is the default directory of the history ledger and reports.
pub fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    return PathBuf::from("/var/lib/netpulse/");

    #[cfg(not(target_os = "linux"))]
    return home_dir().join(".netpulse").join("data");
}

/// default_log_dir is the default log directory for netpulse.
pub fn default_log_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    return PathBuf::from("/var/log/netpulse/");

    #[cfg(not(target_os = "linux"))]
    return home_dir().join(".netpulse").join("logs");
}
