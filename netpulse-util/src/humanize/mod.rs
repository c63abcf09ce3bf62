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

use std::time::Duration;

/// BYTE_UNITS are the units used by format_bytes, each 1024 times the previous.
const BYTE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// format_bytes renders a byte count with two decimals in the largest unit
/// that keeps the value below 1024, stopping at PB. Zero renders as `0 B`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", value, BYTE_UNITS[unit])
}

/// format_hms renders a duration as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// megabits_per_second converts a byte count observed over elapsed into Mbps.
pub fn megabits_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }

    (bytes as f64 * 8.0) / 1_000_000.0 / secs
}

/// bytes_for_speed returns how many bytes a link running at mbps moves in
/// elapsed.
pub fn bytes_for_speed(mbps: f64, elapsed: Duration) -> f64 {
    mbps * 1_000_000.0 / 8.0 * elapsed.as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        let test_cases = vec![
            (0u64, "0 B"),
            (512, "512.00 B"),
            (1023, "1023.00 B"),
            (1024, "1.00 KB"),
            (1536, "1.50 KB"),
            (5 * 1024 * 1024, "5.00 MB"),
            (3 * 1024 * 1024 * 1024, "3.00 GB"),
            (1024u64.pow(4), "1.00 TB"),
            (1024u64.pow(5), "1.00 PB"),
            (2048 * 1024u64.pow(5), "2048.00 PB"),
        ];

        for (input, expected) in test_cases {
            assert_eq!(format_bytes(input), expected);
        }
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_hms(Duration::from_secs(3661)), "01:01:01");
        assert_eq!(format_hms(Duration::from_secs(90_000)), "25:00:00");
    }

    #[test]
    fn test_speed_conversions() {
        assert_eq!(
            megabits_per_second(1_250_000, Duration::from_secs(1)),
            10.0
        );
        assert_eq!(megabits_per_second(1_000, Duration::ZERO), 0.0);
        assert_eq!(bytes_for_speed(50.0, Duration::from_secs(12)), 75_000_000.0);
        assert_eq!(bytes_for_speed(0.0, Duration::from_secs(5)), 0.0);
    }
}
