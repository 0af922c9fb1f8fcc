// SPDX-License-Identifier: MPL-2.0

//! Network throughput and lifetime totals, summed over all interfaces.

use super::lhm::{self, LhmSensor};
use serde::Serialize;
use std::time::Instant;
use sysinfo::Networks;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkMetrics {
    /// MB/s
    pub upload_speed: Option<f64>,
    /// MB/s
    pub download_speed: Option<f64>,
    /// GB since boot
    pub total_sent: Option<f64>,
    /// GB since boot
    pub total_received: Option<f64>,
}

/// Byte counters at one point in time.
#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    sent: u64,
    received: u64,
}

/// MB/s between two counter values; a counter that went backwards
/// (interface reset) counts as no traffic.
pub fn rate_mb_per_sec(previous: u64, current: u64, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    current.saturating_sub(previous) as f64 / elapsed_secs / BYTES_PER_MB
}

pub struct NetworkCollector {
    networks: Networks,
    last: Sample,
}

impl NetworkCollector {
    pub fn new() -> Self {
        let networks = Networks::new_with_refreshed_list();
        let (sent, received) = totals(&networks);
        Self {
            networks,
            last: Sample {
                at: Instant::now(),
                sent,
                received,
            },
        }
    }

    pub fn collect(&mut self, lhm: &[LhmSensor]) -> NetworkMetrics {
        self.networks.refresh();
        let now = Instant::now();
        let (sent, received) = totals(&self.networks);
        let elapsed = now.duration_since(self.last.at).as_secs_f64();

        let metrics = if (&self.networks).into_iter().next().is_none() {
            // No interfaces visible; fall back to LHM's adapter totals.
            let totals = lhm::network_totals(lhm);
            NetworkMetrics {
                total_sent: totals.map(|(sent, _)| sent),
                total_received: totals.map(|(_, received)| received),
                ..NetworkMetrics::default()
            }
        } else {
            NetworkMetrics {
                upload_speed: Some(rate_mb_per_sec(self.last.sent, sent, elapsed)),
                download_speed: Some(rate_mb_per_sec(self.last.received, received, elapsed)),
                total_sent: Some(sent as f64 / BYTES_PER_GB),
                total_received: Some(received as f64 / BYTES_PER_GB),
            }
        };

        self.last = Sample {
            at: now,
            sent,
            received,
        };
        metrics
    }
}

impl Default for NetworkCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn totals(networks: &Networks) -> (u64, u64) {
    let mut sent = 0u64;
    let mut received = 0u64;
    for (_interface_name, data) in networks {
        sent = sent.saturating_add(data.total_transmitted());
        received = received.saturating_add(data.total_received());
    }
    (sent, received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_megabytes_per_second() {
        let mb = 1024 * 1024;
        assert_eq!(rate_mb_per_sec(0, 3 * mb, 2.0), 1.5);
    }

    #[test]
    fn rate_guards_against_resets_and_zero_time() {
        assert_eq!(rate_mb_per_sec(500, 100, 1.0), 0.0);
        assert_eq!(rate_mb_per_sec(0, 100, 0.0), 0.0);
    }

    #[test]
    fn collector_reports_non_negative_speeds() {
        let mut collector = NetworkCollector::new();
        let metrics = collector.collect(&[]);
        for speed in [metrics.upload_speed, metrics.download_speed].into_iter().flatten() {
            assert!(speed >= 0.0);
        }
    }
}
