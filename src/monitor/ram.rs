// SPDX-License-Identifier: MPL-2.0

//! Memory usage and DIMM temperature.

use super::lhm::{self, LhmSensor};
use super::thermal::{self, TempReading};
use serde::Serialize;
use std::time::{Duration, Instant};
use sysinfo::System;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// DIMM sensors change slowly and are expensive to find.
pub const TEMPERATURE_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RamMetrics {
    pub total_gb: Option<f64>,
    pub used_gb: Option<f64>,
    pub available_gb: Option<f64>,
    pub percent: Option<f64>,
    pub temperature: Option<f64>,
}

/// Memory figures converted from bytes.
pub fn memory_metrics(total: u64, used: u64, available: u64) -> RamMetrics {
    if total == 0 {
        return RamMetrics::default();
    }
    RamMetrics {
        total_gb: Some(total as f64 / BYTES_PER_GB),
        used_gb: Some(used as f64 / BYTES_PER_GB),
        available_gb: Some(available as f64 / BYTES_PER_GB),
        percent: Some(used as f64 / total as f64 * 100.0),
        temperature: None,
    }
}

pub struct RamCollector {
    cached_temperature: Option<(Instant, Option<f64>)>,
    ttl: Duration,
}

impl RamCollector {
    pub fn new() -> Self {
        Self::with_ttl(TEMPERATURE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cached_temperature: None,
            ttl,
        }
    }

    pub fn collect(
        &mut self,
        system: &mut System,
        readings: &[TempReading],
        lhm: &[LhmSensor],
    ) -> RamMetrics {
        system.refresh_memory();
        let mut metrics = memory_metrics(
            system.total_memory(),
            system.used_memory(),
            system.available_memory(),
        );
        metrics.temperature = self.temperature(readings, lhm);
        metrics
    }

    fn temperature(&mut self, readings: &[TempReading], lhm: &[LhmSensor]) -> Option<f64> {
        if let Some((at, value)) = self.cached_temperature {
            if at.elapsed() < self.ttl {
                return value;
            }
        }
        let value = lhm::ram_temperature(lhm).or_else(|| thermal::ram_temperature(readings));
        self.cached_temperature = Some((Instant::now(), value));
        value
    }
}

impl Default for RamCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_convert_to_gigabytes() {
        let gb = 1024 * 1024 * 1024;
        let ram = memory_metrics(16 * gb, 4 * gb, 12 * gb);
        assert_eq!(ram.total_gb, Some(16.0));
        assert_eq!(ram.used_gb, Some(4.0));
        assert_eq!(ram.available_gb, Some(12.0));
        assert_eq!(ram.percent, Some(25.0));
    }

    #[test]
    fn zero_total_is_unavailable() {
        assert_eq!(memory_metrics(0, 0, 0), RamMetrics::default());
    }

    #[test]
    fn temperature_is_cached_until_ttl() {
        let mut collector = RamCollector::new();
        let first = vec![TempReading::new("jc42 temp1", 40.0)];
        let second = vec![TempReading::new("jc42 temp1", 45.0)];

        assert_eq!(collector.temperature(&first, &[]), Some(40.0));
        assert_eq!(collector.temperature(&second, &[]), Some(40.0));

        let mut uncached = RamCollector::with_ttl(Duration::ZERO);
        assert_eq!(uncached.temperature(&first, &[]), Some(40.0));
        assert_eq!(uncached.temperature(&second, &[]), Some(45.0));
    }
}
