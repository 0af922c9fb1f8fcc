// SPDX-License-Identifier: MPL-2.0

//! CPU usage, temperature, clock and core voltage.
//!
//! Usage and clock come from `sysinfo`. When LibreHardwareMonitor is
//! available its readings take precedence and `sysinfo` only fills the gaps.

use super::hwmon;
use super::lhm::{self, LhmSensor};
use super::thermal::{self, TempReading};
use serde::Serialize;
use std::path::PathBuf;
use sysinfo::System;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CpuMetrics {
    /// Percent, 0-100
    pub usage: Option<f64>,
    /// Celsius
    pub temperature: Option<f64>,
    /// MHz
    pub frequency: Option<f64>,
    /// Volts
    pub voltage: Option<f64>,
    pub model: Option<String>,
}

/// Static facts parsed from `/proc/cpuinfo`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CpuInfo {
    pub model: Option<String>,
    pub mhz: Option<f64>,
}

/// Parse the first processor block of `/proc/cpuinfo`.
pub fn parse_cpuinfo(text: &str) -> CpuInfo {
    let mut info = CpuInfo::default();
    for line in text.lines() {
        if line.trim().is_empty() && (info.model.is_some() || info.mhz.is_some()) {
            break;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "model name" if info.model.is_none() && !value.is_empty() => {
                info.model = Some(value.to_string());
            }
            "cpu MHz" if info.mhz.is_none() => {
                info.mhz = value.parse::<f64>().ok().filter(|mhz| *mhz > 0.0);
            }
            _ => {}
        }
    }
    info
}

pub struct CpuCollector {
    base: CpuInfo,
    hwmon_root: PathBuf,
}

impl CpuCollector {
    pub fn new(system: &mut System) -> Self {
        // sysinfo needs a previous sample to compute usage.
        system.refresh_cpu_all();

        let mut base = std::fs::read_to_string("/proc/cpuinfo")
            .map(|text| parse_cpuinfo(&text))
            .unwrap_or_default();
        if base.model.is_none() {
            base.model = system
                .cpus()
                .first()
                .map(|cpu| cpu.brand().trim().to_string())
                .filter(|brand| !brand.is_empty());
        }
        log::info!(
            "CPU: {}",
            base.model.as_deref().unwrap_or("unknown model")
        );

        Self {
            base,
            hwmon_root: PathBuf::from(hwmon::HWMON_ROOT),
        }
    }

    pub fn collect(
        &mut self,
        system: &mut System,
        readings: &[TempReading],
        lhm: &[LhmSensor],
    ) -> CpuMetrics {
        system.refresh_cpu_all();

        let usage = system.global_cpu_usage() as f64;
        let cpus = system.cpus();
        let frequency = if cpus.is_empty() {
            None
        } else {
            let mean = cpus.iter().map(|cpu| cpu.frequency() as f64).sum::<f64>() / cpus.len() as f64;
            (mean > 0.0).then_some(mean)
        };

        CpuMetrics {
            usage: lhm::cpu_load(lhm).or(Some(usage)),
            temperature: lhm::cpu_temperature(lhm).or_else(|| thermal::cpu_temperature(readings)),
            frequency: lhm::cpu_clock(lhm).or(frequency).or(self.base.mhz),
            voltage: lhm::cpu_voltage(lhm).or_else(|| hwmon::cpu_voltage(&self.hwmon_root)),
            model: self.base.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPUINFO: &str = "\
processor\t: 0
vendor_id\t: GenuineIntel
model name\t: Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz
cpu MHz\t\t: 3700.012
cache size\t: 12288 KB

processor\t: 1
model name\t: ignored
cpu MHz\t\t: 800.000
";

    #[test]
    fn cpuinfo_uses_first_processor() {
        let info = parse_cpuinfo(CPUINFO);
        assert_eq!(
            info.model.as_deref(),
            Some("Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz")
        );
        assert_eq!(info.mhz, Some(3700.012));
    }

    #[test]
    fn cpuinfo_without_clock() {
        // Some ARM kernels publish neither field.
        let info = parse_cpuinfo("processor\t: 0\nBogoMIPS\t: 48.00\n");
        assert_eq!(info, CpuInfo::default());
    }

    #[test]
    fn collect_reports_usage_and_model() {
        let mut system = System::new();
        let mut collector = CpuCollector::new(&mut system);
        collector.base.model = Some("Test CPU".to_string());

        let lhm = vec![LhmSensor::new("CPU Total", "Load", 42.0, "/intelcpu/0/load/0")];
        let metrics = collector.collect(&mut system, &[TempReading::new("Package id 0", 50.0)], &lhm);

        assert_eq!(metrics.usage, Some(42.0));
        assert_eq!(metrics.temperature, Some(50.0));
        assert_eq!(metrics.model.as_deref(), Some("Test CPU"));
    }
}
