// SPDX-License-Identifier: MPL-2.0

//! # Hardware Monitoring
//!
//! [`HardwareMonitor`] owns one collector per component and produces a
//! complete [`Metrics`] snapshot on every call to
//! [`HardwareMonitor::get_all_metrics`].
//!
//! Each poll refreshes the shared sources once (the `sysinfo` system and
//! thermal lists, and on Windows the LibreHardwareMonitor sensor table) and
//! passes them to every collector. Any value a sensor cannot provide is
//! `None`; collection itself never fails.

pub mod cpu;
pub mod gpu;
pub mod hwmon;
pub mod lhm;
pub mod network;
pub mod ram;
pub mod thermal;

pub use cpu::{CpuCollector, CpuMetrics};
pub use gpu::{GpuCollector, GpuMetrics};
pub use network::{NetworkCollector, NetworkMetrics};
pub use ram::{RamCollector, RamMetrics};

use serde::Serialize;
use std::path::PathBuf;
use sysinfo::System;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected value {value:?} in {path}")]
    Parse { path: PathBuf, value: String },
    #[error("{0} exited unsuccessfully")]
    Command(&'static str),
    #[error("{0} not available")]
    Unavailable(&'static str),
    #[cfg(feature = "nvidia")]
    #[error("NVML: {0}")]
    Nvml(#[from] nvml_wrapper::error::NvmlError),
    #[cfg(windows)]
    #[error("WMI: {0}")]
    Wmi(#[from] wmi::WMIError),
}

/// One complete reading of every component.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub cpu: CpuMetrics,
    pub gpu: GpuMetrics,
    pub ram: RamMetrics,
    pub network: NetworkMetrics,
}

pub struct HardwareMonitor {
    system: System,
    thermal: thermal::ThermalSensors,
    lhm: lhm::LhmSource,
    cpu: CpuCollector,
    gpu: GpuCollector,
    ram: RamCollector,
    network: NetworkCollector,
}

impl HardwareMonitor {
    pub fn new() -> Self {
        let mut system = System::new();
        let cpu = CpuCollector::new(&mut system);
        let monitor = Self {
            thermal: thermal::ThermalSensors::new(),
            lhm: lhm::LhmSource::new(),
            cpu,
            gpu: GpuCollector::detect(),
            ram: RamCollector::new(),
            network: NetworkCollector::new(),
            system,
        };
        log::info!("Hardware monitor initialised");
        monitor
    }

    pub fn get_all_metrics(&mut self) -> Metrics {
        let readings = self.thermal.snapshot();
        let lhm = self.lhm.sensors();

        Metrics {
            cpu: self.cpu.collect(&mut self.system, &readings, &lhm),
            gpu: self.gpu.collect(&readings, &lhm),
            ram: self.ram.collect(&mut self.system, &readings, &lhm),
            network: self.network.collect(&lhm),
        }
    }
}

impl Default for HardwareMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_serialize_missing_values_as_null() {
        let json = serde_json::to_value(Metrics::default()).unwrap();
        assert!(json["cpu"]["usage"].is_null());
        assert!(json["network"]["total_received"].is_null());
    }

    #[test]
    fn live_snapshot_has_memory_figures() {
        let mut monitor = HardwareMonitor::new();
        let metrics = monitor.get_all_metrics();
        assert!(metrics.cpu.usage.is_some());
        if let Some(percent) = metrics.ram.percent {
            assert!((0.0..=100.0).contains(&percent));
        }
    }
}
