// SPDX-License-Identifier: MPL-2.0

//! # Thermal Sensors
//!
//! Temperatures come from the `sysinfo` component list (Linux hwmon). The list
//! is refreshed once per poll and handed to every collector as a plain
//! snapshot of `(label, °C)` readings, so label matching stays testable.
//!
//! ## Sensor Labels by Vendor
//!
//! - **Intel CPU**: "coretemp" driver, labels like "Package id 0", "Core 0"
//! - **AMD CPU**: "k10temp" driver, labels like "Tctl", "Tdie", "Tccd1"
//! - **NVIDIA GPU**: "nvidia" driver, label "GPU"
//! - **AMD GPU**: "amdgpu" driver, labels "edge", "junction", "mem"
//! - **DIMMs**: "jc42" or "spd5118" drivers

use sysinfo::Components;

/// CPU package sensors, preferred over per-core readings.
const CPU_PACKAGE_LABELS: &[&str] = &["package", "tctl", "tdie"];
const CPU_LABELS: &[&str] = &["cpu", "core"];
const GPU_LABELS: &[&str] = &["gpu", "nvidia", "amdgpu", "radeon", "edge"];
const RAM_LABELS: &[&str] = &["jc42", "spd5118", "dimm", "ram", "memory"];

/// One temperature reading.
#[derive(Debug, Clone, PartialEq)]
pub struct TempReading {
    pub label: String,
    pub celsius: f64,
}

impl TempReading {
    pub fn new(label: impl Into<String>, celsius: f64) -> Self {
        Self {
            label: label.into(),
            celsius,
        }
    }

    fn label_contains(&self, needle: &str) -> bool {
        self.label.to_lowercase().contains(needle)
    }
}

pub struct ThermalSensors {
    components: Components,
}

impl ThermalSensors {
    pub fn new() -> Self {
        Self {
            components: Components::new_with_refreshed_list(),
        }
    }

    /// Refresh every sensor and return the valid readings.
    pub fn snapshot(&mut self) -> Vec<TempReading> {
        self.components.refresh();

        let mut readings = Vec::new();
        for component in &self.components {
            let celsius = component.temperature() as f64;
            if celsius.is_finite() && celsius > 0.0 {
                readings.push(TempReading::new(component.label(), celsius));
            }
        }
        readings
    }
}

impl Default for ThermalSensors {
    fn default() -> Self {
        Self::new()
    }
}

/// First reading whose label contains one of `needles`; earlier needles win.
pub fn pick(readings: &[TempReading], needles: &[&str]) -> Option<f64> {
    needles.iter().find_map(|needle| {
        readings
            .iter()
            .find(|reading| reading.label_contains(needle))
            .map(|reading| reading.celsius)
    })
}

fn is_gpu(reading: &TempReading) -> bool {
    GPU_LABELS.iter().any(|needle| reading.label_contains(needle))
}

pub fn cpu_temperature(readings: &[TempReading]) -> Option<f64> {
    let cpu_only: Vec<TempReading> = readings.iter().filter(|r| !is_gpu(r)).cloned().collect();
    pick(&cpu_only, CPU_PACKAGE_LABELS).or_else(|| pick(&cpu_only, CPU_LABELS))
}

pub fn gpu_temperature(readings: &[TempReading]) -> Option<f64> {
    pick(readings, GPU_LABELS)
}

pub fn ram_temperature(readings: &[TempReading]) -> Option<f64> {
    let non_gpu: Vec<TempReading> = readings.iter().filter(|r| !is_gpu(r)).cloned().collect();
    pick(&non_gpu, RAM_LABELS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings() -> Vec<TempReading> {
        vec![
            TempReading::new("nvme Composite", 38.0),
            TempReading::new("coretemp Core 0", 51.0),
            TempReading::new("coretemp Package id 0", 55.0),
            TempReading::new("amdgpu edge", 47.0),
            TempReading::new("amdgpu mem", 60.0),
            TempReading::new("spd5118 temp1", 41.5),
        ]
    }

    #[test]
    fn cpu_prefers_package_sensor() {
        assert_eq!(cpu_temperature(&readings()), Some(55.0));
    }

    #[test]
    fn cpu_falls_back_to_core_sensor() {
        let readings = vec![
            TempReading::new("coretemp Core 1", 49.0),
            TempReading::new("coretemp Core 0", 51.0),
        ];
        assert_eq!(cpu_temperature(&readings), Some(49.0));
    }

    #[test]
    fn amd_tctl_counts_as_package() {
        let readings = vec![
            TempReading::new("k10temp Tccd1", 44.0),
            TempReading::new("k10temp Tctl", 62.0),
        ];
        assert_eq!(cpu_temperature(&readings), Some(62.0));
    }

    #[test]
    fn gpu_memory_sensor_is_not_ram() {
        assert_eq!(gpu_temperature(&readings()), Some(47.0));
        assert_eq!(ram_temperature(&readings()), Some(41.5));

        let gpu_only = vec![TempReading::new("amdgpu mem", 60.0)];
        assert_eq!(ram_temperature(&gpu_only), None);
    }

    #[test]
    fn nothing_matches_on_empty_list() {
        assert_eq!(cpu_temperature(&[]), None);
        assert_eq!(gpu_temperature(&[]), None);
    }
}
