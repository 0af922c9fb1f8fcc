// SPDX-License-Identifier: MPL-2.0

//! # LibreHardwareMonitor Sensors
//!
//! On Windows, LibreHardwareMonitor publishes every sensor it knows through
//! WMI in the `root\LibreHardwareMonitor` namespace. One query per poll
//! fetches the whole table; the matchers below pick values out of it.
//!
//! The matchers are plain functions over [`LhmSensor`] rows so they work
//! (and are tested) on every platform. Elsewhere the table is simply empty.
//!
//! Identifiers look like `/intelcpu/0/temperature/0`, `/nvidiagpu/0/load/0`
//! or `/nic/{GUID}/data/1`.

use super::gpu::GpuMetrics;
use serde::Deserialize;

const MB_PER_GB: f64 = 1024.0;

/// One row of the `Sensor` WMI class.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LhmSensor {
    pub name: String,
    pub sensor_type: String,
    pub value: f32,
    pub identifier: String,
    pub parent: String,
}

impl LhmSensor {
    pub fn new(name: &str, sensor_type: &str, value: f32, identifier: &str) -> Self {
        let parent = identifier
            .rsplitn(3, '/')
            .nth(2)
            .unwrap_or_default()
            .to_string();
        Self {
            name: name.to_string(),
            sensor_type: sensor_type.to_string(),
            value,
            identifier: identifier.to_string(),
            parent,
        }
    }

    fn is(&self, sensor_type: &str) -> bool {
        self.sensor_type.eq_ignore_ascii_case(sensor_type)
    }

    fn named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
    }

    fn value(&self) -> Option<f64> {
        let value = self.value as f64;
        value.is_finite().then_some(value)
    }

    fn is_gpu(&self) -> bool {
        let id = self.identifier.to_lowercase();
        id.contains("/nvidiagpu/")
            || id.contains("/amdgpu/")
            || id.contains("/intelgpu/")
            || self.name_contains("gpu")
    }

    fn is_cpu(&self) -> bool {
        let id = self.identifier.to_lowercase();
        id.contains("/intelcpu/") || id.contains("/amdcpu/")
    }
}

/// First sensor of `sensor_type` whose name equals one of `names`, honouring
/// the order of `names`.
fn find_named<'a>(
    sensors: &'a [LhmSensor],
    sensor_type: &str,
    names: &[&str],
) -> Option<&'a LhmSensor> {
    names.iter().find_map(|name| {
        sensors
            .iter()
            .find(|sensor| sensor.is(sensor_type) && sensor.named(name))
    })
}

// ============================================================================
// CPU
// ============================================================================

pub fn cpu_temperature(sensors: &[LhmSensor]) -> Option<f64> {
    find_named(sensors, "Temperature", &["CPU Package", "Core (Tctl/Tdie)"])
        .or_else(|| {
            sensors.iter().find(|s| {
                s.is("Temperature") && !s.is_gpu() && (s.is_cpu() || s.name_contains("cpu"))
            })
        })
        .and_then(LhmSensor::value)
}

pub fn cpu_voltage(sensors: &[LhmSensor]) -> Option<f64> {
    find_named(sensors, "Voltage", &["CPU Core", "CPU VCORE", "Vcore"])
        .and_then(LhmSensor::value)
}

/// Core clock in MHz.
pub fn cpu_clock(sensors: &[LhmSensor]) -> Option<f64> {
    find_named(sensors, "Clock", &["CPU Core #1", "Core #1"])
        .or_else(|| {
            sensors
                .iter()
                .find(|s| s.is("Clock") && s.is_cpu() && s.name_contains("core"))
        })
        .and_then(LhmSensor::value)
}

pub fn cpu_load(sensors: &[LhmSensor]) -> Option<f64> {
    find_named(sensors, "Load", &["CPU Total"]).and_then(LhmSensor::value)
}

// ============================================================================
// GPU
// ============================================================================

/// Everything LHM knows about the first GPU it reports.
pub fn gpu_metrics(sensors: &[LhmSensor]) -> GpuMetrics {
    let gpu: Vec<LhmSensor> = sensors.iter().filter(|s| s.is_gpu()).cloned().collect();
    let value = |sensor_type: &str, names: &[&str]| {
        find_named(&gpu, sensor_type, names).and_then(LhmSensor::value)
    };

    let vram_used_gb = value("SmallData", &["GPU Memory Used", "D3D Dedicated Memory Used"])
        .map(|mb| mb / MB_PER_GB);
    let vram_total_gb = value("SmallData", &["GPU Memory Total"]).map(|mb| mb / MB_PER_GB);

    GpuMetrics {
        core_usage: value("Load", &["GPU Core", "D3D 3D", "GPU D3D 3D"]),
        core_temperature: value("Temperature", &["GPU Core"]),
        core_frequency: value("Clock", &["GPU Core"]),
        memory_frequency: value("Clock", &["GPU Memory"]),
        memory_temperature: value("Temperature", &["GPU Memory Junction", "GPU Memory"]),
        hotspot_temperature: value("Temperature", &["GPU Hot Spot"]),
        vram_usage_percent: value("Load", &["GPU Memory"]),
        vram_used_gb,
        vram_total_gb,
        fan_speed: value("Control", &["GPU Fan", "GPU Fan 1"]),
    }
}

// ============================================================================
// RAM and Network
// ============================================================================

pub fn ram_temperature(sensors: &[LhmSensor]) -> Option<f64> {
    sensors
        .iter()
        .find(|s| {
            s.is("Temperature")
                && !s.is_gpu()
                && (s.name_contains("ram")
                    || s.name_contains("memory")
                    || s.name_contains("dimm")
                    || s.identifier.to_lowercase().contains("/memory/"))
        })
        .and_then(LhmSensor::value)
}

/// `(sent, received)` totals in GB summed over all adapters.
pub fn network_totals(sensors: &[LhmSensor]) -> Option<(f64, f64)> {
    let mut sent = None;
    let mut received = None;
    for sensor in sensors.iter().filter(|s| s.is("Data")) {
        let Some(value) = sensor.value() else {
            continue;
        };
        if sensor.named("Data Uploaded") {
            *sent.get_or_insert(0.0) += value;
        } else if sensor.named("Data Downloaded") {
            *received.get_or_insert(0.0) += value;
        }
    }
    Some((sent?, received?))
}

// ============================================================================
// WMI Source
// ============================================================================

/// Fetches the sensor table once per poll.
#[derive(Debug, Default)]
pub struct LhmSource {
    /// Set once a query fails so the warning is logged only once.
    #[allow(dead_code)]
    reported_unavailable: bool,
}

impl LhmSource {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(windows)]
    pub fn sensors(&mut self) -> Vec<LhmSensor> {
        match query_sensors() {
            Ok(sensors) => {
                self.reported_unavailable = false;
                sensors
            }
            Err(err) => {
                if !self.reported_unavailable {
                    log::warn!("LibreHardwareMonitor sensors unavailable: {}", err);
                    self.reported_unavailable = true;
                }
                Vec::new()
            }
        }
    }

    #[cfg(not(windows))]
    pub fn sensors(&mut self) -> Vec<LhmSensor> {
        Vec::new()
    }
}

#[cfg(windows)]
fn query_sensors() -> Result<Vec<LhmSensor>, super::MonitorError> {
    use wmi::{COMLibrary, WMIConnection};

    thread_local! {
        // COM stays initialised for the lifetime of the polling thread.
        static COM: Option<COMLibrary> = COMLibrary::new().ok();
    }

    let com_con = COM
        .with(|com| *com)
        .ok_or(super::MonitorError::Unavailable("COM"))?;
    let wmi_con =
        WMIConnection::with_namespace_path("root\\LibreHardwareMonitor", com_con.into())?;
    let sensors: Vec<LhmSensor> = wmi_con
        .raw_query("SELECT Name, SensorType, Value, Identifier, Parent FROM Sensor")?;
    Ok(sensors)
}
