// SPDX-License-Identifier: MPL-2.0

//! # GPU Monitoring
//!
//! One backend is chosen at startup. The detection order is:
//!
//! 1. **NVIDIA**: NVML (feature `nvidia`), then the `nvidia-smi` command
//! 2. **AMD**: `/sys/class/drm/card*/device` with vendor id `0x1002`
//!    (`gpu_busy_percent`, `mem_info_vram_*`, hwmon temperatures and clocks)
//! 3. **Intel**: current/max frequency ratio from the card's `gt_*_freq_mhz`
//!
//! Whatever the backend cannot provide is filled in from LibreHardwareMonitor
//! (Windows) and from the generic thermal sensor list.

use super::hwmon;
use super::lhm::{self, LhmSensor};
use super::thermal::{self, TempReading};
use super::MonitorError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const DRM_ROOT: &str = "/sys/class/drm";
const NVIDIA_SMI: &str = "nvidia-smi";

const AMD_VENDOR: u32 = 0x1002;
const INTEL_VENDOR: u32 = 0x8086;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB_PER_GB: f64 = 1024.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpuMetrics {
    /// Percent, 0-100
    pub core_usage: Option<f64>,
    /// Celsius
    pub core_temperature: Option<f64>,
    /// MHz
    pub core_frequency: Option<f64>,
    /// MHz
    pub memory_frequency: Option<f64>,
    pub memory_temperature: Option<f64>,
    pub hotspot_temperature: Option<f64>,
    /// Percent of VRAM in use
    pub vram_usage_percent: Option<f64>,
    pub vram_used_gb: Option<f64>,
    pub vram_total_gb: Option<f64>,
    /// Percent of maximum fan speed
    pub fan_speed: Option<f64>,
}

impl GpuMetrics {
    /// Take every value still missing here from `other`.
    pub fn fill_missing(&mut self, other: &GpuMetrics) {
        fn fill(slot: &mut Option<f64>, value: Option<f64>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.core_usage, other.core_usage);
        fill(&mut self.core_temperature, other.core_temperature);
        fill(&mut self.core_frequency, other.core_frequency);
        fill(&mut self.memory_frequency, other.memory_frequency);
        fill(&mut self.memory_temperature, other.memory_temperature);
        fill(&mut self.hotspot_temperature, other.hotspot_temperature);
        fill(&mut self.vram_usage_percent, other.vram_usage_percent);
        fill(&mut self.vram_used_gb, other.vram_used_gb);
        fill(&mut self.vram_total_gb, other.vram_total_gb);
        fill(&mut self.fan_speed, other.fan_speed);
    }

    /// Derive the VRAM percentage from used/total when nobody reported it.
    fn derive_vram_usage(&mut self) {
        if self.vram_usage_percent.is_some() {
            return;
        }
        if let (Some(used), Some(total)) = (self.vram_used_gb, self.vram_total_gb) {
            if total > 0.0 {
                self.vram_usage_percent = Some(used / total * 100.0);
            }
        }
    }
}

// ============================================================================
// Backends
// ============================================================================

/// A vendor-specific source of GPU readings.
pub trait GpuBackend: Send {
    fn name(&self) -> &'static str;

    fn sample(&mut self) -> Result<GpuMetrics, MonitorError>;
}

#[cfg(feature = "nvidia")]
pub struct NvmlBackend {
    nvml: nvml_wrapper::Nvml,
    index: u32,
}

#[cfg(feature = "nvidia")]
impl NvmlBackend {
    pub fn new(index: u32) -> Result<Self, MonitorError> {
        let nvml = nvml_wrapper::Nvml::init()?;
        if nvml.device_count()? <= index {
            return Err(MonitorError::Unavailable("NVIDIA GPU"));
        }
        Ok(Self { nvml, index })
    }
}

#[cfg(feature = "nvidia")]
impl GpuBackend for NvmlBackend {
    fn name(&self) -> &'static str {
        "NVML"
    }

    fn sample(&mut self) -> Result<GpuMetrics, MonitorError> {
        use nvml_wrapper::enum_wrappers::device::{Clock, TemperatureSensor};

        let device = self.nvml.device_by_index(self.index)?;
        let memory = device.memory_info().ok();

        Ok(GpuMetrics {
            core_usage: device.utilization_rates().ok().map(|u| u.gpu as f64),
            core_temperature: device
                .temperature(TemperatureSensor::Gpu)
                .ok()
                .map(|t| t as f64),
            core_frequency: device.clock_info(Clock::Graphics).ok().map(|c| c as f64),
            memory_frequency: device.clock_info(Clock::Memory).ok().map(|c| c as f64),
            vram_used_gb: memory.as_ref().map(|m| m.used as f64 / BYTES_PER_GB),
            vram_total_gb: memory.as_ref().map(|m| m.total as f64 / BYTES_PER_GB),
            fan_speed: device.fan_speed(0).ok().map(|f| f as f64),
            // NVML only exposes the core sensor; memory and hotspot
            // temperatures come from hwmon or LHM when present.
            ..GpuMetrics::default()
        })
    }
}

/// Parses `nvidia-smi` CSV output when NVML is not compiled in or fails.
pub struct NvidiaSmiBackend;

const NVIDIA_SMI_QUERY: &str = "--query-gpu=utilization.gpu,temperature.gpu,clocks.gr,clocks.mem,memory.used,memory.total,fan.speed";

impl GpuBackend for NvidiaSmiBackend {
    fn name(&self) -> &'static str {
        "nvidia-smi"
    }

    fn sample(&mut self) -> Result<GpuMetrics, MonitorError> {
        let output = Command::new(NVIDIA_SMI)
            .args([NVIDIA_SMI_QUERY, "--format=csv,noheader,nounits"])
            .output()
            .map_err(|source| MonitorError::Io {
                path: PathBuf::from(NVIDIA_SMI),
                source,
            })?;
        if !output.status.success() {
            return Err(MonitorError::Command("nvidia-smi"));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().next().unwrap_or_default();
        Ok(parse_nvidia_smi(line))
    }
}

/// Parse one CSV row produced by [`NVIDIA_SMI_QUERY`]; fields reading
/// `[N/A]` or `[Not Supported]` stay empty.
pub fn parse_nvidia_smi(line: &str) -> GpuMetrics {
    let fields: Vec<Option<f64>> = line
        .split(',')
        .map(|field| field.trim().parse::<f64>().ok())
        .collect();
    let field = |index: usize| fields.get(index).copied().flatten();

    GpuMetrics {
        core_usage: field(0),
        core_temperature: field(1),
        core_frequency: field(2),
        memory_frequency: field(3),
        vram_used_gb: field(4).map(|mib| mib / MIB_PER_GB),
        vram_total_gb: field(5).map(|mib| mib / MIB_PER_GB),
        fan_speed: field(6),
        ..GpuMetrics::default()
    }
}

/// AMD GPUs through the amdgpu sysfs interface.
pub struct AmdSysfsBackend {
    device: PathBuf,
    hwmon: Option<PathBuf>,
}

impl AmdSysfsBackend {
    pub fn new(device: PathBuf) -> Self {
        let hwmon = hwmon::hwmon_dirs(&device.join("hwmon")).into_iter().next();
        Self { device, hwmon }
    }

    fn read(&self, name: &str) -> Option<i64> {
        hwmon::read_int(&self.device.join(name)).ok()
    }

    fn temperature(&self, label: &str) -> Option<f64> {
        let hwmon = self.hwmon.as_ref()?;
        hwmon::find_labelled_input(hwmon, "temp", &[label]).map(|milli| milli as f64 / 1000.0)
    }

    fn clock_mhz(&self, label: &str) -> Option<f64> {
        let hwmon = self.hwmon.as_ref()?;
        hwmon::find_labelled_input(hwmon, "freq", &[label]).map(|hz| hz as f64 / 1_000_000.0)
    }

    fn fan_percent(&self) -> Option<f64> {
        let hwmon = self.hwmon.as_ref()?;
        let pwm = hwmon::read_int(&hwmon.join("pwm1")).ok()?;
        let max = hwmon::read_int(&hwmon.join("pwm1_max")).unwrap_or(255);
        (max > 0).then(|| pwm as f64 / max as f64 * 100.0)
    }
}

impl GpuBackend for AmdSysfsBackend {
    fn name(&self) -> &'static str {
        "amdgpu sysfs"
    }

    fn sample(&mut self) -> Result<GpuMetrics, MonitorError> {
        let busy = hwmon::read_int(&self.device.join("gpu_busy_percent"))?;
        Ok(GpuMetrics {
            core_usage: Some(busy as f64),
            core_temperature: self.temperature("edge"),
            core_frequency: self.clock_mhz("sclk"),
            memory_frequency: self.clock_mhz("mclk"),
            memory_temperature: self.temperature("mem"),
            hotspot_temperature: self.temperature("junction"),
            vram_used_gb: self.read("mem_info_vram_used").map(|b| b as f64 / BYTES_PER_GB),
            vram_total_gb: self.read("mem_info_vram_total").map(|b| b as f64 / BYTES_PER_GB),
            fan_speed: self.fan_percent(),
            ..GpuMetrics::default()
        })
    }
}

/// Intel GPUs expose no busy counter in sysfs; the clock ratio stands in.
pub struct IntelSysfsBackend {
    card: PathBuf,
}

impl IntelSysfsBackend {
    pub fn new(card: PathBuf) -> Self {
        Self { card }
    }
}

impl GpuBackend for IntelSysfsBackend {
    fn name(&self) -> &'static str {
        "i915 sysfs"
    }

    fn sample(&mut self) -> Result<GpuMetrics, MonitorError> {
        let current = hwmon::read_int(&self.card.join("gt_cur_freq_mhz"))? as f64;
        let max = hwmon::read_int(&self.card.join("gt_max_freq_mhz"))? as f64;
        Ok(GpuMetrics {
            core_usage: (max > 0.0).then(|| (current / max * 100.0).min(100.0)),
            core_frequency: Some(current),
            ..GpuMetrics::default()
        })
    }
}

/// `cardN` directories (not connectors such as `card0-DP-1`) by vendor.
fn find_card(drm_root: &Path, vendor: u32) -> Option<PathBuf> {
    let mut cards: Vec<PathBuf> = fs::read_dir(drm_root)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("card"))
                .is_some_and(|index| index.chars().all(|c| c.is_ascii_digit()))
        })
        .collect();
    cards.sort();

    cards
        .into_iter()
        .find(|card| hwmon::read_hex(&card.join("device").join("vendor")).ok() == Some(vendor))
}

/// Pick the first sysfs backend found under `drm_root`.
pub fn detect_sysfs(drm_root: &Path) -> Option<Box<dyn GpuBackend>> {
    if let Some(card) = find_card(drm_root, AMD_VENDOR) {
        return Some(Box::new(AmdSysfsBackend::new(card.join("device"))));
    }
    if let Some(card) = find_card(drm_root, INTEL_VENDOR) {
        return Some(Box::new(IntelSysfsBackend::new(card)));
    }
    None
}

/// Whether `command` can be run from `PATH` and lists at least one device.
fn command_available(command: &str) -> bool {
    Command::new(command)
        .arg("-L")
        .output()
        .is_ok_and(|output| output.status.success())
}

fn detect_backend() -> Option<Box<dyn GpuBackend>> {
    #[cfg(feature = "nvidia")]
    {
        match NvmlBackend::new(0) {
            Ok(backend) => return Some(Box::new(backend)),
            Err(err) => log::debug!("NVML not usable: {}", err),
        }
    }

    if command_available(NVIDIA_SMI) {
        return Some(Box::new(NvidiaSmiBackend));
    }

    detect_sysfs(Path::new(DRM_ROOT))
}

// ============================================================================
// Collector
// ============================================================================

pub struct GpuCollector {
    backend: Option<Box<dyn GpuBackend>>,
}

impl GpuCollector {
    pub fn detect() -> Self {
        let backend = detect_backend();
        match &backend {
            Some(backend) => log::info!("GPU backend: {}", backend.name()),
            None => log::info!("No GPU backend found, relying on generic sensors"),
        }
        Self { backend }
    }

    pub fn with_backend(backend: Option<Box<dyn GpuBackend>>) -> Self {
        Self { backend }
    }

    pub fn collect(&mut self, readings: &[TempReading], lhm: &[LhmSensor]) -> GpuMetrics {
        let mut metrics = match self.backend.as_mut().map(|backend| backend.sample()) {
            Some(Ok(metrics)) => metrics,
            Some(Err(err)) => {
                log::debug!("GPU sample failed: {}", err);
                GpuMetrics::default()
            }
            None => GpuMetrics::default(),
        };

        metrics.fill_missing(&lhm::gpu_metrics(lhm));
        if metrics.core_temperature.is_none() {
            metrics.core_temperature = thermal::gpu_temperature(readings);
        }
        metrics.derive_vram_usage();
        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn amd_tree(root: &Path) {
        let device = root.join("card1/device");
        write(&device.join("vendor"), "0x1002\n");
        write(&device.join("gpu_busy_percent"), "37\n");
        write(&device.join("mem_info_vram_used"), "2147483648\n");
        write(&device.join("mem_info_vram_total"), "8589934592\n");
        let hwmon = device.join("hwmon/hwmon4");
        write(&hwmon.join("temp1_label"), "edge\n");
        write(&hwmon.join("temp1_input"), "45000\n");
        write(&hwmon.join("temp2_label"), "junction\n");
        write(&hwmon.join("temp2_input"), "52000\n");
        write(&hwmon.join("temp3_label"), "mem\n");
        write(&hwmon.join("temp3_input"), "58000\n");
        write(&hwmon.join("freq1_label"), "sclk\n");
        write(&hwmon.join("freq1_input"), "1850000000\n");
        write(&hwmon.join("freq2_label"), "mclk\n");
        write(&hwmon.join("freq2_input"), "1000000000\n");
        write(&hwmon.join("pwm1"), "102\n");
        // connector directories must not be mistaken for cards
        write(&root.join("card1-DP-1/status"), "connected\n");
    }

    #[test]
    fn amd_sysfs_backend_reads_device() {
        let root = TempDir::new().unwrap();
        amd_tree(root.path());

        let mut backend = detect_sysfs(root.path()).expect("AMD card present");
        assert_eq!(backend.name(), "amdgpu sysfs");
        let gpu = backend.sample().unwrap();

        assert_eq!(gpu.core_usage, Some(37.0));
        assert_eq!(gpu.core_temperature, Some(45.0));
        assert_eq!(gpu.hotspot_temperature, Some(52.0));
        assert_eq!(gpu.memory_temperature, Some(58.0));
        assert_eq!(gpu.core_frequency, Some(1850.0));
        assert_eq!(gpu.memory_frequency, Some(1000.0));
        assert_eq!(gpu.vram_used_gb, Some(2.0));
        assert_eq!(gpu.vram_total_gb, Some(8.0));
        assert_eq!(gpu.fan_speed, Some(40.0));
    }

    #[test]
    fn intel_backend_uses_clock_ratio() {
        let root = TempDir::new().unwrap();
        let card = root.path().join("card0");
        write(&card.join("device/vendor"), "0x8086\n");
        write(&card.join("gt_cur_freq_mhz"), "300\n");
        write(&card.join("gt_max_freq_mhz"), "1200\n");

        let mut backend = detect_sysfs(root.path()).expect("Intel card present");
        let gpu = backend.sample().unwrap();
        assert_eq!(gpu.core_usage, Some(25.0));
        assert_eq!(gpu.core_frequency, Some(300.0));
    }

    #[test]
    fn no_backend_without_known_vendor() {
        let root = TempDir::new().unwrap();
        write(&root.path().join("card0/device/vendor"), "0x10de\n");
        assert!(detect_sysfs(root.path()).is_none());
    }

    #[test]
    fn missing_command_is_not_available() {
        assert!(!command_available("hwoverlay-no-such-gpu-tool"));
    }

    #[test]
    fn nvidia_smi_rows_parse() {
        let gpu = parse_nvidia_smi("23, 61, 1695, 7000, 2048, 8192, 35");
        assert_eq!(gpu.core_usage, Some(23.0));
        assert_eq!(gpu.core_temperature, Some(61.0));
        assert_eq!(gpu.core_frequency, Some(1695.0));
        assert_eq!(gpu.memory_frequency, Some(7000.0));
        assert_eq!(gpu.vram_used_gb, Some(2.0));
        assert_eq!(gpu.vram_total_gb, Some(8.0));
        assert_eq!(gpu.fan_speed, Some(35.0));

        let laptop = parse_nvidia_smi("5, 48, 210, 405, 10, 4096, [N/A]");
        assert_eq!(laptop.fan_speed, None);
    }

    struct Failing;

    impl GpuBackend for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn sample(&mut self) -> Result<GpuMetrics, MonitorError> {
            Err(MonitorError::Unavailable("test GPU"))
        }
    }

    #[test]
    fn collector_fills_gaps_from_other_sources() {
        let mut collector = GpuCollector::with_backend(Some(Box::new(Failing)));
        let readings = vec![TempReading::new("amdgpu edge", 44.0)];
        let lhm = vec![
            LhmSensor::new("GPU Memory Used", "SmallData", 1024.0, "/amdgpu/0/smalldata/0"),
            LhmSensor::new("GPU Memory Total", "SmallData", 4096.0, "/amdgpu/0/smalldata/1"),
        ];

        let gpu = collector.collect(&readings, &lhm);
        assert_eq!(gpu.core_temperature, Some(44.0));
        assert_eq!(gpu.vram_usage_percent, Some(25.0));
        assert_eq!(gpu.core_usage, None);
    }

    #[test]
    fn fill_missing_keeps_existing_values() {
        let mut primary = GpuMetrics {
            core_usage: Some(10.0),
            ..GpuMetrics::default()
        };
        primary.fill_missing(&GpuMetrics {
            core_usage: Some(90.0),
            fan_speed: Some(30.0),
            ..GpuMetrics::default()
        });
        assert_eq!(primary.core_usage, Some(10.0));
        assert_eq!(primary.fan_speed, Some(30.0));
    }
}
