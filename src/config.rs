// SPDX-License-Identifier: MPL-2.0

//! # Overlay Configuration
//!
//! Preferences are stored as a JSON document with three sections:
//!
//! - **appearance**: fonts, colours, opacity, refresh rate and placement
//! - **layout**: vertical/horizontal/grid arrangement and the display order
//!   of components and metrics
//! - **display**: which components and metric lines are visible
//!
//! Every key has a default. Keys missing from the file take their default on
//! load, and unknown keys are ignored, so older and newer files both load.
//!
//! The file is the only channel between the overlay, the panel applet and
//! the settings dialog: the dialog writes it, the overlay polls it.

use crate::metric::{Component, Metric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Directory below the user config dir holding our files.
pub const APP_DIR: &str = "hwoverlay";
pub const CONFIG_FILE: &str = "config.json";

/// Fallback order for metrics missing from `metric_order`.
pub const UNORDERED_METRIC: u32 = 999;

const MIN_REFRESH_SECS: f64 = 0.1;
const MAX_REFRESH_SECS: f64 = 5.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no user configuration directory available")]
    NoConfigDir,
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Configuration Model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub appearance: Appearance,
    pub layout: Layout,
    pub display: Display,
}

/// Named placement of the panel on its screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
    Custom,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::TopLeft,
        Position::TopRight,
        Position::BottomLeft,
        Position::BottomRight,
        Position::Center,
        Position::Custom,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appearance {
    pub font_family: String,
    pub font_size: u32,
    /// Text colour, `#RRGGBB`
    pub font_color: String,
    /// Colour of the section frames drawn when `show_border` is set
    pub border_color: String,
    /// Colour of the outline around every glyph
    pub background_color: String,
    pub show_border: bool,
    /// Panel opacity, 0.0 to 1.0
    pub opacity: f64,
    /// Seconds between sensor polls
    pub refresh_rate: f64,
    pub position: Position,
    pub padding: u32,
    /// Top-left corner relative to the selected screen, used with `Position::Custom`
    pub custom_position: [i32; 2],
    pub max_width: u32,
    pub max_height: u32,
    pub monitor_index: usize,
    pub offset_x: i32,
    pub offset_y: i32,
    pub keep_on_top: bool,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            font_family: "Monospace".to_string(),
            font_size: 10,
            font_color: "#FFFFFF".to_string(),
            border_color: "#000000".to_string(),
            background_color: "#000000".to_string(),
            show_border: false,
            opacity: 0.7,
            refresh_rate: 1.0,
            position: Position::BottomRight,
            padding: 10,
            custom_position: [100, 100],
            max_width: 400,
            max_height: 800,
            monitor_index: 0,
            offset_x: 0,
            offset_y: 0,
            keep_on_top: true,
        }
    }
}

impl Appearance {
    /// Poll interval, clamped to 0.1-5.0 seconds.
    pub fn refresh_interval(&self) -> Duration {
        let secs = if self.refresh_rate.is_finite() {
            self.refresh_rate.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS)
        } else {
            1.0
        };
        Duration::from_secs_f64(secs)
    }

    pub fn opacity(&self) -> f64 {
        if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutType {
    #[default]
    Vertical,
    Horizontal,
    Grid,
}

impl LayoutType {
    pub const ALL: [LayoutType; 3] = [LayoutType::Vertical, LayoutType::Horizontal, LayoutType::Grid];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    #[serde(rename = "type")]
    pub layout_type: LayoutType,
    /// Column count for `LayoutType::Grid`
    pub columns: u32,
    pub spacing: u32,
    pub use_scroll: bool,
    pub component_order: BTreeMap<String, u32>,
    pub metric_order: BTreeMap<String, u32>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            layout_type: LayoutType::Vertical,
            columns: 2,
            spacing: 5,
            use_scroll: true,
            component_order: Component::ALL
                .iter()
                .map(|c| (c.key().to_string(), c.default_order()))
                .collect(),
            metric_order: Metric::ALL
                .iter()
                .map(|m| (m.key().to_string(), m.default_order()))
                .collect(),
        }
    }
}

impl Layout {
    /// Sort key of a component; unlisted components keep their catalogue index.
    pub fn component_order(&self, component: Component) -> u32 {
        self.component_order
            .get(component.key())
            .copied()
            .unwrap_or(component.index() as u32)
    }

    pub fn metric_order(&self, metric: Metric) -> u32 {
        self.metric_order
            .get(metric.key())
            .copied()
            .unwrap_or(UNORDERED_METRIC)
    }

    pub fn set_component_order(&mut self, component: Component, order: u32) {
        self.component_order.insert(component.key().to_string(), order);
    }

    pub fn set_metric_order(&mut self, metric: Metric, order: u32) {
        self.metric_order.insert(metric.key().to_string(), order);
    }

    /// Components sorted by their configured order.
    pub fn ordered_components(&self) -> Vec<Component> {
        let mut components = Component::ALL.to_vec();
        components.sort_by_key(|c| self.component_order(*c));
        components
    }

    /// Metrics of one component sorted by their configured order.
    pub fn ordered_metrics(&self, component: Component) -> Vec<Metric> {
        let mut metrics: Vec<Metric> = component.metrics().collect();
        metrics.sort_by_key(|m| self.metric_order(*m));
        metrics
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Display {
    pub show_cpu: bool,
    pub show_gpu: bool,
    pub show_ram: bool,
    pub show_network: bool,
    pub show_titles: bool,
    pub compact_mode: bool,

    pub show_cpu_usage: bool,
    pub show_cpu_temperature: bool,
    pub show_cpu_frequency: bool,
    pub show_cpu_voltage: bool,

    pub show_gpu_core_usage: bool,
    pub show_gpu_core_temperature: bool,
    pub show_gpu_core_frequency: bool,
    pub show_gpu_memory_frequency: bool,
    pub show_gpu_memory_temperature: bool,
    pub show_gpu_hotspot_temperature: bool,
    pub show_gpu_vram_usage: bool,
    pub show_gpu_vram_memory: bool,
    pub show_gpu_fan_speed: bool,

    pub show_ram_percent: bool,
    pub show_ram_used_total: bool,
    pub show_ram_available: bool,
    pub show_ram_temperature: bool,

    pub show_network_upload_speed: bool,
    pub show_network_download_speed: bool,
    pub show_network_total_sent: bool,
    pub show_network_total_received: bool,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            show_cpu: true,
            show_gpu: true,
            show_ram: true,
            show_network: true,
            show_titles: true,
            compact_mode: false,
            show_cpu_usage: true,
            show_cpu_temperature: true,
            show_cpu_frequency: true,
            show_cpu_voltage: true,
            show_gpu_core_usage: true,
            show_gpu_core_temperature: true,
            show_gpu_core_frequency: true,
            show_gpu_memory_frequency: true,
            show_gpu_memory_temperature: true,
            show_gpu_hotspot_temperature: true,
            show_gpu_vram_usage: true,
            show_gpu_vram_memory: true,
            show_gpu_fan_speed: true,
            show_ram_percent: true,
            show_ram_used_total: true,
            show_ram_available: true,
            show_ram_temperature: true,
            show_network_upload_speed: true,
            show_network_download_speed: true,
            show_network_total_sent: true,
            show_network_total_received: true,
        }
    }
}

impl Display {
    fn component_flag(&mut self, component: Component) -> &mut bool {
        match component {
            Component::Cpu => &mut self.show_cpu,
            Component::Gpu => &mut self.show_gpu,
            Component::Ram => &mut self.show_ram,
            Component::Network => &mut self.show_network,
        }
    }

    fn metric_flag(&mut self, metric: Metric) -> &mut bool {
        match metric {
            Metric::CpuUsage => &mut self.show_cpu_usage,
            Metric::CpuTemperature => &mut self.show_cpu_temperature,
            Metric::CpuFrequency => &mut self.show_cpu_frequency,
            Metric::CpuVoltage => &mut self.show_cpu_voltage,
            Metric::GpuCoreUsage => &mut self.show_gpu_core_usage,
            Metric::GpuCoreTemperature => &mut self.show_gpu_core_temperature,
            Metric::GpuCoreFrequency => &mut self.show_gpu_core_frequency,
            Metric::GpuMemoryFrequency => &mut self.show_gpu_memory_frequency,
            Metric::GpuMemoryTemperature => &mut self.show_gpu_memory_temperature,
            Metric::GpuHotspotTemperature => &mut self.show_gpu_hotspot_temperature,
            Metric::GpuVramUsage => &mut self.show_gpu_vram_usage,
            Metric::GpuVramMemory => &mut self.show_gpu_vram_memory,
            Metric::GpuFanSpeed => &mut self.show_gpu_fan_speed,
            Metric::RamPercent => &mut self.show_ram_percent,
            Metric::RamUsedTotal => &mut self.show_ram_used_total,
            Metric::RamAvailable => &mut self.show_ram_available,
            Metric::RamTemperature => &mut self.show_ram_temperature,
            Metric::NetworkUploadSpeed => &mut self.show_network_upload_speed,
            Metric::NetworkDownloadSpeed => &mut self.show_network_download_speed,
            Metric::NetworkTotalSent => &mut self.show_network_total_sent,
            Metric::NetworkTotalReceived => &mut self.show_network_total_received,
        }
    }

    pub fn shows_component(&self, component: Component) -> bool {
        match component {
            Component::Cpu => self.show_cpu,
            Component::Gpu => self.show_gpu,
            Component::Ram => self.show_ram,
            Component::Network => self.show_network,
        }
    }

    pub fn shows_metric(&self, metric: Metric) -> bool {
        match metric {
            Metric::CpuUsage => self.show_cpu_usage,
            Metric::CpuTemperature => self.show_cpu_temperature,
            Metric::CpuFrequency => self.show_cpu_frequency,
            Metric::CpuVoltage => self.show_cpu_voltage,
            Metric::GpuCoreUsage => self.show_gpu_core_usage,
            Metric::GpuCoreTemperature => self.show_gpu_core_temperature,
            Metric::GpuCoreFrequency => self.show_gpu_core_frequency,
            Metric::GpuMemoryFrequency => self.show_gpu_memory_frequency,
            Metric::GpuMemoryTemperature => self.show_gpu_memory_temperature,
            Metric::GpuHotspotTemperature => self.show_gpu_hotspot_temperature,
            Metric::GpuVramUsage => self.show_gpu_vram_usage,
            Metric::GpuVramMemory => self.show_gpu_vram_memory,
            Metric::GpuFanSpeed => self.show_gpu_fan_speed,
            Metric::RamPercent => self.show_ram_percent,
            Metric::RamUsedTotal => self.show_ram_used_total,
            Metric::RamAvailable => self.show_ram_available,
            Metric::RamTemperature => self.show_ram_temperature,
            Metric::NetworkUploadSpeed => self.show_network_upload_speed,
            Metric::NetworkDownloadSpeed => self.show_network_download_speed,
            Metric::NetworkTotalSent => self.show_network_total_sent,
            Metric::NetworkTotalReceived => self.show_network_total_received,
        }
    }

    pub fn set_component(&mut self, component: Component, visible: bool) {
        *self.component_flag(component) = visible;
    }

    pub fn set_metric(&mut self, metric: Metric, visible: bool) {
        *self.metric_flag(metric) = visible;
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Loads and saves the JSON preferences file.
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Open the config at `path`, or at the default location when `None`,
    /// and load it immediately.
    pub fn new(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path,
            None => Self::default_path()?,
        };
        let mut manager = Self {
            path,
            config: Config::default(),
        };
        manager.load_config();
        Ok(manager)
    }

    /// `<user config dir>/hwoverlay/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file into memory.
    ///
    /// A missing file is created with the defaults. An unreadable or invalid
    /// file is left untouched and the defaults are used instead.
    pub fn load_config(&mut self) -> &Config {
        self.config = if self.path.exists() {
            match read_config(&self.path) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("Using default configuration: {}", err);
                    Config::default()
                }
            }
        } else {
            log::info!("Creating default configuration at {}", self.path.display());
            let config = Config::default();
            if let Err(err) = write_config(&self.path, &config) {
                log::error!("Failed to write default configuration: {}", err);
            }
            config
        };
        &self.config
    }

    pub fn save_config(&self) -> Result<(), ConfigError> {
        write_config(&self.path, &self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the in-memory config and persist it.
    pub fn update_config(&mut self, config: Config) -> Result<(), ConfigError> {
        self.config = config;
        self.save_config()
    }

    /// Read the file as it is on disk now, without touching it or the
    /// in-memory copy.
    pub fn read_current(&self) -> Result<Config, ConfigError> {
        read_config(&self.path)
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn write_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    config.serialize(&mut serializer)?;

    // Readers poll this file, so swap it in whole.
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, &buffer).map_err(io_err)?;
    fs::rename(&staging, path).map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> ConfigManager {
        ConfigManager::new(Some(dir.path().join("nested").join(CONFIG_FILE)))
            .expect("explicit path needs no config dir")
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        assert!(manager.path().exists());
        assert_eq!(manager.config(), &Config::default());

        let written = fs::read_to_string(manager.path()).unwrap();
        assert!(written.contains("\n    \"appearance\": {"));
        assert!(written.contains("\"position\": \"bottom-right\""));
        assert!(written.contains("\"type\": \"vertical\""));
    }

    #[test]
    fn partial_file_is_merged_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            r#"{
                "appearance": { "font_size": 14, "position": "top-left", "unknown": 1 },
                "display": { "show_gpu": false }
            }"#,
        )
        .unwrap();

        let manager = ConfigManager::new(Some(path)).unwrap();
        let config = manager.config();

        assert_eq!(config.appearance.font_size, 14);
        assert_eq!(config.appearance.position, Position::TopLeft);
        assert_eq!(config.appearance.opacity, 0.7);
        assert!(!config.display.show_gpu);
        assert!(config.display.show_cpu_voltage);
        assert_eq!(config.layout, Layout::default());
    }

    #[test]
    fn invalid_file_falls_back_without_overwriting() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{ not json").unwrap();

        let manager = ConfigManager::new(Some(path.clone())).unwrap();

        assert_eq!(manager.config(), &Config::default());
        assert_eq!(fs::read_to_string(&path).unwrap(), "{ not json");
        assert!(manager.read_current().is_err());
    }

    #[test]
    fn update_config_persists() {
        let dir = TempDir::new().unwrap();
        let mut manager = manager_in(&dir);

        let mut config = manager.config().clone();
        config.appearance.refresh_rate = 2.0;
        config.layout.layout_type = LayoutType::Grid;
        config.display.set_metric(Metric::RamTemperature, false);
        manager.update_config(config.clone()).unwrap();

        assert_eq!(manager.read_current().unwrap(), config);
        let reopened = ConfigManager::new(Some(manager.path().to_path_buf())).unwrap();
        assert_eq!(reopened.config(), &config);
    }

    #[test]
    fn refresh_interval_is_clamped() {
        let mut appearance = Appearance::default();
        appearance.refresh_rate = 0.01;
        assert_eq!(appearance.refresh_interval(), Duration::from_millis(100));
        appearance.refresh_rate = 60.0;
        assert_eq!(appearance.refresh_interval(), Duration::from_secs(5));
        appearance.refresh_rate = f64::NAN;
        assert_eq!(appearance.refresh_interval(), Duration::from_secs(1));
    }

    #[test]
    fn order_lookups_fall_back() {
        let mut layout = Layout::default();
        layout.component_order.remove("gpu");
        layout.metric_order.remove("cpu_usage");

        assert_eq!(layout.component_order(Component::Gpu), 1);
        assert_eq!(layout.metric_order(Metric::CpuUsage), UNORDERED_METRIC);
        assert_eq!(
            layout.ordered_metrics(Component::Cpu).last(),
            Some(&Metric::CpuUsage)
        );
    }

    #[test]
    fn display_flags_map_to_fields() {
        let mut display = Display::default();
        display.set_metric(Metric::GpuFanSpeed, false);
        display.set_component(Component::Network, false);

        assert!(!display.show_gpu_fan_speed);
        assert!(!display.shows_metric(Metric::GpuFanSpeed));
        assert!(!display.shows_component(Component::Network));
        assert!(display.shows_component(Component::Cpu));
    }
}
