// SPDX-License-Identifier: MPL-2.0

//! Catalogue of the hardware components and the individual metric lines the
//! overlay can show. Keys double as JSON keys in the configuration file.

/// A block of related metrics, rendered as one section of the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Cpu,
    Gpu,
    Ram,
    Network,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::Cpu,
        Component::Gpu,
        Component::Ram,
        Component::Network,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Component::Cpu => "cpu",
            Component::Gpu => "gpu",
            Component::Ram => "ram",
            Component::Network => "network",
        }
    }

    /// Section heading drawn above the component's lines.
    pub fn title(self) -> &'static str {
        match self {
            Component::Cpu => "CPU",
            Component::Gpu => "GPU",
            Component::Ram => "RAM",
            Component::Network => "NETWORK",
        }
    }

    /// Position in [`Component::ALL`], used when no order is configured.
    pub fn index(self) -> usize {
        Component::ALL
            .iter()
            .position(|c| *c == self)
            .unwrap_or_default()
    }

    pub fn default_order(self) -> u32 {
        self.index() as u32 + 1
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Component::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Metrics belonging to this component, in catalogue order.
    pub fn metrics(self) -> impl Iterator<Item = Metric> {
        Metric::ALL
            .into_iter()
            .filter(move |metric| metric.component() == self)
    }
}

/// One displayable line of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    CpuUsage,
    CpuTemperature,
    CpuFrequency,
    CpuVoltage,
    GpuCoreUsage,
    GpuCoreTemperature,
    GpuCoreFrequency,
    GpuMemoryFrequency,
    GpuMemoryTemperature,
    GpuHotspotTemperature,
    GpuVramUsage,
    GpuVramMemory,
    GpuFanSpeed,
    RamPercent,
    RamUsedTotal,
    RamAvailable,
    RamTemperature,
    NetworkUploadSpeed,
    NetworkDownloadSpeed,
    NetworkTotalSent,
    NetworkTotalReceived,
}

impl Metric {
    pub const ALL: [Metric; 21] = [
        Metric::CpuUsage,
        Metric::CpuTemperature,
        Metric::CpuFrequency,
        Metric::CpuVoltage,
        Metric::GpuCoreUsage,
        Metric::GpuCoreTemperature,
        Metric::GpuCoreFrequency,
        Metric::GpuMemoryFrequency,
        Metric::GpuMemoryTemperature,
        Metric::GpuHotspotTemperature,
        Metric::GpuVramUsage,
        Metric::GpuVramMemory,
        Metric::GpuFanSpeed,
        Metric::RamPercent,
        Metric::RamUsedTotal,
        Metric::RamAvailable,
        Metric::RamTemperature,
        Metric::NetworkUploadSpeed,
        Metric::NetworkDownloadSpeed,
        Metric::NetworkTotalSent,
        Metric::NetworkTotalReceived,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Metric::CpuUsage => "cpu_usage",
            Metric::CpuTemperature => "cpu_temperature",
            Metric::CpuFrequency => "cpu_frequency",
            Metric::CpuVoltage => "cpu_voltage",
            Metric::GpuCoreUsage => "gpu_core_usage",
            Metric::GpuCoreTemperature => "gpu_core_temperature",
            Metric::GpuCoreFrequency => "gpu_core_frequency",
            Metric::GpuMemoryFrequency => "gpu_memory_frequency",
            Metric::GpuMemoryTemperature => "gpu_memory_temperature",
            Metric::GpuHotspotTemperature => "gpu_hotspot_temperature",
            Metric::GpuVramUsage => "gpu_vram_usage",
            Metric::GpuVramMemory => "gpu_vram_memory",
            Metric::GpuFanSpeed => "gpu_fan_speed",
            Metric::RamPercent => "ram_percent",
            Metric::RamUsedTotal => "ram_used_total",
            Metric::RamAvailable => "ram_available",
            Metric::RamTemperature => "ram_temperature",
            Metric::NetworkUploadSpeed => "network_upload_speed",
            Metric::NetworkDownloadSpeed => "network_download_speed",
            Metric::NetworkTotalSent => "network_total_sent",
            Metric::NetworkTotalReceived => "network_total_received",
        }
    }

    pub fn component(self) -> Component {
        match self {
            Metric::CpuUsage
            | Metric::CpuTemperature
            | Metric::CpuFrequency
            | Metric::CpuVoltage => Component::Cpu,
            Metric::GpuCoreUsage
            | Metric::GpuCoreTemperature
            | Metric::GpuCoreFrequency
            | Metric::GpuMemoryFrequency
            | Metric::GpuMemoryTemperature
            | Metric::GpuHotspotTemperature
            | Metric::GpuVramUsage
            | Metric::GpuVramMemory
            | Metric::GpuFanSpeed => Component::Gpu,
            Metric::RamPercent
            | Metric::RamUsedTotal
            | Metric::RamAvailable
            | Metric::RamTemperature => Component::Ram,
            Metric::NetworkUploadSpeed
            | Metric::NetworkDownloadSpeed
            | Metric::NetworkTotalSent
            | Metric::NetworkTotalReceived => Component::Network,
        }
    }

    /// 1-based position within the owning component.
    pub fn default_order(self) -> u32 {
        let component = self.component();
        component
            .metrics()
            .position(|metric| metric == self)
            .map_or(1, |index| index as u32 + 1)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Metric::ALL.into_iter().find(|m| m.key() == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_orders_restart_per_component() {
        assert_eq!(Metric::CpuUsage.default_order(), 1);
        assert_eq!(Metric::CpuVoltage.default_order(), 4);
        assert_eq!(Metric::GpuCoreUsage.default_order(), 1);
        assert_eq!(Metric::GpuFanSpeed.default_order(), 9);
        assert_eq!(Metric::NetworkTotalReceived.default_order(), 4);
    }

    #[test]
    fn keys_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_key(metric.key()), Some(metric));
        }
        assert_eq!(Component::from_key("network"), Some(Component::Network));
        assert_eq!(Component::from_key("disk"), None);
    }

    #[test]
    fn every_metric_belongs_to_one_component() {
        let total: usize = Component::ALL.iter().map(|c| c.metrics().count()).sum();
        assert_eq!(total, Metric::ALL.len());
        assert_eq!(Component::Gpu.metrics().count(), 9);
    }
}
