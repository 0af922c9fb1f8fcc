// SPDX-License-Identifier: MPL-2.0

//! Text for every metric line, plus the plain-text report printed by the
//! console monitor. Missing values render as "N/A".

use crate::metric::{Component, Metric};
use crate::monitor::Metrics;

const NA: &str = "N/A";
const RULE_WIDTH: usize = 60;

fn or_na(value: Option<f64>, render: impl FnOnce(f64) -> String) -> String {
    value.map(render).unwrap_or_else(|| NA.to_string())
}

/// GHz for display; values above 1000 are taken to be MHz.
fn as_ghz(frequency: f64) -> f64 {
    if frequency > 1000.0 {
        frequency / 1000.0
    } else {
        frequency
    }
}

/// The display line for one metric.
pub fn format_metric(metrics: &Metrics, metric: Metric) -> String {
    let cpu = &metrics.cpu;
    let gpu = &metrics.gpu;
    let ram = &metrics.ram;
    let net = &metrics.network;

    match metric {
        Metric::CpuUsage => format!("Usage: {}", or_na(cpu.usage, |v| format!("{v:.1}%"))),
        Metric::CpuTemperature => {
            format!("Temp: {}", or_na(cpu.temperature, |v| format!("{v:.1}°C")))
        }
        Metric::CpuFrequency => match (cpu.frequency, &cpu.model) {
            (Some(frequency), _) => format!("Freq: {:.2} GHz", as_ghz(frequency)),
            (None, Some(model)) => format!("CPU: {model}"),
            (None, None) => format!("Freq: {NA}"),
        },
        Metric::CpuVoltage => format!("Voltage: {}", or_na(cpu.voltage, |v| format!("{v:.3}V"))),

        Metric::GpuCoreUsage => {
            format!("Core Usage: {}", or_na(gpu.core_usage, |v| format!("{v:.1}%")))
        }
        Metric::GpuCoreTemperature => format!(
            "Core Temp: {}",
            or_na(gpu.core_temperature, |v| format!("{v:.1}°C"))
        ),
        Metric::GpuCoreFrequency => format!(
            "Core Freq: {}",
            or_na(gpu.core_frequency, |v| format!("{v:.0} MHz"))
        ),
        Metric::GpuMemoryFrequency => format!(
            "Mem Freq: {}",
            or_na(gpu.memory_frequency, |v| format!("{v:.0} MHz"))
        ),
        Metric::GpuMemoryTemperature => format!(
            "Mem Temp: {}",
            or_na(gpu.memory_temperature, |v| format!("{v:.1}°C"))
        ),
        Metric::GpuHotspotTemperature => format!(
            "Hotspot: {}",
            or_na(gpu.hotspot_temperature, |v| format!("{v:.1}°C"))
        ),
        Metric::GpuVramUsage => format!(
            "VRAM usage: {}",
            or_na(gpu.vram_usage_percent, |v| format!("{v:.1}%"))
        ),
        Metric::GpuVramMemory => match (gpu.vram_used_gb, gpu.vram_total_gb) {
            (Some(used), Some(total)) if total > 0.0 => {
                format!("VRAM: {used:.1}/{total:.1} GB")
            }
            _ => format!("VRAM: {NA}"),
        },
        Metric::GpuFanSpeed => format!("Fan: {}", or_na(gpu.fan_speed, |v| format!("{v:.0}%"))),

        Metric::RamPercent => format!("Usage: {}", or_na(ram.percent, |v| format!("{v:.1}%"))),
        Metric::RamUsedTotal => match (ram.used_gb, ram.total_gb) {
            (Some(used), Some(total)) => format!("Used: {used:.1}/{total:.1} GB"),
            _ => format!("Used: {NA}"),
        },
        Metric::RamAvailable => format!(
            "Available: {}",
            or_na(ram.available_gb, |v| format!("{v:.1} GB"))
        ),
        Metric::RamTemperature => {
            format!("Temp: {}", or_na(ram.temperature, |v| format!("{v:.1}°C")))
        }

        Metric::NetworkUploadSpeed => format!(
            "Upload: {}",
            or_na(net.upload_speed, |v| format!("{v:.2} MB/s"))
        ),
        Metric::NetworkDownloadSpeed => format!(
            "Download: {}",
            or_na(net.download_speed, |v| format!("{v:.2} MB/s"))
        ),
        Metric::NetworkTotalSent => format!(
            "Total Sent: {}",
            or_na(net.total_sent, |v| format!("{v:.1} GB"))
        ),
        Metric::NetworkTotalReceived => format!(
            "Total Recv: {}",
            or_na(net.total_received, |v| format!("{v:.1} GB"))
        ),
    }
}

/// Whether a component reported anything at all.
fn has_data(metrics: &Metrics, component: Component) -> bool {
    match component {
        Component::Cpu => metrics.cpu != Default::default(),
        Component::Gpu => metrics.gpu != Default::default(),
        Component::Ram => metrics.ram != Default::default(),
        Component::Network => metrics.network != Default::default(),
    }
}

/// Multi-section plain-text report of every metric.
pub fn render_report(metrics: &Metrics, timestamp: &str) -> String {
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);
    let mut lines = vec![
        heavy.clone(),
        format!("Hardware Monitor - {timestamp}"),
        heavy.clone(),
    ];

    for component in Component::ALL {
        lines.push(String::new());
        lines.push(component.title().to_string());
        lines.push(light.clone());
        if has_data(metrics, component) {
            lines.extend(
                component
                    .metrics()
                    .map(|metric| format!("  {}", format_metric(metrics, metric))),
            );
        } else {
            lines.push(format!("  No {} metrics available", component.title()));
        }
    }

    lines.push(String::new());
    lines.push(heavy);

    let mut report = lines.join("\n");
    report.push('\n');
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{CpuMetrics, GpuMetrics, NetworkMetrics, RamMetrics};

    fn sample() -> Metrics {
        Metrics {
            cpu: CpuMetrics {
                usage: Some(12.34),
                temperature: Some(55.0),
                frequency: Some(3600.0),
                voltage: Some(1.2346),
                model: Some("Test CPU".to_string()),
            },
            gpu: GpuMetrics {
                core_usage: Some(40.0),
                core_frequency: Some(1695.4),
                vram_used_gb: Some(2.0),
                vram_total_gb: Some(8.0),
                fan_speed: Some(35.6),
                ..GpuMetrics::default()
            },
            ram: RamMetrics {
                total_gb: Some(16.0),
                used_gb: Some(6.3),
                available_gb: Some(9.7),
                percent: Some(39.06),
                temperature: None,
            },
            network: NetworkMetrics {
                upload_speed: Some(0.126),
                download_speed: Some(1.5),
                total_sent: Some(3.21),
                total_received: Some(42.0),
            },
        }
    }

    #[test]
    fn cpu_lines() {
        let metrics = sample();
        assert_eq!(format_metric(&metrics, Metric::CpuUsage), "Usage: 12.3%");
        assert_eq!(format_metric(&metrics, Metric::CpuTemperature), "Temp: 55.0°C");
        assert_eq!(format_metric(&metrics, Metric::CpuFrequency), "Freq: 3.60 GHz");
        assert_eq!(format_metric(&metrics, Metric::CpuVoltage), "Voltage: 1.235V");
    }

    #[test]
    fn cpu_frequency_fallbacks() {
        let mut metrics = sample();
        metrics.cpu.frequency = Some(2.4);
        assert_eq!(format_metric(&metrics, Metric::CpuFrequency), "Freq: 2.40 GHz");

        metrics.cpu.frequency = None;
        assert_eq!(format_metric(&metrics, Metric::CpuFrequency), "CPU: Test CPU");

        metrics.cpu.model = None;
        assert_eq!(format_metric(&metrics, Metric::CpuFrequency), "Freq: N/A");
    }

    #[test]
    fn gpu_lines() {
        let metrics = sample();
        assert_eq!(format_metric(&metrics, Metric::GpuCoreUsage), "Core Usage: 40.0%");
        assert_eq!(format_metric(&metrics, Metric::GpuCoreTemperature), "Core Temp: N/A");
        assert_eq!(format_metric(&metrics, Metric::GpuCoreFrequency), "Core Freq: 1695 MHz");
        assert_eq!(format_metric(&metrics, Metric::GpuHotspotTemperature), "Hotspot: N/A");
        assert_eq!(format_metric(&metrics, Metric::GpuVramMemory), "VRAM: 2.0/8.0 GB");
        assert_eq!(format_metric(&metrics, Metric::GpuFanSpeed), "Fan: 36%");
    }

    #[test]
    fn vram_needs_positive_total() {
        let mut metrics = sample();
        metrics.gpu.vram_total_gb = Some(0.0);
        assert_eq!(format_metric(&metrics, Metric::GpuVramMemory), "VRAM: N/A");
    }

    #[test]
    fn ram_and_network_lines() {
        let metrics = sample();
        assert_eq!(format_metric(&metrics, Metric::RamUsedTotal), "Used: 6.3/16.0 GB");
        assert_eq!(format_metric(&metrics, Metric::RamAvailable), "Available: 9.7 GB");
        assert_eq!(format_metric(&metrics, Metric::RamTemperature), "Temp: N/A");
        assert_eq!(format_metric(&metrics, Metric::NetworkUploadSpeed), "Upload: 0.13 MB/s");
        assert_eq!(format_metric(&metrics, Metric::NetworkDownloadSpeed), "Download: 1.50 MB/s");
        assert_eq!(format_metric(&metrics, Metric::NetworkTotalSent), "Total Sent: 3.2 GB");
        assert_eq!(format_metric(&metrics, Metric::NetworkTotalReceived), "Total Recv: 42.0 GB");
    }

    #[test]
    fn report_marks_empty_components() {
        let mut metrics = sample();
        metrics.gpu = GpuMetrics::default();
        let report = render_report(&metrics, "2024-01-01 12:00:00");

        assert!(report.contains("Hardware Monitor - 2024-01-01 12:00:00"));
        assert!(report.contains("  Usage: 12.3%"));
        assert!(report.contains("  No GPU metrics available"));
        assert!(report.contains("NETWORK\n"));

        let heavy = "=".repeat(RULE_WIDTH);
        assert!(report.starts_with(&format!("{heavy}\nHardware Monitor")));
        assert!(report.ends_with(&format!("\n\n{heavy}\n")));
    }
}
