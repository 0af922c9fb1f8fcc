// SPDX-License-Identifier: MPL-2.0

//! Small readers for Linux sysfs attribute files.
//!
//! hwmon reports temperatures in millidegrees, voltages in millivolts and
//! clocks in hertz; callers convert.

use super::MonitorError;
use std::fs;
use std::path::{Path, PathBuf};

pub const HWMON_ROOT: &str = "/sys/class/hwmon";

/// Read a decimal integer attribute.
pub fn read_int(path: &Path) -> Result<i64, MonitorError> {
    let content = fs::read_to_string(path).map_err(|source| MonitorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = content.trim();
    value.parse::<i64>().map_err(|_| MonitorError::Parse {
        path: path.to_path_buf(),
        value: value.to_string(),
    })
}

/// Read a hexadecimal attribute such as a PCI vendor id (`0x1002`).
pub fn read_hex(path: &Path) -> Result<u32, MonitorError> {
    let content = fs::read_to_string(path).map_err(|source| MonitorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value = content.trim();
    u32::from_str_radix(value.trim_start_matches("0x"), 16).map_err(|_| MonitorError::Parse {
        path: path.to_path_buf(),
        value: value.to_string(),
    })
}

pub fn read_label(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Sorted `hwmon*` directories below `dir`.
pub fn hwmon_dirs(dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("hwmon"))
        })
        .collect();
    dirs.sort();
    dirs
}

/// Find the `<prefix>N_input` channel whose `<prefix>N_label` matches
/// `wanted` (case-insensitive substring), returning the raw value.
pub fn find_labelled_input(hwmon: &Path, prefix: &str, wanted: &[&str]) -> Option<i64> {
    let mut channels: Vec<String> = fs::read_dir(hwmon)
        .ok()?
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.starts_with(prefix) && name.ends_with("_label"))
        .collect();
    channels.sort();

    wanted.iter().find_map(|needle| {
        channels.iter().find_map(|label_file| {
            let label = read_label(&hwmon.join(label_file))?.to_lowercase();
            if !label.contains(needle) {
                return None;
            }
            let input = label_file.replace("_label", "_input");
            read_int(&hwmon.join(input)).ok()
        })
    })
}

/// CPU core voltage from motherboard sensor chips (`in*_label` "Vcore").
pub fn cpu_voltage(root: &Path) -> Option<f64> {
    hwmon_dirs(root)
        .iter()
        .find_map(|dir| find_labelled_input(dir, "in", &["vcore", "cpu"]))
        .map(|millivolts| millivolts as f64 / 1000.0)
}
