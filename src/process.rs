// SPDX-License-Identifier: MPL-2.0

//! Starting and stopping the sibling binaries.
//!
//! The overlay and the settings dialog run as their own processes. Each
//! writes a pid file into the runtime directory while it is alive, which is
//! how the tray applet finds and stops them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};

use crate::config::APP_DIR;

pub const WIDGET_BIN: &str = "hwoverlay-widget";
pub const SETTINGS_BIN: &str = "hwoverlay-settings";

/// Location of the pid file for the process called `name`.
pub fn pid_file(name: &str) -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join(format!("{name}.pid"))
}

/// Pid file that is removed again when dropped.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn create(name: &str) -> io::Result<Self> {
        Self::create_at(pid_file(name))
    }

    pub fn create_at(path: PathBuf) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, std::process::id().to_string())?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            log::debug!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}

fn read_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn is_alive(pid: i32) -> bool {
    // SAFETY: signal 0 only checks that the process exists.
    pid > 0 && unsafe { libc::kill(pid, 0) } == 0
}

#[cfg(not(unix))]
fn is_alive(_pid: i32) -> bool {
    false
}

/// Pid recorded at `path`, if that process still exists.
pub fn running_pid_at(path: &Path) -> Option<i32> {
    read_pid(path).filter(|pid| is_alive(*pid))
}

pub fn running_pid(name: &str) -> Option<i32> {
    running_pid_at(&pid_file(name))
}

pub fn is_running(name: &str) -> bool {
    running_pid(name).is_some()
}

/// Ask the process called `name` to exit. Returns whether a signal was sent.
pub fn terminate(name: &str) -> bool {
    let Some(pid) = running_pid(name) else {
        return false;
    };
    log::info!("Stopping {} (pid {})", name, pid);
    send_terminate(pid)
}

#[cfg(unix)]
fn send_terminate(pid: i32) -> bool {
    // SAFETY: plain SIGTERM to a pid read from our own pid file.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn send_terminate(_pid: i32) -> bool {
    false
}

/// Path of a sibling binary, falling back to a `PATH` lookup.
fn binary_path(name: &str) -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(name)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Spawn the binary called `name`. The caller should `try_wait` the child
/// now and then so it does not linger as a zombie.
pub fn launch(name: &str, args: &[&str]) -> io::Result<Child> {
    let path = binary_path(name);
    log::info!("Launching {}", path.display());
    Command::new(path).args(args).spawn()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn pid_file_lives_until_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("widget.pid");

        let guard = PidFile::create_at(path.clone()).unwrap();
        assert_eq!(guard.path(), path);
        assert_eq!(read_pid(&path), Some(std::process::id() as i32));

        drop(guard);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn own_pid_is_running() {
        let dir = tempdir().unwrap();
        let guard = PidFile::create_at(dir.path().join("self.pid")).unwrap();
        assert_eq!(
            running_pid_at(guard.path()),
            Some(std::process::id() as i32)
        );
    }

    #[test]
    fn stale_or_garbage_pid_files_are_ignored() {
        let dir = tempdir().unwrap();
        let garbage = dir.path().join("garbage.pid");
        fs::write(&garbage, "not a pid").unwrap();
        assert_eq!(running_pid_at(&garbage), None);

        let zero = dir.path().join("zero.pid");
        fs::write(&zero, "0").unwrap();
        assert_eq!(running_pid_at(&zero), None);

        assert_eq!(running_pid_at(&dir.path().join("missing.pid")), None);
    }

    #[test]
    fn pid_files_are_per_binary() {
        assert_ne!(pid_file(WIDGET_BIN), pid_file(SETTINGS_BIN));
        assert!(pid_file(WIDGET_BIN).ends_with("hwoverlay/hwoverlay-widget.pid"));
    }
}
