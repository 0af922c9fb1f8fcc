// SPDX-License-Identifier: MPL-2.0

//! Hardware monitor overlay.
//!
//! The crate is shared by four binaries: the layer-shell overlay, the COSMIC
//! panel applet that controls it, the settings dialog and a console monitor.
//! They talk to each other only through the JSON config file and pid files.

pub mod config;
pub mod console;
pub mod display;
pub mod formatter;
pub mod i18n;
pub mod metric;
pub mod monitor;
pub mod position;
pub mod process;
pub mod settings;
pub mod tray;
pub mod worker;
