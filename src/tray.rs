// SPDX-License-Identifier: MPL-2.0

//! COSMIC panel applet that controls the overlay.
//!
//! The panel icon shows the current CPU load. Its popup menu toggles the
//! overlay process, opens the settings dialog, toggles the console where
//! that is possible, and quits everything.

use std::process::Child;
use std::time::Duration;

use cosmic::app::{Core, Task};
use cosmic::applet::{menu_button, padded_control};
use cosmic::iced::platform_specific::shell::commands::popup::{destroy_popup, get_popup};
use cosmic::iced::window::Id;
use cosmic::iced::{Limits, Subscription};
use cosmic::widget::{self, icon};
use cosmic::Element;
use sysinfo::System;

use crate::config::{Config, ConfigManager};
use crate::console::ConsoleHandler;
use crate::fl;
use crate::process::{self, SETTINGS_BIN, WIDGET_BIN};

pub const APP_ID: &str = "io.github.hwoverlay.Applet";

/// CPU load bucket shown by the panel icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadLevel {
    /// No sample yet.
    Idle,
    Low,
    Medium,
    High,
}

impl LoadLevel {
    pub fn from_usage(usage: Option<f32>) -> Self {
        match usage {
            None => LoadLevel::Idle,
            Some(u) if u < 30.0 => LoadLevel::Low,
            Some(u) if u < 70.0 => LoadLevel::Medium,
            Some(_) => LoadLevel::High,
        }
    }

    fn icon(self) -> icon::Handle {
        let bytes: &'static [u8] = match self {
            LoadLevel::Idle => include_bytes!("../resources/icons/load-idle.svg"),
            LoadLevel::Low => include_bytes!("../resources/icons/load-low.svg"),
            LoadLevel::Medium => include_bytes!("../resources/icons/load-medium.svg"),
            LoadLevel::High => include_bytes!("../resources/icons/load-high.svg"),
        };
        icon::from_svg_bytes(bytes)
    }
}

/// First line of the popup.
pub fn status_text(usage: Option<f32>) -> String {
    match usage {
        Some(usage) => fl!("tray-status", cpu = format!("{usage:.1}")),
        None => fl!("tray-collecting"),
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    TogglePopup,
    PopupClosed(Id),
    Tick,
    ToggleWidget,
    OpenSettings,
    ToggleConsole,
    Exit,
}

pub struct TrayApplet {
    core: Core,
    popup: Option<Id>,
    config: Config,
    config_manager: Option<ConfigManager>,
    system: System,
    cpu_usage: Option<f32>,
    widget_running: bool,
    console_visible: bool,
    /// Processes started by us, reaped on every tick.
    children: Vec<Child>,
}

impl TrayApplet {
    fn refresh_interval(&self) -> Duration {
        self.config.appearance.refresh_interval()
    }

    fn spawn(&mut self, name: &str) {
        match process::launch(name, &[]) {
            Ok(child) => self.children.push(child),
            Err(e) => log::error!("Failed to launch {}: {}", name, e),
        }
    }

    fn reap_children(&mut self) {
        self.children.retain_mut(|child| match child.try_wait() {
            Ok(Some(status)) => {
                log::debug!("Child {} exited with {}", child.id(), status);
                false
            }
            Ok(None) => true,
            Err(e) => {
                log::warn!("Could not query child {}: {}", child.id(), e);
                false
            }
        });
    }

    fn reload_config(&mut self) {
        let Some(manager) = &self.config_manager else {
            return;
        };
        match manager.read_current() {
            Ok(config) => self.config = config,
            Err(e) => log::debug!("Keeping previous configuration: {}", e),
        }
    }

    fn toggle_popup(&mut self) -> Task<Message> {
        if let Some(popup) = self.popup.take() {
            return destroy_popup(popup);
        }
        let Some(parent) = self.core.main_window_id() else {
            return Task::none();
        };

        let new_id = Id::unique();
        self.popup = Some(new_id);
        let mut popup_settings =
            self.core
                .applet
                .get_popup_settings(parent, new_id, None, None, None);
        popup_settings.positioner.size_limits = Limits::NONE
            .max_width(372.0)
            .min_width(300.0)
            .min_height(100.0)
            .max_height(600.0);
        get_popup(popup_settings)
    }
}

impl cosmic::Application for TrayApplet {
    type Executor = cosmic::SingleThreadExecutor;
    type Flags = ();
    type Message = Message;

    const APP_ID: &'static str = APP_ID;

    fn core(&self) -> &Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    fn init(core: Core, _flags: Self::Flags) -> (Self, Task<Self::Message>) {
        let config_manager = match ConfigManager::new(None) {
            Ok(manager) => Some(manager),
            Err(e) => {
                log::error!("Configuration unavailable: {}", e);
                None
            }
        };
        let config = config_manager
            .as_ref()
            .map(|m| m.config().clone())
            .unwrap_or_default();

        let mut system = System::new();
        system.refresh_cpu_usage();

        let mut applet = TrayApplet {
            core,
            popup: None,
            config,
            config_manager,
            system,
            cpu_usage: None,
            widget_running: process::is_running(WIDGET_BIN),
            console_visible: ConsoleHandler::is_console_visible(),
            children: Vec::new(),
        };

        if !applet.widget_running {
            applet.spawn(WIDGET_BIN);
            applet.widget_running = true;
        }

        (applet, Task::none())
    }

    fn on_close_requested(&self, id: Id) -> Option<Message> {
        Some(Message::PopupClosed(id))
    }

    fn view(&self) -> Element<'_, Message> {
        self.core
            .applet
            .icon_button_from_handle(LoadLevel::from_usage(self.cpu_usage).icon())
            .on_press(Message::TogglePopup)
            .into()
    }

    fn view_window(&self, _id: Id) -> Element<'_, Message> {
        let widget_label = if self.widget_running {
            fl!("tray-hide-widget")
        } else {
            fl!("tray-show-widget")
        };

        let mut content = widget::column::with_capacity(6)
            .padding([8, 0])
            .push(padded_control(widget::text::heading(status_text(
                self.cpu_usage,
            ))))
            .push(padded_control(widget::divider::horizontal::default()))
            .push(menu_button(widget::text::body(widget_label)).on_press(Message::ToggleWidget))
            .push(
                menu_button(widget::text::body(fl!("tray-settings")))
                    .on_press(Message::OpenSettings),
            );

        if ConsoleHandler::is_supported() {
            let console_label = if self.console_visible {
                fl!("tray-hide-console")
            } else {
                fl!("tray-show-console")
            };
            content = content.push(
                menu_button(widget::text::body(console_label)).on_press(Message::ToggleConsole),
            );
        }

        content = content
            .push(padded_control(widget::divider::horizontal::default()))
            .push(menu_button(widget::text::body(fl!("tray-exit"))).on_press(Message::Exit));

        self.core.applet.popup_container(content).into()
    }

    fn subscription(&self) -> Subscription<Message> {
        cosmic::iced::time::every(self.refresh_interval()).map(|_| Message::Tick)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TogglePopup => return self.toggle_popup(),
            Message::PopupClosed(id) => {
                if self.popup.as_ref() == Some(&id) {
                    self.popup = None;
                }
            }
            Message::Tick => {
                self.system.refresh_cpu_usage();
                self.cpu_usage = Some(self.system.global_cpu_usage());
                self.widget_running = process::is_running(WIDGET_BIN);
                self.reap_children();
                self.reload_config();
            }
            Message::ToggleWidget => {
                if self.widget_running {
                    process::terminate(WIDGET_BIN);
                    self.widget_running = false;
                } else {
                    self.spawn(WIDGET_BIN);
                    self.widget_running = true;
                }
            }
            Message::OpenSettings => {
                if process::is_running(SETTINGS_BIN) {
                    log::info!("Settings dialog already open");
                } else {
                    self.spawn(SETTINGS_BIN);
                }
            }
            Message::ToggleConsole => {
                ConsoleHandler::toggle_console();
                self.console_visible = ConsoleHandler::is_console_visible();
            }
            Message::Exit => {
                log::info!("Exiting");
                process::terminate(WIDGET_BIN);
                ConsoleHandler::show_console();
                self.reap_children();
                return cosmic::iced::exit();
            }
        }
        Task::none()
    }

    fn style(&self) -> Option<cosmic::iced_runtime::Appearance> {
        Some(cosmic::applet::style())
    }
}
