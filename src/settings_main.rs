// SPDX-License-Identifier: MPL-2.0

use cosmic::iced::{Limits, Size};
use hwoverlay::process::{PidFile, SETTINGS_BIN};
use hwoverlay::settings::SettingsApp;

fn main() -> cosmic::iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Get the system's preferred languages.
    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();

    // Enable localizations to be applied.
    hwoverlay::i18n::init(&requested_languages);

    // Lets the tray and the overlay see that the dialog is already open.
    let _pid_file = match PidFile::create(SETTINGS_BIN) {
        Ok(pid_file) => Some(pid_file),
        Err(e) => {
            log::warn!("Could not write pid file: {}", e);
            None
        }
    };

    let settings = cosmic::app::Settings::default()
        .size(Size::new(560.0, 760.0))
        .size_limits(Limits::NONE.min_width(420.0).min_height(360.0));

    // Starts the settings app's event loop
    cosmic::app::run::<SettingsApp>(settings, ())
}
