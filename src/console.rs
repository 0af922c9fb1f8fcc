// SPDX-License-Identifier: MPL-2.0

//! Show and hide the console window the process was started from.
//!
//! Only Windows attaches a console window that can be toggled. On other
//! platforms every operation reports `false` and the state never changes.

use std::sync::atomic::{AtomicBool, Ordering};

static CONSOLE_VISIBLE: AtomicBool = AtomicBool::new(true);

pub struct ConsoleHandler;

impl ConsoleHandler {
    pub fn is_supported() -> bool {
        cfg!(windows)
    }

    pub fn is_console_visible() -> bool {
        CONSOLE_VISIBLE.load(Ordering::SeqCst)
    }

    /// Returns whether the console was hidden.
    pub fn hide_console() -> bool {
        Self::set_visible(false)
    }

    /// Returns whether the console was shown.
    pub fn show_console() -> bool {
        Self::set_visible(true)
    }

    /// Flip visibility. Returns the new state, or `false` when unsupported.
    pub fn toggle_console() -> bool {
        if !Self::is_supported() {
            return false;
        }
        let visible = !Self::is_console_visible();
        if Self::set_visible(visible) {
            visible
        } else {
            Self::is_console_visible()
        }
    }

    fn set_visible(visible: bool) -> bool {
        if !platform::set_console_visible(visible) {
            return false;
        }
        CONSOLE_VISIBLE.store(visible, Ordering::SeqCst);
        log::debug!("Console {}", if visible { "shown" } else { "hidden" });
        true
    }
}

#[cfg(windows)]
mod platform {
    use windows::Win32::System::Console::GetConsoleWindow;
    use windows::Win32::UI::WindowsAndMessaging::{SW_HIDE, SW_SHOW, ShowWindow};

    pub fn set_console_visible(visible: bool) -> bool {
        // SAFETY: both calls only take the console handle owned by this process.
        unsafe {
            let hwnd = GetConsoleWindow();
            if hwnd.0.is_null() {
                log::debug!("No console window attached");
                return false;
            }
            let _ = ShowWindow(hwnd, if visible { SW_SHOW } else { SW_HIDE });
        }
        true
    }
}

#[cfg(not(windows))]
mod platform {
    pub fn set_console_visible(_visible: bool) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(windows))]
    #[test]
    fn unsupported_platforms_leave_state_alone() {
        assert!(!ConsoleHandler::is_supported());
        assert!(!ConsoleHandler::hide_console());
        assert!(!ConsoleHandler::toggle_console());
        assert!(!ConsoleHandler::show_console());
        assert!(ConsoleHandler::is_console_visible());
    }
}
