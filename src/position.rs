// SPDX-License-Identifier: MPL-2.0

//! Where the panel goes on screen.
//!
//! Screens are given in global logical coordinates. The panel is placed on
//! the screen chosen by `monitor_index`, shifted by the configured offsets
//! and then kept fully inside that screen.

use crate::config::{Appearance, Position};

/// Extra gap kept above the bottom edge, clear of docks and panels.
const BOTTOM_MARGIN: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ScreenRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Screen at `index`, or the first screen when the index is out of range.
pub fn select_screen(screens: &[ScreenRect], index: usize) -> Option<ScreenRect> {
    screens.get(index).or_else(|| screens.first()).copied()
}

/// Global top-left corner for a panel of `size` (width, height).
pub fn calculate_position(
    appearance: &Appearance,
    size: (i32, i32),
    screens: &[ScreenRect],
) -> (i32, i32) {
    let (width, height) = size;
    let [custom_x, custom_y] = appearance.custom_position;

    let Some(screen) = select_screen(screens, appearance.monitor_index) else {
        return (
            custom_x.saturating_add(appearance.offset_x),
            custom_y.saturating_add(appearance.offset_y),
        );
    };

    let left = screen.x;
    let right = screen.x + screen.width - width;
    let top = screen.y;
    let bottom = screen.y + screen.height - height - BOTTOM_MARGIN;

    let (x, y) = match appearance.position {
        Position::TopLeft => (left, top),
        Position::TopRight => (right, top),
        Position::BottomLeft => (left, bottom),
        Position::BottomRight => (right, bottom),
        Position::Center => (
            screen.x + (screen.width - width) / 2,
            screen.y + (screen.height - height) / 2,
        ),
        Position::Custom => (
            screen.x.saturating_add(custom_x),
            screen.y.saturating_add(custom_y),
        ),
    };

    clamp_to_screen(
        (
            x.saturating_add(appearance.offset_x),
            y.saturating_add(appearance.offset_y),
        ),
        size,
        screen,
    )
}

/// Keep the whole panel on `screen`; oversized panels stick to its top-left.
pub fn clamp_to_screen(pos: (i32, i32), size: (i32, i32), screen: ScreenRect) -> (i32, i32) {
    let max_x = screen.x + (screen.width - size.0).max(0);
    let max_y = screen.y + (screen.height - size.1).max(0);
    (pos.0.clamp(screen.x, max_x), pos.1.clamp(screen.y, max_y))
}

/// Record a dragged position as the custom placement.
///
/// The stored coordinates are relative to `screen` and exclude the offsets,
/// so [`calculate_position`] puts the panel back exactly at `pos`.
pub fn update_custom_position(appearance: &mut Appearance, pos: (i32, i32), screen: ScreenRect) {
    appearance.position = Position::Custom;
    appearance.custom_position = [
        pos.0.saturating_sub(screen.x).saturating_sub(appearance.offset_x),
        pos.1.saturating_sub(screen.y).saturating_sub(appearance.offset_y),
    ];
}

/// Layer-shell `(top, left)` margins for a surface anchored to the top-left
/// corner of `screen`.
pub fn screen_margins(pos: (i32, i32), screen: ScreenRect) -> (i32, i32) {
    (pos.1 - screen.y, pos.0 - screen.x)
}
