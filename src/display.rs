// SPDX-License-Identifier: MPL-2.0

//! # Panel Layout and Rendering
//!
//! Turning a metrics snapshot into pixels happens in three steps:
//!
//! 1. [`arrange`] picks the visible components and metric lines in their
//!    configured order and formats them.
//! 2. [`compute_layout`] sizes and places each section for the vertical,
//!    horizontal or grid arrangement. Text measurement is passed in, so the
//!    geometry is independent of any font backend.
//! 3. [`render_panel`] draws the result with cairo and pango: white text with
//!    a dark outline on a transparent background, composited at the
//!    configured opacity.

use crate::config::{Appearance, Config, LayoutType};
use crate::formatter::format_metric;
use crate::monitor::Metrics;

/// Most lines shown for one component.
pub const MAX_LINES: usize = 10;

/// Outline width around glyphs and section borders.
const STROKE_WIDTH: f64 = 2.0;

// ============================================================================
// Sections
// ============================================================================

/// One block of text: an optional title and its metric lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: Option<String>,
    pub lines: Vec<String>,
}

/// Visible sections for `metrics`, ordered per the layout settings.
pub fn arrange(config: &Config, metrics: &Metrics) -> Vec<Section> {
    let display = &config.display;

    config
        .layout
        .ordered_components()
        .into_iter()
        .filter(|component| display.shows_component(*component))
        .map(|component| Section {
            title: display
                .show_titles
                .then(|| component.title().to_string()),
            lines: config
                .layout
                .ordered_metrics(component)
                .into_iter()
                .filter(|metric| display.shows_metric(*metric))
                .take(MAX_LINES)
                .map(|metric| format_metric(metrics, metric))
                .collect(),
        })
        .collect()
}

/// Single untitled section shown before the first snapshot arrives.
pub fn placeholder(text: &str) -> Vec<Section> {
    vec![Section {
        title: None,
        lines: vec![text.to_string()],
    }]
}

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A string positioned at its top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub bold: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedSection {
    pub frame: Rect,
    pub texts: Vec<PlacedText>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelLayout {
    pub width: i32,
    pub height: i32,
    pub sections: Vec<PlacedSection>,
}

/// A section measured on its own, text positions relative to its frame.
struct SectionBox {
    width: f64,
    height: f64,
    texts: Vec<PlacedText>,
}

fn measure_section<F>(section: &Section, margin: f64, line_gap: f64, measure: &F) -> SectionBox
where
    F: Fn(&str, bool) -> (f64, f64),
{
    let entries = section
        .title
        .iter()
        .map(|title| (title, true))
        .chain(section.lines.iter().map(|line| (line, false)));

    let mut texts = Vec::new();
    let mut widest: f64 = 0.0;
    let mut y = margin;
    for (text, bold) in entries {
        let (width, height) = measure(text, bold);
        texts.push(PlacedText {
            x: margin,
            y,
            text: text.clone(),
            bold,
        });
        widest = widest.max(width);
        y += height + line_gap;
    }
    if !texts.is_empty() {
        y -= line_gap;
    }

    SectionBox {
        width: widest + 2.0 * margin,
        height: y + margin,
        texts,
    }
}

fn pixel_limit(max: u32) -> i32 {
    i32::try_from(max).unwrap_or(i32::MAX).max(1)
}

/// Place every section and size the panel.
///
/// `measure` returns the pixel size of a string, in bold for titles. The
/// panel keeps `padding` on every side and is cut to `max_width` by
/// `max_height`.
pub fn compute_layout<F>(config: &Config, sections: &[Section], measure: F) -> PanelLayout
where
    F: Fn(&str, bool) -> (f64, f64),
{
    let compact = config.display.compact_mode;
    let margin = if compact { 3.0 } else { 5.0 };
    let line_gap = if compact { 0.0 } else { 2.0 };
    let spacing = if compact {
        config.layout.spacing as f64 / 2.0
    } else {
        config.layout.spacing as f64
    };
    let padding = config.appearance.padding as f64;

    let boxes: Vec<SectionBox> = sections
        .iter()
        .map(|section| measure_section(section, margin, line_gap, &measure))
        .collect();

    let columns = match config.layout.layout_type {
        LayoutType::Vertical => 1,
        LayoutType::Horizontal => boxes.len().max(1),
        LayoutType::Grid => usize::try_from(config.layout.columns)
            .unwrap_or(usize::MAX)
            .clamp(1, boxes.len().max(1)),
    };
    let rows = boxes.len().div_ceil(columns);

    // Every cell in a column shares the widest width, every cell in a row
    // the tallest height.
    let mut column_widths = vec![0.0f64; columns];
    let mut row_heights = vec![0.0f64; rows];
    for (index, section) in boxes.iter().enumerate() {
        let (row, column) = (index / columns, index % columns);
        column_widths[column] = column_widths[column].max(section.width);
        row_heights[row] = row_heights[row].max(section.height);
    }

    let column_x: Vec<f64> = column_widths
        .iter()
        .scan(padding, |x, width| {
            let start = *x;
            *x += width + spacing;
            Some(start)
        })
        .collect();
    let row_y: Vec<f64> = row_heights
        .iter()
        .scan(padding, |y, height| {
            let start = *y;
            *y += height + spacing;
            Some(start)
        })
        .collect();

    let placed: Vec<PlacedSection> = boxes
        .into_iter()
        .enumerate()
        .map(|(index, section)| {
            let (row, column) = (index / columns, index % columns);
            let frame = Rect {
                x: column_x[column],
                y: row_y[row],
                width: column_widths[column],
                height: row_heights[row],
            };
            let texts = section
                .texts
                .into_iter()
                .map(|text| PlacedText {
                    x: frame.x + text.x,
                    y: frame.y + text.y,
                    ..text
                })
                .collect();
            PlacedSection { frame, texts }
        })
        .collect();

    let content_width = placed
        .iter()
        .map(|s| s.frame.x + s.frame.width)
        .fold(padding, f64::max);
    let content_height = placed
        .iter()
        .map(|s| s.frame.y + s.frame.height)
        .fold(padding, f64::max);

    let width = (content_width + padding).ceil() as i32;
    let height = (content_height + padding).ceil() as i32;

    PanelLayout {
        width: width.clamp(1, pixel_limit(config.appearance.max_width)),
        height: height.clamp(1, pixel_limit(config.appearance.max_height)),
        sections: placed,
    }
}

// ============================================================================
// Rendering
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
}

/// Parse `#RRGGBB` (the `#` is optional).
pub fn parse_hex_color(value: &str) -> Option<Rgb> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(|v| v as f64 / 255.0)
    };
    Some(Rgb {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
    })
}

/// Fonts and colours resolved from [`Appearance`].
#[derive(Debug, Clone)]
pub struct PanelStyle {
    pub font: pango::FontDescription,
    pub title_font: pango::FontDescription,
    pub text: Rgb,
    pub outline: Rgb,
    pub border: Option<Rgb>,
    pub opacity: f64,
}

impl PanelStyle {
    pub fn from_appearance(appearance: &Appearance) -> Self {
        let mut font = pango::FontDescription::new();
        font.set_family(&appearance.font_family);
        font.set_size(appearance.font_size.clamp(4, 96) as i32 * pango::SCALE);
        let mut title_font = font.clone();
        title_font.set_weight(pango::Weight::Bold);

        Self {
            font,
            title_font,
            text: parse_hex_color(&appearance.font_color).unwrap_or(Rgb::WHITE),
            outline: parse_hex_color(&appearance.background_color).unwrap_or(Rgb::BLACK),
            border: appearance
                .show_border
                .then(|| parse_hex_color(&appearance.border_color).unwrap_or(Rgb::BLACK)),
            opacity: appearance.opacity(),
        }
    }

    fn font_for(&self, bold: bool) -> &pango::FontDescription {
        if bold { &self.title_font } else { &self.font }
    }
}

/// Measures strings with pango on a scratch surface.
pub struct TextMeasurer {
    _context: cairo::Context,
    layout: pango::Layout,
    style: PanelStyle,
}

impl TextMeasurer {
    pub fn new(style: &PanelStyle) -> Result<Self, cairo::Error> {
        let surface = cairo::ImageSurface::create(cairo::Format::ARgb32, 1, 1)?;
        let context = cairo::Context::new(&surface)?;
        let layout = pangocairo::functions::create_layout(&context);
        Ok(Self {
            _context: context,
            layout,
            style: style.clone(),
        })
    }

    /// Pixel size of `text`, including room for the outline.
    pub fn measure(&self, text: &str, bold: bool) -> (f64, f64) {
        self.layout.set_font_description(Some(self.style.font_for(bold)));
        self.layout.set_text(text);
        let (width, height) = self.layout.pixel_size();
        (width as f64 + STROKE_WIDTH, height as f64 + STROKE_WIDTH)
    }
}

fn set_source(cr: &cairo::Context, color: Rgb) {
    cr.set_source_rgb(color.r, color.g, color.b);
}

/// Draw `layout` onto `cr`, which must cover at least the panel size.
pub fn render_panel(
    cr: &cairo::Context,
    layout: &PanelLayout,
    style: &PanelStyle,
) -> Result<(), cairo::Error> {
    // Clear background to fully transparent
    cr.save()?;
    cr.set_operator(cairo::Operator::Source);
    cr.set_source_rgba(0.0, 0.0, 0.0, 0.0);
    cr.paint()?;
    cr.restore()?;

    cr.push_group();
    let text_layout = pangocairo::functions::create_layout(cr);
    cr.set_line_width(STROKE_WIDTH);

    for section in &layout.sections {
        if let Some(border) = style.border {
            let frame = section.frame;
            set_source(cr, border);
            cr.rectangle(
                frame.x + STROKE_WIDTH / 2.0,
                frame.y + STROKE_WIDTH / 2.0,
                frame.width - STROKE_WIDTH,
                frame.height - STROKE_WIDTH,
            );
            cr.stroke()?;
        }

        for text in &section.texts {
            text_layout.set_font_description(Some(style.font_for(text.bold)));
            text_layout.set_text(&text.text);

            // Outline first, then fill the glyphs
            cr.move_to(text.x + STROKE_WIDTH / 2.0, text.y + STROKE_WIDTH / 2.0);
            pangocairo::functions::layout_path(cr, &text_layout);
            set_source(cr, style.outline);
            cr.stroke_preserve()?;
            set_source(cr, style.text);
            cr.fill()?;
        }
    }

    cr.pop_group_to_source()?;
    cr.paint_with_alpha(style.opacity)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Component, Metric};

    /// 7px per character, 14px per line; titles a little wider.
    fn measure(text: &str, bold: bool) -> (f64, f64) {
        let per_char = if bold { 8.0 } else { 7.0 };
        (text.chars().count() as f64 * per_char, 14.0)
    }

    fn section(title: &str, lines: usize) -> Section {
        Section {
            title: Some(title.to_string()),
            lines: (0..lines).map(|i| format!("line {i}")).collect(),
        }
    }

    #[test]
    fn arrange_follows_order_and_visibility() {
        let mut config = Config::default();
        config.layout.set_component_order(Component::Network, 0);
        config.layout.set_metric_order(Metric::NetworkTotalReceived, 0);
        config.display.set_component(Component::Gpu, false);
        config.display.set_metric(Metric::NetworkUploadSpeed, false);

        let sections = arrange(&config, &Metrics::default());
        let titles: Vec<_> = sections.iter().filter_map(|s| s.title.clone()).collect();
        assert_eq!(titles, ["NETWORK", "CPU", "RAM"]);
        assert_eq!(
            sections[0].lines,
            ["Total Recv: N/A", "Download: N/A", "Total Sent: N/A"]
        );
    }

    #[test]
    fn arrange_without_titles() {
        let mut config = Config::default();
        config.display.show_titles = false;
        let sections = arrange(&config, &Metrics::default());
        assert!(sections.iter().all(|s| s.title.is_none()));
        assert_eq!(sections[1].lines.len(), 9);
    }

    #[test]
    fn vertical_layout_stacks_sections() {
        let config = Config::default();
        let layout = compute_layout(&config, &[section("CPU", 2), section("RAM", 1)], measure);

        // 3 lines: 5 + 14 + 2 + 14 + 2 + 14 + 5 = 56
        assert_eq!(layout.sections[0].frame.height, 56.0);
        assert_eq!(layout.sections[1].frame.y, 10.0 + 56.0 + 5.0);
        assert_eq!(layout.sections[0].frame.x, layout.sections[1].frame.x);
        assert_eq!(layout.sections[0].frame.width, layout.sections[1].frame.width);
        // 2 lines: 5 + 14 + 2 + 14 + 5 = 40, plus padding
        assert_eq!(layout.height, (10.0 + 56.0 + 5.0 + 40.0 + 10.0) as i32);
        assert_eq!(layout.sections[0].texts[0].bold, true);
        assert_eq!(layout.sections[0].texts[1].y, 10.0 + 5.0 + 14.0 + 2.0);
    }

    #[test]
    fn horizontal_layout_places_side_by_side() {
        let mut config = Config::default();
        config.layout.layout_type = LayoutType::Horizontal;
        let layout = compute_layout(&config, &[section("CPU", 3), section("GPU", 1)], measure);

        let first = layout.sections[0].frame;
        let second = layout.sections[1].frame;
        assert_eq!(first.y, second.y);
        assert_eq!(second.x, first.x + first.width + 5.0);
        assert_eq!(first.height, second.height);
    }

    #[test]
    fn grid_layout_wraps_columns() {
        let mut config = Config::default();
        config.layout.layout_type = LayoutType::Grid;
        config.layout.columns = 2;
        let sections = [section("A", 1), section("B", 1), section("C", 1)];
        let layout = compute_layout(&config, &sections, measure);

        assert_eq!(layout.sections[0].frame.y, layout.sections[1].frame.y);
        assert!(layout.sections[2].frame.y > layout.sections[0].frame.y);
        assert_eq!(layout.sections[2].frame.x, layout.sections[0].frame.x);
    }

    #[test]
    fn panel_is_cut_to_maximum_size() {
        let mut config = Config::default();
        config.appearance.max_width = 50;
        config.appearance.max_height = 30;
        let layout = compute_layout(&config, &[section("CPU", 10)], measure);
        assert_eq!((layout.width, layout.height), (50, 30));
    }

    #[test]
    fn huge_maximum_size_does_not_limit() {
        let mut config = Config::default();
        config.appearance.max_width = u32::MAX;
        config.appearance.max_height = u32::MAX;
        let empty = compute_layout(&config, &[], measure);
        assert_eq!((empty.width, empty.height), (20, 20));

        let full = compute_layout(&config, &[section("CPU", 2)], measure);
        assert_eq!(full.height, (10.0 + 56.0 + 10.0) as i32);
    }

    #[test]
    fn grid_columns_are_bounded_by_sections() {
        let mut config = Config::default();
        config.layout.layout_type = LayoutType::Grid;
        config.layout.columns = 4_000_000_000;
        let sections = [section("A", 1), section("B", 1)];
        let layout = compute_layout(&config, &sections, measure);

        let mut horizontal = config.clone();
        horizontal.layout.layout_type = LayoutType::Horizontal;
        let expected = compute_layout(&horizontal, &sections, measure);
        assert_eq!((layout.width, layout.height), (expected.width, expected.height));

        config.layout.columns = 0;
        let single = compute_layout(&config, &sections, measure);
        assert_eq!(single.sections[0].frame.x, single.sections[1].frame.x);
    }

    #[test]
    fn compact_mode_is_tighter() {
        let mut config = Config::default();
        let normal = compute_layout(&config, &[section("CPU", 4)], measure);
        config.display.compact_mode = true;
        let compact = compute_layout(&config, &[section("CPU", 4)], measure);
        assert!(compact.height < normal.height);
    }

    #[test]
    fn empty_panel_is_just_padding() {
        let layout = compute_layout(&Config::default(), &[], measure);
        assert_eq!((layout.width, layout.height), (20, 20));
        assert!(layout.sections.is_empty());
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("#FFFFFF"), Some(Rgb::WHITE));
        assert_eq!(parse_hex_color("000000"), Some(Rgb::BLACK));
        let orange = parse_hex_color("#ff8000").unwrap();
        assert_eq!(orange.g, 128.0 / 255.0);
        assert_eq!(parse_hex_color("#FFF"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
    }

    #[test]
    fn renders_into_image_surface() {
        let config = Config::default();
        let style = PanelStyle::from_appearance(&config.appearance);
        let measurer = TextMeasurer::new(&style).unwrap();
        let sections = placeholder("Collecting data...");
        let layout = compute_layout(&config, &sections, |t, b| measurer.measure(t, b));

        let surface =
            cairo::ImageSurface::create(cairo::Format::ARgb32, layout.width, layout.height).unwrap();
        let cr = cairo::Context::new(&surface).unwrap();
        render_panel(&cr, &layout, &style).unwrap();
        assert!(layout.width > 20);
    }
}
