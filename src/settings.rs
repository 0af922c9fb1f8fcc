// SPDX-License-Identifier: MPL-2.0

//! # Settings Dialog
//!
//! [`SettingsForm`] holds the edited configuration plus the raw text of the
//! free-form fields and applies every [`Message`]. [`SettingsApp`] is the
//! COSMIC window around it and only turns the form into widgets.
//!
//! Nothing is written until Save. The running overlay notices the new file
//! on its next config poll.

use cosmic::app::{Core, Task};
use cosmic::iced::Length;
use cosmic::widget::{self, icon, settings};
use cosmic::{ApplicationExt, Element};

use crate::config::{Config, ConfigManager, LayoutType, Position};
use crate::display::parse_hex_color;
use crate::fl;
use crate::i18n::tr;
use crate::metric::{Component, Metric};

pub const APP_ID: &str = "io.github.hwoverlay.Settings";

/// Update interval choices, in seconds.
pub const REFRESH_CHOICES: [f64; 4] = [0.5, 1.0, 2.0, 5.0];

pub const OFFSET_LIMIT: i32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // Appearance
    FontFamily(String),
    FontSize(u32),
    FontColor(String),
    OutlineColor(String),
    BorderColor(String),
    ShowBorder(bool),
    OpacityPercent(u32),
    KeepOnTop(bool),
    // Position
    Position(usize),
    Monitor(String),
    Padding(u32),
    OffsetX(String),
    OffsetY(String),
    RefreshRate(usize),
    // Layout
    LayoutType(usize),
    Columns(u32),
    Spacing(u32),
    UseScroll(bool),
    MoveComponent(Component, Direction),
    // Display
    ShowComponent(Component, bool),
    ShowTitles(bool),
    CompactMode(bool),
    ShowMetric(Metric, bool),
    MoveMetric(Metric, Direction),
    // Buttons
    Reset,
    Cancel,
    Save,
}

/// What the window should do after a message.
#[derive(Debug, Clone, PartialEq)]
pub enum FormOutcome {
    Continue,
    Save(Box<Config>),
    Close,
}

/// Index of the refresh choice closest to `rate`.
pub fn refresh_choice(rate: f64) -> usize {
    REFRESH_CHOICES
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - rate).abs().total_cmp(&(*b - rate).abs()))
        .map(|(index, _)| index)
        .unwrap_or(1)
}

/// Swap `item` with its neighbour in `ordered` and return the new order.
fn moved<T: Copy + PartialEq>(ordered: Vec<T>, item: T, direction: Direction) -> Vec<T> {
    let mut items = ordered;
    let Some(index) = items.iter().position(|i| *i == item) else {
        return items;
    };
    let target = match direction {
        Direction::Up => index.checked_sub(1),
        Direction::Down => Some(index + 1).filter(|t| *t < items.len()),
    };
    if let Some(target) = target {
        items.swap(index, target);
    }
    items
}

/// Move a component one step and renumber all components 1..n.
pub fn move_component(config: &mut Config, component: Component, direction: Direction) {
    let order = moved(config.layout.ordered_components(), component, direction);
    for (position, component) in order.into_iter().enumerate() {
        config.layout.set_component_order(component, position as u32 + 1);
    }
}

/// Move a metric one step within its component and renumber that
/// component's metrics 1..n.
pub fn move_metric(config: &mut Config, metric: Metric, direction: Direction) {
    let ordered = config.layout.ordered_metrics(metric.component());
    let order = moved(ordered, metric, direction);
    for (position, metric) in order.into_iter().enumerate() {
        config.layout.set_metric_order(metric, position as u32 + 1);
    }
}

#[derive(Debug, Clone)]
pub struct SettingsForm {
    pub config: Config,
    pub monitor_text: String,
    pub offset_x_text: String,
    pub offset_y_text: String,
    /// Validation message from the last Save attempt.
    pub error: Option<String>,
}

impl SettingsForm {
    pub fn new(config: Config) -> Self {
        Self {
            monitor_text: config.appearance.monitor_index.to_string(),
            offset_x_text: config.appearance.offset_x.to_string(),
            offset_y_text: config.appearance.offset_y.to_string(),
            error: None,
            config,
        }
    }

    pub fn apply(&mut self, message: Message) -> FormOutcome {
        let appearance = &mut self.config.appearance;
        let layout = &mut self.config.layout;
        let display = &mut self.config.display;

        match message {
            Message::FontFamily(family) => appearance.font_family = family,
            Message::FontSize(size) => appearance.font_size = size,
            Message::FontColor(color) => appearance.font_color = color,
            Message::OutlineColor(color) => appearance.background_color = color,
            Message::BorderColor(color) => appearance.border_color = color,
            Message::ShowBorder(show) => appearance.show_border = show,
            Message::OpacityPercent(percent) => {
                appearance.opacity = percent.min(100) as f64 / 100.0
            }
            Message::KeepOnTop(on_top) => appearance.keep_on_top = on_top,

            Message::Position(index) => {
                if let Some(position) = Position::ALL.get(index) {
                    appearance.position = *position;
                }
            }
            Message::Monitor(text) => self.monitor_text = text,
            Message::Padding(padding) => appearance.padding = padding,
            Message::OffsetX(text) => self.offset_x_text = text,
            Message::OffsetY(text) => self.offset_y_text = text,
            Message::RefreshRate(index) => {
                if let Some(rate) = REFRESH_CHOICES.get(index) {
                    appearance.refresh_rate = *rate;
                }
            }

            Message::LayoutType(index) => {
                if let Some(layout_type) = LayoutType::ALL.get(index) {
                    layout.layout_type = *layout_type;
                }
            }
            Message::Columns(columns) => layout.columns = columns.clamp(1, 4),
            Message::Spacing(spacing) => layout.spacing = spacing.min(20),
            Message::UseScroll(scroll) => layout.use_scroll = scroll,
            Message::MoveComponent(component, direction) => {
                move_component(&mut self.config, component, direction)
            }

            Message::ShowComponent(component, show) => display.set_component(component, show),
            Message::ShowTitles(show) => display.show_titles = show,
            Message::CompactMode(compact) => display.compact_mode = compact,
            Message::ShowMetric(metric, show) => display.set_metric(metric, show),
            Message::MoveMetric(metric, direction) => {
                move_metric(&mut self.config, metric, direction)
            }

            Message::Reset => *self = SettingsForm::new(Config::default()),
            Message::Cancel => return FormOutcome::Close,
            Message::Save => {
                return match self.validated() {
                    Ok(config) => {
                        self.error = None;
                        FormOutcome::Save(Box::new(config))
                    }
                    Err(message) => {
                        self.error = Some(message);
                        FormOutcome::Continue
                    }
                };
            }
        }
        FormOutcome::Continue
    }

    /// The config with the text fields parsed in, or a message naming the
    /// first invalid field.
    fn validated(&self) -> Result<Config, String> {
        let mut config = self.config.clone();
        let appearance = &mut config.appearance;

        let int = |text: &str| {
            text.trim()
                .parse::<i32>()
                .map_err(|_| fl!("invalid-number", value = text))
        };
        appearance.offset_x = int(&self.offset_x_text)?.clamp(-OFFSET_LIMIT, OFFSET_LIMIT);
        appearance.offset_y = int(&self.offset_y_text)?.clamp(-OFFSET_LIMIT, OFFSET_LIMIT);
        appearance.monitor_index = int(&self.monitor_text)?.max(0) as usize;

        for color in [
            &appearance.font_color,
            &appearance.background_color,
            &appearance.border_color,
        ] {
            if parse_hex_color(color).is_none() {
                return Err(fl!("invalid-color", value = color.as_str()));
            }
        }

        Ok(config)
    }
}

pub struct SettingsApp {
    core: Core,
    manager: Option<ConfigManager>,
    form: SettingsForm,
    position_labels: Vec<String>,
    layout_labels: Vec<String>,
    refresh_labels: Vec<String>,
}

impl SettingsApp {
    fn text_row<'a>(
        label: String,
        value: &'a str,
        on_input: fn(String) -> Message,
    ) -> Element<'a, Message> {
        settings::item(
            label,
            widget::text_input("", value)
                .on_input(on_input)
                .width(Length::Fixed(160.0)),
        )
        .into()
    }

    fn toggle_row<'a>(label: String, value: bool, on_toggle: fn(bool) -> Message) -> Element<'a, Message> {
        settings::item(label, widget::toggler(value).on_toggle(on_toggle)).into()
    }

    fn slider_row<'a>(
        label: String,
        range: std::ops::RangeInclusive<u32>,
        value: u32,
        on_change: fn(u32) -> Message,
    ) -> Element<'a, Message> {
        settings::item(
            format!("{label} ({value})"),
            widget::slider(range, value, on_change).width(Length::Fixed(160.0)),
        )
        .into()
    }

    fn move_buttons<'a>(up: Message, down: Message) -> Element<'a, Message> {
        widget::row::with_capacity(2)
            .spacing(4)
            .push(
                widget::button::icon(icon::from_name("go-up-symbolic")).on_press(up),
            )
            .push(
                widget::button::icon(icon::from_name("go-down-symbolic")).on_press(down),
            )
            .into()
    }

    fn appearance_section(&self) -> Element<'_, Message> {
        let appearance = &self.form.config.appearance;
        settings::section()
            .title(fl!("section-appearance"))
            .add(Self::text_row(
                fl!("font-family"),
                &appearance.font_family,
                Message::FontFamily,
            ))
            .add(Self::slider_row(
                fl!("font-size"),
                6..=32,
                appearance.font_size,
                Message::FontSize,
            ))
            .add(Self::text_row(
                fl!("font-color"),
                &appearance.font_color,
                Message::FontColor,
            ))
            .add(Self::text_row(
                fl!("outline-color"),
                &appearance.background_color,
                Message::OutlineColor,
            ))
            .add(Self::text_row(
                fl!("border-color"),
                &appearance.border_color,
                Message::BorderColor,
            ))
            .add(Self::toggle_row(
                fl!("show-border"),
                appearance.show_border,
                Message::ShowBorder,
            ))
            .add(Self::slider_row(
                fl!("opacity"),
                0..=100,
                (appearance.opacity() * 100.0).round() as u32,
                Message::OpacityPercent,
            ))
            .add(Self::toggle_row(
                fl!("keep-on-top"),
                appearance.keep_on_top,
                Message::KeepOnTop,
            ))
            .into()
    }

    fn position_section(&self) -> Element<'_, Message> {
        let appearance = &self.form.config.appearance;
        let position = Position::ALL
            .iter()
            .position(|p| *p == appearance.position);

        settings::section()
            .title(fl!("section-position"))
            .add(settings::item(
                fl!("position"),
                widget::dropdown(self.position_labels.as_slice(), position, Message::Position),
            ))
            .add(Self::text_row(
                fl!("monitor"),
                &self.form.monitor_text,
                Message::Monitor,
            ))
            .add(Self::slider_row(
                fl!("padding"),
                0..=50,
                appearance.padding,
                Message::Padding,
            ))
            .add(Self::text_row(
                fl!("offset-x"),
                &self.form.offset_x_text,
                Message::OffsetX,
            ))
            .add(Self::text_row(
                fl!("offset-y"),
                &self.form.offset_y_text,
                Message::OffsetY,
            ))
            .add(settings::item(
                fl!("refresh-rate"),
                widget::dropdown(
                    self.refresh_labels.as_slice(),
                    Some(refresh_choice(appearance.refresh_rate)),
                    Message::RefreshRate,
                ),
            ))
            .into()
    }

    fn layout_section(&self) -> Element<'_, Message> {
        let layout = &self.form.config.layout;
        let layout_type = LayoutType::ALL.iter().position(|t| *t == layout.layout_type);

        let mut section = settings::section()
            .title(fl!("section-layout"))
            .add(settings::item(
                fl!("layout-type"),
                widget::dropdown(self.layout_labels.as_slice(), layout_type, Message::LayoutType),
            ))
            .add(Self::slider_row(
                fl!("columns"),
                1..=4,
                layout.columns,
                Message::Columns,
            ))
            .add(Self::slider_row(
                fl!("spacing"),
                0..=20,
                layout.spacing,
                Message::Spacing,
            ))
            .add(Self::toggle_row(
                fl!("use-scroll"),
                layout.use_scroll,
                Message::UseScroll,
            ));

        for component in layout.ordered_components() {
            section = section.add(settings::item(
                tr(&format!("component-{}", component.key())),
                Self::move_buttons(
                    Message::MoveComponent(component, Direction::Up),
                    Message::MoveComponent(component, Direction::Down),
                ),
            ));
        }
        section.into()
    }

    fn display_section(&self) -> Element<'_, Message> {
        let display = &self.form.config.display;
        settings::section()
            .title(fl!("section-display"))
            .add(Self::toggle_row(
                fl!("show-titles"),
                display.show_titles,
                Message::ShowTitles,
            ))
            .add(Self::toggle_row(
                fl!("compact-mode"),
                display.compact_mode,
                Message::CompactMode,
            ))
            .into()
    }

    fn component_section(&self, component: Component) -> Element<'_, Message> {
        let config = &self.form.config;
        let mut section = settings::section()
            .title(tr(&format!("component-{}", component.key())))
            .add(settings::item(
                fl!("section-display"),
                widget::toggler(config.display.shows_component(component))
                    .on_toggle(move |show| Message::ShowComponent(component, show)),
            ));

        for metric in config.layout.ordered_metrics(component) {
            let controls = widget::row::with_capacity(2)
                .spacing(12)
                .push(Self::move_buttons(
                    Message::MoveMetric(metric, Direction::Up),
                    Message::MoveMetric(metric, Direction::Down),
                ))
                .push(
                    widget::toggler(config.display.shows_metric(metric))
                        .on_toggle(move |show| Message::ShowMetric(metric, show)),
                );
            section = section.add(settings::item(
                tr(&format!("metric-{}", metric.key())),
                controls,
            ));
        }
        section.into()
    }
}

impl cosmic::Application for SettingsApp {
    type Executor = cosmic::executor::Default;
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
        let manager = match ConfigManager::new(None) {
            Ok(manager) => Some(manager),
            Err(e) => {
                log::error!("Configuration unavailable, changes cannot be saved: {}", e);
                None
            }
        };
        let config = manager
            .as_ref()
            .map(|m| m.config().clone())
            .unwrap_or_default();

        let mut app = SettingsApp {
            core,
            manager,
            form: SettingsForm::new(config),
            position_labels: vec![
                fl!("position-top-left"),
                fl!("position-top-right"),
                fl!("position-bottom-left"),
                fl!("position-bottom-right"),
                fl!("position-center"),
                fl!("position-custom"),
            ],
            layout_labels: vec![
                fl!("layout-vertical"),
                fl!("layout-horizontal"),
                fl!("layout-grid"),
            ],
            refresh_labels: REFRESH_CHOICES
                .iter()
                .map(|seconds| fl!("refresh-seconds", seconds = seconds.to_string()))
                .collect(),
        };
        app.set_header_title(fl!("settings-title"));

        (app, Task::none())
    }

    fn view(&self) -> Element<'_, Message> {
        let mut sections = vec![
            self.appearance_section(),
            self.position_section(),
            self.layout_section(),
            self.display_section(),
        ];
        sections.extend(Component::ALL.map(|c| self.component_section(c)));

        let mut buttons = widget::row::with_capacity(4).spacing(8);
        if let Some(error) = &self.form.error {
            buttons = buttons.push(widget::text::body(error.clone()));
        }
        buttons = buttons
            .push(widget::horizontal_space())
            .push(widget::button::destructive(fl!("reset")).on_press(Message::Reset))
            .push(widget::button::standard(fl!("cancel")).on_press(Message::Cancel))
            .push(widget::button::suggested(fl!("save")).on_press(Message::Save));

        widget::column::with_capacity(2)
            .spacing(12)
            .padding(16)
            .push(widget::scrollable(settings::view_column(sections)).height(Length::Fill))
            .push(buttons)
            .into()
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match self.form.apply(message) {
            FormOutcome::Continue => Task::none(),
            FormOutcome::Close => cosmic::iced::exit(),
            FormOutcome::Save(config) => {
                let Some(manager) = self.manager.as_mut() else {
                    log::error!("No configuration file to save to");
                    return Task::none();
                };
                match manager.update_config(*config) {
                    Ok(()) => {
                        log::info!("Settings saved to {}", manager.path().display());
                        cosmic::iced::exit()
                    }
                    Err(e) => {
                        log::error!("Failed to save settings: {}", e);
                        self.form.error = Some(e.to_string());
                        Task::none()
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> SettingsForm {
        SettingsForm::new(Config::default())
    }

    #[test]
    fn edits_apply_to_config() {
        let mut form = form();
        form.apply(Message::FontSize(14));
        form.apply(Message::OpacityPercent(45));
        form.apply(Message::Position(4));
        form.apply(Message::RefreshRate(3));
        form.apply(Message::LayoutType(2));
        form.apply(Message::Columns(9));
        form.apply(Message::ShowMetric(Metric::CpuVoltage, false));

        let config = &form.config;
        assert_eq!(config.appearance.font_size, 14);
        assert_eq!(config.appearance.opacity, 0.45);
        assert_eq!(config.appearance.position, Position::Center);
        assert_eq!(config.appearance.refresh_rate, 5.0);
        assert_eq!(config.layout.layout_type, LayoutType::Grid);
        assert_eq!(config.layout.columns, 4);
        assert!(!config.display.shows_metric(Metric::CpuVoltage));
    }

    #[test]
    fn out_of_range_choices_are_ignored() {
        let mut form = form();
        form.apply(Message::Position(42));
        form.apply(Message::RefreshRate(42));
        assert_eq!(form.config, Config::default());
    }

    #[test]
    fn save_parses_and_clamps_text_fields() {
        let mut form = form();
        form.apply(Message::OffsetX("25000".into()));
        form.apply(Message::OffsetY(" -40 ".into()));
        form.apply(Message::Monitor("1".into()));

        let FormOutcome::Save(config) = form.apply(Message::Save) else {
            panic!("expected save");
        };
        assert_eq!(config.appearance.offset_x, OFFSET_LIMIT);
        assert_eq!(config.appearance.offset_y, -40);
        assert_eq!(config.appearance.monitor_index, 1);
        assert!(form.error.is_none());
    }

    #[test]
    fn invalid_fields_block_save() {
        let mut form = form();
        form.apply(Message::OffsetX("left".into()));
        assert_eq!(form.apply(Message::Save), FormOutcome::Continue);
        assert!(form.error.as_deref().unwrap_or_default().contains("left"));

        form.apply(Message::OffsetX("0".into()));
        form.apply(Message::FontColor("white".into()));
        assert_eq!(form.apply(Message::Save), FormOutcome::Continue);
        assert!(form.error.as_deref().unwrap_or_default().contains("white"));
    }

    #[test]
    fn cancel_closes_and_reset_restores_defaults() {
        let mut form = form();
        form.apply(Message::FontSize(30));
        form.apply(Message::OffsetX("12".into()));
        assert_eq!(form.apply(Message::Cancel), FormOutcome::Close);

        form.apply(Message::Reset);
        assert_eq!(form.config, Config::default());
        assert_eq!(form.offset_x_text, "0");
    }

    #[test]
    fn moving_components_renumbers() {
        let mut config = Config::default();
        move_component(&mut config, Component::Ram, Direction::Up);
        assert_eq!(
            config.layout.ordered_components(),
            [Component::Cpu, Component::Ram, Component::Gpu, Component::Network]
        );
        assert_eq!(config.layout.component_order(Component::Ram), 2);
        assert_eq!(config.layout.component_order(Component::Gpu), 3);

        // Already first: nothing moves.
        move_component(&mut config, Component::Cpu, Direction::Up);
        assert_eq!(config.layout.component_order(Component::Cpu), 1);
    }

    #[test]
    fn moving_metrics_stays_within_component() {
        let mut config = Config::default();
        move_metric(&mut config, Metric::NetworkTotalReceived, Direction::Down);
        assert_eq!(config.layout.metric_order(Metric::NetworkTotalReceived), 4);

        move_metric(&mut config, Metric::CpuVoltage, Direction::Up);
        assert_eq!(
            config.layout.ordered_metrics(Component::Cpu),
            [
                Metric::CpuUsage,
                Metric::CpuTemperature,
                Metric::CpuVoltage,
                Metric::CpuFrequency
            ]
        );
        assert_eq!(config.layout.metric_order(Metric::GpuCoreUsage), 1);
    }

    #[test]
    fn refresh_choice_picks_nearest() {
        assert_eq!(refresh_choice(0.5), 0);
        assert_eq!(refresh_choice(1.0), 1);
        assert_eq!(refresh_choice(1.8), 2);
        assert_eq!(refresh_choice(30.0), 3);
    }
}
