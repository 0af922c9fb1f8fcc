// SPDX-License-Identifier: MPL-2.0

//! Hardware overlay drawn on a Wayland layer-shell surface.
//!
//! The surface has no decorations, takes no keyboard focus and reserves no
//! space. It sits on the `Top` layer when "keep on top" is set and on the
//! `Bottom` layer otherwise.

use std::error::Error;
use std::os::fd::AsRawFd;
use std::path::PathBuf;
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use clap::Parser;
use hwoverlay::config::{Config, ConfigManager};
use hwoverlay::display::{
    PanelLayout, PanelStyle, TextMeasurer, arrange, compute_layout, placeholder, render_panel,
};
use hwoverlay::fl;
use hwoverlay::monitor::{HardwareMonitor, Metrics};
use hwoverlay::position::{
    ScreenRect, calculate_position, clamp_to_screen, screen_margins, select_screen,
    update_custom_position,
};
use hwoverlay::process::{self, PidFile, SETTINGS_BIN, WIDGET_BIN};
use hwoverlay::worker::{MetricsWorker, WorkerEvent};

use smithay_client_toolkit::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_pointer, delegate_registry,
    delegate_seat, delegate_shm,
    output::{OutputHandler, OutputState},
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    seat::pointer::{PointerEvent, PointerEventKind, PointerHandler},
    seat::{Capability, SeatHandler, SeatState},
    shell::{
        WaylandSurface,
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
    },
    shm::{Shm, ShmHandler, slot::SlotPool},
};
use wayland_client::{
    Connection, QueueHandle,
    backend::WaylandError,
    globals::registry_queue_init,
    protocol::{wl_output, wl_pointer, wl_seat, wl_shm, wl_surface},
};

/// Linux input code for the left mouse button.
const BTN_LEFT: u32 = 0x110;
const DOUBLE_CLICK_MS: u32 = 400;
const CONFIG_POLL: Duration = Duration::from_millis(500);
const POLL_TIMEOUT_MS: libc::c_int = 100;
const NAMESPACE: &str = "hwoverlay";

static TERMINATE: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signal: libc::c_int) {
    TERMINATE.store(true, Ordering::SeqCst);
}

#[derive(Parser, Debug)]
#[command(name = "hwoverlay-widget", about = "Hardware monitor overlay")]
struct Args {
    /// Use this config file instead of the default one
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Left button held on the panel.
struct Drag {
    /// Surface-local point that was grabbed.
    grab: (f64, f64),
    moved: bool,
}

struct Overlay {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor_state: CompositorState,
    shm_state: Shm,
    layer_shell: LayerShell,
    seat_state: SeatState,

    layer_surface: Option<LayerSurface>,
    configured: bool,
    pool: Option<SlotPool>,
    /// Current surface size in pixels
    size: (i32, i32),
    /// Global top-left corner of the panel
    position: (i32, i32),

    manager: ConfigManager,
    config: Config,
    last_config_check: Instant,

    worker: MetricsWorker<HardwareMonitor>,
    events: Receiver<WorkerEvent>,
    metrics: Option<Metrics>,

    drag: Option<Drag>,
    last_click: Option<u32>,
    children: Vec<Child>,
    outputs_changed: bool,
    exit: bool,
}

impl CompositorHandler for Overlay {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &wl_output::WlOutput,
    ) {
    }
}

impl OutputHandler for Overlay {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        self.outputs_changed = true;
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        self.outputs_changed = true;
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
        self.outputs_changed = true;
    }
}

impl LayerShellHandler for Overlay {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _layer: &LayerSurface) {
        log::info!("Layer surface closed by compositor");
        self.exit = true;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _layer: &LayerSurface,
        _configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        // The client picks the size; the compositor's suggestion is ignored.
        self.configured = true;
        self.draw();
    }
}

impl SeatHandler for Overlay {
    fn seat_state(&mut self) -> &mut SeatState {
        &mut self.seat_state
    }

    fn new_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {}

    fn new_capability(
        &mut self,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
        seat: wl_seat::WlSeat,
        capability: Capability,
    ) {
        if capability == Capability::Pointer {
            if let Err(e) = self.seat_state.get_pointer(qh, &seat) {
                log::warn!("No pointer, dragging disabled: {}", e);
            }
        }
    }

    fn remove_capability(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _seat: wl_seat::WlSeat,
        _capability: Capability,
    ) {
    }

    fn remove_seat(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, _seat: wl_seat::WlSeat) {}
}

impl PointerHandler for Overlay {
    fn pointer_frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _pointer: &wl_pointer::WlPointer,
        events: &[PointerEvent],
    ) {
        for event in events {
            match event.kind {
                PointerEventKind::Press { button, time, .. } if button == BTN_LEFT => {
                    let double = self
                        .last_click
                        .is_some_and(|last| time.wrapping_sub(last) <= DOUBLE_CLICK_MS);
                    if double {
                        self.last_click = None;
                        self.drag = None;
                        self.open_settings();
                    } else {
                        self.last_click = Some(time);
                        self.drag = Some(Drag {
                            grab: event.position,
                            moved: false,
                        });
                    }
                }
                PointerEventKind::Motion { .. } => {
                    let Some(drag) = self.drag.as_mut() else {
                        continue;
                    };
                    let dx = (event.position.0 - drag.grab.0).round() as i32;
                    let dy = (event.position.1 - drag.grab.1).round() as i32;
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    drag.moved = true;
                    self.move_to((self.position.0 + dx, self.position.1 + dy));
                }
                PointerEventKind::Release { button, .. } if button == BTN_LEFT => {
                    if self.drag.take().is_some_and(|drag| drag.moved) {
                        self.save_position();
                    }
                }
                PointerEventKind::Leave { .. } => {
                    if self.drag.take().is_some_and(|drag| drag.moved) {
                        self.save_position();
                    }
                }
                _ => {}
            }
        }
    }
}

impl ShmHandler for Overlay {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm_state
    }
}

impl Overlay {
    fn new(
        globals: &wayland_client::globals::GlobalList,
        qh: &QueueHandle<Self>,
        manager: ConfigManager,
    ) -> Result<Self, Box<dyn Error>> {
        let config = manager.config().clone();
        let (mut worker, events) = MetricsWorker::new(HardwareMonitor::new());
        worker.start(config.appearance.refresh_interval());

        Ok(Self {
            registry_state: RegistryState::new(globals),
            output_state: OutputState::new(globals, qh),
            compositor_state: CompositorState::bind(globals, qh)?,
            shm_state: Shm::bind(globals, qh)?,
            layer_shell: LayerShell::bind(globals, qh)?,
            seat_state: SeatState::new(globals, qh),
            layer_surface: None,
            configured: false,
            pool: None,
            size: (0, 0),
            position: (0, 0),
            manager,
            config,
            last_config_check: Instant::now(),
            worker,
            events,
            metrics: None,
            drag: None,
            last_click: None,
            children: Vec::new(),
            outputs_changed: false,
            exit: false,
        })
    }

    /// Known outputs, left to right, with their logical geometry.
    fn outputs(&self) -> Vec<(wl_output::WlOutput, ScreenRect)> {
        let mut outputs: Vec<_> = self
            .output_state
            .outputs()
            .filter_map(|output| {
                let info = self.output_state.info(&output)?;
                let (x, y) = info.logical_position?;
                let (width, height) = info.logical_size?;
                Some((output, ScreenRect::new(x, y, width, height)))
            })
            .collect();
        outputs.sort_by_key(|(_, rect)| (rect.x, rect.y));
        outputs
    }

    fn screens(&self) -> Vec<ScreenRect> {
        self.outputs().into_iter().map(|(_, rect)| rect).collect()
    }

    fn current_screen(&self) -> Option<ScreenRect> {
        select_screen(&self.screens(), self.config.appearance.monitor_index)
    }

    fn layout(&self) -> Result<(PanelLayout, PanelStyle), cairo::Error> {
        let sections = match &self.metrics {
            Some(metrics) => arrange(&self.config, metrics),
            None => placeholder(&fl!("widget-collecting")),
        };
        let style = PanelStyle::from_appearance(&self.config.appearance);
        let measurer = TextMeasurer::new(&style)?;
        let layout = compute_layout(&self.config, &sections, |text, bold| {
            measurer.measure(text, bold)
        });
        Ok((layout, style))
    }

    fn create_layer_surface(&mut self, qh: &QueueHandle<Self>) -> Result<(), Box<dyn Error>> {
        let (layout, _) = self.layout()?;
        self.size = (layout.width, layout.height);

        let outputs = self.outputs();
        let index = if self.config.appearance.monitor_index < outputs.len() {
            self.config.appearance.monitor_index
        } else {
            0
        };
        let output = outputs.get(index).map(|(output, _)| output);

        let layer = if self.config.appearance.keep_on_top {
            Layer::Top
        } else {
            Layer::Bottom
        };
        log::info!("Creating {:?} layer surface on output {}", layer, index);

        let surface = self.compositor_state.create_surface(qh);
        let layer_surface =
            self.layer_shell
                .create_layer_surface(qh, surface, layer, Some(NAMESPACE), output);
        layer_surface.set_anchor(Anchor::TOP | Anchor::LEFT);
        layer_surface.set_size(self.size.0 as u32, self.size.1 as u32);
        layer_surface.set_exclusive_zone(-1);
        layer_surface.set_keyboard_interactivity(KeyboardInteractivity::None);

        self.layer_surface = Some(layer_surface);
        self.pool = None;
        self.configured = false;
        self.reposition();
        Ok(())
    }

    /// Place the panel where the config says.
    fn reposition(&mut self) {
        let screens = self.screens();
        let position = calculate_position(&self.config.appearance, self.size, &screens);
        self.apply_position(position);
    }

    /// Follow the pointer while dragging, staying on the current screen.
    fn move_to(&mut self, position: (i32, i32)) {
        let position = match self.current_screen() {
            Some(screen) => clamp_to_screen(position, self.size, screen),
            None => position,
        };
        self.apply_position(position);
    }

    fn apply_position(&mut self, position: (i32, i32)) {
        self.position = position;
        let (top, left) = match self.current_screen() {
            Some(screen) => screen_margins(position, screen),
            None => (position.1, position.0),
        };
        if let Some(layer_surface) = &self.layer_surface {
            layer_surface.set_margin(top, 0, 0, left);
            layer_surface.commit();
        }
    }

    fn save_position(&mut self) {
        let screen = self
            .current_screen()
            .unwrap_or(ScreenRect::new(0, 0, 0, 0));
        update_custom_position(&mut self.config.appearance, self.position, screen);
        log::info!(
            "Panel moved to {:?}, saving",
            self.config.appearance.custom_position
        );
        if let Err(e) = self.manager.update_config(self.config.clone()) {
            log::error!("Failed to save position: {}", e);
        }
    }

    fn open_settings(&mut self) {
        if process::is_running(SETTINGS_BIN) {
            return;
        }
        match process::launch(SETTINGS_BIN, &[]) {
            Ok(child) => self.children.push(child),
            Err(e) => log::error!("Failed to open settings: {}", e),
        }
    }

    fn draw(&mut self) {
        if let Err(e) = self.try_draw() {
            log::error!("Failed to draw overlay: {}", e);
        }
    }

    fn try_draw(&mut self) -> Result<(), Box<dyn Error>> {
        let Some(layer_surface) = self.layer_surface.clone() else {
            return Ok(());
        };
        if !self.configured {
            return Ok(());
        }

        let (layout, style) = self.layout()?;
        let (width, height) = (layout.width, layout.height);
        let stride = width * 4;

        if (width, height) != self.size || self.pool.is_none() {
            self.size = (width, height);
            layer_surface.set_size(width as u32, height as u32);
            self.pool = Some(SlotPool::new(
                width as usize * height as usize * 4,
                &self.shm_state,
            )?);
            if self.drag.is_none() {
                self.reposition();
            }
        }

        let mut image = cairo::ImageSurface::create(cairo::Format::ARgb32, width, height)?;
        {
            let cr = cairo::Context::new(&image)?;
            render_panel(&cr, &layout, &style)?;
        }
        image.flush();
        let image_stride = image.stride() as usize;
        let pixels = image.data()?;

        let pool = self.pool.as_mut().ok_or("shm pool missing")?;
        let (buffer, canvas) =
            pool.create_buffer(width, height, stride, wl_shm::Format::Argb8888)?;
        for (row, source) in canvas
            .chunks_exact_mut(stride as usize)
            .zip(pixels.chunks(image_stride))
        {
            row.copy_from_slice(&source[..stride as usize]);
        }

        let surface = layer_surface.wl_surface();
        surface.attach(Some(buffer.wl_buffer()), 0, 0);
        surface.damage_buffer(0, 0, width, height);
        surface.commit();
        Ok(())
    }

    /// Pick up metrics from the worker. Returns whether anything new arrived.
    fn drain_events(&mut self) -> bool {
        let mut updated = false;
        while let Ok(event) = self.events.try_recv() {
            match event {
                WorkerEvent::Metrics(metrics) => {
                    self.metrics = Some(*metrics);
                    updated = true;
                }
                WorkerEvent::Error(message) => {
                    log::error!("Metrics collection failed: {}", message)
                }
            }
        }
        updated
    }

    fn poll_config(&mut self, qh: &QueueHandle<Self>) -> Result<(), Box<dyn Error>> {
        if self.last_config_check.elapsed() < CONFIG_POLL {
            return Ok(());
        }
        self.last_config_check = Instant::now();

        let config = match self.manager.read_current() {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Config not readable right now: {}", e);
                return Ok(());
            }
        };
        if config == self.config {
            return Ok(());
        }
        log::info!("Configuration changed, applying");

        let old = std::mem::replace(&mut self.config, config);
        let appearance = &self.config.appearance;
        if appearance.refresh_interval() != old.appearance.refresh_interval() {
            self.worker.start(appearance.refresh_interval());
        }
        if appearance.keep_on_top != old.appearance.keep_on_top
            || appearance.monitor_index != old.appearance.monitor_index
        {
            self.create_layer_surface(qh)?;
        } else {
            self.reposition();
            self.draw();
        }
        Ok(())
    }

    fn reap_children(&mut self) {
        self.children
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }

    /// Periodic work between Wayland events.
    fn tick(&mut self, qh: &QueueHandle<Self>) -> Result<(), Box<dyn Error>> {
        if self.drain_events() {
            self.draw();
        }
        if std::mem::take(&mut self.outputs_changed) && self.drag.is_none() {
            self.reposition();
        }
        self.poll_config(qh)?;
        self.reap_children();
        Ok(())
    }
}

delegate_compositor!(Overlay);
delegate_output!(Overlay);
delegate_shm!(Overlay);
delegate_seat!(Overlay);
delegate_pointer!(Overlay);
delegate_layer!(Overlay);

delegate_registry!(Overlay);

impl ProvidesRegistryState for Overlay {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState, SeatState];
}

fn install_signal_handlers() {
    let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
    // SAFETY: the handler only stores to an atomic.
    unsafe {
        libc::signal(libc::SIGTERM, handler);
        libc::signal(libc::SIGINT, handler);
    }
}

/// Wait up to `POLL_TIMEOUT_MS` for Wayland events and read them.
fn wait_for_events(event_queue: &wayland_client::EventQueue<Overlay>) -> Result<(), WaylandError> {
    event_queue.flush()?;
    let Some(guard) = event_queue.prepare_read() else {
        // Events already queued
        return Ok(());
    };

    let mut pollfd = libc::pollfd {
        fd: guard.connection_fd().as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    // SAFETY: one valid pollfd for the duration of the call.
    let ready = unsafe { libc::poll(&mut pollfd, 1, POLL_TIMEOUT_MS) };
    if ready <= 0 {
        // Timeout or EINTR; dropping the guard cancels the read.
        return Ok(());
    }

    match guard.read() {
        Ok(_) => Ok(()),
        Err(WaylandError::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
        Err(e) => Err(e),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let requested_languages = i18n_embed::DesktopLanguageRequester::requested_languages();
    hwoverlay::i18n::init(&requested_languages);

    if process::is_running(WIDGET_BIN) {
        log::info!("Overlay already running");
        return Ok(());
    }
    let _pid_file = PidFile::create(WIDGET_BIN)?;
    install_signal_handlers();

    let manager = ConfigManager::new(args.config)?;
    log::info!("Using configuration {}", manager.path().display());

    let conn = Connection::connect_to_env()?;
    let (globals, mut event_queue) = registry_queue_init(&conn)?;
    let qh = event_queue.handle();

    let mut overlay = Overlay::new(&globals, &qh, manager)?;
    // Learn the output geometry before placing anything.
    event_queue.roundtrip(&mut overlay)?;
    overlay.create_layer_surface(&qh)?;

    while !overlay.exit && !TERMINATE.load(Ordering::SeqCst) {
        wait_for_events(&event_queue)?;
        event_queue.dispatch_pending(&mut overlay)?;
        overlay.tick(&qh)?;
    }

    log::info!("Overlay shutting down");
    overlay.worker.stop();
    Ok(())
}
