use std::sync::Arc;
use std::time::Instant;

use board_sync::{ConnectionState, SyncEvent};
use model::{BoardInfo, PaletteIndex, Point, SharedBoard, Size};
use renderer::{
    BOARD_LAYER, BoardLayer, FrameContext, LayerOptions, LayerStack, RETICLE_LAYER, RenderError,
    ReticleLayer, WgpuTarget,
};
use tracing::{debug, error, info, trace, warn};
use view::{GestureConfig, Panner, PointerInput, PointerKind, ScaleLimits, ViewportState, WheelDelta};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::persistence::{SavedView, StateStore};
use crate::sync_thread::{AppEvent, SyncEvents, SyncThread};

const WINDOW_TITLE: &str = "pxboard";
const MOUSE_POINTER_ID: u64 = 0;

pub struct App {
    window: Option<Arc<Window>>,
    target: Option<WgpuTarget>,
    layers: LayerStack,
    viewport: ViewportState,
    panner: Panner,
    board: SharedBoard,
    info: Option<BoardInfo>,
    selected: Option<u32>,
    connection: ConnectionState,
    sync: SyncThread,
    events: SyncEvents,
    store: StateStore,
    cursor: Option<Point>,
    mouse_pressed: bool,
    hover_capable: bool,
}

impl App {
    pub fn new(board: SharedBoard, sync: SyncThread, events: SyncEvents, store: StateStore) -> Self {
        let saved = store.state().clone();
        let viewport = ViewportState::restored(
            ScaleLimits::default(),
            saved.view.map(|view| Point::new(view.x, view.y)),
            saved.view.map(|view| view.scale),
        );

        let mut layers = LayerStack::new();
        let registered = layers
            .register(LayerOptions::new(BOARD_LAYER), Box::new(BoardLayer::new()))
            .and_then(|()| {
                layers.register(LayerOptions::new(RETICLE_LAYER), Box::new(ReticleLayer::new()))
            });
        if let Err(error) = registered {
            warn!(%error, "layer registration failed");
        }
        layers.merge_options(&saved.layers);

        Self {
            window: None,
            target: None,
            layers,
            viewport,
            panner: Panner::new(GestureConfig::default()),
            board,
            info: None,
            selected: None,
            connection: ConnectionState::BeforeFirstConnect,
            sync,
            events,
            store,
            cursor: None,
            mouse_pressed: false,
            hover_capable: true,
        }
    }

    fn window_id(&self) -> Option<WindowId> {
        self.window.as_ref().map(|window| window.id())
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn update_title(&self) {
        if let Some(window) = self.window.as_ref() {
            window.set_title(&format!("{WINDOW_TITLE} - {}", self.connection));
        }
    }

    fn handle_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::StateChanged(state) => {
                if state.is_error() {
                    warn!(%state, "connection state");
                } else {
                    info!(%state, "connection state");
                }
                self.connection = state;
                self.update_title();
            }
            SyncEvent::BoardReset => {
                debug!("board reset");
                self.viewport.on_board_reset();
                self.panner.reset();
                self.store.set_view(None);
            }
            SyncEvent::InfoChanged(info) => {
                self.selected = resolve_selection(self.selected, &info.palette).and(self.selected);
                self.info = Some(info);
            }
            SyncEvent::BoardInit { info, surface_id } => {
                debug!(surface = surface_id.0, canvas = %info.canvas_code, "board ready");
                self.viewport.on_board_init(info.size);
                self.persist_view();
            }
            SyncEvent::Pixel(pixel) => {
                trace!(x = pixel.x, y = pixel.y, color = pixel.color_index, "pixel placed");
            }
            SyncEvent::Message { kind, body } => {
                debug!(%kind, %body, "channel message");
            }
        }
    }

    fn persist_view(&mut self) {
        if let (Some(pan), Some(scale)) = (self.viewport.pan(), self.viewport.scale()) {
            self.store.set_view(Some(SavedView {
                x: pan.x,
                y: pan.y,
                scale,
            }));
        }
    }

    fn persist_layers(&mut self) {
        self.store.set_layers(self.layers.options());
    }

    fn mouse_input(&self, position: Point) -> PointerInput {
        PointerInput {
            id: MOUSE_POINTER_ID,
            kind: PointerKind::Mouse,
            position,
            primary: self.mouse_pressed,
        }
    }

    fn handle_touch(&mut self, touch: Touch) {
        self.hover_capable = false;
        let input = PointerInput {
            // mouse owns id 0
            id: touch.id.wrapping_add(1),
            kind: PointerKind::Touch,
            position: Point::new(touch.location.x as f32, touch.location.y as f32),
            primary: true,
        };
        match touch.phase {
            TouchPhase::Started => self.panner.pointer_down(&mut self.viewport, input),
            TouchPhase::Moved => self.panner.pointer_move(&mut self.viewport, input),
            TouchPhase::Ended => self.panner.pointer_up(&mut self.viewport, input),
            TouchPhase::Cancelled => self.panner.pointer_cancel(input.id),
        }
        self.persist_view();
    }

    fn handle_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::KeyR => {
                info!("reconnect requested");
                self.sync.reconnect_now();
            }
            KeyCode::BracketRight | KeyCode::BracketLeft => {
                let len = self.info.as_ref().map_or(0, |info| info.palette.len());
                self.selected = cycle_selection(self.selected, len, key == KeyCode::BracketRight);
                debug!(selected = ?self.selected, "palette selection");
            }
            KeyCode::Escape => self.selected = None,
            KeyCode::KeyH => {
                let enabled = self
                    .layers
                    .layer_options(RETICLE_LAYER)
                    .is_some_and(|options| options.enabled);
                self.layers.set_enabled(RETICLE_LAYER, !enabled);
                self.persist_layers();
            }
            _ => return,
        }
        self.request_redraw();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(target) = self.target.as_mut() else {
            return;
        };
        let selected_color = self
            .info
            .as_ref()
            .and_then(|info| resolve_selection(self.selected, &info.palette));
        let hover = self
            .viewport
            .hovered_pixel()
            .map(|pixel| (pixel.x as u32, pixel.y as u32));
        let frame = FrameContext {
            board: &self.board,
            clip_matrix: self.viewport.clip_matrix(),
            scale: self.viewport.scale().unwrap_or(0.0),
            hover,
            selected_color,
            hover_capable: self.hover_capable,
        };

        match self.layers.render(target, &frame) {
            Ok(()) => {}
            Err(RenderError::SurfaceLost | RenderError::Timeout) => self.request_redraw(),
            Err(RenderError::OutOfMemory) => {
                error!("gpu out of memory");
                event_loop.exit();
            }
            Err(error) => warn!(%error, "frame failed"),
        }
    }
}

impl ApplicationHandler<AppEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);

        if self.window.is_some() {
            return;
        }

        let window = match event_loop.create_window(
            WindowAttributes::default()
                .with_title(WINDOW_TITLE)
                .with_inner_size(PhysicalSize::new(1280u32, 720u32)),
        ) {
            Ok(window) => Arc::new(window),
            Err(error) => {
                error!(%error, "creating window failed");
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let target = match pollster::block_on(WgpuTarget::new(
            Arc::clone(&window),
            size.width,
            size.height,
        )) {
            Ok(target) => target,
            Err(error) => {
                error!(%error, "gpu setup failed");
                event_loop.exit();
                return;
            }
        };

        self.panner.set_device_pixel_ratio(window.scale_factor() as f32);
        if let Err(error) = self
            .viewport
            .set_viewport_size(Size::new(size.width as f32, size.height as f32))
        {
            warn!(%error, "initial viewport size rejected");
        }
        self.window = Some(window);
        self.target = Some(target);
        self.update_title();
        self.request_redraw();
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: AppEvent) {
        match event {
            AppEvent::SyncReady => {
                for event in self.events.drain() {
                    self.handle_sync_event(event);
                }
                self.request_redraw();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window_id() != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(target) = self.target.as_mut() {
                    target.resize(size.width, size.height);
                }
                if let Err(error) = self
                    .viewport
                    .set_viewport_size(Size::new(size.width as f32, size.height as f32))
                {
                    debug!(%error, "viewport size rejected");
                }
                self.persist_view();
                self.request_redraw();
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.panner.set_device_pixel_ratio(scale_factor as f32);
            }
            WindowEvent::CursorMoved { position, .. } => {
                let point = Point::new(position.x as f32, position.y as f32);
                self.cursor = Some(point);
                self.hover_capable = true;
                self.viewport.set_hover(point);
                let input = self.mouse_input(point);
                self.panner.pointer_move(&mut self.viewport, input);
                if self.mouse_pressed {
                    self.persist_view();
                }
                self.request_redraw();
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.viewport.clear_hover();
                self.request_redraw();
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.mouse_pressed = state == ElementState::Pressed;
                let Some(cursor) = self.cursor else {
                    return;
                };
                let input = self.mouse_input(cursor);
                if self.mouse_pressed {
                    self.panner.pointer_down(&mut self.viewport, input);
                } else {
                    self.panner.pointer_up(&mut self.viewport, input);
                    self.persist_view();
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, lines) => WheelDelta::Lines(-lines),
                    MouseScrollDelta::PixelDelta(position) => WheelDelta::Pixels(-position.y as f32),
                };
                let focal = self
                    .cursor
                    .or_else(|| self.viewport.viewport_size().map(Size::center))
                    .unwrap_or_default();
                let outcome = self.panner.wheel(&mut self.viewport, delta, focal);
                debug!(?outcome, "wheel");
                self.persist_view();
                self.request_redraw();
            }
            WindowEvent::Touch(touch) => {
                self.handle_touch(touch);
                self.request_redraw();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.handle_key(key);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        self.store.flush_due(now);
        match self.store.next_write_at(now) {
            Some(due) => event_loop.set_control_flow(ControlFlow::WaitUntil(due)),
            None => event_loop.set_control_flow(ControlFlow::Wait),
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        info!("shutting down");
        self.store.flush();
        self.sync.shutdown();
        if let Some(target) = self.target.as_mut() {
            self.layers.release_gpu(target);
        }
    }
}

/// Packed color of `selected` if it still names a palette entry.
fn resolve_selection(selected: Option<u32>, palette: &PaletteIndex) -> Option<u32> {
    selected.and_then(|index| palette.packed(index))
}

/// Steps the selection through a palette of `len` entries, wrapping at both
/// ends. Starting without a selection picks the first or last entry.
fn cycle_selection(selected: Option<u32>, len: usize, forward: bool) -> Option<u32> {
    let len = u32::try_from(len).ok().filter(|len| *len > 0)?;
    let next = match (selected.filter(|index| *index < len), forward) {
        (None, true) => 0,
        (None, false) => len - 1,
        (Some(index), true) => (index + 1) % len,
        (Some(index), false) => (index + len - 1) % len,
    };
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycling_wraps_both_ways() {
        assert_eq!(cycle_selection(None, 3, true), Some(0));
        assert_eq!(cycle_selection(None, 3, false), Some(2));
        assert_eq!(cycle_selection(Some(2), 3, true), Some(0));
        assert_eq!(cycle_selection(Some(0), 3, false), Some(2));
        assert_eq!(cycle_selection(Some(1), 0, true), None);
    }

    #[test]
    fn out_of_range_selection_restarts() {
        assert_eq!(cycle_selection(Some(9), 4, true), Some(0));
    }

    #[test]
    fn selection_resolves_only_inside_palette() {
        let palette =
            PaletteIndex::from_hex_entries([("black", "000000"), ("red", "ff0000")]).expect("palette");
        assert_eq!(resolve_selection(Some(1), &palette), palette.packed(1));
        assert_eq!(resolve_selection(Some(2), &palette), None);
        assert_eq!(resolve_selection(None, &palette), None);
    }
}
