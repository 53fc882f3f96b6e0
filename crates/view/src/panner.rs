//! Pointer and wheel gestures driving a [`ViewportState`].
//!
//! Mouse and single-touch drags pan once the pointer has moved past a
//! threshold. A second touch turns the gesture into a pinch that scales
//! relative to the scale at pinch start around the finger midpoint.

use model::Point;

use crate::viewport::{ViewportState, WheelOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Mouse,
    Touch,
    Pen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub id: u64,
    pub kind: PointerKind,
    /// Viewport position in device pixels.
    pub position: Point,
    /// Left button for mice, always true for touch.
    pub primary: bool,
}

/// Vertical wheel movement; positive values scroll down and zoom out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelDelta {
    Pixels(f32),
    Lines(f32),
    Pages(f32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    pub mouse_move_threshold: f32,
    /// Multiplied by `device_pixel_ratio`.
    pub touch_move_threshold: f32,
    pub device_pixel_ratio: f32,
    pub wheel_line_px: f32,
    pub wheel_page_px: f32,
    pub wheel_zoom_rate: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            mouse_move_threshold: 5.0,
            touch_move_threshold: 10.0,
            device_pixel_ratio: 1.0,
            wheel_line_px: 20.0,
            wheel_page_px: 400.0,
            wheel_zoom_rate: 0.005,
        }
    }
}

impl GestureConfig {
    fn touch_threshold(&self) -> f32 {
        self.touch_move_threshold * self.device_pixel_ratio
    }

    /// Scroll amount in pixels, positive meaning zoom in.
    fn scroll_pixels(&self, delta: WheelDelta) -> f32 {
        match delta {
            WheelDelta::Pixels(value) => -value,
            WheelDelta::Lines(value) => -value * self.wheel_line_px,
            WheelDelta::Pages(value) => -value * self.wheel_page_px,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanMode {
    None,
    Mouse,
    SingleTouch,
    TwoTouch,
}

#[derive(Debug, Clone, Copy)]
struct TrackedPointer {
    id: u64,
    down: Point,
    current: Point,
}

impl TrackedPointer {
    fn new(input: &PointerInput) -> Self {
        Self {
            id: input.id,
            down: input.position,
            current: input.position,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Gesture {
    Idle,
    Mouse {
        pointer: TrackedPointer,
        threshold_passed: bool,
    },
    SingleTouch {
        pointer: TrackedPointer,
        threshold_passed: bool,
    },
    TwoTouch {
        first: TrackedPointer,
        second: TrackedPointer,
        start_scale: f32,
        start_distance: f32,
    },
}

#[derive(Debug, Clone)]
pub struct Panner {
    config: GestureConfig,
    gesture: Gesture,
    locked: bool,
}

impl Panner {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            gesture: Gesture::Idle,
            locked: false,
        }
    }

    pub fn config(&self) -> GestureConfig {
        self.config
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        if ratio.is_finite() && ratio > 0.0 {
            self.config.device_pixel_ratio = ratio;
        }
    }

    pub fn mode(&self) -> PanMode {
        match self.gesture {
            Gesture::Idle => PanMode::None,
            Gesture::Mouse { .. } => PanMode::Mouse,
            Gesture::SingleTouch { .. } => PanMode::SingleTouch,
            Gesture::TwoTouch { .. } => PanMode::TwoTouch,
        }
    }

    /// Ignores new gestures while set; hover still tracks the pointer.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
        if locked {
            self.gesture = Gesture::Idle;
        }
    }

    /// Cancels any gesture in progress, e.g. on board reset.
    pub fn reset(&mut self) {
        self.gesture = Gesture::Idle;
    }

    pub fn pointer_down(&mut self, viewport: &mut ViewportState, input: PointerInput) {
        viewport.set_hover(input.position);
        if self.locked {
            return;
        }
        if viewport
            .screen_to_board(input.position, false, false)
            .is_none()
        {
            return;
        }

        match (self.gesture, input.kind) {
            (Gesture::Idle, PointerKind::Touch) => {
                self.gesture = Gesture::SingleTouch {
                    pointer: TrackedPointer::new(&input),
                    threshold_passed: false,
                };
            }
            (Gesture::Idle, _) if input.primary => {
                self.gesture = Gesture::Mouse {
                    pointer: TrackedPointer::new(&input),
                    threshold_passed: false,
                };
            }
            (Gesture::SingleTouch { pointer, .. }, PointerKind::Touch) if pointer.id != input.id => {
                let Some(start_scale) = viewport.scale() else {
                    return;
                };
                self.gesture = Gesture::TwoTouch {
                    first: pointer,
                    second: TrackedPointer::new(&input),
                    start_scale,
                    start_distance: pointer.current.distance_to(input.position),
                };
            }
            _ => {}
        }
    }

    pub fn pointer_move(&mut self, viewport: &mut ViewportState, input: PointerInput) {
        viewport.set_hover(input.position);
        if self.locked {
            return;
        }
        let mouse_threshold = self.config.mouse_move_threshold;
        let touch_threshold = self.config.touch_threshold();

        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Mouse {
                pointer,
                threshold_passed,
            } if pointer.id == input.id && input.kind != PointerKind::Touch => {
                drag(viewport, pointer, threshold_passed, input.position, mouse_threshold);
            }
            Gesture::SingleTouch {
                pointer,
                threshold_passed,
            } if pointer.id == input.id && input.kind == PointerKind::Touch => {
                drag(viewport, pointer, threshold_passed, input.position, touch_threshold);
            }
            Gesture::TwoTouch {
                first,
                second,
                start_scale,
                start_distance,
            } if input.kind == PointerKind::Touch => {
                let previous_mid = first.current.midpoint(second.current);
                if first.id == input.id {
                    first.current = input.position;
                } else if second.id == input.id {
                    second.current = input.position;
                } else {
                    return;
                }
                let mid = first.current.midpoint(second.current);
                let distance = first.current.distance_to(second.current);
                if *start_distance > 0.0 && distance > 0.0 {
                    viewport.zoom_about(previous_mid, *start_scale * distance / *start_distance);
                }
                viewport.pan_by_screen_delta(previous_mid.delta_to(mid));
            }
            _ => {}
        }
    }

    pub fn pointer_up(&mut self, viewport: &mut ViewportState, input: PointerInput) {
        viewport.set_hover(input.position);
        self.remove_pointer(input.id);
    }

    pub fn pointer_cancel(&mut self, id: u64) {
        self.remove_pointer(id);
    }

    /// Applies one wheel step zooming around `position`.
    pub fn wheel(
        &mut self,
        viewport: &mut ViewportState,
        delta: WheelDelta,
        position: Point,
    ) -> WheelOutcome {
        if self.locked || matches!(self.gesture, Gesture::TwoTouch { .. }) {
            return WheelOutcome::Rejected;
        }
        viewport.set_hover(position);
        let factor = (self.config.scroll_pixels(delta) * self.config.wheel_zoom_rate).exp();
        viewport.wheel_zoom(factor, position)
    }

    fn remove_pointer(&mut self, id: u64) {
        self.gesture = match self.gesture {
            Gesture::Mouse { pointer, .. } | Gesture::SingleTouch { pointer, .. }
                if pointer.id == id =>
            {
                Gesture::Idle
            }
            Gesture::TwoTouch { first, second, .. } if first.id == id || second.id == id => {
                let remaining = if first.id == id { second } else { first };
                Gesture::SingleTouch {
                    pointer: remaining,
                    threshold_passed: true,
                }
            }
            other => other,
        };
    }
}

fn drag(
    viewport: &mut ViewportState,
    pointer: &mut TrackedPointer,
    threshold_passed: &mut bool,
    position: Point,
    threshold: f32,
) {
    let delta = pointer.current.delta_to(position);
    pointer.current = position;
    if *threshold_passed {
        viewport.pan_by_screen_delta(delta);
    } else if pointer.down.distance_to(position) >= threshold {
        *threshold_passed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::ScaleLimits;
    use model::{BoardSize, Size};

    fn viewport() -> ViewportState {
        let mut viewport = ViewportState::new(ScaleLimits::default());
        viewport
            .set_viewport_size(Size::new(800.0, 600.0))
            .expect("viewport");
        viewport.on_board_init(BoardSize::new(1000, 1000));
        viewport.set_scale(2.0).expect("scale");
        viewport
    }

    fn mouse(x: f32, y: f32) -> PointerInput {
        PointerInput {
            id: 0,
            kind: PointerKind::Mouse,
            position: Point::new(x, y),
            primary: true,
        }
    }

    fn touch(id: u64, x: f32, y: f32) -> PointerInput {
        PointerInput {
            id,
            kind: PointerKind::Touch,
            position: Point::new(x, y),
            primary: true,
        }
    }

    #[test]
    fn mouse_drag_pans_only_after_threshold() {
        let mut viewport = viewport();
        let mut panner = Panner::new(GestureConfig::default());

        panner.pointer_down(&mut viewport, mouse(100.0, 100.0));
        assert_eq!(panner.mode(), PanMode::Mouse);
        panner.pointer_move(&mut viewport, mouse(103.0, 100.0));
        assert_eq!(viewport.pan(), Some(Point::new(500.0, 500.0)));

        // crossing the threshold arms panning without moving
        panner.pointer_move(&mut viewport, mouse(106.0, 100.0));
        assert_eq!(viewport.pan(), Some(Point::new(500.0, 500.0)));

        panner.pointer_move(&mut viewport, mouse(116.0, 90.0));
        assert_eq!(viewport.pan(), Some(Point::new(495.0, 505.0)));

        panner.pointer_up(&mut viewport, mouse(116.0, 90.0));
        assert_eq!(panner.mode(), PanMode::None);
        assert_eq!(viewport.hover(), Some(Point::new(116.0, 90.0)));
    }

    #[test]
    fn secondary_button_and_unready_board_start_nothing() {
        let mut panner = Panner::new(GestureConfig::default());
        let mut viewport = viewport();
        panner.pointer_down(
            &mut viewport,
            PointerInput {
                primary: false,
                ..mouse(1.0, 1.0)
            },
        );
        assert_eq!(panner.mode(), PanMode::None);

        let mut unready = ViewportState::new(ScaleLimits::default());
        panner.pointer_down(&mut unready, mouse(1.0, 1.0));
        assert_eq!(panner.mode(), PanMode::None);
        assert_eq!(unready.hover(), Some(Point::new(1.0, 1.0)));
    }

    #[test]
    fn touch_threshold_scales_with_pixel_ratio() {
        let mut viewport = viewport();
        let mut panner = Panner::new(GestureConfig::default());
        panner.set_device_pixel_ratio(2.0);

        panner.pointer_down(&mut viewport, touch(7, 100.0, 100.0));
        assert_eq!(panner.mode(), PanMode::SingleTouch);
        panner.pointer_move(&mut viewport, touch(7, 115.0, 100.0));
        panner.pointer_move(&mut viewport, touch(7, 125.0, 100.0));
        assert_eq!(viewport.pan(), Some(Point::new(500.0, 500.0)));

        panner.pointer_move(&mut viewport, touch(7, 135.0, 100.0));
        assert_eq!(viewport.pan(), Some(Point::new(495.0, 500.0)));
    }

    #[test]
    fn pinch_scales_from_start_and_keeps_midpoint() {
        let mut viewport = viewport();
        let mut panner = Panner::new(GestureConfig::default());

        panner.pointer_down(&mut viewport, touch(1, 350.0, 300.0));
        panner.pointer_down(&mut viewport, touch(2, 450.0, 300.0));
        assert_eq!(panner.mode(), PanMode::TwoTouch);

        let mid = Point::new(400.0, 300.0);
        let before = viewport.screen_to_board(mid, false, false).expect("board");

        panner.pointer_move(&mut viewport, touch(1, 300.0, 300.0));
        panner.pointer_move(&mut viewport, touch(2, 500.0, 300.0));
        assert_eq!(viewport.scale(), Some(4.0));

        let after = viewport.screen_to_board(mid, false, false).expect("board");
        assert!((after.x - before.x).abs() < 1e-3 && (after.y - before.y).abs() < 1e-3);

        // wheel is ignored mid-pinch
        assert_eq!(
            panner.wheel(&mut viewport, WheelDelta::Lines(-1.0), mid),
            WheelOutcome::Rejected
        );

        // lifting one finger keeps panning without a fresh threshold
        panner.pointer_up(&mut viewport, touch(1, 300.0, 300.0));
        assert_eq!(panner.mode(), PanMode::SingleTouch);
        let pan = viewport.pan().expect("pan");
        panner.pointer_move(&mut viewport, touch(2, 504.0, 300.0));
        assert_eq!(viewport.pan(), Some(Point::new(pan.x - 1.0, pan.y)));
    }

    #[test]
    fn wheel_units_follow_delta_mode() {
        let config = GestureConfig::default();
        assert_eq!(config.scroll_pixels(WheelDelta::Pixels(3.0)), -3.0);
        assert_eq!(config.scroll_pixels(WheelDelta::Lines(-1.0)), 20.0);
        assert_eq!(config.scroll_pixels(WheelDelta::Pages(1.0)), -400.0);

        let mut viewport = viewport();
        let mut panner = Panner::new(config);
        let outcome = panner.wheel(
            &mut viewport,
            WheelDelta::Lines(-1.0),
            Point::new(400.0, 300.0),
        );
        assert_eq!(outcome, WheelOutcome::Applied { scale: 3.0 });
    }

    #[test]
    fn reset_and_lock_cancel_gestures() {
        let mut viewport = viewport();
        let mut panner = Panner::new(GestureConfig::default());
        panner.pointer_down(&mut viewport, touch(1, 10.0, 10.0));
        panner.reset();
        assert_eq!(panner.mode(), PanMode::None);

        panner.set_locked(true);
        panner.pointer_down(&mut viewport, mouse(10.0, 10.0));
        assert_eq!(panner.mode(), PanMode::None);
    }
}
