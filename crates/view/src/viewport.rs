//! Pan/scale state and everything derived from it.
//!
//! Derived values (the board transform, the clamped pan) are refreshed by
//! `recompute`, which every setter calls before returning.

use model::{BoardSize, Point, Size};

use crate::transform::{ViewTransform, ViewportError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLimits {
    pub min: f32,
    pub max: f32,
    /// Snap wheel zoom to whole scales once at or above 1.
    pub snap_integers: bool,
}

impl Default for ScaleLimits {
    fn default() -> Self {
        Self {
            min: 0.5,
            max: 100.0,
            snap_integers: true,
        }
    }
}

impl ScaleLimits {
    pub fn clamp(&self, scale: f32) -> f32 {
        scale.clamp(self.min, self.max)
    }

    fn snap(&self, old: f32, new: f32) -> f32 {
        if !self.snap_integers {
            return new;
        }
        if new > old {
            if old >= 1.0 {
                new.ceil()
            } else if new > 1.0 {
                1.0
            } else {
                new
            }
        } else if new >= 1.0 {
            new.floor()
        } else {
            new
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WheelOutcome {
    /// Pan, scale or viewport size is not known yet.
    NotReady,
    /// The step pointed past a limit the scale already sits on.
    Rejected,
    Applied { scale: f32 },
}

#[derive(Debug, Clone, Default)]
pub struct ViewportState {
    limits: ScaleLimits,
    pan: Option<Point>,
    scale: Option<f32>,
    viewport_size: Option<Size>,
    board_size: Option<BoardSize>,
    hover: Option<Point>,
    transform: Option<ViewTransform>,
}

impl ViewportState {
    pub fn new(limits: ScaleLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Starts from previously persisted values. Non-finite values are dropped
    /// and the scale is clamped into `limits`.
    pub fn restored(limits: ScaleLimits, pan: Option<Point>, scale: Option<f32>) -> Self {
        let mut state = Self::new(limits);
        state.pan = pan.filter(|pan| pan.is_finite());
        state.scale = scale
            .filter(|scale| scale.is_finite() && *scale > 0.0)
            .map(|scale| limits.clamp(scale));
        state.recompute();
        state
    }

    pub fn limits(&self) -> ScaleLimits {
        self.limits
    }

    pub fn pan(&self) -> Option<Point> {
        self.pan
    }

    pub fn scale(&self) -> Option<f32> {
        self.scale
    }

    pub fn viewport_size(&self) -> Option<Size> {
        self.viewport_size
    }

    pub fn board_size(&self) -> Option<BoardSize> {
        self.board_size
    }

    /// Board-to-viewport transform; `None` until pan, scale and viewport size
    /// are all known.
    pub fn transform(&self) -> Option<ViewTransform> {
        self.transform
    }

    /// Screen position of board origin, `viewport_size / 2 - pan * scale`.
    pub fn viewport_offset(&self) -> Option<Point> {
        self.transform.map(|transform| transform.offset())
    }

    pub fn set_pan(&mut self, pan: Point) -> Result<(), ViewportError> {
        if !pan.is_finite() {
            return Err(ViewportError::NonFiniteValue);
        }
        self.pan = Some(pan);
        self.recompute();
        Ok(())
    }

    /// Sets the scale clamped into the limits and returns the applied value.
    pub fn set_scale(&mut self, scale: f32) -> Result<f32, ViewportError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ViewportError::InvalidScale);
        }
        let applied = self.limits.clamp(scale);
        self.scale = Some(applied);
        self.recompute();
        Ok(applied)
    }

    /// An empty size (minimised window) makes the viewport unknown again.
    pub fn set_viewport_size(&mut self, size: Size) -> Result<(), ViewportError> {
        if !size.width.is_finite() || !size.height.is_finite() {
            return Err(ViewportError::InvalidViewport);
        }
        self.viewport_size = (!size.is_empty()).then_some(size);
        self.recompute();
        Ok(())
    }

    pub fn set_board_size(&mut self, size: Option<BoardSize>) {
        self.board_size = size;
        self.recompute();
    }

    /// Board became available: unset pan defaults to the floored center,
    /// unset scale to 1.
    pub fn on_board_init(&mut self, size: BoardSize) {
        self.board_size = Some(size);
        if self.pan.is_none() {
            self.pan = Some(Point::new(
                (size.width / 2) as f32,
                (size.height / 2) as f32,
            ));
        }
        if self.scale.is_none() {
            self.scale = Some(self.limits.clamp(1.0));
        }
        self.recompute();
    }

    /// New canvas epoch: forget pan, scale and board size.
    pub fn on_board_reset(&mut self) {
        self.pan = None;
        self.scale = None;
        self.board_size = None;
        self.recompute();
    }

    pub fn can_scale_down(&self) -> bool {
        self.scale.is_some_and(|scale| scale > self.limits.min)
    }

    pub fn can_scale_up(&self) -> bool {
        self.scale.is_some_and(|scale| scale < self.limits.max)
    }

    /// Moves the view by a drag of `delta` viewport pixels.
    pub fn pan_by_screen_delta(&mut self, delta: Point) {
        let (Some(pan), Some(scale)) = (self.pan, self.scale) else {
            return;
        };
        let next = Point::new(pan.x - delta.x / scale, pan.y - delta.y / scale);
        if next.is_finite() {
            self.pan = Some(next);
            self.recompute();
        }
    }

    /// Changes scale keeping the board point under `focal` (viewport
    /// coordinates) fixed. Returns the scale actually applied.
    pub fn zoom_about(&mut self, focal: Point, requested: f32) -> Option<f32> {
        let old = self.scale?;
        let center = self.viewport_size?.center();
        if !requested.is_finite() || requested <= 0.0 || !focal.is_finite() {
            return None;
        }
        let new = self.limits.clamp(requested);
        self.scale = Some(new);

        if let Some(pan) = self.pan {
            let delta = center.delta_to(focal);
            self.pan = Some(Point::new(
                pan.x + delta.x / old - delta.x / new,
                pan.y + delta.y / old - delta.y / new,
            ));
        }
        self.recompute();
        Some(new)
    }

    /// One wheel step scaling by `factor`, with integer snapping and the
    /// boundary rejection rule.
    pub fn wheel_zoom(&mut self, factor: f32, focal: Point) -> WheelOutcome {
        let (Some(old), Some(_)) = (self.scale, self.viewport_size) else {
            return WheelOutcome::NotReady;
        };
        let requested = old * factor;
        if !requested.is_finite() || requested == old {
            return WheelOutcome::Rejected;
        }
        if (requested < old && !self.can_scale_down()) || (requested > old && !self.can_scale_up()) {
            return WheelOutcome::Rejected;
        }
        let snapped = self.limits.snap(old, requested);
        match self.zoom_about(focal, snapped) {
            Some(scale) => WheelOutcome::Applied { scale },
            None => WheelOutcome::NotReady,
        }
    }

    /// Maps a viewport point into board space, optionally flooring to a
    /// pixel and clamping into `[0, dimension - 1]`.
    pub fn screen_to_board(&self, point: Point, clamp: bool, floor: bool) -> Option<Point> {
        let mut board = self.transform?.screen_to_board(point).ok()?;
        if floor {
            board = Point::new(board.x.floor(), board.y.floor());
        }
        if clamp {
            let size = self.board_size?;
            let max_x = size.width.saturating_sub(1) as f32;
            let max_y = size.height.saturating_sub(1) as f32;
            board = Point::new(board.x.clamp(0.0, max_x), board.y.clamp(0.0, max_y));
        }
        Some(board)
    }

    pub fn board_to_screen(&self, point: Point) -> Option<Point> {
        Some(self.transform?.board_to_screen(point))
    }

    pub fn set_hover(&mut self, point: Point) {
        if point.is_finite() {
            self.hover = Some(point);
        }
    }

    pub fn clear_hover(&mut self) {
        self.hover = None;
    }

    /// Last pointer position in viewport coordinates.
    pub fn hover(&self) -> Option<Point> {
        self.hover
    }

    /// Board pixel under the last pointer position.
    pub fn hovered_pixel(&self) -> Option<Point> {
        self.screen_to_board(self.hover?, true, true)
    }

    pub fn clip_matrix(&self) -> Option<[f32; 16]> {
        let size = self.viewport_size?;
        self.transform?.to_clip_matrix4x4(size.width, size.height).ok()
    }

    fn recompute(&mut self) {
        if let (Some(pan), Some(board)) = (self.pan, self.board_size) {
            self.pan = Some(Point::new(
                pan.x.clamp(0.0, board.width as f32),
                pan.y.clamp(0.0, board.height as f32),
            ));
        }
        self.transform = match (self.pan, self.scale, self.viewport_size) {
            (Some(pan), Some(scale), Some(size)) => {
                ViewTransform::centered_on(pan, scale, size.width, size.height).ok()
            }
            _ => None,
        };
    }
}
