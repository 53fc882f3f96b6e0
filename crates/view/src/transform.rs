use model::Point;

/// Board-to-screen affine map: `screen = board * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    scale: f32,
    offset_x: f32,
    offset_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ViewportError {
    #[error("scale must be finite and positive")]
    InvalidScale,
    #[error("viewport size must be finite and positive")]
    InvalidViewport,
    #[error("non-finite coordinate")]
    NonFiniteValue,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

impl ViewTransform {
    pub fn new(scale: f32, offset: Point) -> Result<Self, ViewportError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ViewportError::InvalidScale);
        }
        if !offset.is_finite() {
            return Err(ViewportError::NonFiniteValue);
        }
        Ok(Self {
            scale,
            offset_x: offset.x,
            offset_y: offset.y,
        })
    }

    /// Transform that keeps board point `pan` at the center of a viewport.
    pub fn centered_on(
        pan: Point,
        scale: f32,
        viewport_width: f32,
        viewport_height: f32,
    ) -> Result<Self, ViewportError> {
        let offset_x = checked_add(viewport_width / 2.0, -checked_mul(pan.x, scale)?)?;
        let offset_y = checked_add(viewport_height / 2.0, -checked_mul(pan.y, scale)?)?;
        Self::new(scale, Point::new(offset_x, offset_y))
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn offset(&self) -> Point {
        Point::new(self.offset_x, self.offset_y)
    }

    pub fn to_matrix3x3(&self) -> [[f32; 3]; 3] {
        [
            [self.scale, 0.0, self.offset_x],
            [0.0, self.scale, self.offset_y],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Column-major board-space to clip-space matrix. Screen y grows down.
    pub fn to_clip_matrix4x4(
        &self,
        viewport_width: f32,
        viewport_height: f32,
    ) -> Result<[f32; 16], ViewportError> {
        if !viewport_width.is_finite()
            || !viewport_height.is_finite()
            || viewport_width <= 0.0
            || viewport_height <= 0.0
        {
            return Err(ViewportError::InvalidViewport);
        }

        let matrix = self.to_matrix3x3();
        let scale_x = 2.0 / viewport_width;
        let scale_y = -2.0 / viewport_height;

        let clip_m00 = matrix[0][0] * scale_x;
        let clip_m11 = matrix[1][1] * scale_y;
        let clip_tx = matrix[0][2] * scale_x - 1.0;
        let clip_ty = matrix[1][2] * scale_y + 1.0;

        Ok([
            clip_m00, 0.0, 0.0, 0.0, 0.0, clip_m11, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, clip_tx, clip_ty,
            0.0, 1.0,
        ])
    }

    pub fn board_to_screen(&self, board: Point) -> Point {
        Point::new(
            board.x * self.scale + self.offset_x,
            board.y * self.scale + self.offset_y,
        )
    }

    pub fn screen_to_board(&self, screen: Point) -> Result<Point, ViewportError> {
        if !screen.is_finite() {
            return Err(ViewportError::NonFiniteValue);
        }
        let board = Point::new(
            (screen.x - self.offset_x) / self.scale,
            (screen.y - self.offset_y) / self.scale,
        );
        if !board.is_finite() {
            return Err(ViewportError::NonFiniteValue);
        }
        Ok(board)
    }
}

pub(crate) fn checked_add(current: f32, delta: f32) -> Result<f32, ViewportError> {
    if !delta.is_finite() {
        return Err(ViewportError::NonFiniteValue);
    }
    let next = current + delta;
    if !next.is_finite() {
        return Err(ViewportError::NonFiniteValue);
    }
    Ok(next)
}

pub(crate) fn checked_mul(left: f32, right: f32) -> Result<f32, ViewportError> {
    if !left.is_finite() || !right.is_finite() {
        return Err(ViewportError::NonFiniteValue);
    }
    let next = left * right;
    if !next.is_finite() {
        return Err(ViewportError::NonFiniteValue);
    }
    Ok(next)
}
