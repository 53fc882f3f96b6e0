use model::{BoardSize, Rect, RowRange};

use crate::error::RenderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardDraw {
    pub texture: TextureId,
    pub clip_matrix: [f32; 16],
    pub size: BoardSize,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReticleDraw {
    pub clip_matrix: [f32; 16],
    /// Board-space quad covering the hovered pixel plus its border.
    pub rect: Rect,
    /// Straight-alpha sRGB.
    pub color: [f32; 4],
    pub border_cutoff: f32,
    pub opacity: f32,
}

/// The GPU operations a frame needs.
///
/// Calls between `begin_frame` and `end_frame` are recorded in order; texture
/// management may happen at any time.
pub trait RenderTarget {
    /// Starts a frame cleared to `clear` with the viewport set to the whole
    /// surface.
    fn begin_frame(&mut self, clear: [u8; 3]) -> Result<(), RenderError>;

    fn create_texture(&mut self, size: BoardSize) -> TextureId;

    /// Uploads `pixels` (packed RGBA, row-major) into `rows` of `texture`.
    fn upload_rows(&mut self, texture: TextureId, rows: RowRange, pixels: &[u32]);

    fn destroy_texture(&mut self, texture: TextureId);

    fn draw_board(&mut self, draw: &BoardDraw);

    fn draw_reticle(&mut self, draw: &ReticleDraw);

    fn end_frame(&mut self);
}
