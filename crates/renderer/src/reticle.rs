use model::{Rect, packed_to_vec4};

use crate::layer::{FrameContext, Layer};
use crate::target::{RenderTarget, ReticleDraw};

/// Border width in device pixels, independent of zoom.
pub const RETICLE_BORDER_PX: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReticleGeometry {
    pub rect: Rect,
    /// Quad-local coordinate past which the border is drawn on each axis;
    /// the border spans `1 - cutoff` of the quad.
    pub border_cutoff: f32,
}

pub fn reticle_geometry(pixel_x: u32, pixel_y: u32, scale: f32) -> ReticleGeometry {
    let border = RETICLE_BORDER_PX / scale;
    let size = 1.0 + 2.0 * border;
    ReticleGeometry {
        rect: Rect::new(pixel_x as f32 - border, pixel_y as f32 - border, size, size),
        border_cutoff: 1.0 - RETICLE_BORDER_PX / (scale + 2.0 * RETICLE_BORDER_PX),
    }
}

/// Outline around the hovered pixel in the selected color.
#[derive(Debug, Default)]
pub struct ReticleLayer;

impl ReticleLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Layer for ReticleLayer {
    fn draw(&mut self, target: &mut dyn RenderTarget, frame: &FrameContext<'_>, opacity: f32) {
        if !frame.hover_capable || !frame.scale.is_finite() || frame.scale <= 0.0 {
            return;
        }
        let (Some(clip_matrix), Some((x, y)), Some(color)) =
            (frame.clip_matrix, frame.hover, frame.selected_color)
        else {
            return;
        };
        let geometry = reticle_geometry(x, y, frame.scale);
        target.draw_reticle(&ReticleDraw {
            clip_matrix,
            rect: geometry.rect,
            color: packed_to_vec4(color),
            border_cutoff: geometry.border_cutoff,
            opacity,
        });
    }

    fn destroy(&mut self, _target: &mut dyn RenderTarget) {}
}
