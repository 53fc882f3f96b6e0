//! Frame composition for the board view.
//!
//! [`LayerStack`] decides what gets drawn each frame and in which order;
//! every GPU call goes through a [`RenderTarget`]. [`WgpuTarget`] is the real
//! target, tests drive the stack against a recording fake.
//!
//! Layers never hold references back into app state. Each frame they read a
//! [`FrameContext`] built by the caller.

mod board_layer;
mod error;
mod layer;
mod reticle;
mod target;
mod wgpu_target;

pub use board_layer::BoardLayer;
pub use error::RenderError;
pub use layer::{FrameContext, Layer, LayerOptions, LayerStack};
pub use reticle::{RETICLE_BORDER_PX, ReticleGeometry, ReticleLayer, reticle_geometry};
pub use target::{BoardDraw, RenderTarget, ReticleDraw, TextureId};
pub use wgpu_target::WgpuTarget;

/// Background behind the board, sRGB bytes.
pub const CLEAR_COLOR: [u8; 3] = [26, 26, 26];

pub const BOARD_LAYER: &str = "board";
pub const RETICLE_LAYER: &str = "reticle";

#[cfg(test)]
mod tests;
#[cfg(test)]
mod wgsl_tests;
