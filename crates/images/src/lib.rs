//! Palette matching and template downscaling.
//!
//! Pure functions over RGBA buffers. Every pixel must be fully opaque or
//! fully transparent; anything else fails the whole call and leaves the
//! caller's data untouched.

mod color;
mod matching;

pub use color::{Lab, ciede2000, srgb_to_lab};
pub use matching::{
    CiedeMatcher, MatchError, PaletteMatcher, detemplatize, highlight_incorrect_colors,
};

/// RGBA8 pixel buffer crossing the matching boundary.
pub type ImageData = image::RgbaImage;
