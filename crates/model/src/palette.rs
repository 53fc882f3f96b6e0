//! Palette index: small integer color codes to packed RGBA colors.
//!
//! Packed colors store RGBA bytes in little-endian memory order, i.e.
//! `0xAABBGGRR`, so a `&[u32]` of packed colors can be handed to the GPU as
//! an RGBA8 texture without swizzling.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaletteError {
    #[error("palette entry {index} has invalid hex color {value:?}")]
    InvalidHex { index: usize, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteEntry {
    pub index: u32,
    pub name: String,
    /// Lowercase `#rrggbb`.
    pub hex: String,
    pub packed_color: u32,
}

/// Ordered, immutable palette for one canvas epoch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaletteIndex {
    entries: Arc<[PaletteEntry]>,
}

impl PaletteIndex {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self {
            entries: entries.into(),
        }
    }

    /// Builds a palette from `(name, "rrggbb")` pairs in wire order.
    pub fn from_hex_entries<'a, I>(raw: I) -> Result<Self, PaletteError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut entries = Vec::new();
        for (index, (name, value)) in raw.into_iter().enumerate() {
            let packed_color = parse_hex_color(value).ok_or_else(|| PaletteError::InvalidHex {
                index,
                value: value.to_string(),
            })?;
            entries.push(PaletteEntry {
                index: index as u32,
                name: name.to_string(),
                hex: format!("#{}", value.to_ascii_lowercase()),
                packed_color,
            });
        }
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&PaletteEntry> {
        self.entries.get(index as usize)
    }

    /// Packed color for `index`, `None` when the palette has no such entry.
    #[inline]
    pub fn packed(&self, index: u32) -> Option<u32> {
        self.entries.get(index as usize).map(|entry| entry.packed_color)
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }
}

/// Parses a 6-digit hex color (no leading `#`) into an opaque packed color.
pub fn parse_hex_color(value: &str) -> Option<u32> {
    if value.len() != 6 || !value.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    let r = u8::from_str_radix(&value[0..2], 16).ok()?;
    let g = u8::from_str_radix(&value[2..4], 16).ok()?;
    let b = u8::from_str_radix(&value[4..6], 16).ok()?;
    Some(pack_rgba(r, g, b, 0xff))
}

#[inline]
pub const fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    ((a as u32) << 24) | ((b as u32) << 16) | ((g as u32) << 8) | r as u32
}

#[inline]
pub const fn unpack_rgba(packed: u32) -> [u8; 4] {
    packed.to_le_bytes()
}

/// Normalized `[r, g, b, a]` for shader uniforms.
pub fn packed_to_vec4(packed: u32) -> [f32; 4] {
    let [r, g, b, a] = unpack_rgba(packed);
    [
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        a as f32 / 255.0,
    ]
}
