mod board;
mod geometry;
mod palette;
mod texture;

pub use board::{
    BoardError, BoardInfo, BoardReplica, PixelDelta, SharedBoard, SurfaceId, apply_snapshot,
};
pub use geometry::{BoardSize, Point, Rect, Size};
pub use palette::{
    PaletteEntry, PaletteError, PaletteIndex, pack_rgba, packed_to_vec4, parse_hex_color,
    unpack_rgba,
};
pub use texture::{DirtyRegion, RowRange, TextureSurface};
