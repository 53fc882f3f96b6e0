//! Local board replica and the shared slot that hands it to the renderer.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::geometry::BoardSize;
use crate::palette::PaletteIndex;
use crate::texture::TextureSurface;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("snapshot holds {actual} bytes, expected {expected} for the board dimensions")]
    SnapshotSizeMismatch { expected: usize, actual: usize },
}

/// One pixel mutation from the push channel. Coordinates are signed because
/// the wire does not forbid negative values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelDelta {
    pub x: i32,
    pub y: i32,
    pub color_index: u32,
}

impl PixelDelta {
    pub const fn new(x: i32, y: i32, color_index: u32) -> Self {
        Self { x, y, color_index }
    }
}

/// Canvas metadata relevant to the core.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardInfo {
    pub canvas_code: String,
    pub size: BoardSize,
    pub palette: PaletteIndex,
}

impl BoardInfo {
    /// Same canvas identity and dimensions. A `false` answer starts a new epoch.
    pub fn same_epoch(&self, other: &BoardInfo) -> bool {
        self.canvas_code == other.canvas_code && self.size == other.size
    }
}

/// Maps each palette-index byte to a packed color. Indices missing from the
/// palette leave the pixel at its zero default.
pub fn apply_snapshot(raw_indices: &[u8], palette: &PaletteIndex) -> Vec<u32> {
    raw_indices
        .iter()
        .map(|&index| palette.packed(index as u32).unwrap_or_default())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

#[derive(Debug)]
pub struct BoardReplica {
    surface_id: SurfaceId,
    surface: TextureSurface,
}

impl BoardReplica {
    /// Builds a replica from a snapshot and replays `buffered` deltas over it
    /// in order, later deltas winning on the same coordinate.
    pub fn from_snapshot(
        size: BoardSize,
        raw_indices: &[u8],
        palette: &PaletteIndex,
        buffered: &[PixelDelta],
    ) -> Result<Self, BoardError> {
        let expected = size.pixel_count();
        if raw_indices.len() != expected {
            return Err(BoardError::SnapshotSizeMismatch {
                expected,
                actual: raw_indices.len(),
            });
        }

        let pixels = apply_snapshot(raw_indices, palette);
        let mut replica = Self {
            surface_id: SurfaceId(0),
            surface: TextureSurface::from_pixels(size, pixels),
        };
        for delta in buffered {
            replica.apply_delta(*delta, palette);
        }
        // replayed rows are covered by the initial full upload
        replica.surface.mark_fully_dirty();
        Ok(replica)
    }

    pub fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    pub fn size(&self) -> BoardSize {
        self.surface.size()
    }

    pub fn pixels(&self) -> &[u32] {
        self.surface.pixels()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        self.surface.pixel(x, y)
    }

    pub fn surface(&self) -> &TextureSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut TextureSurface {
        &mut self.surface
    }

    /// Applies one delta. Returns the packed color written, or `None` when the
    /// coordinate is out of range or the palette has no such index.
    pub fn apply_delta(&mut self, delta: PixelDelta, palette: &PaletteIndex) -> Option<u32> {
        if !self.size().contains(delta.x as i64, delta.y as i64) {
            return None;
        }
        let color = palette.packed(delta.color_index)?;
        self.surface
            .set_pixel(delta.x as u32, delta.y as u32, color)
            .then_some(color)
    }
}

#[derive(Debug, Default)]
struct BoardSlot {
    replica: Option<BoardReplica>,
    next_surface_id: u64,
}

/// Holder of the one current replica.
///
/// The sync side writes, the renderer reads and drains dirty rows once per
/// frame; both do so under the same lock.
#[derive(Debug, Clone, Default)]
pub struct SharedBoard {
    slot: Arc<Mutex<BoardSlot>>,
}

impl SharedBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous replica and tags the new one with a fresh id.
    pub fn install(&self, mut replica: BoardReplica) -> SurfaceId {
        let mut slot = self.slot.lock();
        slot.next_surface_id += 1;
        let id = SurfaceId(slot.next_surface_id);
        replica.surface_id = id;
        replica.surface.mark_fully_dirty();
        slot.replica = Some(replica);
        id
    }

    /// Drops the current replica; the old buffer is freed before returning.
    pub fn reset(&self) {
        let previous = self.slot.lock().replica.take();
        drop(previous);
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.lock().replica.is_some()
    }

    pub fn size(&self) -> Option<BoardSize> {
        self.slot.lock().replica.as_ref().map(BoardReplica::size)
    }

    /// Applies a batch of deltas under one lock, calling `applied` for each
    /// delta that changed the board.
    pub fn apply_deltas<'a, I, F>(&self, deltas: I, palette: &PaletteIndex, mut applied: F) -> usize
    where
        I: IntoIterator<Item = &'a PixelDelta>,
        F: FnMut(PixelDelta, u32),
    {
        let mut slot = self.slot.lock();
        let Some(replica) = slot.replica.as_mut() else {
            return 0;
        };
        let mut count = 0;
        for delta in deltas {
            if let Some(color) = replica.apply_delta(*delta, palette) {
                applied(*delta, color);
                count += 1;
            }
        }
        count
    }

    pub fn with_replica<R>(&self, f: impl FnOnce(Option<&mut BoardReplica>) -> R) -> R {
        let mut slot = self.slot.lock();
        f(slot.replica.as_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{DirtyRegion, RowRange};

    fn palette() -> PaletteIndex {
        PaletteIndex::from_hex_entries([("a", "000000"), ("b", "ff0000"), ("c", "00ff00")])
            .expect("palette")
    }

    fn packed(index: u32) -> u32 {
        palette().packed(index).expect("color")
    }

    #[test]
    fn snapshot_maps_indices_and_tolerates_unknown_ones() {
        let pixels = apply_snapshot(&[0, 1, 2, 9], &palette());
        assert_eq!(pixels, vec![packed(0), packed(1), packed(2), 0]);
    }

    #[test]
    fn replay_matches_sequential_application() {
        let size = BoardSize::new(3, 2);
        let raw = [0u8, 0, 0, 1, 1, 1];
        let deltas = [
            PixelDelta::new(0, 0, 1),
            PixelDelta::new(2, 1, 2),
            PixelDelta::new(0, 0, 2),
            PixelDelta::new(5, 5, 1),
            PixelDelta::new(1, 0, 7),
        ];

        let replayed = BoardReplica::from_snapshot(size, &raw, &palette(), &deltas).expect("replica");

        let mut sequential =
            BoardReplica::from_snapshot(size, &raw, &palette(), &[]).expect("replica");
        for delta in deltas {
            sequential.apply_delta(delta, &palette());
        }

        assert_eq!(replayed.pixels(), sequential.pixels());
        assert_eq!(replayed.pixel(0, 0), Some(packed(2)));
        assert_eq!(replayed.pixel(2, 1), Some(packed(2)));
        assert_eq!(replayed.pixel(1, 0), Some(packed(0)));
    }

    #[test]
    fn rejects_snapshot_of_wrong_length() {
        let error = BoardReplica::from_snapshot(BoardSize::new(4, 4), &[0; 15], &palette(), &[])
            .expect_err("size mismatch");
        assert_eq!(
            error,
            BoardError::SnapshotSizeMismatch {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn out_of_range_deltas_are_ignored() {
        let mut replica =
            BoardReplica::from_snapshot(BoardSize::new(2, 2), &[0; 4], &palette(), &[]).expect("replica");
        let before = replica.pixels().to_vec();
        assert_eq!(replica.apply_delta(PixelDelta::new(-1, 0, 1), &palette()), None);
        assert_eq!(replica.apply_delta(PixelDelta::new(0, 2, 1), &palette()), None);
        assert_eq!(replica.pixels(), before.as_slice());
    }

    #[test]
    fn shared_board_install_reset_and_deltas() {
        let board = SharedBoard::new();
        assert!(!board.is_loaded());
        assert_eq!(
            board.apply_deltas(&[PixelDelta::new(0, 0, 1)], &palette(), |_, _| {}),
            0
        );

        let replica =
            BoardReplica::from_snapshot(BoardSize::new(2, 3), &[0; 6], &palette(), &[]).expect("replica");
        let first = board.install(replica);
        let replica =
            BoardReplica::from_snapshot(BoardSize::new(2, 3), &[0; 6], &palette(), &[]).expect("replica");
        let second = board.install(replica);
        assert!(second > first);

        board.with_replica(|replica| {
            let replica = replica.expect("loaded");
            assert_eq!(replica.surface_id(), second);
            assert_eq!(replica.surface_mut().drain_dirty_ranges(), DirtyRegion::Full);
        });

        let mut seen = Vec::new();
        let applied = board.apply_deltas(
            &[PixelDelta::new(1, 2, 2), PixelDelta::new(9, 9, 2)],
            &palette(),
            |delta, color| seen.push((delta, color)),
        );
        assert_eq!(applied, 1);
        assert_eq!(seen, vec![(PixelDelta::new(1, 2, 2), packed(2))]);
        board.with_replica(|replica| {
            let surface = replica.expect("loaded").surface_mut();
            assert_eq!(
                surface.drain_dirty_ranges(),
                DirtyRegion::Rows(vec![RowRange::new(2, 1)])
            );
        });

        board.reset();
        assert!(!board.is_loaded());
        assert_eq!(board.size(), None);
    }
}
