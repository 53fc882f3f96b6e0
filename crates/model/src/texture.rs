//! CPU-side texture buffer with scanline dirty tracking.
//!
//! Ingestion only flips a bit per row; ranges are coalesced when the renderer
//! drains them once per frame.

use bitvec::prelude::{BitVec, Lsb0};

use crate::geometry::BoardSize;

/// Contiguous run of dirty scanlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: u32,
    pub count: u32,
}

impl RowRange {
    pub const fn new(start: u32, count: u32) -> Self {
        Self { start, count }
    }

    pub const fn end(&self) -> u32 {
        self.start + self.count
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirtyRegion {
    Clean,
    Full,
    /// Sorted, non-adjacent ranges.
    Rows(Vec<RowRange>),
}

pub struct TextureSurface {
    size: BoardSize,
    // pixels.len() == size.pixel_count() == width * height
    pixels: Box<[u32]>,
    // dirty_rows.len() == size.height
    dirty_rows: BitVec<usize, Lsb0>,
    dirty_row_count: usize,
    fully_dirty: bool,
}

impl TextureSurface {
    /// A zeroed surface that starts fully dirty.
    pub fn new(size: BoardSize) -> Self {
        Self::from_pixels(size, vec![0; size.pixel_count()])
    }

    /// Takes ownership of `pixels`; panics when the length does not match
    /// `size`, since a mismatched buffer would break every row offset.
    pub fn from_pixels(size: BoardSize, pixels: Vec<u32>) -> Self {
        assert_eq!(
            pixels.len(),
            size.pixel_count(),
            "texture surface buffer length must equal width * height"
        );
        Self {
            size,
            pixels: pixels.into_boxed_slice(),
            dirty_rows: BitVec::repeat(false, size.height as usize),
            dirty_row_count: 0,
            fully_dirty: true,
        }
    }

    pub fn size(&self) -> BoardSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Pixels of `range`, row-major, full width.
    pub fn rows(&self, range: RowRange) -> &[u32] {
        let width = self.size.width as usize;
        let start = range.start as usize * width;
        let end = (range.end() as usize).min(self.size.height as usize) * width;
        &self.pixels[start.min(end)..end]
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        Some(self.pixels[y as usize * self.size.width as usize + x as usize])
    }

    /// Writes one pixel and marks its row. Out-of-range coordinates are
    /// ignored and return `false`.
    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: u32) -> bool {
        if x >= self.size.width || y >= self.size.height {
            return false;
        }
        self.pixels[y as usize * self.size.width as usize + x as usize] = color;
        self.mark_row_dirty(y);
        true
    }

    #[inline]
    pub fn mark_row_dirty(&mut self, y: u32) {
        if self.fully_dirty || y >= self.size.height {
            return;
        }
        let index = y as usize;
        let was_dirty = self.dirty_rows[index];
        self.dirty_rows.set(index, true);
        self.dirty_row_count += !was_dirty as usize;
    }

    pub fn mark_fully_dirty(&mut self) {
        self.fully_dirty = true;
        if self.dirty_row_count > 0 {
            self.dirty_rows.fill(false);
            self.dirty_row_count = 0;
        }
    }

    pub fn is_clean(&self) -> bool {
        !self.fully_dirty && self.dirty_row_count == 0
    }

    pub fn dirty_row_count(&self) -> usize {
        self.dirty_row_count
    }

    /// Reads and clears the dirty state in one step.
    pub fn drain_dirty_ranges(&mut self) -> DirtyRegion {
        if self.fully_dirty {
            self.fully_dirty = false;
            if self.dirty_row_count > 0 {
                self.dirty_rows.fill(false);
                self.dirty_row_count = 0;
            }
            return DirtyRegion::Full;
        }
        if self.dirty_row_count == 0 {
            return DirtyRegion::Clean;
        }

        let mut ranges: Vec<RowRange> = Vec::new();
        for row in self.dirty_rows.iter_ones() {
            let row = row as u32;
            match ranges.last_mut() {
                Some(last) if last.end() == row => last.count += 1,
                _ => ranges.push(RowRange::new(row, 1)),
            }
        }
        self.dirty_rows.fill(false);
        self.dirty_row_count = 0;
        DirtyRegion::Rows(ranges)
    }
}

impl std::fmt::Debug for TextureSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureSurface")
            .field("size", &self.size)
            .field("dirty_row_count", &self.dirty_row_count)
            .field("fully_dirty", &self.fully_dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_surface(width: u32, height: u32) -> TextureSurface {
        let mut surface = TextureSurface::new(BoardSize::new(width, height));
        assert_eq!(surface.drain_dirty_ranges(), DirtyRegion::Full);
        surface
    }

    #[test]
    fn coalesces_adjacent_rows_into_ranges() {
        let mut surface = clean_surface(4, 16);
        for row in [2, 3, 4, 7, 9, 10] {
            surface.mark_row_dirty(row);
        }

        assert_eq!(
            surface.drain_dirty_ranges(),
            DirtyRegion::Rows(vec![
                RowRange::new(2, 3),
                RowRange::new(7, 1),
                RowRange::new(9, 2),
            ])
        );
        assert_eq!(surface.drain_dirty_ranges(), DirtyRegion::Clean);
    }

    #[test]
    fn marking_is_order_independent_and_idempotent() {
        let mut surface = clean_surface(2, 8);
        for row in [5, 1, 5, 0, 1] {
            surface.mark_row_dirty(row);
        }
        assert_eq!(surface.dirty_row_count(), 3);
        assert_eq!(
            surface.drain_dirty_ranges(),
            DirtyRegion::Rows(vec![RowRange::new(0, 2), RowRange::new(5, 1)])
        );
    }

    #[test]
    fn full_dirty_subsumes_rows() {
        let mut surface = clean_surface(2, 8);
        surface.mark_row_dirty(3);
        surface.mark_fully_dirty();
        surface.mark_row_dirty(4);

        assert_eq!(surface.drain_dirty_ranges(), DirtyRegion::Full);
        assert!(surface.is_clean());
        assert_eq!(surface.drain_dirty_ranges(), DirtyRegion::Clean);
    }

    #[test]
    fn set_pixel_marks_row_and_ignores_out_of_bounds() {
        let mut surface = clean_surface(3, 3);
        assert!(surface.set_pixel(2, 1, 0xff00_00ff));
        assert!(!surface.set_pixel(3, 1, 7));
        assert!(!surface.set_pixel(0, 3, 7));

        assert_eq!(surface.pixel(2, 1), Some(0xff00_00ff));
        assert_eq!(
            surface.drain_dirty_ranges(),
            DirtyRegion::Rows(vec![RowRange::new(1, 1)])
        );
    }

    #[test]
    fn rows_slices_full_width_scanlines() {
        let pixels: Vec<u32> = (0..12).collect();
        let surface = TextureSurface::from_pixels(BoardSize::new(3, 4), pixels);
        assert_eq!(surface.rows(RowRange::new(1, 2)), &[3, 4, 5, 6, 7, 8]);
        assert_eq!(surface.rows(RowRange::new(3, 5)), &[9, 10, 11]);
    }
}
