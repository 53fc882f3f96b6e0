use model::{BoardReplica, BoardSize, DirtyRegion, RowRange, SurfaceId};
use tracing::{debug, trace};

use crate::layer::{FrameContext, Layer};
use crate::target::{BoardDraw, RenderTarget, TextureId};

#[derive(Debug, Clone, Copy)]
struct UploadedSurface {
    texture: TextureId,
    surface: SurfaceId,
    size: BoardSize,
}

/// Draws the board bitmap, keeping one GPU texture in step with the
/// replica's texture surface.
#[derive(Debug, Default)]
pub struct BoardLayer {
    uploaded: Option<UploadedSurface>,
}

impl BoardLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.uploaded.map(|uploaded| uploaded.texture)
    }

    fn sync(
        &mut self,
        target: &mut dyn RenderTarget,
        replica: Option<&mut BoardReplica>,
    ) -> Option<UploadedSurface> {
        let Some(replica) = replica else {
            self.release(target);
            return None;
        };

        let surface_id = replica.surface_id();
        let size = replica.size();
        let surface = replica.surface_mut();

        match self.uploaded {
            Some(uploaded) if uploaded.surface == surface_id => {
                match surface.drain_dirty_ranges() {
                    DirtyRegion::Clean => {}
                    DirtyRegion::Full => {
                        trace!("full board upload");
                        target.upload_rows(
                            uploaded.texture,
                            RowRange::new(0, size.height),
                            surface.pixels(),
                        );
                    }
                    DirtyRegion::Rows(ranges) => {
                        trace!(ranges = ranges.len(), "partial board upload");
                        for range in ranges {
                            target.upload_rows(uploaded.texture, range, surface.rows(range));
                        }
                    }
                }
            }
            _ => {
                self.release(target);
                let texture = target.create_texture(size);
                debug!(
                    surface = surface_id.0,
                    width = size.width,
                    height = size.height,
                    "board texture created"
                );
                // first upload covers everything already marked
                let _ = surface.drain_dirty_ranges();
                target.upload_rows(texture, RowRange::new(0, size.height), surface.pixels());
                self.uploaded = Some(UploadedSurface {
                    texture,
                    surface: surface_id,
                    size,
                });
            }
        }
        self.uploaded
    }

    fn release(&mut self, target: &mut dyn RenderTarget) {
        if let Some(uploaded) = self.uploaded.take() {
            debug!(surface = uploaded.surface.0, "board texture released");
            target.destroy_texture(uploaded.texture);
        }
    }
}

impl Layer for BoardLayer {
    fn draw(&mut self, target: &mut dyn RenderTarget, frame: &FrameContext<'_>, opacity: f32) {
        let uploaded = frame
            .board
            .with_replica(|replica| self.sync(target, replica));
        if let (Some(uploaded), Some(clip_matrix)) = (uploaded, frame.clip_matrix) {
            target.draw_board(&BoardDraw {
                texture: uploaded.texture,
                clip_matrix,
                size: uploaded.size,
                opacity,
            });
        }
    }

    fn destroy(&mut self, target: &mut dyn RenderTarget) {
        self.release(target);
    }
}
