use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use model::{BoardSize, RowRange};
use tracing::{debug, info, warn};

use crate::error::RenderError;
use crate::target::{BoardDraw, RenderTarget, ReticleDraw, TextureId};

const BOARD_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BoardUniform {
    clip_from_board: [f32; 16],
    size: [f32; 2],
    opacity: f32,
    _pad: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ReticleUniform {
    clip_from_board: [f32; 16],
    rect: [f32; 4],
    color: [f32; 4],
    border_cutoff: f32,
    opacity: f32,
    _pad: [f32; 2],
}

struct BoardTexture {
    texture: wgpu::Texture,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    size: BoardSize,
}

#[derive(Debug, Clone, Copy)]
enum QueuedDraw {
    Board(TextureId),
    Reticle,
}

struct Frame {
    surface_texture: wgpu::SurfaceTexture,
    clear: wgpu::Color,
    draws: Vec<QueuedDraw>,
}

/// [`RenderTarget`] presenting to a window surface.
pub struct WgpuTarget {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    board_pipeline: wgpu::RenderPipeline,
    board_bind_group_layout: wgpu::BindGroupLayout,
    board_sampler: wgpu::Sampler,
    reticle_pipeline: wgpu::RenderPipeline,
    reticle_uniform: wgpu::Buffer,
    reticle_bind_group: wgpu::BindGroup,
    textures: HashMap<TextureId, BoardTexture>,
    next_texture_id: u64,
    frame: Option<Frame>,
}

impl WgpuTarget {
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        info!(adapter = ?adapter.get_info().name, "gpu adapter selected");

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("pxboard.device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .ok_or(RenderError::UnsupportedSurface)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let board_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("board.bind_group_layout"),
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });
        // hard pixel edges at every zoom level
        let board_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("board.sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });
        let board_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("board.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("board.wgsl").into()),
        });
        let board_pipeline = create_quad_pipeline(
            &device,
            "board.pipeline",
            &board_shader,
            &board_bind_group_layout,
            format,
        );

        let reticle_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("reticle.bind_group_layout"),
                entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT)],
            });
        let reticle_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("reticle.uniform"),
            size: std::mem::size_of::<ReticleUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let reticle_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("reticle.bind_group"),
            layout: &reticle_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: reticle_uniform.as_entire_binding(),
            }],
        });
        let reticle_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("reticle.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("reticle.wgsl").into()),
        });
        let reticle_pipeline = create_quad_pipeline(
            &device,
            "reticle.pipeline",
            &reticle_shader,
            &reticle_bind_group_layout,
            format,
        );

        Ok(Self {
            device,
            queue,
            surface,
            config,
            board_pipeline,
            board_bind_group_layout,
            board_sampler,
            reticle_pipeline,
            reticle_uniform,
            reticle_bind_group,
            textures: HashMap::new(),
            next_texture_id: 0,
            frame: None,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        if self.config.width == width && self.config.height == height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    fn surface_is_srgb(&self) -> bool {
        self.config.format.is_srgb()
    }

    /// Clear and blend colors are linear when the surface encodes sRGB.
    fn output_channel(&self, value: f32) -> f32 {
        if self.surface_is_srgb() {
            srgb_to_linear(value)
        } else {
            value
        }
    }
}

impl RenderTarget for WgpuTarget {
    fn begin_frame(&mut self, clear: [u8; 3]) -> Result<(), RenderError> {
        if self.frame.is_some() {
            warn!("begin_frame called twice, dropping the unfinished frame");
            self.frame = None;
        }
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(error @ (wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost)) => {
                debug!(?error, "surface lost, reconfiguring");
                self.reconfigure();
                return Err(error.into());
            }
            Err(error) => return Err(error.into()),
        };
        let [r, g, b] = clear.map(|channel| self.output_channel(channel as f32 / 255.0) as f64);
        self.frame = Some(Frame {
            surface_texture,
            clear: wgpu::Color { r, g, b, a: 1.0 },
            draws: Vec::new(),
        });
        Ok(())
    }

    fn create_texture(&mut self, size: BoardSize) -> TextureId {
        let id = TextureId(self.next_texture_id);
        self.next_texture_id += 1;

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("board.texture"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: BOARD_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let uniform = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("board.uniform"),
            size: std::mem::size_of::<BoardUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("board.bind_group"),
            layout: &self.board_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.board_sampler),
                },
            ],
        });
        self.textures.insert(
            id,
            BoardTexture {
                texture,
                uniform,
                bind_group,
                size,
            },
        );
        id
    }

    fn upload_rows(&mut self, texture: TextureId, rows: RowRange, pixels: &[u32]) {
        let Some(entry) = self.textures.get(&texture) else {
            warn!(texture = texture.0, "upload to unknown texture");
            return;
        };
        let width = entry.size.width;
        let expected = width as usize * rows.count as usize;
        if rows.count == 0
            || width == 0
            || pixels.len() != expected
            || rows.end() > entry.size.height
        {
            warn!(
                texture = texture.0,
                start = rows.start,
                count = rows.count,
                len = pixels.len(),
                "rejecting malformed row upload"
            );
            return;
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: 0,
                    y: rows.start,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(pixels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(rows.count),
            },
            wgpu::Extent3d {
                width,
                height: rows.count,
                depth_or_array_layers: 1,
            },
        );
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if let Some(entry) = self.textures.remove(&texture) {
            entry.texture.destroy();
            entry.uniform.destroy();
        }
    }

    fn draw_board(&mut self, draw: &BoardDraw) {
        let Some(entry) = self.textures.get(&draw.texture) else {
            warn!(texture = draw.texture.0, "draw of unknown texture");
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let uniform = BoardUniform {
            clip_from_board: draw.clip_matrix,
            size: [draw.size.width as f32, draw.size.height as f32],
            opacity: draw.opacity.clamp(0.0, 1.0),
            _pad: 0.0,
        };
        self.queue
            .write_buffer(&entry.uniform, 0, bytemuck::bytes_of(&uniform));
        frame.draws.push(QueuedDraw::Board(draw.texture));
    }

    fn draw_reticle(&mut self, draw: &ReticleDraw) {
        if self.frame.is_none() {
            return;
        }
        let [r, g, b, a] = draw.color;
        let uniform = ReticleUniform {
            clip_from_board: draw.clip_matrix,
            rect: [draw.rect.x, draw.rect.y, draw.rect.width, draw.rect.height],
            color: [
                self.output_channel(r),
                self.output_channel(g),
                self.output_channel(b),
                a,
            ],
            border_cutoff: draw.border_cutoff,
            opacity: draw.opacity.clamp(0.0, 1.0),
            _pad: [0.0; 2],
        };
        self.queue
            .write_buffer(&self.reticle_uniform, 0, bytemuck::bytes_of(&uniform));
        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(QueuedDraw::Reticle);
        }
    }

    fn end_frame(&mut self) {
        let Some(frame) = self.frame.take() else {
            return;
        };
        let view = frame
            .surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pxboard.frame"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pxboard.frame"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            pass.set_viewport(
                0.0,
                0.0,
                self.config.width as f32,
                self.config.height as f32,
                0.0,
                1.0,
            );
            for draw in &frame.draws {
                match draw {
                    QueuedDraw::Board(texture) => {
                        let Some(entry) = self.textures.get(texture) else {
                            continue;
                        };
                        pass.set_pipeline(&self.board_pipeline);
                        pass.set_bind_group(0, &entry.bind_group, &[]);
                        pass.draw(0..6, 0..1);
                    }
                    QueuedDraw::Reticle => {
                        pass.set_pipeline(&self.reticle_pipeline);
                        pass.set_bind_group(0, &self.reticle_bind_group, &[]);
                        pass.draw(0..6, 0..1);
                    }
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        frame.surface_texture.present();
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_quad_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        immediate_size: 0,
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}
