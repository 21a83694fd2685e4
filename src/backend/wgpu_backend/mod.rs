//! wgpu backend implementation
//!
//! The binding surface is immediate-mode (use a program, set uniforms, bind
//! textures, draw) while wgpu wants pipelines and bind groups. Each draw is
//! buffered together with a snapshot of the program's uniform block and the
//! bound texture units; `end_frame` uploads all snapshots into one uniform
//! buffer and replays the draws inside a single render pass.

mod reflect;

pub use reflect::{ProgramReflection, TextureBinding, UniformLayout, UniformSlot};

use crate::backend::traits::*;
use crate::backend::types::*;
use reflect::{TEXTURE_GROUP, UNIFORM_BINDING, UNIFORM_GROUP};
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;
use wgpu::util::DeviceExt;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    attributes: Vec<VertexDataAttribute>,
    topology: PrimitiveTopology,
}

struct VertexArray {
    vertex_buffer: u64,
    index_buffer: u64,
    index_format: IndexFormat,
    attributes: Vec<VertexDataAttribute>,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    dimension: TextureDimension,
}

struct Program {
    label: Option<String>,
    module: wgpu::ShaderModule,
    reflection: ProgramReflection,
    uniform_data: Vec<u8>,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

/// Buffered indexed draw
struct RecordedDraw {
    program: u64,
    vertex_array: u64,
    key: PipelineKey,
    index_count: u32,
    uniforms: Vec<u8>,
    textures: HashMap<u32, u64>,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    current_texture: Option<wgpu::SurfaceTexture>,
    depth_view: wgpu::TextureView,
    clear_colour: wgpu::Color,

    // Resource storage
    buffers: HashMap<u64, wgpu::Buffer>,
    vertex_arrays: HashMap<u64, VertexArray>,
    textures: HashMap<u64, GpuTexture>,
    programs: HashMap<u64, Program>,
    // 1x1 white textures bound to units the program samples but nothing is bound to
    fallback_2d: GpuTexture,
    fallback_cube: GpuTexture,

    // Handle counters
    next_buffer_id: u64,
    next_vertex_array_id: u64,
    next_texture_id: u64,
    next_program_id: u64,

    // Immediate-mode state
    current_program: Option<u64>,
    bound_textures: HashMap<u32, u64>,
    bound_vertex_array: Option<u64>,

    // Draws buffered until end_frame
    pending_draws: Vec<RecordedDraw>,
}

impl WgpuBackend {
    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        }
    }

    fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
        let mut result = wgpu::BufferUsages::empty();
        if usage.contains(BufferUsage::COPY_DST) {
            result |= wgpu::BufferUsages::COPY_DST;
        }
        if usage.contains(BufferUsage::INDEX) {
            result |= wgpu::BufferUsages::INDEX;
        }
        if usage.contains(BufferUsage::VERTEX) {
            result |= wgpu::BufferUsages::VERTEX;
        }
        if usage.contains(BufferUsage::UNIFORM) {
            result |= wgpu::BufferUsages::UNIFORM;
        }
        result
    }

    fn convert_vertex_format(attribute: &VertexDataAttribute) -> wgpu::VertexFormat {
        match (attribute.ty, attribute.size) {
            (VertexDataAttributeType::Float, 1) => wgpu::VertexFormat::Float32,
            (VertexDataAttributeType::Float, 2) => wgpu::VertexFormat::Float32x2,
            (VertexDataAttributeType::Float, 3) => wgpu::VertexFormat::Float32x3,
            (VertexDataAttributeType::Float, _) => wgpu::VertexFormat::Float32x4,
            (VertexDataAttributeType::Int, 1) => wgpu::VertexFormat::Sint32,
            (VertexDataAttributeType::Int, 2) => wgpu::VertexFormat::Sint32x2,
            (VertexDataAttributeType::Int, 3) => wgpu::VertexFormat::Sint32x3,
            (VertexDataAttributeType::Int, _) => wgpu::VertexFormat::Sint32x4,
        }
    }

    fn convert_topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
        match topology {
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        }
    }

    fn convert_filter_mode(mode: FilterMode) -> wgpu::FilterMode {
        match mode {
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }

    fn convert_address_mode(mode: AddressMode) -> wgpu::AddressMode {
        match mode {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
        }
    }

    fn view_dimension(dimension: TextureDimension) -> wgpu::TextureViewDimension {
        match dimension {
            TextureDimension::D2 => wgpu::TextureViewDimension::D2,
            TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
        }
    }
}

impl WgpuBackend {
    /// Create a backend rendering into `window`
    pub fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    pub async fn new_async(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        let (instance, surface, adapter, device, queue) = Self::init_native(window.clone()).await?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| {
                BackendError::SurfaceCreationFailed("Surface reports no formats".into())
            })?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let (width, height) =
            Self::clamp_size(device.limits().max_texture_dimension_2d, size.width, size.height);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);

        let depth_view = Self::create_depth_view(&device, width, height);
        let fallback_2d = Self::create_fallback(&device, &queue, TextureDimension::D2);
        let fallback_cube = Self::create_fallback(&device, &queue, TextureDimension::Cube);

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            surface_config,
            current_texture: None,
            depth_view,
            clear_colour: wgpu::Color {
                r: 0.05,
                g: 0.05,
                b: 0.08,
                a: 1.0,
            },
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            programs: HashMap::new(),
            fallback_2d,
            fallback_cube,
            next_buffer_id: 1,
            next_vertex_array_id: 1,
            next_texture_id: 1,
            next_program_id: 1,
            current_program: None,
            bound_textures: HashMap::new(),
            bound_vertex_array: None,
            pending_draws: Vec::new(),
        })
    }

    async fn init_native(
        window: Arc<winit::window::Window>,
    ) -> BackendResult<(
        wgpu::Instance,
        wgpu::Surface<'static>,
        wgpu::Adapter,
        wgpu::Device,
        wgpu::Queue,
    )> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Graphics Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        Ok((instance, surface, adapter, device, queue))
    }

    // Clamp to device limits while maintaining aspect ratio
    fn clamp_size(max_size: u32, width: u32, height: u32) -> (u32, u32) {
        if width > max_size || height > max_size {
            let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
            (
                ((width as f32 * scale) as u32).max(1),
                ((height as f32 * scale) as u32).max(1),
            )
        } else {
            (width.max(1), height.max(1))
        }
    }

    fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Buffer"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_fallback(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        dimension: TextureDimension,
    ) -> GpuTexture {
        let desc = TextureDescriptor {
            label: Some("Fallback Texture".into()),
            dimension,
            ..Default::default()
        };
        let pixels = vec![255u8; desc.data_size()];
        Self::upload_texture(device, queue, &desc, &pixels)
    }

    fn upload_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: &TextureDescriptor,
        data: &[u8],
    ) -> GpuTexture {
        let layers = desc.dimension.layers();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::convert_texture_format(desc.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(desc.width * desc.format.bytes_per_pixel()),
                rows_per_image: Some(desc.height),
            },
            wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: layers,
            },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: desc.label.as_deref(),
            dimension: Some(Self::view_dimension(desc.dimension)),
            ..Default::default()
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: Self::convert_address_mode(desc.sampler.address_mode_u),
            address_mode_v: Self::convert_address_mode(desc.sampler.address_mode_v),
            address_mode_w: Self::convert_address_mode(desc.sampler.address_mode_w),
            mag_filter: Self::convert_filter_mode(desc.sampler.mag_filter),
            min_filter: Self::convert_filter_mode(desc.sampler.min_filter),
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        GpuTexture {
            texture,
            view,
            sampler,
            dimension: desc.dimension,
        }
    }

    /// Set the colour the frame is cleared to
    pub fn set_clear_colour(&mut self, r: f64, g: f64, b: f64) {
        self.clear_colour = wgpu::Color { r, g, b, a: 1.0 };
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn pipeline_for(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        program: &mut Program,
        key: &PipelineKey,
    ) {
        if program.pipelines.contains_key(key) {
            return;
        }

        let offsets = vertex_offsets(&key.attributes);
        let attributes: Vec<wgpu::VertexAttribute> = key
            .attributes
            .iter()
            .zip(offsets)
            .enumerate()
            .map(|(location, (attrib, offset))| wgpu::VertexAttribute {
                format: Self::convert_vertex_format(attrib),
                offset: offset as u64,
                shader_location: location as u32,
            })
            .collect();

        let vertex_buffers = [wgpu::VertexBufferLayout {
            array_stride: vertex_stride(&key.attributes) as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];

        let color_targets = [Some(wgpu::ColorTargetState {
            format: color_format,
            blend: Some(wgpu::BlendState::ALPHA_BLENDING),
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: program.label.as_deref(),
            layout: Some(&program.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: "vs_main",
                buffers: &vertex_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: "fs_main",
                targets: &color_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: Self::convert_topology(key.topology),
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        program.pipelines.insert(key.clone(), pipeline);
    }

    /// Upload every buffered draw and replay it into one render pass
    fn flush_draws(&mut self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let draws = std::mem::take(&mut self.pending_draws);

        let color_format = self.surface_config.format;
        for draw in &draws {
            if let Some(program) = self.programs.get_mut(&draw.program) {
                Self::pipeline_for(&self.device, color_format, program, &draw.key);
            }
        }

        // One uniform buffer holding every snapshot at aligned offsets
        let alignment = self.device.limits().min_uniform_buffer_offset_alignment as usize;
        let mut uniform_bytes = Vec::new();
        let mut uniform_offsets = Vec::with_capacity(draws.len());
        for draw in &draws {
            uniform_offsets.push(uniform_bytes.len() as u64);
            uniform_bytes.extend_from_slice(&draw.uniforms);
            let padded = uniform_bytes.len().div_ceil(alignment) * alignment;
            uniform_bytes.resize(padded, 0);
        }
        if uniform_bytes.is_empty() {
            uniform_bytes.resize(alignment, 0);
        }
        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Frame Uniforms"),
            contents: &uniform_bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut bind_groups = Vec::with_capacity(draws.len());
        for (draw, uniform_offset) in draws.iter().zip(&uniform_offsets) {
            let Some(program) = self.programs.get(&draw.program) else {
                bind_groups.push(None);
                continue;
            };

            let uniform_size = NonZeroU64::new(draw.uniforms.len() as u64);
            let uniform_entries: Vec<wgpu::BindGroupEntry> = uniform_size
                .map(|size| wgpu::BindGroupEntry {
                    binding: UNIFORM_BINDING,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &uniform_buffer,
                        offset: *uniform_offset,
                        size: Some(size),
                    }),
                })
                .into_iter()
                .collect();
            let uniforms = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Draw Uniforms"),
                layout: &program.uniform_layout,
                entries: &uniform_entries,
            });

            let mut texture_entries = Vec::with_capacity(program.reflection.textures.len() * 2);
            for binding in &program.reflection.textures {
                let texture = draw
                    .textures
                    .get(&binding.unit)
                    .and_then(|id| self.textures.get(id))
                    .filter(|tex| tex.dimension == binding.dimension)
                    .unwrap_or(match binding.dimension {
                        TextureDimension::D2 => &self.fallback_2d,
                        TextureDimension::Cube => &self.fallback_cube,
                    });
                texture_entries.push(wgpu::BindGroupEntry {
                    binding: binding.unit * 2,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                });
                texture_entries.push(wgpu::BindGroupEntry {
                    binding: binding.unit * 2 + 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                });
            }
            let textures = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Draw Textures"),
                layout: &program.texture_layout,
                entries: &texture_entries,
            });

            bind_groups.push(Some((uniforms, textures)));
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Batch Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_colour),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for (draw, groups) in draws.iter().zip(&bind_groups) {
            let Some((uniforms, textures)) = groups else {
                continue;
            };
            let Some(pipeline) = self
                .programs
                .get(&draw.program)
                .and_then(|p| p.pipelines.get(&draw.key))
            else {
                continue;
            };
            let Some(vertex_array) = self.vertex_arrays.get(&draw.vertex_array) else {
                continue;
            };
            let (Some(vertex_buffer), Some(index_buffer)) = (
                self.buffers.get(&vertex_array.vertex_buffer),
                self.buffers.get(&vertex_array.index_buffer),
            ) else {
                continue;
            };

            let index_format = match vertex_array.index_format {
                IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
            };

            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(UNIFORM_GROUP, uniforms, &[]);
            render_pass.set_bind_group(TEXTURE_GROUP, textures, &[]);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.set_index_buffer(index_buffer.slice(..), index_format);
            render_pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            let (width, height) =
                Self::clamp_size(self.device.limits().max_texture_dimension_2d, width, height);
            self.surface_config.width = width;
            self.surface_config.height = height;
            self.surface.configure(&self.device, &self.surface_config);
            self.depth_view = Self::create_depth_view(&self.device, width, height);
        }
    }

    fn begin_frame(&mut self) -> BackendResult<()> {
        let output = self
            .surface
            .get_current_texture()
            .map_err(|e| match e {
                wgpu::SurfaceError::Lost => BackendError::SurfaceLost,
                wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
                _ => BackendError::AcquireImageFailed(e.to_string()),
            })?;

        self.current_texture = Some(output);
        self.pending_draws.clear();
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        let Some(output) = self.current_texture.take() else {
            return Ok(());
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.flush_draws(&mut encoder, &view);

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: desc.label.as_deref(),
            contents: data,
            usage: Self::convert_buffer_usage(desc.usage),
        });

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.buffers.insert(id, buffer);

        Ok(BufferHandle(id))
    }

    fn create_vertex_array(
        &mut self,
        desc: &VertexArrayDescriptor,
    ) -> BackendResult<VertexArrayHandle> {
        if !self.buffers.contains_key(&desc.vertex_buffer.0)
            || !self.buffers.contains_key(&desc.index_buffer.0)
        {
            return Err(BackendError::VertexArrayCreationFailed(
                "vertex array references an unknown buffer".into(),
            ));
        }
        if desc.attributes.iter().any(|a| a.size == 0 || a.size > 4) {
            return Err(BackendError::VertexArrayCreationFailed(
                "attributes must have between 1 and 4 components".into(),
            ));
        }

        let id = self.next_vertex_array_id;
        self.next_vertex_array_id += 1;
        self.vertex_arrays.insert(
            id,
            VertexArray {
                vertex_buffer: desc.vertex_buffer.0,
                index_buffer: desc.index_buffer.0,
                index_format: desc.index_format,
                attributes: desc.attributes.clone(),
            },
        );

        Ok(VertexArrayHandle(id))
    }

    fn create_texture(
        &mut self,
        desc: &TextureDescriptor,
        data: &[u8],
    ) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed("zero-sized texture".into()));
        }
        if data.len() != desc.data_size() {
            return Err(BackendError::TextureCreationFailed(format!(
                "expected {} bytes of pixel data, got {}",
                desc.data_size(),
                data.len()
            )));
        }
        let max_size = self.device.limits().max_texture_dimension_2d;
        if desc.width > max_size || desc.height > max_size {
            return Err(BackendError::TextureCreationFailed(format!(
                "{}x{} exceeds the device limit of {}",
                desc.width, desc.height, max_size
            )));
        }

        let texture = Self::upload_texture(&self.device, &self.queue, desc, data);

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, texture);

        Ok(TextureHandle(id))
    }

    fn create_program(&mut self, desc: &ProgramDescriptor) -> BackendResult<ProgramHandle> {
        let parsed = naga::front::wgsl::parse_str(&desc.source)
            .map_err(|e| BackendError::ShaderCreationFailed(e.emit_to_string(&desc.source)))?;
        let reflection = ProgramReflection::reflect(&parsed);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: desc.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(desc.source.as_str().into()),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::ShaderCreationFailed(error.to_string()));
        }

        let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> =
            NonZeroU64::new(reflection.uniforms.size() as u64)
                .map(|size| wgpu::BindGroupLayoutEntry {
                    binding: UNIFORM_BINDING,
                    visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(size),
                    },
                    count: None,
                })
                .into_iter()
                .collect();
        let uniform_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Uniform Layout"),
                entries: &uniform_entries,
            });

        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = reflection
            .textures
            .iter()
            .flat_map(|binding| {
                [
                    wgpu::BindGroupLayoutEntry {
                        binding: binding.unit * 2,
                        visibility,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: Self::view_dimension(binding.dimension),
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: binding.unit * 2 + 1,
                        visibility,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ]
            })
            .collect();
        let texture_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Texture Layout"),
                entries: &texture_entries,
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: desc.label.as_deref(),
                bind_group_layouts: &[&uniform_layout, &texture_layout],
                push_constant_ranges: &[],
            });

        log::debug!(
            "Program {:?}: {} uniforms in {} bytes, {} texture units",
            desc.label,
            reflection.uniforms.len(),
            reflection.uniforms.size(),
            reflection.textures.len()
        );

        let id = self.next_program_id;
        self.next_program_id += 1;
        self.programs.insert(
            id,
            Program {
                label: desc.label.clone(),
                module,
                uniform_data: vec![0; reflection.uniforms.size() as usize],
                reflection,
                uniform_layout,
                texture_layout,
                pipeline_layout,
                pipelines: HashMap::new(),
            },
        );

        Ok(ProgramHandle(id))
    }

    fn use_program(&mut self, program: Option<ProgramHandle>) {
        self.current_program = program.map(|p| p.0);
    }

    fn set_uniform(&mut self, program: ProgramHandle, name: &str, value: UniformValue) {
        let Some(program) = self.programs.get_mut(&program.0) else {
            return;
        };
        let bytes = value.to_bytes();
        if !program
            .reflection
            .uniforms
            .write(&mut program.uniform_data, name, &bytes)
        {
            log::trace!("Uniform '{}' not found in {:?}", name, program.label);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        match texture {
            Some(texture) => {
                self.bound_textures.insert(unit, texture.0);
            }
            None => {
                self.bound_textures.remove(&unit);
            }
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayHandle>) {
        self.bound_vertex_array = vertex_array.map(|v| v.0);
    }

    fn draw_indexed(&mut self, topology: PrimitiveTopology, index_count: u32) {
        let (Some(program_id), Some(vertex_array_id)) =
            (self.current_program, self.bound_vertex_array)
        else {
            log::warn!("draw_indexed without a program and vertex array bound");
            return;
        };
        let (Some(program), Some(vertex_array)) = (
            self.programs.get(&program_id),
            self.vertex_arrays.get(&vertex_array_id),
        ) else {
            return;
        };

        self.pending_draws.push(RecordedDraw {
            program: program_id,
            vertex_array: vertex_array_id,
            key: PipelineKey {
                attributes: vertex_array.attributes.clone(),
                topology,
            },
            index_count,
            uniforms: program.uniform_data.clone(),
            textures: self.bound_textures.clone(),
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buf) = self.buffers.remove(&buffer.0) {
            buf.destroy();
        }
    }

    fn destroy_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(tex) = self.textures.remove(&texture.0) {
            tex.texture.destroy();
        }
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program.0);
        if self.current_program == Some(program.0) {
            self.current_program = None;
        }
    }
}
