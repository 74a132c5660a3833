//! A [`GpuBackend`] on top of `wgpu`.
//!
//! Draws are encoded as they arrive, one render pass each, and submitted when a buffer that a
//! pending draw reads is overwritten or when the frame is presented.

use std::num::NonZeroUsize;

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use bytemuck::{Pod, Zeroable};
use lru::LruCache;
use wgpu::util::DeviceExt;
use wgpu::{CompositeAlphaMode, InstanceDescriptor, SurfaceTarget};

use super::{BufferKind, BufferUsage, DrawCall, GpuBackend, ProgramKey, ScissorRect};
use crate::blend::BlendMode;
use crate::color::Color;
use crate::error::BackendError;
use crate::id::{BufferHandle, ProgramHandle, TextureId};
use crate::render_state::RenderTargetOptions;
use crate::style::{SamplerState, StyleType, TextureSmoothing};

const DEFAULT_PIPELINE_CACHE_SIZE: usize = 32;
const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WgpuBackendConfig {
    pub vsync: bool,
    /// Requests a surface that composites with what is behind the window.
    pub transparent: bool,
    /// Number of render pipelines kept around. Least recently used ones are dropped.
    pub pipeline_cache_size: usize,
}

impl Default for WgpuBackendConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            transparent: false,
            pipeline_cache_size: DEFAULT_PIPELINE_CACHE_SIZE,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct DrawUniforms {
    mvp: [f32; 16],
    alpha: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramKey,
    blend_mode: BlendMode,
    format: wgpu::TextureFormat,
}

struct UniformSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    renderable: bool,
}

enum BackBuffer<'w> {
    Surface {
        surface: wgpu::Surface<'w>,
        config: wgpu::SurfaceConfiguration,
        frame: Option<wgpu::SurfaceTexture>,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

pub struct WgpuBackend<'w> {
    device: wgpu::Device,
    queue: wgpu::Queue,
    back_buffer: BackBuffer<'w>,
    back_buffer_size: (u32, u32),
    back_buffer_format: wgpu::TextureFormat,
    surface_error: Option<wgpu::SurfaceError>,

    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    basic_shader: wgpu::ShaderModule,
    style_shaders: HashMap<StyleType, wgpu::ShaderModule>,
    programs: HashMap<ProgramKey, ProgramHandle>,
    program_keys: HashMap<ProgramHandle, ProgramKey>,
    pipelines: LruCache<PipelineKey, wgpu::RenderPipeline>,

    buffers: HashMap<BufferHandle, wgpu::Buffer>,
    textures: HashMap<TextureId, TextureEntry>,
    samplers: HashMap<SamplerState, wgpu::Sampler>,
    texture_bind_groups: HashMap<(TextureId, SamplerState), wgpu::BindGroup>,
    white_bind_group: wgpu::BindGroup,
    next_handle: u64,

    encoder: Option<wgpu::CommandEncoder>,
    pending_buffers: HashSet<BufferHandle>,
    uniform_slots: Vec<UniformSlot>,
    next_uniform_slot: usize,

    blend_mode: BlendMode,
    bound_target: Option<TextureId>,
    scissor: Option<ScissorRect>,
    sampler_states: HashMap<TextureId, SamplerState>,
}

impl<'w> WgpuBackend<'w> {
    pub async fn new(
        window: impl Into<SurfaceTarget<'w>>,
        physical_size: (u32, u32),
        config: WgpuBackendConfig,
    ) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: physical_size.0.max(1),
            height: physical_size.1.max(1),
            present_mode: if config.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            desired_maximum_frame_latency: 2,
            alpha_mode: select_alpha_mode(&surface_caps.alpha_modes, config.transparent),
            view_formats: vec![],
        };
        surface.configure(&device, &surface_config);

        let back_buffer = BackBuffer::Surface {
            surface,
            config: surface_config,
            frame: None,
        };
        Ok(Self::build_from_device(
            device,
            queue,
            back_buffer,
            physical_size,
            format,
            config,
        ))
    }

    /// Creates a backend that renders into an offscreen texture. Read it with
    /// [`read_back_buffer`](Self::read_back_buffer).
    pub async fn new_headless(
        physical_size: (u32, u32),
        config: WgpuBackendConfig,
    ) -> Result<Self, BackendError> {
        let instance = wgpu::Instance::new(&InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = request_device(&adapter).await?;

        let (texture, view) = create_offscreen_texture(&device, physical_size);
        let back_buffer = BackBuffer::Offscreen { texture, view };
        Ok(Self::build_from_device(
            device,
            queue,
            back_buffer,
            physical_size,
            TEXTURE_FORMAT,
            config,
        ))
    }

    fn build_from_device(
        device: wgpu::Device,
        queue: wgpu::Queue,
        back_buffer: BackBuffer<'w>,
        physical_size: (u32, u32),
        back_buffer_format: wgpu::TextureFormat,
        config: WgpuBackendConfig,
    ) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quilt_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quilt_texture_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quilt_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let basic_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quilt_basic_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./shader.wgsl").into()),
        });
        let white_bind_group = create_white_bind_group(&device, &queue, &texture_layout);
        let cache_size = NonZeroUsize::new(config.pipeline_cache_size)
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            device,
            queue,
            back_buffer,
            back_buffer_size: physical_size,
            back_buffer_format,
            surface_error: None,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            basic_shader,
            style_shaders: HashMap::new(),
            programs: HashMap::new(),
            program_keys: HashMap::new(),
            pipelines: LruCache::new(cache_size),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            samplers: HashMap::new(),
            texture_bind_groups: HashMap::new(),
            white_bind_group,
            next_handle: 1,
            encoder: None,
            pending_buffers: HashSet::new(),
            uniform_slots: Vec::new(),
            next_uniform_slot: 0,
            blend_mode: BlendMode::Normal,
            bound_target: None,
            scissor: None,
            sampler_states: HashMap::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Registers WGSL source for a custom style type. It must provide the entry points and
    /// bindings of the built-in shader: `vs_main`, `fs_colored` and `fs_textured`.
    pub fn register_style_shader(&mut self, style_type: StyleType, wgsl: &str) {
        let label = format!("quilt_style{}_shader", style_type.0);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(wgsl.into()),
        });
        self.style_shaders.insert(style_type, module);
        self.pipelines.clear();
    }

    /// Creates an empty RGBA texture with premultiplied contents. Render targets can be bound
    /// with [`bind_framebuffer`](GpuBackend::bind_framebuffer).
    pub fn create_texture(&mut self, width: u32, height: u32, render_target: bool) -> TextureId {
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if render_target {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("quilt_texture"),
            size: extent(width, height),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let id = TextureId(self.next_handle());
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                view,
                renderable: render_target,
            },
        );
        id
    }

    /// Replaces the contents of `texture` with tightly packed RGBA rows.
    pub fn write_texture(&mut self, texture: TextureId, rgba: &[u8]) -> Result<(), BackendError> {
        let entry = self
            .textures
            .get(&texture)
            .ok_or(BackendError::UnknownTexture(texture))?;
        let size = entry.texture.size();

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );
        Ok(())
    }

    pub fn dispose_texture(&mut self, texture: TextureId) {
        if self.textures.remove(&texture).is_some() {
            self.texture_bind_groups.retain(|(id, _), _| *id != texture);
            self.sampler_states.remove(&texture);
            if self.bound_target == Some(texture) {
                self.bound_target = None;
            }
        }
    }

    /// Submits pending work and copies the offscreen back buffer into tightly packed RGBA rows.
    /// Returns nothing for surface-backed instances.
    pub fn read_back_buffer(&mut self) -> Option<Vec<u8>> {
        self.submit();

        let BackBuffer::Offscreen { texture, .. } = &self.back_buffer else {
            return None;
        };
        let (width, height) = self.back_buffer_size;
        let unpadded_bytes_per_row = width * 4;
        let alignment = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(alignment) * alignment;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("quilt_readback_buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quilt_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            extent(width, height),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            if sender.send(result).is_err() {
                tracing::warn!("readback receiver dropped before the buffer was mapped");
            }
        });
        let _ = self.device.poll(wgpu::MaintainBase::Wait);

        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!("failed to map readback buffer: {error:?}");
                return None;
            }
            Err(error) => {
                tracing::warn!("failed to receive readback result: {error}");
                return None;
            }
        }

        let mapped = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in mapped.chunks_exact(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Some(pixels)
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        self.pending_buffers.clear();
        self.next_uniform_slot = 0;
    }

    /// The view and format draws currently go to. `None` if the surface could not be acquired.
    fn target_view(&mut self) -> Option<(wgpu::TextureView, wgpu::TextureFormat)> {
        if let Some(texture) = self.bound_target {
            if let Some(entry) = self.textures.get(&texture) {
                return Some((entry.view.clone(), TEXTURE_FORMAT));
            }
        }

        match &mut self.back_buffer {
            BackBuffer::Offscreen { view, .. } => Some((view.clone(), self.back_buffer_format)),
            BackBuffer::Surface { surface, frame, .. } => {
                if frame.is_none() && self.surface_error.is_none() {
                    match surface.get_current_texture() {
                        Ok(acquired) => *frame = Some(acquired),
                        Err(error) => {
                            tracing::warn!("failed to acquire surface texture: {error}");
                            self.surface_error = Some(error);
                        }
                    }
                }
                frame.as_ref().map(|frame| {
                    let view = frame
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    (view, self.back_buffer_format)
                })
            }
        }
    }

    fn pipeline(
        &mut self,
        key: PipelineKey,
        vertex_format: &wgpu::VertexBufferLayout<'_>,
    ) -> wgpu::RenderPipeline {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return pipeline.clone();
        }

        let shader = self
            .style_shaders
            .get(&key.program.style_type)
            .unwrap_or(&self.basic_shader);

        let label = format!("quilt_{}_{}", key.program.name(), key.blend_mode);
        let fragment_entry = if key.program.textured {
            "fs_textured"
        } else {
            "fs_colored"
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: std::slice::from_ref(vertex_format),
                },
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some(fragment_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend: Some(key.blend_mode.to_wgpu()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        tracing::debug!("created pipeline {label}");
        self.pipelines.put(key, pipeline.clone());
        pipeline
    }

    fn uniform_bind_group(&mut self, call: &DrawCall<'_>) -> wgpu::BindGroup {
        if self.next_uniform_slot == self.uniform_slots.len() {
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("quilt_draw_uniforms"),
                    contents: bytemuck::bytes_of(&DrawUniforms::zeroed()),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("quilt_draw_uniforms"),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            self.uniform_slots.push(UniformSlot { buffer, bind_group });
        }

        let slot = &self.uniform_slots[self.next_uniform_slot];
        self.next_uniform_slot += 1;

        let uniforms = DrawUniforms {
            mvp: call.mvp,
            alpha: [call.alpha, 0.0, 0.0, 0.0],
        };
        self.queue
            .write_buffer(&slot.buffer, 0, bytemuck::bytes_of(&uniforms));
        slot.bind_group.clone()
    }

    fn texture_bind_group(&mut self, texture: TextureId) -> Option<wgpu::BindGroup> {
        let sampler_state = self
            .sampler_states
            .get(&texture)
            .copied()
            .unwrap_or_default();
        if let Some(bind_group) = self.texture_bind_groups.get(&(texture, sampler_state)) {
            return Some(bind_group.clone());
        }

        let entry = self.textures.get(&texture)?;
        let device = &self.device;
        let sampler = self
            .samplers
            .entry(sampler_state)
            .or_insert_with(|| create_sampler(device, sampler_state));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quilt_texture_bind_group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&entry.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        self.texture_bind_groups
            .insert((texture, sampler_state), bind_group.clone());
        Some(bind_group)
    }
}

impl GpuBackend for WgpuBackend<'_> {
    fn create_buffer(&mut self, kind: BufferKind, size: u64, usage: BufferUsage) -> BufferHandle {
        let (usages, label) = match kind {
            BufferKind::Vertex => (wgpu::BufferUsages::VERTEX, "quilt_vertex_buffer"),
            BufferKind::Index => (wgpu::BufferUsages::INDEX, "quilt_index_buffer"),
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: align_to_copy(size.max(wgpu::COPY_BUFFER_ALIGNMENT)),
            usage: usages | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let handle = BufferHandle(self.next_handle());
        tracing::trace!("created {kind:?} buffer {} of {size} bytes ({usage:?})", handle.0);
        self.buffers.insert(handle, buffer);
        handle
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        // Queue writes land before the next submission, so pending reads must go out first.
        if self.pending_buffers.contains(&buffer) {
            self.submit();
        }

        let Some(target) = self.buffers.get(&buffer) else {
            tracing::warn!("upload to unknown buffer {}", buffer.0);
            return;
        };

        if bytes.len() as u64 % wgpu::COPY_BUFFER_ALIGNMENT == 0 {
            self.queue.write_buffer(target, 0, bytes);
        } else {
            let mut padded = bytes.to_vec();
            padded.resize(align_to_copy(bytes.len() as u64) as usize, 0);
            self.queue.write_buffer(target, 0, &padded);
        }
    }

    fn dispose_buffer(&mut self, buffer: BufferHandle) {
        if self.pending_buffers.contains(&buffer) {
            self.submit();
        }
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn program(&mut self, key: &ProgramKey) -> ProgramHandle {
        if let Some(program) = self.programs.get(key) {
            return *program;
        }

        if key.style_type != StyleType::BASIC && !self.style_shaders.contains_key(&key.style_type) {
            tracing::warn!(
                "no shader registered for style type {}, using the basic one",
                key.style_type.0
            );
        }
        let program = ProgramHandle(self.next_handle());
        self.programs.insert(*key, program);
        self.program_keys.insert(program, *key);
        tracing::debug!("registered program {}", key.name());
        program
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let Some(program) = self.program_keys.get(&call.program).copied() else {
            tracing::warn!("draw with unknown program {}", call.program.0);
            return;
        };
        let (Some(vertex_buffer), Some(index_buffer)) = (
            self.buffers.get(&call.vertex_buffer).cloned(),
            self.buffers.get(&call.index_buffer).cloned(),
        ) else {
            tracing::warn!("draw references a disposed buffer");
            return;
        };
        let Some((view, format)) = self.target_view() else {
            return;
        };

        let texture_bind_group = match call.texture {
            Some(texture) => match self.texture_bind_group(texture) {
                Some(bind_group) => bind_group,
                None => {
                    tracing::warn!("draw samples unknown texture {texture}");
                    return;
                }
            },
            None => self.white_bind_group.clone(),
        };

        let pipeline = self.pipeline(
            PipelineKey {
                program,
                blend_mode: self.blend_mode,
                format,
            },
            &call.vertex_format,
        );
        let uniforms = self.uniform_bind_group(call);
        let scissor = self.scissor;

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quilt_frame_encoder"),
            })
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quilt_batch_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(rect) = scissor {
                pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
            }
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &uniforms, &[]);
            pass.set_bind_group(1, &texture_bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..call.index_count, 0, 0..1);
        }

        self.pending_buffers.insert(call.vertex_buffer);
        self.pending_buffers.insert(call.index_buffer);
    }

    fn set_sampler_state(&mut self, texture: TextureId, sampler: SamplerState) {
        self.sampler_states.insert(texture, sampler);
    }

    fn reset_sampler_state(&mut self, texture: TextureId) {
        self.sampler_states.remove(&texture);
    }

    fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        self.blend_mode = blend_mode;
    }

    fn bind_framebuffer(
        &mut self,
        target: Option<TextureId>,
        options: RenderTargetOptions,
    ) -> Result<(), BackendError> {
        if let Some(texture) = target {
            let entry = self
                .textures
                .get(&texture)
                .ok_or(BackendError::UnknownTexture(texture))?;
            if !entry.renderable {
                return Err(BackendError::FramebufferIncomplete {
                    target: texture,
                    reason: "texture was not created as a render target".to_string(),
                });
            }
        }

        if options.antialiasing() > 0 || options.depth_and_stencil() {
            tracing::trace!("render target options {options:?} are not used by this backend");
        }
        self.bound_target = target;
        Ok(())
    }

    fn set_scissor_rect(&mut self, rect: Option<ScissorRect>) {
        self.scissor = rect;
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).map(|entry| {
            let size = entry.texture.size();
            (size.width, size.height)
        })
    }

    fn configure_back_buffer(&mut self, width: u32, height: u32) {
        self.submit();
        let (width, height) = (width.max(1), height.max(1));
        self.back_buffer_size = (width, height);

        match &mut self.back_buffer {
            BackBuffer::Surface {
                surface,
                config,
                frame,
            } => {
                *frame = None;
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            BackBuffer::Offscreen { texture, view } => {
                let (new_texture, new_view) = create_offscreen_texture(&self.device, (width, height));
                *texture = new_texture;
                *view = new_view;
            }
        }
        self.surface_error = None;
    }

    fn clear(&mut self, color: Color, alpha: f32) {
        let Some((view, _)) = self.target_view() else {
            return;
        };

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("quilt_frame_encoder"),
            })
        });
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("quilt_clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color.to_wgpu(alpha)),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    fn present(&mut self) -> Result<(), BackendError> {
        if self.bound_target.is_none() {
            // Acquires the surface texture even when nothing was drawn this frame.
            let _ = self.target_view();
        }
        self.submit();

        if let BackBuffer::Surface { frame, .. } = &mut self.back_buffer {
            if let Some(frame) = frame.take() {
                frame.present();
            }
        }

        match self.surface_error.take() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue), BackendError> {
    let device = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("quilt_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        })
        .await?;
    Ok(device)
}

fn select_alpha_mode(available: &[CompositeAlphaMode], transparent: bool) -> CompositeAlphaMode {
    if !transparent {
        return CompositeAlphaMode::Opaque;
    }

    for mode in [CompositeAlphaMode::PreMultiplied, CompositeAlphaMode::PostMultiplied] {
        if available.contains(&mode) {
            tracing::info!("using {mode:?} alpha mode for transparency");
            return mode;
        }
    }
    tracing::warn!("transparency requested but no suitable alpha mode is available, using opaque");
    CompositeAlphaMode::Opaque
}

fn create_offscreen_texture(
    device: &wgpu::Device,
    (width, height): (u32, u32),
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("quilt_offscreen_back_buffer"),
        size: extent(width.max(1), height.max(1)),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_white_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::BindGroup {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("quilt_white_texture"),
            size: extent(1, 1),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &[255, 255, 255, 255],
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = create_sampler(device, SamplerState::default());

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("quilt_white_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    })
}

fn create_sampler(device: &wgpu::Device, state: SamplerState) -> wgpu::Sampler {
    let address_mode = if state.repeat {
        wgpu::AddressMode::Repeat
    } else {
        wgpu::AddressMode::ClampToEdge
    };
    let (filter, mipmap_filter) = match state.smoothing {
        TextureSmoothing::None => (wgpu::FilterMode::Nearest, wgpu::FilterMode::Nearest),
        TextureSmoothing::Bilinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Nearest),
        TextureSmoothing::Trilinear => (wgpu::FilterMode::Linear, wgpu::FilterMode::Linear),
    };

    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("quilt_sampler"),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter,
        ..Default::default()
    })
}

fn extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn align_to_copy(size: u64) -> u64 {
    size.div_ceil(wgpu::COPY_BUFFER_ALIGNMENT) * wgpu::COPY_BUFFER_ALIGNMENT
}
