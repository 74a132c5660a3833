//! A headless backend that records every command it receives.

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};

use super::{BufferKind, BufferUsage, DrawCall, GpuBackend, ProgramKey, ScissorRect};
use crate::blend::BlendMode;
use crate::color::Color;
use crate::error::BackendError;
use crate::id::{BufferHandle, ProgramHandle, TextureId};
use crate::render_state::RenderTargetOptions;
use crate::style::SamplerState;
use crate::vertex::Vertex;

/// A draw as the GPU would have seen it, with the referenced geometry decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: ProgramHandle,
    pub texture: Option<TextureId>,
    pub mvp: [f32; 16],
    pub alpha: f32,
    pub vertex_stride: u64,
    pub indices: Vec<u16>,
    /// Vertices up to the highest referenced index.
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCommand {
    CreateBuffer {
        buffer: BufferHandle,
        kind: BufferKind,
        size: u64,
        usage: BufferUsage,
    },
    UploadBuffer {
        buffer: BufferHandle,
        len: usize,
    },
    DisposeBuffer(BufferHandle),
    CompileProgram {
        key: ProgramKey,
        program: ProgramHandle,
    },
    Draw(RecordedDraw),
    SetSamplerState {
        texture: TextureId,
        sampler: SamplerState,
    },
    ResetSamplerState(TextureId),
    SetBlendMode(BlendMode),
    BindFramebuffer {
        target: Option<TextureId>,
        options: RenderTargetOptions,
    },
    SetScissorRect(Option<ScissorRect>),
    ConfigureBackBuffer {
        width: u32,
        height: u32,
    },
    Clear {
        color: Color,
        alpha: f32,
    },
    Present,
}

#[derive(Debug)]
pub struct RecordingBackend {
    commands: Vec<GpuCommand>,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    programs: HashMap<ProgramKey, ProgramHandle>,
    textures: HashMap<TextureId, (u32, u32)>,
    incomplete_targets: HashSet<TextureId>,
    back_buffer_size: (u32, u32),
    next_handle: u64,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            buffers: HashMap::new(),
            programs: HashMap::new(),
            textures: HashMap::new(),
            incomplete_targets: HashSet::new(),
            back_buffer_size: (0, 0),
            next_handle: 1,
        }
    }

    /// Makes a texture known, so it can be bound as a render target.
    pub fn register_texture(&mut self, texture: TextureId, width: u32, height: u32) {
        self.textures.insert(texture, (width, height));
    }

    /// Makes binding `texture` as a render target fail.
    pub fn mark_framebuffer_incomplete(&mut self, texture: TextureId) {
        self.incomplete_targets.insert(texture);
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<GpuCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn draws(&self) -> impl Iterator<Item = &RecordedDraw> + '_ {
        self.commands.iter().filter_map(|command| match command {
            GpuCommand::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    pub fn draw_count(&self) -> usize {
        self.draws().count()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn back_buffer_size(&self) -> (u32, u32) {
        self.back_buffer_size
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    fn buffer_contents<T: bytemuck::Pod>(&self, buffer: BufferHandle) -> Vec<T> {
        self.buffers
            .get(&buffer)
            .map(|bytes| {
                bytes
                    .chunks_exact(std::mem::size_of::<T>())
                    .map(bytemuck::pod_read_unaligned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl GpuBackend for RecordingBackend {
    fn create_buffer(&mut self, kind: BufferKind, size: u64, usage: BufferUsage) -> BufferHandle {
        let buffer = BufferHandle(self.next_handle());
        self.buffers.insert(buffer, vec![0; size as usize]);
        self.commands.push(GpuCommand::CreateBuffer {
            buffer,
            kind,
            size,
            usage,
        });
        buffer
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, bytes: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            if contents.len() < bytes.len() {
                contents.resize(bytes.len(), 0);
            }
            contents[..bytes.len()].copy_from_slice(bytes);
        }
        self.commands.push(GpuCommand::UploadBuffer {
            buffer,
            len: bytes.len(),
        });
    }

    fn dispose_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.commands.push(GpuCommand::DisposeBuffer(buffer));
    }

    fn program(&mut self, key: &ProgramKey) -> ProgramHandle {
        if let Some(program) = self.programs.get(key) {
            return *program;
        }

        let program = ProgramHandle(self.next_handle());
        self.programs.insert(*key, program);
        self.commands
            .push(GpuCommand::CompileProgram { key: *key, program });
        program
    }

    fn draw(&mut self, call: &DrawCall<'_>) {
        let mut indices: Vec<u16> = self.buffer_contents(call.index_buffer);
        indices.truncate(call.index_count as usize);

        let mut vertices: Vec<Vertex> = self.buffer_contents(call.vertex_buffer);
        let referenced = indices.iter().max().map_or(0, |&max| max as usize + 1);
        vertices.truncate(referenced);

        self.commands.push(GpuCommand::Draw(RecordedDraw {
            program: call.program,
            texture: call.texture,
            mvp: call.mvp,
            alpha: call.alpha,
            vertex_stride: call.vertex_format.array_stride,
            indices,
            vertices,
        }));
    }

    fn set_sampler_state(&mut self, texture: TextureId, sampler: SamplerState) {
        self.commands
            .push(GpuCommand::SetSamplerState { texture, sampler });
    }

    fn reset_sampler_state(&mut self, texture: TextureId) {
        self.commands.push(GpuCommand::ResetSamplerState(texture));
    }

    fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        self.commands.push(GpuCommand::SetBlendMode(blend_mode));
    }

    fn bind_framebuffer(
        &mut self,
        target: Option<TextureId>,
        options: RenderTargetOptions,
    ) -> Result<(), BackendError> {
        if let Some(texture) = target {
            if self.incomplete_targets.contains(&texture) {
                return Err(BackendError::FramebufferIncomplete {
                    target: texture,
                    reason: "marked incomplete".to_string(),
                });
            }
            if !self.textures.contains_key(&texture) {
                return Err(BackendError::UnknownTexture(texture));
            }
        }

        self.commands
            .push(GpuCommand::BindFramebuffer { target, options });
        Ok(())
    }

    fn set_scissor_rect(&mut self, rect: Option<ScissorRect>) {
        self.commands.push(GpuCommand::SetScissorRect(rect));
    }

    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(&texture).copied()
    }

    fn configure_back_buffer(&mut self, width: u32, height: u32) {
        self.back_buffer_size = (width, height);
        self.commands
            .push(GpuCommand::ConfigureBackBuffer { width, height });
    }

    fn clear(&mut self, color: Color, alpha: f32) {
        self.commands.push(GpuCommand::Clear { color, alpha });
    }

    fn present(&mut self) -> Result<(), BackendError> {
        self.commands.push(GpuCommand::Present);
        Ok(())
    }
}
