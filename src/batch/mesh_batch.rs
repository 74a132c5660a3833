use std::fmt;

use crate::backend::{BufferKind, BufferUsage, DrawCall, GpuBackend, PrimitiveType};
use crate::blend::BlendMode;
use crate::geom::{Matrix2D, Matrix3D};
use crate::id::BufferHandle;
use crate::mesh::{MeshSource, MeshSubset};
use crate::style::{MeshStyle, StyleType};
use crate::vertex::Vertex;

/// The largest vertex count a batch may hold, bounded by 16-bit indices.
pub const MAX_NUM_VERTICES: usize = 65535;

/// Identity of a batch, assigned by the pool that created it. Unique within that pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct GpuBuffer {
    handle: BufferHandle,
    size: u64,
}

#[derive(Debug, Clone, Copy)]
struct BufferSizingDecision {
    should_reallocate: bool,
}

fn decide_buffer_sizing(existing_size: Option<u64>, required_size: usize) -> BufferSizingDecision {
    let required_size = required_size as u64;
    let should_reallocate = existing_size
        .map(|size| size < required_size)
        .unwrap_or(true);

    BufferSizingDecision { should_reallocate }
}

/// Merged geometry of several meshes, drawable with a single call.
#[derive(Debug)]
pub struct MeshBatch {
    id: BatchId,
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    style: MeshStyle,
    blend_mode: BlendMode,
    vertex_buffer: Option<GpuBuffer>,
    index_buffer: Option<GpuBuffer>,
    vertex_sync_required: bool,
    index_sync_required: bool,
}

impl MeshBatch {
    pub(crate) fn new(id: BatchId, style_type: StyleType) -> Self {
        Self {
            id,
            vertices: Vec::new(),
            indices: Vec::new(),
            style: MeshStyle::untextured(style_type),
            blend_mode: BlendMode::Normal,
            vertex_buffer: None,
            index_buffer: None,
            vertex_sync_required: false,
            index_sync_required: false,
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        self.blend_mode = blend_mode;
    }

    /// True if `num_vertices` vertices of `mesh`, drawn with `blend_mode`, can join this batch.
    pub fn can_add_mesh<M>(&self, mesh: &M, num_vertices: usize, blend_mode: BlendMode) -> bool
    where
        M: MeshSource + ?Sized,
    {
        if self.is_empty() {
            return true;
        }

        if self.vertices.len() + num_vertices > MAX_NUM_VERTICES {
            return false;
        }

        self.style.can_batch_with(mesh.style()) && self.blend_mode == blend_mode
    }

    /// Appends `subset` of `mesh`. An empty batch adopts the style of the mesh.
    ///
    /// `subset` must be resolved. Positions are transformed by `matrix` unless
    /// `ignore_transformations` is set, and colors are scaled by `alpha`.
    pub fn add_mesh<M>(
        &mut self,
        mesh: &M,
        matrix: &Matrix2D,
        alpha: f32,
        subset: MeshSubset,
        ignore_transformations: bool,
    ) where
        M: MeshSource + ?Sized,
    {
        if self.is_empty() {
            self.style = *mesh.style();
        }

        let num_vertices = subset.vertex_count();
        let num_indices = subset.index_count();
        let source_vertices = &mesh.vertices()[subset.vertex_id..subset.vertex_id + num_vertices];
        let source_indices = &mesh.indices()[subset.index_id..subset.index_id + num_indices];

        let index_offset = self.vertices.len() as i64 - subset.vertex_id as i64;

        self.vertices.extend(source_vertices.iter().map(|vertex| {
            let mut vertex = if ignore_transformations {
                *vertex
            } else {
                vertex.transformed(matrix)
            };
            if alpha != 1.0 {
                vertex.scale_alpha(alpha);
            }
            vertex
        }));
        self.indices.extend(
            source_indices
                .iter()
                .map(|&index| (index as i64 + index_offset) as u16),
        );

        self.vertex_sync_required = true;
        self.index_sync_required = true;
    }

    /// Drops data past the given counts.
    pub fn truncate(&mut self, num_vertices: usize, num_indices: usize) {
        self.vertices.truncate(num_vertices);
        self.indices.truncate(num_indices);
        self.vertex_sync_required = true;
        self.index_sync_required = true;
    }

    /// Empties the batch. GPU buffers are kept for reuse.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
        self.blend_mode = BlendMode::Normal;
        self.style.texture = None;
        self.vertex_sync_required = true;
        self.index_sync_required = true;
    }

    /// Uploads pending data and issues one indexed draw.
    pub fn render(&mut self, gpu: &mut dyn GpuBackend, mvp: &Matrix3D, alpha: f32) {
        if self.indices.is_empty() {
            return;
        }

        let (vertex_buffer, index_buffer) = self.sync_buffers(gpu);
        let program = gpu.program(&self.style.program_key());

        self.style.before_draw(gpu);
        gpu.draw(&DrawCall {
            primitive: PrimitiveType::TriangleList,
            program,
            vertex_buffer,
            index_buffer,
            vertex_format: self.style.vertex_format(),
            index_count: self.indices.len() as u32,
            texture: self.style.texture,
            mvp: mvp.to_array(),
            alpha,
        });
        self.style.after_draw(gpu);
    }

    fn sync_buffers(&mut self, gpu: &mut dyn GpuBackend) -> (BufferHandle, BufferHandle) {
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.vertices);
        let vertex_buffer = upsert_gpu_buffer(
            gpu,
            &mut self.vertex_buffer,
            BufferKind::Vertex,
            vertex_bytes,
            self.vertices.capacity() * Vertex::SIZE,
            self.vertex_sync_required,
        );
        self.vertex_sync_required = false;

        let index_bytes: &[u8] = bytemuck::cast_slice(&self.indices);
        let index_buffer = upsert_gpu_buffer(
            gpu,
            &mut self.index_buffer,
            BufferKind::Index,
            index_bytes,
            self.indices.capacity() * std::mem::size_of::<u16>(),
            self.index_sync_required,
        );
        self.index_sync_required = false;

        (vertex_buffer, index_buffer)
    }

    /// Releases the GPU buffers. The CPU-side data is kept.
    pub fn dispose(&mut self, gpu: &mut dyn GpuBackend) {
        for buffer in [self.vertex_buffer.take(), self.index_buffer.take()]
            .into_iter()
            .flatten()
        {
            gpu.dispose_buffer(buffer.handle);
        }
        self.vertex_sync_required = true;
        self.index_sync_required = true;
    }

    pub fn has_gpu_buffers(&self) -> bool {
        self.vertex_buffer.is_some() || self.index_buffer.is_some()
    }
}

fn upsert_gpu_buffer(
    gpu: &mut dyn GpuBackend,
    slot: &mut Option<GpuBuffer>,
    kind: BufferKind,
    bytes: &[u8],
    reserve_size: usize,
    sync_required: bool,
) -> BufferHandle {
    let decision = decide_buffer_sizing(slot.map(|buffer| buffer.size), bytes.len());

    let usage = match *slot {
        Some(buffer) if !decision.should_reallocate => {
            if sync_required {
                gpu.upload_buffer(buffer.handle, bytes);
            }
            return buffer.handle;
        }
        Some(buffer) => {
            gpu.dispose_buffer(buffer.handle);
            BufferUsage::Dynamic
        }
        None => BufferUsage::Static,
    };

    let size = reserve_size.max(bytes.len()) as u64;
    let handle = gpu.create_buffer(kind, size, usage);
    gpu.upload_buffer(handle, bytes);
    *slot = Some(GpuBuffer { handle, size });
    handle
}

impl MeshSource for MeshBatch {
    fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    fn indices(&self) -> &[u16] {
        &self.indices
    }

    fn style(&self) -> &MeshStyle {
        &self.style
    }

    fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuCommand, RecordingBackend};
    use crate::color::Color;
    use crate::geom::rect;
    use crate::id::TextureId;
    use crate::mesh::Mesh;
    use crate::style::SamplerState;

    fn quad(x: f32) -> Mesh {
        Mesh::quad(rect(x, 0.0, 10.0, 10.0), Color::WHITE)
    }

    #[test]
    fn decide_buffer_sizing_reallocates_when_missing() {
        let decision = decide_buffer_sizing(None, 128);
        assert!(decision.should_reallocate);
    }

    #[test]
    fn decide_buffer_sizing_reallocates_when_too_small() {
        let decision = decide_buffer_sizing(Some(64), 128);
        assert!(decision.should_reallocate);
    }

    #[test]
    fn decide_buffer_sizing_keeps_buffer_when_large_enough() {
        let decision = decide_buffer_sizing(Some(512), 128);
        assert!(!decision.should_reallocate);
    }

    #[test]
    fn add_mesh_offsets_indices_and_transforms_positions() {
        let mut batch = MeshBatch::new(BatchId(0), StyleType::BASIC);
        batch.add_mesh(&quad(0.0), &Matrix2D::identity(), 1.0, MeshSubset::ALL.resolve(4, 6), false);
        batch.add_mesh(
            &quad(0.0),
            &Matrix2D::translation(100.0, 0.0),
            1.0,
            MeshSubset::ALL.resolve(4, 6),
            false,
        );

        assert_eq!(batch.indices(), &[0, 1, 2, 1, 3, 2, 4, 5, 6, 5, 7, 6]);
        assert_eq!(batch.vertices()[4].position, [100.0, 0.0]);
    }

    #[test]
    fn add_mesh_rebases_partial_subsets() {
        let mut source = MeshBatch::new(BatchId(0), StyleType::BASIC);
        for x in [0.0, 20.0] {
            source.add_mesh(&quad(x), &Matrix2D::identity(), 1.0, MeshSubset::ALL.resolve(4, 6), false);
        }

        let mut target = MeshBatch::new(BatchId(1), StyleType::BASIC);
        target.add_mesh(&source, &Matrix2D::scale(9.0, 9.0), 1.0, MeshSubset::new(4, 4, 6, 6), true);

        assert_eq!(target.indices(), &[0, 1, 2, 1, 3, 2]);
        assert_eq!(target.vertices()[0].position, [20.0, 0.0]);
    }

    #[test]
    fn add_mesh_scales_premultiplied_colors_by_alpha() {
        let mut batch = MeshBatch::new(BatchId(0), StyleType::BASIC);
        batch.add_mesh(&quad(0.0), &Matrix2D::identity(), 0.5, MeshSubset::ALL.resolve(4, 6), false);
        assert_eq!(batch.vertices()[0].color, [0.5; 4]);
    }

    #[test]
    fn can_add_mesh_respects_capacity_style_and_blend() {
        let mut batch = MeshBatch::new(BatchId(0), StyleType::BASIC);
        let textured = Mesh::textured_quad(
            rect(0.0, 0.0, 1.0, 1.0),
            TextureId(1),
            SamplerState::default(),
            Color::WHITE,
        );
        assert!(batch.can_add_mesh(&textured, 4, BlendMode::Add));

        batch.add_mesh(&quad(0.0), &Matrix2D::identity(), 1.0, MeshSubset::ALL.resolve(4, 6), false);
        assert!(batch.can_add_mesh(&quad(0.0), 4, BlendMode::Normal));
        assert!(!batch.can_add_mesh(&quad(0.0), 4, BlendMode::Add));
        assert!(!batch.can_add_mesh(&textured, 4, BlendMode::Normal));
        assert!(!batch.can_add_mesh(&quad(0.0), MAX_NUM_VERTICES, BlendMode::Normal));
    }

    #[test]
    fn render_reuses_buffers_that_are_large_enough() {
        let mut gpu = RecordingBackend::new();
        let mut batch = MeshBatch::new(BatchId(0), StyleType::BASIC);
        batch.add_mesh(&quad(0.0), &Matrix2D::identity(), 1.0, MeshSubset::ALL.resolve(4, 6), false);
        batch.render(&mut gpu, &Matrix3D::identity(), 1.0);

        batch.truncate(0, 0);
        batch.add_mesh(&quad(5.0), &Matrix2D::identity(), 1.0, MeshSubset::ALL.resolve(4, 6), false);
        batch.render(&mut gpu, &Matrix3D::identity(), 1.0);

        let created = gpu
            .commands()
            .iter()
            .filter(|command| matches!(command, GpuCommand::CreateBuffer { .. }))
            .count();
        assert_eq!(created, 2);

        let last = gpu.draws().last().expect("two draws recorded");
        assert_eq!(last.vertices[0].position, [5.0, 0.0]);
    }

    fn created_buffer_usages(gpu: &RecordingBackend) -> Vec<(BufferKind, BufferUsage)> {
        gpu.commands()
            .iter()
            .filter_map(|command| match command {
                GpuCommand::CreateBuffer { kind, usage, .. } => Some((*kind, *usage)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn outgrown_buffers_are_recreated_as_dynamic() {
        let mut gpu = RecordingBackend::new();
        let mut batch = MeshBatch::new(BatchId(0), StyleType::BASIC);
        batch.add_mesh(&quad(0.0), &Matrix2D::identity(), 1.0, MeshSubset::ALL.resolve(4, 6), false);
        batch.render(&mut gpu, &Matrix3D::identity(), 1.0);
        assert_eq!(
            created_buffer_usages(&gpu),
            vec![
                (BufferKind::Vertex, BufferUsage::Static),
                (BufferKind::Index, BufferUsage::Static)
            ]
        );

        gpu.take_commands();
        for x in 1..64 {
            let subset = MeshSubset::ALL.resolve(4, 6);
            batch.add_mesh(&quad(x as f32), &Matrix2D::identity(), 1.0, subset, false);
        }
        batch.render(&mut gpu, &Matrix3D::identity(), 1.0);
        assert_eq!(
            created_buffer_usages(&gpu),
            vec![
                (BufferKind::Vertex, BufferUsage::Dynamic),
                (BufferKind::Index, BufferUsage::Dynamic)
            ]
        );
    }

    #[test]
    fn draws_use_the_style_vertex_format() {
        let mut gpu = RecordingBackend::new();
        let mut batch = MeshBatch::new(BatchId(0), StyleType::BASIC);
        batch.add_mesh(&quad(0.0), &Matrix2D::identity(), 1.0, MeshSubset::ALL.resolve(4, 6), false);
        batch.render(&mut gpu, &Matrix3D::identity(), 1.0);

        let draw = gpu.draws().next().expect("batch drawn");
        assert_eq!(draw.vertex_stride, batch.style().vertex_format().array_stride);
        assert_eq!(draw.vertex_stride, Vertex::SIZE as u64);
    }

    #[test]
    fn empty_batches_do_not_draw() {
        let mut gpu = RecordingBackend::new();
        let mut batch = MeshBatch::new(BatchId(0), StyleType::BASIC);
        batch.render(&mut gpu, &Matrix3D::identity(), 1.0);
        assert!(gpu.commands().is_empty());
    }

    #[test]
    fn dispose_releases_buffers() {
        let mut gpu = RecordingBackend::new();
        let mut batch = MeshBatch::new(BatchId(0), StyleType::BASIC);
        batch.add_mesh(&quad(0.0), &Matrix2D::identity(), 1.0, MeshSubset::ALL.resolve(4, 6), false);
        batch.render(&mut gpu, &Matrix3D::identity(), 1.0);
        assert!(batch.has_gpu_buffers());

        batch.dispose(&mut gpu);
        assert!(!batch.has_gpu_buffers());
        assert_eq!(gpu.live_buffer_count(), 0);
    }
}
