use lyon::path::builder::BorderRadii;
use lyon::path::{Path, Winding};
use lyon::tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, FillVertexConstructor, VertexBuffers,
};

use crate::blend::BlendMode;
use crate::color::Color;
use crate::error::MeshError;
use crate::geom::{Point, Rect};
use crate::id::TextureId;
use crate::style::{MeshStyle, SamplerState, StyleType};
use crate::vertex::Vertex;

/// Anything that can be copied into a batch: plain meshes and finished batches alike.
pub trait MeshSource {
    fn vertices(&self) -> &[Vertex];
    fn indices(&self) -> &[u16];
    fn style(&self) -> &MeshStyle;
    /// The blend mode used when no render state is supplied.
    fn blend_mode(&self) -> BlendMode;

    fn num_vertices(&self) -> usize {
        self.vertices().len()
    }

    fn num_indices(&self) -> usize {
        self.indices().len()
    }
}

/// A contiguous range of vertices and indices within a mesh.
///
/// `None` counts mean "from the id to the end of the mesh".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshSubset {
    pub vertex_id: usize,
    pub num_vertices: Option<usize>,
    pub index_id: usize,
    pub num_indices: Option<usize>,
}

impl MeshSubset {
    /// The whole mesh.
    pub const ALL: MeshSubset = MeshSubset {
        vertex_id: 0,
        num_vertices: None,
        index_id: 0,
        num_indices: None,
    };

    pub fn new(vertex_id: usize, num_vertices: usize, index_id: usize, num_indices: usize) -> Self {
        Self {
            vertex_id,
            num_vertices: Some(num_vertices),
            index_id,
            num_indices: Some(num_indices),
        }
    }

    /// Replaces open-ended counts with the remainder of a mesh of the given size.
    pub fn resolve(self, total_vertices: usize, total_indices: usize) -> Self {
        Self {
            num_vertices: Some(
                self.num_vertices
                    .unwrap_or_else(|| total_vertices.saturating_sub(self.vertex_id)),
            ),
            num_indices: Some(
                self.num_indices
                    .unwrap_or_else(|| total_indices.saturating_sub(self.index_id)),
            ),
            ..self
        }
    }

    /// Vertex count of a resolved subset.
    pub fn vertex_count(&self) -> usize {
        self.num_vertices.unwrap_or(0)
    }

    pub fn index_count(&self) -> usize {
        self.num_indices.unwrap_or(0)
    }
}

/// Triangle-list geometry with a style and its own blend mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u16>,
    style: MeshStyle,
    blend_mode: BlendMode,
}

impl Mesh {
    /// Creates a mesh, rejecting indices that point past the vertex data.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u16>, style: MeshStyle) -> Result<Self, MeshError> {
        if vertices.len() > u16::MAX as usize {
            return Err(MeshError::TooManyVertices(vertices.len()));
        }

        if let Some(&index) = indices.iter().find(|&&index| index as usize >= vertices.len()) {
            return Err(MeshError::IndexOutOfRange {
                index,
                num_vertices: vertices.len(),
            });
        }

        Ok(Self {
            vertices,
            indices,
            style,
            blend_mode: BlendMode::Normal,
        })
    }

    /// An untextured rectangle of the given color.
    pub fn quad(rect: Rect, color: Color) -> Self {
        Self::quad_with_style(rect, color, MeshStyle::untextured(StyleType::BASIC))
    }

    /// A rectangle showing the whole texture, tinted by `color`.
    pub fn textured_quad(rect: Rect, texture: TextureId, sampler: SamplerState, color: Color) -> Self {
        Self::quad_with_style(
            rect,
            color,
            MeshStyle::textured(StyleType::BASIC, texture, sampler),
        )
    }

    fn quad_with_style(rect: Rect, color: Color, style: MeshStyle) -> Self {
        let vertices = vec![
            Vertex::new(rect.min.x, rect.min.y, 0.0, 0.0, color),
            Vertex::new(rect.max.x, rect.min.y, 1.0, 0.0, color),
            Vertex::new(rect.min.x, rect.max.y, 0.0, 1.0, color),
            Vertex::new(rect.max.x, rect.max.y, 1.0, 1.0, color),
        ];

        Self {
            vertices,
            indices: vec![0, 1, 2, 1, 3, 2],
            style,
            blend_mode: BlendMode::Normal,
        }
    }

    /// Tessellates the interior of `path` into an untextured mesh.
    pub fn fill_path(path: &Path, color: Color) -> Result<Self, MeshError> {
        let mut buffers: VertexBuffers<Vertex, u16> = VertexBuffers::new();
        let mut tessellator = FillTessellator::new();

        tessellator.tessellate_path(
            path,
            &FillOptions::default(),
            &mut BuffersBuilder::new(&mut buffers, VertexConverter::new(color)),
        )?;

        Ok(Self {
            vertices: buffers.vertices,
            indices: buffers.indices,
            style: MeshStyle::untextured(StyleType::BASIC),
            blend_mode: BlendMode::Normal,
        })
    }

    pub fn fill_rounded_rect(rect: Rect, radius: f32, color: Color) -> Result<Self, MeshError> {
        let mut path_builder = Path::builder();
        path_builder.add_rounded_rectangle(&rect, &BorderRadii::new(radius), Winding::Positive);
        Self::fill_path(&path_builder.build(), color)
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }

    pub fn with_style(mut self, style: MeshStyle) -> Self {
        self.style = style;
        self
    }

    pub fn set_color(&mut self, color: Color) {
        let premultiplied = color.premultiplied();
        for vertex in &mut self.vertices {
            vertex.color = premultiplied;
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_points(
            self.vertices
                .iter()
                .map(|vertex| Point::new(vertex.position[0], vertex.position[1])),
        )
    }

    /// Returns the rect covered by this mesh if it is a single axis-aligned quad.
    pub fn as_axis_aligned_rect(&self) -> Option<Rect> {
        if self.vertices.len() != 4 {
            return None;
        }

        let bounds = self.bounds();
        if bounds.is_empty() {
            return None;
        }

        let mut corners_seen = [false; 4];
        for vertex in &self.vertices {
            let [x, y] = vertex.position;
            let column = if x == bounds.min.x {
                0
            } else if x == bounds.max.x {
                1
            } else {
                return None;
            };
            let row = if y == bounds.min.y {
                0
            } else if y == bounds.max.y {
                1
            } else {
                return None;
            };
            corners_seen[row * 2 + column] = true;
        }

        corners_seen.iter().all(|seen| *seen).then_some(bounds)
    }
}

impl MeshSource for Mesh {
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

struct VertexConverter {
    color: [f32; 4],
}

impl VertexConverter {
    fn new(color: Color) -> Self {
        Self {
            color: color.premultiplied(),
        }
    }
}

impl FillVertexConstructor<Vertex> for VertexConverter {
    fn new_vertex(&mut self, vertex: FillVertex) -> Vertex {
        Vertex {
            position: vertex.position().to_array(),
            tex_coords: [0.0, 0.0],
            color: self.color,
        }
    }
}
