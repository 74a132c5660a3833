//! A minimal display tree that drives a [`Painter`] the way a scene graph would: every node is
//! bracketed by `push_state`/`pop_state`, and unchanged subtrees are replayed from last frame's
//! batches.

use quilt::geom::{rect, Matrix2D};
use quilt::{
    BatchToken, BlendMode, CacheInvalidator, Color, FrameStats, GpuBackend, Mask, Mesh, NodeId,
    Painter, PainterError,
};

pub const CANVAS_WIDTH: u32 = 256;
pub const CANVAS_HEIGHT: u32 = 256;

#[derive(Debug, Clone, Copy)]
struct CachedRange {
    start: BatchToken,
    end: BatchToken,
    frame_id: u32,
}

struct Node {
    id: NodeId,
    parent: Option<usize>,
    children: Vec<usize>,
    mesh: Option<Mesh>,
    mask: Option<Mesh>,
    transform: Matrix2D,
    alpha: f32,
    blend_mode: BlendMode,
    self_changed: bool,
    child_changed: bool,
    cache: Option<CachedRange>,
}

#[derive(Default)]
pub struct Scene {
    nodes: Vec<Node>,
    roots: Vec<usize>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, parent: Option<NodeId>, mesh: Option<Mesh>) -> NodeId {
        let index = self.nodes.len();
        let id = NodeId(index as u64);
        let parent = parent.map(|parent| parent.0 as usize);

        self.nodes.push(Node {
            id,
            parent,
            children: Vec::new(),
            mesh,
            mask: None,
            transform: Matrix2D::identity(),
            alpha: 1.0,
            blend_mode: BlendMode::Auto,
            self_changed: true,
            child_changed: false,
            cache: None,
        });

        match parent {
            Some(parent) => {
                self.nodes[parent].children.push(index);
                self.mark_ancestors(parent);
            }
            None => self.roots.push(index),
        }
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn set_transform(&mut self, node: NodeId, transform: Matrix2D) {
        self.node_mut(node).transform = transform;
        self.set_requires_redraw(node);
    }

    pub fn set_alpha(&mut self, node: NodeId, alpha: f32) {
        self.node_mut(node).alpha = alpha;
        self.set_requires_redraw(node);
    }

    pub fn set_blend_mode(&mut self, node: NodeId, blend_mode: BlendMode) {
        self.node_mut(node).blend_mode = blend_mode;
        self.set_requires_redraw(node);
    }

    pub fn set_color(&mut self, node: NodeId, color: Color) {
        if let Some(mesh) = self.node_mut(node).mesh.as_mut() {
            mesh.set_color(color);
        }
        self.set_requires_redraw(node);
    }

    /// A rectangular mask in the node's own coordinates.
    pub fn set_mask(&mut self, node: NodeId, mask: Option<Mesh>) {
        self.node_mut(node).mask = mask;
        self.set_requires_redraw(node);
    }

    /// Forces `node` to be drawn again next frame, along with its whole subtree.
    pub fn set_requires_redraw(&mut self, node: NodeId) {
        let index = node.0 as usize;
        self.nodes[index].self_changed = true;
        if let Some(parent) = self.nodes[index].parent {
            self.mark_ancestors(parent);
        }
    }

    pub fn render<B: GpuBackend>(&mut self, painter: &mut Painter<B>) -> Result<(), PainterError> {
        for root in self.roots.clone() {
            self.render_node(root, painter, false)?;
        }
        Ok(())
    }

    fn render_node<B: GpuBackend>(
        &mut self,
        index: usize,
        painter: &mut Painter<B>,
        parent_changed: bool,
    ) -> Result<(), PainterError> {
        let frame_id = painter.frame_id();
        let node = &self.nodes[index];
        let changed = parent_changed || node.self_changed;
        let replay = match node.cache {
            Some(cache) if painter.cache_enabled() && !changed && !node.child_changed => {
                (cache.frame_id == frame_id.wrapping_sub(1)).then_some(cache)
            }
            _ => None,
        };

        let mut start = BatchToken::default();
        let mut end = BatchToken::default();
        painter.push_state(Some(&mut start));
        painter.set_state_to(Some(&node.transform), node.alpha, node.blend_mode);

        if let Some(cache) = replay {
            painter.draw_from_cache(&cache.start, &cache.end);
        } else {
            let node = &self.nodes[index];
            let masked = match &node.mask {
                Some(mask) => {
                    painter.draw_mask(&Mask::new(mask), Some(node.id))?;
                    true
                }
                None => false,
            };
            if let Some(mesh) = &node.mesh {
                painter.batch_mesh(mesh, None);
            }

            for child in self.nodes[index].children.clone() {
                self.render_node(child, painter, changed)?;
            }

            if masked {
                painter.erase_mask();
            }
        }

        painter.pop_state(Some(&mut end));

        let cache_enabled = painter.cache_enabled();
        let node = &mut self.nodes[index];
        node.cache = cache_enabled.then_some(CachedRange {
            start,
            end,
            frame_id,
        });
        node.self_changed = false;
        node.child_changed = false;
        Ok(())
    }

    fn node_mut(&mut self, node: NodeId) -> &mut Node {
        &mut self.nodes[node.0 as usize]
    }

    fn mark_ancestors(&mut self, mut index: usize) {
        loop {
            let node = &mut self.nodes[index];
            node.child_changed = true;
            match node.parent {
                Some(parent) => index = parent,
                None => break,
            }
        }
    }
}

impl CacheInvalidator for Scene {
    fn exclude_from_cache(&mut self, node: NodeId) {
        tracing::trace!("{node} excluded from cache");
        self.set_requires_redraw(node);
    }
}

/// Adds a `columns` x `rows` grid of `cell`-sized quads under `parent`, `gap` apart.
pub fn quad_grid(
    scene: &mut Scene,
    parent: Option<NodeId>,
    columns: u32,
    rows: u32,
    cell: f32,
    gap: f32,
    color: Color,
) -> Vec<NodeId> {
    let mut nodes = Vec::with_capacity((columns * rows) as usize);
    for row in 0..rows {
        for column in 0..columns {
            let node = scene.add_node(parent, Some(Mesh::quad(rect(0.0, 0.0, cell, cell), color)));
            scene.set_transform(
                node,
                Matrix2D::translation(column as f32 * (cell + gap), row as f32 * (cell + gap)),
            );
            nodes.push(node);
        }
    }
    nodes
}

/// Runs one whole frame: clear, traverse, hand exclusions back to the scene, present.
/// Returns the counters of the frame.
pub fn render_frame<B: GpuBackend>(
    scene: &mut Scene,
    painter: &mut Painter<B>,
    clear_color: Color,
) -> Result<FrameStats, PainterError> {
    painter.next_frame();
    painter.clear(clear_color, 1.0);
    scene.render(painter)?;
    painter.finish_frame(scene);
    painter.present()?;
    Ok(*painter.frame_stats())
}
