//! Frame-to-frame cache behavior, driven through a scene tree on the recording backend.
//!
//! Run with:   cargo test --test frame_cache

use quilt::geom::{rect, Matrix2D};
use quilt::{Color, Mesh, Painter, PainterConfig, RecordedDraw, RecordingBackend, Viewport};
use quilt_test_scenes::{quad_grid, render_frame, Scene, CANVAS_HEIGHT, CANVAS_WIDTH};

const CLEAR: Color = Color::TRANSPARENT;

fn painter(config: PainterConfig) -> Painter<RecordingBackend> {
    let mut painter = Painter::new(RecordingBackend::new(), config);
    painter.configure_back_buffer(Viewport::new(CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32));
    painter
}

fn grid_scene() -> (Scene, Vec<quilt::NodeId>) {
    let mut scene = Scene::new();
    let root = scene.add_node(None, None);
    let cells = quad_grid(&mut scene, Some(root), 3, 3, 20.0, 4.0, Color::rgb(200, 40, 40));
    (scene, cells)
}

fn frame_draws(painter: &mut Painter<RecordingBackend>) -> Vec<RecordedDraw> {
    let draws = painter.backend().draws().cloned().collect();
    painter.backend_mut().take_commands();
    draws
}

#[test]
fn static_scene_is_replayed_from_previous_frame() {
    let mut painter = painter(PainterConfig::default());
    let (mut scene, _) = grid_scene();

    let first = render_frame(&mut scene, &mut painter, CLEAR).expect("first frame renders");
    assert_eq!(first.meshes_batched, 9);
    assert_eq!(first.cache_replays, 0);
    let first_draws = frame_draws(&mut painter);

    let second = render_frame(&mut scene, &mut painter, CLEAR).expect("second frame renders");
    assert_eq!(second.meshes_batched, 0);
    assert_eq!(second.cache_replays, 1);
    assert_eq!(second.replayed_vertices, 36);
    let second_draws = frame_draws(&mut painter);

    assert_eq!(first_draws.len(), second_draws.len());
    for (before, after) in first_draws.iter().zip(&second_draws) {
        assert_eq!(before.vertices, after.vertices);
        assert_eq!(before.indices, after.indices);
    }
}

#[test]
fn moving_a_node_redraws_only_that_node() {
    let mut painter = painter(PainterConfig::default());
    let (mut scene, cells) = grid_scene();
    render_frame(&mut scene, &mut painter, CLEAR).expect("first frame renders");

    scene.set_transform(cells[4], Matrix2D::translation(100.0, 100.0));
    let moved = render_frame(&mut scene, &mut painter, CLEAR).expect("second frame renders");
    assert_eq!(moved.meshes_batched, 1);
    assert_eq!(moved.cache_replays, 8);
    assert_eq!(moved.draw_calls, 1);

    let settled = render_frame(&mut scene, &mut painter, CLEAR).expect("third frame renders");
    assert_eq!(settled.meshes_batched, 0);
    assert_eq!(settled.cache_replays, 1);
}

#[test]
fn moved_node_lands_at_its_new_position() {
    let mut painter = painter(PainterConfig::default());
    let (mut scene, cells) = grid_scene();
    render_frame(&mut scene, &mut painter, CLEAR).expect("first frame renders");
    painter.backend_mut().take_commands();

    scene.set_transform(cells[0], Matrix2D::translation(200.0, 200.0));
    render_frame(&mut scene, &mut painter, CLEAR).expect("second frame renders");

    let draws = frame_draws(&mut painter);
    let moved_corner = draws
        .iter()
        .flat_map(|draw| draw.vertices.iter())
        .any(|vertex| vertex.position == [200.0, 200.0]);
    let stale_corner = draws
        .iter()
        .flat_map(|draw| draw.vertices.iter())
        .any(|vertex| vertex.position == [0.0, 0.0]);
    assert!(moved_corner);
    assert!(!stale_corner);
}

#[test]
fn masked_nodes_are_never_replayed() {
    let mut painter = painter(PainterConfig::default());
    let mut scene = Scene::new();
    let root = scene.add_node(None, None);
    let masked = scene.add_node(
        Some(root),
        Some(Mesh::quad(rect(0.0, 0.0, 50.0, 50.0), Color::WHITE)),
    );
    scene.set_mask(masked, Some(Mesh::quad(rect(0.0, 0.0, 25.0, 25.0), Color::WHITE)));
    scene.add_node(
        Some(root),
        Some(Mesh::quad(rect(60.0, 0.0, 10.0, 10.0), Color::WHITE)),
    );

    for _ in 0..3 {
        let stats = render_frame(&mut scene, &mut painter, CLEAR).expect("frame renders");
        assert!(stats.meshes_batched >= 1);
        assert_eq!(painter.clip_rect_stack_depth(), 0);
    }

    let stats = render_frame(&mut scene, &mut painter, CLEAR).expect("frame renders");
    assert_eq!(stats.meshes_batched, 1);
    assert_eq!(stats.cache_replays, 1);
}

#[test]
fn disabled_cache_draws_everything_every_frame() {
    let mut painter = painter(PainterConfig::default().with_cache_enabled(false));
    let (mut scene, _) = grid_scene();

    for _ in 0..3 {
        let stats = render_frame(&mut scene, &mut painter, CLEAR).expect("frame renders");
        assert_eq!(stats.meshes_batched, 9);
        assert_eq!(stats.cache_replays, 0);
    }
}

#[test]
fn recolored_node_is_drawn_with_its_new_color() {
    let mut painter = painter(PainterConfig::default());
    let (mut scene, cells) = grid_scene();
    render_frame(&mut scene, &mut painter, CLEAR).expect("first frame renders");
    painter.backend_mut().take_commands();

    let blue = Color::rgb(0, 0, 255);
    scene.set_color(cells[8], blue);
    let stats = render_frame(&mut scene, &mut painter, CLEAR).expect("second frame renders");
    assert_eq!(stats.meshes_batched, 1);

    let blue_vertices = frame_draws(&mut painter)
        .iter()
        .flat_map(|draw| draw.vertices.clone())
        .filter(|vertex| vertex.color == blue.premultiplied())
        .count();
    assert_eq!(blue_vertices, 4);
}
