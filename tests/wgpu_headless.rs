//! Pixel tests for the wgpu backend, rendered offscreen and read back.
//!
//! Run with:   cargo test --test wgpu_headless
//!
//! Tests return early on machines without a usable adapter.

use futures::executor::block_on;
use quilt::geom::rect;
use quilt::{Color, Mesh, Painter, PainterConfig, Viewport, WgpuBackend, WgpuBackendConfig};
use quilt_test_scenes::{
    check_pixels, quad_grid, render_frame, PixelExpectation, Scene, CANVAS_HEIGHT, CANVAS_WIDTH,
};

const BLUE: Color = Color([0, 0, 255, 255]);

fn headless_painter() -> Option<Painter<WgpuBackend<'static>>> {
    let backend = match block_on(WgpuBackend::new_headless(
        (CANVAS_WIDTH, CANVAS_HEIGHT),
        WgpuBackendConfig::default(),
    )) {
        Ok(backend) => backend,
        Err(error) => {
            eprintln!("skipping: no headless adapter ({error})");
            return None;
        }
    };

    let mut painter = Painter::new(backend, PainterConfig::default());
    painter.configure_back_buffer(Viewport::new(CANVAS_WIDTH as f32, CANVAS_HEIGHT as f32));
    Some(painter)
}

fn assert_pixels(painter: &mut Painter<WgpuBackend<'static>>, expectations: &[PixelExpectation]) {
    let pixels = painter
        .backend_mut()
        .read_back_buffer()
        .expect("headless backend reads back");

    let failures = check_pixels(&pixels, CANVAS_WIDTH, CANVAS_HEIGHT, expectations);
    if !failures.is_empty() {
        panic!(
            "{} pixel expectation(s) failed:\n{}",
            failures.len(),
            failures.join("\n"),
        );
    }
}

fn grid_expectations() -> Vec<PixelExpectation> {
    vec![
        PixelExpectation::opaque(10, 10, 200, 40, 40, "first_cell"),
        PixelExpectation::opaque(58, 58, 200, 40, 40, "last_cell"),
        PixelExpectation::opaque(22, 10, 0, 0, 255, "gap_between_cells"),
        PixelExpectation::opaque(200, 200, 0, 0, 255, "outside_grid"),
    ]
}

#[test]
fn grid_renders_over_clear_color() {
    let Some(mut painter) = headless_painter() else {
        return;
    };
    let mut scene = Scene::new();
    quad_grid(&mut scene, None, 3, 3, 20.0, 4.0, Color::rgb(200, 40, 40));

    render_frame(&mut scene, &mut painter, BLUE).expect("frame renders");
    assert_pixels(&mut painter, &grid_expectations());
}

#[test]
fn replayed_frame_matches_drawn_frame() {
    let Some(mut painter) = headless_painter() else {
        return;
    };
    let mut scene = Scene::new();
    let root = scene.add_node(None, None);
    quad_grid(&mut scene, Some(root), 3, 3, 20.0, 4.0, Color::rgb(200, 40, 40));

    render_frame(&mut scene, &mut painter, BLUE).expect("first frame renders");
    let stats = render_frame(&mut scene, &mut painter, BLUE).expect("second frame renders");
    assert_eq!(stats.cache_replays, 1);

    assert_pixels(&mut painter, &grid_expectations());
}

#[test]
fn rectangular_mask_clips_its_subtree() {
    let Some(mut painter) = headless_painter() else {
        return;
    };
    let mut scene = Scene::new();
    let masked = scene.add_node(
        None,
        Some(Mesh::quad(rect(0.0, 0.0, 100.0, 100.0), Color::WHITE)),
    );
    scene.set_mask(masked, Some(Mesh::quad(rect(0.0, 0.0, 50.0, 50.0), Color::WHITE)));

    render_frame(&mut scene, &mut painter, BLUE).expect("frame renders");
    assert_pixels(
        &mut painter,
        &[
            PixelExpectation::opaque(25, 25, 255, 255, 255, "inside_mask"),
            PixelExpectation::opaque(75, 75, 0, 0, 255, "clipped_by_mask"),
        ],
    );
}

#[test]
fn empty_frame_only_clears() {
    let Some(mut painter) = headless_painter() else {
        return;
    };
    let mut scene = Scene::new();

    let stats = render_frame(&mut scene, &mut painter, Color::TRANSPARENT).expect("frame renders");
    assert_eq!(stats.draw_calls, 0);
    assert_pixels(&mut painter, &[PixelExpectation::transparent(5, 5, "cleared")]);
}
