//! Batch accumulation benchmarks.
//!
//! Compares drawing a static scene from scratch with replaying it from the previous frame.
//! Run with:   cargo bench --bench batch_accumulation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quilt::geom::rect;
use quilt::{Color, Mesh, Painter, PainterConfig, RecordingBackend, Viewport};
use quilt_test_scenes::{quad_grid, render_frame, Scene};

fn painter(cache_enabled: bool) -> Painter<RecordingBackend> {
    let config = PainterConfig::default().with_cache_enabled(cache_enabled);
    let mut painter = Painter::new(RecordingBackend::new(), config);
    painter.configure_back_buffer(Viewport::new(1024.0, 1024.0));
    painter
}

fn grid(side: u32) -> Scene {
    let mut scene = Scene::new();
    let root = scene.add_node(None, None);
    quad_grid(&mut scene, Some(root), side, side, 4.0, 1.0, Color::WHITE);
    scene
}

fn bench_batch_mesh(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_mesh");

    for count in [100usize, 1_000, 10_000] {
        let meshes: Vec<Mesh> = (0..count)
            .map(|i| Mesh::quad(rect((i % 100) as f32 * 8.0, (i / 100) as f32 * 8.0, 6.0, 6.0), Color::WHITE))
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &meshes, |b, meshes| {
            let mut painter = painter(false);
            b.iter(|| {
                painter.next_frame();
                for mesh in meshes {
                    painter.batch_mesh(black_box(mesh), None);
                }
                painter.finish_mesh_batch();
                painter.backend_mut().take_commands();
            });
        });
    }

    group.finish();
}

fn bench_static_scene(c: &mut Criterion) {
    let mut group = c.benchmark_group("static_scene");

    for side in [10u32, 50] {
        group.bench_with_input(BenchmarkId::new("redraw", side * side), &side, |b, &side| {
            let mut scene = grid(side);
            let mut painter = painter(false);
            b.iter(|| {
                let stats = render_frame(&mut scene, &mut painter, Color::BLACK);
                painter.backend_mut().take_commands();
                black_box(stats)
            });
        });

        group.bench_with_input(BenchmarkId::new("replay", side * side), &side, |b, &side| {
            let mut scene = grid(side);
            let mut painter = painter(true);
            b.iter(|| {
                let stats = render_frame(&mut scene, &mut painter, Color::BLACK);
                painter.backend_mut().take_commands();
                black_box(stats)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_batch_mesh, bench_static_scene);
criterion_main!(benches);
