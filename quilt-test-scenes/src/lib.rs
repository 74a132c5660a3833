pub mod expectations;
pub mod scene;

pub use expectations::{check_pixels, PixelExpectation};
pub use scene::{quad_grid, render_frame, Scene, CANVAS_HEIGHT, CANVAS_WIDTH};
