//! Geometry aliases used throughout the crate.
//!
//! 2D affine transforms follow euclid's row-vector convention: `a.then(&b)` applies `a` first.

use euclid::default::{Box2D, Point2D, Transform2D, Transform3D};

pub type Matrix2D = Transform2D<f32>;
pub type Matrix3D = Transform3D<f32>;
/// An axis-aligned rectangle in stage coordinates.
pub type Rect = Box2D<f32>;
pub type Point = Point2D<f32>;

/// Builds a rect from its top-left corner and size.
#[inline]
pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Rect {
    Rect::new(Point::new(x, y), Point::new(x + width, y + height))
}

/// Intersection of two rects. Disjoint rects yield a zero-sized rect at the origin.
pub fn intersect_rects(a: &Rect, b: &Rect) -> Rect {
    let min_x = a.min.x.max(b.min.x);
    let min_y = a.min.y.max(b.min.y);
    let max_x = a.max.x.min(b.max.x);
    let max_y = a.max.y.min(b.max.y);

    if max_x <= min_x || max_y <= min_y {
        Rect::zero()
    } else {
        Rect::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }
}

/// Axis-aligned bounds of `rect` after applying `matrix`.
pub fn transform_bounds(matrix: &Matrix2D, rect: &Rect) -> Rect {
    let corners = [
        matrix.transform_point(rect.min),
        matrix.transform_point(Point::new(rect.max.x, rect.min.y)),
        matrix.transform_point(rect.max),
        matrix.transform_point(Point::new(rect.min.x, rect.max.y)),
    ];
    Rect::from_points(corners)
}

/// Orthographic projection mapping the stage rect `(x, y, width, height)` to clip space.
/// The stage's y axis points down, clip space's y axis points up.
pub fn orthographic_projection(x: f32, y: f32, width: f32, height: f32) -> Matrix3D {
    Matrix3D::ortho(x, x + width, y + height, y, -1.0, 1.0)
}

/// Projects a stage-space point through `projection` into clip space, dividing by w.
pub(crate) fn project_point(projection: &Matrix3D, point: Point) -> Point {
    projection
        .transform_point2d(point)
        .unwrap_or_else(|| Point::new(0.0, 0.0))
}

/// True if `matrix` keeps axis-aligned rects axis-aligned (no skew, rotations by 90° allowed).
pub(crate) fn is_axis_aligned(matrix: &Matrix2D) -> bool {
    (matrix.m12 == 0.0 && matrix.m21 == 0.0) || (matrix.m11 == 0.0 && matrix.m22 == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_rects_overlapping() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(50.0, 25.0, 100.0, 100.0);
        assert_eq!(intersect_rects(&a, &b), rect(50.0, 25.0, 50.0, 75.0));
    }

    #[test]
    fn intersect_rects_disjoint_is_empty() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(20.0, 20.0, 10.0, 10.0);
        let intersection = intersect_rects(&a, &b);
        assert_eq!(intersection.width(), 0.0);
        assert_eq!(intersection.height(), 0.0);
    }

    #[test]
    fn transform_bounds_of_rotated_rect() {
        let matrix = Matrix2D::rotation(euclid::Angle::degrees(90.0));
        let bounds = transform_bounds(&matrix, &rect(0.0, 0.0, 20.0, 10.0));
        assert!((bounds.min.x + 10.0).abs() < 1e-4);
        assert!((bounds.max.y - 20.0).abs() < 1e-4);
    }

    #[test]
    fn orthographic_projection_maps_stage_corners_to_clip_space() {
        let projection = orthographic_projection(0.0, 0.0, 800.0, 600.0);
        let top_left = project_point(&projection, Point::new(0.0, 0.0));
        let bottom_right = project_point(&projection, Point::new(800.0, 600.0));
        assert!((top_left.x + 1.0).abs() < 1e-5 && (top_left.y - 1.0).abs() < 1e-5);
        assert!((bottom_right.x - 1.0).abs() < 1e-5 && (bottom_right.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn axis_alignment_detection() {
        assert!(is_axis_aligned(&Matrix2D::scale(2.0, 3.0)));
        assert!(is_axis_aligned(&Matrix2D::new(0.0, 1.0, -1.0, 0.0, 5.0, 5.0)));
        assert!(!is_axis_aligned(&Matrix2D::rotation(euclid::Angle::degrees(30.0))));
    }
}
