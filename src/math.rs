//! Vector and matrix helpers shared by the integrator and the hit tests.
//!
//! All transforms are homogeneous 4x4 matrices acting on column vectors,
//! so `a * b` means "apply `b`, then `a`".
//!
//! Rotation matrices follow the engine's convention: a positive angle turns
//! clockwise when looking from the tip of the axis toward the origin.

use nalgebra::{Matrix4, Point3, Rotation3, Unit, Vector3, Vector4};

// ComplexField provides abs()/sqrt() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

/// Rotation of `angle` radians about the unit vector `axis`.
#[inline]
pub fn rotation4(axis: &Vector3<f32>, angle: f32) -> Matrix4<f32> {
    Rotation3::from_axis_angle(&Unit::new_unchecked(*axis), -angle).to_homogeneous()
}

/// Pure translation matrix.
#[inline]
pub fn translation4(v: &Vector3<f32>) -> Matrix4<f32> {
    Matrix4::new_translation(v)
}

/// Uniform scaling matrix.
#[inline]
pub fn scaling4(s: f32) -> Matrix4<f32> {
    Matrix4::from_diagonal(&Vector4::new(s, s, s, 1.0))
}

/// Translation component of a homogeneous transform.
#[inline]
pub fn translation_of(m: &Matrix4<f32>) -> Vector3<f32> {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// Inverse of a rotation matrix (its transpose).
#[inline]
pub fn rotation_inverse(m: &Matrix4<f32>) -> Matrix4<f32> {
    m.transpose()
}

/// Inverse of a diagonal scaling matrix.
#[inline]
pub fn scaling_inverse(m: &Matrix4<f32>) -> Matrix4<f32> {
    Matrix4::from_diagonal(&Vector4::new(1.0 / m[(0, 0)], 1.0 / m[(1, 1)], 1.0 / m[(2, 2)], 1.0))
}

/// Inverse of `translation * rotation`, without a general 4x4 inversion.
#[inline]
pub fn rigid_inverse(position: &Matrix4<f32>, orientation: &Matrix4<f32>) -> Matrix4<f32> {
    rotation_inverse(orientation) * translation4(&-translation_of(position))
}

/// Snap every component lying within `epsilon` of 0, 1 or -1 to that value.
///
/// Counters the slow drift repeated multiplication introduces into
/// matrices that should stay exactly axis aligned or exactly at rest.
pub fn straighten(m: &mut Matrix4<f32>, epsilon: f32) {
    for c in m.iter_mut() {
        if c.abs() < epsilon {
            *c = 0.0;
        } else if (*c - 1.0).abs() < epsilon {
            *c = 1.0;
        } else if (*c + 1.0).abs() < epsilon {
            *c = -1.0;
        }
    }
}

/// Re-orthonormalize the rotation part of `m` (Gram-Schmidt on the basis columns).
///
/// The translation column and bottom row are left alone. A degenerate basis
/// (zero-length or parallel columns) is left untouched.
pub fn orthogonalize(m: &mut Matrix4<f32>) {
    let x = Vector3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]);
    let y = Vector3::new(m[(0, 1)], m[(1, 1)], m[(2, 1)]);

    let Some(x) = x.try_normalize(0.0) else {
        return;
    };
    let Some(y) = (y - x * x.dot(&y)).try_normalize(0.0) else {
        return;
    };
    let z = x.cross(&y);

    for (col, axis) in [x, y, z].iter().enumerate() {
        m[(0, col)] = axis.x;
        m[(1, col)] = axis.y;
        m[(2, col)] = axis.z;
    }
}

/// Is `(x, y)` inside the axis-aligned rectangle centered on the origin with
/// the given half extents? Edges count as inside.
#[inline]
pub fn point_in_rect(x: f32, y: f32, half_width: f32, half_height: f32) -> bool {
    x.abs() <= half_width && y.abs() <= half_height
}

/// Largest distance from the origin to any corner of the box `half_dimensions`
/// placed by `transform`.
pub fn max_corner_distance(transform: &Matrix4<f32>, half_dimensions: &Vector3<f32>) -> f32 {
    let mut max_dist = 0.0f32;
    for i in 0..8 {
        let corner = Point3::new(
            if i & 1 == 0 { -half_dimensions.x } else { half_dimensions.x },
            if i & 2 == 0 { -half_dimensions.y } else { half_dimensions.y },
            if i & 4 == 0 { -half_dimensions.z } else { half_dimensions.z },
        );
        let dist = transform.transform_point(&corner).coords.norm();
        if dist > max_dist {
            max_dist = dist;
        }
    }
    max_dist
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use core::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_rotation_turns_clockwise_about_axis() {
        // Clockwise about -Z is counterclockwise about +Z: X goes to Y.
        let r = rotation4(&Vector3::new(0.0, 0.0, -1.0), FRAC_PI_2);
        let v = r.transform_vector(&Vector3::x());
        assert!(approx_eq(v.x, 0.0));
        assert!(approx_eq(v.y, 1.0));

        let r = rotation4(&Vector3::z(), FRAC_PI_2);
        let v = r.transform_vector(&Vector3::x());
        assert!(approx_eq(v.y, -1.0));
    }

    #[test]
    fn test_straighten_snaps_near_values() {
        let mut m = Matrix4::identity();
        m[(0, 0)] = 0.99999;
        m[(0, 1)] = 0.00001;
        m[(1, 0)] = -0.99999;
        m[(0, 3)] = 0.5;
        straighten(&mut m, 1e-4);
        assert_eq!(m[(0, 0)], 1.0);
        assert_eq!(m[(0, 1)], 0.0);
        assert_eq!(m[(1, 0)], -1.0);
        assert_eq!(m[(0, 3)], 0.5);
    }

    #[test]
    fn test_straighten_leaves_far_values() {
        let mut m = Matrix4::identity();
        m[(0, 3)] = 0.001;
        straighten(&mut m, 1e-4);
        assert_eq!(m[(0, 3)], 0.001);
    }

    #[test]
    fn test_orthogonalize_restores_rotation() {
        let mut m = rotation4(&Vector3::new(0.0, 1.0, 0.0), 0.3);
        m[(0, 0)] *= 1.01;
        m[(1, 0)] += 0.02;
        m[(0, 3)] = 7.0;
        orthogonalize(&mut m);

        let x = Vector3::new(m[(0, 0)], m[(1, 0)], m[(2, 0)]);
        let y = Vector3::new(m[(0, 1)], m[(1, 1)], m[(2, 1)]);
        let z = Vector3::new(m[(0, 2)], m[(1, 2)], m[(2, 2)]);
        assert!(approx_eq(x.norm(), 1.0));
        assert!(approx_eq(y.norm(), 1.0));
        assert!(approx_eq(z.norm(), 1.0));
        assert!(approx_eq(x.dot(&y), 0.0));
        assert!(approx_eq(x.dot(&z), 0.0));
        assert_eq!(m[(0, 3)], 7.0);
    }

    #[test]
    fn test_orthogonalize_identity_is_exact() {
        let mut m = Matrix4::identity();
        orthogonalize(&mut m);
        assert_eq!(m, Matrix4::identity());
    }

    #[test]
    fn test_orthogonalize_degenerate_untouched() {
        let mut m = Matrix4::zeros();
        orthogonalize(&mut m);
        assert_eq!(m, Matrix4::zeros());
    }

    #[test]
    fn test_rigid_inverse() {
        let p = translation4(&Vector3::new(1.0, 2.0, 3.0));
        let o = rotation4(&Vector3::new(0.0, 0.0, 1.0), 0.7);
        let inv = rigid_inverse(&p, &o);
        let product = p * o * inv;
        for (a, b) in product.iter().zip(Matrix4::<f32>::identity().iter()) {
            assert!(approx_eq(*a, *b));
        }
    }

    #[test]
    fn test_point_in_rect_edges_inclusive() {
        assert!(point_in_rect(1.0, -2.0, 1.0, 2.0));
        assert!(!point_in_rect(1.01, 0.0, 1.0, 2.0));
        assert!(!point_in_rect(0.0, -2.01, 1.0, 2.0));
    }

    #[test]
    fn test_max_corner_distance() {
        let half = Vector3::new(1.0, 2.0, 2.0);
        assert!(approx_eq(max_corner_distance(&Matrix4::identity(), &half), 3.0));

        let shifted = translation4(&Vector3::new(1.0, 0.0, 0.0));
        assert!(approx_eq(max_corner_distance(&shifted, &half), (4.0f32 + 4.0 + 4.0).sqrt()));
    }
}
