//! Oriented boxes used as hit proxies for a [`PhysicalObject`](crate::physics::PhysicalObject).
//!
//! A [`Body`] is placed relative to its owner by a translation and a rotation
//! and never changes afterwards, so the same slice of bodies can back every
//! object of one kind.

use nalgebra::{Matrix4, Point3, Vector3};

use crate::math;

/// For each axis, the two axes spanning the faces perpendicular to it.
const FACE_AXES: [(usize, usize); 3] = [(1, 2), (0, 2), (0, 1)];

/// A box with the given half extents, placed in its owner's model space.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    position_matrix: Matrix4<f32>,
    orientation_matrix: Matrix4<f32>,
    half_dimensions: Vector3<f32>,
    /// Whether the orientation differs from identity. Unrotated bodies take
    /// the translation-only path in hit tests.
    rotated: bool,
    model_matrix: Matrix4<f32>,
    model_matrix_inverse: Matrix4<f32>,
}

impl Body {
    /// `position_matrix` must be a pure translation and `orientation_matrix` a
    /// pure rotation; every component of `half_dimensions` must be positive.
    pub fn new(
        position_matrix: Matrix4<f32>,
        orientation_matrix: Matrix4<f32>,
        half_dimensions: Vector3<f32>,
    ) -> Self {
        Self {
            rotated: orientation_matrix != Matrix4::identity(),
            model_matrix: position_matrix * orientation_matrix,
            model_matrix_inverse: math::rigid_inverse(&position_matrix, &orientation_matrix),
            position_matrix,
            orientation_matrix,
            half_dimensions,
        }
    }

    /// An unrotated box centered on `center`.
    pub fn axis_aligned(center: Vector3<f32>, half_dimensions: Vector3<f32>) -> Self {
        Self::new(math::translation4(&center), Matrix4::identity(), half_dimensions)
    }

    #[inline]
    pub fn position_matrix(&self) -> &Matrix4<f32> {
        &self.position_matrix
    }

    #[inline]
    pub fn orientation_matrix(&self) -> &Matrix4<f32> {
        &self.orientation_matrix
    }

    #[inline]
    pub fn half_dimensions(&self) -> &Vector3<f32> {
        &self.half_dimensions
    }

    #[inline]
    pub fn is_rotated(&self) -> bool {
        self.rotated
    }

    /// Body space to owner model space (`position * orientation`).
    #[inline]
    pub fn model_matrix(&self) -> &Matrix4<f32> {
        &self.model_matrix
    }

    #[inline]
    pub fn model_matrix_inverse(&self) -> &Matrix4<f32> {
        &self.model_matrix_inverse
    }

    /// Largest distance from the owner's origin to any corner of this box.
    pub fn bounding_radius(&self) -> f32 {
        math::max_corner_distance(&self.model_matrix, &self.half_dimensions)
    }

    /// Find where a moving point entered this box during the last step.
    ///
    /// `position` is the point's current location and `direction` the unit
    /// direction of its motion relative to the owner, both in the owner's
    /// model space. `range` is how far (in model units) the point travelled
    /// back along `direction` during the step, and `offset` inflates the box
    /// on every side.
    ///
    /// Only one face per axis is considered: the one facing against the
    /// motion. Axes are tried in X, Y, Z order and the first face whose plane
    /// crossing lies inside the face rectangle decides the outcome: a hit if
    /// the crossing is between `range` behind the point and the point itself,
    /// no hit otherwise, without looking at the remaining axes.
    ///
    /// Returns the entry point in the owner's model space.
    pub fn check_hit(
        &self,
        position: &Point3<f32>,
        direction: &Vector3<f32>,
        range: f32,
        offset: f32,
    ) -> Option<Point3<f32>> {
        let (local_position, local_direction) = if self.rotated {
            (
                self.model_matrix_inverse.transform_point(position),
                self.model_matrix_inverse.transform_vector(direction),
            )
        } else {
            (
                position - math::translation_of(&self.position_matrix),
                *direction,
            )
        };

        let extents = self.half_dimensions.add_scalar(offset);

        for (axis, &(u, v)) in FACE_AXES.iter().enumerate() {
            let dir = local_direction[axis];
            if dir == 0.0 {
                continue;
            }
            // The face we entered through lies against the direction of travel.
            let face = if dir > 0.0 { -extents[axis] } else { extents[axis] };
            let d = (face - local_position[axis]) / dir;

            let pu = local_position[u] + local_direction[u] * d;
            let pv = local_position[v] + local_direction[v] * d;
            if !math::point_in_rect(pu, pv, extents[u], extents[v]) {
                continue;
            }

            if d < -range || d > 0.0 {
                return None;
            }
            let mut entry = Point3::origin();
            entry[axis] = face;
            entry[u] = pu;
            entry[v] = pv;
            return Some(self.to_model_space(&entry));
        }
        None
    }

    fn to_model_space(&self, point: &Point3<f32>) -> Point3<f32> {
        if self.rotated {
            self.model_matrix.transform_point(point)
        } else {
            point + math::translation_of(&self.position_matrix)
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use core::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-4;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    fn approx_point_eq(a: &Point3<f32>, b: &Point3<f32>) -> bool {
        approx_eq(a.x, b.x) && approx_eq(a.y, b.y) && approx_eq(a.z, b.z)
    }

    fn unit_cube() -> Body {
        Body::axis_aligned(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_rotated_flag() {
        assert!(!unit_cube().is_rotated());
        let rotated = Body::new(
            Matrix4::identity(),
            math::rotation4(&Vector3::z(), 0.1),
            Vector3::new(1.0, 1.0, 1.0),
        );
        assert!(rotated.is_rotated());
    }

    #[test]
    fn test_hit_just_inside_entry_face() {
        let body = unit_cube();
        let eps = 0.01;
        let hit = body
            .check_hit(&Point3::new(-1.0 + eps, 0.0, 0.0), &Vector3::x(), 0.5, 0.0)
            .unwrap();
        assert!(approx_point_eq(&hit, &Point3::new(-1.0, 0.0, 0.0)));
    }

    #[test]
    fn test_entry_exactly_at_point() {
        let body = unit_cube();
        let hit = body.check_hit(&Point3::new(-1.0, 0.2, 0.3), &Vector3::x(), 0.0, 0.0);
        assert!(approx_point_eq(&hit.unwrap(), &Point3::new(-1.0, 0.2, 0.3)));
    }

    #[test]
    fn test_entry_in_the_future_is_no_hit() {
        let body = unit_cube();
        // Still outside, approaching the -X face: the crossing lies ahead
        // (d > 0), so even a point right at the boundary is not a hit yet.
        let hit = body.check_hit(&Point3::new(-1.0 - 0.01, 0.0, 0.0), &Vector3::x(), 5.0, 0.0);
        assert!(hit.is_none());
    }

    #[test]
    fn test_entry_too_far_back_is_no_hit() {
        let body = unit_cube();
        let hit = body.check_hit(&Point3::new(0.5, 0.0, 0.0), &Vector3::x(), 1.0, 0.0);
        assert!(hit.is_none());
        let hit = body.check_hit(&Point3::new(0.5, 0.0, 0.0), &Vector3::x(), 1.5, 0.0);
        assert!(hit.is_some());
    }

    #[test]
    fn test_negative_direction_tests_positive_face() {
        let body = unit_cube();
        let hit = body
            .check_hit(&Point3::new(0.0, 0.9, 0.0), &-Vector3::y(), 0.2, 0.0)
            .unwrap();
        assert!(approx_point_eq(&hit, &Point3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn test_falls_through_to_next_axis() {
        let body = unit_cube();
        // Entered through the top face moving down and to the right: the -X
        // face crossing is outside its rectangle, the +Y face decides.
        let s = core::f32::consts::FRAC_1_SQRT_2;
        let hit = body
            .check_hit(&Point3::new(0.5, 0.9, 0.0), &Vector3::new(s, -s, 0.0), 1.0, 0.0)
            .unwrap();
        assert!(approx_eq(hit.y, 1.0));
        assert!(approx_eq(hit.x, 0.4));
    }

    #[test]
    fn test_miss_outside_every_face_rectangle() {
        let body = unit_cube();
        let hit = body.check_hit(&Point3::new(-2.0, 5.0, 0.0), &Vector3::x(), 10.0, 0.0);
        assert!(hit.is_none());
    }

    #[test]
    fn test_contained_face_decides_without_checking_other_axes() {
        let body = unit_cube();
        // The -X face crossing is inside its rectangle but ahead of the
        // point, so the search stops there with no hit.
        let s = core::f32::consts::FRAC_1_SQRT_2;
        let hit = body.check_hit(&Point3::new(-1.5, 0.2, 0.0), &Vector3::new(s, s, 0.0), 10.0, 0.0);
        assert!(hit.is_none());
    }

    #[test]
    fn test_offset_inflates_box() {
        let body = unit_cube();
        let position = Point3::new(-1.1, 1.05, 0.0);
        assert!(body.check_hit(&position, &Vector3::x(), 1.0, 0.0).is_none());
        let hit = body.check_hit(&position, &Vector3::x(), 1.0, 0.2).unwrap();
        assert!(approx_eq(hit.x, -1.2));
        assert!(approx_eq(hit.y, 1.05));
    }

    #[test]
    fn test_translated_body_returns_model_space_point() {
        let body = Body::axis_aligned(Vector3::new(3.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let hit = body
            .check_hit(&Point3::new(2.5, 0.0, 0.0), &Vector3::x(), 1.0, 0.0)
            .unwrap();
        assert!(approx_point_eq(&hit, &Point3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_rotated_body_hit() {
        // A 2x1x1 box turned a quarter about Z: its long side lies along Y
        // in model space.
        let body = Body::new(
            math::translation4(&Vector3::new(0.0, 5.0, 0.0)),
            math::rotation4(&Vector3::z(), FRAC_PI_2),
            Vector3::new(2.0, 1.0, 1.0),
        );
        let hit = body
            .check_hit(&Point3::new(0.0, 3.2, 0.0), &Vector3::y(), 1.0, 0.0)
            .unwrap();
        assert!(approx_point_eq(&hit, &Point3::new(0.0, 3.0, 0.0)));

        // Along X it is only one unit deep.
        let hit = body
            .check_hit(&Point3::new(-0.8, 5.0, 0.0), &Vector3::x(), 0.5, 0.0)
            .unwrap();
        assert!(approx_point_eq(&hit, &Point3::new(-1.0, 5.0, 0.0)));
    }

    #[test]
    fn test_bounding_radius() {
        let body = Body::axis_aligned(Vector3::new(1.0, 0.0, 0.0), Vector3::new(1.0, 2.0, 2.0));
        assert!(approx_eq(body.bounding_radius(), 12.0f32.sqrt()));
    }
}
