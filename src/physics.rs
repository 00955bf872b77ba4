//! Frame-stepped rigid-body motion for a single simulated object.
//!
//! A [`PhysicalObject`] tracks position, orientation, scale, linear velocity
//! and angular velocity as 4x4 matrices, integrates the forces and torques
//! queued on it once per [`simulate`](PhysicalObject::simulate) call, and
//! answers point-vs-box hit queries through the [`Body`] boxes attached to it.
//!
//! Times passed to the integrator are in milliseconds; velocities are in
//! model units per second.
//!
//! # Angular velocity
//! Rotation matrices cannot be interpolated linearly the way translations
//! can, so angular velocity is stored as the rotation accrued over a fixed
//! quantum of [`ANGULAR_VELOCITY_MATRIX_DURATION`] milliseconds and applied
//! to the orientation a whole number of times per step.
//!
//! # Example
//! ```
//! use embedded_3dphys::body::Body;
//! use embedded_3dphys::physics::PhysicalObject;
//! use nalgebra::{Matrix4, Point3, Vector3};
//!
//! let hull = [Body::axis_aligned(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0))];
//! let mut ship = PhysicalObject::<8, 8>::new(
//!     10.0,
//!     Matrix4::new_translation(&Vector3::new(0.0, 0.0, -20.0)),
//!     Matrix4::identity(),
//!     Matrix4::identity(),
//!     &hull,
//! );
//!
//! // Thrust while the key is held: renew the same force every tick.
//! let mut thrust = None;
//! for _ in 0..10 {
//!     thrust = ship.add_or_renew_force(thrust, 20.0, &Vector3::x());
//!     ship.simulate(100.0);
//! }
//! assert!((ship.velocity().x - 2.0).abs() < 1e-4);
//!
//! // A projectile that just crossed the hull's -X face.
//! let entry = ship.check_hit(&Point3::new(1.5, 0.0, -20.0), &Vector3::new(1000.0, 0.0, 0.0), 16.0, 0.0);
//! assert!(entry.is_some());
//! ```

use core::cell::OnceCell;

use log::{debug, trace, warn};
use nalgebra::{Matrix4, Point3, Vector3};

// ComplexField provides abs()/sqrt() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::body::Body;
use crate::effect::{Force, Torque};
use crate::effect_list::{EffectHandle, EffectList};
use crate::math;

/// Length in milliseconds of the rotation stored in the angular velocity matrix.
pub const ANGULAR_VELOCITY_MATRIX_DURATION: f32 = 5.0;

/// Velocity matrix components this close to 0 or ±1 are snapped after each step.
pub const VELOCITY_MATRIX_ERROR_THRESHOLD: f32 = 1e-4;

/// Angular velocity matrix components this close to 0 or ±1 are snapped after each step.
pub const ANGULAR_VELOCITY_MATRIX_ERROR_THRESHOLD: f32 = 1e-5;

pub type ForceHandle = EffectHandle<Force>;
pub type TorqueHandle = EffectHandle<Torque>;

/// A matrix computed on first use and kept until invalidated.
#[derive(Debug, Clone, Default)]
struct CachedMatrix(OnceCell<Matrix4<f32>>);

impl CachedMatrix {
    #[inline]
    fn get_or_compute(&self, compute: impl FnOnce() -> Matrix4<f32>) -> &Matrix4<f32> {
        self.0.get_or_init(compute)
    }

    #[inline]
    fn invalidate(&mut self) {
        self.0.take();
    }

    #[cfg(test)]
    fn is_valid(&self) -> bool {
        self.0.get().is_some()
    }
}

/// A simulated object: mass, world transform, velocities, queued effects and
/// hit boxes.
///
/// # Type Parameters
/// * `F` - Maximum number of forces queued at once.
/// * `T` - Maximum number of torques queued at once.
///
/// The bodies are borrowed, so objects of the same kind can share one slice.
#[derive(Debug, Clone)]
pub struct PhysicalObject<'a, const F: usize = 16, const T: usize = 16> {
    mass: f32,

    // -- World transform --
    position_matrix: Matrix4<f32>,
    orientation_matrix: Matrix4<f32>,
    scaling_matrix: Matrix4<f32>,

    // -- Cached inverses --
    orientation_matrix_inverse: CachedMatrix,
    scaling_matrix_inverse: CachedMatrix,
    model_matrix_inverse: CachedMatrix,

    // -- Motion --
    /// Translation whose offset is the linear velocity in m/s.
    velocity_matrix: Matrix4<f32>,
    /// Rotation accrued over one [`ANGULAR_VELOCITY_MATRIX_DURATION`] at the
    /// current angular rate.
    angular_velocity_matrix: Matrix4<f32>,
    forces: EffectList<Force, F>,
    torques: EffectList<Torque, T>,

    // -- Shape --
    bodies: &'a [Body],
    /// Largest distance from the origin to any body corner, `-1` without bodies.
    body_size: f32,

    /// Skip orientation integration entirely.
    fixed_orientation: bool,
}

impl<const F: usize, const T: usize> Default for PhysicalObject<'_, F, T> {
    /// An uninitialized object: unit mass, identity transforms, at rest, no
    /// bodies. Call [`init`](PhysicalObject::init) before simulating.
    fn default() -> Self {
        Self {
            mass: 1.0,
            position_matrix: Matrix4::identity(),
            orientation_matrix: Matrix4::identity(),
            scaling_matrix: Matrix4::identity(),
            orientation_matrix_inverse: CachedMatrix::default(),
            scaling_matrix_inverse: CachedMatrix::default(),
            model_matrix_inverse: CachedMatrix::default(),
            velocity_matrix: Matrix4::identity(),
            angular_velocity_matrix: Matrix4::identity(),
            forces: EffectList::new(),
            torques: EffectList::new(),
            bodies: &[],
            body_size: -1.0,
            fixed_orientation: false,
        }
    }
}

impl<'a, const F: usize, const T: usize> PhysicalObject<'a, F, T> {
    /// Create an object at rest.
    ///
    /// `mass` must be positive; it is not checked, and a zero or negative mass
    /// turns every acceleration non-finite.
    pub fn new(
        mass: f32,
        position_matrix: Matrix4<f32>,
        orientation_matrix: Matrix4<f32>,
        scaling_matrix: Matrix4<f32>,
        bodies: &'a [Body],
    ) -> Self {
        let mut object = Self::default();
        object.init(mass, position_matrix, orientation_matrix, scaling_matrix, bodies);
        object
    }

    /// (Re)initialize every field: new mass, transforms and bodies, at rest,
    /// with no queued effects.
    pub fn init(
        &mut self,
        mass: f32,
        position_matrix: Matrix4<f32>,
        orientation_matrix: Matrix4<f32>,
        scaling_matrix: Matrix4<f32>,
        bodies: &'a [Body],
    ) {
        self.mass = mass;
        self.set_position_matrix(position_matrix);
        self.set_orientation_matrix(orientation_matrix);
        self.set_scaling_matrix(scaling_matrix);
        self.set_bodies(bodies);
        self.reset();
    }

    // -- Builders --

    /// Builder: set the position.
    pub fn with_position(mut self, position: Vector3<f32>) -> Self {
        self.set_position_matrix(math::translation4(&position));
        self
    }

    /// Builder: set the orientation (a pure rotation matrix).
    pub fn with_orientation_matrix(mut self, orientation_matrix: Matrix4<f32>) -> Self {
        self.set_orientation_matrix(orientation_matrix);
        self
    }

    /// Builder: set a uniform scale.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.set_scaling_matrix(math::scaling4(scale));
        self
    }

    /// Builder: set the initial linear velocity in m/s.
    pub fn with_velocity(mut self, velocity: Vector3<f32>) -> Self {
        self.velocity_matrix = math::translation4(&velocity);
        self
    }

    /// Builder: spin about the unit `axis` at `radians_per_second`.
    pub fn with_angular_velocity(mut self, axis: Vector3<f32>, radians_per_second: f32) -> Self {
        self.set_angular_velocity(&axis, radians_per_second);
        self
    }

    /// Builder: never integrate orientation (for objects that do not rotate).
    pub fn with_fixed_orientation(mut self, fixed_orientation: bool) -> Self {
        self.fixed_orientation = fixed_orientation;
        self
    }

    /// Builder: attach hit boxes.
    pub fn with_bodies(mut self, bodies: &'a [Body]) -> Self {
        self.set_bodies(bodies);
        self
    }

    // -- Accessors --

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    #[inline]
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass;
    }

    #[inline]
    pub fn position_matrix(&self) -> &Matrix4<f32> {
        &self.position_matrix
    }

    #[inline]
    pub fn position(&self) -> Vector3<f32> {
        math::translation_of(&self.position_matrix)
    }

    #[inline]
    pub fn orientation_matrix(&self) -> &Matrix4<f32> {
        &self.orientation_matrix
    }

    #[inline]
    pub fn scaling_matrix(&self) -> &Matrix4<f32> {
        &self.scaling_matrix
    }

    /// The uniform scale factor.
    #[inline]
    pub fn scale(&self) -> f32 {
        self.scaling_matrix[(0, 0)]
    }

    #[inline]
    pub fn velocity_matrix(&self) -> &Matrix4<f32> {
        &self.velocity_matrix
    }

    /// Linear velocity in m/s.
    #[inline]
    pub fn velocity(&self) -> Vector3<f32> {
        math::translation_of(&self.velocity_matrix)
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.velocity().norm()
    }

    /// `0.5 * m * v^2`
    #[inline]
    pub fn kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.velocity().norm_squared()
    }

    #[inline]
    pub fn angular_velocity_matrix(&self) -> &Matrix4<f32> {
        &self.angular_velocity_matrix
    }

    #[inline]
    pub fn bodies(&self) -> &'a [Body] {
        self.bodies
    }

    /// Bounding radius of all bodies, `-1` if there are none.
    #[inline]
    pub fn body_size(&self) -> f32 {
        self.body_size
    }

    #[inline]
    pub fn is_fixed_orientation(&self) -> bool {
        self.fixed_orientation
    }

    #[inline]
    pub fn set_fixed_orientation(&mut self, fixed_orientation: bool) {
        self.fixed_orientation = fixed_orientation;
    }

    #[inline]
    pub fn forces(&self) -> &EffectList<Force, F> {
        &self.forces
    }

    #[inline]
    pub fn torques(&self) -> &EffectList<Torque, T> {
        &self.torques
    }

    #[inline]
    pub fn force(&self, handle: ForceHandle) -> Option<&Force> {
        self.forces.get(handle)
    }

    #[inline]
    pub fn torque(&self, handle: TorqueHandle) -> Option<&Torque> {
        self.torques.get(handle)
    }

    // -- Mutators --
    //
    // Each one invalidates exactly the cached inverses derived from the
    // matrix it replaces.

    pub fn set_position_matrix(&mut self, position_matrix: Matrix4<f32>) {
        self.position_matrix = position_matrix;
        self.model_matrix_inverse.invalidate();
    }

    /// Move by `offset` in world space.
    pub fn translate(&mut self, offset: &Vector3<f32>) {
        self.position_matrix.append_translation_mut(offset);
        self.model_matrix_inverse.invalidate();
    }

    pub fn set_orientation_matrix(&mut self, orientation_matrix: Matrix4<f32>) {
        self.orientation_matrix = orientation_matrix;
        self.orientation_matrix_inverse.invalidate();
        self.model_matrix_inverse.invalidate();
    }

    pub fn set_scaling_matrix(&mut self, scaling_matrix: Matrix4<f32>) {
        self.scaling_matrix = scaling_matrix;
        self.scaling_matrix_inverse.invalidate();
        self.model_matrix_inverse.invalidate();
    }

    pub fn set_velocity_matrix(&mut self, velocity_matrix: Matrix4<f32>) {
        self.velocity_matrix = velocity_matrix;
    }

    pub fn set_angular_velocity_matrix(&mut self, angular_velocity_matrix: Matrix4<f32>) {
        self.angular_velocity_matrix = angular_velocity_matrix;
    }

    /// Spin about the unit `axis` at `radians_per_second`.
    pub fn set_angular_velocity(&mut self, axis: &Vector3<f32>, radians_per_second: f32) {
        self.angular_velocity_matrix = math::rotation4(
            axis,
            radians_per_second * ANGULAR_VELOCITY_MATRIX_DURATION / 1000.0,
        );
    }

    /// Replace the hit boxes and recompute the bounding radius.
    pub fn set_bodies(&mut self, bodies: &'a [Body]) {
        self.bodies = bodies;
        if bodies.is_empty() {
            warn!("physical object has no bodies, hit checks will always miss");
            self.body_size = -1.0;
            return;
        }
        self.body_size = bodies
            .iter()
            .map(Body::bounding_radius)
            .fold(0.0f32, f32::max);
        debug!("body size recomputed: {} ({} bodies)", self.body_size, bodies.len());
    }

    // -- Derived matrices --

    /// `position * orientation * scaling`
    pub fn model_matrix(&self) -> Matrix4<f32> {
        self.position_matrix * self.orientation_matrix * self.scaling_matrix
    }

    pub fn orientation_matrix_inverse(&self) -> &Matrix4<f32> {
        self.orientation_matrix_inverse
            .get_or_compute(|| math::rotation_inverse(&self.orientation_matrix))
    }

    pub fn scaling_matrix_inverse(&self) -> &Matrix4<f32> {
        self.scaling_matrix_inverse
            .get_or_compute(|| math::scaling_inverse(&self.scaling_matrix))
    }

    /// World space to model space. Computed once per change of position,
    /// orientation or scale; repeated calls return the same matrix.
    pub fn model_matrix_inverse(&self) -> &Matrix4<f32> {
        self.model_matrix_inverse.get_or_compute(|| {
            self.scaling_matrix_inverse()
                * self.orientation_matrix_inverse()
                * math::translation4(&-self.position())
        })
    }

    /// Convert a point in this object's model space (such as a
    /// [`check_hit`](Self::check_hit) result) to world space.
    pub fn model_point_to_world(&self, point: &Point3<f32>) -> Point3<f32> {
        self.model_matrix().transform_point(point)
    }

    // -- Effects --

    /// Queue a force. Returns `None` if `F` forces are already queued.
    pub fn add_force(&mut self, force: Force) -> Option<ForceHandle> {
        let handle = self.forces.insert(force);
        if handle.is_none() {
            warn!("force capacity ({}) exceeded, force dropped", F);
        }
        handle
    }

    /// Queue a torque. Returns `None` if `T` torques are already queued.
    pub fn add_torque(&mut self, torque: Torque) -> Option<TorqueHandle> {
        let handle = self.torques.insert(torque);
        if handle.is_none() {
            warn!("torque capacity ({}) exceeded, torque dropped", T);
        }
        handle
    }

    /// Remove a queued force before it runs out.
    pub fn remove_force(&mut self, handle: ForceHandle) -> Option<Force> {
        self.forces.remove(handle)
    }

    /// Remove a queued torque before it runs out.
    pub fn remove_torque(&mut self, handle: TorqueHandle) -> Option<Torque> {
        self.torques.remove(handle)
    }

    /// Renew the continuous force `existing`, or queue a new continuous force
    /// if there is none (or it no longer exists, e.g. after [`reset`](Self::reset)).
    ///
    /// Call once per tick for as long as the force should act.
    pub fn add_or_renew_force(
        &mut self,
        existing: Option<ForceHandle>,
        magnitude: f32,
        direction: &Vector3<f32>,
    ) -> Option<ForceHandle> {
        if let Some(handle) = existing {
            if let Some(force) = self.forces.get_mut(handle) {
                force.renew(magnitude, direction);
                return Some(handle);
            }
        }
        self.add_force(Force::new(magnitude, *direction, None))
    }

    /// Torque counterpart of [`add_or_renew_force`](Self::add_or_renew_force).
    pub fn add_or_renew_torque(
        &mut self,
        existing: Option<TorqueHandle>,
        magnitude: f32,
        axis: &Vector3<f32>,
    ) -> Option<TorqueHandle> {
        if let Some(handle) = existing {
            if let Some(torque) = self.torques.get_mut(handle) {
                torque.renew(magnitude, axis);
                return Some(handle);
            }
        }
        self.add_torque(Torque::new(magnitude, *axis, None))
    }

    /// Push the object at `position` (relative to its center, world axes)
    /// along the unit `direction`.
    ///
    /// The whole push acts as a linear force, and the component perpendicular
    /// to the lever arm additionally produces a torque of
    /// `magnitude * |perpendicular| * |position|`. A push at the center or
    /// straight through it produces no torque. `duration` is in milliseconds,
    /// `None` for a continuous push.
    pub fn add_force_and_torque(
        &mut self,
        position: &Vector3<f32>,
        direction: &Vector3<f32>,
        magnitude: f32,
        duration: Option<f32>,
    ) -> (Option<ForceHandle>, Option<TorqueHandle>) {
        let force = self.add_force(Force::new(magnitude, *direction, duration));

        let Some(lever) = position.try_normalize(0.0) else {
            return (force, None);
        };
        let parallel = lever * direction.dot(&lever);
        let perpendicular = direction - parallel;
        let Some(axis) = perpendicular.cross(&lever).try_normalize(0.0) else {
            return (force, None);
        };

        let torque = self.add_torque(Torque::new(
            magnitude * perpendicular.norm() * position.norm(),
            axis,
            duration,
        ));
        (force, torque)
    }

    /// Stop all motion and drop every queued effect. Transforms and bodies
    /// are kept; outstanding effect handles go stale.
    pub fn reset(&mut self) {
        self.velocity_matrix = Matrix4::identity();
        self.angular_velocity_matrix = Matrix4::identity();
        self.forces.clear();
        self.torques.clear();
        debug!("physical object reset");
    }

    // -- Simulation --

    /// Advance the object by `dt` milliseconds. Does nothing if `dt <= 0`.
    ///
    /// Steps run in a fixed order, each reading what the previous ones wrote:
    /// 1. move by last step's velocity,
    /// 2. exert forces: `½at²` goes straight into position, `at` into velocity,
    /// 3. snap near-round velocity components,
    /// 4. unless the orientation is fixed: apply the angular velocity once per
    ///    started quantum, exert torques into orientation and angular
    ///    velocity, snap and re-orthogonalize.
    pub fn simulate(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        // --- Linear ---
        let velocity = self.velocity();
        self.position_matrix
            .append_translation_mut(&(velocity * (dt / 1000.0)));
        self.model_matrix_inverse.invalidate();

        if !self.forces.is_empty() {
            let mass = self.mass;
            let mut displacement = Vector3::zeros();
            let mut velocity_change = Vector3::zeros();
            self.forces.retain_mut(|force| {
                if force.can_be_reused() {
                    trace!("dropping exhausted force");
                    return false;
                }
                let t = force.exert(dt) / 1000.0;
                if t > 0.0 {
                    let acceleration = force.acceleration(mass);
                    displacement += acceleration * (0.5 * t * t);
                    velocity_change += acceleration * t;
                }
                true
            });
            self.position_matrix.append_translation_mut(&displacement);
            self.velocity_matrix.append_translation_mut(&velocity_change);
        }
        math::straighten(&mut self.velocity_matrix, VELOCITY_MATRIX_ERROR_THRESHOLD);

        if self.fixed_orientation {
            return;
        }

        // --- Angular ---
        // Whole quanta only; a quantum counts once at least half of it fits.
        let mut i = 0.0;
        while i + ANGULAR_VELOCITY_MATRIX_DURATION * 0.5 < dt {
            self.orientation_matrix = self.angular_velocity_matrix * self.orientation_matrix;
            i += ANGULAR_VELOCITY_MATRIX_DURATION;
        }

        if !self.torques.is_empty() {
            let mass = self.mass;
            let mut orientation = self.orientation_matrix;
            let mut spin_change = Matrix4::identity();
            self.torques.retain_mut(|torque| {
                if torque.can_be_reused() {
                    trace!("dropping exhausted torque");
                    return false;
                }
                let t = torque.exert(dt) / 1000.0;
                if t > 0.0 {
                    orientation = torque.angular_acceleration_matrix(mass, 0.5 * t * t) * orientation;
                    spin_change = torque.angular_acceleration_matrix(
                        mass,
                        ANGULAR_VELOCITY_MATRIX_DURATION * t / 1000.0,
                    ) * spin_change;
                }
                true
            });
            self.orientation_matrix = orientation;
            self.angular_velocity_matrix = spin_change * self.angular_velocity_matrix;
        }

        math::straighten(
            &mut self.angular_velocity_matrix,
            ANGULAR_VELOCITY_MATRIX_ERROR_THRESHOLD,
        );
        math::orthogonalize(&mut self.orientation_matrix);
        math::orthogonalize(&mut self.angular_velocity_matrix);
        self.orientation_matrix_inverse.invalidate();
        self.model_matrix_inverse.invalidate();
    }

    // -- Hit tests --

    /// Did a point moving at `velocity` (world space, m/s) enter one of this
    /// object's bodies during the last `dt` milliseconds, ending up at
    /// `position`? `offset` inflates every body, in world units.
    ///
    /// Bodies are tried in order and the first hit wins. Returns the entry
    /// point in this object's model space; see
    /// [`model_point_to_world`](Self::model_point_to_world).
    pub fn check_hit(
        &self,
        position: &Point3<f32>,
        velocity: &Vector3<f32>,
        dt: f32,
        offset: f32,
    ) -> Option<Point3<f32>> {
        let inverse_scale = 1.0 / self.scale();
        let offset = offset * inverse_scale;
        let local_position = self.model_matrix_inverse().transform_point(position);
        let relative_velocity = velocity - self.velocity();
        let range = relative_velocity.norm() * dt / 1000.0 * inverse_scale;

        if local_position.x.abs() - range >= self.body_size
            || local_position.y.abs() - range >= self.body_size
            || local_position.z.abs() - range >= self.body_size
        {
            return None;
        }

        let direction = self
            .orientation_matrix_inverse()
            .transform_vector(&relative_velocity)
            .try_normalize(0.0)?;

        self.bodies
            .iter()
            .find_map(|body| body.check_hit(&local_position, &direction, range, offset))
    }
}
