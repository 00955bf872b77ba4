//! Time-bounded forces and torques.
//!
//! A [`TimedEffect`] is either *continuous* (it has to be renewed every tick
//! to stay in force, e.g. thrust while a key is held) or *discrete* (it acts
//! for a fixed number of milliseconds, e.g. a one-shot impulse). Both kinds
//! answer the same question each tick through [`TimedEffect::exert`]: for
//! how much of this tick am I in force?
//!
//! # Example
//! ```
//! use embedded_3dphys::effect::Force;
//! use nalgebra::Vector3;
//!
//! // 50 N along +X for 30 ms
//! let mut push = Force::new(50.0, Vector3::x(), Some(30.0));
//! assert_eq!(push.exert(20.0), 20.0);
//! assert_eq!(push.exert(20.0), 10.0);
//! assert_eq!(push.exert(20.0), 0.0);
//! assert!(push.can_be_reused());
//! ```

use core::ops::{Deref, DerefMut};

use nalgebra::{Matrix4, Vector3};

use crate::math;

/// Effects with less than this many milliseconds left are treated as exhausted.
pub const MINIMUM_EFFECT_DURATION: f32 = 0.1;

/// Magnitude, unit direction and remaining lifetime shared by forces and torques.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEffect {
    magnitude: f32,
    direction: Vector3<f32>,
    /// Milliseconds left. For continuous effects `0` means "renewed for this
    /// tick" and `-1` means "consumed, waiting for renewal".
    remaining: f32,
    continuous: bool,
}

impl TimedEffect {
    /// Create an effect. `duration` is in milliseconds; `None` makes the effect
    /// continuous, already renewed for the current tick.
    ///
    /// `direction` must be a unit vector.
    pub fn new(magnitude: f32, direction: Vector3<f32>, duration: Option<f32>) -> Self {
        Self {
            magnitude,
            direction,
            remaining: duration.unwrap_or(0.0),
            continuous: duration.is_none(),
        }
    }

    /// Overwrite magnitude and direction and mark the effect active for this tick.
    ///
    /// Meant for continuous effects only.
    pub fn renew(&mut self, magnitude: f32, direction: &Vector3<f32>) {
        self.magnitude = magnitude;
        self.direction.copy_from(direction);
        self.remaining = 0.0;
    }

    /// Milliseconds of the `dt` long tick during which this effect is in force.
    ///
    /// Consumes the effect's lifetime: continuous effects go dormant until the
    /// next [`renew`](Self::renew), discrete ones count down.
    pub fn exert(&mut self, dt: f32) -> f32 {
        if self.continuous {
            if self.remaining < 0.0 {
                return 0.0;
            }
            self.remaining = -1.0;
            dt
        } else {
            if self.remaining < MINIMUM_EFFECT_DURATION {
                return 0.0;
            }
            let t = self.remaining.min(dt);
            self.remaining -= dt;
            t
        }
    }

    /// True once a discrete effect has run out; the owning list may drop it.
    /// Continuous effects are never reusable.
    #[inline]
    pub fn can_be_reused(&self) -> bool {
        self.remaining < MINIMUM_EFFECT_DURATION && !self.continuous
    }

    #[inline]
    pub fn magnitude(&self) -> f32 {
        self.magnitude
    }

    #[inline]
    pub fn direction(&self) -> &Vector3<f32> {
        &self.direction
    }

    #[inline]
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    #[inline]
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }
}

/// A linear force in newtons.
#[derive(Debug, Clone, PartialEq)]
pub struct Force(TimedEffect);

impl Force {
    pub fn new(magnitude: f32, direction: Vector3<f32>, duration: Option<f32>) -> Self {
        Self(TimedEffect::new(magnitude, direction, duration))
    }

    /// Acceleration in m/s² this force gives a body of `mass` kilograms.
    #[inline]
    pub fn acceleration(&self, mass: f32) -> Vector3<f32> {
        self.0.direction * (self.0.magnitude / mass)
    }
}

impl Deref for Force {
    type Target = TimedEffect;

    fn deref(&self) -> &TimedEffect {
        &self.0
    }
}

impl DerefMut for Force {
    fn deref_mut(&mut self) -> &mut TimedEffect {
        &mut self.0
    }
}

/// A torque about a unit axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Torque(TimedEffect);

impl Torque {
    pub fn new(magnitude: f32, axis: Vector3<f32>, duration: Option<f32>) -> Self {
        Self(TimedEffect::new(magnitude, axis, duration))
    }

    #[inline]
    pub fn axis(&self) -> &Vector3<f32> {
        &self.0.direction
    }

    /// Rotation accumulated about the axis when this torque acts on `mass`
    /// for `t` seconds: an angle of `(magnitude / mass) * t` radians.
    ///
    /// Callers fold any half-step or quantum scaling into `t`.
    #[inline]
    pub fn angular_acceleration_matrix(&self, mass: f32, t: f32) -> Matrix4<f32> {
        math::rotation4(&self.0.direction, self.0.magnitude / mass * t)
    }
}

impl Deref for Torque {
    type Target = TimedEffect;

    fn deref(&self) -> &TimedEffect {
        &self.0
    }
}

impl DerefMut for Torque {
    fn deref_mut(&mut self) -> &mut TimedEffect {
        &mut self.0
    }
}
