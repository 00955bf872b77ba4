#![no_std]
//! Frame-stepped rigid-body physics for small 3D games.
//!
//! Objects carry their position, orientation, scale and velocities as 4x4
//! matrices, integrate queued forces and torques once per frame, and answer
//! "did this projectile enter me during the last frame?" through oriented
//! hit boxes. Everything is fixed capacity and allocation free.

pub mod body;
pub mod effect;
pub mod effect_list;
pub mod math;
pub mod physics;

pub use body::Body;
pub use effect::{Force, TimedEffect, Torque};
pub use effect_list::{EffectHandle, EffectList};
pub use physics::{ForceHandle, PhysicalObject, TorqueHandle};
