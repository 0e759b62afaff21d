//! Deterministic fixed-point mathematics.
//!
//! Item geometry, velocities and the box-collision test run on fixed-point
//! values so that every client in a lockstep game computes identical cell
//! memberships and collision results.

use fixed::types::I48F16;

pub use vec3::FixedVec3;

mod vec3;

/// Fixed-point number type used throughout the simulation.
///
/// I48F16: 48 integer bits, 16 fractional bits (precision ~0.000015).
pub type FixedNum = I48F16;

/// Half of a fixed-point value. Exact for I48F16 apart from the lowest bit.
#[inline]
pub fn half(value: FixedNum) -> FixedNum {
    value / FixedNum::from_num(2)
}
