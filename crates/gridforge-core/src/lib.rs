//! Gridforge Core -- foundation types for the grid factory simulation.
//!
//! Everything above this crate (geometry, the power solver, the world
//! model) builds on three small pieces:
//!
//! - [`fixed`] -- Q32.32 fixed-point math for time, rates, progress and
//!   power, so a replay of the same inputs is bit-identical everywhere.
//! - [`id`] -- opaque arena keys for buildings plus small copyable ids.
//! - [`item`] -- item kinds, stacks, and bounded buffers used by every
//!   building that holds items.

pub mod fixed;
pub mod id;
pub mod item;
