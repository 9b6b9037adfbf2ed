//! Fish: a behavioral entity that wanders the tank.
//!
//! Steering is split into a pure decision ([`decide`]) and a pure motion
//! step ([`advance`]); [`Fish`] wires them to a scene clone, an animation
//! mixer and a retarget timer on a [`shoal_kernel::World`].

mod fish;
mod params;
mod steering;

pub use fish::{Fish, FishError};
pub use params::{FishParams, ParamsError};
pub use steering::{Motion, Steering, advance, decide, yaw_of};
