//! Developer tooling: read-only inspection of a running world.
//!
//! # Invariants
//! - Nothing here mutates the world or its scene.

pub mod inspector;

pub use inspector::{NodeInfo, SkinInfo, WorldInspector, WorldSummary};
