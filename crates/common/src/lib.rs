//! Shared value types used across the shoal workspace.
//!
//! # Invariants
//! - Ids are opaque and never reused within a process.
//! - `Transform` is plain data; hierarchy lives in the scene graph.

mod types;

pub use types::{NodeId, SkeletonId, Transform};
