//! Scene graph: an arena of nodes addressed by `NodeId`, the skeletons that
//! skinned meshes bind to, and the camera used to view them.
//!
//! # Invariants
//! - The scene owns a root group; only nodes below it are rendered.
//! - `Skeleton::bones[i]` pairs with `Skeleton::bone_inverses[i]`.
//! - A cloned skinned hierarchy never references the source's bones.

mod camera;
mod clone;
mod node;
mod scene;
mod skeleton;

pub use camera::Camera;
pub use clone::{CloneError, clone_skinned};
pub use node::{Geometry, Light, LightKind, Material, MeshData, Node, NodeKind, SkinnedMesh};
pub use scene::{Scene, SceneError};
pub use skeleton::Skeleton;
