use std::sync::Arc;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use shoal_animation::AnimationClip;
use shoal_common::{NodeId, SkeletonId, Transform};

/// Vertex data summary. Shared between clones by `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub name: String,
    pub vertex_count: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".into(),
            base_color: [0.8, 0.8, 0.8, 1.0],
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeshData {
    pub geometry: Arc<Geometry>,
    pub material: Arc<Material>,
}

/// A mesh deformed by a skeleton.
#[derive(Debug, Clone)]
pub struct SkinnedMesh {
    pub geometry: Arc<Geometry>,
    pub material: Arc<Material>,
    pub skeleton: Option<SkeletonId>,
    /// World matrix of the mesh at bind time.
    pub bind_matrix: Mat4,
    pub bind_matrix_inverse: Mat4,
}

impl SkinnedMesh {
    pub fn new(geometry: Arc<Geometry>, material: Arc<Material>) -> Self {
        Self {
            geometry,
            material,
            skeleton: None,
            bind_matrix: Mat4::IDENTITY,
            bind_matrix_inverse: Mat4::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    Ambient,
    Point { range: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    /// 0xRRGGBB
    pub color: u32,
    pub intensity: f32,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Bone,
    Mesh(MeshData),
    SkinnedMesh(SkinnedMesh),
    Light(Light),
}

/// One scene-graph node. Hierarchy links are owned by the [`Scene`](crate::Scene).
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub visible: bool,
    /// Clips authored for this hierarchy; shared, never copied.
    pub animations: Vec<Arc<AnimationClip>>,
    pub(crate) skin_index: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            kind,
            visible: true,
            animations: Vec::new(),
            skin_index: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn bone(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Bone)
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn is_bone(&self) -> bool {
        matches!(self.kind, NodeKind::Bone)
    }

    pub fn skin(&self) -> Option<&SkinnedMesh> {
        match &self.kind {
            NodeKind::SkinnedMesh(skin) => Some(skin),
            _ => None,
        }
    }

    pub fn skin_mut(&mut self) -> Option<&mut SkinnedMesh> {
        match &mut self.kind {
            NodeKind::SkinnedMesh(skin) => Some(skin),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Skinned meshes and their ordered bones recorded when this node was
    /// produced by [`clone_skinned`](crate::clone_skinned).
    pub fn skin_index(&self) -> &[NodeId] {
        &self.skin_index
    }

    /// Structural copy: no hierarchy links, no clips, no skin index.
    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            transform: self.transform,
            kind: self.kind.clone(),
            visible: self.visible,
            animations: Vec::new(),
            skin_index: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}
