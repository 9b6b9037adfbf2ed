use std::sync::Arc;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use shoal_animation::{AnimationClip, Track};
use shoal_common::{NodeId, Transform};
use shoal_scene::{Geometry, Light, Material, MeshData, Node, NodeKind, Scene, Skeleton, SkinnedMesh};

use crate::AssetError;

/// On-disk model: a flat node list in parent-before-child order.
///
/// `nodes[0]` is the root; every other node names an earlier parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub name: String,
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub skeletons: Vec<SkeletonDef>,
    #[serde(default)]
    pub clips: Vec<ClipDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    #[serde(default)]
    pub parent: Option<usize>,
    #[serde(default)]
    pub transform: Transform,
    pub kind: NodeDefKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDefKind {
    Group,
    Bone,
    Mesh {
        geometry: Geometry,
        #[serde(default)]
        material: Material,
    },
    SkinnedMesh {
        geometry: Geometry,
        #[serde(default)]
        material: Material,
        /// Index into [`ModelFile::skeletons`].
        skeleton: usize,
    },
    Light { light: Light },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonDef {
    /// Indices into [`ModelFile::nodes`]; each must be a bone.
    pub bones: Vec<usize>,
    /// Column-major inverse bind matrices. Computed from the rest pose when absent.
    #[serde(default)]
    pub inverse_bind_matrices: Option<Vec<Mat4>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipDef {
    pub name: String,
    pub tracks: Vec<Track>,
}

fn invalid(msg: impl Into<String>) -> AssetError {
    AssetError::InvalidModel(msg.into())
}

impl ModelFile {
    /// Check indices and keyframe data without touching a scene.
    pub fn validate(&self) -> Result<(), AssetError> {
        let Some(first) = self.nodes.first() else {
            return Err(invalid(format!("model '{}' has no nodes", self.name)));
        };
        if first.parent.is_some() {
            return Err(invalid("node 0 must be the root"));
        }
        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            match node.parent {
                Some(p) if p < i => {}
                Some(p) => {
                    return Err(invalid(format!(
                        "node {i} ('{}') has parent {p}, which does not precede it",
                        node.name
                    )));
                }
                None => return Err(invalid(format!("node {i} ('{}') has no parent", node.name))),
            }
            if let NodeDefKind::SkinnedMesh { skeleton, .. } = &node.kind
                && *skeleton >= self.skeletons.len()
            {
                return Err(invalid(format!(
                    "skinned mesh '{}' references missing skeleton {skeleton}",
                    node.name
                )));
            }
        }
        for (s, skeleton) in self.skeletons.iter().enumerate() {
            for &b in &skeleton.bones {
                let is_bone = self
                    .nodes
                    .get(b)
                    .is_some_and(|n| matches!(n.kind, NodeDefKind::Bone));
                if !is_bone {
                    return Err(invalid(format!("skeleton {s} lists node {b}, which is not a bone")));
                }
            }
            if let Some(inverses) = &skeleton.inverse_bind_matrices
                && inverses.len() != skeleton.bones.len()
            {
                return Err(invalid(format!(
                    "skeleton {s} has {} bones but {} inverse bind matrices",
                    skeleton.bones.len(),
                    inverses.len()
                )));
            }
        }
        for clip in &self.clips {
            for track in &clip.tracks {
                track.data.validate()?;
            }
        }
        Ok(())
    }

    /// Build the hierarchy in `scene` and return its detached root.
    ///
    /// Nothing is left behind in the scene when this fails.
    pub fn instantiate(&self, scene: &mut Scene) -> Result<NodeId, AssetError> {
        self.validate()?;

        let ids: Vec<NodeId> = self
            .nodes
            .iter()
            .map(|def| scene.spawn(Node::new(def.name.clone(), node_kind(&def.kind)).with_transform(def.transform)))
            .collect();
        let root = ids[0];

        match self.link(scene, &ids) {
            Ok(()) => Ok(root),
            Err(e) => {
                for id in ids {
                    if scene.contains(id) {
                        scene.remove(id)?;
                    }
                }
                Err(e)
            }
        }
    }

    fn link(&self, scene: &mut Scene, ids: &[NodeId]) -> Result<(), AssetError> {
        for (def, id) in self.nodes.iter().zip(ids).skip(1) {
            if let Some(p) = def.parent {
                scene.add_child(ids[p], *id)?;
            }
        }

        let mut skeletons = Vec::with_capacity(self.skeletons.len());
        for def in &self.skeletons {
            let bones: Vec<NodeId> = def.bones.iter().map(|&b| ids[b]).collect();
            let skeleton = match &def.inverse_bind_matrices {
                Some(inverses) => Skeleton::new(bones, inverses.clone())?,
                None => Skeleton::from_current_pose(scene, bones)?,
            };
            skeletons.push(scene.insert_skeleton(skeleton));
        }

        for (def, id) in self.nodes.iter().zip(ids) {
            if let NodeDefKind::SkinnedMesh { skeleton, .. } = def.kind {
                let bind = scene.world_matrix(*id)?;
                scene.bind_skin(*id, skeletons[skeleton], bind)?;
            }
        }

        let clips = self
            .clips
            .iter()
            .map(|c| Arc::new(AnimationClip::new(c.name.clone(), c.tracks.clone())))
            .collect();
        if let Some(root) = scene.node_mut(ids[0]) {
            root.animations = clips;
        }
        Ok(())
    }
}

fn node_kind(def: &NodeDefKind) -> NodeKind {
    match def {
        NodeDefKind::Group => NodeKind::Group,
        NodeDefKind::Bone => NodeKind::Bone,
        NodeDefKind::Mesh { geometry, material } => NodeKind::Mesh(MeshData {
            geometry: Arc::new(geometry.clone()),
            material: Arc::new(material.clone()),
        }),
        NodeDefKind::SkinnedMesh {
            geometry, material, ..
        } => NodeKind::SkinnedMesh(SkinnedMesh::new(
            Arc::new(geometry.clone()),
            Arc::new(material.clone()),
        )),
        NodeDefKind::Light { light } => NodeKind::Light(*light),
    }
}
