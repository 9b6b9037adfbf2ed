use glam::Mat4;
use shoal_common::NodeId;

use crate::scene::{Scene, SceneError};

/// Ordered bones with their inverse bind matrices.
///
/// `bones[i]` corresponds to `bone_inverses[i]`; that pairing is what the
/// skinning weights index into, so order is preserved across clones.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    bones: Vec<NodeId>,
    bone_inverses: Vec<Mat4>,
}

impl Skeleton {
    pub fn new(bones: Vec<NodeId>, bone_inverses: Vec<Mat4>) -> Result<Self, SceneError> {
        if bones.len() != bone_inverses.len() {
            return Err(SceneError::BoneCountMismatch {
                bones: bones.len(),
                inverses: bone_inverses.len(),
            });
        }
        Ok(Self {
            bones,
            bone_inverses,
        })
    }

    /// Bind the bones in their current pose: inverses are the inverse world matrices.
    pub fn from_current_pose(scene: &Scene, bones: Vec<NodeId>) -> Result<Self, SceneError> {
        let bone_inverses = bones
            .iter()
            .map(|&b| scene.world_matrix(b).map(|m| m.inverse()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(bones, bone_inverses)
    }

    pub fn bones(&self) -> &[NodeId] {
        &self.bones
    }

    pub fn bone_inverses(&self) -> &[Mat4] {
        &self.bone_inverses
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Per-bone skinning matrices for this frame, in mesh space.
    pub fn joint_matrices(&self, scene: &Scene, mesh: NodeId) -> Result<Vec<Mat4>, SceneError> {
        let mesh_world_inv = scene.world_matrix(mesh)?.inverse();
        self.bones
            .iter()
            .zip(&self.bone_inverses)
            .map(|(&bone, ibm)| Ok(mesh_world_inv * scene.world_matrix(bone)? * *ibm))
            .collect()
    }
}
