//! Cloning of skinned hierarchies.
//!
//! A structural copy leaves every cloned skinned mesh bound to the source
//! skeleton, so all instances would deform together. `clone_skinned` copies
//! the hierarchy and then rebinds each cloned mesh to a fresh skeleton built
//! from the cloned bones, matched by name in the source skeleton's order.

use std::collections::{BTreeMap, HashMap};

use shoal_common::{NodeId, SkeletonId};

use crate::scene::{Scene, SceneError};
use crate::skeleton::Skeleton;

/// Errors from cloning a skinned hierarchy. All of them mean the source asset
/// is malformed; the partial clone is removed before returning.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("skinned mesh '{mesh}' uses bone '{bone}', which has no counterpart in the clone")]
    MissingBone { mesh: String, bone: String },
    #[error("skinned mesh '{0}' has no counterpart in the clone")]
    MissingMesh(String),
    #[error("skinned mesh '{mesh}' references unknown skeleton {skeleton:?}")]
    MissingSkeleton { mesh: String, skeleton: SkeletonId },
    #[error("skeleton of '{mesh}' lists bone {bone:?}, which is not in the scene")]
    DanglingBone { mesh: String, bone: NodeId },
    #[error("two {kind} nodes are named '{name}'; rebinding by name would be ambiguous")]
    DuplicateName { kind: &'static str, name: String },
}

/// Clone the hierarchy at `source` into an independently animatable instance.
///
/// The returned root is detached; attach it with [`Scene::add`].
pub fn clone_skinned(scene: &mut Scene, source: NodeId) -> Result<NodeId, CloneError> {
    let clone = scene.clone_subtree(source)?;
    match rebind(scene, source, clone) {
        Ok(skinned) => {
            tracing::debug!(
                source = %source.short(),
                clone = %clone.short(),
                skinned,
                "cloned skinned hierarchy"
            );
            Ok(clone)
        }
        Err(e) => {
            tracing::error!(source = %source.short(), error = %e, "skinned clone failed");
            scene.remove(clone)?;
            Err(e)
        }
    }
}

/// Rebind every skinned mesh under `clone`. Returns how many were rebound.
fn rebind(scene: &mut Scene, source: NodeId, clone: NodeId) -> Result<usize, CloneError> {
    // Skinned meshes of the source, by name, with the skeleton they use.
    let mut source_meshes: BTreeMap<String, SkeletonId> = BTreeMap::new();
    for id in scene.descendants(source) {
        let Some(node) = scene.node(id) else { continue };
        if let Some(skeleton) = node.skin().and_then(|s| s.skeleton)
            && source_meshes.insert(node.name.clone(), skeleton).is_some()
        {
            return Err(duplicate("skinned mesh", &node.name));
        }
    }

    // Bones and skinned meshes of the clone, by name. Names must be unique.
    let mut clone_bones: HashMap<String, NodeId> = HashMap::new();
    let mut clone_meshes: HashMap<String, NodeId> = HashMap::new();
    for id in scene.descendants(clone) {
        let Some(node) = scene.node(id) else { continue };
        let (kind, map) = if node.is_bone() {
            ("bone", &mut clone_bones)
        } else if node.skin().is_some() {
            ("skinned mesh", &mut clone_meshes)
        } else {
            continue;
        };
        if map.insert(node.name.clone(), id).is_some() {
            return Err(duplicate(kind, &node.name));
        }
    }

    let mut skin_index = Vec::new();
    for (mesh_name, skeleton_id) in &source_meshes {
        let skeleton = scene
            .skeleton(*skeleton_id)
            .ok_or_else(|| CloneError::MissingSkeleton {
                mesh: mesh_name.clone(),
                skeleton: *skeleton_id,
            })?;

        let mut bones = Vec::with_capacity(skeleton.len());
        for &bone in skeleton.bones() {
            let bone_name = &scene
                .node(bone)
                .ok_or_else(|| CloneError::DanglingBone {
                    mesh: mesh_name.clone(),
                    bone,
                })?
                .name;
            let cloned = clone_bones
                .get(bone_name)
                .ok_or_else(|| CloneError::MissingBone {
                    mesh: mesh_name.clone(),
                    bone: bone_name.clone(),
                })?;
            bones.push(*cloned);
        }
        let inverses = skeleton.bone_inverses().to_vec();

        let cloned_mesh = *clone_meshes
            .get(mesh_name)
            .ok_or_else(|| CloneError::MissingMesh(mesh_name.clone()))?;
        let bind_matrix = scene.world_matrix(cloned_mesh)?;
        let rebound = scene.insert_skeleton(Skeleton::new(bones.clone(), inverses)?);
        scene.bind_skin(cloned_mesh, rebound, bind_matrix)?;

        skin_index.push(cloned_mesh);
        skin_index.extend(bones);
    }

    let animations = scene
        .node(source)
        .map(|n| n.animations.clone())
        .unwrap_or_default();
    let root = scene
        .node_mut(clone)
        .ok_or(SceneError::NodeNotFound(clone))?;
    root.animations = animations;
    root.skin_index = skin_index;

    Ok(source_meshes.len())
}

fn duplicate(kind: &'static str, name: &str) -> CloneError {
    CloneError::DuplicateName {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Geometry, Material, Node, NodeKind, SkinnedMesh};
    use glam::{Quat, Vec3};
    use shoal_animation::{AnimationClip, Pose};
    use shoal_common::Transform;
    use std::sync::Arc;

    struct Rig {
        root: NodeId,
        bones: Vec<NodeId>,
        mesh: NodeId,
    }

    /// fish ─┬─ spine ── tail
    ///       └─ body (skinned to [spine, tail])
    fn rig(scene: &mut Scene) -> Rig {
        let root = scene.spawn(Node::group("fish"));
        let spine = scene.spawn(Node::bone("spine").with_transform(Transform::from_position(Vec3::X)));
        let tail = scene.spawn(Node::bone("tail").with_transform(Transform::from_position(Vec3::X)));
        let mesh = scene.spawn(Node::new(
            "body",
            NodeKind::SkinnedMesh(SkinnedMesh::new(
                Arc::new(Geometry {
                    name: "body".into(),
                    vertex_count: 8,
                    index_count: 36,
                }),
                Arc::new(Material::default()),
            )),
        ));
        scene.add_child(root, spine).unwrap();
        scene.add_child(spine, tail).unwrap();
        scene.add_child(root, mesh).unwrap();

        let skeleton = Skeleton::from_current_pose(scene, vec![spine, tail]).unwrap();
        let skeleton = scene.insert_skeleton(skeleton);
        let bind = scene.world_matrix(mesh).unwrap();
        scene.bind_skin(mesh, skeleton, bind).unwrap();
        scene.node_mut(root).unwrap().animations =
            vec![Arc::new(AnimationClip::new("swim", vec![]))];

        Rig {
            root,
            bones: vec![spine, tail],
            mesh,
        }
    }

    fn skeleton_of(scene: &Scene, mesh: NodeId) -> &Skeleton {
        let id = scene.node(mesh).unwrap().skin().unwrap().skeleton.unwrap();
        scene.skeleton(id).unwrap()
    }

    #[test]
    fn cloned_bones_belong_to_clone() {
        let mut scene = Scene::new();
        let src = rig(&mut scene);
        let clone = clone_skinned(&mut scene, src.root).unwrap();

        let mesh = scene.find_by_name(clone, "body").unwrap();
        let skeleton = skeleton_of(&scene, mesh);
        assert_eq!(skeleton.len(), 2);
        for bone in skeleton.bones() {
            assert!(scene.is_descendant(clone, *bone));
            assert!(!scene.is_descendant(src.root, *bone));
        }
        // order follows the source skeleton
        let names: Vec<_> = skeleton
            .bones()
            .iter()
            .map(|b| scene.node(*b).unwrap().name.as_str())
            .collect();
        assert_eq!(names, ["spine", "tail"]);
    }

    #[test]
    fn inverse_bind_matrices_preserved() {
        let mut scene = Scene::new();
        let src = rig(&mut scene);
        let clone = clone_skinned(&mut scene, src.root).unwrap();
        let mesh = scene.find_by_name(clone, "body").unwrap();
        assert_eq!(
            skeleton_of(&scene, mesh).bone_inverses(),
            skeleton_of(&scene, src.mesh).bone_inverses()
        );
        assert_eq!(scene.skeleton_count(), 2);
    }

    #[test]
    fn bind_matrix_is_clone_world_matrix() {
        let mut scene = Scene::new();
        let src = rig(&mut scene);
        scene.node_mut(src.root).unwrap().transform.position = Vec3::new(0.0, 4.0, 0.0);
        let clone = clone_skinned(&mut scene, src.root).unwrap();
        let mesh = scene.find_by_name(clone, "body").unwrap();
        let skin = scene.node(mesh).unwrap().skin().unwrap();
        assert_eq!(skin.bind_matrix, scene.world_matrix(mesh).unwrap());
    }

    #[test]
    fn clone_and_source_animate_independently() {
        let mut scene = Scene::new();
        let src = rig(&mut scene);
        let clone = clone_skinned(&mut scene, src.root).unwrap();
        let clone_tail = scene.find_by_name(clone, "tail").unwrap();

        scene.node_mut(clone_tail).unwrap().transform.rotation = Quat::from_rotation_y(1.0);
        assert_eq!(scene.node(src.bones[1]).unwrap().transform.rotation, Quat::IDENTITY);

        scene.node_mut(src.bones[0]).unwrap().transform.position = Vec3::new(9.0, 0.0, 0.0);
        let clone_spine = scene.find_by_name(clone, "spine").unwrap();
        assert_eq!(scene.node(clone_spine).unwrap().transform.position, Vec3::X);

        let mut pose = Pose::new();
        pose.add_translation("tail", Vec3::new(0.0, 2.0, 0.0), 1.0);
        scene.apply_pose(clone, &pose);
        assert_eq!(scene.node(src.bones[1]).unwrap().transform.position, Vec3::X);
    }

    #[test]
    fn skin_index_lists_mesh_then_bones() {
        let mut scene = Scene::new();
        let src = rig(&mut scene);
        let clone = clone_skinned(&mut scene, src.root).unwrap();
        let mesh = scene.find_by_name(clone, "body").unwrap();
        let index = scene.node(clone).unwrap().skin_index().to_vec();
        assert_eq!(index.len(), 3);
        assert_eq!(index[0], mesh);
        assert_eq!(&index[1..], skeleton_of(&scene, mesh).bones());
    }

    #[test]
    fn clip_list_shared_by_reference() {
        let mut scene = Scene::new();
        let src = rig(&mut scene);
        let clone = clone_skinned(&mut scene, src.root).unwrap();
        let a = &scene.node(src.root).unwrap().animations[0];
        let b = &scene.node(clone).unwrap().animations[0];
        assert!(Arc::ptr_eq(a, b));
    }

    #[test]
    fn missing_bone_is_reported_and_rolled_back() {
        let mut scene = Scene::new();
        let src = rig(&mut scene);
        // A bone referenced by the skeleton but living outside the hierarchy.
        let stray = scene.spawn(Node::bone("fin"));
        let skeleton = Skeleton::new(
            vec![src.bones[0], stray],
            vec![glam::Mat4::IDENTITY, glam::Mat4::IDENTITY],
        )
        .unwrap();
        let skeleton = scene.insert_skeleton(skeleton);
        scene.bind_skin(src.mesh, skeleton, glam::Mat4::IDENTITY).unwrap();

        let nodes_before = scene.len();
        let skeletons_before = scene.skeleton_count();
        let err = clone_skinned(&mut scene, src.root).unwrap_err();
        assert!(matches!(err, CloneError::MissingBone { ref bone, .. } if bone == "fin"));
        assert_eq!(scene.len(), nodes_before);
        assert_eq!(scene.skeleton_count(), skeletons_before);
    }

    #[test]
    fn duplicate_skinned_mesh_names_rejected() {
        let mut scene = Scene::new();
        let src = rig(&mut scene);
        // A second "body" skinned to its own one-bone skeleton.
        let fin = scene.spawn(Node::bone("fin"));
        let twin = scene.spawn(Node::new(
            "body",
            NodeKind::SkinnedMesh(SkinnedMesh::new(
                Arc::new(Geometry {
                    name: "body".into(),
                    vertex_count: 8,
                    index_count: 36,
                }),
                Arc::new(Material::default()),
            )),
        ));
        scene.add_child(src.root, fin).unwrap();
        scene.add_child(src.root, twin).unwrap();
        let skeleton = Skeleton::from_current_pose(&scene, vec![fin]).unwrap();
        let skeleton = scene.insert_skeleton(skeleton);
        scene.bind_skin(twin, skeleton, glam::Mat4::IDENTITY).unwrap();

        let nodes_before = scene.len();
        let skeletons_before = scene.skeleton_count();
        let err = clone_skinned(&mut scene, src.root).unwrap_err();
        assert!(matches!(
            err,
            CloneError::DuplicateName { kind: "skinned mesh", ref name } if name == "body"
        ));
        assert_eq!(scene.len(), nodes_before);
        assert_eq!(scene.skeleton_count(), skeletons_before);
    }

    #[test]
    fn duplicate_bone_names_rejected() {
        let mut scene = Scene::new();
        let src = rig(&mut scene);
        let extra = scene.spawn(Node::bone("tail"));
        scene.add_child(src.bones[1], extra).unwrap();

        let nodes_before = scene.len();
        let err = clone_skinned(&mut scene, src.root).unwrap_err();
        assert!(matches!(
            err,
            CloneError::DuplicateName { kind: "bone", ref name } if name == "tail"
        ));
        assert_eq!(scene.len(), nodes_before);
    }

    #[test]
    fn unskinned_hierarchy_clones_plainly() {
        let mut scene = Scene::new();
        let root = scene.spawn(Node::group("rock"));
        let clone = clone_skinned(&mut scene, root).unwrap();
        assert!(scene.node(clone).unwrap().skin_index().is_empty());
    }
}
