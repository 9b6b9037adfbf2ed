use std::collections::{BTreeMap, HashMap};

use glam::Mat4;
use shoal_animation::Pose;
use shoal_common::{NodeId, SkeletonId};

use crate::node::Node;
use crate::skeleton::Skeleton;

/// Errors from scene-graph operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("node {0:?} not found")]
    NodeNotFound(NodeId),
    #[error("skeleton {0:?} not found")]
    SkeletonNotFound(SkeletonId),
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("the scene root cannot be detached or removed")]
    RootRemoval,
    #[error("node {0:?} is not a skinned mesh")]
    NotSkinned(NodeId),
    #[error("skeleton has {bones} bones but {inverses} inverse bind matrices")]
    BoneCountMismatch { bones: usize, inverses: usize },
}

/// Arena of nodes plus the skeletons they bind to.
#[derive(Debug, Clone)]
pub struct Scene {
    nodes: BTreeMap<NodeId, Node>,
    skeletons: BTreeMap<SkeletonId, Skeleton>,
    root: NodeId,
    /// Clear colour, 0xRRGGBB.
    pub background: Option<u32>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Create a scene holding only its root group.
    pub fn new() -> Self {
        let root = NodeId::new();
        let mut nodes = BTreeMap::new();
        nodes.insert(root, Node::group("Scene"));
        Self {
            nodes,
            skeletons: BTreeMap::new(),
            root,
            background: None,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes, including the root and detached nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    fn get(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(&id).ok_or(SceneError::NodeNotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(&id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Insert a node without attaching it anywhere.
    pub fn spawn(&mut self, mut node: Node) -> NodeId {
        node.parent = None;
        node.children.clear();
        let id = NodeId::new();
        self.nodes.insert(id, node);
        id
    }

    /// Attach `child` under the scene root.
    pub fn add(&mut self, child: NodeId) -> Result<(), SceneError> {
        self.add_child(self.root, child)
    }

    /// Attach `child` under `parent`, detaching it from any previous parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.get(parent)?;
        self.get(child)?;
        if child == self.root || self.is_descendant(child, parent) {
            return Err(SceneError::Cycle { parent, child });
        }
        self.unlink(child);
        self.get_mut(parent)?.children.push(child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach `id` from its parent. The node stays in the arena.
    pub fn detach(&mut self, id: NodeId) -> Result<(), SceneError> {
        if id == self.root {
            return Err(SceneError::RootRemoval);
        }
        self.get(id)?;
        self.unlink(id);
        Ok(())
    }

    fn unlink(&mut self, id: NodeId) {
        let Some(parent) = self.nodes.get_mut(&id).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| *c != id);
        }
    }

    /// Remove `id` and its whole subtree. Skeletons no longer referenced by
    /// any remaining skinned mesh are dropped too. Returns the removed ids.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        if id == self.root {
            return Err(SceneError::RootRemoval);
        }
        self.get(id)?;
        self.unlink(id);

        let removed = self.descendants(id);
        let mut released = Vec::new();
        for node_id in &removed {
            if let Some(node) = self.nodes.remove(node_id)
                && let Some(skeleton) = node.skin().and_then(|s| s.skeleton)
            {
                released.push(skeleton);
            }
        }
        for skeleton in released {
            let still_used = self
                .nodes
                .values()
                .any(|n| n.skin().and_then(|s| s.skeleton) == Some(skeleton));
            if !still_used {
                self.skeletons.remove(&skeleton);
            }
        }
        tracing::debug!(root = %id.short(), count = removed.len(), "removed subtree");
        Ok(removed)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map_or(&[], |n| n.children.as_slice())
    }

    /// Direct child of `parent` with the given name.
    pub fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    /// First node named `name` in a pre-order walk of the subtree at `root`.
    pub fn find_by_name(&self, root: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(root)
            .into_iter()
            .find(|id| self.nodes.get(id).is_some_and(|n| n.name == name))
    }

    /// Pre-order walk of the subtree at `root`, `root` included.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(&root) {
            return out;
        }
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Pre-order walk below the scene root, pruning invisible subtrees.
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            out.push(id);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Whether `id` is `ancestor` or lies beneath it.
    pub fn is_descendant(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|n| n.parent);
        }
        false
    }

    /// Whether `id` is reachable from the scene root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_descendant(self.root, id)
    }

    /// Product of local matrices from the topmost ancestor down to `id`.
    pub fn world_matrix(&self, id: NodeId) -> Result<Mat4, SceneError> {
        let mut node = self.get(id)?;
        let mut world = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = self.get(parent)?;
            world = node.transform.matrix() * world;
        }
        Ok(world)
    }

    pub fn insert_skeleton(&mut self, skeleton: Skeleton) -> SkeletonId {
        let id = SkeletonId::new();
        self.skeletons.insert(id, skeleton);
        id
    }

    pub fn skeleton(&self, id: SkeletonId) -> Option<&Skeleton> {
        self.skeletons.get(&id)
    }

    pub fn skeleton_count(&self) -> usize {
        self.skeletons.len()
    }

    /// Point the skinned mesh `mesh` at `skeleton`, bound at `bind_matrix`.
    pub fn bind_skin(
        &mut self,
        mesh: NodeId,
        skeleton: SkeletonId,
        bind_matrix: Mat4,
    ) -> Result<(), SceneError> {
        if !self.skeletons.contains_key(&skeleton) {
            return Err(SceneError::SkeletonNotFound(skeleton));
        }
        let skin = self
            .get_mut(mesh)?
            .skin_mut()
            .ok_or(SceneError::NotSkinned(mesh))?;
        skin.skeleton = Some(skeleton);
        skin.bind_matrix = bind_matrix;
        skin.bind_matrix_inverse = bind_matrix.inverse();
        Ok(())
    }

    /// Structural deep copy of the subtree at `source`, left detached.
    ///
    /// Transforms and hierarchy are independent; geometry and materials are
    /// shared; skinned meshes still point at the source skeleton and clip
    /// lists are left empty. Names are preserved.
    pub fn clone_subtree(&mut self, source: NodeId) -> Result<NodeId, SceneError> {
        self.get(source)?;
        let order = self.descendants(source);
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::with_capacity(order.len());
        for old in &order {
            let copy = self.get(*old)?.detached_copy();
            mapping.insert(*old, self.spawn(copy));
        }
        for old in &order {
            let children: Vec<NodeId> = self.children(*old).iter().map(|c| mapping[c]).collect();
            let new = mapping[old];
            for child in &children {
                self.get_mut(*child)?.parent = Some(new);
            }
            self.get_mut(new)?.children = children;
        }
        Ok(mapping[&source])
    }

    /// Write a blended pose onto the nodes of the hierarchy at `root`.
    ///
    /// Names resolve through the root's skin index first, then through the
    /// subtree. Returns the number of nodes updated.
    pub fn apply_pose(&mut self, root: NodeId, pose: &Pose) -> usize {
        if pose.is_empty() {
            return 0;
        }
        let targets: Vec<(NodeId, _)> = {
            let Some(root_node) = self.nodes.get(&root) else {
                return 0;
            };
            let mut lookup: HashMap<&str, NodeId> = HashMap::new();
            for id in root_node.skin_index.iter().copied().chain(self.descendants(root)) {
                if let Some(node) = self.nodes.get(&id) {
                    lookup.entry(node.name.as_str()).or_insert(id);
                }
            }
            pose.iter()
                .filter_map(|(name, channels)| lookup.get(name).map(|id| (*id, *channels)))
                .collect()
        };

        for (id, channels) in &targets {
            if let Some(node) = self.nodes.get_mut(id) {
                if let Some(t) = channels.translation() {
                    node.transform.position = t;
                }
                if let Some(r) = channels.rotation() {
                    node.transform.rotation = r;
                }
                if let Some(s) = channels.scale() {
                    node.transform.scale = s;
                }
            }
        }
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Geometry, Material, NodeKind, SkinnedMesh};
    use glam::{Quat, Vec3};
    use shoal_common::Transform;
    use std::sync::Arc;

    #[test]
    fn scene_starts_with_root_only() {
        let scene = Scene::new();
        assert_eq!(scene.len(), 1);
        assert!(scene.is_empty());
        assert_eq!(scene.node(scene.root()).unwrap().name, "Scene");
    }

    #[test]
    fn add_child_links_both_ways() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::group("a"));
        let b = scene.spawn(Node::group("b"));
        scene.add(a).unwrap();
        scene.add_child(a, b).unwrap();
        assert_eq!(scene.children(a), &[b]);
        assert_eq!(scene.node(b).unwrap().parent(), Some(a));
        assert!(scene.is_attached(b));
    }

    #[test]
    fn reparenting_moves_child() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::group("a"));
        let b = scene.spawn(Node::group("b"));
        let c = scene.spawn(Node::group("c"));
        scene.add_child(a, c).unwrap();
        scene.add_child(b, c).unwrap();
        assert!(scene.children(a).is_empty());
        assert_eq!(scene.children(b), &[c]);
    }

    #[test]
    fn cycles_rejected() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::group("a"));
        let b = scene.spawn(Node::group("b"));
        scene.add_child(a, b).unwrap();
        assert!(matches!(scene.add_child(b, a), Err(SceneError::Cycle { .. })));
        assert!(matches!(scene.add_child(a, a), Err(SceneError::Cycle { .. })));
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut scene = Scene::new();
        let root = scene.root();
        assert!(matches!(scene.remove(root), Err(SceneError::RootRemoval)));
        assert!(matches!(scene.detach(root), Err(SceneError::RootRemoval)));
    }

    #[test]
    fn name_lookup() {
        let mut scene = Scene::new();
        let fish = scene.spawn(Node::group("fish"));
        let spine = scene.spawn(Node::bone("spine"));
        let tail = scene.spawn(Node::bone("tail"));
        scene.add_child(fish, spine).unwrap();
        scene.add_child(spine, tail).unwrap();
        assert_eq!(scene.child_by_name(fish, "spine"), Some(spine));
        assert_eq!(scene.child_by_name(fish, "tail"), None);
        assert_eq!(scene.find_by_name(fish, "tail"), Some(tail));
        assert_eq!(scene.descendants(fish), vec![fish, spine, tail]);
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let parent = scene.spawn(Node::group("p").with_transform(Transform {
            position: Vec3::new(1.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(2.0),
        }));
        let child = scene.spawn(Node::group("c").with_transform(Transform::from_position(Vec3::Y)));
        scene.add_child(parent, child).unwrap();
        let p = scene.world_matrix(child).unwrap().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn invisible_subtrees_are_pruned() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::group("a"));
        let b = scene.spawn(Node::group("b"));
        scene.add(a).unwrap();
        scene.add_child(a, b).unwrap();
        let detached = scene.spawn(Node::group("template"));
        assert_eq!(scene.visible_nodes().len(), 3);
        assert!(!scene.visible_nodes().contains(&detached));
        scene.node_mut(a).unwrap().visible = false;
        assert_eq!(scene.visible_nodes(), vec![scene.root()]);
    }

    #[test]
    fn remove_drops_orphaned_skeletons() {
        let mut scene = Scene::new();
        let group = scene.spawn(Node::group("g"));
        let bone = scene.spawn(Node::bone("b"));
        let mesh = scene.spawn(Node::new(
            "m",
            NodeKind::SkinnedMesh(SkinnedMesh::new(
                Arc::new(Geometry {
                    name: "m".into(),
                    vertex_count: 3,
                    index_count: 3,
                }),
                Arc::new(Material::default()),
            )),
        ));
        scene.add_child(group, bone).unwrap();
        scene.add_child(group, mesh).unwrap();
        let skeleton = scene.insert_skeleton(Skeleton::new(vec![bone], vec![Mat4::IDENTITY]).unwrap());
        scene.bind_skin(mesh, skeleton, Mat4::IDENTITY).unwrap();

        let removed = scene.remove(group).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(scene.skeleton_count(), 0);
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn bind_skin_requires_skinned_mesh() {
        let mut scene = Scene::new();
        let group = scene.spawn(Node::group("g"));
        let skeleton = scene.insert_skeleton(Skeleton::new(vec![], vec![]).unwrap());
        assert!(matches!(
            scene.bind_skin(group, skeleton, Mat4::IDENTITY),
            Err(SceneError::NotSkinned(_))
        ));
    }

    #[test]
    fn clone_subtree_is_independent() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::group("a"));
        let b = scene.spawn(Node::bone("b"));
        scene.add(a).unwrap();
        scene.add_child(a, b).unwrap();

        let copy = scene.clone_subtree(a).unwrap();
        assert_ne!(copy, a);
        assert!(!scene.is_attached(copy));
        let copy_b = scene.child_by_name(copy, "b").unwrap();
        assert_ne!(copy_b, b);

        scene.node_mut(copy_b).unwrap().transform.position = Vec3::X;
        assert_eq!(scene.node(b).unwrap().transform.position, Vec3::ZERO);
    }

    #[test]
    fn apply_pose_by_name() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::group("a"));
        let b = scene.spawn(Node::bone("b"));
        scene.add_child(a, b).unwrap();

        let mut pose = Pose::new();
        pose.add_translation("b", Vec3::new(0.0, 3.0, 0.0), 1.0);
        pose.add_translation("missing", Vec3::ONE, 1.0);
        assert_eq!(scene.apply_pose(a, &pose), 1);
        assert_eq!(scene.node(b).unwrap().transform.position, Vec3::new(0.0, 3.0, 0.0));
    }
}
