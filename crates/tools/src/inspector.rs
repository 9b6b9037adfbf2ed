use std::fmt::{self, Write as _};

use shoal_common::NodeId;
use shoal_kernel::World;
use shoal_render::Renderer;
use shoal_scene::{NodeKind, Scene};

/// Read-only queries for debugging and the CLI `inspect` command.
pub struct WorldInspector;

impl WorldInspector {
    pub fn summary<R: Renderer>(world: &World<R>) -> WorldSummary {
        let scene = world.scene();
        WorldSummary {
            frame: world.frame(),
            nodes: scene.len(),
            rendered_nodes: scene.visible_nodes().len(),
            skeletons: scene.skeleton_count(),
            templates: world.templates().count(),
            load_failures: world.load_failures().len(),
            observers: world.observer_count(),
            mixers: world.mixer_count(),
            timers: world.timer_count(),
            camera: world.camera().is_some(),
        }
    }

    pub fn inspect_node(scene: &Scene, id: NodeId) -> Option<NodeInfo> {
        scene.node(id).map(|node| {
            let t = node.transform;
            NodeInfo {
                id,
                name: node.name.clone(),
                kind: kind_label(&node.kind),
                position: t.position.to_array(),
                rotation: t.rotation.to_array(),
                scale: t.scale.to_array(),
                children: node.children().len(),
                clips: node.animations.iter().map(|c| c.name.clone()).collect(),
            }
        })
    }

    /// Every skinned mesh under `root` with the names of its bones and
    /// whether all of them live inside `root`'s own subtree.
    pub fn skins(scene: &Scene, root: NodeId) -> Vec<SkinInfo> {
        let mut out = Vec::new();
        for id in scene.descendants(root) {
            let Some(node) = scene.node(id) else { continue };
            let Some(skin) = node.skin() else { continue };
            let skeleton = skin.skeleton.and_then(|s| scene.skeleton(s));
            let bones = skeleton.map(|s| s.bones()).unwrap_or_default();
            out.push(SkinInfo {
                mesh: id,
                mesh_name: node.name.clone(),
                bones: bones
                    .iter()
                    .map(|&b| scene.node(b).map_or_else(|| "?".to_string(), |n| n.name.clone()))
                    .collect(),
                self_contained: bones.iter().all(|&b| scene.is_descendant(root, b)),
            });
        }
        out
    }

    /// Indented outline of the subtree at `root`, one node per line.
    pub fn tree(scene: &Scene, root: NodeId) -> String {
        let mut out = String::new();
        write_tree(scene, root, 0, &mut out);
        out
    }
}

fn write_tree(scene: &Scene, id: NodeId, depth: usize, out: &mut String) {
    let Some(node) = scene.node(id) else { return };
    let _ = writeln!(
        out,
        "{:indent$}{} ({})",
        "",
        node.name,
        kind_label(&node.kind),
        indent = depth * 2
    );
    for &child in node.children() {
        write_tree(scene, child, depth + 1, out);
    }
}

fn kind_label(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Group => "group",
        NodeKind::Bone => "bone",
        NodeKind::Mesh(_) => "mesh",
        NodeKind::SkinnedMesh(_) => "skinned",
        NodeKind::Light(_) => "light",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldSummary {
    pub frame: u64,
    pub nodes: usize,
    pub rendered_nodes: usize,
    pub skeletons: usize,
    pub templates: usize,
    pub load_failures: usize,
    pub observers: usize,
    pub mixers: usize,
    pub timers: usize,
    pub camera: bool,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World: frame={} nodes={} rendered={} skeletons={} templates={} failures={} \
             observers={} mixers={} timers={} camera={}",
            self.frame,
            self.nodes,
            self.rendered_nodes,
            self.skeletons,
            self.templates,
            self.load_failures,
            self.observers,
            self.mixers,
            self.timers,
            if self.camera { "set" } else { "none" },
        )
    }
}

#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub kind: &'static str,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub children: usize,
    pub clips: Vec<String>,
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Node [{}] {} ({}) pos=({:.2}, {:.2}, {:.2}) scale=({:.2}, {:.2}, {:.2}) children={}",
            self.id.short(),
            self.name,
            self.kind,
            self.position[0],
            self.position[1],
            self.position[2],
            self.scale[0],
            self.scale[1],
            self.scale[2],
            self.children,
        )?;
        if !self.clips.is_empty() {
            write!(f, " clips=[{}]", self.clips.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SkinInfo {
    pub mesh: NodeId,
    pub mesh_name: String,
    pub bones: Vec<String>,
    /// All bones are descendants of the inspected root.
    pub self_contained: bool,
}
