use std::fmt::Write as _;

use glam::{Mat4, Vec3};
use shoal_scene::{Camera, NodeKind, Scene};

/// Renderer-agnostic interface. All renderers implement this trait.
///
/// The renderer reads the scene and a camera, then produces output. It never
/// mutates the scene.
pub trait Renderer {
    /// The output type produced by this renderer.
    type Output;

    /// Render one frame of `scene` as seen through `camera`.
    fn render(&mut self, scene: &Scene, camera: &Camera) -> Self::Output;
}

/// What a headless frame touched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameSummary {
    pub nodes: usize,
    pub meshes: usize,
    pub skinned_meshes: usize,
    pub joints: usize,
    pub lights: usize,
    /// Meshes whose origin falls inside the camera frustum.
    pub in_view: usize,
}

impl std::fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "nodes={} meshes={} skinned={} joints={} lights={} in_view={}",
            self.nodes, self.meshes, self.skinned_meshes, self.joints, self.lights, self.in_view
        )
    }
}

/// Walks the visible scene and computes skinning matrices without a GPU.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    frames: u64,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for HeadlessRenderer {
    type Output = FrameSummary;

    fn render(&mut self, scene: &Scene, camera: &Camera) -> FrameSummary {
        let view_projection = camera.view_projection();
        let mut summary = FrameSummary::default();

        for id in scene.visible_nodes() {
            let Some(node) = scene.node(id) else { continue };
            summary.nodes += 1;
            if matches!(node.kind, NodeKind::Mesh(_) | NodeKind::SkinnedMesh(_))
                && let Ok(world) = scene.world_matrix(id)
                && in_frustum(view_projection, world.w_axis.truncate())
            {
                summary.in_view += 1;
            }
            match &node.kind {
                NodeKind::Mesh(_) => summary.meshes += 1,
                NodeKind::SkinnedMesh(skin) => {
                    summary.skinned_meshes += 1;
                    let Some(skeleton) = skin.skeleton.and_then(|s| scene.skeleton(s)) else {
                        tracing::warn!(mesh = %node.name, "skinned mesh without skeleton");
                        continue;
                    };
                    match skeleton.joint_matrices(scene, id) {
                        Ok(joints) => summary.joints += joints.len(),
                        Err(e) => tracing::warn!(mesh = %node.name, error = %e, "joint update failed"),
                    }
                }
                NodeKind::Light(_) => summary.lights += 1,
                NodeKind::Group | NodeKind::Bone => {}
            }
        }

        self.frames += 1;
        tracing::trace!(frame = self.frames, ?summary, "headless frame");
        summary
    }
}

/// Whether `point` lies inside the clip volume of `view_projection`
/// (right-handed, depth in `[0, 1]`).
fn in_frustum(view_projection: Mat4, point: Vec3) -> bool {
    let clip = view_projection * point.extend(1.0);
    clip.w > 0.0
        && clip.x.abs() <= clip.w
        && clip.y.abs() <= clip.w
        && (0.0..=clip.w).contains(&clip.z)
}

/// Debug text renderer.
///
/// Produces a human-readable listing of the visible scene. Useful for CLI
/// output, logging, and testing the render interface.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&mut self, scene: &Scene, camera: &Camera) -> String {
        let mut out = String::new();
        let visible = scene.visible_nodes();
        let _ = writeln!(out, "=== Scene (nodes={}) ===", visible.len());
        if let Some(bg) = scene.background {
            let _ = writeln!(out, "Background: #{bg:06x}");
        }
        let _ = writeln!(
            out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}",
            camera.position.x,
            camera.position.y,
            camera.position.z,
            camera.target.x,
            camera.target.y,
            camera.target.z,
            camera.fov_degrees
        );

        for id in visible {
            let Some(node) = scene.node(id) else { continue };
            let kind = match &node.kind {
                NodeKind::Group => "group",
                NodeKind::Bone => continue,
                NodeKind::Mesh(_) => "mesh",
                NodeKind::SkinnedMesh(_) => "skinned",
                NodeKind::Light(_) => "light",
            };
            let p = node.transform.position;
            let _ = writeln!(
                out,
                "  [{}] {kind:<7} {} pos=({:.2}, {:.2}, {:.2})",
                id.short(),
                node.name,
                p.x,
                p.y,
                p.z
            );
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_common::Transform;
    use shoal_scene::{Geometry, Light, LightKind, Material, MeshData, Node, Skeleton, SkinnedMesh};
    use std::sync::Arc;

    fn skinned_scene() -> Scene {
        let mut scene = Scene::new();
        let fish = scene.spawn(Node::group("fish"));
        let bone = scene.spawn(Node::bone("spine"));
        let body = scene.spawn(Node::new(
            "body",
            NodeKind::SkinnedMesh(SkinnedMesh::new(
                Arc::new(Geometry {
                    name: "body".into(),
                    vertex_count: 4,
                    index_count: 6,
                }),
                Arc::new(Material::default()),
            )),
        ));
        scene.add(fish).unwrap();
        scene.add_child(fish, bone).unwrap();
        scene.add_child(fish, body).unwrap();
        let skeleton = scene.insert_skeleton(Skeleton::new(vec![bone], vec![Mat4::IDENTITY]).unwrap());
        scene.bind_skin(body, skeleton, Mat4::IDENTITY).unwrap();
        let light = scene.spawn(Node::new(
            "ambient",
            NodeKind::Light(Light {
                kind: LightKind::Ambient,
                color: 0xffffff,
                intensity: 0.5,
            }),
        ));
        scene.add(light).unwrap();
        scene
    }

    #[test]
    fn headless_counts_visible_scene() {
        let scene = skinned_scene();
        let mut renderer = HeadlessRenderer::new();
        let summary = renderer.render(&scene, &Camera::default());
        assert_eq!(summary.nodes, 5);
        assert_eq!(summary.skinned_meshes, 1);
        assert_eq!(summary.joints, 1);
        assert_eq!(summary.lights, 1);
        assert_eq!(summary.in_view, 1);
        assert_eq!(renderer.frames(), 1);
    }

    #[test]
    fn meshes_behind_camera_are_out_of_view() {
        let mut scene = skinned_scene();
        let camera = Camera::default();
        let rock = scene.spawn(Node::new(
            "rock",
            NodeKind::Mesh(MeshData {
                geometry: Arc::new(Geometry {
                    name: "rock".into(),
                    vertex_count: 8,
                    index_count: 36,
                }),
                material: Arc::new(Material::default()),
            }),
        ).with_transform(Transform::from_position(camera.position + Vec3::Z * 10.0)));
        scene.add(rock).unwrap();

        let summary = HeadlessRenderer::new().render(&scene, &camera);
        assert_eq!(summary.meshes, 1);
        assert_eq!(summary.in_view, 1);

        let mut turned = camera;
        turned.target = camera.position + Vec3::Z;
        let summary = HeadlessRenderer::new().render(&scene, &turned);
        assert_eq!(summary.in_view, 1);
        assert!(summary.to_string().ends_with("in_view=1"));
    }

    #[test]
    fn headless_skips_detached_templates() {
        let mut scene = Scene::new();
        scene.spawn(Node::group("template"));
        let summary = HeadlessRenderer::new().render(&scene, &Camera::default());
        assert_eq!(summary.nodes, 1);
    }

    #[test]
    fn debug_renderer_empty_scene() {
        let scene = Scene::new();
        let output = DebugTextRenderer::new().render(&scene, &Camera::default());
        assert!(output.contains("nodes=1"));
        assert!(output.contains("fov=45"));
    }

    #[test]
    fn debug_renderer_lists_positions() {
        let mut scene = skinned_scene();
        scene.background = Some(0x77bbcc);
        let moved = scene.spawn(Node::group("rock").with_transform(Transform::from_position(
            Vec3::new(1.0, 2.0, 3.0),
        )));
        scene.add(moved).unwrap();
        let output = DebugTextRenderer::new().render(&scene, &Camera::default());
        assert!(output.contains("#77bbcc"));
        assert!(output.contains("rock pos=(1.00, 2.00, 3.00)"));
        assert!(output.contains("skinned body"));
    }
}
