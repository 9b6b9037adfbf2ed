use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;
use shoal_common::Transform;
use shoal_scene::{Geometry, Material, Node, NodeKind, Scene, Skeleton, SkinnedMesh, clone_skinned};

/// A chain of `bone_count` bones with one skinned mesh bound to all of them.
fn make_rig(scene: &mut Scene, bone_count: usize) -> shoal_common::NodeId {
    let root = scene.spawn(Node::group("fish"));
    let mut parent = root;
    let mut bones = Vec::with_capacity(bone_count);
    for i in 0..bone_count {
        let bone = scene.spawn(
            Node::bone(format!("bone_{i}")).with_transform(Transform::from_position(Vec3::X * 0.5)),
        );
        scene.add_child(parent, bone).unwrap();
        bones.push(bone);
        parent = bone;
    }
    let mesh = scene.spawn(Node::new(
        "body",
        NodeKind::SkinnedMesh(SkinnedMesh::new(
            Arc::new(Geometry {
                name: "body".into(),
                vertex_count: 512,
                index_count: 1536,
            }),
            Arc::new(Material::default()),
        )),
    ));
    scene.add_child(root, mesh).unwrap();
    let skeleton = Skeleton::from_current_pose(scene, bones).unwrap();
    let skeleton = scene.insert_skeleton(skeleton);
    scene.bind_skin(mesh, skeleton, glam::Mat4::IDENTITY).unwrap();
    root
}

fn bench_clone(bone_count: usize, iterations: usize) {
    let mut scene = Scene::new();
    let template = make_rig(&mut scene, bone_count);

    let start = Instant::now();
    for _ in 0..iterations {
        let clone = clone_skinned(black_box(&mut scene), black_box(template)).unwrap();
        scene.remove(clone).unwrap();
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  clone ({bone_count} bones, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn main() {
    println!("=== Skinned Clone Benchmarks ===\n");
    bench_clone(4, 10000);
    bench_clone(32, 1000);
    bench_clone(128, 100);
    println!("\n=== Done ===");
}
