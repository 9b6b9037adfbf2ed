use std::f32::consts::TAU;

use glam::{Quat, Vec3};
use shoal_animation::{KeyframeTrack, Track, TrackData};
use shoal_common::Transform;
use shoal_scene::{Geometry, Material};

use crate::AssetError;
use crate::model::{ClipDef, ModelFile, NodeDef, NodeDefKind, SkeletonDef};

/// Path prefix that selects a procedural model instead of a file.
pub const BUILTIN_SCHEME: &str = "builtin:";

/// Procedural fish: a spine of bones running tail-ward along -X, one
/// skinned body mesh, and two looping clips, `swim` and `idle`.
#[derive(Debug, Clone)]
pub struct FishRig {
    pub bone_count: usize,
    pub segment_length: f32,
    /// Peak yaw of the tail bone during `swim`, radians.
    pub swim_amplitude: f32,
    pub swim_period: f32,
    pub idle_period: f32,
}

impl Default for FishRig {
    fn default() -> Self {
        Self {
            bone_count: 4,
            segment_length: 0.5,
            swim_amplitude: 0.6,
            swim_period: 1.0,
            idle_period: 3.0,
        }
    }
}

const KEYS_PER_CYCLE: usize = 8;

impl FishRig {
    pub fn model(&self) -> Result<ModelFile, AssetError> {
        if self.bone_count == 0 {
            return Err(AssetError::InvalidModel("fish rig needs at least one bone".into()));
        }
        if self.swim_period <= 0.0 || self.idle_period <= 0.0 {
            return Err(AssetError::InvalidModel("fish rig periods must be positive".into()));
        }

        let mut nodes = vec![NodeDef {
            name: "fish".into(),
            parent: None,
            transform: Transform::default(),
            kind: NodeDefKind::Group,
        }];
        let mut bones = Vec::with_capacity(self.bone_count);
        for i in 0..self.bone_count {
            let (parent, offset) = if i == 0 {
                (0, Vec3::ZERO)
            } else {
                (nodes.len() - 1, Vec3::new(-self.segment_length, 0.0, 0.0))
            };
            bones.push(nodes.len());
            nodes.push(NodeDef {
                name: spine_name(i),
                parent: Some(parent),
                transform: Transform::from_position(offset),
                kind: NodeDefKind::Bone,
            });
        }
        let rings = self.bone_count as u32 + 1;
        nodes.push(NodeDef {
            name: "body".into(),
            parent: Some(0),
            transform: Transform::default(),
            kind: NodeDefKind::SkinnedMesh {
                geometry: Geometry {
                    name: "fish_body".into(),
                    vertex_count: rings * 8,
                    index_count: (rings - 1) * 8 * 6,
                },
                material: Material {
                    name: "scales".into(),
                    base_color: [0.95, 0.55, 0.2, 1.0],
                },
                skeleton: 0,
            },
        });

        let clips = vec![
            self.wave_clip("swim", self.swim_period, self.swim_amplitude)?,
            self.wave_clip("idle", self.idle_period, self.swim_amplitude * 0.25)?,
        ];

        Ok(ModelFile {
            name: "fish".into(),
            nodes,
            skeletons: vec![SkeletonDef {
                bones,
                inverse_bind_matrices: None,
            }],
            clips,
        })
    }

    /// A travelling wave down the spine: amplitude grows toward the tail and
    /// each bone lags its parent by a fraction of the cycle.
    fn wave_clip(&self, name: &str, period: f32, amplitude: f32) -> Result<ClipDef, AssetError> {
        let n = self.bone_count as f32;
        let mut tracks = Vec::with_capacity(self.bone_count);
        for i in 0..self.bone_count {
            let weight = (i as f32 + 1.0) / n;
            let lag = i as f32 / n * 0.5;
            let times: Vec<f32> = (0..=KEYS_PER_CYCLE)
                .map(|k| period * k as f32 / KEYS_PER_CYCLE as f32)
                .collect();
            let values = (0..=KEYS_PER_CYCLE)
                .map(|k| {
                    let phase = (k as f32 / KEYS_PER_CYCLE as f32 - lag) * TAU;
                    Quat::from_rotation_y(amplitude * weight * phase.sin())
                })
                .collect();
            tracks.push(Track {
                node_name: spine_name(i),
                data: TrackData::Rotation(KeyframeTrack::new(times, values)?),
            });
        }
        Ok(ClipDef {
            name: name.into(),
            tracks,
        })
    }
}

fn spine_name(i: usize) -> String {
    format!("spine{i}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_scene::Scene;

    #[test]
    fn default_rig_shape() {
        let model = FishRig::default().model().unwrap();
        assert_eq!(model.nodes[0].name, "fish");
        // root + 4 bones + body
        assert_eq!(model.nodes.len(), 6);
        assert_eq!(model.skeletons[0].bones, vec![1, 2, 3, 4]);
        let names: Vec<_> = model.clips.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["swim", "idle"]);
    }

    #[test]
    fn clips_cover_one_period() {
        let rig = FishRig {
            swim_period: 2.0,
            ..FishRig::default()
        };
        let mut scene = Scene::new();
        let root = rig.model().unwrap().instantiate(&mut scene).unwrap();
        let swim = &scene.node(root).unwrap().animations[0];
        assert_eq!(swim.name, "swim");
        assert!((swim.duration - 2.0).abs() < 1e-6);
        assert_eq!(swim.tracks.len(), 4);
    }

    #[test]
    fn tail_swings_wider_than_head() {
        let model = FishRig::default().model().unwrap();
        let peak = |track: &Track| match &track.data {
            TrackData::Rotation(t) => t
                .values()
                .iter()
                .map(|q| q.to_euler(glam::EulerRot::YXZ).0.abs())
                .fold(0.0_f32, f32::max),
            _ => 0.0,
        };
        let swim = &model.clips[0];
        assert!(peak(&swim.tracks[3]) > peak(&swim.tracks[0]));
    }

    #[test]
    fn zero_bones_rejected() {
        let rig = FishRig {
            bone_count: 0,
            ..FishRig::default()
        };
        assert!(matches!(rig.model(), Err(AssetError::InvalidModel(_))));
    }
}
