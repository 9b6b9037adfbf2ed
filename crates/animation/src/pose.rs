use std::collections::BTreeMap;

use glam::{Quat, Vec3};

/// Weighted accumulation for one channel of one node.
#[derive(Debug, Clone, Copy)]
struct Blend<T> {
    value: T,
    weight: f32,
}

/// Blended transform channels for one node. `None` means no track drove it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseChannels {
    translation: Option<Blend<Vec3>>,
    rotation: Option<Blend<Quat>>,
    scale: Option<Blend<Vec3>>,
}

impl PoseChannels {
    pub fn translation(&self) -> Option<Vec3> {
        self.translation.map(|b| b.value / b.weight)
    }

    pub fn rotation(&self) -> Option<Quat> {
        self.rotation.map(|b| b.value.normalize())
    }

    pub fn scale(&self) -> Option<Vec3> {
        self.scale.map(|b| b.value / b.weight)
    }
}

fn add_vec3(slot: &mut Option<Blend<Vec3>>, value: Vec3, weight: f32) {
    match slot {
        Some(b) => {
            b.value += value * weight;
            b.weight += weight;
        }
        None => *slot = Some(Blend { value: value * weight, weight }),
    }
}

/// Output of one mixer update: the blended pose keyed by node name.
#[derive(Debug, Clone, Default)]
pub struct Pose {
    channels: BTreeMap<String, PoseChannels>,
}

impl Pose {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn get(&self, node_name: &str) -> Option<&PoseChannels> {
        self.channels.get(node_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PoseChannels)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn add_translation(&mut self, node_name: &str, value: Vec3, weight: f32) {
        if weight <= 0.0 {
            return;
        }
        add_vec3(&mut self.entry(node_name).translation, value, weight);
    }

    pub fn add_scale(&mut self, node_name: &str, value: Vec3, weight: f32) {
        if weight <= 0.0 {
            return;
        }
        add_vec3(&mut self.entry(node_name).scale, value, weight);
    }

    /// Rotations blend by a running slerp weighted by each contribution's
    /// share of the accumulated weight.
    pub fn add_rotation(&mut self, node_name: &str, value: Quat, weight: f32) {
        if weight <= 0.0 {
            return;
        }
        let slot = &mut self.entry(node_name).rotation;
        match slot {
            Some(b) => {
                let total = b.weight + weight;
                b.value = b.value.slerp(value, weight / total);
                b.weight = total;
            }
            None => *slot = Some(Blend { value, weight }),
        }
    }

    fn entry(&mut self, node_name: &str) -> &mut PoseChannels {
        self.channels.entry(node_name.to_string()).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_contribution_is_exact() {
        let mut pose = Pose::new();
        pose.add_translation("a", Vec3::new(1.0, 2.0, 3.0), 0.5);
        assert_eq!(pose.get("a").unwrap().translation(), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(pose.get("a").unwrap().rotation(), None);
    }

    #[test]
    fn translations_average_by_weight() {
        let mut pose = Pose::new();
        pose.add_translation("a", Vec3::ZERO, 1.0);
        pose.add_translation("a", Vec3::new(4.0, 0.0, 0.0), 3.0);
        let t = pose.get("a").unwrap().translation().unwrap();
        assert!((t.x - 3.0).abs() < 1e-6);
    }

    #[test]
    fn equal_rotations_blend_halfway() {
        let mut pose = Pose::new();
        pose.add_rotation("a", Quat::IDENTITY, 0.5);
        pose.add_rotation("a", Quat::from_rotation_z(1.0), 0.5);
        let r = pose.get("a").unwrap().rotation().unwrap();
        assert!(r.abs_diff_eq(Quat::from_rotation_z(0.5), 1e-5));
    }

    #[test]
    fn zero_weight_is_ignored() {
        let mut pose = Pose::new();
        pose.add_scale("a", Vec3::ONE, 0.0);
        assert!(pose.is_empty());
    }
}
