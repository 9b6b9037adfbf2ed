use std::sync::Arc;

use shoal_common::NodeId;

use crate::action::AnimationAction;
use crate::clip::{AnimationClip, TrackData};
use crate::pose::Pose;

/// Index of an action inside its mixer. Stable for the mixer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(usize);

/// Drives the actions of one animated hierarchy.
///
/// Track node names are resolved against the subtree under `root` by the
/// scene when it applies the returned [`Pose`].
#[derive(Debug)]
pub struct AnimationMixer {
    root: NodeId,
    actions: Vec<AnimationAction>,
    time: f32,
}

impl AnimationMixer {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            actions: Vec::new(),
            time: 0.0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total time this mixer has been advanced.
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// The action for `clip`, created on first request.
    pub fn clip_action(&mut self, clip: &Arc<AnimationClip>) -> ActionId {
        if let Some(id) = self.existing_action(&clip.name) {
            return id;
        }
        self.actions.push(AnimationAction::new(Arc::clone(clip)));
        tracing::debug!(clip = %clip.name, root = %self.root.short(), "created animation action");
        ActionId(self.actions.len() - 1)
    }

    pub fn existing_action(&self, clip_name: &str) -> Option<ActionId> {
        self.actions
            .iter()
            .position(|a| a.clip().name == clip_name)
            .map(ActionId)
    }

    pub fn action(&self, id: ActionId) -> Option<&AnimationAction> {
        self.actions.get(id.0)
    }

    pub fn action_mut(&mut self, id: ActionId) -> Option<&mut AnimationAction> {
        self.actions.get_mut(id.0)
    }

    pub fn play(&mut self, id: ActionId) -> bool {
        match self.actions.get_mut(id.0) {
            Some(action) => {
                action.play();
                true
            }
            None => false,
        }
    }

    /// Fade `from` out and `to` in over `duration` seconds, starting `to`.
    pub fn cross_fade_from(&mut self, to: ActionId, from: ActionId, duration: f32) -> bool {
        if to.0 >= self.actions.len() || from.0 >= self.actions.len() {
            return false;
        }
        if to != from {
            self.actions[from.0].fade_out(duration);
            self.actions[to.0].fade_in(duration);
        }
        self.actions[to.0].play();
        true
    }

    pub fn stop_all_action(&mut self) {
        for action in &mut self.actions {
            action.stop();
        }
    }

    pub fn running_actions(&self) -> impl Iterator<Item = &AnimationAction> {
        self.actions.iter().filter(|a| a.is_running())
    }

    /// Advance all actions by `dt` and sample the blended pose.
    pub fn update(&mut self, dt: f32) -> Pose {
        self.time += dt;
        for action in &mut self.actions {
            action.update(dt);
        }

        let mut pose = Pose::new();
        for action in &self.actions {
            let weight = action.effective_weight();
            if weight <= 0.0 {
                continue;
            }
            for track in &action.clip().tracks {
                let name = track.node_name.as_str();
                match &track.data {
                    TrackData::Translation(t) => {
                        if let Some(v) = t.sample(action.time) {
                            pose.add_translation(name, v, weight);
                        }
                    }
                    TrackData::Rotation(t) => {
                        if let Some(v) = t.sample(action.time) {
                            pose.add_rotation(name, v, weight);
                        }
                    }
                    TrackData::Scale(t) => {
                        if let Some(v) = t.sample(action.time) {
                            pose.add_scale(name, v, weight);
                        }
                    }
                }
            }
        }
        pose
    }
}
