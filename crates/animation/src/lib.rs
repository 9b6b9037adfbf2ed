//! Animation: keyframe clips, playable actions, and a mixer that blends them.
//!
//! # Invariants
//! - Clips are immutable once built and shared by `Arc`.
//! - The mixer never touches the scene; it produces a `Pose` keyed by node
//!   name and the scene applies it.
//! - Blending is weighted by each action's effective (faded) weight.

mod action;
mod clip;
mod mixer;
mod pose;

pub use action::{AnimationAction, LoopMode};
pub use clip::{AnimationClip, ClipError, Interpolate, KeyframeTrack, Track, TrackData};
pub use mixer::{ActionId, AnimationMixer};
pub use pose::{Pose, PoseChannels};
