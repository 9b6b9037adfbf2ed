use std::f32::consts::{FRAC_PI_2, TAU};
use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("{0} must be finite")]
    NotFinite(&'static str),
    #[error("left_bound {left} exceeds right_bound {right}")]
    InvertedBounds { left: f32, right: f32 },
    #[error("{0} must be non-negative")]
    Negative(&'static str),
    #[error("retarget_probability {0} is outside [0, 1]")]
    Probability(f64),
    #[error("destination_min must be below destination_max on both axes")]
    EmptyDestinationBox,
    #[error("retarget_interval_ms must be positive")]
    ZeroInterval,
}

/// Tunables for one fish. Every field has a default, so a config file may
/// name only what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FishParams {
    /// Yaw limit when turning toward +X, radians.
    pub right_bound: f32,
    /// Yaw limit when turning toward -X, radians.
    pub left_bound: f32,
    /// Radians per second at unit velocity.
    pub turn_rate: f32,
    pub velocity: f32,
    pub initial_yaw: f32,
    /// Uniform scale applied to the clone.
    pub scale: f32,
    /// Destinations are drawn from `[min, max)` on X and Y.
    pub destination_min: Vec2,
    pub destination_max: Vec2,
    pub retarget_interval_ms: u64,
    /// Chance a retarget tick actually picks a new destination.
    pub retarget_probability: f64,
    /// Cap each translation step so the fish never passes its destination.
    pub clamp_overshoot: bool,
    /// Seconds spent blending between clips.
    pub cross_fade: f32,
    /// Clip started on spawn, if any.
    pub clip: Option<String>,
}

impl Default for FishParams {
    fn default() -> Self {
        Self {
            right_bound: FRAC_PI_2,
            left_bound: -FRAC_PI_2,
            turn_rate: TAU,
            velocity: 1.0,
            initial_yaw: FRAC_PI_2,
            scale: 0.1,
            destination_min: Vec2::ZERO,
            destination_max: Vec2::splat(10.0),
            retarget_interval_ms: 2500,
            retarget_probability: 1.0,
            clamp_overshoot: false,
            cross_fade: 0.5,
            clip: Some("swim".into()),
        }
    }
}

impl FishParams {
    pub fn retarget_interval(&self) -> Duration {
        Duration::from_millis(self.retarget_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        let scalars = [
            ("right_bound", self.right_bound),
            ("left_bound", self.left_bound),
            ("turn_rate", self.turn_rate),
            ("velocity", self.velocity),
            ("initial_yaw", self.initial_yaw),
            ("scale", self.scale),
            ("cross_fade", self.cross_fade),
        ];
        if let Some((field, _)) = scalars.into_iter().find(|(_, v)| !v.is_finite()) {
            return Err(ParamsError::NotFinite(field));
        }
        if !self.destination_min.is_finite() {
            return Err(ParamsError::NotFinite("destination_min"));
        }
        if !self.destination_max.is_finite() {
            return Err(ParamsError::NotFinite("destination_max"));
        }
        if self.left_bound > self.right_bound {
            return Err(ParamsError::InvertedBounds {
                left: self.left_bound,
                right: self.right_bound,
            });
        }
        for (field, value) in [
            ("velocity", self.velocity),
            ("turn_rate", self.turn_rate),
            ("cross_fade", self.cross_fade),
        ] {
            if value < 0.0 {
                return Err(ParamsError::Negative(field));
            }
        }
        if !(0.0..=1.0).contains(&self.retarget_probability) {
            return Err(ParamsError::Probability(self.retarget_probability));
        }
        if self.destination_min.cmpge(self.destination_max).any() {
            return Err(ParamsError::EmptyDestinationBox);
        }
        if self.retarget_interval_ms == 0 {
            return Err(ParamsError::ZeroInterval);
        }
        Ok(())
    }
}
