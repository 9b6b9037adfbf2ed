use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Errors from building keyframe data.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("track has {times} key times but {values} values")]
    LengthMismatch { times: usize, values: usize },
    #[error("key times must be non-decreasing (index {0})")]
    Unsorted(usize),
}

/// Values that can be blended between two keyframes.
pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }
}

/// Key times (seconds) with one value per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeTrack<T> {
    times: Vec<f32>,
    values: Vec<T>,
}

impl<T: Interpolate> KeyframeTrack<T> {
    pub fn new(times: Vec<f32>, values: Vec<T>) -> Result<Self, ClipError> {
        let track = Self { times, values };
        track.validate()?;
        Ok(track)
    }

    /// Check the invariants `new` enforces; used after deserializing.
    pub fn validate(&self) -> Result<(), ClipError> {
        if self.times.len() != self.values.len() {
            return Err(ClipError::LengthMismatch {
                times: self.times.len(),
                values: self.values.len(),
            });
        }
        if let Some(i) = self.times.windows(2).position(|w| w[1] < w[0]) {
            return Err(ClipError::Unsorted(i + 1));
        }
        Ok(())
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Time of the last key, or zero for an empty track.
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Sample at `time`. Holds the first/last value outside the key range.
    pub fn sample(&self, time: f32) -> Option<T> {
        let (first, last) = (self.values.first()?, self.values.last()?);
        if time <= self.times[0] {
            return Some(*first);
        }
        if time >= self.end_time() {
            return Some(*last);
        }
        let next = self.times.partition_point(|&k| k <= time);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        if span <= f32::EPSILON {
            return Some(self.values[next]);
        }
        let t = (time - self.times[prev]) / span;
        Some(T::interpolate(self.values[prev], self.values[next], t))
    }
}

/// Which transform channel a track drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackData {
    Translation(KeyframeTrack<Vec3>),
    Rotation(KeyframeTrack<Quat>),
    Scale(KeyframeTrack<Vec3>),
}

impl TrackData {
    pub fn validate(&self) -> Result<(), ClipError> {
        match self {
            Self::Translation(t) | Self::Scale(t) => t.validate(),
            Self::Rotation(t) => t.validate(),
        }
    }

    fn end_time(&self) -> f32 {
        match self {
            Self::Translation(t) | Self::Scale(t) => t.end_time(),
            Self::Rotation(t) => t.end_time(),
        }
    }
}

/// A track bound to a node by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub node_name: String,
    pub data: TrackData,
}

/// Named set of tracks. Duration is the latest key time across tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<Track>) -> Self {
        let duration = tracks
            .iter()
            .map(|t| t.data.end_time())
            .fold(0.0_f32, f32::max);
        Self {
            name: name.into(),
            duration,
            tracks,
        }
    }
}
