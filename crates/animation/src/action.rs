use std::sync::Arc;

use crate::clip::AnimationClip;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoopMode {
    Once,
    Loop,
    PingPong,
}

/// Linear weight envelope used for fade-in/fade-out.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

impl Fade {
    fn factor(&self) -> f32 {
        if self.duration <= 0.0 {
            return self.to;
        }
        let t = (self.elapsed / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }

    fn finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Playback state of one clip on one mixer.
#[derive(Debug, Clone)]
pub struct AnimationAction {
    clip: Arc<AnimationClip>,

    pub time: f32,
    pub time_scale: f32,
    pub weight: f32,
    pub loop_mode: LoopMode,
    pub paused: bool,
    pub enabled: bool,

    running: bool,
    fade_factor: f32,
    fade: Option<Fade>,
}

impl AnimationAction {
    pub fn new(clip: Arc<AnimationClip>) -> Self {
        Self {
            clip,
            time: 0.0,
            time_scale: 1.0,
            weight: 1.0,
            loop_mode: LoopMode::Loop,
            paused: false,
            enabled: true,
            running: false,
            fade_factor: 1.0,
            fade: None,
        }
    }

    pub fn clip(&self) -> &Arc<AnimationClip> {
        &self.clip
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Start (or resume) playback. Does not rewind.
    pub fn play(&mut self) {
        self.running = true;
        self.enabled = true;
        self.paused = false;
    }

    /// Stop playback, rewind, and drop any pending fade.
    pub fn stop(&mut self) {
        self.running = false;
        self.time = 0.0;
        self.fade = None;
        self.fade_factor = 1.0;
    }

    pub fn fade_in(&mut self, duration: f32) {
        self.schedule_fade(0.0, 1.0, duration);
    }

    pub fn fade_out(&mut self, duration: f32) {
        self.schedule_fade(self.fade_factor, 0.0, duration);
    }

    fn schedule_fade(&mut self, from: f32, to: f32, duration: f32) {
        let fade = Fade {
            from,
            to,
            elapsed: 0.0,
            duration: duration.max(0.0),
        };
        self.fade_factor = fade.factor();
        self.fade = Some(fade);
    }

    /// Weight this action contributes to the blended pose right now.
    pub fn effective_weight(&self) -> f32 {
        if !self.running || !self.enabled {
            return 0.0;
        }
        self.weight * self.fade_factor
    }

    /// Advance the local clock and any fade by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if !self.running || !self.enabled {
            return;
        }

        if let Some(fade) = self.fade.as_mut() {
            fade.elapsed += dt;
            self.fade_factor = fade.factor();
            if fade.finished() {
                let faded_out = fade.to <= 0.0;
                self.fade = None;
                if faded_out {
                    self.stop();
                    return;
                }
            }
        }

        if self.paused {
            return;
        }

        let duration = self.clip.duration;
        if duration <= 0.0 {
            return;
        }

        self.time += dt * self.time_scale;

        match self.loop_mode {
            LoopMode::Once => {
                if self.time >= duration {
                    self.time = duration;
                    self.paused = true;
                } else if self.time < 0.0 {
                    self.time = 0.0;
                    self.paused = true;
                }
            }
            LoopMode::Loop => {
                self.time = self.time.rem_euclid(duration);
            }
            LoopMode::PingPong => {
                let cycle = duration * 2.0;
                let t = self.time.rem_euclid(cycle);
                self.time = if t > duration { cycle - t } else { t };
            }
        }
    }
}
