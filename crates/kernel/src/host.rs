//! Frame hosts: whatever decides when the next frame happens.

use std::time::{Duration, Instant};

use crate::clock::ManualClock;

/// The frame-presentation primitive. `World::run` ticks once per granted
/// frame and stops the first time this returns `false`.
pub trait FrameHost {
    fn request_frame(&mut self) -> bool;

    /// Current drawable size, if the host has one.
    fn viewport(&self) -> Option<(u32, u32)> {
        None
    }
}

/// Real-time host that sleeps to hold a target frame rate.
#[derive(Debug)]
pub struct PacedHost {
    frame_time: Duration,
    limit: Option<u64>,
    granted: u64,
    last: Option<Instant>,
    viewport: (u32, u32),
}

impl PacedHost {
    /// `fps` of zero means unpaced. `limit` of `None` runs until the process ends.
    pub fn new(fps: u32, limit: Option<u64>) -> Self {
        let frame_time = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / f64::from(fps))
        };
        Self {
            frame_time,
            limit,
            granted: 0,
            last: None,
            viewport: (1280, 720),
        }
    }

    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = (width, height);
        self
    }

    pub fn frames_granted(&self) -> u64 {
        self.granted
    }
}

impl FrameHost for PacedHost {
    fn request_frame(&mut self) -> bool {
        if self.limit.is_some_and(|limit| self.granted >= limit) {
            return false;
        }
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.frame_time {
                std::thread::sleep(self.frame_time - elapsed);
            }
        }
        self.last = Some(Instant::now());
        self.granted += 1;
        true
    }

    fn viewport(&self) -> Option<(u32, u32)> {
        Some(self.viewport)
    }
}

/// Deterministic host: advances a [`ManualClock`] by a fixed step before
/// each of `frames` frames.
#[derive(Debug)]
pub struct SimulatedHost {
    clock: ManualClock,
    step: Duration,
    remaining: u64,
}

impl SimulatedHost {
    pub fn new(clock: ManualClock, step: Duration, frames: u64) -> Self {
        Self {
            clock,
            step,
            remaining: frames,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl FrameHost for SimulatedHost {
    fn request_frame(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.clock.advance(self.step);
        true
    }
}
