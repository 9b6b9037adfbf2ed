//! World kernel: the frame scheduler that drives a scene.
//!
//! # Invariants
//! - One tick runs, in order: load settling, due interval timers, animation
//!   mixers, frame observers, then rendering (only if a camera is set).
//! - Registration order is invocation order for observers, mixers, timers
//!   and load callbacks.
//! - Everything runs on the loop thread; nothing here is `Send`.
//! - A failing or panicking observer never stops the loop.

pub mod clock;
pub mod host;
mod timer;
pub mod world;

pub use clock::{Clock, ManualClock, SystemClock};
pub use host::{FrameHost, PacedHost, SimulatedHost};
pub use timer::TimerHandle;
pub use world::{
    LoadFailure, MixerHandle, ObserverHandle, ObserverResult, Template, TickReport, World,
};
