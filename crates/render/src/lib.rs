//! Rendering Adapter: renderer-agnostic interface.
//!
//! # Invariants
//! - Renderers read the scene; they never mutate it.
//! - Only nodes attached below the scene root and visible are drawn.
//!
//! Backends here are headless: `HeadlessRenderer` does the per-frame
//! skinning math a GPU backend would upload, `DebugTextRenderer` dumps the
//! visible scene as text. A GPU backend implements the same trait.

mod renderer;

pub use renderer::{DebugTextRenderer, FrameSummary, HeadlessRenderer, Renderer};
