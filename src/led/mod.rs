//! LED animation engine.
//!
//! Maps each display state (plus continuous progress/temperature values)
//! into one colour-per-pixel frame per tick:
//!
//! ```text
//!   StatusSnapshot ──▶ LedRenderer::render() ──▶ Frame ──▶ strip sink
//!                         │
//!                         ├── per-state effects (head, breathing, waves)
//!                         ├── AnimationContext (phases, anchors, PRNG)
//!                         └── single-slot capture / resume / lights toggle
//! ```
//!
//! The renderer is owned by the render loop and never shared; all timing
//! comes in as caller-supplied milliseconds so effects are testable with a
//! fixed clock.

pub mod animations;
pub mod capture;
pub mod context;
pub mod frame;

pub use animations::{LedRenderer, LightsCommit, RenderOutcome};
pub use context::AnimationContext;
pub use frame::Frame;
