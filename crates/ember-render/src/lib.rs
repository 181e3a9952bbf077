//! Rendering layer for the Ember engine.
//!
//! Sits between the GPU abstraction and the application: the [`Renderer`]
//! schedules frames through a fixed number of slots, [`FramePacer`] holds
//! the device-free lifecycle state, and render systems turn scene objects
//! into draw calls.

pub mod frame;
pub mod mesh;
pub mod pacing;
pub mod renderer;
pub mod systems;
pub mod ubo;

pub use frame::FrameContext;
pub use mesh::{Mesh, MeshData, Vertex};
pub use pacing::{await_valid_extent, FramePacer};
pub use renderer::{Renderer, RetiredResource};
pub use ubo::GlobalUbo;

/// Number of frames the CPU may record ahead of the GPU.
///
/// Fixed at two: one frame recording while one is in flight. Independent of
/// the swapchain image count, which the driver chooses.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
