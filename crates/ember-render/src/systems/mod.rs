//! Render systems.
//!
//! Each system owns one pipeline and knows how to draw its slice of the
//! scene from a [`FrameContext`](crate::FrameContext).

mod mesh;
mod point_light;

pub use mesh::{MeshPushConstants, MeshRenderSystem};
pub use point_light::PointLightSystem;
