//! Per-frame render context.

use ash::vk;
use ember_scene::{Camera, SceneObjectMap};

/// Everything a render system needs for one frame.
///
/// Built by the application between `begin_frame` and `end_frame` and handed
/// to each system in turn.
pub struct FrameContext<'a> {
    /// The frame slot index, for indexing per-slot resources.
    pub frame_index: usize,
    /// Seconds since the previous frame.
    pub frame_time: f32,
    /// The command buffer being recorded this frame.
    pub command_buffer: vk::CommandBuffer,
    pub camera: &'a Camera,
    /// Descriptor set with the global uniform data, bound at set 0.
    pub global_descriptor_set: vk::DescriptorSet,
    pub objects: &'a mut SceneObjectMap,
}
