//! Vulkan abstraction layer for the Ember engine.
//!
//! Wraps instance and device setup, swapchain lifecycle, memory allocation,
//! descriptor management, pipeline construction, and synchronization in a
//! small API the renderer builds on. Raw `ash` handles stay visible at the
//! seams so callers can drop down to Vulkan directly when needed.

pub mod buffer;
pub mod command;
pub mod context;
pub mod deferred;
pub mod descriptors;
pub mod error;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use buffer::{GpuAllocator, GpuBuffer, GpuImage};
pub use context::{GpuContext, GpuContextBuilder};
pub use deferred::DeferredQueue;
pub use descriptors::{
    DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorWriter,
};
pub use error::{GpuError, Result};
pub use pipeline::{GraphicsPipeline, PipelineConfig};
pub use surface::SurfaceContext;
pub use swapchain::{Acquire, Swapchain};

// Re-export the crates whose types appear in this API.
pub use ash;
pub use gpu_allocator::MemoryLocation;
