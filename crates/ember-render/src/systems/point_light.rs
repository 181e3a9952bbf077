//! Point light billboard rendering.

use crate::frame::FrameContext;
use ash::vk;
use ember_gpu::{DescriptorSetLayout, GpuContext, GraphicsPipeline, PipelineConfig, Result};

/// Draws the point light as a camera-facing billboard.
///
/// The six billboard vertices are generated in the vertex shader from the
/// light position in the global uniform block, so the pipeline has no
/// vertex input at all.
pub struct PointLightSystem {
    pipeline: GraphicsPipeline,
}

impl PointLightSystem {
    /// Build the billboard pipeline against the given render pass.
    pub fn new(
        gpu: &GpuContext,
        render_pass: vk::RenderPass,
        global_layout: &DescriptorSetLayout,
        vertex_spirv: &[u32],
        fragment_spirv: &[u32],
    ) -> Result<Self> {
        let config = PipelineConfig {
            vertex_bindings: Vec::new(),
            vertex_attributes: Vec::new(),
            ..Default::default()
        };

        let pipeline = GraphicsPipeline::new(
            gpu.device(),
            &config,
            vertex_spirv,
            fragment_spirv,
            &[global_layout.handle()],
            &[],
            render_pass,
        )?;

        Ok(Self { pipeline })
    }

    /// Record the billboard draw.
    pub fn render(&self, gpu: &GpuContext, frame: &mut FrameContext) {
        let device = gpu.device();
        let cmd = frame.command_buffer;

        unsafe {
            self.pipeline.bind(device, cmd);
            device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout(),
                0,
                &[frame.global_descriptor_set],
                &[],
            );
            device.cmd_draw(cmd, 6, 1, 0, 0);
        }
    }

    /// Destroy the pipeline.
    ///
    /// # Safety
    /// No GPU work using this system may be in flight.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        self.pipeline.destroy(gpu.device());
    }
}
