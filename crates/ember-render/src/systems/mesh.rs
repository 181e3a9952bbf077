//! Opaque mesh rendering.

use crate::frame::FrameContext;
use crate::mesh::Vertex;
use ash::vk;
use bytemuck::{Pod, Zeroable};
use ember_gpu::{DescriptorSetLayout, GpuContext, GraphicsPipeline, PipelineConfig, Result};
use glam::Mat4;

/// Per-object data pushed to the mesh shaders.
///
/// The normal matrix is padded out to a mat4 to keep std430 alignment
/// trivial. 128 bytes total, the guaranteed push constant minimum.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MeshPushConstants {
    pub model: Mat4,
    pub normal: Mat4,
}

/// Draws every scene object that carries geometry.
pub struct MeshRenderSystem {
    pipeline: GraphicsPipeline,
}

impl MeshRenderSystem {
    /// Build the mesh pipeline against the given render pass.
    pub fn new(
        gpu: &GpuContext,
        render_pass: vk::RenderPass,
        global_layout: &DescriptorSetLayout,
        vertex_spirv: &[u32],
        fragment_spirv: &[u32],
    ) -> Result<Self> {
        let push_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(std::mem::size_of::<MeshPushConstants>() as u32);

        let config = PipelineConfig {
            vertex_bindings: Vertex::binding_descriptions(),
            vertex_attributes: Vertex::attribute_descriptions(),
            ..Default::default()
        };

        let pipeline = GraphicsPipeline::new(
            gpu.device(),
            &config,
            vertex_spirv,
            fragment_spirv,
            &[global_layout.handle()],
            &[push_range],
            render_pass,
        )?;

        Ok(Self { pipeline })
    }

    /// Record draws for all objects with geometry.
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
        }

        for (_, object) in frame.objects.iter() {
            let Some(geometry) = &object.geometry else {
                continue;
            };

            let push = MeshPushConstants {
                model: object.transform.mat4(),
                normal: Mat4::from_mat3(object.transform.normal_matrix()),
            };

            unsafe {
                gpu.device().cmd_push_constants(
                    cmd,
                    self.pipeline.layout(),
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                    0,
                    bytemuck::bytes_of(&push),
                );
            }

            geometry.bind(device, cmd);
            geometry.draw(device, cmd);
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_constants_fit_the_guaranteed_minimum() {
        assert_eq!(std::mem::size_of::<MeshPushConstants>(), 128);
    }
}
