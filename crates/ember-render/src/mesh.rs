//! GPU mesh storage.
//!
//! Vertex and index data are uploaded once through a staging buffer into
//! device-local memory. Meshes are shared between scene objects behind an
//! `Arc`, so the same geometry can appear many times without re-upload.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use ember_gpu::command::execute_single_time_commands;
use ember_gpu::{GpuBuffer, GpuContext, GpuError, MemoryLocation, Result};
use ember_scene::Geometry;
use glam::{Vec2, Vec3};
use std::mem::offset_of;

/// One vertex as consumed by the mesh pipeline.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Vertex {
    /// Vertex buffer binding description for the mesh pipeline.
    pub fn binding_descriptions() -> Vec<vk::VertexInputBindingDescription> {
        vec![vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)]
    }

    /// Attribute descriptions matching the mesh vertex shader inputs.
    pub fn attribute_descriptions() -> Vec<vk::VertexInputAttributeDescription> {
        vec![
            vk::VertexInputAttributeDescription::default()
                .location(0)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Vertex, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(1)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Vertex, color) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(2)
                .binding(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Vertex, normal) as u32),
            vk::VertexInputAttributeDescription::default()
                .location(3)
                .binding(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(offset_of!(Vertex, uv) as u32),
        ]
    }
}

/// CPU-side mesh data, ready for upload.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    /// Empty means non-indexed drawing.
    pub indices: Vec<u32>,
}

/// Device-local vertex and index buffers.
pub struct Mesh {
    vertex_buffer: GpuBuffer,
    index_buffer: Option<GpuBuffer>,
    vertex_count: u32,
    index_count: u32,
}

impl Mesh {
    /// Upload mesh data to device-local memory.
    pub fn new(gpu: &GpuContext, data: &MeshData) -> Result<Self> {
        if data.vertices.len() < 3 {
            return Err(GpuError::InvalidState(
                "Mesh needs at least 3 vertices".to_string(),
            ));
        }

        let vertex_buffer = upload_device_local(
            gpu,
            bytemuck::cast_slice(&data.vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
            "mesh vertices",
        )?;

        let index_buffer = if data.indices.is_empty() {
            None
        } else {
            Some(upload_device_local(
                gpu,
                bytemuck::cast_slice(&data.indices),
                vk::BufferUsageFlags::INDEX_BUFFER,
                "mesh indices",
            )?)
        };

        Ok(Self {
            vertex_buffer,
            index_buffer,
            vertex_count: data.vertices.len() as u32,
            index_count: data.indices.len() as u32,
        })
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Number of indices; zero for non-indexed meshes.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Free the mesh buffers immediately.
    ///
    /// Only valid once no in-flight frame references them; otherwise retire
    /// the buffers through the renderer's deferred queue.
    pub fn destroy(mut self, gpu: &GpuContext) -> Result<()> {
        let mut allocator = gpu.allocator().lock();
        allocator.free_buffer(&mut self.vertex_buffer)?;
        if let Some(mut index_buffer) = self.index_buffer.take() {
            allocator.free_buffer(&mut index_buffer)?;
        }
        Ok(())
    }

    /// Take ownership of the underlying buffers, for deferred retirement.
    pub fn into_buffers(self) -> (GpuBuffer, Option<GpuBuffer>) {
        (self.vertex_buffer, self.index_buffer)
    }
}

impl Geometry for Mesh {
    fn bind(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe {
            device.cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);
            if let Some(index_buffer) = &self.index_buffer {
                device.cmd_bind_index_buffer(cmd, index_buffer.buffer, 0, vk::IndexType::UINT32);
            }
        }
    }

    fn draw(&self, device: &ash::Device, cmd: vk::CommandBuffer) {
        unsafe {
            if self.index_buffer.is_some() {
                device.cmd_draw_indexed(cmd, self.index_count, 1, 0, 0, 0);
            } else {
                device.cmd_draw(cmd, self.vertex_count, 1, 0, 0);
            }
        }
    }
}

/// Copy `bytes` into a new device-local buffer via a staging buffer.
fn upload_device_local(
    gpu: &GpuContext,
    bytes: &[u8],
    usage: vk::BufferUsageFlags,
    name: &str,
) -> Result<GpuBuffer> {
    let size = bytes.len() as u64;

    let mut staging = gpu.allocator().lock().create_buffer(
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        MemoryLocation::CpuToGpu,
        "staging",
    )?;
    staging.write_bytes(0, bytes)?;

    let buffer = gpu.allocator().lock().create_buffer(
        size,
        usage | vk::BufferUsageFlags::TRANSFER_DST,
        MemoryLocation::GpuOnly,
        name,
    )?;

    execute_single_time_commands(gpu, |device, cmd| {
        let region = vk::BufferCopy::default().size(size);
        unsafe {
            device.cmd_copy_buffer(cmd, staging.buffer, buffer.buffer, &[region]);
        }
    })?;

    gpu.allocator().lock().free_buffer(&mut staging)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_stride_has_no_padding() {
        assert_eq!(std::mem::size_of::<Vertex>(), 11 * 4);
    }

    #[test]
    fn attribute_offsets_are_sequential() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(attrs[3].offset, 36);
    }
}
