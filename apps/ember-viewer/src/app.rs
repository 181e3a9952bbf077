//! Viewer application: a lit cube and floor under an orbiting point light.

use anyhow::Context as _;
use ash::vk;
use ember_app::{AppContext, EmberApp};
use ember_gpu::shader::load_spirv;
use ember_gpu::{
    DescriptorPool, DescriptorSetLayout, DescriptorWriter, GpuBuffer, MemoryLocation,
};
use ember_render::systems::{MeshRenderSystem, PointLightSystem};
use ember_render::{FrameContext, GlobalUbo, Mesh, MeshData, Vertex, MAX_FRAMES_IN_FLIGHT};
use ember_scene::{Camera, SceneObject, SceneObjectId, SceneObjectMap};
use glam::{Vec2, Vec3, Vec4};
use std::path::PathBuf;
use std::sync::Arc;

pub struct Viewer {
    global_layout: DescriptorSetLayout,
    global_pool: DescriptorPool,
    ubo_buffers: Vec<GpuBuffer>,
    global_sets: Vec<vk::DescriptorSet>,

    mesh_system: MeshRenderSystem,
    point_light_system: PointLightSystem,

    camera: Camera,
    objects: SceneObjectMap,
    meshes: Vec<Arc<Mesh>>,
    cube_id: SceneObjectId,
    elapsed: f32,
}

fn shader_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("shaders")
        .join(name)
}

impl EmberApp for Viewer {
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self> {
        let device = ctx.gpu.device();

        let global_layout = DescriptorSetLayout::builder()
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::ALL_GRAPHICS,
                1,
            )
            .build(device)?;

        let global_pool = DescriptorPool::builder()
            .max_sets(MAX_FRAMES_IN_FLIGHT as u32)
            .add_pool_size(
                vk::DescriptorType::UNIFORM_BUFFER,
                MAX_FRAMES_IN_FLIGHT as u32,
            )
            .build(device)?;

        // One uniform buffer and descriptor set per frame slot, so a frame
        // being recorded never touches the buffer a submitted frame reads.
        let mut ubo_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        let mut global_sets = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let buffer = ctx.gpu.allocator().lock().create_buffer(
                std::mem::size_of::<GlobalUbo>() as u64,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                MemoryLocation::CpuToGpu,
                "global ubo",
            )?;

            let set = DescriptorWriter::new(&global_layout)
                .write_buffer(0, buffer.descriptor_info())
                .build(device, &global_pool)?
                .context("global descriptor pool exhausted at startup")?;

            ubo_buffers.push(buffer);
            global_sets.push(set);
        }

        let mesh_system = MeshRenderSystem::new(
            &ctx.gpu,
            ctx.renderer.render_pass(),
            &global_layout,
            &load_spirv(shader_path("mesh.vert.spv"))?,
            &load_spirv(shader_path("mesh.frag.spv"))?,
        )?;
        let point_light_system = PointLightSystem::new(
            &ctx.gpu,
            ctx.renderer.render_pass(),
            &global_layout,
            &load_spirv(shader_path("point_light.vert.spv"))?,
            &load_spirv(shader_path("point_light.frag.spv"))?,
        )?;

        let cube = Arc::new(Mesh::new(&ctx.gpu, &cube_mesh())?);
        let floor = Arc::new(Mesh::new(&ctx.gpu, &quad_mesh())?);

        let mut objects = SceneObjectMap::new();

        let mut cube_object = SceneObject::with_geometry(cube.clone());
        cube_object.transform.translation = Vec3::new(0.0, 0.0, 2.5);
        cube_object.transform.scale = Vec3::splat(0.5);
        let cube_id = objects.insert(cube_object);

        let mut floor_object = SceneObject::with_geometry(floor.clone());
        floor_object.transform.translation = Vec3::new(0.0, 0.5, 2.5);
        floor_object.transform.scale = Vec3::new(3.0, 1.0, 3.0);
        objects.insert(floor_object);

        tracing::info!(objects = objects.len(), "Scene loaded");

        Ok(Self {
            global_layout,
            global_pool,
            ubo_buffers,
            global_sets,
            mesh_system,
            point_light_system,
            camera: Camera::default(),
            objects,
            meshes: vec![cube, floor],
            cube_id,
            elapsed: 0.0,
        })
    }

    fn update(&mut self, _ctx: &AppContext, dt: f32) {
        self.elapsed += dt;

        if let Some(cube) = self.objects.get_mut(self.cube_id) {
            cube.transform.rotation.y += dt * 0.5;
            cube.transform.rotation.x += dt * 0.25;
        }
    }

    fn render(
        &mut self,
        ctx: &mut AppContext,
        cmd: vk::CommandBuffer,
        dt: f32,
    ) -> anyhow::Result<()> {
        let frame_index = ctx.renderer.frame_index();

        self.camera.set_perspective_projection(
            50f32.to_radians(),
            ctx.renderer.aspect_ratio(),
            0.1,
            100.0,
        );
        self.camera.set_view_target(
            Vec3::new(0.0, -1.0, -1.0),
            Vec3::new(0.0, 0.0, 2.5),
            -Vec3::Y,
        );

        let angle = self.elapsed * 0.8;
        let light_position = Vec3::new(angle.cos() * 1.5, -1.0, 2.5 + angle.sin() * 1.5);

        let ubo = GlobalUbo {
            projection: self.camera.projection(),
            view: self.camera.view(),
            light_position: Vec4::new(light_position.x, light_position.y, light_position.z, 0.0),
            ..Default::default()
        };

        let buffer = &self.ubo_buffers[frame_index];
        buffer.write(&[ubo])?;
        unsafe {
            // SAFETY: the buffer is host-visible and the device is alive.
            buffer.flush(ctx.gpu.device())?;
        }

        ctx.renderer.begin_render_pass(&ctx.gpu, cmd);

        let mut frame = FrameContext {
            frame_index,
            frame_time: dt,
            command_buffer: cmd,
            camera: &self.camera,
            global_descriptor_set: self.global_sets[frame_index],
            objects: &mut self.objects,
        };

        self.mesh_system.render(&ctx.gpu, &mut frame);
        self.point_light_system.render(&ctx.gpu, &mut frame);

        ctx.renderer.end_render_pass(&ctx.gpu, cmd);

        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut AppContext) {
        let device = ctx.gpu.device();

        unsafe {
            // SAFETY: the runner waited for device idle before cleanup.
            self.mesh_system.destroy(&ctx.gpu);
            self.point_light_system.destroy(&ctx.gpu);
            self.global_pool.destroy(device);
            self.global_layout.destroy(device);
        }

        {
            let mut allocator = ctx.gpu.allocator().lock();
            for mut buffer in self.ubo_buffers.drain(..) {
                if let Err(e) = allocator.free_buffer(&mut buffer) {
                    tracing::error!("Failed to free uniform buffer: {e}");
                }
            }
        }

        // Drop the scene's references so the meshes can be reclaimed.
        self.objects = SceneObjectMap::new();
        for mesh in self.meshes.drain(..) {
            match Arc::try_unwrap(mesh) {
                Ok(mesh) => {
                    if let Err(e) = mesh.destroy(&ctx.gpu) {
                        tracing::error!("Failed to destroy mesh: {e}");
                    }
                }
                Err(_) => tracing::error!("Mesh still referenced at cleanup"),
            }
        }
    }
}

/// A unit cube centered at the origin, one flat color per face.
fn cube_mesh() -> MeshData {
    let mut data = MeshData::default();

    let faces: [(Vec3, Vec3, Vec3, Vec3); 6] = [
        // (normal, right, up, color) per face
        (
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.9, 0.9, 0.9),
        ),
        (
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.8, 0.8, 0.1),
        ),
        (
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.9, 0.6, 0.1),
        ),
        (
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.8, 0.1, 0.1),
        ),
        (
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.1, 0.1, 0.8),
        ),
        (
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.1, 0.8, 0.1),
        ),
    ];

    for (normal, right, up, color) in faces {
        let base = data.vertices.len() as u32;
        let center = normal * 0.5;
        for (ru, uu) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            data.vertices.push(Vertex {
                position: center + right * ru + up * uu,
                color,
                normal,
                uv: Vec2::new(ru + 0.5, uu + 0.5),
            });
        }
        data.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    data
}

/// A unit quad in the XZ plane, facing up (negative Y).
fn quad_mesh() -> MeshData {
    let color = Vec3::new(0.5, 0.5, 0.5);
    let normal = Vec3::new(0.0, -1.0, 0.0);
    MeshData {
        vertices: vec![
            Vertex {
                position: Vec3::new(-0.5, 0.0, -0.5),
                color,
                normal,
                uv: Vec2::new(0.0, 0.0),
            },
            Vertex {
                position: Vec3::new(0.5, 0.0, -0.5),
                color,
                normal,
                uv: Vec2::new(1.0, 0.0),
            },
            Vertex {
                position: Vec3::new(0.5, 0.0, 0.5),
                color,
                normal,
                uv: Vec2::new(1.0, 1.0),
            },
            Vertex {
                position: Vec3::new(-0.5, 0.0, 0.5),
                color,
                normal,
                uv: Vec2::new(0.0, 1.0),
            },
        ],
        indices: vec![0, 2, 1, 0, 3, 2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_six_indexed_faces() {
        let cube = cube_mesh();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));
    }

    #[test]
    fn cube_normals_are_unit_axes() {
        let cube = cube_mesh();
        for vertex in &cube.vertices {
            assert!((vertex.normal.length() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn quad_faces_up() {
        let quad = quad_mesh();
        assert_eq!(quad.vertices.len(), 4);
        assert!(quad.vertices.iter().all(|v| v.normal.y < 0.0));
    }
}
