//! Frame lifecycle orchestration.
//!
//! The renderer owns the swapchain, the per-slot synchronization objects,
//! and the begin/end frame protocol. Callers get a command buffer from
//! [`Renderer::begin_frame`], record into it between
//! [`Renderer::begin_render_pass`] and [`Renderer::end_render_pass`], and
//! hand it back through [`Renderer::end_frame`], which submits and presents.

use crate::pacing::{await_valid_extent, FramePacer};
use crate::MAX_FRAMES_IN_FLIGHT;
use ash::vk;
use ember_gpu::command::allocate_command_buffers;
use ember_gpu::sync::{create_fence, create_semaphore, reset_fence, wait_for_fence};
use ember_gpu::{
    DeferredQueue, DescriptorPool, GpuBuffer, GpuContext, GpuImage, Result, SurfaceContext,
    Swapchain,
};

/// A GPU resource retired while possibly still referenced by in-flight work.
pub enum RetiredResource {
    Buffer(GpuBuffer),
    Image(GpuImage),
}

/// Per-slot resources for one frame in flight.
struct FrameSlot {
    command_buffer: vk::CommandBuffer,
    /// Signaled when the acquired swapchain image is ready to be written.
    image_acquired: vk::Semaphore,
    /// Signaled when this slot's submission finishes; present waits on it.
    render_finished: vk::Semaphore,
    /// Signaled when this slot's submission completes on the GPU. Created
    /// signaled so the first wait passes.
    in_flight: vk::Fence,
    /// Pool for descriptor sets that live only as long as this slot's frame.
    /// Reset wholesale once the fence proves the GPU is done with them.
    scratch_descriptors: DescriptorPool,
}

/// Owns the swapchain and schedules frames through a fixed set of slots.
pub struct Renderer {
    swapchain: Swapchain,
    slots: Vec<FrameSlot>,
    pacer: FramePacer,
    deferred: DeferredQueue<RetiredResource>,
    vsync: bool,
}

impl Renderer {
    /// Create a renderer with [`MAX_FRAMES_IN_FLIGHT`] frame slots.
    pub fn new(
        gpu: &GpuContext,
        surface: &SurfaceContext,
        window_extent: vk::Extent2D,
        vsync: bool,
    ) -> Result<Self> {
        let swapchain = Swapchain::new(gpu, surface, window_extent, vsync, None)?;
        let device = gpu.device();

        let command_buffers = unsafe {
            allocate_command_buffers(device, gpu.command_pool(), MAX_FRAMES_IN_FLIGHT as u32)?
        };

        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for command_buffer in command_buffers {
            let scratch_descriptors = DescriptorPool::builder()
                .max_sets(64)
                .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 64)
                .add_pool_size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 64)
                .add_pool_size(vk::DescriptorType::STORAGE_BUFFER, 16)
                .build(device)?;

            unsafe {
                slots.push(FrameSlot {
                    command_buffer,
                    image_acquired: create_semaphore(device)?,
                    render_finished: create_semaphore(device)?,
                    in_flight: create_fence(device, true)?,
                    scratch_descriptors,
                });
            }
        }

        Ok(Self {
            swapchain,
            slots,
            pacer: FramePacer::new(MAX_FRAMES_IN_FLIGHT),
            deferred: DeferredQueue::new(MAX_FRAMES_IN_FLIGHT),
            vsync,
        })
    }

    /// Begin a frame.
    ///
    /// Blocks until this slot's previous submission completes, then acquires
    /// a swapchain image and starts recording. Returns `Ok(None)` when the
    /// swapchain was stale; it has been rebuilt and the caller should skip
    /// this frame and try again next iteration.
    ///
    /// # Panics
    /// Panics if a frame is already in progress.
    pub fn begin_frame(
        &mut self,
        gpu: &GpuContext,
        surface: &SurfaceContext,
        window_extent: &mut impl FnMut() -> (u32, u32),
    ) -> Result<Option<vk::CommandBuffer>> {
        assert!(
            !self.pacer.is_recording(),
            "begin_frame called while a frame is already in progress"
        );

        let device = gpu.device();
        let slot_index = self.pacer.current_slot();

        unsafe {
            let slot = &self.slots[slot_index];
            wait_for_fence(device, slot.in_flight)?;
            // The fence proves all work from this slot's previous frame is
            // done, so its transient descriptor sets can be recycled.
            slot.scratch_descriptors.reset(device)?;
        }

        self.destroy_expired(gpu)?;

        let acquire = self
            .swapchain
            .acquire(surface, self.slots[slot_index].image_acquired)?;

        if !self.pacer.begin_frame(acquire) {
            self.recreate_swapchain(gpu, surface, window_extent)?;
            return Ok(None);
        }

        let slot = &self.slots[slot_index];
        unsafe {
            // Only reset once an acquire succeeded; the submit that signals
            // this fence is now guaranteed to happen in end_frame.
            reset_fence(device, slot.in_flight)?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(slot.command_buffer, &begin_info)?;
        }

        Ok(Some(slot.command_buffer))
    }

    /// End the current frame: submit, present, and rotate to the next slot.
    ///
    /// The swapchain is rebuilt afterwards if the acquire was suboptimal,
    /// the present requested it, or `window_resized` is set. Rebuilding
    /// after present keeps the already-rendered frame visible.
    ///
    /// # Panics
    /// Panics if no frame is in progress.
    pub fn end_frame(
        &mut self,
        gpu: &GpuContext,
        surface: &SurfaceContext,
        window_extent: &mut impl FnMut() -> (u32, u32),
        window_resized: bool,
    ) -> Result<()> {
        assert!(
            self.pacer.is_recording(),
            "end_frame called with no frame in progress"
        );

        let device = gpu.device();
        let slot = &self.slots[self.pacer.current_slot()];
        let image_index = self
            .pacer
            .image_index()
            .expect("recording frame always has an acquired image");

        unsafe {
            device.end_command_buffer(slot.command_buffer)?;

            let wait_semaphores = [slot.image_acquired];
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let signal_semaphores = [slot.render_finished];
            let command_buffers = [slot.command_buffer];

            let submit_info = vk::SubmitInfo::default()
                .wait_semaphores(&wait_semaphores)
                .wait_dst_stage_mask(&wait_stages)
                .command_buffers(&command_buffers)
                .signal_semaphores(&signal_semaphores);

            device.queue_submit(gpu.graphics_queue(), &[submit_info], slot.in_flight)?;
        }

        let present_needs_rebuild = self.swapchain.present(
            surface,
            gpu.graphics_queue(),
            image_index,
            slot.render_finished,
        )?;

        if self.pacer.end_frame(present_needs_rebuild, window_resized) {
            self.recreate_swapchain(gpu, surface, window_extent)?;
        }

        Ok(())
    }

    /// Begin the swapchain render pass on the current frame's command buffer.
    ///
    /// Clears color and depth, and sets the viewport and scissor to the full
    /// swapchain extent.
    ///
    /// # Panics
    /// Panics if no frame is in progress or `cmd` is not the buffer returned
    /// by this frame's `begin_frame`.
    pub fn begin_render_pass(&self, gpu: &GpuContext, cmd: vk::CommandBuffer) {
        assert!(self.pacer.is_recording(), "no frame in progress");
        let slot = &self.slots[self.pacer.current_slot()];
        assert_eq!(
            cmd, slot.command_buffer,
            "render pass must target the current frame's command buffer"
        );
        let image_index = self
            .pacer
            .image_index()
            .expect("recording frame always has an acquired image");

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.01, 0.01, 0.01, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let extent = self.swapchain.extent();
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(self.swapchain.render_pass())
            .framebuffer(self.swapchain.framebuffer(image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            let device = gpu.device();
            device.cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);
            device.cmd_set_viewport(cmd, 0, &[viewport]);
            device.cmd_set_scissor(cmd, 0, &[scissor]);
        }
    }

    /// End the swapchain render pass.
    ///
    /// # Panics
    /// Panics if no frame is in progress or `cmd` is not the current frame's
    /// command buffer.
    pub fn end_render_pass(&self, gpu: &GpuContext, cmd: vk::CommandBuffer) {
        assert!(self.pacer.is_recording(), "no frame in progress");
        let slot = &self.slots[self.pacer.current_slot()];
        assert_eq!(
            cmd, slot.command_buffer,
            "render pass must target the current frame's command buffer"
        );

        unsafe {
            gpu.device().cmd_end_render_pass(cmd);
        }
    }

    /// Retire a buffer that in-flight frames may still reference.
    ///
    /// It is freed from `begin_frame` once enough frames have passed.
    pub fn retire_buffer(&mut self, buffer: GpuBuffer) {
        self.deferred
            .retire(RetiredResource::Buffer(buffer), self.pacer.frame_number());
    }

    /// Retire an image that in-flight frames may still reference.
    pub fn retire_image(&mut self, image: GpuImage) {
        self.deferred
            .retire(RetiredResource::Image(image), self.pacer.frame_number());
    }

    fn destroy_expired(&mut self, gpu: &GpuContext) -> Result<()> {
        let expired = self.deferred.drain_expired(self.pacer.frame_number());
        if expired.is_empty() {
            return Ok(());
        }

        let mut allocator = gpu.allocator().lock();
        for resource in expired {
            match resource {
                RetiredResource::Buffer(mut buffer) => allocator.free_buffer(&mut buffer)?,
                RetiredResource::Image(mut image) => allocator.free_image(&mut image)?,
            }
        }
        Ok(())
    }

    /// Rebuild the swapchain for the current window size.
    ///
    /// Blocks while the window extent is zero, waits for the device to go
    /// idle, then replaces the swapchain while keeping the old one alive
    /// through creation so pending presents can finish.
    pub fn recreate_swapchain(
        &mut self,
        gpu: &GpuContext,
        surface: &SurfaceContext,
        window_extent: &mut impl FnMut() -> (u32, u32),
    ) -> Result<()> {
        let (width, height) = await_valid_extent(&mut *window_extent);
        gpu.wait_idle()?;

        let extent = vk::Extent2D { width, height };
        let new_swapchain = Swapchain::new(gpu, surface, extent, self.vsync, Some(&self.swapchain))?;

        let mut old = std::mem::replace(&mut self.swapchain, new_swapchain);
        unsafe {
            // Safe now: wait_idle above drained all work against it.
            old.destroy(gpu, surface);
        }

        self.pacer.swapchain_rebuilt();
        tracing::debug!(width, height, "Swapchain recreated");
        Ok(())
    }

    /// The render pass drawing into the swapchain. Stable across resizes.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    /// Aspect ratio of the current swapchain extent.
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.aspect_ratio()
    }

    /// The current frame slot index, in `0..MAX_FRAMES_IN_FLIGHT`.
    ///
    /// Valid between `begin_frame` and `end_frame`; indexes per-frame
    /// resources like uniform buffers and descriptor sets.
    pub fn frame_index(&self) -> usize {
        assert!(self.pacer.is_recording(), "no frame in progress");
        self.pacer.current_slot()
    }

    /// Monotonic count of completed frames.
    pub fn frame_number(&self) -> u64 {
        self.pacer.frame_number()
    }

    /// Whether a frame is currently being recorded.
    pub fn is_frame_in_progress(&self) -> bool {
        self.pacer.is_recording()
    }

    /// The descriptor pool for the current frame's transient sets.
    pub fn scratch_descriptors(&self) -> &DescriptorPool {
        &self.slots[self.pacer.current_slot()].scratch_descriptors
    }

    /// The swapchain, for callers needing formats or image counts.
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Destroy all renderer resources.
    ///
    /// Waits for the device to go idle first, so everything pending is
    /// flushed, including deferred retirements.
    pub fn destroy(&mut self, gpu: &GpuContext, surface: &SurfaceContext) -> Result<()> {
        gpu.wait_idle()?;

        {
            let mut allocator = gpu.allocator().lock();
            for resource in self.deferred.drain_all() {
                match resource {
                    RetiredResource::Buffer(mut buffer) => allocator.free_buffer(&mut buffer)?,
                    RetiredResource::Image(mut image) => allocator.free_image(&mut image)?,
                }
            }
        }

        let device = gpu.device();
        for mut slot in self.slots.drain(..) {
            unsafe {
                device.destroy_semaphore(slot.image_acquired, None);
                device.destroy_semaphore(slot.render_finished, None);
                device.destroy_fence(slot.in_flight, None);
                slot.scratch_descriptors.destroy(device);
                device.free_command_buffers(gpu.command_pool(), &[slot.command_buffer]);
            }
        }

        unsafe {
            self.swapchain.destroy(gpu, surface);
        }
        Ok(())
    }
}
