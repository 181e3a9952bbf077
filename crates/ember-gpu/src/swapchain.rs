//! Swapchain lifecycle management.
//!
//! The swapchain owns its images, views, depth attachment, render pass, and
//! framebuffers as a unit, so a resize replaces everything that depends on
//! the surface extent in one step. The image count K is whatever the surface
//! grants and is independent of the number of frames recorded in flight.

use crate::buffer::GpuImage;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::surface::SurfaceContext;
use ash::vk;
use gpu_allocator::MemoryLocation;

/// Outcome of a swapchain image acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// An image is available for rendering.
    Ready {
        /// Index of the acquired image, in `0..image_count`.
        image_index: u32,
        /// The image is usable but the swapchain no longer matches the
        /// surface exactly. Render this frame, rebuild after present.
        suboptimal: bool,
    },
    /// The swapchain is stale and must be rebuilt before any image can be
    /// acquired. The acquire semaphore was not signaled.
    OutOfDate,
}

/// Swapchain and everything tied to its extent.
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth_image: GpuImage,
    depth_view: vk::ImageView,
    framebuffers: Vec<vk::Framebuffer>,
    render_pass: vk::RenderPass,

    surface_format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain for the surface.
    ///
    /// `desired_extent` is the window's framebuffer size in pixels; it is
    /// clamped to what the surface allows. When recreating, pass the retiring
    /// swapchain as `previous` so in-flight presents can complete, and so the
    /// new chain is rejected if the surface formats changed underneath us.
    pub fn new(
        gpu: &GpuContext,
        surface: &SurfaceContext,
        desired_extent: vk::Extent2D,
        vsync: bool,
        previous: Option<&Swapchain>,
    ) -> Result<Self> {
        let physical_device = gpu.physical_device();

        let capabilities = surface.capabilities(physical_device)?;
        let formats = unsafe {
            surface
                .surface_loader
                .get_physical_device_surface_formats(physical_device, surface.surface)?
        };
        let present_modes = unsafe {
            surface
                .surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface.surface)?
        };

        if formats.is_empty() || present_modes.is_empty() {
            return Err(GpuError::SwapchainCreation(
                "Surface reports no formats or present modes".to_string(),
            ));
        }

        let surface_format = select_surface_format(&formats);
        let present_mode = select_present_mode(&present_modes, vsync);
        let extent = calculate_extent(&capabilities, desired_extent);
        let depth_format = find_depth_format(gpu)?;

        // Formats feed into the render pass, which pipelines were built
        // against. A change across recreation invalidates all of them.
        if let Some(prev) = previous {
            if prev.surface_format.format != surface_format.format
                || prev.depth_format != depth_format
            {
                return Err(GpuError::SwapchainFormatChanged);
            }
        }

        // One more than the minimum reduces the chance of waiting on the
        // presentation engine. max_image_count of 0 means unbounded.
        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 {
            image_count = image_count.min(capabilities.max_image_count);
        }

        let mut create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        if let Some(prev) = previous {
            create_info = create_info.old_swapchain(prev.handle);
        }

        let handle = unsafe {
            surface
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?
        };

        let images = unsafe { surface.swapchain_loader.get_swapchain_images(handle)? };
        tracing::debug!(
            image_count = images.len(),
            width = extent.width,
            height = extent.height,
            format = ?surface_format.format,
            present_mode = ?present_mode,
            "Created swapchain"
        );

        let device = gpu.device();
        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(surface_format.format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            let view = unsafe { device.create_image_view(&view_info, None)? };
            image_views.push(view);
        }

        let (depth_image, depth_view) = create_depth_attachment(gpu, extent, depth_format)?;
        let render_pass = create_render_pass(device, surface_format.format, depth_format)?;

        let mut framebuffers = Vec::with_capacity(image_views.len());
        for &view in &image_views {
            let attachments = [view, depth_view];
            let fb_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            let fb = unsafe { device.create_framebuffer(&fb_info, None)? };
            framebuffers.push(fb);
        }

        Ok(Self {
            handle,
            images,
            image_views,
            depth_image,
            depth_view,
            framebuffers,
            render_pass,
            surface_format,
            depth_format,
            present_mode,
            extent,
        })
    }

    /// Acquire the next swapchain image.
    ///
    /// On success the given semaphore will be signaled when the image is
    /// ready to be written. [`Acquire::OutOfDate`] means no image was
    /// acquired and the semaphore is untouched.
    pub fn acquire(
        &self,
        surface: &SurfaceContext,
        image_available: vk::Semaphore,
    ) -> Result<Acquire> {
        let result = unsafe {
            surface.swapchain_loader.acquire_next_image(
                self.handle,
                u64::MAX,
                image_available,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(Acquire::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
            Err(e) => Err(GpuError::Vulkan(e)),
        }
    }

    /// Present an acquired image.
    ///
    /// Waits on `render_finished` before presenting. Returns `true` if the
    /// swapchain should be rebuilt (out of date or suboptimal).
    pub fn present(
        &self,
        surface: &SurfaceContext,
        queue: vk::Queue,
        image_index: u32,
        render_finished: vk::Semaphore,
    ) -> Result<bool> {
        let swapchains = [self.handle];
        let image_indices = [image_index];
        let wait_semaphores = [render_finished];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            surface
                .swapchain_loader
                .queue_present(queue, &present_info)
        };

        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(GpuError::Vulkan(e)),
        }
    }

    /// Number of swapchain images (K).
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// The swapchain extent in pixels.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Width over height of the current extent.
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// The render pass targeting the swapchain and depth attachments.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Framebuffer for the given image index.
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    /// The color attachment format.
    pub fn image_format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// The depth attachment format.
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// The present mode in use.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Destroy all swapchain resources, in reverse creation order.
    ///
    /// # Safety
    /// No GPU work referencing this swapchain may be in flight.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext, surface: &SurfaceContext) {
        let device = gpu.device();

        for fb in self.framebuffers.drain(..) {
            device.destroy_framebuffer(fb, None);
        }
        device.destroy_render_pass(self.render_pass, None);
        self.render_pass = vk::RenderPass::null();

        device.destroy_image_view(self.depth_view, None);
        self.depth_view = vk::ImageView::null();
        if let Err(e) = gpu.allocator().lock().free_image(&mut self.depth_image) {
            tracing::warn!("Failed to free depth image: {e}");
        }

        for view in self.image_views.drain(..) {
            device.destroy_image_view(view, None);
        }
        self.images.clear();

        surface.swapchain_loader.destroy_swapchain(self.handle, None);
        self.handle = vk::SwapchainKHR::null();
    }
}

fn create_depth_attachment(
    gpu: &GpuContext,
    extent: vk::Extent2D,
    format: vk::Format,
) -> Result<(GpuImage, vk::ImageView)> {
    let image_info = vk::ImageCreateInfo::default()
        .image_type(vk::ImageType::TYPE_2D)
        .format(format)
        .extent(vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        })
        .mip_levels(1)
        .array_layers(1)
        .samples(vk::SampleCountFlags::TYPE_1)
        .tiling(vk::ImageTiling::OPTIMAL)
        .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        .sharing_mode(vk::SharingMode::EXCLUSIVE)
        .initial_layout(vk::ImageLayout::UNDEFINED);

    let image = gpu
        .allocator()
        .lock()
        .create_image(&image_info, MemoryLocation::GpuOnly, "swapchain depth")?;

    let view_info = vk::ImageViewCreateInfo::default()
        .image(image.image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::DEPTH)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );
    let view = unsafe { gpu.device().create_image_view(&view_info, None)? };

    Ok((image, view))
}

fn create_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::default()
        .format(color_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let depth_attachment = vk::AttachmentDescription::default()
        .format(depth_format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::DONT_CARE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let color_ref = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    let depth_ref = vk::AttachmentReference::default()
        .attachment(1)
        .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(std::slice::from_ref(&color_ref))
        .depth_stencil_attachment(&depth_ref);

    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        )
        .dst_access_mask(
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        );

    let attachments = [color_attachment, depth_attachment];
    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass))
        .dependencies(std::slice::from_ref(&dependency));

    let render_pass = unsafe { device.create_render_pass(&create_info, None)? };
    Ok(render_pass)
}

/// Pick the surface format, preferring sRGB BGRA.
pub fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

/// Pick the present mode.
///
/// With vsync we always use FIFO, which every conformant driver supports.
/// Without it we prefer MAILBOX, then IMMEDIATE, and fall back to FIFO.
pub fn select_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if vsync {
        return vk::PresentModeKHR::FIFO;
    }

    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else if modes.contains(&vk::PresentModeKHR::IMMEDIATE) {
        vk::PresentModeKHR::IMMEDIATE
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Clamp the desired extent to the surface capabilities.
///
/// When `current_extent` is the special value `u32::MAX` the surface lets
/// the application choose, bounded by the min and max image extents.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: desired.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: desired.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// Find a supported depth attachment format.
pub fn find_depth_format(gpu: &GpuContext) -> Result<vk::Format> {
    let candidates = [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ];

    for format in candidates {
        let props = unsafe {
            gpu.instance()
                .get_physical_device_format_properties(gpu.physical_device(), format)
        };
        if props
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        {
            return Ok(format);
        }
    }

    Err(GpuError::SwapchainCreation(
        "No supported depth format".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_format_prefers_srgb_bgra() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = select_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = select_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn present_mode_vsync_is_fifo() {
        let modes = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(select_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn present_mode_uncapped_prefers_mailbox() {
        let modes = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(
            select_present_mode(&modes, false),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn present_mode_uncapped_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO];
        assert_eq!(select_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_current_when_fixed() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..Default::default()
        };
        let extent = calculate_extent(
            &caps,
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn extent_clamps_when_surface_defers() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 1600,
                height: 900,
            },
            ..Default::default()
        };
        let extent = calculate_extent(
            &caps,
            vk::Extent2D {
                width: 1920,
                height: 50,
            },
        );
        assert_eq!(extent.width, 1600);
        assert_eq!(extent.height, 100);
    }
}
