//! Window surface management.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// Surface context bundling the surface with its extension loaders.
pub struct SurfaceContext {
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) surface_loader: ash::khr::surface::Instance,
    pub(crate) swapchain_loader: ash::khr::swapchain::Device,
}

impl SurfaceContext {
    /// Create a surface for the given window.
    pub fn from_window(
        gpu: &GpuContext,
        window: &(impl HasDisplayHandle + HasWindowHandle),
    ) -> Result<Self> {
        let display_handle = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?;

        let surface = unsafe {
            ash_window::create_surface(
                &gpu.entry,
                gpu.instance(),
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| GpuError::SurfaceCreation(e.to_string()))?
        };

        let surface_loader = ash::khr::surface::Instance::new(&gpu.entry, gpu.instance());
        let swapchain_loader = ash::khr::swapchain::Device::new(gpu.instance(), gpu.device());

        // Present support on the graphics queue is assumed throughout; verify
        // it up front so the failure is explicit.
        let supported = unsafe {
            surface_loader
                .get_physical_device_surface_support(
                    gpu.physical_device(),
                    gpu.graphics_queue_family(),
                    surface,
                )
                .map_err(GpuError::from)?
        };
        if !supported {
            unsafe { surface_loader.destroy_surface(surface, None) };
            return Err(GpuError::SurfaceCreation(
                "Graphics queue family cannot present to this surface".to_string(),
            ));
        }

        Ok(Self {
            surface,
            surface_loader,
            swapchain_loader,
        })
    }

    /// Get the surface handle.
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Query surface capabilities for the given physical device.
    pub fn capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::SurfaceCapabilitiesKHR> {
        let caps = unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)?
        };
        Ok(caps)
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// No swapchain created from this surface may still exist.
    pub unsafe fn destroy(&mut self) {
        self.surface_loader.destroy_surface(self.surface, None);
        self.surface = vk::SurfaceKHR::null();
    }
}
