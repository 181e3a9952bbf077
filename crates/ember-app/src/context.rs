//! Application context.

use ash::vk;
use ember_gpu::{GpuContext, GpuContextBuilder, SurfaceContext};
use ember_render::Renderer;
use std::sync::Arc;
use winit::window::Window;

/// Everything the framework owns on behalf of the application.
///
/// Field order matters for teardown: [`AppContext::cleanup`] destroys the
/// renderer and surface explicitly before the `GpuContext` drop tears down
/// the device.
pub struct AppContext {
    pub window: Arc<Window>,
    pub gpu: GpuContext,
    pub surface: SurfaceContext,
    pub renderer: Renderer,
    /// Set by the event loop on resize; consumed at the end of the next
    /// frame so the rebuild happens after present.
    pub window_resized: bool,
}

impl AppContext {
    /// Create the GPU context, surface, and renderer for a window.
    pub fn new(
        window: Arc<Window>,
        app_name: &str,
        vsync: bool,
        validation: bool,
    ) -> anyhow::Result<Self> {
        let gpu = GpuContextBuilder::new()
            .app_name(app_name)
            .validation(validation)
            .build()?;

        let surface = SurfaceContext::from_window(&gpu, window.as_ref())?;

        let size = window.inner_size();
        let renderer = Renderer::new(
            &gpu,
            &surface,
            vk::Extent2D {
                width: size.width,
                height: size.height,
            },
            vsync,
        )?;

        Ok(Self {
            window,
            gpu,
            surface,
            renderer,
            window_resized: false,
        })
    }

    /// Current framebuffer size in pixels. Zero while minimized.
    pub fn window_extent(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    /// Destroy renderer and surface. The device goes down with the
    /// `GpuContext` drop afterwards.
    pub fn cleanup(&mut self) {
        if let Err(e) = self.renderer.destroy(&self.gpu, &self.surface) {
            tracing::error!("Failed to destroy renderer: {e}");
        }
        unsafe {
            // SAFETY: the renderer (and with it the swapchain) is gone.
            self.surface.destroy();
        }
    }
}
