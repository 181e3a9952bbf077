//! `EmberApp` trait definition.

use crate::context::AppContext;
use ash::vk;
use winit::event::WindowEvent;

/// Trait for Ember applications.
///
/// Implement this to build on the engine. The framework owns the window,
/// the GPU context, and the frame lifecycle; the application records into
/// the command buffer it is handed each frame.
pub trait EmberApp: Sized {
    /// Initialize the application.
    ///
    /// Called once after the window, GPU context, and renderer exist.
    fn init(ctx: &mut AppContext) -> anyhow::Result<Self>;

    /// Update application state.
    ///
    /// Called every frame before rendering. `dt` is seconds since the last
    /// frame.
    fn update(&mut self, ctx: &AppContext, dt: f32);

    /// Record rendering commands for one frame.
    ///
    /// The frame has already begun; the renderer's render pass helpers are
    /// available through `ctx.renderer`. Submission and presentation happen
    /// after this returns.
    fn render(
        &mut self,
        ctx: &mut AppContext,
        cmd: vk::CommandBuffer,
        dt: f32,
    ) -> anyhow::Result<()>;

    /// Handle window events.
    ///
    /// Return `true` if the event was consumed and should not be processed
    /// further.
    #[allow(unused_variables)]
    fn on_event(&mut self, event: &WindowEvent) -> bool {
        false
    }

    /// Cleanup resources before shutdown.
    ///
    /// The device is idle when this is called, so GPU resources can be
    /// destroyed directly.
    #[allow(unused_variables)]
    fn cleanup(&mut self, ctx: &mut AppContext) {}
}
