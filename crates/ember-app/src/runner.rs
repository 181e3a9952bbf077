//! Application runner and event loop.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::app::EmberApp;
use crate::context::AppContext;

/// Application configuration.
#[derive(Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Ember Engine".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            validation: cfg!(debug_assertions),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }
}

/// Run an EmberApp with the given configuration.
///
/// Initializes logging, creates the window and GPU context, and runs the
/// event loop until the application exits.
pub fn run_app<A: EmberApp + 'static>(config: AppConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut runner = AppRunner::<A> {
        config,
        state: None,
    };

    event_loop.run_app(&mut runner)?;

    Ok(())
}

/// Internal application runner implementing winit's ApplicationHandler.
struct AppRunner<A: EmberApp> {
    config: AppConfig,
    state: Option<AppState<A>>,
}

/// Internal application state.
struct AppState<A: EmberApp> {
    ctx: AppContext,
    app: A,
    last_frame_time: Instant,
}

impl<A: EmberApp + 'static> ApplicationHandler for AppRunner<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        info!("Creating application state...");

        match self.create_state(event_loop) {
            Ok(state) => {
                self.state = Some(state);
                info!("Application ready!");
            }
            Err(e) => {
                error!("Failed to initialize application: {e}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        // Let the app handle the event first
        if let Some(state) = &mut self.state {
            if state.app.on_event(&event) {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                if let Some(mut state) = self.state.take() {
                    state.cleanup();
                }
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                let render_result = match &mut self.state {
                    Some(state) => state.render_frame(),
                    None => Ok(()),
                };
                if let Err(e) = render_result {
                    // A render error leaves the frame half-finished; the only
                    // valid next step is teardown, not another frame.
                    error!("Fatal render error: {e}");
                    if let Some(mut state) = self.state.take() {
                        state.cleanup();
                    }
                    event_loop.exit();
                }
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                if let Some(state) = &mut self.state {
                    // Handled at frame boundaries; the swapchain rebuild
                    // happens after the in-progress frame presents.
                    state.ctx.window_resized = true;
                    tracing::debug!(width, height, "Window resized");
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.ctx.window.request_redraw();
        }
    }
}

impl<A: EmberApp + 'static> AppRunner<A> {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<AppState<A>> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let mut ctx = AppContext::new(
            window,
            &self.config.title,
            self.config.vsync,
            self.config.validation,
        )?;

        let app = A::init(&mut ctx)?;

        Ok(AppState {
            ctx,
            app,
            last_frame_time: Instant::now(),
        })
    }
}

impl<A: EmberApp> AppState<A> {
    fn render_frame(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        self.app.update(&self.ctx, dt);

        // The extent closure re-reads the window size on every call, so the
        // rebuild loop sees size changes while the window is minimized.
        let window = self.ctx.window.clone();
        let mut window_extent = move || {
            let size = window.inner_size();
            (size.width, size.height)
        };

        let Some(cmd) =
            self.ctx
                .renderer
                .begin_frame(&self.ctx.gpu, &self.ctx.surface, &mut window_extent)?
        else {
            // Swapchain was stale and has been rebuilt; skip this frame.
            return Ok(());
        };

        self.app.render(&mut self.ctx, cmd, dt)?;

        let resized = std::mem::take(&mut self.ctx.window_resized);
        self.ctx.renderer.end_frame(
            &self.ctx.gpu,
            &self.ctx.surface,
            &mut window_extent,
            resized,
        )?;

        Ok(())
    }

    fn cleanup(&mut self) {
        info!("Starting cleanup...");

        if let Err(e) = self.ctx.gpu.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        // App resources first, then the context's renderer and surface.
        self.app.cleanup(&mut self.ctx);
        self.ctx.cleanup();

        info!("Cleanup complete");
    }
}
