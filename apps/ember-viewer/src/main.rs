//! Ember Engine Demo Viewer
//!
//! Renders a small lit scene: a rotating cube and a floor quad under a
//! moving point light.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p ember-viewer
//! ```
//!
//! Shaders are loaded from `shaders/*.spv` next to this crate; compile them
//! with `glslc` (see `shaders/README.md`).
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

mod app;

use ember_app::{run_app, AppConfig};

use crate::app::Viewer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

fn main() -> anyhow::Result<()> {
    run_app::<Viewer>(
        AppConfig::new("Ember Engine - Viewer")
            .with_size(WIDTH, HEIGHT)
            .with_vsync(true),
    )
}
