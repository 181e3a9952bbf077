//! Application framework for the Ember engine.
//!
//! Owns the window, the event loop, and the per-frame begin/render/end
//! cycle. Applications implement [`EmberApp`] and call [`run_app`]; the
//! framework handles everything outside of recording draw commands.

pub mod app;
pub mod context;
pub mod runner;

pub use app::EmberApp;
pub use context::AppContext;
pub use runner::{run_app, AppConfig};
