//! Application framework for Prism.
//!
//! Opens a window, builds the Vulkan render context for it and drives the
//! frame scheduler from the winit event loop until the window closes or the
//! configured frame limit is reached.
//!
//! # Example
//!
//! ```no_run
//! use prism_app::{run_app, AppConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     run_app(AppConfig::new("Triangle").with_size(800, 600))
//! }
//! ```

mod config;
mod context;
mod logging;
mod runner;

pub use config::AppConfig;
pub use context::RenderContext;
pub use logging::init_logging;
pub use runner::{run_app, FrameStats};

// Re-export commonly used types for convenience
pub use prism_gpu::{GpuConfig, GpuError, ShaderPaths, Validation};
