//! Vulkan layer for Prism.
//!
//! This crate provides:
//! - Instance, debug messenger, surface and logical device setup
//! - Physical device selection with pluggable scoring
//! - Swapchain negotiation, render pass and pipeline assembly
//! - A single-frame-in-flight frame scheduler
//! - Ordered teardown of every created Vulkan object

pub mod capabilities;
pub mod command;
pub mod config;
pub mod context;
pub mod debug;
pub mod error;
pub mod frame;
pub mod instance;
pub mod pipeline;
pub mod render_pass;
pub mod selector;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod teardown;

pub use capabilities::{DeviceProfile, GpuVendor};
pub use command::CommandPool;
pub use config::{GpuConfig, Validation, VendorPreference};
pub use context::{GpuContext, GpuContextBuilder};
pub use debug::{DebugCategory, DebugEvent, DebugSeverity, DebugSink, TracingDebugSink};
pub use error::{GpuError, Result};
pub use frame::{FrameBackend, FrameReport, FrameScheduler, VulkanFrameBackend};
pub use pipeline::{FixedFunctionState, GraphicsPipeline, PipelineAssembler};
pub use render_pass::RenderTarget;
pub use selector::{DeviceCandidate, DeviceScorer, DeviceSelector, QueueFamilies, VendorNameScorer};
pub use shader::{load_spirv, ShaderPaths, ShaderStages};
pub use surface::{Surface, SurfaceSupport};
pub use swapchain::{SurfaceNegotiator, Swapchain, SwapchainConfiguration};
pub use sync::FrameSync;
pub use teardown::TeardownStack;
