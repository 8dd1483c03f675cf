//! GPU error types.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// GPU-related errors.
///
/// Every variant is fatal: setup errors unwind to the application's top level
/// and per-frame errors end the render loop.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be found or loaded.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Instance creation failed.
    #[error("Instance creation failed: {0}")]
    InstanceCreation(String),

    /// The instance exposes no physical devices at all.
    #[error("No GPUs with Vulkan support found")]
    NoDevicesFound,

    /// Devices exist but none satisfies the queue, extension and surface requirements.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Surface, swapchain, image view, render pass or framebuffer creation failed.
    #[error("Surface setup failed: {0}")]
    SurfaceSetup(String),

    /// Shader byte code could not be read.
    #[error("Failed to load shader {path}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Command buffer reset, begin or end failed.
    #[error("Command recording failed: {0}")]
    Recording(vk::Result),

    /// The swapchain refused to hand out an image.
    #[error("Swapchain image acquisition failed: {0}")]
    ImageAcquisition(vk::Result),

    /// The graphics queue rejected a submission.
    #[error("Queue submission failed: {0}")]
    Submission(vk::Result),

    /// The present queue rejected a presentation request.
    #[error("Presentation failed: {0}")]
    Presentation(vk::Result),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_errors_are_distinct() {
        assert_ne!(
            GpuError::NoDevicesFound.to_string(),
            GpuError::NoSuitableDevice.to_string()
        );
    }

    #[test]
    fn shader_load_names_the_path() {
        let err = GpuError::ShaderLoad {
            path: PathBuf::from("shaders/triangle.vert.spv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("shaders/triangle.vert.spv"));
    }
}
