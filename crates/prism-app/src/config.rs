//! Application configuration.

use prism_gpu::{GpuConfig, ShaderPaths, Validation};
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Compiled SPIR-V for the vertex and fragment stages.
    pub shaders: ShaderPaths,
    /// Stop after this many presented frames (None runs until the window closes).
    pub max_frames: Option<u64>,
    /// Configuration handed to the GPU layer.
    pub gpu: GpuConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Prism".to_string(),
            width: 800,
            height: 600,
            shaders: ShaderPaths::new("shaders/triangle.vert.spv", "shaders/triangle.frag.spv"),
            max_frames: None,
            gpu: GpuConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self {
            gpu: GpuConfig {
                app_name: title.clone(),
                ..GpuConfig::default()
            },
            title,
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn with_validation(mut self, validation: impl Into<Validation>) -> Self {
        self.gpu.validation = validation.into();
        self
    }

    /// Set the SPIR-V files for the vertex and fragment stages.
    #[must_use]
    pub fn with_shaders(mut self, vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        self.shaders = ShaderPaths::new(vertex, fragment);
        self
    }

    /// Stop after `frames` presented frames.
    #[must_use]
    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    /// Whether `presented` frames reach the configured limit.
    pub fn frame_limit_reached(&self, presented: u64) -> bool {
        self.max_frames.is_some_and(|max| presented >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.max_frames, None);
        assert_eq!(
            config.shaders.vertex,
            PathBuf::from("shaders/triangle.vert.spv")
        );
    }

    #[test]
    fn builder_sets_fields() {
        let config = AppConfig::new("Triangle")
            .with_size(1024, 768)
            .with_validation(false)
            .with_shaders("a.spv", "b.spv")
            .with_max_frames(5);

        assert_eq!(config.title, "Triangle");
        assert_eq!(config.gpu.app_name, "Triangle");
        assert_eq!((config.width, config.height), (1024, 768));
        assert_eq!(config.gpu.validation, Validation::Disabled);
        assert_eq!(config.shaders, ShaderPaths::new("a.spv", "b.spv"));
        assert_eq!(config.max_frames, Some(5));
    }

    #[test]
    fn frame_limit() {
        let unlimited = AppConfig::default();
        assert!(!unlimited.frame_limit_reached(u64::MAX));

        let limited = AppConfig::default().with_max_frames(3);
        assert!(!limited.frame_limit_reached(2));
        assert!(limited.frame_limit_reached(3));
    }

    #[test]
    fn zero_limit_reached_before_first_frame() {
        let config = AppConfig::default().with_max_frames(0);
        assert!(config.frame_limit_reached(0));
    }
}
