//! Immutable configuration consumed by the GPU layer.

use crate::debug::{DebugSink, TracingDebugSink};
use std::ffi::CStr;
use std::sync::Arc;

/// Validation layer toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Enabled,
    Disabled,
}

impl Validation {
    /// Enabled in debug builds, disabled in release builds.
    pub const fn default_for_build() -> Self {
        if cfg!(debug_assertions) {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }

    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl From<bool> for Validation {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled
        } else {
            Self::Disabled
        }
    }
}

/// Device-name substrings used by the default device scorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorPreference {
    /// Pattern identifying an integrated GPU (+1).
    pub integrated: String,
    /// Pattern identifying a discrete GPU (+2).
    pub discrete: String,
}

impl Default for VendorPreference {
    fn default() -> Self {
        Self {
            integrated: "Intel".to_string(),
            discrete: "NVIDIA".to_string(),
        }
    }
}

/// Device extensions every selected GPU must support.
pub fn default_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// GPU layer configuration, passed by reference into each startup stage.
#[derive(Clone)]
pub struct GpuConfig {
    /// Application name reported to the driver.
    pub app_name: String,
    /// Whether to enable validation layers and the debug messenger.
    pub validation: Validation,
    /// Required device extensions.
    pub device_extensions: Vec<&'static CStr>,
    /// Vendor patterns for the default device scorer.
    pub vendor_preference: VendorPreference,
    /// Clear color of the render pass (RGBA).
    pub clear_color: [f32; 4],
    /// Receiver for driver debug messages.
    pub debug_sink: Arc<dyn DebugSink>,
}

impl Default for GpuConfig {
    fn default() -> Self {
        Self {
            app_name: "Prism".to_string(),
            validation: Validation::default_for_build(),
            device_extensions: default_device_extensions(),
            vendor_preference: VendorPreference::default(),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            debug_sink: Arc::new(TracingDebugSink),
        }
    }
}

impl std::fmt::Debug for GpuConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuConfig")
            .field("app_name", &self.app_name)
            .field("validation", &self.validation)
            .field("device_extensions", &self.device_extensions)
            .field("vendor_preference", &self.vendor_preference)
            .field("clear_color", &self.clear_color)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapchain_extension_required_by_default() {
        let config = GpuConfig::default();
        assert_eq!(config.device_extensions, [c"VK_KHR_swapchain"]);
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn validation_from_flag() {
        assert_eq!(Validation::from(true), Validation::Enabled);
        assert!(!Validation::from(false).is_enabled());
    }
}
