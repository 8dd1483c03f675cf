//! Vulkan instance creation.

use crate::config::GpuConfig;
use crate::error::{GpuError, Result};
use crate::teardown::TeardownStack;
use ash::vk;
use raw_window_handle::RawDisplayHandle;
use std::collections::HashSet;
use std::ffi::{c_char, CStr, CString};

/// Validation layers to enable when validation is requested.
pub fn validation_layers() -> Vec<&'static CStr> {
    vec![c"VK_LAYER_KHRONOS_validation"]
}

/// Instance extensions needed to present to `display` (plus debug utils when validating).
pub fn required_instance_extensions(
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<Vec<&'static CStr>> {
    let window_extensions = ash_window::enumerate_required_extensions(display)
        .map_err(|e| GpuError::InstanceCreation(format!("Unsupported display: {e}")))?;

    let mut extensions: Vec<&'static CStr> = window_extensions
        .iter()
        // SAFETY: ash-window returns pointers to static, NUL-terminated extension names
        .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
        .collect();

    if enable_validation {
        extensions.push(ash::ext::debug_utils::NAME);
    }

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    extensions.push(ash::khr::portability_enumeration::NAME);

    Ok(extensions)
}

/// Names from `required` missing in `available`, in request order.
pub fn missing_names<'a>(required: &[&'a CStr], available: &HashSet<String>) -> Vec<&'a CStr> {
    required
        .iter()
        .copied()
        .filter(|name| !available.contains(name.to_string_lossy().as_ref()))
        .collect()
}

/// Create a Vulkan instance able to present to `display`.
///
/// Missing instance extensions are an error; missing validation layers are
/// skipped with a warning.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    config: &GpuConfig,
    display: RawDisplayHandle,
    teardown: &mut TeardownStack,
) -> Result<ash::Instance> {
    let app_name = CString::new(config.app_name.as_str())
        .map_err(|e| GpuError::InstanceCreation(format!("Invalid application name: {e}")))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(c"Prism")
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(vk::API_VERSION_1_0);

    let enable_validation = config.validation.is_enabled();

    // Check that every required extension is available
    let extensions = required_instance_extensions(display, enable_validation)?;
    let available_extensions: HashSet<String> =
        unsafe { entry.enumerate_instance_extension_properties(None)? }
            .iter()
            .filter_map(|props| props.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

    let missing = missing_names(&extensions, &available_extensions);
    if !missing.is_empty() {
        return Err(GpuError::InstanceCreation(format!(
            "Missing instance extensions: {missing:?}"
        )));
    }
    tracing::debug!("Instance extensions: {:?}", extensions);

    // Keep only the validation layers that are installed
    let layers: Vec<&CStr> = if enable_validation {
        let available_layers: HashSet<String> = unsafe { entry.enumerate_instance_layer_properties()? }
            .iter()
            .filter_map(|props| props.layer_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        let requested = validation_layers();
        let missing = missing_names(&requested, &available_layers);
        for layer in &missing {
            tracing::warn!("Validation layer {:?} not available", layer);
        }
        requested
            .into_iter()
            .filter(|layer| !missing.contains(layer))
            .collect()
    } else {
        vec![]
    };

    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();
    let layer_names: Vec<*const c_char> = layers.iter().map(|l| l.as_ptr()).collect();

    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    let create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);

    let instance = unsafe { entry.create_instance(&create_info, None) }
        .map_err(|e| GpuError::InstanceCreation(e.to_string()))?;

    // The loader library must outlive the instance
    let keep_entry = entry.clone();
    let owned = instance.clone();
    teardown.push("instance", move || {
        // SAFETY: every instance child was registered later and is already gone
        unsafe { owned.destroy_instance(None) };
        drop(keep_entry);
    });

    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_missing_names_in_request_order() {
        let available: HashSet<String> = ["VK_KHR_surface".to_string()].into_iter().collect();
        let required = [c"VK_KHR_xlib_surface", c"VK_KHR_surface", c"VK_EXT_debug_utils"];

        let missing = missing_names(&required, &available);

        assert_eq!(missing, [c"VK_KHR_xlib_surface", c"VK_EXT_debug_utils"]);
    }

    #[test]
    fn nothing_missing_when_all_available() {
        let available: HashSet<String> = ["VK_LAYER_KHRONOS_validation".to_string()]
            .into_iter()
            .collect();
        assert!(missing_names(&validation_layers(), &available).is_empty());
    }
}
