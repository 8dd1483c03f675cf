//! GPU context management.

use crate::config::GpuConfig;
use crate::debug::install_debug_messenger;
use crate::error::{GpuError, Result};
use crate::instance::create_instance;
use crate::selector::{DeviceCandidate, DeviceSelector, QueueFamilies};
use crate::surface::Surface;
use crate::teardown::TeardownStack;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::c_char;

/// Instance, surface, selected GPU and logical device.
///
/// Destruction of every handle held here is registered on the
/// [`TeardownStack`] passed to [`GpuContextBuilder::build`].
pub struct GpuContext {
    pub(crate) instance: ash::Instance,
    pub(crate) surface: Surface,
    pub(crate) physical_device: DeviceCandidate,
    pub(crate) device: ash::Device,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Get the selected physical device.
    pub fn physical_device(&self) -> &DeviceCandidate {
        &self.physical_device
    }

    /// Get the graphics and present queue family indices.
    pub fn queue_families(&self) -> QueueFamilies {
        self.physical_device.queue_families
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue (may equal the graphics queue).
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder<'a> {
    config: &'a GpuConfig,
    selector: DeviceSelector,
}

impl<'a> GpuContextBuilder<'a> {
    /// Create a new builder.
    pub fn new(config: &'a GpuConfig) -> Self {
        Self {
            config,
            selector: DeviceSelector::new(config),
        }
    }

    /// Use a custom device selector.
    #[must_use]
    pub fn selector(mut self, selector: DeviceSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Build the GPU context for `window`.
    ///
    /// # Safety
    /// The window must outlive every object registered on `teardown`.
    pub unsafe fn build<W>(self, window: &W, teardown: &mut TeardownStack) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        // Load Vulkan entry point
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;

        let display = window
            .display_handle()
            .map_err(|e| GpuError::InstanceCreation(format!("Failed to get display handle: {e}")))?;

        // Create Vulkan instance
        let instance = unsafe { create_instance(&entry, self.config, display.as_raw(), teardown)? };

        if self.config.validation.is_enabled() {
            unsafe {
                install_debug_messenger(&entry, &instance, self.config.debug_sink.clone(), teardown)?;
            }
        }

        let surface = unsafe { Surface::from_window(&entry, &instance, window, teardown)? };

        // Select best physical device
        let physical_device = unsafe { self.selector.select(&instance, &surface)? };

        tracing::info!(
            "Selected GPU: {} (score {})",
            physical_device.profile.summary(),
            physical_device.score
        );

        let device = unsafe {
            create_device(
                &instance,
                &physical_device,
                &self.config.device_extensions,
                teardown,
            )?
        };

        let families = physical_device.queue_families;
        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };

        Ok(GpuContext {
            instance,
            surface,
            physical_device,
            device,
            graphics_queue,
            present_queue,
        })
    }
}

/// Create the logical device with one queue per unique family.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: &DeviceCandidate,
    extensions: &[&std::ffi::CStr],
    teardown: &mut TeardownStack,
) -> Result<ash::Device> {
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = physical_device
        .queue_families
        .unique()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default();

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device.handle, &device_create_info, None)? };

    let owned = device.clone();
    teardown.push("logical device", move || {
        // SAFETY: all device children were registered later and are already destroyed
        unsafe { owned.destroy_device(None) };
    });

    Ok(device)
}
