//! Surface management for windowed rendering.
//!
//! Wraps the Vulkan surface created from the window's raw handles and the
//! per-device presentation queries run against it.

use crate::error::{GpuError, Result};
use crate::teardown::TeardownStack;
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

/// A presentation surface and its extension loader.
#[derive(Clone)]
pub struct Surface {
    /// The Vulkan surface handle.
    pub handle: vk::SurfaceKHR,
    /// Surface extension loader.
    pub loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Create a surface for a window.
    ///
    /// # Safety
    /// The instance must be valid and the window must outlive the surface.
    pub unsafe fn from_window<W>(
        entry: &ash::Entry,
        instance: &ash::Instance,
        window: &W,
        teardown: &mut TeardownStack,
    ) -> Result<Self>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceSetup(format!("Failed to get display handle: {e}")))?;
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::SurfaceSetup(format!("Failed to get window handle: {e}")))?;

        let handle = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| GpuError::SurfaceSetup(format!("Failed to create window surface: {e}")))?;

        let loader = ash::khr::surface::Instance::new(entry, instance);

        let owned = loader.clone();
        teardown.push("surface", move || {
            // SAFETY: the swapchain built on this surface is destroyed first
            unsafe { owned.destroy_surface(handle, None) };
        });

        Ok(Self { handle, loader })
    }

    /// Whether queue family `family` of `physical_device` can present to this surface.
    ///
    /// # Safety
    /// The physical device must belong to the instance the surface was created on.
    pub unsafe fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        family: u32,
    ) -> Result<bool> {
        let supported = unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, family, self.handle)?
        };
        Ok(supported)
    }

    /// Query what `physical_device` can present to this surface.
    ///
    /// # Safety
    /// The physical device must belong to the instance the surface was created on.
    pub unsafe fn support(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        unsafe {
            let capabilities = self
                .loader
                .get_physical_device_surface_capabilities(physical_device, self.handle)?;

            let formats = self
                .loader
                .get_physical_device_surface_formats(physical_device, self.handle)?;

            let present_modes = self
                .loader
                .get_physical_device_surface_present_modes(physical_device, self.handle)?;

            Ok(SurfaceSupport {
                capabilities,
                formats,
                present_modes,
            })
        }
    }
}

/// Surface capabilities query result.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// A device can drive a swapchain only if it reports at least one format and present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}
