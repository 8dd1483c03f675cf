//! GPU capability detection.
//!
//! Everything the device selector needs to know about a physical device is
//! queried once into a plain [`DeviceProfile`], so the selection rules can be
//! evaluated (and tested) without touching the driver again.

use crate::selector::{find_queue_families, QueueFamilyIndices, QueueFamilySupport};
use crate::surface::{Surface, SurfaceSupport};
use ash::vk;
use std::collections::HashSet;
use std::ffi::CStr;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub const fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Snapshot of a physical device's properties relevant to selection.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    /// Physical device handle.
    pub handle: vk::PhysicalDevice,
    /// Device name
    pub name: String,
    /// GPU vendor
    pub vendor: GpuVendor,
    /// Integrated, discrete, virtual, ...
    pub device_type: vk::PhysicalDeviceType,
    /// Vulkan API version
    pub api_version: u32,
    /// Graphics and present family indices found by the first-match scan.
    pub queue_families: QueueFamilyIndices,
    /// Supported device extensions.
    pub extensions: HashSet<String>,
    /// Presentation support for the target surface.
    pub surface_support: SurfaceSupport,
}

impl DeviceProfile {
    /// Query a physical device's profile against `surface`.
    ///
    /// Failing per-device queries degrade to "unsupported" so that one broken
    /// driver entry does not abort enumeration of the others.
    ///
    /// # Safety
    /// The instance, physical device and surface must be valid and related.
    pub unsafe fn query(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        surface: &Surface,
    ) -> Self {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let queue_families = find_queue_families(families.iter().zip(0u32..).map(|(family, index)| {
            let present = unsafe { surface.supports_present(physical_device, index) }
                .unwrap_or_else(|e| {
                    tracing::warn!("{name}: present support query for family {index} failed: {e}");
                    false
                });
            QueueFamilySupport {
                graphics: family.queue_flags.contains(vk::QueueFlags::GRAPHICS),
                present,
            }
        }));

        let extensions = unsafe { instance.enumerate_device_extension_properties(physical_device) }
            .unwrap_or_default()
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|ext| ext.to_string_lossy().into_owned())
            .collect();

        let surface_support = unsafe { surface.support(physical_device) }.unwrap_or_else(|e| {
            tracing::warn!("{name}: surface support query failed: {e}");
            SurfaceSupport::default()
        });

        Self {
            handle: physical_device,
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_type: properties.device_type,
            api_version: properties.api_version,
            name,
            queue_families,
            extensions,
            surface_support,
        }
    }

    /// Required extensions this device lacks, in request order.
    pub fn missing_extensions<'a>(&self, required: &[&'a CStr]) -> Vec<&'a CStr> {
        required
            .iter()
            .copied()
            .filter(|ext| !self.extensions.contains(ext.to_string_lossy().as_ref()))
            .collect()
    }

    /// Get a human-readable summary of the device.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{}",
            self.name,
            self.vendor,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version),
        )
    }
}
