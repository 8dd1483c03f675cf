//! Swapchain negotiation and creation.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::selector::QueueFamilies;
use crate::surface::SurfaceSupport;
use crate::teardown::TeardownStack;
use ash::vk;

/// How swapchain images are shared between queue families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    /// One family owns the images; no ownership transfer needed.
    Exclusive,
    /// Graphics and present families access the images concurrently.
    Concurrent { graphics: u32, present: u32 },
}

impl ImageSharing {
    /// Exclusive for a shared family, concurrent across two distinct ones.
    pub const fn for_families(families: QueueFamilies) -> Self {
        if families.is_shared() {
            Self::Exclusive
        } else {
            Self::Concurrent {
                graphics: families.graphics,
                present: families.present,
            }
        }
    }
}

/// Negotiated swapchain parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfiguration {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub sharing: ImageSharing,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfiguration {
    /// Choose swapchain parameters from what the surface supports.
    ///
    /// `support.formats` must not be empty; device selection guarantees that.
    pub fn negotiate(
        support: &SurfaceSupport,
        families: QueueFamilies,
        window_extent: vk::Extent2D,
    ) -> Self {
        Self {
            surface_format: select_surface_format(&support.formats),
            present_mode: select_present_mode(&support.present_modes),
            extent: calculate_extent(&support.capabilities, window_extent),
            image_count: calculate_image_count(&support.capabilities),
            sharing: ImageSharing::for_families(families),
            pre_transform: support.capabilities.current_transform,
        }
    }
}

/// Select the best surface format.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    // Prefer SRGB
    for format in available {
        if format.format == vk::Format::B8G8R8A8_SRGB
            && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        {
            return *format;
        }
    }

    // Fall back to first available
    available[0]
}

/// Select the best present mode.
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    // Prefer mailbox (triple buffering)
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        return vk::PresentModeKHR::MAILBOX;
    }
    // FIFO is always supported
    vk::PresentModeKHR::FIFO
}

/// Calculate swapchain extent.
///
/// A surface reporting `u32::MAX` as its current width lets the swapchain
/// decide, in which case the window size is clamped to the supported range.
/// If a driver reports a minimum above the maximum, the minimum wins.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
        vk::Extent2D {
            width: window_extent.width.min(max.width).max(min.width),
            height: window_extent.height.min(max.height).max(min.height),
        }
    }
}

/// One more than the minimum, capped by a nonzero maximum.
///
/// A maximum below the minimum is ignored.
pub fn calculate_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let (min, max) = (capabilities.min_image_count, capabilities.max_image_count);
    let image_count = min.saturating_add(1);
    if max >= min && max > 0 {
        image_count.min(max)
    } else {
        image_count
    }
}

/// Swapchain images and one view per image.
pub struct Swapchain {
    pub(crate) swapchain: vk::SwapchainKHR,
    pub(crate) loader: ash::khr::swapchain::Device,
    image_views: Vec<vk::ImageView>,
    config: SwapchainConfiguration,
}

impl Swapchain {
    /// Get the raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get the swapchain extension loader.
    pub fn loader(&self) -> &ash::khr::swapchain::Device {
        &self.loader
    }

    /// One view per swapchain image, in swapchain index order.
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    pub fn format(&self) -> vk::Format {
        self.config.surface_format.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }
}

/// Negotiates and builds the swapchain for the context's surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurfaceNegotiator;

impl SurfaceNegotiator {
    pub const fn new() -> Self {
        Self
    }

    /// Query the surface, negotiate parameters and build the swapchain and views.
    ///
    /// `window_extent` is only used when the surface has no definite size.
    ///
    /// # Safety
    /// The GPU context must be valid.
    pub unsafe fn negotiate(
        &self,
        gpu: &GpuContext,
        window_extent: vk::Extent2D,
        teardown: &mut TeardownStack,
    ) -> Result<Swapchain> {
        let support = unsafe { gpu.surface().support(gpu.physical_device().handle) }
            .map_err(|e| GpuError::SurfaceSetup(format!("Failed to query surface support: {e}")))?;

        if !support.is_adequate() {
            return Err(GpuError::SurfaceSetup(
                "Surface reports no formats or present modes".to_string(),
            ));
        }

        let config = SwapchainConfiguration::negotiate(&support, gpu.queue_families(), window_extent);

        unsafe { create_swapchain(gpu, config, teardown) }
    }
}

/// Create the swapchain and one view per returned image.
///
/// # Safety
/// The GPU context must be valid.
unsafe fn create_swapchain(
    gpu: &GpuContext,
    config: SwapchainConfiguration,
    teardown: &mut TeardownStack,
) -> Result<Swapchain> {
    let loader = ash::khr::swapchain::Device::new(gpu.instance(), gpu.device());

    let family_indices = match config.sharing {
        ImageSharing::Exclusive => vec![],
        ImageSharing::Concurrent { graphics, present } => vec![graphics, present],
    };
    let sharing_mode = match config.sharing {
        ImageSharing::Exclusive => vk::SharingMode::EXCLUSIVE,
        ImageSharing::Concurrent { .. } => vk::SharingMode::CONCURRENT,
    };

    let create_info = vk::SwapchainCreateInfoKHR::default()
        .surface(gpu.surface().handle)
        .min_image_count(config.image_count)
        .image_format(config.surface_format.format)
        .image_color_space(config.surface_format.color_space)
        .image_extent(config.extent)
        .image_array_layers(1)
        .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
        .image_sharing_mode(sharing_mode)
        .queue_family_indices(&family_indices)
        .pre_transform(config.pre_transform)
        .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
        .present_mode(config.present_mode)
        .clipped(true)
        .old_swapchain(vk::SwapchainKHR::null());

    let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
        .map_err(|e| GpuError::SurfaceSetup(format!("Failed to create swapchain: {e}")))?;

    let owned = loader.clone();
    teardown.push("swapchain", move || {
        // SAFETY: views and framebuffers over the images are destroyed first
        unsafe { owned.destroy_swapchain(swapchain, None) };
    });

    // The driver may create more images than requested
    let images = unsafe { loader.get_swapchain_images(swapchain) }
        .map_err(|e| GpuError::SurfaceSetup(format!("Failed to get swapchain images: {e}")))?;

    let mut image_views = Vec::with_capacity(images.len());
    for &image in &images {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(config.surface_format.format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        let view = unsafe { gpu.device().create_image_view(&view_info, None) }
            .map_err(|e| GpuError::SurfaceSetup(format!("Failed to create image view: {e}")))?;

        let device = gpu.device().clone();
        teardown.push("swapchain image view", move || {
            // SAFETY: the framebuffer using this view is destroyed first
            unsafe { device.destroy_image_view(view, None) };
        });

        image_views.push(view);
    }

    tracing::info!(
        "Swapchain created: {}x{} ({} images, {:?}, {:?}, {:?})",
        config.extent.width,
        config.extent.height,
        images.len(),
        config.surface_format.format,
        config.present_mode,
        config.sharing,
    );

    Ok(Swapchain {
        swapchain,
        loader,
        image_views,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min_count: u32, max_count: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_count,
            max_image_count: max_count,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn image_count_unbounded_max() {
        assert_eq!(calculate_image_count(&caps(2, 0)), 3);
    }

    #[test]
    fn image_count_clamped_to_max() {
        assert_eq!(calculate_image_count(&caps(2, 2)), 2);
        assert_eq!(calculate_image_count(&caps(2, 8)), 3);
    }

    #[test]
    fn image_count_within_bounds() {
        let values = [0, 1, 2, 3, 5, 8, u32::MAX - 1, u32::MAX];
        for &min in &values {
            for &max in &values {
                let count = calculate_image_count(&caps(min, max));
                assert!(count >= min, "min {min} max {max} -> {count}");
                if max > 0 && max >= min {
                    assert!(count <= max, "min {min} max {max} -> {count}");
                }
            }
        }
    }

    #[test]
    fn image_count_saturates_at_u32_max() {
        assert_eq!(calculate_image_count(&caps(u32::MAX, 0)), u32::MAX);
        assert_eq!(calculate_image_count(&caps(u32::MAX, u32::MAX)), u32::MAX);
    }

    #[test]
    fn image_count_ignores_maximum_below_minimum() {
        assert_eq!(calculate_image_count(&caps(4, 2)), 5);
    }

    #[test]
    fn extent_uses_window_hint_when_undefined() {
        assert_eq!(calculate_extent(&caps(2, 0), extent(800, 600)), extent(800, 600));
    }

    #[test]
    fn extent_uses_definite_current_extent() {
        let mut capabilities = caps(2, 0);
        capabilities.current_extent = extent(1024, 768);
        assert_eq!(calculate_extent(&capabilities, extent(800, 600)), extent(1024, 768));
    }

    #[test]
    fn extent_clamped_per_axis() {
        let mut capabilities = caps(2, 0);
        capabilities.min_image_extent = extent(64, 64);
        capabilities.max_image_extent = extent(1920, 1080);

        assert_eq!(calculate_extent(&capabilities, extent(0, 5000)), extent(64, 1080));
        assert_eq!(calculate_extent(&capabilities, extent(3000, 10)), extent(1920, 64));
    }

    #[test]
    fn extent_never_outside_bounds() {
        let bounds = [(1, 4096), (16, 16), (100, 200), (0, u32::MAX - 1)];
        let hints = [0, 1, 15, 16, 150, 200, 4096, u32::MAX - 1, u32::MAX];
        for &(min, max) in &bounds {
            let mut capabilities = caps(2, 0);
            capabilities.min_image_extent = extent(min, min);
            capabilities.max_image_extent = extent(max, max);
            for &w in &hints {
                for &h in &hints {
                    let chosen = calculate_extent(&capabilities, extent(w, h));
                    assert!((min..=max).contains(&chosen.width));
                    assert!((min..=max).contains(&chosen.height));
                }
            }
        }
    }

    #[test]
    fn inverted_extent_bounds_resolve_to_minimum() {
        let mut capabilities = caps(2, 0);
        capabilities.min_image_extent = extent(100, 100);
        capabilities.max_image_extent = extent(50, 50);

        assert_eq!(calculate_extent(&capabilities, extent(800, 600)), extent(100, 100));
        assert_eq!(calculate_extent(&capabilities, extent(10, 75)), extent(100, 100));
    }

    #[test]
    fn prefers_srgb_bgra() {
        let preferred = format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR);
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            preferred,
        ];
        assert_eq!(select_surface_format(&formats), preferred);
    }

    #[test]
    fn falls_back_to_first_format() {
        let only = format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT);
        assert_eq!(select_surface_format(&[only]), only);
    }

    #[test]
    fn present_mode_prefers_mailbox() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(select_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED];
        assert_eq!(select_present_mode(&modes), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn sharing_follows_queue_families() {
        assert_eq!(
            ImageSharing::for_families(QueueFamilies { graphics: 1, present: 1 }),
            ImageSharing::Exclusive
        );
        assert_eq!(
            ImageSharing::for_families(QueueFamilies { graphics: 0, present: 2 }),
            ImageSharing::Concurrent { graphics: 0, present: 2 }
        );
    }

    #[test]
    fn negotiate_combines_choices() {
        let support = SurfaceSupport {
            capabilities: caps(2, 0),
            formats: vec![format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR)],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };

        let config = SwapchainConfiguration::negotiate(
            &support,
            QueueFamilies { graphics: 0, present: 0 },
            extent(800, 600),
        );

        assert_eq!(config.surface_format, support.formats[0]);
        assert_eq!(config.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!(config.extent, extent(800, 600));
        assert_eq!(config.image_count, 3);
        assert_eq!(config.sharing, ImageSharing::Exclusive);
    }
}
