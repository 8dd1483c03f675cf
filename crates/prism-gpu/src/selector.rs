//! Physical device selection.
//!
//! Devices are profiled once, filtered by hard requirements (graphics and
//! present queue families, required extensions, a usable surface) and the
//! survivors are ranked by a [`DeviceScorer`]. The highest score wins; ties go
//! to the device enumerated first.

use crate::capabilities::DeviceProfile;
use crate::config::{GpuConfig, VendorPreference};
use crate::error::{GpuError, Result};
use crate::surface::Surface;
use ash::vk;
use std::ffi::CStr;
use std::fmt;

/// Capabilities of one queue family that matter for selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilySupport {
    pub graphics: bool,
    pub present: bool,
}

/// Graphics and present queue family indices, either of which may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both a graphics and a present family were found.
    pub const fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// The resolved pair, if complete.
    pub const fn resolve(&self) -> Option<QueueFamilies> {
        match (self.graphics, self.present) {
            (Some(graphics), Some(present)) => Some(QueueFamilies { graphics, present }),
            _ => None,
        }
    }
}

/// Resolved graphics and present queue families of the selected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Whether one family serves both graphics and presentation.
    pub const fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct family indices, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// Scan queue families in index order, keeping the first graphics-capable and
/// the first present-capable family. Stops pulling from `families` as soon as
/// both are known.
pub fn find_queue_families(
    families: impl IntoIterator<Item = QueueFamilySupport>,
) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (family, index) in families.into_iter().zip(0u32..) {
        if family.graphics && indices.graphics.is_none() {
            indices.graphics = Some(index);
        }
        if family.present && indices.present.is_none() {
            indices.present = Some(index);
        }
        if indices.is_complete() {
            break;
        }
    }

    indices
}

/// Why a device was excluded from ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unsuitability {
    IncompleteQueueFamilies(QueueFamilyIndices),
    MissingExtensions(Vec<String>),
    NoSurfaceFormats,
    NoPresentModes,
    ZeroScore,
}

impl fmt::Display for Unsuitability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteQueueFamilies(indices) => write!(
                f,
                "incomplete queue families (graphics: {:?}, present: {:?})",
                indices.graphics, indices.present
            ),
            Self::MissingExtensions(missing) => write!(f, "missing extensions {missing:?}"),
            Self::NoSurfaceFormats => write!(f, "no surface formats"),
            Self::NoPresentModes => write!(f, "no present modes"),
            Self::ZeroScore => write!(f, "scored as unusable"),
        }
    }
}

/// Check the hard requirements for `profile`, returning its queue families.
pub fn check_suitability(
    profile: &DeviceProfile,
    required_extensions: &[&CStr],
) -> std::result::Result<QueueFamilies, Unsuitability> {
    let families = profile
        .queue_families
        .resolve()
        .ok_or(Unsuitability::IncompleteQueueFamilies(profile.queue_families))?;

    let missing = profile.missing_extensions(required_extensions);
    if !missing.is_empty() {
        return Err(Unsuitability::MissingExtensions(
            missing
                .iter()
                .map(|ext| ext.to_string_lossy().into_owned())
                .collect(),
        ));
    }

    if profile.surface_support.formats.is_empty() {
        return Err(Unsuitability::NoSurfaceFormats);
    }
    if profile.surface_support.present_modes.is_empty() {
        return Err(Unsuitability::NoPresentModes);
    }

    Ok(families)
}

/// Ranks devices that passed the hard requirements. Zero means unusable.
pub trait DeviceScorer {
    fn score(&self, profile: &DeviceProfile) -> u32;
}

/// Default heuristic: base score 1, +1 for the integrated vendor pattern, +2
/// for the discrete vendor pattern, matched against the device name.
#[derive(Debug, Clone, Default)]
pub struct VendorNameScorer {
    preference: VendorPreference,
}

impl VendorNameScorer {
    pub const fn new(preference: VendorPreference) -> Self {
        Self { preference }
    }
}

impl DeviceScorer for VendorNameScorer {
    fn score(&self, profile: &DeviceProfile) -> u32 {
        let mut score = 1;
        if profile.name.contains(&self.preference.integrated) {
            score += 1;
        } else if profile.name.contains(&self.preference.discrete) {
            score += 2;
        }
        score
    }
}

/// The selected physical device.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Physical device handle.
    pub handle: vk::PhysicalDevice,
    /// Device name.
    pub name: String,
    /// Score assigned by the scorer (always > 0).
    pub score: u32,
    /// Graphics and present queue families.
    pub queue_families: QueueFamilies,
    /// Full profile captured during selection.
    pub profile: DeviceProfile,
}

/// Picks the physical device to render with.
pub struct DeviceSelector {
    required_extensions: Vec<&'static CStr>,
    scorer: Box<dyn DeviceScorer>,
}

impl DeviceSelector {
    /// Selector using the config's required extensions and vendor preference.
    pub fn new(config: &GpuConfig) -> Self {
        Self {
            required_extensions: config.device_extensions.clone(),
            scorer: Box::new(VendorNameScorer::new(config.vendor_preference.clone())),
        }
    }

    /// Replace the scoring rule.
    #[must_use]
    pub fn with_scorer(mut self, scorer: impl DeviceScorer + 'static) -> Self {
        self.scorer = Box::new(scorer);
        self
    }

    /// Enumerate, profile and rank the instance's physical devices.
    ///
    /// # Safety
    /// The instance and surface must be valid.
    pub unsafe fn select(&self, instance: &ash::Instance, surface: &Surface) -> Result<DeviceCandidate> {
        let devices = unsafe { instance.enumerate_physical_devices()? };

        if devices.is_empty() {
            return Err(GpuError::NoDevicesFound);
        }

        let profiles = devices
            .into_iter()
            .map(|device| unsafe { DeviceProfile::query(instance, device, surface) })
            .collect();

        self.rank(profiles)
    }

    /// Pick the best suitable profile. Ties go to the earliest profile.
    pub fn rank(&self, profiles: Vec<DeviceProfile>) -> Result<DeviceCandidate> {
        if profiles.is_empty() {
            return Err(GpuError::NoDevicesFound);
        }

        let mut best: Option<DeviceCandidate> = None;

        for profile in profiles {
            let scored = check_suitability(&profile, &self.required_extensions).and_then(|families| {
                match self.scorer.score(&profile) {
                    0 => Err(Unsuitability::ZeroScore),
                    score => Ok((families, score)),
                }
            });

            let (queue_families, score) = match scored {
                Ok(scored) => scored,
                Err(reason) => {
                    tracing::debug!("Rejecting GPU {}: {}", profile.name, reason);
                    continue;
                }
            };

            tracing::debug!("GPU {} scored {}", profile.name, score);

            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(DeviceCandidate {
                    handle: profile.handle,
                    name: profile.name.clone(),
                    score,
                    queue_families,
                    profile,
                });
            }
        }

        best.ok_or(GpuError::NoSuitableDevice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::GpuVendor;
    use crate::surface::SurfaceSupport;
    use ash::vk::Handle;

    const GRAPHICS: QueueFamilySupport = QueueFamilySupport {
        graphics: true,
        present: false,
    };
    const PRESENT: QueueFamilySupport = QueueFamilySupport {
        graphics: false,
        present: true,
    };
    const BOTH: QueueFamilySupport = QueueFamilySupport {
        graphics: true,
        present: true,
    };
    const NEITHER: QueueFamilySupport = QueueFamilySupport {
        graphics: false,
        present: false,
    };

    fn usable_surface() -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    fn profile(id: u64, name: &str) -> DeviceProfile {
        DeviceProfile {
            handle: vk::PhysicalDevice::from_raw(id),
            name: name.to_string(),
            vendor: GpuVendor::Other(0),
            device_type: vk::PhysicalDeviceType::OTHER,
            api_version: vk::API_VERSION_1_0,
            queue_families: QueueFamilyIndices {
                graphics: Some(0),
                present: Some(0),
            },
            extensions: ["VK_KHR_swapchain".to_string()].into_iter().collect(),
            surface_support: usable_surface(),
        }
    }

    fn selector() -> DeviceSelector {
        DeviceSelector::new(&GpuConfig::default())
    }

    #[test]
    fn queue_scan_prefers_first_matches() {
        let indices = find_queue_families([NEITHER, GRAPHICS, GRAPHICS, PRESENT, BOTH]);
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(3));
    }

    #[test]
    fn queue_scan_single_family_serves_both() {
        let indices = find_queue_families([BOTH, BOTH]);
        let families = indices.resolve().unwrap();
        assert_eq!(families, QueueFamilies { graphics: 0, present: 0 });
        assert!(families.is_shared());
        assert_eq!(families.unique(), [0]);
    }

    #[test]
    fn queue_scan_stops_once_complete() {
        let mut pulled = 0;
        let families = [GRAPHICS, PRESENT, BOTH, BOTH].into_iter().inspect(|_| pulled += 1);

        let indices = find_queue_families(families);

        assert!(indices.is_complete());
        assert_eq!(pulled, 2);
    }

    #[test]
    fn queue_scan_incomplete_without_present() {
        let indices = find_queue_families([GRAPHICS, NEITHER]);
        assert!(!indices.is_complete());
        assert_eq!(indices.resolve(), None);
    }

    #[test]
    fn distinct_families_are_not_shared() {
        let families = QueueFamilies { graphics: 0, present: 2 };
        assert!(!families.is_shared());
        assert_eq!(families.unique(), [0, 2]);
    }

    #[test]
    fn vendor_scoring() {
        let scorer = VendorNameScorer::default();
        assert_eq!(scorer.score(&profile(1, "llvmpipe (LLVM 15.0.7, 256 bits)")), 1);
        assert_eq!(scorer.score(&profile(2, "Intel(R) UHD Graphics 630")), 2);
        assert_eq!(scorer.score(&profile(3, "NVIDIA GeForce RTX 3080")), 3);
    }

    #[test]
    fn selects_highest_score() {
        let candidate = selector()
            .rank(vec![
                profile(1, "Intel(R) UHD Graphics 630"),
                profile(2, "NVIDIA GeForce RTX 3080"),
                profile(3, "llvmpipe"),
            ])
            .unwrap();

        assert_eq!(candidate.handle, vk::PhysicalDevice::from_raw(2));
        assert_eq!(candidate.score, 3);
        assert_eq!(candidate.name, "NVIDIA GeForce RTX 3080");
    }

    #[test]
    fn ties_resolve_to_enumeration_order() {
        let candidate = selector()
            .rank(vec![
                profile(1, "llvmpipe"),
                profile(2, "NVIDIA GeForce GTX 1060"),
                profile(3, "NVIDIA GeForce RTX 4090"),
            ])
            .unwrap();

        assert_eq!(candidate.handle, vk::PhysicalDevice::from_raw(2));
    }

    #[test]
    fn unsuitable_devices_are_skipped_even_if_preferred() {
        let mut nvidia = profile(1, "NVIDIA GeForce RTX 3080");
        nvidia.extensions.clear();

        let candidate = selector()
            .rank(vec![nvidia, profile(2, "llvmpipe")])
            .unwrap();

        assert_eq!(candidate.handle, vk::PhysicalDevice::from_raw(2));
        assert_eq!(candidate.score, 1);
    }

    #[test]
    fn every_predicate_rejects() {
        let mut no_graphics = profile(1, "a");
        no_graphics.queue_families.graphics = None;

        let mut no_present = profile(2, "b");
        no_present.queue_families.present = None;

        let mut no_extension = profile(3, "c");
        no_extension.extensions = ["VK_KHR_maintenance1".to_string()].into_iter().collect();

        let mut no_formats = profile(4, "d");
        no_formats.surface_support.formats.clear();

        let mut no_modes = profile(5, "e");
        no_modes.surface_support.present_modes.clear();

        let required = [c"VK_KHR_swapchain"];
        assert!(matches!(
            check_suitability(&no_graphics, &required),
            Err(Unsuitability::IncompleteQueueFamilies(_))
        ));
        assert!(matches!(
            check_suitability(&no_present, &required),
            Err(Unsuitability::IncompleteQueueFamilies(_))
        ));
        assert_eq!(
            check_suitability(&no_extension, &required),
            Err(Unsuitability::MissingExtensions(vec!["VK_KHR_swapchain".to_string()]))
        );
        assert_eq!(
            check_suitability(&no_formats, &required),
            Err(Unsuitability::NoSurfaceFormats)
        );
        assert_eq!(
            check_suitability(&no_modes, &required),
            Err(Unsuitability::NoPresentModes)
        );

        let result = selector().rank(vec![no_graphics, no_present, no_extension, no_formats, no_modes]);
        assert!(matches!(result, Err(GpuError::NoSuitableDevice)));
    }

    #[test]
    fn empty_device_list_is_not_found() {
        assert!(matches!(selector().rank(vec![]), Err(GpuError::NoDevicesFound)));
    }

    #[test]
    fn custom_scorer_can_veto() {
        struct DiscreteOnly;
        impl DeviceScorer for DiscreteOnly {
            fn score(&self, profile: &DeviceProfile) -> u32 {
                u32::from(profile.device_type == vk::PhysicalDeviceType::DISCRETE_GPU) * 10
            }
        }

        let mut discrete = profile(2, "Radeon RX 7900");
        discrete.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;

        let selector = selector().with_scorer(DiscreteOnly);
        let candidate = selector
            .rank(vec![profile(1, "Intel(R) Iris Xe"), discrete])
            .unwrap();
        assert_eq!(candidate.handle, vk::PhysicalDevice::from_raw(2));

        let result = selector.rank(vec![profile(1, "Intel(R) Iris Xe")]);
        assert!(matches!(result, Err(GpuError::NoSuitableDevice)));
    }

    #[test]
    fn selection_matches_brute_force_maximum() {
        let names = ["llvmpipe", "Intel(R) Arc A770", "NVIDIA RTX A2000"];
        // Every combination of three devices, each possibly broken
        for mask in 0..(1u32 << 6) {
            let profiles: Vec<DeviceProfile> = (0..3u64)
                .map(|i| {
                    let bits = mask >> (i * 2);
                    let mut p = profile(i + 1, names[(bits & 1) as usize + usize::from(i == 2)]);
                    if bits & 2 != 0 {
                        p.queue_families.present = None;
                    }
                    p
                })
                .collect();

            let scorer = VendorNameScorer::default();
            let expected = profiles
                .iter()
                .filter(|p| p.queue_families.is_complete())
                .fold(None::<&DeviceProfile>, |best, p| match best {
                    Some(b) if scorer.score(b) >= scorer.score(p) => Some(b),
                    _ => Some(p),
                })
                .map(|p| p.handle);

            let result = selector().rank(profiles).ok().map(|c| c.handle);
            assert_eq!(result, expected, "mask {mask:#b}");
        }
    }
}
