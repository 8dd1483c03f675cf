//! Synchronization primitives.

use crate::error::Result;
use crate::teardown::TeardownStack;
use ash::vk;

/// Create a semaphore and register its destruction.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(
    device: &ash::Device,
    label: &'static str,
    teardown: &mut TeardownStack,
) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = unsafe { device.create_semaphore(&create_info, None)? };

    let owned = device.clone();
    teardown.push(label, move || {
        // SAFETY: the device is idle before teardown runs
        unsafe { owned.destroy_semaphore(semaphore, None) };
    });

    Ok(semaphore)
}

/// Create a fence and register its destruction.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(
    device: &ash::Device,
    signaled: bool,
    label: &'static str,
    teardown: &mut TeardownStack,
) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    let fence = unsafe { device.create_fence(&create_info, None)? };

    let owned = device.clone();
    teardown.push(label, move || {
        // SAFETY: the device is idle before teardown runs
        unsafe { owned.destroy_fence(fence, None) };
    });

    Ok(fence)
}

/// Synchronization objects for the single frame in flight.
///
/// The same three objects are reused every frame; the fence wait at the top
/// of each frame guarantees the previous submission consumed them.
#[derive(Debug, Clone, Copy)]
pub struct FrameSync {
    /// Signaled by acquire, waited on by submit.
    pub image_available: vk::Semaphore,
    /// Signaled by submit, waited on by present.
    pub render_finished: vk::Semaphore,
    /// Signaled when the frame's submission completes.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create frame synchronization resources.
    ///
    /// The fence starts signaled so the first frame does not block.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device, teardown: &mut TeardownStack) -> Result<Self> {
        unsafe {
            Ok(Self {
                image_available: create_semaphore(device, "image-available semaphore", teardown)?,
                render_finished: create_semaphore(device, "render-finished semaphore", teardown)?,
                in_flight: create_fence(device, true, "in-flight fence", teardown)?,
            })
        }
    }

    /// Block until the previous frame's submission has completed.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        unsafe { device.wait_for_fences(&[self.in_flight], true, u64::MAX)? };
        Ok(())
    }

    /// Return the fence to the unsignaled state.
    ///
    /// # Safety
    /// The device must be valid and the fence must not be pending.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        unsafe { device.reset_fences(&[self.in_flight])? };
        Ok(())
    }
}
