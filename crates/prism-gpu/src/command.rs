//! Command buffer management.

use crate::error::{GpuError, Result};
use crate::teardown::TeardownStack;
use ash::vk;

/// Command pool for the graphics queue family.
pub struct CommandPool {
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually.
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn new(
        device: &ash::Device,
        queue_family: u32,
        teardown: &mut TeardownStack,
    ) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.create_command_pool(&create_info, None)? };

        let owned = device.clone();
        teardown.push("command pool", move || {
            // SAFETY: buffers from this pool are no longer executing once the device is idle
            unsafe { owned.destroy_command_pool(pool, None) };
        });

        Ok(Self { pool })
    }

    /// Allocate a single primary command buffer.
    ///
    /// Freed together with the pool.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate_primary(&self, device: &ash::Device) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { device.allocate_command_buffers(&alloc_info)? };
        buffers.into_iter().next().ok_or(GpuError::Vulkan(vk::Result::ERROR_UNKNOWN))
    }
}

/// Submit one command buffer to a queue.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn submit_command_buffer(
    device: &ash::Device,
    queue: vk::Queue,
    command_buffer: vk::CommandBuffer,
    wait_semaphore: vk::Semaphore,
    wait_stage: vk::PipelineStageFlags,
    signal_semaphore: vk::Semaphore,
    fence: vk::Fence,
) -> Result<()> {
    let command_buffers = [command_buffer];
    let wait_semaphores = [wait_semaphore];
    let wait_stages = [wait_stage];
    let signal_semaphores = [signal_semaphore];

    let submit_info = vk::SubmitInfo::default()
        .command_buffers(&command_buffers)
        .wait_semaphores(&wait_semaphores)
        .wait_dst_stage_mask(&wait_stages)
        .signal_semaphores(&signal_semaphores);

    unsafe {
        device
            .queue_submit(queue, &[submit_info], fence)
            .map_err(GpuError::Submission)?;
    }
    Ok(())
}
