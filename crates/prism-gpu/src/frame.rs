//! Per-frame scheduling with a single frame in flight.
//!
//! Each iteration runs wait, acquire, reset, record, submit and present in
//! that order. The in-flight fence is the only CPU backpressure; the two
//! semaphores order acquire before rendering and rendering before present on
//! the GPU. [`FrameBackend`] isolates the device calls so the protocol can be
//! exercised without a GPU.

use crate::command::submit_command_buffer;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::pipeline::GraphicsPipeline;
use crate::render_pass::RenderTarget;
use crate::swapchain::Swapchain;
use crate::sync::FrameSync;
use ash::vk;

/// Device operations driven by [`FrameScheduler`].
pub trait FrameBackend {
    /// Block until the previous submission has signaled the in-flight fence.
    fn wait_in_flight(&mut self) -> Result<()>;

    /// Acquire the next swapchain image, signaling the image-available semaphore.
    fn acquire_image(&mut self) -> Result<u32>;

    /// Unsignal the in-flight fence.
    fn reset_in_flight(&mut self) -> Result<()>;

    /// Record the draw commands targeting `image_index`.
    fn record(&mut self, image_index: u32) -> Result<()>;

    /// Submit the recorded commands, signaling render-finished and the in-flight fence.
    fn submit(&mut self) -> Result<()>;

    /// Present `image_index` after render-finished. Returns `true` if suboptimal.
    fn present(&mut self, image_index: u32) -> Result<bool>;

    /// Block until the device has no pending work.
    fn wait_idle(&mut self) -> Result<()>;
}

/// Outcome of one presented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Zero-based index of this frame.
    pub frame: u64,
    /// Swapchain image the frame was drawn into.
    pub image_index: u32,
    /// The presentation engine reported the swapchain as suboptimal.
    pub suboptimal: bool,
}

/// Drives frames through a [`FrameBackend`].
pub struct FrameScheduler<B: FrameBackend> {
    backend: B,
    frames_presented: u64,
    suboptimal_reported: bool,
}

impl<B: FrameBackend> FrameScheduler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            frames_presented: 0,
            suboptimal_reported: false,
        }
    }

    /// Render and present one frame.
    ///
    /// Any error is fatal for the loop. The fence is only reset once an image
    /// has been acquired, so a failed acquire never leaves it unsignaled with
    /// nothing pending.
    pub fn draw_frame(&mut self) -> Result<FrameReport> {
        let _frame = tracing::trace_span!("frame", index = self.frames_presented).entered();

        tracing::trace_span!("wait").in_scope(|| self.backend.wait_in_flight())?;

        let image_index = tracing::trace_span!("acquire").in_scope(|| self.backend.acquire_image())?;

        self.backend.reset_in_flight()?;

        tracing::trace_span!("record").in_scope(|| self.backend.record(image_index))?;

        tracing::trace_span!("submit").in_scope(|| self.backend.submit())?;

        let suboptimal =
            tracing::trace_span!("present").in_scope(|| self.backend.present(image_index))?;

        if suboptimal {
            if self.suboptimal_reported {
                tracing::debug!("Swapchain suboptimal (frame {})", self.frames_presented);
            } else {
                tracing::warn!("Swapchain is suboptimal for the surface; continuing");
                self.suboptimal_reported = true;
            }
        }

        let report = FrameReport {
            frame: self.frames_presented,
            image_index,
            suboptimal,
        };
        self.frames_presented += 1;
        Ok(report)
    }

    /// Number of frames presented so far.
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Wait for all submitted work to finish; call before releasing resources.
    pub fn finish(&mut self) -> Result<()> {
        self.backend.wait_idle()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

/// [`FrameBackend`] issuing real Vulkan commands.
pub struct VulkanFrameBackend {
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    command_buffer: vk::CommandBuffer,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
    pipeline: vk::Pipeline,
    clear_color: [f32; 4],
    sync: FrameSync,
}

impl VulkanFrameBackend {
    /// Collect the handles needed to draw frames.
    ///
    /// # Safety
    /// Every handle must stay valid for the lifetime of the backend.
    pub unsafe fn new(
        gpu: &GpuContext,
        swapchain: &Swapchain,
        target: &RenderTarget,
        pipeline: &GraphicsPipeline,
        command_buffer: vk::CommandBuffer,
        sync: FrameSync,
        clear_color: [f32; 4],
    ) -> Self {
        Self {
            device: gpu.device().clone(),
            swapchain_loader: swapchain.loader().clone(),
            swapchain: swapchain.handle(),
            graphics_queue: gpu.graphics_queue(),
            present_queue: gpu.present_queue(),
            command_buffer,
            render_pass: target.render_pass(),
            framebuffers: target.framebuffers().to_vec(),
            extent: target.extent(),
            pipeline: pipeline.pipeline,
            clear_color,
            sync,
        }
    }
}

impl FrameBackend for VulkanFrameBackend {
    fn wait_in_flight(&mut self) -> Result<()> {
        unsafe { self.sync.wait(&self.device) }
    }

    fn acquire_image(&mut self) -> Result<u32> {
        let (image_index, suboptimal) = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                self.sync.image_available,
                vk::Fence::null(),
            )
        }
        .map_err(GpuError::ImageAcquisition)?;

        if suboptimal {
            tracing::debug!("Acquired image {image_index} from a suboptimal swapchain");
        }
        Ok(image_index)
    }

    fn reset_in_flight(&mut self) -> Result<()> {
        unsafe { self.sync.reset(&self.device) }
    }

    fn record(&mut self, image_index: u32) -> Result<()> {
        let framebuffer = *self
            .framebuffers
            .get(image_index as usize)
            .ok_or(GpuError::Recording(vk::Result::ERROR_UNKNOWN))?;

        let cmd = self.command_buffer;
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: self.clear_color,
            },
        }];

        let render_pass_begin = vk::RenderPassBeginInfo::default()
            .render_pass(self.render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: self.extent,
            })
            .clear_values(&clear_values);

        // SAFETY: the fence wait guarantees the command buffer is no longer executing
        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(GpuError::Recording)?;

            let begin_info = vk::CommandBufferBeginInfo::default();
            self.device
                .begin_command_buffer(cmd, &begin_info)
                .map_err(GpuError::Recording)?;

            self.device
                .cmd_begin_render_pass(cmd, &render_pass_begin, vk::SubpassContents::INLINE);
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
            self.device.cmd_draw(cmd, 3, 1, 0, 0);
            self.device.cmd_end_render_pass(cmd);

            self.device
                .end_command_buffer(cmd)
                .map_err(GpuError::Recording)?;
        }
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        unsafe {
            submit_command_buffer(
                &self.device,
                self.graphics_queue,
                self.command_buffer,
                self.sync.image_available,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                self.sync.render_finished,
                self.sync.in_flight,
            )
        }
    }

    fn present(&mut self, image_index: u32) -> Result<bool> {
        let wait_semaphores = [self.sync.render_finished];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        unsafe {
            self.swapchain_loader
                .queue_present(self.present_queue, &present_info)
        }
        .map_err(GpuError::Presentation)
    }

    fn wait_idle(&mut self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}
