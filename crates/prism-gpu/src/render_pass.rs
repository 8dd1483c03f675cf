//! Render pass and framebuffers for drawing into swapchain images.

use crate::error::{GpuError, Result};
use crate::swapchain::Swapchain;
use crate::teardown::TeardownStack;
use ash::vk;

/// A single-subpass render pass plus one framebuffer per swapchain view.
pub struct RenderTarget {
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
}

impl RenderTarget {
    /// Create the render pass for `swapchain`'s format and its framebuffers.
    ///
    /// # Safety
    /// The device and swapchain must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        swapchain: &Swapchain,
        teardown: &mut TeardownStack,
    ) -> Result<Self> {
        let render_pass = unsafe { create_render_pass(device, swapchain.format(), teardown)? };
        let extent = swapchain.extent();

        let mut framebuffers = Vec::with_capacity(swapchain.image_views().len());
        for &view in swapchain.image_views() {
            let attachments = [view];
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe { device.create_framebuffer(&create_info, None) }
                .map_err(|e| GpuError::SurfaceSetup(format!("Failed to create framebuffer: {e}")))?;

            let owned = device.clone();
            teardown.push("framebuffer", move || {
                // SAFETY: the device is idle before teardown runs
                unsafe { owned.destroy_framebuffer(framebuffer, None) };
            });

            framebuffers.push(framebuffer);
        }

        Ok(Self {
            render_pass,
            framebuffers,
            extent,
        })
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Framebuffers indexed by swapchain image index.
    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        &self.framebuffers
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

/// Attachment description for a cleared color target that ends up presentable.
pub fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
}

/// External dependency making the layout transition wait for the acquire semaphore.
pub fn acquire_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
}

/// # Safety
/// The device must be valid.
unsafe fn create_render_pass(
    device: &ash::Device,
    format: vk::Format,
    teardown: &mut TeardownStack,
) -> Result<vk::RenderPass> {
    let attachments = [color_attachment(format)];

    let color_refs = [vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];

    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];

    let dependencies = [acquire_dependency()];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = unsafe { device.create_render_pass(&create_info, None) }
        .map_err(|e| GpuError::SurfaceSetup(format!("Failed to create render pass: {e}")))?;

    let owned = device.clone();
    teardown.push("render pass", move || {
        // SAFETY: the pipeline and framebuffers using it are destroyed first
        unsafe { owned.destroy_render_pass(render_pass, None) };
    });

    Ok(render_pass)
}
