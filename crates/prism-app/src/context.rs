//! Render context.

use std::sync::Arc;

use ash::vk;
use prism_gpu::{
    CommandPool, FixedFunctionState, FrameReport, FrameScheduler, FrameSync, GpuContextBuilder,
    PipelineAssembler, RenderTarget, SurfaceNegotiator, TeardownStack, VulkanFrameBackend,
};
use winit::window::Window;

use crate::config::AppConfig;

/// Everything needed to draw frames into one window.
///
/// All Vulkan objects are released in reverse creation order when the
/// context is dropped, after the device has gone idle.
pub struct RenderContext {
    scheduler: FrameScheduler<VulkanFrameBackend>,
    teardown: TeardownStack,
    // Keeps the surface's window alive until teardown has run
    window: Arc<Window>,
}

impl RenderContext {
    /// Build the full render setup for `window`.
    ///
    /// On failure everything created so far is released before returning.
    pub fn new(window: Arc<Window>, config: &AppConfig) -> anyhow::Result<Self> {
        // Fail on missing shaders before touching the driver
        let stages = config.shaders.load()?;

        let mut teardown = TeardownStack::new();

        // SAFETY: the window is owned by the context and outlives the teardown stack
        let gpu = unsafe { GpuContextBuilder::new(&config.gpu).build(window.as_ref(), &mut teardown)? };

        let size = window.inner_size();
        let window_extent = vk::Extent2D {
            width: size.width,
            height: size.height,
        };

        // SAFETY: all objects below are created from the live device and registered on `teardown`
        let scheduler = unsafe {
            let swapchain = SurfaceNegotiator::new().negotiate(&gpu, window_extent, &mut teardown)?;
            let target = RenderTarget::new(gpu.device(), &swapchain, &mut teardown)?;
            let pipeline = PipelineAssembler::new().build(
                gpu.device(),
                target.render_pass(),
                &stages,
                &FixedFunctionState::for_extent(swapchain.extent()),
                &mut teardown,
            )?;

            let command_pool =
                CommandPool::new(gpu.device(), gpu.queue_families().graphics, &mut teardown)?;
            let command_buffer = command_pool.allocate_primary(gpu.device())?;
            let sync = FrameSync::new(gpu.device(), &mut teardown)?;

            let backend = VulkanFrameBackend::new(
                &gpu,
                &swapchain,
                &target,
                &pipeline,
                command_buffer,
                sync,
                config.gpu.clear_color,
            );

            FrameScheduler::new(backend)
        };

        tracing::info!("Render context ready ({} objects)", teardown.len());

        Ok(Self {
            scheduler,
            teardown,
            window,
        })
    }

    /// Draw and present one frame.
    pub fn draw_frame(&mut self) -> anyhow::Result<FrameReport> {
        Ok(self.scheduler.draw_frame()?)
    }

    /// Number of frames presented so far.
    pub fn frames_presented(&self) -> u64 {
        self.scheduler.frames_presented()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        tracing::info!("Starting cleanup...");

        if let Err(e) = self.scheduler.finish() {
            tracing::error!("Failed to wait idle: {e}");
        }

        self.teardown.unwind();

        tracing::info!("Cleanup complete");
    }
}
