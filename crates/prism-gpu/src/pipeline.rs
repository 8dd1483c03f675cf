//! Graphics pipeline assembly.

use crate::error::{GpuError, Result};
use crate::shader::ShaderStages;
use crate::teardown::TeardownStack;
use ash::vk;

/// Fixed-function pipeline state.
///
/// Viewport and scissor are baked in; the pipeline has no dynamic state and
/// must be rebuilt if the swap extent changes.
#[derive(Debug, Clone, Copy)]
pub struct FixedFunctionState {
    pub topology: vk::PrimitiveTopology,
    pub viewport: vk::Viewport,
    pub scissor: vk::Rect2D,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub samples: vk::SampleCountFlags,
    pub blend_enable: bool,
    pub color_write_mask: vk::ColorComponentFlags,
}

impl FixedFunctionState {
    /// Triangle-list state covering the whole `extent`.
    pub fn for_extent(extent: vk::Extent2D) -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            viewport: vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            },
            scissor: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            samples: vk::SampleCountFlags::TYPE_1,
            blend_enable: false,
            color_write_mask: vk::ColorComponentFlags::RGBA,
        }
    }
}

/// A built pipeline and its (empty) layout.
#[derive(Debug, Clone, Copy)]
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

/// Builds graphics pipelines against a render pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipelineAssembler;

impl PipelineAssembler {
    pub const fn new() -> Self {
        Self
    }

    /// Create the pipeline layout and graphics pipeline for subpass 0 of `render_pass`.
    ///
    /// Shader modules live only for the duration of this call.
    ///
    /// # Safety
    /// The device and render pass must be valid and the shader code must be valid SPIR-V.
    pub unsafe fn build(
        &self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
        stages: &ShaderStages,
        state: &FixedFunctionState,
        teardown: &mut TeardownStack,
    ) -> Result<GraphicsPipeline> {
        // Modules are released when this scope ends, on success or failure
        let mut modules = TeardownStack::new();

        let vert_module =
            unsafe { create_shader_module(device, &stages.vertex, "vertex", &mut modules)? };
        let frag_module =
            unsafe { create_shader_module(device, &stages.fragment, "fragment", &mut modules)? };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module)
                .name(c"main"),
        ];

        // Vertices are generated in the vertex shader
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(state.topology)
            .primitive_restart_enable(false);

        let viewports = [state.viewport];
        let scissors = [state.scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(state.polygon_mode)
            .cull_mode(state.cull_mode)
            .front_face(state.front_face)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(state.samples)
            .sample_shading_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(state.blend_enable)
            .color_write_mask(state.color_write_mask)];

        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| GpuError::PipelineCreation(format!("Layout: {e}")))?;

        let owned = device.clone();
        teardown.push("pipeline layout", move || {
            // SAFETY: the pipeline using this layout is destroyed first
            unsafe { owned.destroy_pipeline_layout(layout, None) };
        });

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        }
        .map_err(|(_pipelines, e)| GpuError::PipelineCreation(e.to_string()))?;

        let pipeline = pipelines
            .into_iter()
            .next()
            .ok_or_else(|| GpuError::PipelineCreation("Driver returned no pipeline".to_string()))?;

        let owned = device.clone();
        teardown.push("graphics pipeline", move || {
            // SAFETY: the device is idle before teardown runs
            unsafe { owned.destroy_pipeline(pipeline, None) };
        });

        tracing::debug!("Graphics pipeline created");

        Ok(GraphicsPipeline { pipeline, layout })
    }
}

/// # Safety
/// The device must be valid and `code` must be valid SPIR-V.
unsafe fn create_shader_module(
    device: &ash::Device,
    code: &[u32],
    stage: &'static str,
    modules: &mut TeardownStack,
) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(code);
    let module = unsafe { device.create_shader_module(&create_info, None) }
        .map_err(|e| GpuError::PipelineCreation(format!("{stage} shader module: {e}")))?;

    let owned = device.clone();
    modules.push(stage, move || {
        // SAFETY: pipeline creation has returned
        unsafe { owned.destroy_shader_module(module, None) };
    });

    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_function_defaults() {
        let state = FixedFunctionState::for_extent(vk::Extent2D {
            width: 800,
            height: 600,
        });

        assert_eq!(state.topology, vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(state.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(state.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(state.front_face, vk::FrontFace::CLOCKWISE);
        assert_eq!(state.samples, vk::SampleCountFlags::TYPE_1);
        assert!(!state.blend_enable);
        assert_eq!(state.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn viewport_and_scissor_cover_extent() {
        let extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let state = FixedFunctionState::for_extent(extent);

        assert_eq!(state.viewport.width, 1280.0);
        assert_eq!(state.viewport.height, 720.0);
        assert_eq!(state.viewport.min_depth, 0.0);
        assert_eq!(state.viewport.max_depth, 1.0);
        assert_eq!(state.scissor.offset.x, 0);
        assert_eq!(state.scissor.extent, extent);
    }
}
