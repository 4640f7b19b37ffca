//! Shader modules, descriptor sets and the graphics pipeline
//!
//! The viewer renders with a single pipeline: one vertex and one
//! fragment shader, a uniform block at binding 0 and a combined image
//! sampler at binding 1. Viewport and scissor are dynamic so a resize
//! never forces pipeline recreation.

use ash::{vk, Device};
use std::path::Path;

use crate::render::mesh::Vertex;

use super::buffer::UniformBuffer;
use super::context::{VulkanError, VulkanResult};
use super::texture::Texture;
use super::ubo::UniformBufferObject;

/// SPIR-V shader module with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V bytes
    pub fn from_bytes(device: Device, bytes: &[u8]) -> VulkanResult<Self> {
        // SPIR-V is a stream of 32-bit words
        let (prefix, words, suffix) = unsafe { bytes.align_to::<u32>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "SPIR-V byte length or alignment is not a multiple of 4".to_string(),
            });
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);

        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, module })
    }

    /// Load a shader module from a compiled SPIR-V file
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> VulkanResult<Self> {
        let path_ref = path.as_ref();
        let bytes = std::fs::read(path_ref).map_err(|e| {
            VulkanError::InitializationFailed(format!(
                "Failed to read shader {:?}: {}",
                path_ref, e
            ))
        })?;
        log::debug!("Loaded shader {:?} ({} bytes)", path_ref, bytes.len());
        Self::from_bytes(device, &bytes)
    }

    /// Get the module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Check the vertex layout against the device's input limits
fn vertex_input_within_limits(
    limits: &vk::PhysicalDeviceLimits,
    binding_count: u32,
    attribute_count: u32,
) -> bool {
    binding_count <= limits.max_vertex_input_bindings
        && attribute_count <= limits.max_vertex_input_attributes
}

/// Descriptor pool and the per-frame descriptor sets
///
/// One set per frame-in-flight slot, each pointing at that slot's
/// uniform buffer and the shared texture.
pub struct DescriptorSets {
    device: Device,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorSets {
    /// Allocate and write the per-frame descriptor sets
    pub fn new(
        device: Device,
        layout: vk::DescriptorSetLayout,
        uniform_buffers: &[UniformBuffer<UniformBufferObject>],
        texture: &Texture,
    ) -> VulkanResult<Self> {
        let frame_count = uniform_buffers.len() as u32;

        let pool_sizes = [
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(frame_count)
                .build(),
            vk::DescriptorPoolSize::builder()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(frame_count)
                .build(),
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(frame_count);

        let pool = unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .map_err(VulkanError::Api)?
        };

        let layouts = vec![layout; frame_count as usize];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = unsafe {
            device
                .allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::Api)?
        };

        for (set, uniform_buffer) in sets.iter().zip(uniform_buffers) {
            let buffer_info = [vk::DescriptorBufferInfo::builder()
                .buffer(uniform_buffer.handle())
                .offset(0)
                .range(uniform_buffer.size())
                .build()];

            let image_info = [vk::DescriptorImageInfo::builder()
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_view(texture.view())
                .sampler(texture.sampler())
                .build()];

            let writes = [
                vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_info)
                    .build(),
                vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_info)
                    .build(),
            ];

            unsafe {
                device.update_descriptor_sets(&writes, &[]);
            }
        }

        Ok(Self { device, pool, sets })
    }

    /// Get the descriptor set for a frame slot
    pub fn set(&self, frame_index: usize) -> vk::DescriptorSet {
        self.sets[frame_index]
    }
}

impl Drop for DescriptorSets {
    fn drop(&mut self) {
        unsafe {
            // Sets are freed with the pool
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Graphics pipeline with its layout and descriptor set layout
pub struct GraphicsPipeline {
    device: Device,
    descriptor_set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
}

impl GraphicsPipeline {
    /// Build the viewer's single graphics pipeline
    pub fn new(
        device: Device,
        limits: &vk::PhysicalDeviceLimits,
        render_pass: vk::RenderPass,
        vert_shader: &ShaderModule,
        frag_shader: &ShaderModule,
    ) -> VulkanResult<Self> {
        let binding_descriptions = [Vertex::binding_description()];
        let attribute_descriptions = Vertex::attribute_descriptions();

        if !vertex_input_within_limits(
            limits,
            binding_descriptions.len() as u32,
            attribute_descriptions.len() as u32,
        ) {
            return Err(VulkanError::InvalidOperation {
                reason: "Vertex layout exceeds device input limits".to_string(),
            });
        }

        let descriptor_set_layout = Self::create_descriptor_set_layout(&device)?;

        let entry_point = std::ffi::CString::new("main").map_err(|_| {
            VulkanError::InvalidOperation {
                reason: "Shader entry point name contains a NUL byte".to_string(),
            }
        })?;

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_shader.handle())
                .name(&entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_shader.handle())
                .name(&entry_point)
                .build(),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&binding_descriptions)
            .vertex_attribute_descriptions(&attribute_descriptions);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Actual viewport and scissor are set at record time
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build();

        let blend_attachments = [color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let set_layouts = [descriptor_set_layout];
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&set_layouts);

        let pipeline_layout = unsafe {
            device
                .create_pipeline_layout(&layout_info, None)
                .map_err(VulkanError::Api)?
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(pipeline_layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let pipeline = unsafe {
            device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
                .map_err(|(_, e)| VulkanError::Api(e))?[0]
        };

        log::debug!("Created graphics pipeline");

        Ok(Self {
            device,
            descriptor_set_layout,
            pipeline_layout,
            pipeline,
        })
    }

    /// Uniform block at binding 0 (vertex), sampler at binding 1 (fragment)
    fn create_descriptor_set_layout(device: &Device) -> VulkanResult<vk::DescriptorSetLayout> {
        let bindings = [
            vk::DescriptorSetLayoutBinding::builder()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX)
                .build(),
            vk::DescriptorSetLayoutBinding::builder()
                .binding(1)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                .build(),
        ];

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);

        unsafe {
            device
                .create_descriptor_set_layout(&layout_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// Get the pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get the pipeline layout
    pub fn layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// Get the descriptor set layout
    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            self.device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout_fits_typical_limits() {
        let mut limits = vk::PhysicalDeviceLimits::default();
        limits.max_vertex_input_bindings = 16;
        limits.max_vertex_input_attributes = 16;

        let bindings = [Vertex::binding_description()].len() as u32;
        let attributes = Vertex::attribute_descriptions().len() as u32;
        assert!(vertex_input_within_limits(&limits, bindings, attributes));
    }

    #[test]
    fn test_vertex_layout_rejected_on_tiny_limits() {
        let mut limits = vk::PhysicalDeviceLimits::default();
        limits.max_vertex_input_bindings = 1;
        limits.max_vertex_input_attributes = 2;

        assert!(!vertex_input_within_limits(&limits, 1, 4));
    }
}
