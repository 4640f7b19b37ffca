//! Frame orchestration: owns every GPU resource and draws the model
//!
//! [`VulkanRenderer`] wires the context, swapchain, pipeline, geometry
//! buffers, texture and per-frame synchronization into a single
//! `draw_frame` entry point. Two frames may be in flight; each frame
//! slot has its own command buffer, uniform buffer and sync objects.

use ash::vk;
use std::time::Instant;

use crate::assets::ImageData;
use crate::render::mesh::Mesh;

use super::buffer::{IndexBuffer, UniformBuffer, VertexBuffer};
use super::commands::CommandPool;
use super::context::{VulkanContext, VulkanError, VulkanResult};
use super::pipeline::{DescriptorSets, GraphicsPipeline, ShaderModule};
use super::swapchain::Swapchain;
use super::sync::FrameSync;
use super::texture::Texture;
use super::ubo::UniformBufferObject;
use super::window::Window;
use super::MAX_FRAMES_IN_FLIGHT;

/// Renderer drawing one textured, rotating mesh to a window
pub struct VulkanRenderer {
    // Declaration order is drop order: frame-scoped resources first,
    // the context last
    frame_sync: Vec<FrameSync>,
    descriptor_sets: DescriptorSets,
    uniform_buffers: Vec<UniformBuffer<UniformBufferObject>>,
    texture: Texture,
    index_buffer: IndexBuffer,
    vertex_buffer: VertexBuffer,
    pipeline: GraphicsPipeline,
    swapchain: Swapchain,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
    context: VulkanContext,

    mem_properties: vk::PhysicalDeviceMemoryProperties,
    current_frame: usize,
    start_time: Instant,
}

impl VulkanRenderer {
    /// Create a renderer for the window and upload the scene's resources
    pub fn new(
        window: &mut Window,
        app_name: &str,
        mesh: &Mesh,
        image: &ImageData,
        vert_shader_path: &std::path::Path,
        frag_shader_path: &std::path::Path,
    ) -> VulkanResult<Self> {
        let context = VulkanContext::new(window, app_name)?;
        let device = context.raw_device();

        let mem_properties = unsafe {
            context
                .instance()
                .get_physical_device_memory_properties(context.physical_device.device)
        };

        let (width, height) = window.get_framebuffer_size();
        let swapchain = Swapchain::new(
            context.instance(),
            device.clone(),
            context.surface,
            &context.surface_loader,
            &context.physical_device,
            &mem_properties,
            vk::Extent2D { width, height },
        )?;

        let vert_shader = ShaderModule::from_file(device.clone(), vert_shader_path)?;
        let frag_shader = ShaderModule::from_file(device.clone(), frag_shader_path)?;
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            &context.physical_device.properties.limits,
            swapchain.render_pass(),
            &vert_shader,
            &frag_shader,
        )?;

        let command_pool = CommandPool::new(device.clone(), context.device.graphics_family)?;
        let command_buffers = command_pool.allocate_primary(MAX_FRAMES_IN_FLIGHT as u32)?;

        let vertex_buffer = VertexBuffer::new(
            device.clone(),
            &mem_properties,
            &command_pool,
            context.graphics_queue(),
            &mesh.vertices,
        )?;
        let index_buffer = IndexBuffer::new(
            device.clone(),
            &mem_properties,
            &command_pool,
            context.graphics_queue(),
            &mesh.indices,
        )?;

        let texture = Texture::from_image_data(
            device.clone(),
            &mem_properties,
            &context.physical_device.properties.limits,
            &command_pool,
            context.graphics_queue(),
            image,
        )?;

        let mut uniform_buffers = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            uniform_buffers.push(UniformBuffer::new(device.clone(), &mem_properties)?);
        }

        let descriptor_sets = DescriptorSets::new(
            device.clone(),
            pipeline.descriptor_set_layout(),
            &uniform_buffers,
            &texture,
        )?;

        let mut frame_sync = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            frame_sync.push(FrameSync::new(device.clone())?);
        }

        log::info!(
            "Renderer ready: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(Self {
            frame_sync,
            descriptor_sets,
            uniform_buffers,
            texture,
            index_buffer,
            vertex_buffer,
            pipeline,
            swapchain,
            command_buffers,
            command_pool,
            context,
            mem_properties,
            current_frame: 0,
            start_time: Instant::now(),
        })
    }

    /// Render one frame and present it
    ///
    /// Waits for this frame slot's previous submission, acquires a
    /// swapchain image, updates the uniform buffer for the elapsed time,
    /// records and submits the draw, then presents. An out-of-date
    /// swapchain triggers recreation and skips the frame.
    pub fn draw_frame(&mut self, window: &mut Window) -> VulkanResult<()> {
        let device = self.context.raw_device();
        let sync = &self.frame_sync[self.current_frame];

        sync.in_flight.wait(u64::MAX)?;

        // Acquire before resetting the fence so a skipped frame leaves
        // the fence signaled for the next attempt
        let acquire_result = unsafe {
            self.swapchain.loader().acquire_next_image(
                self.swapchain.handle(),
                u64::MAX,
                sync.image_available.handle(),
                vk::Fence::null(),
            )
        };

        let image_index = match acquire_result {
            Ok((index, _suboptimal)) => index,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                log::debug!("Swapchain out of date on acquire");
                self.recreate_swapchain(window)?;
                return Ok(());
            }
            Err(e) => return Err(VulkanError::Api(e)),
        };

        sync.in_flight.reset()?;

        self.update_uniform_buffer();

        let command_buffer = self.command_buffers[self.current_frame];
        unsafe {
            device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::Api)?;
        }
        self.record_commands(command_buffer, image_index)?;

        let wait_semaphores = [sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [sync.render_finished.handle()];
        let command_buffers = [command_buffer];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            device
                .queue_submit(
                    self.context.graphics_queue(),
                    &[submit_info],
                    sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        let swapchains = [self.swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present_result = unsafe {
            self.swapchain
                .loader()
                .queue_present(self.context.present_queue(), &present_info)
        };

        let resized = window.take_framebuffer_resized();
        match present_result {
            Ok(suboptimal) if suboptimal || resized => {
                self.recreate_swapchain(window)?;
            }
            Ok(_) => {}
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                self.recreate_swapchain(window)?;
            }
            Err(e) => return Err(VulkanError::Api(e)),
        }

        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(())
    }

    /// Block until the device has finished all in-flight work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }

    fn update_uniform_buffer(&self) {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let extent = self.swapchain.extent();
        let aspect = extent.width as f32 / extent.height as f32;

        let ubo = UniformBufferObject::for_time(elapsed, aspect);
        self.uniform_buffers[self.current_frame].update(&ubo);
    }

    fn record_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> VulkanResult<()> {
        let device = self.context.raw_device();
        let extent = self.swapchain.extent();

        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(self.swapchain.render_pass())
            .framebuffer(self.swapchain.framebuffer(image_index))
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        unsafe {
            device.cmd_begin_render_pass(
                command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );

            device.cmd_bind_pipeline(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.handle(),
            );

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(command_buffer, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            device.cmd_set_scissor(command_buffer, 0, &[scissor]);

            device.cmd_bind_vertex_buffers(
                command_buffer,
                0,
                &[self.vertex_buffer.handle()],
                &[0],
            );
            device.cmd_bind_index_buffer(
                command_buffer,
                self.index_buffer.handle(),
                0,
                vk::IndexType::UINT32,
            );

            device.cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout(),
                0,
                &[self.descriptor_sets.set(self.current_frame)],
                &[],
            );

            device.cmd_draw_indexed(command_buffer, self.index_buffer.index_count(), 1, 0, 0, 0);

            device.cmd_end_render_pass(command_buffer);

            device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::Api)?;
        }

        Ok(())
    }

    /// Rebuild the swapchain for the current framebuffer size
    ///
    /// Blocks while the window is minimized. The pipeline is untouched:
    /// the new render pass is compatible and viewport/scissor are dynamic.
    fn recreate_swapchain(&mut self, window: &mut Window) -> VulkanResult<()> {
        window.wait_while_minimized();
        self.context.wait_idle()?;

        let (width, height) = window.get_framebuffer_size();
        let new_swapchain = Swapchain::recreate(
            self.context.instance(),
            self.context.raw_device(),
            self.context.surface,
            &self.context.surface_loader,
            &self.context.physical_device,
            &self.mem_properties,
            vk::Extent2D { width, height },
            self.swapchain.handle(),
        )?;

        // The old swapchain drops here, after the new one was chained to it
        self.swapchain = new_swapchain;
        Ok(())
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        // GPU work must finish before any resource teardown
        let _ = self.context.wait_idle();
    }
}
