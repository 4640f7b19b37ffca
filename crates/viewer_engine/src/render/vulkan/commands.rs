//! Command pool and one-shot command submission
//!
//! The pool is created with the reset flag so per-frame command buffers
//! can be re-recorded individually. One-shot commands are used for
//! staging copies and layout transitions during resource upload.

use ash::{vk, Device};

use super::context::{VulkanError, VulkanResult};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a command pool for the graphics queue family
    pub fn new(device: Device, graphics_family: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(graphics_family);

        let pool = unsafe {
            device
                .create_command_pool(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, pool })
    }

    /// Allocate primary command buffers from this pool
    pub fn allocate_primary(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Record and submit a one-shot command buffer, waiting for completion
    ///
    /// Allocates a transient command buffer, records `record` into it,
    /// submits it to `queue` and blocks until the queue is idle. Used
    /// for resource uploads during initialization; not for per-frame work.
    pub fn submit_one_shot<F>(&self, queue: vk::Queue, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        let command_buffer = self.allocate_primary(1)?[0];

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        let result = unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::Api)
                .and_then(|_| {
                    record(&self.device, command_buffer);
                    self.device
                        .end_command_buffer(command_buffer)
                        .map_err(VulkanError::Api)
                })
                .and_then(|_| {
                    let command_buffers = [command_buffer];
                    let submit_info = vk::SubmitInfo::builder()
                        .command_buffers(&command_buffers)
                        .build();
                    self.device
                        .queue_submit(queue, &[submit_info], vk::Fence::null())
                        .map_err(VulkanError::Api)
                })
                .and_then(|_| {
                    self.device
                        .queue_wait_idle(queue)
                        .map_err(VulkanError::Api)
                })
        };

        unsafe {
            self.device
                .free_command_buffers(self.pool, &[command_buffer]);
        }

        result
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}
