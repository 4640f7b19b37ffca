//! Buffer management for geometry and uniform data
//!
//! Vertex and index data are uploaded through a host-visible staging
//! buffer into device-local memory; uniform buffers stay host-visible
//! and persistently mapped because they are rewritten every frame.

use ash::{vk, Device};
use std::marker::PhantomData;
use std::mem;

use super::commands::CommandPool;
use super::context::{VulkanError, VulkanResult};

/// Find the lowest-index memory type matching the filter and properties
pub fn find_memory_type(
    mem_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    for i in 0..mem_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && (mem_properties.memory_types[i as usize].property_flags & properties) == properties
        {
            return Ok(i);
        }
    }

    Err(VulkanError::NoSuitableMemoryType)
}

/// Buffer with its backing memory allocation
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: Option<*mut std::ffi::c_void>,
}

impl Buffer {
    /// Create a buffer and allocate memory with the given properties
    pub fn new(
        device: Device,
        mem_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(VulkanError::Api)?
        };

        let mem_requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory_type_index = match find_memory_type(
            mem_properties,
            mem_requirements.memory_type_bits,
            properties,
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(mem_requirements.size)
            .memory_type_index(memory_type_index);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::Api(e));
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::Api(e));
        }

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            mapped: None,
        })
    }

    /// Map the whole buffer and keep it mapped until drop
    pub fn map_persistent(&mut self) -> VulkanResult<*mut std::ffi::c_void> {
        if let Some(ptr) = self.mapped {
            return Ok(ptr);
        }
        let ptr = unsafe {
            self.device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?
        };
        self.mapped = Some(ptr);
        Ok(ptr)
    }

    /// Write a slice into the buffer via a transient mapping
    pub fn write_data<T: bytemuck::Pod>(&self, data: &[T]) -> VulkanResult<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        unsafe {
            let ptr = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get the buffer size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if self.mapped.take().is_some() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Create a device-local buffer filled with `data` via a staging copy
///
/// The staging buffer is host-visible and freed once the copy has been
/// submitted and the queue drained.
pub fn create_device_local_buffer<T: bytemuck::Pod>(
    device: Device,
    mem_properties: &vk::PhysicalDeviceMemoryProperties,
    command_pool: &CommandPool,
    queue: vk::Queue,
    data: &[T],
    usage: vk::BufferUsageFlags,
) -> VulkanResult<Buffer> {
    let size = (data.len() * mem::size_of::<T>()) as vk::DeviceSize;

    let staging = Buffer::new(
        device.clone(),
        mem_properties,
        size,
        vk::BufferUsageFlags::TRANSFER_SRC,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    staging.write_data(data)?;

    let device_local = Buffer::new(
        device,
        mem_properties,
        size,
        vk::BufferUsageFlags::TRANSFER_DST | usage,
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;

    command_pool.submit_one_shot(queue, |device, cmd| {
        let region = vk::BufferCopy::builder().size(size).build();
        unsafe {
            device.cmd_copy_buffer(cmd, staging.handle(), device_local.handle(), &[region]);
        }
    })?;

    Ok(device_local)
}

/// Vertex buffer in device-local memory
pub struct VertexBuffer {
    buffer: Buffer,
}

impl VertexBuffer {
    /// Upload vertex data into device-local memory
    pub fn new<T: bytemuck::Pod>(
        device: Device,
        mem_properties: &vk::PhysicalDeviceMemoryProperties,
        command_pool: &CommandPool,
        queue: vk::Queue,
        vertices: &[T],
    ) -> VulkanResult<Self> {
        let buffer = create_device_local_buffer(
            device,
            mem_properties,
            command_pool,
            queue,
            vertices,
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        Ok(Self { buffer })
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

/// Index buffer in device-local memory, 32-bit indices
pub struct IndexBuffer {
    buffer: Buffer,
    index_count: u32,
}

impl IndexBuffer {
    /// Upload index data into device-local memory
    pub fn new(
        device: Device,
        mem_properties: &vk::PhysicalDeviceMemoryProperties,
        command_pool: &CommandPool,
        queue: vk::Queue,
        indices: &[u32],
    ) -> VulkanResult<Self> {
        let buffer = create_device_local_buffer(
            device,
            mem_properties,
            command_pool,
            queue,
            indices,
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;
        Ok(Self {
            buffer,
            index_count: indices.len() as u32,
        })
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Number of indices in the buffer
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Persistently mapped uniform buffer for per-frame shader data
pub struct UniformBuffer<T> {
    buffer: Buffer,
    mapped: *mut std::ffi::c_void,
    _phantom: PhantomData<T>,
}

impl<T: bytemuck::Pod> UniformBuffer<T> {
    /// Create a host-visible, coherent uniform buffer and map it once
    pub fn new(
        device: Device,
        mem_properties: &vk::PhysicalDeviceMemoryProperties,
    ) -> VulkanResult<Self> {
        let size = mem::size_of::<T>() as vk::DeviceSize;

        let mut buffer = Buffer::new(
            device,
            mem_properties,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let mapped = buffer.map_persistent()?;

        Ok(Self {
            buffer,
            mapped,
            _phantom: PhantomData,
        })
    }

    /// Write new uniform data through the persistent mapping
    ///
    /// Coherent memory makes the write visible without an explicit flush.
    pub fn update(&self, data: &T) {
        unsafe {
            std::ptr::copy_nonoverlapping(
                data as *const T as *const u8,
                self.mapped as *mut u8,
                mem::size_of::<T>(),
            );
        }
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size of the uniform block in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = flags.len() as u32;
        for (i, &property_flags) in flags.iter().enumerate() {
            props.memory_types[i] = vk::MemoryType {
                property_flags,
                heap_index: 0,
            };
        }
        props
    }

    #[test]
    fn test_find_memory_type_picks_lowest_matching_index() {
        let props = mem_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);

        let index = find_memory_type(
            &props,
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_find_memory_type_respects_type_filter() {
        let props = mem_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ]);

        // Bit 0 excluded by the filter, so index 1 wins
        let index =
            find_memory_type(&props, 0b10, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_find_memory_type_requires_all_properties() {
        let props = mem_properties(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);

        let result = find_memory_type(
            &props,
            0b1,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        );
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn test_find_memory_type_no_match_is_an_error() {
        let props = mem_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);

        let result = find_memory_type(&props, 0, vk::MemoryPropertyFlags::DEVICE_LOCAL);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }
}
