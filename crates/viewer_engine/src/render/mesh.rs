//! Mesh geometry types and their GPU vertex layout
//!
//! [`Vertex`] is the single vertex format the viewer renders; its memory
//! layout is mirrored one-to-one by the binding and attribute descriptions
//! handed to the graphics pipeline.

use ash::vk;
use std::mem;

/// A single vertex: position, color, texture coordinate and normal
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Per-vertex color, multiplied with the sampled texel
    pub color: [f32; 3],
    /// Texture coordinate, V = 0 at the bottom of the image
    pub tex_coord: [f32; 2],
    /// Object-space normal
    pub normal: [f32; 3],
}

// SAFETY: Vertex is repr(C), Copy, holds only f32 fields and has no padding
// (3+3+2+3 floats = 44 bytes, all 4-byte aligned)
unsafe impl bytemuck::Pod for Vertex {}
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Vertex buffer binding description for binding 0
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::builder()
            .binding(0)
            .stride(mem::size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
            .build()
    }

    /// Attribute descriptions for shader locations 0..=3
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(0)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(12)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(2)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(24)
                .build(),
            vk::VertexInputAttributeDescription::builder()
                .binding(0)
                .location(3)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(32)
                .build(),
        ]
    }
}

/// CPU-side indexed geometry, ready for upload to device-local buffers
#[derive(Debug, Clone)]
pub struct Mesh {
    /// Deduplicated vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Size of the vertex data in bytes
    pub fn vertex_buffer_size(&self) -> vk::DeviceSize {
        (self.vertices.len() * mem::size_of::<Vertex>()) as vk::DeviceSize
    }

    /// Size of the index data in bytes
    pub fn index_buffer_size(&self) -> vk::DeviceSize {
        (self.indices.len() * mem::size_of::<u32>()) as vk::DeviceSize
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(mem::size_of::<Vertex>(), 44);
        assert_eq!(mem::align_of::<Vertex>(), 4);
    }

    #[test]
    fn test_binding_description_matches_vertex() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 44);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_attribute_offsets_match_field_layout() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 4);

        assert_eq!(attrs[0].location, 0);
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[0].format, vk::Format::R32G32B32_SFLOAT);

        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[1].format, vk::Format::R32G32B32_SFLOAT);

        assert_eq!(attrs[2].location, 2);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(attrs[2].format, vk::Format::R32G32_SFLOAT);

        assert_eq!(attrs[3].location, 3);
        assert_eq!(attrs[3].offset, 32);
        assert_eq!(attrs[3].format, vk::Format::R32G32B32_SFLOAT);

        for attr in &attrs {
            assert_eq!(attr.binding, 0);
        }
    }

    #[test]
    fn test_mesh_sizes() {
        let mesh = Mesh {
            vertices: vec![
                Vertex {
                    position: [0.0; 3],
                    color: [1.0; 3],
                    tex_coord: [0.0; 2],
                    normal: [0.0; 3],
                };
                3
            ],
            indices: vec![0, 1, 2],
        };
        assert_eq!(mesh.vertex_buffer_size(), 3 * 44);
        assert_eq!(mesh.index_buffer_size(), 3 * 4);
        assert_eq!(mesh.index_count(), 3);
    }
}
