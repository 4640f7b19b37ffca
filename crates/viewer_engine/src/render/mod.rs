//! Rendering: mesh types and the Vulkan backend
//!
//! The public surface is deliberately small: a [`Mesh`] of [`Vertex`]
//! data goes in, a [`VulkanRenderer`] draws it every frame. Everything
//! Vulkan-specific lives under [`vulkan`].

pub mod mesh;
pub mod vulkan;

pub use mesh::{Mesh, Vertex};
pub use vulkan::renderer::VulkanRenderer;
pub use vulkan::window::Window;
pub use vulkan::{VulkanError, VulkanResult};
