//! Vulkan rendering backend
//!
//! Module layering follows resource lifetime: [`context`] owns the
//! instance, device and queues; [`swapchain`], [`pipeline`], [`buffer`],
//! [`texture`] and [`commands`] own GPU resources created from the
//! context; [`renderer`] composes everything into a per-frame draw loop.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod pipeline;
pub mod renderer;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod ubo;
pub mod window;

pub use context::{VulkanContext, VulkanError, VulkanResult};
pub use renderer::VulkanRenderer;
pub use swapchain::Swapchain;
pub use window::{Window, WindowError};

/// Number of frames the CPU may record ahead of the GPU
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
