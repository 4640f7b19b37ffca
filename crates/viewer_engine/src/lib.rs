//! # Viewer Engine
//!
//! A minimal Vulkan 3D model viewer: one textured mesh, one graphics
//! pipeline, a rotating model-view-projection transform rendered every
//! frame. Built directly on `ash` with GLFW providing the window and
//! presentable surface.
//!
//! The heart of the crate is the GPU resource-dependency graph under
//! [`render::vulkan`]: instance, device, swapchain, render pass, pipeline,
//! buffers, descriptor sets and sync primitives, created in dependency
//! order, destroyed in reverse, with the swapchain-dependent subset
//! rebuilt on window resize.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use viewer_engine::assets::{ImageData, ObjLoader};
//! use viewer_engine::render::{VulkanRenderer, Window};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut window = Window::new("3D Viewer", 800, 600)?;
//!     let mesh = ObjLoader::load_obj("assets/viking.obj")?;
//!     let texture = ImageData::from_file("assets/viking.png")?;
//!     let mut renderer = VulkanRenderer::new(
//!         &mut window,
//!         "3D Viewer",
//!         &mesh,
//!         &texture,
//!         Path::new("target/shaders/model.vert.spv"),
//!         Path::new("target/shaders/model.frag.spv"),
//!     )?;
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw_frame(&mut window)?;
//!     }
//!     renderer.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod assets;
pub mod foundation;
pub mod render;
