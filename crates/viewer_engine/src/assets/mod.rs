//! Asset loading: OBJ meshes and texture images
//!
//! The loaders here are the renderer's only file-format knowledge. They
//! produce plain value objects (a [`crate::render::Mesh`], an
//! [`ImageData`]) that are handed by ownership to the GPU upload step;
//! nothing in this module touches Vulkan.

pub mod image_loader;
pub mod obj_loader;

pub use image_loader::ImageData;
pub use obj_loader::ObjLoader;

use thiserror::Error;

/// Errors produced while loading assets from disk
#[derive(Error, Debug)]
pub enum AssetError {
    /// Underlying file I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The file was read but could not be decoded
    #[error("Load failed: {0}")]
    LoadFailed(String),

    /// The file decoded but its contents are not usable
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}
