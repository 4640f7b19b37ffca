//! Per-frame uniform data: the model-view-projection matrices
//!
//! The model spins about the world Z axis at 90 degrees per second; the
//! camera sits at (2, 2, 2) looking at the origin with Z up. The
//! projection matrix has its Y axis flipped because clip space points
//! down where the math convention points up.

use nalgebra::{Matrix4, Perspective3, Point3, Vector3};

/// Degrees of model rotation per second of elapsed time
const ROTATION_DEGREES_PER_SECOND: f32 = 90.0;

/// Vertical field of view in degrees
const FOV_DEGREES: f32 = 45.0;

/// Near clip plane distance
const NEAR_PLANE: f32 = 0.1;

/// Far clip plane distance
const FAR_PLANE: f32 = 10.0;

/// Uniform block layout shared with the vertex shader
///
/// Matches the std140 layout of three column-major mat4 fields.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct UniformBufferObject {
    /// Object-to-world transform
    pub model: Matrix4<f32>,
    /// World-to-camera transform
    pub view: Matrix4<f32>,
    /// Camera-to-clip transform, Y flipped for Vulkan
    pub proj: Matrix4<f32>,
}

// SAFETY: repr(C) struct of three column-major f32 matrices; every bit
// pattern is a valid value and there is no padding
unsafe impl bytemuck::Pod for UniformBufferObject {}
unsafe impl bytemuck::Zeroable for UniformBufferObject {}

impl UniformBufferObject {
    /// Compute the matrices for a point in time and framebuffer aspect ratio
    pub fn for_time(elapsed_secs: f32, aspect: f32) -> Self {
        let angle = elapsed_secs * ROTATION_DEGREES_PER_SECOND.to_radians();
        let model = Matrix4::new_rotation(Vector3::z() * angle);

        let view = Matrix4::look_at_rh(
            &Point3::new(2.0, 2.0, 2.0),
            &Point3::origin(),
            &Vector3::z(),
        );

        let mut proj =
            Perspective3::new(aspect, FOV_DEGREES.to_radians(), NEAR_PLANE, FAR_PLANE)
                .to_homogeneous();
        // Vulkan clip space has Y pointing down
        proj[(1, 1)] *= -1.0;

        Self { model, view, proj }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector4;

    #[test]
    fn test_layout_is_three_tightly_packed_mat4() {
        assert_eq!(std::mem::size_of::<UniformBufferObject>(), 3 * 64);
        assert_eq!(std::mem::align_of::<UniformBufferObject>(), 16);
    }

    #[test]
    fn test_model_is_identity_at_time_zero() {
        let ubo = UniformBufferObject::for_time(0.0, 1.0);
        assert_relative_eq!(ubo.model, Matrix4::identity(), epsilon = 1e-6);
    }

    #[test]
    fn test_model_rotates_quarter_turn_per_second() {
        let ubo = UniformBufferObject::for_time(1.0, 1.0);
        // After one second the X axis has rotated onto the Y axis
        let rotated = ubo.model * Vector4::new(1.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(rotated.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(rotated.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_bytes_roundtrip_through_bytemuck() {
        let ubo = UniformBufferObject::for_time(0.5, 4.0 / 3.0);
        let bytes = bytemuck::bytes_of(&ubo);
        assert_eq!(bytes.len(), 192);

        let back: UniformBufferObject = *bytemuck::from_bytes(bytes);
        assert_eq!(back.model, ubo.model);
        assert_eq!(back.view, ubo.view);
        assert_eq!(back.proj, ubo.proj);
    }

    #[test]
    fn test_projection_flips_y() {
        let flipped = UniformBufferObject::for_time(0.0, 16.0 / 9.0).proj;
        let reference =
            Perspective3::new(16.0 / 9.0, FOV_DEGREES.to_radians(), NEAR_PLANE, FAR_PLANE)
                .to_homogeneous();
        assert_relative_eq!(flipped[(1, 1)], -reference[(1, 1)], epsilon = 1e-6);
        assert!(flipped[(1, 1)] < 0.0);
    }

    #[test]
    fn test_view_looks_at_origin() {
        let ubo = UniformBufferObject::for_time(0.0, 1.0);
        // The camera position maps to the view-space origin
        let eye = ubo.view * Vector4::new(2.0, 2.0, 2.0, 1.0);
        assert_relative_eq!(eye.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(eye.y, 0.0, epsilon = 1e-5);
        // Origin ends up in front of the camera (negative Z in view space)
        let origin = ubo.view * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert!(origin.z < 0.0);
    }
}
