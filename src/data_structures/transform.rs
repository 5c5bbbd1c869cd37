//! Local transformation data for scene graph nodes.
//!
//! Every node carries a position, rotation and scale relative to its parent.
//! World matrices are obtained by multiplying [`Transform::to_matrix`] along
//! the path from the scene root.

use cgmath::One;

/// Position, rotation (as quaternion), and scale of a node relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Transform {
    /// Create the identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            // `Quaternion::one()` is the identity quaternion (no rotation)
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Only the rotational part of this transform as a matrix.
    pub fn rotation_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from(self.rotation)
    }

    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = cgmath::Vector3::new(scale, scale, scale);
    }

    pub fn reset_rotation(&mut self) {
        self.rotation = cgmath::Quaternion::one();
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}
