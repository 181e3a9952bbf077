//! Global per-frame uniform data.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Uniform block shared by all render systems, bound at set 0 binding 0.
///
/// Layout matches the std140 block declared in the shaders; every field is
/// 16-byte aligned by construction.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlobalUbo {
    pub projection: Mat4,
    pub view: Mat4,
    /// RGB ambient color; w is the intensity.
    pub ambient_light_color: Vec4,
    /// World-space light position; w is unused.
    pub light_position: Vec4,
    /// RGB light color; w is the intensity.
    pub light_color: Vec4,
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            ambient_light_color: Vec4::new(1.0, 1.0, 1.0, 0.02),
            light_position: Vec4::new(-1.0, -1.0, -1.0, 0.0),
            light_color: Vec4::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_std140() {
        // Two mat4s plus three vec4s, no implicit padding.
        assert_eq!(std::mem::size_of::<GlobalUbo>(), 2 * 64 + 3 * 16);
        assert_eq!(std::mem::offset_of!(GlobalUbo, view), 64);
        assert_eq!(std::mem::offset_of!(GlobalUbo, ambient_light_color), 128);
        assert_eq!(std::mem::offset_of!(GlobalUbo, light_color), 160);
    }
}
