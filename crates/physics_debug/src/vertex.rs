//! Line vertices and overlay colors.

use bytemuck::{Pod, Zeroable};
use glam::DVec2;

/// One end of a line in a line-list vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl LineVertex {
    pub fn new(position: DVec2, color: [f32; 4]) -> Self {
        Self {
            position: position.as_vec2().to_array(),
            color,
        }
    }
}

const fn rgb(r: u8, g: u8, b: u8) -> [f32; 4] {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

pub const SHAPE_COLOR: [f32; 4] = rgb(60, 170, 240);
pub const STATIC_COLOR: [f32; 4] = rgb(120, 120, 120);
pub const SLEEPING_COLOR: [f32; 4] = rgb(80, 80, 140);
pub const SENSOR_COLOR: [f32; 4] = rgb(240, 200, 60);
pub const CONSTRAINT_COLOR: [f32; 4] = rgb(90, 200, 90);
pub const VELOCITY_COLOR: [f32; 4] = rgb(200, 25, 25);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertices_cast_to_bytes() {
        let verts = [
            LineVertex::new(DVec2::new(1.0, 2.0), SHAPE_COLOR),
            LineVertex::new(DVec2::new(3.0, 4.0), VELOCITY_COLOR),
        ];
        let bytes: &[u8] = bytemuck::cast_slice(&verts);
        assert_eq!(bytes.len(), 2 * std::mem::size_of::<LineVertex>());
        assert_eq!(std::mem::size_of::<LineVertex>(), 24);
    }

    #[test]
    fn velocity_color_is_dark_red() {
        assert!((VELOCITY_COLOR[0] - 200.0 / 255.0).abs() < 1e-6);
        assert_eq!(VELOCITY_COLOR[3], 1.0);
    }
}
