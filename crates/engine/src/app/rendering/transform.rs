use crate::app::Vec3;

/// Nodes closer than this to the camera plane are not drawn.
pub const NEAR_PLANE: f32 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Focal length in pixels for a vertical field of view of ~53 degrees.
    pub fn focal_px(&self) -> f32 {
        self.height as f32
    }
}

/// Pinhole projection for a camera at the origin looking down -Z.
/// Returns the pixel position and the pixels-per-unit scale at that depth.
pub fn world_to_screen(point: Vec3, viewport: Viewport) -> Option<((i32, i32), f32)> {
    let depth = -point.z;
    if depth < NEAR_PLANE {
        return None;
    }
    let scale = viewport.focal_px() / depth;
    let x = viewport.width as f32 * 0.5 + point.x * scale;
    let y = viewport.height as f32 * 0.5 - point.y * scale;
    Some(((x.round() as i32, y.round() as i32), scale))
}
