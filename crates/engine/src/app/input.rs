use super::scene::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapSource {
    Mouse,
    Touch,
}

/// A completed pointer gesture: left-button press or touch end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tap {
    pub position_px: Vec2,
    pub source: TapSource,
}

impl Tap {
    /// Position in `[0, 1]` viewport units, `None` for a degenerate window.
    pub fn normalized(&self, window_size: (u32, u32)) -> Option<Vec2> {
        let (width, height) = window_size;
        if width == 0 || height == 0 {
            return None;
        }
        Some(Vec2 {
            x: self.position_px.x / width as f32,
            y: self.position_px.y / height as f32,
        })
    }
}
