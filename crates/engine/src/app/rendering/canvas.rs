/// RGBA8 frame view with clipped drawing primitives.
pub(crate) struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn clear(&mut self, color: [u8; 4]) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
    }

    fn byte_offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let pixel = (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)?;
        let offset = pixel.checked_mul(4)?;
        (offset + 4 <= self.frame.len()).then_some(offset)
    }

    pub(crate) fn put(&mut self, x: i32, y: i32, color: [u8; 4]) {
        if let Some(offset) = self.byte_offset(x, y) {
            self.frame[offset..offset + 4].copy_from_slice(&color);
        }
    }

    /// Source-over blend using the color's alpha.
    pub(crate) fn blend(&mut self, x: i32, y: i32, color: [u8; 4]) {
        let Some(offset) = self.byte_offset(x, y) else {
            return;
        };
        let alpha = color[3] as u32;
        if alpha == 255 {
            self.frame[offset..offset + 4].copy_from_slice(&color);
            return;
        }
        for channel in 0..3 {
            let dst = self.frame[offset + channel] as u32;
            let src = color[channel] as u32;
            self.frame[offset + channel] = ((src * alpha + dst * (255 - alpha)) / 255) as u8;
        }
        self.frame[offset + 3] = 255;
    }

    pub(crate) fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: [u8; 4]) {
        let start_x = x.max(0);
        let start_y = y.max(0);
        let end_x = x.saturating_add(w).min(self.width as i32);
        let end_y = y.saturating_add(h).min(self.height as i32);
        for py in start_y..end_y {
            for px in start_x..end_x {
                self.blend(px, py, color);
            }
        }
    }

    pub(crate) fn outline_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: [u8; 4]) {
        if w <= 1 || h <= 1 {
            return;
        }
        self.fill_rect(x, y, w, 1, color);
        self.fill_rect(x, y + h - 1, w, 1, color);
        self.fill_rect(x, y, 1, h, color);
        self.fill_rect(x + w - 1, y, 1, h, color);
    }

    /// Bresenham line with a square brush. The segment is clipped to the
    /// canvas first, so the walk is bounded by the canvas size.
    pub(crate) fn line(&mut self, from: (i32, i32), to: (i32, i32), thickness: i32, color: [u8; 4]) {
        let brush = thickness.max(1);
        let half = brush / 2;
        let Some(((mut x0, mut y0), (x1, y1))) = self.clip_segment(from, to, half) else {
            return;
        };
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.fill_rect(x0 - half, y0 - half, brush, brush, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    /// Liang-Barsky clip against the canvas grown by `margin` on every side.
    fn clip_segment(
        &self,
        from: (i32, i32),
        to: (i32, i32),
        margin: i32,
    ) -> Option<((i32, i32), (i32, i32))> {
        let margin = f64::from(margin);
        let min = -margin;
        let max_x = f64::from(self.width) - 1.0 + margin;
        let max_y = f64::from(self.height) - 1.0 + margin;
        let (x0, y0) = (f64::from(from.0), f64::from(from.1));
        let dx = f64::from(to.0) - x0;
        let dy = f64::from(to.1) - y0;

        let mut enter = 0.0_f64;
        let mut leave = 1.0_f64;
        for (p, q) in [(-dx, x0 - min), (dx, max_x - x0), (-dy, y0 - min), (dy, max_y - y0)] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }
            let t = q / p;
            if p < 0.0 {
                enter = enter.max(t);
            } else {
                leave = leave.min(t);
            }
            if enter > leave {
                return None;
            }
        }
        let at = |t: f64| ((x0 + t * dx).round() as i32, (y0 + t * dy).round() as i32);
        Some((at(enter), at(leave)))
    }

    pub(crate) fn fill_circle(&mut self, cx: i32, cy: i32, radius: i32, color: [u8; 4]) {
        let r2 = radius * radius;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dy * dy <= r2 {
                    self.blend(cx + dx, cy + dy, color);
                }
            }
        }
    }

    /// Nearest-neighbour scale of `rgba` to cover the whole canvas.
    pub(crate) fn blit_cover(&mut self, src_width: u32, src_height: u32, rgba: &[u8]) {
        if src_width == 0 || src_height == 0 || self.width == 0 || self.height == 0 {
            return;
        }
        if rgba.len() < src_width as usize * src_height as usize * 4 {
            return;
        }
        let scale = (self.width as f32 / src_width as f32).max(self.height as f32 / src_height as f32);
        let offset_x = (src_width as f32 * scale - self.width as f32) * 0.5;
        let offset_y = (src_height as f32 * scale - self.height as f32) * 0.5;
        for y in 0..self.height {
            let src_y = (((y as f32 + offset_y) / scale) as u32).min(src_height - 1) as usize;
            for x in 0..self.width {
                let src_x = (((x as f32 + offset_x) / scale) as u32).min(src_width - 1) as usize;
                let src = (src_y * src_width as usize + src_x) * 4;
                let dst = (y as usize * self.width as usize + x as usize) * 4;
                self.frame[dst..dst + 3].copy_from_slice(&rgba[src..src + 3]);
                self.frame[dst + 3] = 255;
            }
        }
    }
}
