use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::app::ui::{ElementKind, UiElement, UiLayer};
use crate::app::{Node, SceneWorld, Vec3};

use super::canvas::Canvas;
use super::text::{draw_text_centered, line_height_px, wrap_text, advance_px};
use super::transform::{world_to_screen, Viewport};

const CLEAR_COLOR: [u8; 4] = [18, 20, 26, 255];
const OVERLAY_PANEL_COLOR: [u8; 4] = [8, 10, 14, 190];
const OVERLAY_TEXT_COLOR: [u8; 4] = [244, 248, 252, 255];
const BUTTON_FILL_COLOR: [u8; 4] = [236, 176, 32, 255];
const BUTTON_BORDER_COLOR: [u8; 4] = [255, 226, 140, 255];
const BUTTON_TEXT_COLOR: [u8; 4] = [20, 20, 24, 255];
const ALERT_SCRIM_COLOR: [u8; 4] = [0, 0, 0, 150];
const ALERT_BOX_COLOR: [u8; 4] = [240, 240, 244, 255];
const ALERT_TEXT_COLOR: [u8; 4] = [24, 24, 28, 255];
const DOCUMENT_BG_COLOR: [u8; 4] = [0, 0, 0, 255];
const DOCUMENT_TEXT_COLOR: [u8; 4] = [255, 255, 255, 255];
const PROP_COLOR: [u8; 4] = [150, 112, 70, 255];
const FIGURE_HEIGHT_WORLD: f32 = 1.7;
const PROP_HALF_EXTENT_WORLD: f32 = 0.45;
const OFFSCREEN_REACH: i64 = 4;
const ALERT_DISMISS_HINT: &str = "Tap to continue";

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub(crate) fn render_world(&mut self, world: &SceneWorld) -> Result<(), Error> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(());
        }
        let viewport = self.viewport;
        let mut canvas = Canvas::new(self.pixels.frame_mut(), viewport.width, viewport.height);
        compose_frame(&mut canvas, world, viewport);
        self.pixels.render()
    }
}

pub(crate) fn compose_frame(canvas: &mut Canvas<'_>, world: &SceneWorld, viewport: Viewport) {
    let ui = world.ui();
    if let Some(message) = ui.replaced_document() {
        draw_replaced_document(canvas, message);
        return;
    }

    match ui.video_background() {
        Some(frame) => canvas.blit_cover(frame.width, frame.height, &frame.rgba),
        None => canvas.clear(CLEAR_COLOR),
    }

    let mut drawn: Vec<&Node> = world
        .nodes()
        .iter()
        .filter(|node| node.visible && node.model().is_some())
        .collect();
    // Far to near.
    drawn.sort_by(|a, b| a.position.z.total_cmp(&b.position.z));
    for node in drawn {
        draw_node(canvas, node, viewport);
    }

    draw_ui(canvas, ui);

    if let Some(message) = ui.alert() {
        draw_alert(canvas, message);
    }
}

fn text_scale(canvas: &Canvas<'_>) -> i32 {
    (canvas.height() as i32 / 180).clamp(2, 6)
}

fn draw_node(canvas: &mut Canvas<'_>, node: &Node, viewport: Viewport) {
    let Some(((foot_x, foot_y), px_per_unit)) = world_to_screen(node.position, viewport) else {
        return;
    };
    if !near_canvas(canvas, foot_x, foot_y) {
        return;
    }
    let animated = node
        .model()
        .is_some_and(|model| !model.animations.is_empty());
    if !animated {
        let half = (PROP_HALF_EXTENT_WORLD * px_per_unit) as i32;
        canvas.fill_rect(foot_x - half, foot_y - half / 2, half * 2, half / 2, PROP_COLOR);
        return;
    }

    let progress = node
        .mixer()
        .and_then(|mixer| mixer.active_action())
        .map(|action| action.progress())
        .unwrap_or(0.0);
    let head = world_to_screen(
        Vec3 {
            y: node.position.y + FIGURE_HEIGHT_WORLD,
            ..node.position
        },
        viewport,
    );
    let Some(((_, head_y), _)) = head else {
        return;
    };
    let figure_color = figure_color(&node.name);
    let height_px = (foot_y - head_y).max(4) as f32;
    let thickness = (px_per_unit * 0.08).round().max(2.0) as i32;

    // The figure tips over as its clip plays; frozen clips hold the last pose.
    let lean = progress * FRAC_PI_2 * 0.6;
    let hip = (foot_x, foot_y - (height_px * 0.45) as i32);
    let neck = (
        hip.0 + (lean.sin() * height_px * 0.4) as i32,
        hip.1 - (lean.cos() * height_px * 0.4) as i32,
    );
    let head_radius = (height_px * 0.08).max(2.0) as i32;
    let stride = (height_px * 0.18 * (progress * 6.0).sin()) as i32;

    canvas.line(hip, (foot_x - stride, foot_y), thickness, figure_color);
    canvas.line(hip, (foot_x + stride, foot_y), thickness, figure_color);
    canvas.line(hip, neck, thickness, figure_color);
    let arm_len = (height_px * 0.25) as i32;
    canvas.line(neck, (neck.0 - arm_len, neck.1 + arm_len), thickness, figure_color);
    canvas.line(neck, (neck.0 + arm_len, neck.1 + arm_len / 2), thickness, figure_color);
    canvas.fill_circle(
        neck.0 + (lean.sin() * head_radius as f32) as i32,
        neck.1 - head_radius,
        head_radius,
        figure_color,
    );
}

/// Projected anchors this far past the canvas edge cannot reach it.
fn near_canvas(canvas: &Canvas<'_>, x: i32, y: i32) -> bool {
    let reach = i64::from(canvas.width().max(canvas.height())) * OFFSCREEN_REACH;
    let x_range = -reach..=i64::from(canvas.width()) + reach;
    let y_range = -reach..=i64::from(canvas.height()) + reach;
    x_range.contains(&i64::from(x)) && y_range.contains(&i64::from(y))
}

fn figure_color(name: &str) -> [u8; 4] {
    let hash = name
        .bytes()
        .fold(0x811c_9dc5u32, |acc, byte| (acc ^ byte as u32).wrapping_mul(0x0100_0193));
    [
        120 + (hash & 0x7f) as u8,
        120 + ((hash >> 8) & 0x7f) as u8,
        120 + ((hash >> 16) & 0x7f) as u8,
        255,
    ]
}

fn element_px_rect(canvas: &Canvas<'_>, element: &UiElement) -> (i32, i32, i32, i32) {
    let width = canvas.width() as f32;
    let height = canvas.height() as f32;
    (
        (element.rect.x * width).round() as i32,
        (element.rect.y * height).round() as i32,
        (element.rect.width * width).round() as i32,
        (element.rect.height * height).round() as i32,
    )
}

fn draw_ui(canvas: &mut Canvas<'_>, ui: &UiLayer) {
    for kind in [ElementKind::Overlay, ElementKind::Button] {
        for element in ui.elements() {
            if element.kind == kind && element.is_shown() {
                draw_element(canvas, element);
            }
        }
    }
}

fn draw_element(canvas: &mut Canvas<'_>, element: &UiElement) {
    let (x, y, w, h) = element_px_rect(canvas, element);
    let (fill, text_color) = match element.kind {
        ElementKind::Overlay => (OVERLAY_PANEL_COLOR, OVERLAY_TEXT_COLOR),
        ElementKind::Button => (BUTTON_FILL_COLOR, BUTTON_TEXT_COLOR),
    };
    canvas.fill_rect(x, y, w, h, fill);
    if element.kind == ElementKind::Button {
        canvas.outline_rect(x, y, w, h, BUTTON_BORDER_COLOR);
    }

    let scale = text_scale(canvas);
    let max_chars = ((w - 2 * advance_px(scale)) / advance_px(scale)).max(1) as usize;
    let lines: Vec<String> = element
        .text
        .iter()
        .flat_map(|paragraph| wrap_text(paragraph, max_chars))
        .collect();
    draw_text_block(canvas, x + w / 2, y + h / 2, &lines, scale, text_color);
}

fn draw_text_block(
    canvas: &mut Canvas<'_>,
    center_x: i32,
    center_y: i32,
    lines: &[String],
    scale: i32,
    color: [u8; 4],
) {
    let line_height = line_height_px(scale);
    let mut y = center_y - (lines.len() as i32 * line_height) / 2;
    for line in lines {
        draw_text_centered(canvas, center_x, y, line, scale, color);
        y += line_height;
    }
}

fn draw_alert(canvas: &mut Canvas<'_>, message: &str) {
    let width = canvas.width() as i32;
    let height = canvas.height() as i32;
    canvas.fill_rect(0, 0, width, height, ALERT_SCRIM_COLOR);

    let scale = text_scale(canvas);
    let box_w = (width * 3 / 4).max(1);
    let max_chars = (box_w / advance_px(scale) - 2).max(1) as usize;
    let mut lines = wrap_text(message, max_chars);
    lines.push(String::new());
    lines.push(ALERT_DISMISS_HINT.to_string());
    let box_h = (lines.len() as i32 + 2) * line_height_px(scale);
    let box_x = (width - box_w) / 2;
    let box_y = (height - box_h) / 2;
    canvas.fill_rect(box_x, box_y, box_w, box_h, ALERT_BOX_COLOR);
    draw_text_block(canvas, width / 2, height / 2, &lines, scale, ALERT_TEXT_COLOR);
}

fn draw_replaced_document(canvas: &mut Canvas<'_>, message: &str) {
    canvas.clear(DOCUMENT_BG_COLOR);
    let scale = text_scale(canvas);
    let max_chars = (canvas.width() as i32 / advance_px(scale) - 2).max(1) as usize;
    let lines = wrap_text(message, max_chars);
    let center_x = canvas.width() as i32 / 2;
    let center_y = canvas.height() as i32 / 2;
    draw_text_block(canvas, center_x, center_y, &lines, scale, DOCUMENT_TEXT_COLOR);
}
