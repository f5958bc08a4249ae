use super::canvas::Canvas;

pub(crate) const GLYPH_COLS: i32 = 3;
pub(crate) const GLYPH_ROWS: i32 = 5;

/// Packs five 3-bit rows, top row in the highest bits.
const fn pack(rows: [u8; 5]) -> u16 {
    ((rows[0] as u16) << 12)
        | ((rows[1] as u16) << 9)
        | ((rows[2] as u16) << 6)
        | ((rows[3] as u16) << 3)
        | rows[4] as u16
}

const GLYPHS: &[(char, u16)] = &[
    ('A', pack([0b010, 0b101, 0b111, 0b101, 0b101])),
    ('B', pack([0b110, 0b101, 0b110, 0b101, 0b110])),
    ('C', pack([0b011, 0b100, 0b100, 0b100, 0b011])),
    ('D', pack([0b110, 0b101, 0b101, 0b101, 0b110])),
    ('E', pack([0b111, 0b100, 0b110, 0b100, 0b111])),
    ('F', pack([0b111, 0b100, 0b110, 0b100, 0b100])),
    ('G', pack([0b011, 0b100, 0b101, 0b101, 0b011])),
    ('H', pack([0b101, 0b101, 0b111, 0b101, 0b101])),
    ('I', pack([0b111, 0b010, 0b010, 0b010, 0b111])),
    ('J', pack([0b001, 0b001, 0b001, 0b101, 0b010])),
    ('K', pack([0b101, 0b101, 0b110, 0b101, 0b101])),
    ('L', pack([0b100, 0b100, 0b100, 0b100, 0b111])),
    ('M', pack([0b101, 0b111, 0b111, 0b101, 0b101])),
    ('N', pack([0b110, 0b101, 0b101, 0b101, 0b101])),
    ('O', pack([0b010, 0b101, 0b101, 0b101, 0b010])),
    ('P', pack([0b110, 0b101, 0b110, 0b100, 0b100])),
    ('Q', pack([0b010, 0b101, 0b101, 0b110, 0b011])),
    ('R', pack([0b110, 0b101, 0b110, 0b101, 0b101])),
    ('S', pack([0b011, 0b100, 0b010, 0b001, 0b110])),
    ('T', pack([0b111, 0b010, 0b010, 0b010, 0b010])),
    ('U', pack([0b101, 0b101, 0b101, 0b101, 0b111])),
    ('V', pack([0b101, 0b101, 0b101, 0b101, 0b010])),
    ('W', pack([0b101, 0b101, 0b111, 0b111, 0b101])),
    ('X', pack([0b101, 0b101, 0b010, 0b101, 0b101])),
    ('Y', pack([0b101, 0b101, 0b010, 0b010, 0b010])),
    ('Z', pack([0b111, 0b001, 0b010, 0b100, 0b111])),
    ('0', pack([0b111, 0b101, 0b101, 0b101, 0b111])),
    ('1', pack([0b010, 0b110, 0b010, 0b010, 0b111])),
    ('2', pack([0b110, 0b001, 0b010, 0b100, 0b111])),
    ('3', pack([0b110, 0b001, 0b010, 0b001, 0b110])),
    ('4', pack([0b101, 0b101, 0b111, 0b001, 0b001])),
    ('5', pack([0b111, 0b100, 0b110, 0b001, 0b110])),
    ('6', pack([0b011, 0b100, 0b111, 0b101, 0b111])),
    ('7', pack([0b111, 0b001, 0b010, 0b010, 0b010])),
    ('8', pack([0b111, 0b101, 0b111, 0b101, 0b111])),
    ('9', pack([0b111, 0b101, 0b111, 0b001, 0b110])),
    ('.', pack([0b000, 0b000, 0b000, 0b000, 0b010])),
    (',', pack([0b000, 0b000, 0b000, 0b010, 0b100])),
    ('!', pack([0b010, 0b010, 0b010, 0b000, 0b010])),
    ('?', pack([0b110, 0b001, 0b010, 0b000, 0b010])),
    ('\'', pack([0b010, 0b010, 0b000, 0b000, 0b000])),
    ('-', pack([0b000, 0b000, 0b111, 0b000, 0b000])),
    (':', pack([0b000, 0b010, 0b000, 0b010, 0b000])),
    ('/', pack([0b001, 0b001, 0b010, 0b100, 0b100])),
    ('(', pack([0b010, 0b100, 0b100, 0b100, 0b010])),
    (')', pack([0b010, 0b001, 0b001, 0b001, 0b010])),
];

/// Lowercase folds to uppercase; unknown characters render blank.
pub(crate) fn glyph_bits(ch: char) -> Option<u16> {
    let upper = ch.to_ascii_uppercase();
    GLYPHS
        .iter()
        .find(|(glyph, _)| *glyph == upper)
        .map(|(_, bits)| *bits)
}

pub(crate) fn advance_px(scale: i32) -> i32 {
    (GLYPH_COLS + 1) * scale
}

pub(crate) fn line_height_px(scale: i32) -> i32 {
    (GLYPH_ROWS + 2) * scale
}

pub(crate) fn text_width_px(text: &str, scale: i32) -> i32 {
    let count = text.chars().count() as i32;
    if count == 0 {
        return 0;
    }
    count * advance_px(scale) - scale
}

pub(crate) fn draw_text(canvas: &mut Canvas<'_>, x: i32, y: i32, text: &str, scale: i32, color: [u8; 4]) {
    let mut pen_x = x;
    for ch in text.chars() {
        if let Some(bits) = glyph_bits(ch) {
            draw_glyph(canvas, pen_x, y, bits, scale, color);
        }
        pen_x += advance_px(scale);
    }
}

pub(crate) fn draw_text_centered(
    canvas: &mut Canvas<'_>,
    center_x: i32,
    y: i32,
    text: &str,
    scale: i32,
    color: [u8; 4],
) {
    let x = center_x - text_width_px(text, scale) / 2;
    draw_text(canvas, x, y, text, scale, color);
}

fn draw_glyph(canvas: &mut Canvas<'_>, x: i32, y: i32, bits: u16, scale: i32, color: [u8; 4]) {
    for row in 0..GLYPH_ROWS {
        for col in 0..GLYPH_COLS {
            let shift = (GLYPH_ROWS - 1 - row) * GLYPH_COLS + (GLYPH_COLS - 1 - col);
            if bits & (1 << shift) == 0 {
                continue;
            }
            canvas.fill_rect(x + col * scale, y + row * scale, scale, scale, color);
        }
    }
}

/// Greedy word wrap to at most `max_chars` per line. Overlong words are split.
pub(crate) fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        let needed = if current.is_empty() {
            word.len()
        } else {
            current.chars().count() + 1 + word.len()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
