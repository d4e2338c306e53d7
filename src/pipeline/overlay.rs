use std::{
    fs,
    path::{Path, PathBuf},
};

use rusttype::{Font, Scale, point};

use crate::types::{Attributes, Frame, InferenceResult, PixelBox};

pub const OVERLAY_COLOR: [u8; 4] = [0, 255, 0, 255];
const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 26.0;
const LABEL_BASELINE_OFFSET: i32 = 10;
const LABEL_LINE_SPACING: i32 = 25;

const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Label lines in drawing order, bottom-most first.
pub fn labels(attributes: &Attributes) -> [String; 6] {
    [
        format!("Age: {}", attributes.age),
        format!("Race: {}", attributes.race),
        format!("Masked: {}", attributes.masked),
        format!("Skintone: {}", attributes.skintone),
        format!("Emotion: {}", attributes.emotion),
        format!("Gender: {}", attributes.gender),
    ]
}

/// Baseline origin of each label line. Lines stack upward from just above the
/// box and may run past the top edge of the frame.
pub fn label_origins(pixel_box: &PixelBox) -> [(i32, i32); 6] {
    std::array::from_fn(|i| {
        (
            pixel_box.x,
            pixel_box
                .y
                .saturating_sub(LABEL_BASELINE_OFFSET)
                .saturating_sub(LABEL_LINE_SPACING * i as i32),
        )
    })
}

pub struct OverlayRenderer {
    font: Option<Font<'static>>,
}

impl OverlayRenderer {
    /// Loads `font_path`, or the first system font found when no path is given.
    /// Without a usable font only the bounding box is drawn.
    pub fn new(font_path: Option<&Path>) -> Self {
        let candidates: Vec<PathBuf> = match font_path {
            Some(path) => vec![path.to_path_buf()],
            None => SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from).collect(),
        };

        for path in &candidates {
            let Ok(bytes) = fs::read(path) else {
                continue;
            };
            match Font::try_from_vec(bytes) {
                Some(font) => {
                    log::info!("label font loaded from {}", path.display());
                    return Self { font: Some(font) };
                }
                None => log::warn!("{} is not a usable TrueType font", path.display()),
            }
        }

        log::warn!("no label font available, attribute labels will not be drawn");
        Self::without_font()
    }

    pub fn without_font() -> Self {
        Self { font: None }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, frame: &mut Frame, result: &InferenceResult) {
        let Some(bbox) = result.bounding_box else {
            return;
        };
        let (width, height) = (frame.width, frame.height);
        let pixel_box = bbox.to_pixels(width, height);

        draw_rect_outline(&mut frame.rgba, width, height, &pixel_box, OVERLAY_COLOR);

        let Some(font) = self.font.as_ref() else {
            return;
        };
        let lines = labels(&result.attributes);
        for (text, (x, y)) in lines.iter().zip(label_origins(&pixel_box)) {
            draw_text(font, &mut frame.rgba, width, height, x, y, text, OVERLAY_COLOR);
        }
    }
}

fn draw_rect_outline(buffer: &mut [u8], width: u32, height: u32, rect: &PixelBox, color: [u8; 4]) {
    let (x0, y0) = (rect.x, rect.y);
    let x1 = rect.x.saturating_add(rect.width);
    let y1 = rect.y.saturating_add(rect.height);
    // Stroke centred on the edge, matching a 2px outline.
    let inner = BOX_THICKNESS / 2;
    let outer = BOX_THICKNESS - inner;

    // Boxes far outside the frame saturate at the i32 limits and clip away.
    let (left, right) = (x0.saturating_sub(outer), x1.saturating_add(outer));
    let (top, bottom) = (y0.saturating_sub(outer), y1.saturating_add(outer));

    fill_rect(buffer, width, height, left, top, right, y0.saturating_add(inner), color);
    fill_rect(buffer, width, height, left, y1.saturating_sub(inner), right, bottom, color);
    fill_rect(buffer, width, height, left, top, x0.saturating_add(inner), bottom, color);
    fill_rect(buffer, width, height, x1.saturating_sub(inner), top, right, bottom, color);
}

/// Fills the half-open span `[x0, x1) x [y0, y1)`, clipped to the buffer.
fn fill_rect(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    color: [u8; 4],
) {
    let clip = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
    let (cx0, cx1) = (clip(x0, width), clip(x1, width));
    let (cy0, cy1) = (clip(y0, height), clip(y1, height));

    for y in cy0..cy1 {
        for x in cx0..cx1 {
            put_pixel_safe(buffer, width, height, x as i32, y as i32, color);
        }
    }
}

fn draw_text(
    font: &Font<'_>,
    buffer: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    baseline: i32,
    text: &str,
    color: [u8; 4],
) {
    let scale = Scale::uniform(LABEL_SCALE);
    let origin = point(x as f32, baseline as f32);

    for glyph in font.layout(text, scale, origin) {
        let Some(bounds) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            let px = bounds.min.x.saturating_add(gx as i32);
            let py = bounds.min.y.saturating_add(gy as i32);
            blend_pixel_safe(buffer, width, height, px, py, color, coverage);
        });
    }
}

fn blend_pixel_safe(
    buffer: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    color: [u8; 4],
    coverage: f32,
) {
    let Some(idx) = pixel_index(buffer, width, height, x, y) else {
        return;
    };
    let alpha = (coverage.clamp(0.0, 1.0) * 255.0) as u32;
    let inv_alpha = 255 - alpha;
    for channel in 0..3 {
        let dst = &mut buffer[idx + channel];
        *dst = ((color[channel] as u32 * alpha + *dst as u32 * inv_alpha) / 255) as u8;
    }
    buffer[idx + 3] = buffer[idx + 3].max(color[3]);
}

fn put_pixel_safe(buffer: &mut [u8], width: u32, height: u32, x: i32, y: i32, color: [u8; 4]) {
    if let Some(idx) = pixel_index(buffer, width, height, x, y) {
        buffer[idx..idx + 4].copy_from_slice(&color);
    }
}

fn pixel_index(buffer: &[u8], width: u32, height: u32, x: i32, y: i32) -> Option<usize> {
    if x < 0 || y < 0 {
        return None;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= width || uy >= height {
        return None;
    }
    let idx = (uy as usize * width as usize + ux as usize) * 4;
    (idx + 3 < buffer.len()).then_some(idx)
}
