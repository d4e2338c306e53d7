use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    /// Mirrors the frame top-to-bottom in place.
    pub fn flip_vertical(&mut self) {
        let stride = self.width as usize * 4;
        let rows = self.height as usize;
        if stride == 0 || self.rgba.len() < stride * rows {
            return;
        }
        for top in 0..rows / 2 {
            let bottom = rows - 1 - top;
            let (head, tail) = self.rgba.split_at_mut(bottom * stride);
            head[top * stride..(top + 1) * stride].swap_with_slice(&mut tail[..stride]);
        }
    }
}

/// Subject location as fractions of the frame dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Absolute pixel rectangle. Not clamped to the frame, so it may extend past
/// any edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> PixelBox {
        let scale = |frac: f64, extent: u32| (frac * extent as f64).round() as i32;
        PixelBox {
            x: scale(self.x, frame_width),
            y: scale(self.y, frame_height),
            width: scale(self.width, frame_width),
            height: scale(self.height, frame_height),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    pub age: String,
    pub race: String,
    pub masked: String,
    pub skintone: String,
    pub emotion: String,
    pub gender: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InferenceResult {
    pub bounding_box: Option<BoundingBox>,
    pub attributes: Attributes,
}
