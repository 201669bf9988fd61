use crate::foundation::error::{BlurError, BlurResult};

/// Integer image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Size2 {
    pub width: u32,
    pub height: u32,
}

impl Size2 {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Per-axis reciprocal, the form sampling offsets are normalized with.
    pub fn recip(self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    pub fn byte_len(self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(4))
    }

    /// Halve both dimensions, flooring, never below 1×1.
    pub fn halved(self) -> Self {
        Self {
            width: (self.width / 2).max(1),
            height: (self.height / 2).max(1),
        }
    }

    /// Divide both dimensions by `factor`, rounding, clamped to `[1, self]`.
    pub fn scaled_down(self, factor: f64) -> Self {
        fn axis(v: u32, factor: f64) -> u32 {
            let scaled = (f64::from(v) / factor).round();
            (scaled.max(1.0) as u32).min(v.max(1))
        }
        Self {
            width: axis(self.width, factor),
            height: axis(self.height, factor),
        }
    }
}

impl std::fmt::Display for Size2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Direction of a separable 1D pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// A straight (non-premultiplied) RGBA8 image, tightly packed, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRgba8 {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl ImageRgba8 {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> BlurResult<Self> {
        let img = Self {
            width,
            height,
            data,
        };
        img.validate()?;
        Ok(img)
    }

    /// Check that the buffer holds exactly `width * height` RGBA pixels.
    ///
    /// The fields are public, so consumers that index the buffer call this first.
    pub fn validate(&self) -> BlurResult<()> {
        let size = self.size();
        if size.is_empty() {
            return Err(BlurError::validation(format!(
                "image dimensions must be >= 1x1, got {size}"
            )));
        }
        let expected = size
            .byte_len()
            .ok_or_else(|| BlurError::validation("image buffer size overflow"))?;
        if self.data.len() != expected {
            return Err(BlurError::validation(format!(
                "image {size} expects {expected} bytes, got {}",
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Image filled with a single RGBA value.
    pub fn filled(width: u32, height: u32, px: [u8; 4]) -> BlurResult<Self> {
        let n = Size2::new(width, height)
            .byte_len()
            .ok_or_else(|| BlurError::validation("image buffer size overflow"))?
            / 4;
        Self::new(width, height, px.repeat(n))
    }

    pub fn size(&self) -> Size2 {
        Size2::new(self.width, self.height)
    }

    /// Panics when `(x, y)` is outside a validated image.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn from_dynamic(img: &image::DynamicImage) -> BlurResult<Self> {
        let rgba = img.to_rgba8();
        let (w, h) = rgba.dimensions();
        Self::new(w, h, rgba.into_raw())
    }

    pub fn to_rgba_image(&self) -> BlurResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| BlurError::validation("image buffer does not match its dimensions"))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
