/// A rendered frame as RGBA8 pixels.
///
/// Frames leave the compositor **premultiplied**; the `premultiplied` flag keeps that explicit at
/// API boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// RGBA bytes of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Straight-alpha copy suitable for PNG output.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        if !self.premultiplied {
            return out;
        }
        for px in out.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            if a == 0 || a == 255 {
                continue;
            }
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
            }
        }
        out
    }
}

/// Logical canvas size plus the device pixel ratio used to back it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTarget {
    /// Logical width in CSS-style pixels.
    pub width: f64,
    /// Logical height in CSS-style pixels.
    pub height: f64,
    /// Backing pixels per logical pixel.
    pub pixel_density: f64,
}

impl FrameTarget {
    /// Derive a target from the host's on-screen footprint.
    ///
    /// Logical dimensions are floored and never smaller than 2.
    pub fn from_footprint(width: f64, height: f64, pixel_density: f64) -> Self {
        let floor2 = |v: f64| if v.is_finite() { v.floor().max(2.0) } else { 2.0 };
        let dpr = if pixel_density.is_finite() && pixel_density > 0.0 {
            pixel_density
        } else {
            1.0
        };
        Self {
            width: floor2(width),
            height: floor2(height),
            pixel_density: dpr,
        }
    }

    /// Backing-store dimensions: `floor(logical * density)`, at least 1.
    pub fn pixel_dims(&self) -> (u32, u32) {
        let px = |v: f64| (v * self.pixel_density).floor().max(1.0) as u32;
        (px(self.width), px(self.height))
    }
}
