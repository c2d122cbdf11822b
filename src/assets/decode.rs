use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{BoothError, BoothResult};
use crate::foundation::math::premul_rgba8;

/// Decoded raster image, premultiplied RGBA8, ready to be used as a paint.
#[derive(Clone)]
pub struct Bitmap {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
    pub(crate) paint: vello_cpu::Image,
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba8_premul.len())
            .finish()
    }
}

impl Bitmap {
    /// Build from straight-alpha RGBA8 bytes.
    pub fn from_rgba8(width: u32, height: u32, mut rgba: Vec<u8>) -> BoothResult<Self> {
        premultiply_rgba8_in_place(&mut rgba);
        Self::from_premul_rgba8(width, height, rgba)
    }

    /// Build from already premultiplied RGBA8 bytes.
    pub fn from_premul_rgba8(width: u32, height: u32, rgba8_premul: Vec<u8>) -> BoothResult<Self> {
        if width == 0 || height == 0 {
            return Err(BoothError::resource("bitmap has zero width or height"));
        }
        let pixmap = pixmap_from_premul_bytes(&rgba8_premul, width, height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
            paint,
        })
    }
}

/// Decode encoded image bytes (PNG, JPEG, ...) into a [`Bitmap`].
pub fn decode_image(bytes: &[u8]) -> BoothResult<Bitmap> {
    let dyn_img = image::load_from_memory(bytes)
        .context("decode image from memory")
        .map_err(|e| BoothError::resource(format!("{e:#}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Bitmap::from_rgba8(width, height, rgba.into_raw())
}

pub(crate) fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> BoothResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| BoothError::resource("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| BoothError::resource("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(BoothError::resource("pixmap byte len mismatch"));
    }
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels, w, h, true,
    ))
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let premul = premul_rgba8([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&premul);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
