use std::sync::Arc;

use kurbo::Shape;

use crate::{
    assets::decode::Bitmap,
    foundation::{
        core::{Affine, Rgba8},
        error::{BoothError, BoothResult},
        math::mul_div255_u8,
    },
    render::frame::{FrameRGBA, FrameTarget},
    stickers::entity::VideoPos,
};

/// A sticker ready to be drawn: its logical box and (if resident) its bitmap.
#[derive(Clone, Debug)]
pub struct PlacedSticker {
    pub id: u64,
    pub pos: VideoPos,
    /// Side of the square box the image is contain-fitted into.
    pub box_size: f64,
    /// `None` when the image is not loaded; such stickers are skipped.
    pub bitmap: Option<Arc<Bitmap>>,
}

/// Everything a single frame depends on.
#[derive(Clone, Copy, Debug)]
pub struct FrameInputs<'a> {
    pub target: FrameTarget,
    /// Corner radius in logical pixels (clamped to half the shorter side).
    pub border_radius: f64,
    pub background: Option<&'a Bitmap>,
    pub stickers: &'a [PlacedSticker],
    /// Painted when no background image is available.
    pub fallback: Option<Rgba8>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct MaskKey {
    width: u16,
    height: u16,
    radius_bits: u64,
    density_bits: u64,
}

/// CPU compositor producing one premultiplied RGBA frame per call.
///
/// The render context and the rounded-corner mask are reused across frames of equal size.
#[derive(Default)]
pub struct FrameCompositor {
    ctx: Option<vello_cpu::RenderContext>,
    mask: Option<(MaskKey, Vec<u8>)>,
}

impl std::fmt::Debug for FrameCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCompositor")
            .field("has_ctx", &self.ctx.is_some())
            .field("mask", &self.mask.as_ref().map(|(k, _)| *k))
            .finish()
    }
}

impl FrameCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose one frame.
    ///
    /// Layers, bottom to top: the background mirrored horizontally and cover-fitted to the
    /// canvas (or the fallback fill), then stickers in ascending id order, each contain-fitted
    /// into its box. The result is clipped to a rounded rectangle; outside the clip every pixel
    /// is fully transparent.
    pub fn compose(&mut self, inputs: &FrameInputs<'_>) -> BoothResult<FrameRGBA> {
        let (width_u16, height_u16) = surface_dims(inputs.target)?;
        let (pw, ph) = (u32::from(width_u16), u32::from(height_u16));

        let mut pixmap = vello_cpu::Pixmap::new(width_u16, height_u16);
        clear_pixmap_to_transparent(&mut pixmap);

        let base = Affine::scale(inputs.target.pixel_density);
        self.with_ctx_mut(width_u16, height_u16, |_, ctx| {
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            draw_background(ctx, inputs, base);

            let mut order: Vec<&PlacedSticker> = inputs.stickers.iter().collect();
            order.sort_by_key(|s| s.id);
            for s in order {
                let Some(bitmap) = s.bitmap.as_deref() else {
                    tracing::trace!(id = s.id, "sticker bitmap not resident; skipped");
                    continue;
                };
                draw_contained(ctx, bitmap, s.pos, s.box_size, base);
            }

            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
            Ok(())
        })?;

        let radius = clamp_radius(inputs.border_radius, inputs.target);
        if radius > 0.0 {
            let key = MaskKey {
                width: width_u16,
                height: height_u16,
                radius_bits: radius.to_bits(),
                density_bits: inputs.target.pixel_density.to_bits(),
            };
            let mask = self.rounded_mask(key, inputs.target, radius, base)?;
            apply_alpha_mask(pixmap.data_as_u8_slice_mut(), &mask);
        }

        Ok(FrameRGBA {
            width: pw,
            height: ph,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn rounded_mask(
        &mut self,
        key: MaskKey,
        target: FrameTarget,
        radius: f64,
        base: Affine,
    ) -> BoothResult<Vec<u8>> {
        if let Some((k, m)) = &self.mask
            && *k == key
        {
            return Ok(m.clone());
        }

        let mut pixmap = vello_cpu::Pixmap::new(key.width, key.height);
        clear_pixmap_to_transparent(&mut pixmap);
        self.with_ctx_mut(key.width, key.height, |_, ctx| {
            ctx.set_transform(affine_to_cpu(base));
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(255, 255, 255, 255));
            let rr = kurbo::RoundedRect::new(0.0, 0.0, target.width, target.height, radius);
            let mut p = vello_cpu::kurbo::BezPath::new();
            for el in rr.path_elements(0.1) {
                p.push(el);
            }
            ctx.fill_path(&p);
            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
            Ok(())
        })?;

        let alpha: Vec<u8> = pixmap
            .data_as_u8_slice()
            .chunks_exact(4)
            .map(|px| px[3])
            .collect();
        self.mask = Some((key, alpha.clone()));
        Ok(alpha)
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> BoothResult<R>,
    ) -> BoothResult<R> {
        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            _ => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }
}

/// Backing-store size for `target`, or a capability error when no surface that large can be
/// allocated.
pub fn surface_dims(target: FrameTarget) -> BoothResult<(u16, u16)> {
    let (pw, ph) = target.pixel_dims();
    let width: u16 = pw
        .try_into()
        .map_err(|_| BoothError::capability("drawing surface width exceeds u16"))?;
    let height: u16 = ph
        .try_into()
        .map_err(|_| BoothError::capability("drawing surface height exceeds u16"))?;
    Ok((width, height))
}

/// Clamp a corner radius to `[0, min(w/2, h/2)]` of the logical canvas.
pub fn clamp_radius(radius: f64, target: FrameTarget) -> f64 {
    if !radius.is_finite() {
        return 0.0;
    }
    radius
        .min(target.width / 2.0)
        .min(target.height / 2.0)
        .max(0.0)
}

/// Scale and offset that cover-fit a `sw`x`sh` source into `dw`x`dh`, centered.
pub fn cover_fit(sw: f64, sh: f64, dw: f64, dh: f64) -> (f64, f64, f64) {
    let s = (dw / sw).max(dh / sh);
    (s, (dw - sw * s) / 2.0, (dh - sh * s) / 2.0)
}

/// Scale and offset that contain-fit a `sw`x`sh` source into a `side`x`side` box, centered.
pub fn contain_fit(sw: f64, sh: f64, side: f64) -> (f64, f64, f64) {
    let s = (side / sw).min(side / sh);
    (s, (side - sw * s) / 2.0, (side - sh * s) / 2.0)
}

fn draw_background(ctx: &mut vello_cpu::RenderContext, inputs: &FrameInputs<'_>, base: Affine) {
    let (w, h) = (inputs.target.width, inputs.target.height);
    match (inputs.background, inputs.fallback) {
        (Some(bg), _) => {
            let (bw, bh) = (f64::from(bg.width), f64::from(bg.height));
            let (s, dx, dy) = cover_fit(bw, bh, w, h);
            // Mirror about the vertical center line of the canvas.
            let mirror = Affine::translate((w, 0.0)) * Affine::scale_non_uniform(-1.0, 1.0);
            let tr = base * mirror * Affine::translate((dx, dy)) * Affine::scale(s);
            ctx.set_transform(affine_to_cpu(tr));
            ctx.set_paint(bg.paint.clone());
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, bw, bh));
        }
        (None, Some(c)) => {
            ctx.set_transform(affine_to_cpu(base));
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
        }
        (None, None) => {}
    }
}

fn draw_contained(
    ctx: &mut vello_cpu::RenderContext,
    bitmap: &Bitmap,
    pos: VideoPos,
    side: f64,
    base: Affine,
) {
    if side.is_nan() || side <= 0.0 {
        return;
    }
    let (iw, ih) = (f64::from(bitmap.width), f64::from(bitmap.height));
    let (s, dx, dy) = contain_fit(iw, ih, side);
    let tr = base * Affine::translate((pos.x + dx, pos.y + dy)) * Affine::scale(s);
    ctx.set_transform(affine_to_cpu(tr));
    ctx.set_paint(bitmap.paint.clone());
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, iw, ih));
}

fn apply_alpha_mask(dst_premul: &mut [u8], mask_alpha: &[u8]) {
    for (px, &m) in dst_premul.chunks_exact_mut(4).zip(mask_alpha) {
        if m == 255 {
            continue;
        }
        let m = u16::from(m);
        for c in px.iter_mut() {
            *c = mul_div255_u8(u16::from(*c), m);
        }
    }
}

fn clear_pixmap_to_transparent(pixmap: &mut vello_cpu::Pixmap) {
    pixmap.data_as_u8_slice_mut().fill(0);
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
