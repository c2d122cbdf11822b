use super::*;

fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Arc<Bitmap> {
    let mut bytes = Vec::with_capacity((w * h * 4) as usize);
    for _ in 0..(w * h) {
        bytes.extend_from_slice(&rgba);
    }
    Arc::new(Bitmap::from_rgba8(w, h, bytes).unwrap())
}

fn left_red_right_blue() -> Bitmap {
    Bitmap::from_rgba8(2, 1, vec![255, 0, 0, 255, 0, 0, 255, 255]).unwrap()
}

fn assert_near(px: [u8; 4], expected: [u8; 4]) {
    for (a, b) in px.iter().zip(expected) {
        assert!(a.abs_diff(b) <= 2, "{px:?} vs {expected:?}");
    }
}

fn target(w: f64, h: f64) -> FrameTarget {
    FrameTarget::from_footprint(w, h, 1.0)
}

fn inputs<'a>(
    t: FrameTarget,
    background: Option<&'a Bitmap>,
    stickers: &'a [PlacedSticker],
) -> FrameInputs<'a> {
    FrameInputs {
        target: t,
        border_radius: 0.0,
        background,
        stickers,
        fallback: None,
    }
}

fn sticker(id: u64, x: f64, y: f64, side: f64, bitmap: Option<Arc<Bitmap>>) -> PlacedSticker {
    PlacedSticker {
        id,
        pos: VideoPos::new(x, y),
        box_size: side,
        bitmap,
    }
}

#[test]
fn background_is_mirrored() {
    let bg = left_red_right_blue();
    let mut c = FrameCompositor::new();
    let f = c.compose(&inputs(target(40.0, 20.0), Some(&bg), &[])).unwrap();
    assert_eq!((f.width, f.height), (40, 20));

    let left = f.pixel(2, 10).unwrap();
    let right = f.pixel(37, 10).unwrap();
    assert!(left[2] > left[0], "left should be blue: {left:?}");
    assert!(right[0] > right[2], "right should be red: {right:?}");
    assert!(left[3] >= 253);
}

#[test]
fn background_cover_fills_whole_canvas() {
    let bg = solid(10, 10, [0, 200, 0, 255]);
    let mut c = FrameCompositor::new();
    let f = c.compose(&inputs(target(60.0, 20.0), Some(&bg), &[])).unwrap();
    for (x, y) in [(0, 0), (59, 0), (0, 19), (59, 19), (30, 10)] {
        assert!(f.pixel(x, y).unwrap()[3] >= 253, "pixel ({x},{y})");
    }
}

#[test]
fn rounded_corners_are_transparent() {
    let bg = solid(4, 4, [255, 255, 255, 255]);
    let mut c = FrameCompositor::new();
    let mut i = inputs(target(40.0, 40.0), Some(&bg), &[]);
    i.border_radius = 10.0;
    let f = c.compose(&i).unwrap();
    assert_eq!(f.pixel(0, 0).unwrap(), [0, 0, 0, 0]);
    assert_eq!(f.pixel(39, 39).unwrap(), [0, 0, 0, 0]);
    assert_near(f.pixel(20, 20).unwrap(), [255, 255, 255, 255]);
    assert!(f.pixel(20, 0).unwrap()[3] >= 253);
}

#[test]
fn oversize_radius_is_clamped() {
    let t = target(40.0, 20.0);
    assert_eq!(clamp_radius(50.0, t), 10.0);
    assert_eq!(clamp_radius(-3.0, t), 0.0);
    assert_eq!(clamp_radius(f64::INFINITY, t), 0.0);

    let bg = solid(4, 4, [255, 255, 255, 255]);
    let mut c = FrameCompositor::new();
    let mut i = inputs(t, Some(&bg), &[]);
    i.border_radius = 500.0;
    let f = c.compose(&i).unwrap();
    assert_eq!(f.pixel(0, 0).unwrap()[3], 0);
    assert!(f.pixel(20, 10).unwrap()[3] >= 253);
}

#[test]
fn sticker_is_contain_fitted_and_centered() {
    let green = solid(4, 2, [0, 255, 0, 255]);
    let stickers = [sticker(1, 10.0, 10.0, 20.0, Some(green))];
    let mut c = FrameCompositor::new();
    let f = c.compose(&inputs(target(60.0, 60.0), None, &stickers)).unwrap();

    // 4x2 into a 20 box -> 20x10 at y = 15..25.
    assert_near(f.pixel(20, 20).unwrap(), [0, 255, 0, 255]);
    assert_eq!(f.pixel(20, 12).unwrap()[3], 0);
    assert_eq!(f.pixel(20, 27).unwrap()[3], 0);
    assert_eq!(f.pixel(5, 5).unwrap()[3], 0);
}

#[test]
fn higher_ids_draw_on_top_regardless_of_input_order() {
    let red = solid(2, 2, [255, 0, 0, 255]);
    let blue = solid(2, 2, [0, 0, 255, 255]);
    let stickers = [
        sticker(5, 0.0, 0.0, 20.0, Some(blue)),
        sticker(2, 0.0, 0.0, 20.0, Some(red)),
    ];
    let mut c = FrameCompositor::new();
    let f = c.compose(&inputs(target(20.0, 20.0), None, &stickers)).unwrap();
    assert_near(f.pixel(10, 10).unwrap(), [0, 0, 255, 255]);
}

#[test]
fn missing_bitmaps_are_skipped() {
    let stickers = [sticker(1, 0.0, 0.0, 20.0, None)];
    let mut c = FrameCompositor::new();
    let f = c.compose(&inputs(target(20.0, 20.0), None, &stickers)).unwrap();
    assert!(f.data.iter().all(|&b| b == 0));
}

#[test]
fn fallback_fill_without_background() {
    let mut c = FrameCompositor::new();
    let mut i = inputs(target(10.0, 10.0), None, &[]);
    i.fallback = Some(Rgba8::opaque(10, 20, 30));
    let f = c.compose(&i).unwrap();
    assert_near(f.pixel(5, 5).unwrap(), [10, 20, 30, 255]);
}

#[test]
fn pixel_density_scales_backing_store() {
    let bg = solid(2, 2, [255, 255, 255, 255]);
    let mut c = FrameCompositor::new();
    let t = FrameTarget::from_footprint(10.0, 10.0, 2.0);
    let f = c.compose(&inputs(t, Some(&bg), &[])).unwrap();
    assert_eq!((f.width, f.height), (20, 20));
    assert_eq!(f.data.len(), 20 * 20 * 4);
}

#[test]
fn compose_is_deterministic_and_reuses_state() {
    let bg = left_red_right_blue();
    let s = [sticker(3, 4.0, 4.0, 12.0, Some(solid(3, 5, [200, 100, 50, 180])))];
    let mut c = FrameCompositor::new();
    let mut i = inputs(target(32.0, 24.0), Some(&bg), &s);
    i.border_radius = 6.0;
    let a = c.compose(&i).unwrap();
    let b = c.compose(&i).unwrap();
    let fresh = FrameCompositor::new().compose(&i).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, fresh);
}

#[test]
fn oversized_surface_is_a_capability_error() {
    let mut c = FrameCompositor::new();
    let t = FrameTarget::from_footprint(70_000.0, 10.0, 1.0);
    let err = c.compose(&inputs(t, None, &[])).unwrap_err();
    assert!(matches!(err, BoothError::Capability(_)), "{err}");
}

#[test]
fn fit_helpers() {
    assert_eq!(cover_fit(2.0, 1.0, 40.0, 40.0), (40.0, -20.0, 0.0));
    assert_eq!(contain_fit(4.0, 2.0, 20.0), (5.0, 0.0, 5.0));
}
