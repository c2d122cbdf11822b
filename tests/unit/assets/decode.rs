use std::io::Cursor;

use super::*;

#[test]
fn decode_image_png_dimensions_and_premul() {
    let src_rgba = vec![100u8, 50u8, 200u8, 128u8];
    let img = image::RgbaImage::from_raw(1, 1, src_rgba).unwrap();

    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();

    let bitmap = decode_image(&buf).unwrap();
    assert_eq!(bitmap.width, 1);
    assert_eq!(bitmap.height, 1);
    assert_eq!(
        bitmap.rgba8_premul.as_slice(),
        &[
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128u8
        ]
    );
}

#[test]
fn decode_garbage_is_a_resource_error() {
    let err = decode_image(b"definitely not a png").unwrap_err();
    assert!(matches!(err, BoothError::Resource(_)));
}

#[test]
fn zero_sized_and_mismatched_bitmaps_are_rejected() {
    assert!(Bitmap::from_rgba8(0, 4, Vec::new()).is_err());
    assert!(Bitmap::from_rgba8(2, 2, vec![0; 3]).is_err());
    assert!(Bitmap::from_rgba8(70_000, 1, vec![0; 280_000]).is_err());
}

#[test]
fn fully_transparent_pixels_drop_color() {
    let bmp = Bitmap::from_rgba8(1, 1, vec![255, 255, 255, 0]).unwrap();
    assert_eq!(bmp.rgba8_premul.as_slice(), &[0, 0, 0, 0]);
}
