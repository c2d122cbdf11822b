use super::*;

fn frame(w: u32, h: u32, data: Vec<u8>) -> FrameRGBA {
    FrameRGBA {
        width: w,
        height: h,
        data,
        premultiplied: true,
    }
}

#[test]
fn flatten_alpha_0_returns_bg() {
    let f = frame(1, 1, vec![0, 0, 0, 0]);
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_cropped(&mut dst, (1, 1), &f, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn flatten_alpha_255_is_identity() {
    let f = frame(1, 1, vec![1, 2, 3, 255]);
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_cropped(&mut dst, (1, 1), &f, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, vec![1, 2, 3, 255]);
}

#[test]
fn flatten_crops_odd_frames() {
    // 3x3 frame, row-major pixel value = index.
    let data: Vec<u8> = (0..9u8).flat_map(|i| [i, i, i, 255]).collect();
    let f = frame(3, 3, data);
    let mut dst = vec![0u8; 2 * 2 * 4];
    flatten_premul_over_bg_cropped(&mut dst, (2, 2), &f, [0, 0, 0, 255]).unwrap();
    let firsts: Vec<u8> = dst.chunks_exact(4).map(|p| p[0]).collect();
    assert_eq!(firsts, vec![0, 1, 3, 4]);
}

#[test]
fn flatten_rejects_oversized_destination() {
    let f = frame(1, 1, vec![0; 4]);
    let mut dst = vec![0u8; 16];
    assert!(flatten_premul_over_bg_cropped(&mut dst, (2, 2), &f, [0, 0, 0, 255]).is_err());
}

#[test]
fn parses_encoder_table() {
    let text = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC
 V....D libvpx-vp9           libvpx VP9 (codec vp9)
 A....D libopus              libopus Opus
";
    let names = parse_encoder_list(text);
    assert_eq!(names, vec!["libx264", "libvpx-vp9", "libopus"]);
}

#[test]
fn missing_program_supports_nothing() {
    let f = FfmpegFacility::with_program("definitely-not-an-ffmpeg-binary-xyz");
    assert!(f.available_encoders().is_empty());
    assert!(!f.is_type_supported("video/mp4;codecs=h264"));
    assert!(!f.is_type_supported("video/webm"));
}

#[test]
fn encoder_names() {
    assert_eq!(encoder_name(VideoCodec::H264), "libx264");
    assert_eq!(encoder_name(VideoCodec::Vp9), "libvpx-vp9");
    assert_eq!(encoder_name(VideoCodec::Vp8), "libvpx");
}

#[test]
fn encodes_webm_when_ffmpeg_available() {
    let f = FfmpegFacility::new();
    if !is_ffmpeg_on_path() || !f.is_type_supported("video/webm") {
        return;
    }
    let mut enc = f
        .start(EncoderConfig {
            width: 17,
            height: 9,
            fps: Fps::per_second(30).unwrap(),
            mime: Some("video/webm".to_string()),
        })
        .unwrap();
    for i in 0..3 {
        let data = vec![128u8; 17 * 9 * 4];
        enc.push_frame(&frame(17, 9, data), f64::from(i) * 33.3)
            .unwrap();
    }
    let out = enc.finish().unwrap();
    assert!(out.byte_len() > 0);
    assert_eq!(out.mime, "video/webm");
}
