use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;

use super::*;
use crate::{
    assets::{cache::ImageLoader, decode::Bitmap},
    encode::facility::InMemoryFacility,
    foundation::error::BoothError,
    record::{
        clock::{CancelToken, FixedStepClock},
        scene::FixedFootprint,
    },
    stickers::entity::{TrayHome, VideoPos},
};

/// Solid 2x2 bitmaps keyed by name prefix; `missing*` fails.
struct SolidLoader;

impl ImageLoader for SolidLoader {
    fn load(&self, src: &str) -> BoothResult<Bitmap> {
        let rgba = if src.starts_with("missing") {
            return Err(BoothError::resource(format!("no such image '{src}'")));
        } else if src.starts_with("red") {
            [255, 0, 0, 255]
        } else if src.starts_with("blue") {
            [0, 0, 255, 255]
        } else {
            [255, 255, 255, 255]
        };
        Bitmap::from_rgba8(2, 2, rgba.repeat(4))
    }
}

fn cache() -> Arc<ImageCache> {
    Arc::new(ImageCache::new(Arc::new(SolidLoader)))
}

fn opts() -> RecorderOpts {
    RecorderOpts {
        fps: Fps::per_second(30).unwrap(),
        duration_ms: 2000.0,
        border_radius: 8.0,
        fallback: None,
    }
}

fn placed(id: u64, src: &str, x: f64, y: f64) -> StickerEntity {
    StickerEntity {
        id,
        src: src.to_string(),
        is_template: false,
        in_video: true,
        tray_home: TrayHome::default(),
        video_pos: VideoPos::new(x, y),
        scale: 1.0,
        base_size: 20.0,
    }
}

fn backgrounds() -> Vec<String> {
    vec!["red-bg.png".to_string(), "blue-bg.png".to_string()]
}

#[derive(Default)]
struct StaticScene {
    index: usize,
    stickers: Vec<StickerEntity>,
    index_reads: AtomicUsize,
}

impl LiveScene for StaticScene {
    fn current_background_index(&self) -> usize {
        self.index_reads.fetch_add(1, Ordering::SeqCst);
        self.index
    }

    fn current_placed_stickers(&self) -> Vec<StickerEntity> {
        self.stickers.clone()
    }
}

fn chunk_checksum(blob_bytes: &[u8], frame: usize) -> u32 {
    let c = &blob_bytes[frame * 16..frame * 16 + 16];
    u32::from_le_bytes([c[12], c[13], c[14], c[15]])
}

#[test]
fn thirty_fps_two_seconds_yields_one_blob() {
    let facility = Arc::new(InMemoryFacility::permissive());
    let rec = ClipRecorder::new(facility.clone(), cache(), opts());
    let scene = StaticScene::default();
    let mut clock = FixedStepClock::new(60.0);

    let blob = rec
        .record(&FixedFootprint::new(64.0, 48.0), &backgrounds(), &scene, &mut clock)
        .unwrap()
        .unwrap();

    let interval = opts().fps.frame_interval_ms();
    assert!((blob.duration_ms - 2000.0).abs() <= interval, "{}", blob.duration_ms);
    assert_eq!(blob.frames, 60);
    assert_eq!(blob.bytes.len(), 60 * 16);
    assert_eq!(blob.mime, "video/mp4;codecs=h264");
    assert_eq!((blob.width, blob.height), (64, 48));
    assert_eq!(facility.started(), 1);
    assert!(!rec.is_recording());
}

#[test]
fn accessors_are_read_every_frame() {
    let facility = Arc::new(InMemoryFacility::permissive());
    let rec = ClipRecorder::new(facility, cache(), opts());
    let scene = StaticScene::default();
    let mut clock = FixedStepClock::new(60.0);
    let blob = rec
        .record(&FixedFootprint::new(16.0, 16.0), &backgrounds(), &scene, &mut clock)
        .unwrap()
        .unwrap();
    assert_eq!(scene.index_reads.load(Ordering::SeqCst) as u64, blob.frames);
}

#[test]
fn clip_length_follows_elapsed_time_on_uneven_tick_rates() {
    let interval = opts().fps.frame_interval_ms();
    for hz in [50.0, 45.0, 144.0] {
        let facility = Arc::new(InMemoryFacility::permissive());
        let rec = ClipRecorder::new(facility, cache(), opts());
        let scene = StaticScene::default();
        let mut clock = FixedStepClock::new(hz);
        let blob = rec
            .record(&FixedFootprint::new(16.0, 16.0), &backgrounds(), &scene, &mut clock)
            .unwrap()
            .unwrap();

        assert_eq!(blob.frames, 60, "{hz} Hz");
        assert_eq!(blob.bytes.len(), 60 * 16, "{hz} Hz");
        assert!((blob.duration_ms - 2000.0).abs() <= interval, "{hz} Hz: {}", blob.duration_ms);
        let wall_ms = clock.now_ms();
        assert!((blob.duration_ms - wall_ms).abs() <= interval, "{hz} Hz: {wall_ms}");
        // Frames are repeated rather than drawn twice.
        assert!(scene.index_reads.load(Ordering::SeqCst) as u64 <= blob.frames);
    }
}

#[test]
fn short_clips_fill_every_frame_slot() {
    let mut o = opts();
    o.duration_ms = 50.0;
    let rec = ClipRecorder::new(Arc::new(InMemoryFacility::permissive()), cache(), o);
    let mut clock = FixedStepClock::new(60.0);
    let blob = rec
        .record(&FixedFootprint::new(8.0, 8.0), &[], &StaticScene::default(), &mut clock)
        .unwrap()
        .unwrap();
    assert_eq!(blob.frames, 2);
    assert_eq!(total_frames(2000.0, 1000.0 / 30.0), 60);
    assert_eq!(frames_due(2000.0, 1000.0 / 30.0), 60);
    assert_eq!(frames_due(32.5, 1000.0 / 30.0), 0);
}

/// Scene whose sticker list changes after a number of reads, like a user placing a sticker
/// mid-recording.
struct ChangingScene {
    reads: AtomicUsize,
    switch_after: usize,
}

impl LiveScene for ChangingScene {
    fn current_background_index(&self) -> usize {
        0
    }

    fn current_placed_stickers(&self) -> Vec<StickerEntity> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        if n < self.switch_after {
            Vec::new()
        } else {
            vec![placed(7, "blue-sticker.png", 4.0, 4.0)]
        }
    }
}

#[test]
fn later_frames_see_committed_changes() {
    let facility = Arc::new(InMemoryFacility::permissive());
    let rec = ClipRecorder::new(facility, cache(), opts());
    let scene = ChangingScene {
        reads: AtomicUsize::new(0),
        switch_after: 10,
    };
    let mut clock = FixedStepClock::new(60.0);
    let blob = rec
        .record(&FixedFootprint::new(32.0, 32.0), &backgrounds(), &scene, &mut clock)
        .unwrap()
        .unwrap();

    let early = chunk_checksum(&blob.bytes, 0);
    assert_eq!(early, chunk_checksum(&blob.bytes, 1));
    assert_ne!(early, chunk_checksum(&blob.bytes, 50));
}

#[test]
fn unmounted_host_yields_nothing() {
    let facility = Arc::new(InMemoryFacility::permissive());
    let rec = ClipRecorder::new(facility.clone(), cache(), opts());
    let mut clock = FixedStepClock::new(60.0);
    let out = rec
        .record(
            &FixedFootprint::unmounted(),
            &backgrounds(),
            &StaticScene::default(),
            &mut clock,
        )
        .unwrap();
    assert!(out.is_none());
    assert_eq!(facility.started(), 0);
    assert_eq!(clock.ticks(), 0);
    assert!(!rec.is_recording());
}

struct ReentrantScene<'a> {
    recorder: &'a ClipRecorder,
    nested_ignored: Mutex<Vec<bool>>,
}

impl LiveScene for ReentrantScene<'_> {
    fn current_background_index(&self) -> usize {
        0
    }

    fn current_placed_stickers(&self) -> Vec<StickerEntity> {
        let mut clock = FixedStepClock::new(60.0);
        let r = self.recorder.record(
            &FixedFootprint::new(8.0, 8.0),
            &[],
            &StaticScene::default(),
            &mut clock,
        );
        self.nested_ignored
            .lock()
            .unwrap()
            .push(matches!(r, Ok(None)) && clock.ticks() == 0);
        Vec::new()
    }
}

#[test]
fn second_request_while_recording_is_a_no_op() {
    let facility = Arc::new(InMemoryFacility::permissive());
    let mut o = opts();
    o.duration_ms = 100.0;
    let rec = ClipRecorder::new(facility.clone(), cache(), o);
    let scene = ReentrantScene {
        recorder: &rec,
        nested_ignored: Mutex::new(Vec::new()),
    };
    let mut clock = FixedStepClock::new(60.0);
    let blob = rec
        .record(&FixedFootprint::new(8.0, 8.0), &[], &scene, &mut clock)
        .unwrap();
    assert!(blob.is_some());

    let nested = scene.nested_ignored.lock().unwrap();
    assert!(!nested.is_empty());
    assert!(nested.iter().all(|&ignored| ignored));
    assert_eq!(facility.started(), 1);
    assert!(!rec.is_recording());
}

#[test]
fn encoder_start_failure_is_fatal_and_clears_latch() {
    let facility = Arc::new(InMemoryFacility::permissive().failing_start());
    let rec = ClipRecorder::new(facility, cache(), opts());
    for _ in 0..2 {
        let mut clock = FixedStepClock::new(60.0);
        let err = rec
            .record(
                &FixedFootprint::new(16.0, 16.0),
                &backgrounds(),
                &StaticScene::default(),
                &mut clock,
            )
            .unwrap_err();
        assert!(matches!(err, BoothError::Capability(_)));
        assert!(!rec.is_recording());
    }
}

#[test]
fn oversized_surface_fails_before_encoding() {
    let facility = Arc::new(InMemoryFacility::permissive());
    let rec = ClipRecorder::new(facility.clone(), cache(), opts());
    let mut clock = FixedStepClock::new(60.0);
    let err = rec
        .record(
            &FixedFootprint::new(40_000.0, 10.0).with_dpr(2.0),
            &backgrounds(),
            &StaticScene::default(),
            &mut clock,
        )
        .unwrap_err();
    assert!(matches!(err, BoothError::Capability(_)));
    assert_eq!(facility.started(), 0);
    assert!(!rec.is_recording());
}

#[test]
fn cancellation_aborts_encoder() {
    let facility = Arc::new(InMemoryFacility::permissive());
    let rec = ClipRecorder::new(facility.clone(), cache(), opts());
    let token = CancelToken::new();
    token.cancel();
    let mut clock = FixedStepClock::new(60.0).with_cancel(token);
    let out = rec
        .record(
            &FixedFootprint::new(16.0, 16.0),
            &backgrounds(),
            &StaticScene::default(),
            &mut clock,
        )
        .unwrap();
    assert!(out.is_none());
    assert_eq!(facility.aborted(), 1);
    assert!(!rec.is_recording());

    let mut clock = FixedStepClock::new(60.0).limit(10);
    let out = rec
        .record(
            &FixedFootprint::new(16.0, 16.0),
            &backgrounds(),
            &StaticScene::default(),
            &mut clock,
        )
        .unwrap();
    assert!(out.is_none());
    assert_eq!(facility.aborted(), 2);
}

#[test]
fn unsupported_types_fall_back_to_facility_default() {
    let facility = Arc::new(InMemoryFacility::new(Vec::<String>::new()));
    let mut o = opts();
    o.duration_ms = 100.0;
    let rec = ClipRecorder::new(facility.clone(), cache(), o);
    let mut clock = FixedStepClock::new(60.0);
    let blob = rec
        .record(
            &FixedFootprint::new(16.0, 16.0),
            &backgrounds(),
            &StaticScene::default(),
            &mut clock,
        )
        .unwrap()
        .unwrap();
    assert_eq!(facility.last_config().unwrap().mime, None);
    assert_eq!(blob.mime, "video/webm");
}

#[test]
fn device_pixel_ratio_scales_output() {
    let facility = Arc::new(InMemoryFacility::permissive());
    let mut o = opts();
    o.duration_ms = 50.0;
    let rec = ClipRecorder::new(facility.clone(), cache(), o);
    let mut clock = FixedStepClock::new(60.0);
    let blob = rec
        .record(
            &FixedFootprint::new(101.7, 51.2).with_dpr(2.0),
            &backgrounds(),
            &StaticScene::default(),
            &mut clock,
        )
        .unwrap()
        .unwrap();
    assert_eq!((blob.width, blob.height), (202, 102));
    let cfg = facility.last_config().unwrap();
    assert_eq!((cfg.width, cfg.height), (202, 102));
}

#[test]
fn missing_images_do_not_abort_recording() {
    let facility = Arc::new(InMemoryFacility::permissive());
    let mut o = opts();
    o.duration_ms = 100.0;
    let rec = ClipRecorder::new(facility, cache(), o);
    let scene = StaticScene {
        stickers: vec![placed(1, "missing-sticker.png", 0.0, 0.0)],
        ..StaticScene::default()
    };
    let mut clock = FixedStepClock::new(60.0);
    let blob = rec
        .record(
            &FixedFootprint::new(16.0, 16.0),
            &["missing-bg.png".to_string()],
            &scene,
            &mut clock,
        )
        .unwrap()
        .unwrap();
    assert!(blob.frames >= 3);
}

#[test]
fn live_frame_wraps_background_index() {
    let cache = cache();
    let mut c = FrameCompositor::new();
    let target = FrameTarget::from_footprint(8.0, 8.0, 1.0);
    let mut o = opts();
    o.border_radius = 0.0;
    let bgs = backgrounds();
    let a = compose_live_frame(&mut c, &cache, target, &o, &bgs, 1, &[]).unwrap();
    let b = compose_live_frame(&mut c, &cache, target, &o, &bgs, 3, &[]).unwrap();
    assert_eq!(a, b);
    let px = a.pixel(4, 4).unwrap();
    assert!(px[2] > 200 && px[0] < 50, "{px:?}");
}

#[test]
fn opts_follow_config() {
    let cfg = BoothConfig::default();
    let o = RecorderOpts::from_config(&cfg).unwrap();
    assert_eq!(o.fps, Fps::per_second(30).unwrap());
    assert_eq!(o.duration_ms, 2000.0);
    assert_eq!(o.border_radius, 50.0);
}
