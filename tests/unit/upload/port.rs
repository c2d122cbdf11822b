use std::sync::atomic::AtomicUsize;

use super::*;
use crate::{
    assets::{
        cache::{ImageCache, ImageLoader},
        decode::Bitmap,
    },
    encode::facility::InMemoryFacility,
    foundation::{core::Fps, error::BoothError},
    record::{clock::FixedStepClock, recorder::RecorderOpts, scene::FixedFootprint},
    stickers::entity::StickerEntity,
};

struct White;

impl ImageLoader for White {
    fn load(&self, _src: &str) -> BoothResult<Bitmap> {
        Bitmap::from_rgba8(1, 1, vec![255; 4])
    }
}

struct Empty;

impl LiveScene for Empty {
    fn current_background_index(&self) -> usize {
        0
    }

    fn current_placed_stickers(&self) -> Vec<StickerEntity> {
        Vec::new()
    }
}

struct FakeUpload {
    calls: AtomicUsize,
    fail: bool,
}

impl UploadPort for FakeUpload {
    fn upload(&self, clip: &ClipBlob) -> BoothResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BoothError::transport("Upload failed (503): busy"));
        }
        Ok(format!("https://cdn.example/{}", upload_filename(&clip.mime, 1)))
    }
}

fn recorder() -> Arc<ClipRecorder> {
    Arc::new(ClipRecorder::new(
        Arc::new(InMemoryFacility::permissive()),
        Arc::new(ImageCache::new(Arc::new(White))),
        RecorderOpts {
            fps: Fps::per_second(30).unwrap(),
            duration_ms: 100.0,
            border_radius: 0.0,
            fallback: None,
        },
    ))
}

fn flow(fail: bool) -> (UploadFlow, Arc<FakeUpload>, Arc<LogNavigator>) {
    let up = Arc::new(FakeUpload {
        calls: AtomicUsize::new(0),
        fail,
    });
    let nav = Arc::new(LogNavigator::new());
    (
        UploadFlow::new(recorder(), up.clone(), nav.clone(), "/qr"),
        up,
        nav,
    )
}

#[test]
fn success_navigates_with_url() {
    let (flow, up, nav) = flow(false);
    let mut clock = FixedStepClock::new(60.0);
    let url = flow
        .record_upload_and_go(
            &FixedFootprint::new(8.0, 8.0),
            &["bg.png".to_string()],
            &Empty,
            &mut clock,
        )
        .unwrap()
        .unwrap();
    assert_eq!(url, "https://cdn.example/stickers-1.mp4");
    assert_eq!(up.calls.load(Ordering::SeqCst), 1);
    assert_eq!(nav.visits(), vec![("/qr".to_string(), url)]);
    assert!(!flow.is_working());
}

#[test]
fn failure_does_not_navigate() {
    let (flow, up, nav) = flow(true);
    let mut clock = FixedStepClock::new(60.0);
    let err = flow
        .record_upload_and_go(&FixedFootprint::new(8.0, 8.0), &[], &Empty, &mut clock)
        .unwrap_err();
    assert!(err.to_string().contains("Upload failed (503)"));
    assert_eq!(up.calls.load(Ordering::SeqCst), 1);
    assert!(nav.visits().is_empty());
    assert!(!flow.is_working());
}

#[test]
fn no_clip_means_no_upload() {
    let (flow, up, nav) = flow(false);
    let mut clock = FixedStepClock::new(60.0);
    let out = flow
        .record_upload_and_go(&FixedFootprint::unmounted(), &[], &Empty, &mut clock)
        .unwrap();
    assert!(out.is_none());
    assert_eq!(up.calls.load(Ordering::SeqCst), 0);
    assert!(nav.visits().is_empty());
}

/// Scene that re-enters the flow while the first call is working.
struct Reentrant<'a> {
    flow: &'a UploadFlow,
    nested: std::sync::Mutex<Vec<bool>>,
}

impl LiveScene for Reentrant<'_> {
    fn current_background_index(&self) -> usize {
        0
    }

    fn current_placed_stickers(&self) -> Vec<StickerEntity> {
        let mut clock = FixedStepClock::new(60.0);
        let r = self.flow.record_upload_and_go(
            &FixedFootprint::new(8.0, 8.0),
            &[],
            &Empty,
            &mut clock,
        );
        self.nested.lock().unwrap().push(matches!(r, Ok(None)));
        Vec::new()
    }
}

#[test]
fn concurrent_request_is_ignored() {
    let (flow, up, nav) = flow(false);
    let scene = Reentrant {
        flow: &flow,
        nested: std::sync::Mutex::new(Vec::new()),
    };
    let mut clock = FixedStepClock::new(60.0);
    flow.record_upload_and_go(&FixedFootprint::new(8.0, 8.0), &[], &scene, &mut clock)
        .unwrap()
        .unwrap();
    assert!(scene.nested.lock().unwrap().iter().all(|&b| b));
    assert_eq!(up.calls.load(Ordering::SeqCst), 1);
    assert_eq!(nav.visits().len(), 1);
}

#[test]
fn filenames_follow_mime() {
    assert_eq!(upload_filename("video/mp4;codecs=avc1.42E01E", 9), "stickers-9.mp4");
    assert_eq!(upload_filename("video/webm", 9), "stickers-9.webm");
    assert_eq!(upload_filename("", 9), "stickers-9.webm");
}
