use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    encode::mime::extension_for_mime,
    foundation::error::BoothResult,
    record::{
        clock::FrameClock,
        recorder::{ClipBlob, ClipRecorder},
        scene::{HostFootprint, LiveScene},
    },
};

/// Destination for finished clips. Returns a URL the clip can be fetched from.
pub trait UploadPort: Send + Sync {
    fn upload(&self, clip: &ClipBlob) -> BoothResult<String>;
}

/// Screen navigation, handed the uploaded clip's URL.
pub trait NavigationPort: Send + Sync {
    fn navigate(&self, route: &str, video_url: &str);
}

/// Navigation port that logs and remembers every request.
#[derive(Debug, Default)]
pub struct LogNavigator {
    visits: Mutex<Vec<(String, String)>>,
}

impl LogNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(route, video_url)` pairs in call order.
    pub fn visits(&self) -> Vec<(String, String)> {
        self.visits.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl NavigationPort for LogNavigator {
    fn navigate(&self, route: &str, video_url: &str) {
        tracing::info!(route, video_url, "navigate");
        if let Ok(mut v) = self.visits.lock() {
            v.push((route.to_string(), video_url.to_string()));
        }
    }
}

/// Milliseconds since the Unix epoch.
pub fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Upload file name: `stickers-<ms>.<mp4|webm>`.
pub fn upload_filename(mime: &str, unix_ms: u64) -> String {
    format!("stickers-{unix_ms}.{}", extension_for_mime(mime))
}

/// Records a clip, uploads it and navigates to the result route.
pub struct UploadFlow {
    recorder: Arc<ClipRecorder>,
    upload: Arc<dyn UploadPort>,
    navigator: Arc<dyn NavigationPort>,
    route: String,
    working: AtomicBool,
}

impl std::fmt::Debug for UploadFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadFlow")
            .field("route", &self.route)
            .field("working", &self.is_working())
            .finish()
    }
}

struct WorkLatch<'a>(&'a AtomicBool);

impl Drop for WorkLatch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl UploadFlow {
    pub fn new(
        recorder: Arc<ClipRecorder>,
        upload: Arc<dyn UploadPort>,
        navigator: Arc<dyn NavigationPort>,
        route: impl Into<String>,
    ) -> Self {
        Self {
            recorder,
            upload,
            navigator,
            route: route.into(),
            working: AtomicBool::new(false),
        }
    }

    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst)
    }

    /// Record, upload, then navigate with the returned URL.
    ///
    /// A call made while recording or while a previous call is still working does nothing and
    /// returns `Ok(None)`, as does a recording that produced no clip. Upload failures are
    /// returned and skip navigation.
    #[tracing::instrument(skip_all, fields(route = %self.route))]
    pub fn record_upload_and_go(
        &self,
        host: &dyn HostFootprint,
        backgrounds: &[String],
        scene: &dyn LiveScene,
        clock: &mut dyn FrameClock,
    ) -> BoothResult<Option<String>> {
        if self.recorder.is_recording()
            || self
                .working
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            tracing::debug!("already working; request ignored");
            return Ok(None);
        }
        let _latch = WorkLatch(&self.working);

        let Some(clip) = self.recorder.record(host, backgrounds, scene, clock)? else {
            return Ok(None);
        };
        let url = self.upload.upload(&clip)?;
        tracing::info!(%url, bytes = clip.bytes.len(), "clip uploaded");
        self.navigator.navigate(&self.route, &url);
        Ok(Some(url))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/upload/port.rs"]
mod tests;
