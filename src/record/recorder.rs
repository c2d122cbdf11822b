use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::{
    assets::cache::ImageCache,
    config::BoothConfig,
    encode::{
        facility::{ClipEncoder, EncoderConfig, RecordingFacility},
        mime::negotiate_mime,
    },
    foundation::{
        core::{Fps, Rgba8},
        error::BoothResult,
    },
    record::{
        clock::FrameClock,
        scene::{HostFootprint, LiveScene},
    },
    render::{
        compositor::{FrameCompositor, FrameInputs, PlacedSticker, surface_dims},
        frame::{FrameRGBA, FrameTarget},
    },
    stickers::entity::StickerEntity,
};

/// Slack subtracted from the frame interval when deciding whether a tick draws.
pub const FRAME_SLACK_MS: f64 = 1.0;

/// Mime reported when neither the encoder nor negotiation produced one.
pub const FALLBACK_MIME: &str = "video/webm";

/// Recording parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RecorderOpts {
    pub fps: Fps,
    /// Total capture length.
    pub duration_ms: f64,
    /// Corner radius of the clip in logical pixels.
    pub border_radius: f64,
    /// Fill drawn when the current background is unavailable.
    pub fallback: Option<Rgba8>,
}

impl RecorderOpts {
    pub fn from_config(cfg: &BoothConfig) -> BoothResult<Self> {
        Ok(Self {
            fps: cfg.fps()?,
            duration_ms: cfg.duration_ms,
            border_radius: cfg.border_radius_px,
            fallback: cfg.fallback_rgba,
        })
    }
}

/// A finished recording.
#[derive(Clone, Debug, PartialEq)]
pub struct ClipBlob {
    pub mime: String,
    pub bytes: Vec<u8>,
    /// Frames handed to the encoder.
    pub frames: u64,
    /// `frames * frame interval`.
    pub duration_ms: f64,
    pub width: u32,
    pub height: u32,
}

/// Records short clips of the live scene through a [`RecordingFacility`].
///
/// At most one recording runs at a time; a call made while another is in flight returns
/// `Ok(None)` immediately.
pub struct ClipRecorder {
    facility: Arc<dyn RecordingFacility>,
    cache: Arc<ImageCache>,
    opts: RecorderOpts,
    is_recording: AtomicBool,
}

impl std::fmt::Debug for ClipRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipRecorder")
            .field("opts", &self.opts)
            .field("is_recording", &self.is_recording())
            .finish()
    }
}

struct RecordingLatch<'a>(&'a AtomicBool);

impl Drop for RecordingLatch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ClipRecorder {
    pub fn new(
        facility: Arc<dyn RecordingFacility>,
        cache: Arc<ImageCache>,
        opts: RecorderOpts,
    ) -> Self {
        Self {
            facility,
            cache,
            opts,
            is_recording: AtomicBool::new(false),
        }
    }

    pub fn opts(&self) -> RecorderOpts {
        self.opts
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    /// Record one clip.
    ///
    /// Returns `Ok(None)` when the host is not mounted, when another recording is in flight, or
    /// when `clock` is cancelled before the duration elapses. Capability failures (no drawing
    /// surface, encoder refusing to start) are returned as errors.
    #[tracing::instrument(skip_all, fields(backgrounds = backgrounds.len()))]
    pub fn record(
        &self,
        host: &dyn HostFootprint,
        backgrounds: &[String],
        scene: &dyn LiveScene,
        clock: &mut dyn FrameClock,
    ) -> BoothResult<Option<ClipBlob>> {
        if self
            .is_recording
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("recording already in progress; request ignored");
            return Ok(None);
        }
        let _latch = RecordingLatch(&self.is_recording);

        let Some(bbox) = host.bounding_box() else {
            tracing::debug!("host not mounted; nothing recorded");
            return Ok(None);
        };
        let target =
            FrameTarget::from_footprint(bbox.width, bbox.height, host.device_pixel_ratio());
        let (pw, ph) = surface_dims(target)?;

        let placed = scene.current_placed_stickers();
        let report = self.cache.preload_all(
            backgrounds
                .iter()
                .map(String::as_str)
                .chain(placed.iter().map(|s| s.src.as_str())),
        );
        if !report.failed.is_empty() {
            tracing::warn!(failed = ?report.failed, "some images failed to preload");
        }

        let negotiated = negotiate_mime(self.facility.as_ref());
        if negotiated.is_none() {
            tracing::warn!("no preferred recording type supported; using facility default");
        }
        let mut encoder = self.facility.start(EncoderConfig {
            width: u32::from(pw),
            height: u32::from(ph),
            fps: self.opts.fps,
            mime: negotiated.map(str::to_string),
        })?;

        let mut compositor = FrameCompositor::new();
        let frames = match self.run_loop(
            &mut compositor,
            encoder.as_mut(),
            target,
            backgrounds,
            scene,
            clock,
        ) {
            Ok(Some(frames)) => frames,
            Ok(None) => {
                encoder.abort();
                tracing::info!("recording cancelled");
                return Ok(None);
            }
            Err(e) => {
                encoder.abort();
                return Err(e);
            }
        };

        let output = encoder.finish()?;
        let mime = if !output.mime.is_empty() {
            output.mime.clone()
        } else {
            negotiated.unwrap_or(FALLBACK_MIME).to_string()
        };
        let bytes = output.into_bytes();
        let duration_ms = self.opts.fps.frames_to_ms(frames);
        tracing::info!(frames, duration_ms, bytes = bytes.len(), %mime, "clip recorded");

        Ok(Some(ClipBlob {
            mime,
            bytes,
            frames,
            duration_ms,
            width: u32::from(pw),
            height: u32::from(ph),
        }))
    }

    /// Frame-paced loop. Returns the number of frames pushed, or `None` if the clock stopped
    /// before the duration elapsed.
    ///
    /// The encoder runs at a constant rate, so the frame count follows elapsed clock time: a
    /// draw that lands after several frame slots pushes the composed frame once per slot.
    fn run_loop(
        &self,
        compositor: &mut FrameCompositor,
        encoder: &mut dyn ClipEncoder,
        target: FrameTarget,
        backgrounds: &[String],
        scene: &dyn LiveScene,
        clock: &mut dyn FrameClock,
    ) -> BoothResult<Option<u64>> {
        let fps = self.opts.fps;
        let interval = fps.frame_interval_ms();
        let total = total_frames(self.opts.duration_ms, interval);
        let start = clock.now_ms();
        let mut last = start;
        let mut frames = 0u64;

        loop {
            let Some(ts) = clock.next_tick() else {
                return Ok(None);
            };
            let elapsed = ts - start;
            let done = elapsed >= self.opts.duration_ms;
            if ts - last < interval - FRAME_SLACK_MS && !done {
                continue;
            }

            let due = if done {
                total
            } else {
                frames_due(elapsed, interval).min(total)
            };
            if due > frames {
                last = ts;
                let frame = compose_live_frame(
                    compositor,
                    &self.cache,
                    target,
                    &self.opts,
                    backgrounds,
                    scene.current_background_index(),
                    &scene.current_placed_stickers(),
                )?;
                while frames < due {
                    encoder.push_frame(&frame, fps.frames_to_ms(frames))?;
                    frames += 1;
                }
            }

            if done {
                return Ok(Some(frames));
            }
        }
    }
}

/// Frame slots in a clip of `duration_ms`; at least one.
fn total_frames(duration_ms: f64, interval_ms: f64) -> u64 {
    ((duration_ms / interval_ms) - 1e-6).ceil().max(1.0) as u64
}

/// Frame slots fully elapsed after `elapsed_ms`.
fn frames_due(elapsed_ms: f64, interval_ms: f64) -> u64 {
    ((elapsed_ms / interval_ms) + 1e-6).floor().max(0.0) as u64
}

/// Compose one frame of the live scene, resolving bitmaps through `cache`.
///
/// Images that fail to load are skipped for this frame.
pub fn compose_live_frame(
    compositor: &mut FrameCompositor,
    cache: &ImageCache,
    target: FrameTarget,
    opts: &RecorderOpts,
    backgrounds: &[String],
    background_index: usize,
    placed: &[StickerEntity],
) -> BoothResult<FrameRGBA> {
    let background = if backgrounds.is_empty() {
        None
    } else {
        cache.load_or_skip(&backgrounds[background_index % backgrounds.len()])
    };
    let stickers: Vec<PlacedSticker> = placed
        .iter()
        .filter(|e| e.in_video)
        .map(|e| PlacedSticker {
            id: e.id,
            pos: e.video_pos,
            box_size: e.box_size(),
            bitmap: cache.load_or_skip(&e.src),
        })
        .collect();

    compositor.compose(&FrameInputs {
        target,
        border_radius: opts.border_radius,
        background: background.as_deref(),
        stickers: &stickers,
        fallback: opts.fallback,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/record/recorder.rs"]
mod tests;
