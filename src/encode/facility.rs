use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    encode::mime::parse_mime,
    foundation::{
        core::Fps,
        error::{BoothError, BoothResult},
    },
    render::frame::FrameRGBA,
};

/// Parameters for starting a [`ClipEncoder`].
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Nominal capture rate.
    pub fps: Fps,
    /// Requested recording type; `None` lets the facility pick its default.
    pub mime: Option<String>,
}

/// Encoded container bytes, in the order the encoder emitted them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedOutput {
    pub chunks: Vec<Vec<u8>>,
    /// Type of the produced container.
    pub mime: String,
}

impl EncodedOutput {
    /// Total byte length over all chunks.
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Concatenate the chunks into one buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for c in self.chunks {
            out.extend_from_slice(&c);
        }
        out
    }
}

/// Something that can encode a stream of frames into a video container.
pub trait RecordingFacility: Send + Sync {
    /// Whether `mime` can be produced.
    fn is_type_supported(&self, mime: &str) -> bool;

    /// Type produced when [`EncoderConfig::mime`] is `None`.
    fn default_mime(&self) -> String;

    /// Start a new encoder.
    fn start(&self, cfg: EncoderConfig) -> BoothResult<Box<dyn ClipEncoder>>;
}

/// One running encode.
///
/// Ordering contract: `push_frame` is called with non-decreasing timestamps.
pub trait ClipEncoder: Send {
    /// Consume one premultiplied RGBA frame captured at `timestamp_ms`.
    fn push_frame(&mut self, frame: &FrameRGBA, timestamp_ms: f64) -> BoothResult<()>;

    /// Flush and return everything encoded.
    fn finish(self: Box<Self>) -> BoothResult<EncodedOutput>;

    /// Tear down without producing output.
    fn abort(self: Box<Self>);
}

/// Deterministic facility for tests and dry runs.
///
/// Each pushed frame becomes one 16-byte chunk: sequence number, width, height and a byte
/// checksum, all little-endian `u32`.
#[derive(Debug)]
pub struct InMemoryFacility {
    supported: Vec<String>,
    default_mime: String,
    fail_start: bool,
    started: AtomicUsize,
    aborted: Arc<AtomicUsize>,
    last_config: Mutex<Option<EncoderConfig>>,
}

impl InMemoryFacility {
    /// Facility that supports exactly `supported` (compared case-insensitively).
    pub fn new<I, S>(supported: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported: supported.into_iter().map(Into::into).collect(),
            default_mime: "video/webm".to_string(),
            fail_start: false,
            started: AtomicUsize::new(0),
            aborted: Arc::new(AtomicUsize::new(0)),
            last_config: Mutex::new(None),
        }
    }

    /// Facility that claims support for every well-formed recording type.
    pub fn permissive() -> Self {
        Self::new(["*"])
    }

    pub fn with_default_mime(mut self, mime: impl Into<String>) -> Self {
        self.default_mime = mime.into();
        self
    }

    /// Make every [`RecordingFacility::start`] call fail.
    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Number of encoders started so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of encoders aborted so far.
    pub fn aborted(&self) -> usize {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Config passed to the most recent `start`.
    pub fn last_config(&self) -> Option<EncoderConfig> {
        self.last_config.lock().ok().and_then(|g| g.clone())
    }
}

impl RecordingFacility for InMemoryFacility {
    fn is_type_supported(&self, mime: &str) -> bool {
        if parse_mime(mime).is_none() {
            return false;
        }
        self.supported
            .iter()
            .any(|s| s == "*" || s.eq_ignore_ascii_case(mime))
    }

    fn default_mime(&self) -> String {
        self.default_mime.clone()
    }

    fn start(&self, cfg: EncoderConfig) -> BoothResult<Box<dyn ClipEncoder>> {
        if let Ok(mut g) = self.last_config.lock() {
            *g = Some(cfg.clone());
        }
        if self.fail_start {
            return Err(BoothError::capability("in-memory facility refused to start"));
        }
        if cfg.width == 0 || cfg.height == 0 {
            return Err(BoothError::validation(
                "encoder width/height must be non-zero",
            ));
        }
        self.started.fetch_add(1, Ordering::SeqCst);
        let mime = cfg.mime.clone().unwrap_or_else(|| self.default_mime());
        Ok(Box::new(InMemoryEncoder {
            cfg,
            mime,
            chunks: Vec::new(),
            last_ts: None,
            aborted: Arc::clone(&self.aborted),
        }))
    }
}

struct InMemoryEncoder {
    cfg: EncoderConfig,
    mime: String,
    chunks: Vec<Vec<u8>>,
    last_ts: Option<f64>,
    aborted: Arc<AtomicUsize>,
}

impl ClipEncoder for InMemoryEncoder {
    fn push_frame(&mut self, frame: &FrameRGBA, timestamp_ms: f64) -> BoothResult<()> {
        if let Some(last) = self.last_ts
            && timestamp_ms < last
        {
            return Err(BoothError::validation(
                "encoder received out-of-order frame timestamp",
            ));
        }
        if frame.width != self.cfg.width || frame.height != self.cfg.height {
            return Err(BoothError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.cfg.width, self.cfg.height
            )));
        }
        self.last_ts = Some(timestamp_ms);

        let seq = self.chunks.len() as u32;
        let checksum = frame
            .data
            .iter()
            .fold(0u32, |acc, &b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        let mut chunk = Vec::with_capacity(16);
        for v in [seq, frame.width, frame.height, checksum] {
            chunk.extend_from_slice(&v.to_le_bytes());
        }
        self.chunks.push(chunk);
        Ok(())
    }

    fn finish(self: Box<Self>) -> BoothResult<EncodedOutput> {
        Ok(EncodedOutput {
            chunks: self.chunks,
            mime: self.mime,
        })
    }

    fn abort(self: Box<Self>) {
        self.aborted.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/facility.rs"]
mod tests;
