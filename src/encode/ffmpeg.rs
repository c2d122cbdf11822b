use std::io::{Read, Write as _};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::OnceLock;
use std::thread::JoinHandle;

use crate::{
    encode::{
        facility::{ClipEncoder, EncodedOutput, EncoderConfig, RecordingFacility},
        mime::{Container, MimeTarget, VideoCodec, parse_mime},
    },
    foundation::{
        core::Fps,
        error::{BoothError, BoothResult},
        math::mul_div255_u16,
    },
    render::frame::FrameRGBA,
};

/// Size of the chunks read back from `ffmpeg`'s stdout.
pub const OUTPUT_CHUNK_BYTES: usize = 64 * 1024;

/// Facility that spawns the system `ffmpeg` for each clip.
///
/// Frames are streamed to stdin as raw RGBA with alpha flattened over `bg_rgba`; the container
/// is read back from stdout. MP4 output is fragmented so it can be written to a pipe.
#[derive(Debug)]
pub struct FfmpegFacility {
    program: String,
    /// Background color used to flatten alpha (RGBA8, straight alpha).
    pub bg_rgba: [u8; 4],
    encoders: OnceLock<Vec<String>>,
}

impl Default for FfmpegFacility {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegFacility {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    /// Use a specific `ffmpeg` executable.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            bg_rgba: [0, 0, 0, 255],
            encoders: OnceLock::new(),
        }
    }

    /// Encoder names reported by `ffmpeg -encoders`, queried once.
    pub fn available_encoders(&self) -> &[String] {
        self.encoders.get_or_init(|| {
            let out = Command::new(&self.program)
                .args(["-hide_banner", "-encoders"])
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output();
            match out {
                Ok(o) if o.status.success() => {
                    parse_encoder_list(&String::from_utf8_lossy(&o.stdout))
                }
                Ok(o) => {
                    tracing::warn!(status = %o.status, "ffmpeg -encoders failed");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(error = %e, program = %self.program, "ffmpeg not runnable");
                    Vec::new()
                }
            }
        })
    }

    fn has_encoder(&self, name: &str) -> bool {
        self.available_encoders().iter().any(|e| e == name)
    }

    fn resolve(&self, target: MimeTarget) -> Option<VideoCodec> {
        let candidates = match (target.container, target.codec) {
            (_, Some(c)) => vec![c],
            (Container::Mp4, None) => vec![VideoCodec::H264],
            (Container::Webm, None) => vec![VideoCodec::Vp9, VideoCodec::Vp8],
        };
        candidates
            .into_iter()
            .find(|c| self.has_encoder(encoder_name(*c)))
    }
}

impl RecordingFacility for FfmpegFacility {
    fn is_type_supported(&self, mime: &str) -> bool {
        parse_mime(mime).and_then(|t| self.resolve(t)).is_some()
    }

    fn default_mime(&self) -> String {
        Container::Mp4.mime().to_string()
    }

    fn start(&self, cfg: EncoderConfig) -> BoothResult<Box<dyn ClipEncoder>> {
        let mime = cfg.mime.clone().unwrap_or_else(|| self.default_mime());
        let target = parse_mime(&mime).ok_or_else(|| {
            BoothError::validation(format!("unrecognized recording type '{mime}'"))
        })?;
        let codec = self.resolve(target).ok_or_else(|| {
            BoothError::capability(format!("ffmpeg cannot produce '{mime}'"))
        })?;
        Ok(Box::new(FfmpegEncoder::spawn(
            &self.program,
            &cfg,
            target.container,
            codec,
            mime,
            self.bg_rgba,
        )?))
    }
}

/// `ffmpeg` encoder name for a codec.
pub fn encoder_name(codec: VideoCodec) -> &'static str {
    match codec {
        VideoCodec::H264 => "libx264",
        VideoCodec::Vp9 => "libvpx-vp9",
        VideoCodec::Vp8 => "libvpx",
    }
}

/// Extract encoder names from `ffmpeg -encoders` output.
///
/// Entry lines look like ` V....D libx264   libx264 H.264 ...`; the header and legend are
/// skipped.
pub fn parse_encoder_list(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_table = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("------") {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }
        let mut it = trimmed.split_whitespace();
        let (Some(flags), Some(name)) = (it.next(), it.next()) else {
            continue;
        };
        if flags.len() == 6 && flags.starts_with(['V', 'A', 'S']) {
            out.push(name.to_string());
        }
    }
    out
}

struct FfmpegEncoder {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_drain: Option<JoinHandle<std::io::Result<Vec<Vec<u8>>>>>,
    stderr_drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,

    width: u32,
    height: u32,
    out_width: u32,
    out_height: u32,
    bg_rgba: [u8; 4],
    scratch: Vec<u8>,
    last_ts: Option<f64>,
    mime: String,
}

impl FfmpegEncoder {
    fn spawn(
        program: &str,
        cfg: &EncoderConfig,
        container: Container,
        codec: VideoCodec,
        mime: String,
        bg_rgba: [u8; 4],
    ) -> BoothResult<Self> {
        if cfg.fps.num == 0 || cfg.fps.den == 0 {
            return Err(BoothError::validation("fps must be non-zero"));
        }
        // yuv420p needs even dimensions; odd frames lose their last column/row.
        let out_width = cfg.width & !1;
        let out_height = cfg.height & !1;
        if out_width == 0 || out_height == 0 {
            return Err(BoothError::validation(format!(
                "frame {}x{} is too small to encode",
                cfg.width, cfg.height
            )));
        }

        let mut cmd = Command::new(program);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd.args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{out_width}x{out_height}"),
        ]);
        push_input_fps(&mut cmd, cfg.fps);
        cmd.args(["-i", "pipe:0", "-an", "-c:v", encoder_name(codec)]);
        cmd.args(["-pix_fmt", "yuv420p"]);
        match container {
            Container::Mp4 => {
                cmd.args([
                    "-movflags",
                    "frag_keyframe+empty_moov+default_base_moof",
                    "-f",
                    "mp4",
                ]);
            }
            Container::Webm => {
                cmd.args(["-deadline", "realtime", "-f", "webm"]);
            }
        }
        cmd.arg("pipe:1");

        let mut child = cmd.spawn().map_err(|e| {
            BoothError::capability(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BoothError::capability("failed to open ffmpeg stdin (unexpected)"))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| BoothError::capability("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| BoothError::capability("failed to open ffmpeg stderr (unexpected)"))?;

        let stdout_drain = std::thread::spawn(move || {
            let mut chunks = Vec::new();
            let mut buf = vec![0u8; OUTPUT_CHUNK_BYTES];
            loop {
                let n = stdout.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                chunks.push(buf[..n].to_vec());
            }
            Ok(chunks)
        });
        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok(stderr_bytes)
        });

        tracing::debug!(
            width = out_width,
            height = out_height,
            encoder = encoder_name(codec),
            %mime,
            "ffmpeg encoder started"
        );

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            stdout_drain: Some(stdout_drain),
            stderr_drain: Some(stderr_drain),
            width: cfg.width,
            height: cfg.height,
            out_width,
            out_height,
            bg_rgba,
            scratch: vec![0u8; (out_width as usize) * (out_height as usize) * 4],
            last_ts: None,
            mime,
        })
    }

    fn join_stderr(&mut self) -> String {
        match self.stderr_drain.take().map(JoinHandle::join) {
            Some(Ok(Ok(bytes))) => String::from_utf8_lossy(&bytes).trim().to_string(),
            _ => String::new(),
        }
    }
}

impl ClipEncoder for FfmpegEncoder {
    fn push_frame(&mut self, frame: &FrameRGBA, timestamp_ms: f64) -> BoothResult<()> {
        if let Some(last) = self.last_ts
            && timestamp_ms < last
        {
            return Err(BoothError::validation(
                "ffmpeg encoder received out-of-order frame timestamp",
            ));
        }
        self.last_ts = Some(timestamp_ms);

        if frame.width != self.width || frame.height != self.height {
            return Err(BoothError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }

        flatten_premul_over_bg_cropped(
            &mut self.scratch,
            (self.out_width, self.out_height),
            frame,
            self.bg_rgba,
        )?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(BoothError::transport("ffmpeg encoder is already finalized"));
        };
        stdin.write_all(&self.scratch).map_err(|e| {
            BoothError::transport(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> BoothResult<EncodedOutput> {
        drop(self.stdin.take());
        let mut child = self
            .child
            .take()
            .ok_or_else(|| BoothError::transport("ffmpeg encoder not started"))?;

        let status = child.wait().map_err(|e| {
            BoothError::transport(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;
        let chunks = match self.stdout_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| BoothError::transport("ffmpeg stdout drain thread panicked"))?
                .map_err(|e| BoothError::transport(format!("ffmpeg stdout read failed: {e}")))?,
            None => Vec::new(),
        };
        let stderr = self.join_stderr();

        if !status.success() {
            return Err(BoothError::transport(format!(
                "ffmpeg exited with status {status}: {stderr}"
            )));
        }

        Ok(EncodedOutput {
            chunks,
            mime: std::mem::take(&mut self.mime),
        })
    }

    fn abort(mut self: Box<Self>) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(h) = self.stdout_drain.take() {
            let _ = h.join();
        }
        let _ = self.join_stderr();
        tracing::debug!("ffmpeg encoder aborted");
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn push_input_fps(cmd: &mut Command, fps: Fps) {
    // For rawvideo input, `-r` before `-i` sets the input framerate.
    cmd.args(["-r", &format!("{}/{}", fps.num, fps.den)]);
}

/// Flatten premultiplied RGBA8 over `bg_rgba` into opaque RGBA8, keeping the top-left
/// `out_w`x`out_h` region.
pub fn flatten_premul_over_bg_cropped(
    dst: &mut [u8],
    (out_w, out_h): (u32, u32),
    frame: &FrameRGBA,
    bg_rgba: [u8; 4],
) -> BoothResult<()> {
    let (out_w, out_h) = (out_w as usize, out_h as usize);
    let src_w = frame.width as usize;
    if out_w > src_w
        || out_h > frame.height as usize
        || dst.len() != out_w * out_h * 4
        || frame.data.len() != src_w * frame.height as usize * 4
    {
        return Err(BoothError::validation(
            "flatten expects a destination no larger than the source frame",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (y, drow) in dst.chunks_exact_mut(out_w * 4).enumerate() {
        let srow = &frame.data[y * src_w * 4..(y * src_w + out_w) * 4];
        for (d, s) in drow.chunks_exact_mut(4).zip(srow.chunks_exact(4)) {
            let a = u16::from(s[3]);
            if a == 255 {
                d.copy_from_slice(s);
                continue;
            }
            let inv = 255u16 - a;
            d[0] = (u16::from(s[0]) + mul_div255_u16(bg_r, inv)).min(255) as u8;
            d[1] = (u16::from(s[1]) + mul_div255_u16(bg_g, inv)).min(255) as u8;
            d[2] = (u16::from(s[2]) + mul_div255_u16(bg_b, inv)).min(255) as u8;
            d[3] = 255;
        }
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
