use crate::encode::facility::RecordingFacility;

/// Recording types in order of preference. The first one the facility supports is used.
pub const MIME_PREFERENCES: [&str; 5] = [
    "video/mp4;codecs=h264",
    "video/mp4;codecs=avc1.42E01E",
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

/// Output container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Container {
    Mp4,
    Webm,
}

impl Container {
    /// File extension used for uploads and object keys.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
        }
    }

    /// Bare MIME type, without codec parameters.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Webm => "video/webm",
        }
    }
}

/// Video codec requested through the `codecs=` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    Vp9,
    Vp8,
}

/// A parsed recording type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MimeTarget {
    pub container: Container,
    /// `None` means "any codec the container allows".
    pub codec: Option<VideoCodec>,
}

/// Parse `video/<container>[;codecs=<list>]`.
///
/// Audio codecs in the list are accepted and ignored; clips carry no audio. Returns `None` for
/// anything unrecognized, including a video codec the container cannot hold.
pub fn parse_mime(mime: &str) -> Option<MimeTarget> {
    let mut parts = mime.split(';');
    let container = match parts.next()?.trim().to_ascii_lowercase().as_str() {
        "video/mp4" => Container::Mp4,
        "video/webm" => Container::Webm,
        _ => return None,
    };

    let mut codec = None;
    for param in parts {
        let Some((k, v)) = param.split_once('=') else {
            return None;
        };
        if !k.trim().eq_ignore_ascii_case("codecs") {
            continue;
        }
        for c in v.trim().trim_matches('"').split(',') {
            let c = c.trim().to_ascii_lowercase();
            let parsed = if c == "h264" || c.starts_with("avc1") {
                Some(VideoCodec::H264)
            } else if c == "vp9" || c.starts_with("vp09") {
                Some(VideoCodec::Vp9)
            } else if c == "vp8" {
                Some(VideoCodec::Vp8)
            } else if c == "opus" || c == "vorbis" || c.starts_with("mp4a") {
                None
            } else {
                return None;
            };
            if let Some(p) = parsed {
                if codec.is_some_and(|prev| prev != p) {
                    return None;
                }
                codec = Some(p);
            }
        }
    }

    let allowed = match (container, codec) {
        (_, None) => true,
        (Container::Mp4, Some(c)) => c == VideoCodec::H264,
        (Container::Webm, Some(c)) => c != VideoCodec::H264,
    };
    allowed.then_some(MimeTarget { container, codec })
}

/// First entry of [`MIME_PREFERENCES`] the facility supports, if any.
pub fn negotiate_mime(facility: &dyn RecordingFacility) -> Option<&'static str> {
    MIME_PREFERENCES
        .iter()
        .copied()
        .find(|m| facility.is_type_supported(m))
}

/// `"mp4"` when the type names an MP4 container, `"webm"` otherwise.
pub fn extension_for_mime(mime: &str) -> &'static str {
    if mime.to_ascii_lowercase().contains("mp4") {
        Container::Mp4.extension()
    } else {
        Container::Webm.extension()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/mime.rs"]
mod tests;
