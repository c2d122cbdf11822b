//! Stickerbooth is the core of a photo-kiosk sticker screen.
//!
//! Users drag stickers from a tray onto a live photo canvas, move, resize or discard them, and
//! record a short clip of the decorated canvas that is uploaded and handed to a QR screen.
//!
//! - [`StickerBoard`] owns the [`EntityStore`] and runs the pointer gesture state machine,
//!   persisting every change through a [`PersistencePort`].
//! - [`FrameCompositor`] draws one frame: mirrored background, stickers, rounded clip.
//! - [`ClipRecorder`] paces frames against a [`FrameClock`] and feeds a [`RecordingFacility`]
//!   (the system `ffmpeg` via [`FfmpegFacility`], or [`InMemoryFacility`]).
//! - [`UploadFlow`] records, uploads through an [`UploadPort`] and navigates on success.
#![forbid(unsafe_code)]

mod foundation;

/// Bitmap decoding and the shared image cache.
pub mod assets;
/// Kiosk configuration.
pub mod config;
/// Video encoding facilities.
pub mod encode;
/// Clip recording.
pub mod record;
/// Frame composition.
pub mod render;
/// Sticker entities, gestures and persistence.
pub mod stickers;
/// Upload and navigation.
pub mod upload;

pub use crate::foundation::core::{Affine, Fps, Point, Rect, Rgba8, Size, Vec2};
pub use crate::foundation::error::{BoothError, BoothResult};

pub use crate::assets::cache::{FsImageLoader, ImageCache, ImageLoader, PreloadReport};
pub use crate::assets::decode::{Bitmap, decode_image};
pub use crate::config::{BoothConfig, CanvasBounds, TraySlot, UploadConfig};
pub use crate::encode::facility::{
    ClipEncoder, EncodedOutput, EncoderConfig, InMemoryFacility, RecordingFacility,
};
pub use crate::encode::ffmpeg::{FfmpegFacility, is_ffmpeg_on_path};
pub use crate::encode::mime::{MIME_PREFERENCES, negotiate_mime};
pub use crate::record::clock::{CancelToken, FixedStepClock, FrameClock, RealtimeClock};
pub use crate::record::recorder::{ClipBlob, ClipRecorder, RecorderOpts, compose_live_frame};
pub use crate::record::scene::{
    BoardScene, FixedFootprint, HostFootprint, LiveScene, SharedBoard, Slideshow,
    SlideshowClock,
};
pub use crate::render::compositor::{FrameCompositor, FrameInputs, PlacedSticker};
pub use crate::render::frame::{FrameRGBA, FrameTarget};
pub use crate::stickers::entity::{DragGhost, StickerEntity, TrayHome, VideoPos};
pub use crate::stickers::gesture::{GestureOutcome, GestureState, GestureTuning, StickerBoard};
pub use crate::stickers::persist::{
    FilePort, MemoryPort, PersistencePort, STICKERS_STORAGE_KEY, clear_sticker_state,
};
pub use crate::stickers::store::{EntityStore, StoreSnapshot};
pub use crate::upload::http::HttpUpload;
pub use crate::upload::object_store::{DirObjectStore, ObjectStore, ObjectStoreUpload};
pub use crate::upload::port::{LogNavigator, NavigationPort, UploadFlow, UploadPort};
