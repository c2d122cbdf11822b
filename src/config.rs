//! Kiosk configuration: tray layout, recording parameters, storage and upload endpoints.
//!
//! Configs are JSON documents. Every field is optional and defaults to the kiosk's stock values.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::core::{Fps, Rect, Rgba8};
use crate::foundation::error::{BoothError, BoothResult};
use crate::stickers::gesture::GestureTuning;
use crate::stickers::persist::STICKERS_STORAGE_KEY;

/// One tray slot: the template's bitmap and its resting box in the tray.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TraySlot {
    /// Bitmap resource reference.
    pub src: String,
    /// Left offset inside the tray.
    #[serde(default)]
    pub left: f64,
    /// Top offset inside the tray.
    #[serde(default)]
    pub top: f64,
    /// Per-slot base size; falls back to [`BoothConfig::sticker_size`].
    #[serde(default)]
    pub size: Option<f64>,
}

impl TraySlot {
    fn stock(n: usize, left: f64, top: f64, size: f64) -> Self {
        Self {
            src: format!("stickers/sticker{n}.png"),
            left,
            top,
            size: Some(size),
        }
    }
}

/// Upload endpoint settings for the multipart HTTP binding.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Full URL of the upload endpoint.
    pub endpoint: String,
    /// Multipart field carrying the clip.
    pub field_name: String,
    /// Value of the `X-Client-Source` header.
    pub client_source: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4000/upload".to_string(),
            field_name: "video".to_string(),
            client_source: "stickers-recorder".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Screen-space bounds of the video canvas.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CanvasBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CanvasBounds {
    pub fn to_rect(self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.width,
            self.top + self.height,
        )
    }
}

/// Top-level kiosk configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BoothConfig {
    /// Tray layout, one template per slot.
    pub tray: Vec<TraySlot>,
    /// Default sticker base size in pixels.
    pub sticker_size: f64,
    /// Recording frame rate.
    pub fps: u32,
    /// Recording length in milliseconds.
    pub duration_ms: f64,
    /// Corner radius of the recorded clip.
    pub border_radius_px: f64,
    /// Background slideshow period.
    pub slide_interval_ms: f64,
    /// Pointer pixels (`dx + dy`) per unit of resize scale.
    pub resize_sensitivity: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    /// Fill drawn when the current background photo is unavailable.
    pub fallback_rgba: Option<Rgba8>,
    /// Persistence slot key.
    pub storage_key: String,
    /// Route handed to navigation after a successful upload.
    pub qr_route: String,
    pub upload: UploadConfig,
    /// On-screen canvas bounds, used when replaying pointer scripts.
    pub canvas: Option<CanvasBounds>,
}

impl Default for BoothConfig {
    fn default() -> Self {
        Self {
            tray: vec![
                TraySlot::stock(1, 20.0, 25.0, 90.0),
                TraySlot::stock(2, 90.0, 30.0, 120.0),
                TraySlot::stock(3, 170.0, -30.0, 160.0),
                TraySlot::stock(4, 20.0, 120.0, 150.0),
                TraySlot::stock(5, 180.0, 80.0, 90.0),
                TraySlot::stock(6, 180.0, 180.0, 100.0),
                TraySlot::stock(7, 30.0, 260.0, 90.0),
                TraySlot::stock(8, 140.0, 230.0, 200.0),
                TraySlot::stock(9, 10.0, 350.0, 120.0),
                TraySlot::stock(10, 140.0, 370.0, 120.0),
            ],
            sticker_size: 120.0,
            fps: 30,
            duration_ms: 2000.0,
            border_radius_px: 50.0,
            slide_interval_ms: 300.0,
            resize_sensitivity: 200.0,
            min_scale: 0.4,
            max_scale: 3.0,
            fallback_rgba: None,
            storage_key: STICKERS_STORAGE_KEY.to_string(),
            qr_route: "/qr".to_string(),
            upload: UploadConfig::default(),
            canvas: None,
        }
    }
}

impl BoothConfig {
    /// Parse a config from a JSON reader and validate it.
    pub fn from_reader<R: std::io::Read>(r: R) -> BoothResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| BoothError::serde(format!("parse booth config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> BoothResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            BoothError::validation(format!("open booth config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> BoothResult<()> {
        if self.tray.is_empty() {
            return Err(BoothError::validation("tray must contain at least one slot"));
        }
        if let Some(slot) = self.tray.iter().find(|s| s.src.trim().is_empty()) {
            return Err(BoothError::validation(format!(
                "tray slot at ({}, {}) has an empty src",
                slot.left, slot.top
            )));
        }
        let positive = [
            ("sticker_size", self.sticker_size),
            ("duration_ms", self.duration_ms),
            ("slide_interval_ms", self.slide_interval_ms),
            ("resize_sensitivity", self.resize_sensitivity),
            ("min_scale", self.min_scale),
        ];
        for (name, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(BoothError::validation(format!(
                    "{name} must be finite and > 0"
                )));
            }
        }
        if self.tray.iter().any(|s| s.size.is_some_and(|v| v.is_nan() || v <= 0.0)) {
            return Err(BoothError::validation("tray slot size must be > 0"));
        }
        if !self.max_scale.is_finite() || self.max_scale < self.min_scale {
            return Err(BoothError::validation("max_scale must be >= min_scale"));
        }
        if !self.border_radius_px.is_finite() || self.border_radius_px < 0.0 {
            return Err(BoothError::validation("border_radius_px must be >= 0"));
        }
        if self.storage_key.is_empty() {
            return Err(BoothError::validation("storage_key must be non-empty"));
        }
        Fps::per_second(self.fps)?;
        Ok(())
    }

    pub fn fps(&self) -> BoothResult<Fps> {
        Fps::per_second(self.fps)
    }

    pub fn tuning(&self) -> GestureTuning {
        GestureTuning {
            resize_sensitivity: self.resize_sensitivity,
            min_scale: self.min_scale,
            max_scale: self.max_scale,
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config/config.rs"]
mod tests;
