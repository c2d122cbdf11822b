use crate::foundation::core::{Point, Rect};

/// Resting slot of a sticker in the tray, in tray-local pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrayHome {
    /// Left offset inside the tray.
    #[serde(default)]
    pub left: f64,
    /// Top offset inside the tray.
    #[serde(default)]
    pub top: f64,
    /// Slot size, when the slot overrides the global sticker size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
}

/// Top-left position of a placed sticker in canvas-local pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoPos {
    /// Horizontal offset from the canvas' left edge.
    pub x: f64,
    /// Vertical offset from the canvas' top edge.
    pub y: f64,
}

impl VideoPos {
    /// Build a position from raw coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// One placeable sticker.
///
/// Field names serialize in camelCase so snapshots stay compatible with the kiosk's stored JSON.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StickerEntity {
    /// Store-unique id; never reused.
    pub id: u64,
    /// Bitmap resource reference.
    pub src: String,
    /// True only for tray prototypes.
    pub is_template: bool,
    /// True once the sticker has a live canvas position.
    pub in_video: bool,
    /// Tray slot the sticker was spawned from.
    #[serde(default)]
    pub tray_home: TrayHome,
    /// Canvas position; meaningful only while `in_video`.
    #[serde(default)]
    pub video_pos: VideoPos,
    /// Multiplier on `base_size`.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Nominal square footprint in pixels.
    pub base_size: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl StickerEntity {
    /// Side length of the on-canvas box (`base_size * scale`).
    pub fn box_size(&self) -> f64 {
        self.base_size * self.scale
    }

    /// Whether the sticker is a non-template with a live canvas position.
    pub fn is_placed(&self) -> bool {
        self.in_video && !self.is_template
    }

    /// Canvas-local bounding box of the sticker.
    pub fn video_rect(&self) -> Rect {
        let s = self.box_size();
        Rect::new(
            self.video_pos.x,
            self.video_pos.y,
            self.video_pos.x + s,
            self.video_pos.y + s,
        )
    }
}

/// Screen-space proxy drawn under the pointer while a drag is active.
///
/// Holds the dragged entity's id plus a rendering snapshot taken at gesture start.
#[derive(Clone, Debug, PartialEq)]
pub struct DragGhost {
    /// Id of the entity being dragged.
    pub id: u64,
    /// Bitmap resource reference.
    pub src: String,
    /// Left edge in screen pixels.
    pub x: f64,
    /// Top edge in screen pixels.
    pub y: f64,
    /// Scale captured at gesture start.
    pub scale: f64,
    /// Base size captured at gesture start.
    pub base_size: f64,
}

impl DragGhost {
    pub(crate) fn centered_on(entity: &StickerEntity, pointer: Point) -> Self {
        let mut ghost = Self {
            id: entity.id,
            src: entity.src.clone(),
            x: 0.0,
            y: 0.0,
            scale: entity.scale,
            base_size: entity.base_size,
        };
        ghost.recenter(pointer);
        ghost
    }

    /// Side length of the ghost's box.
    pub fn box_size(&self) -> f64 {
        self.base_size * self.scale
    }

    pub(crate) fn recenter(&mut self, pointer: Point) {
        let half = self.box_size() / 2.0;
        self.x = pointer.x - half;
        self.y = pointer.y - half;
    }
}
