use std::collections::HashSet;

use crate::config::TraySlot;
use crate::foundation::error::{BoothError, BoothResult};
use crate::foundation::math::clamp_f64;
use crate::stickers::entity::{StickerEntity, TrayHome, VideoPos};

/// Placeholder canvas position given to tray templates before they are ever placed.
const TEMPLATE_VIDEO_POS: VideoPos = VideoPos { x: 100.0, y: 100.0 };

/// Authoritative, ordered collection of sticker entities.
///
/// The store is pure data. Ids are allocated from a high-water mark so that ids freed by
/// deletion are never handed out again.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityStore {
    stickers: Vec<StickerEntity>,
    next_id: u64,
}

impl EntityStore {
    /// One template per tray slot, with `id` equal to the slot index.
    pub fn from_tray(slots: &[TraySlot], default_size: f64) -> Self {
        let stickers = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let tray_home = TrayHome {
                    left: slot.left,
                    top: slot.top,
                    size: slot.size,
                };
                StickerEntity {
                    id: i as u64,
                    src: slot.src.clone(),
                    is_template: true,
                    in_video: false,
                    tray_home,
                    video_pos: TEMPLATE_VIDEO_POS,
                    scale: 1.0,
                    base_size: slot.size.unwrap_or(default_size),
                }
            })
            .collect();
        Self::from_entities(stickers)
    }

    /// Wrap an existing entity list, deriving the id high-water mark from it.
    pub fn from_entities(stickers: Vec<StickerEntity>) -> Self {
        let next_id = stickers.iter().map(|s| s.id + 1).max().unwrap_or(0);
        Self { stickers, next_id }
    }

    /// Rebuild a store from a persisted snapshot.
    ///
    /// Rejects snapshots with duplicate ids, non-positive or non-finite sizes and scales,
    /// non-finite positions, or templates marked as placed. Clones that were never placed (a
    /// drag cut short before its drop) are dropped; their ids stay retired.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> BoothResult<Self> {
        let mut seen = HashSet::new();
        for s in &snapshot.stickers {
            if !seen.insert(s.id) {
                return Err(BoothError::validation(format!("duplicate sticker id {}", s.id)));
            }
            if !s.base_size.is_finite() || s.base_size <= 0.0 {
                return Err(BoothError::validation(format!(
                    "sticker {} has invalid base size {}",
                    s.id, s.base_size
                )));
            }
            if !s.scale.is_finite() || s.scale <= 0.0 {
                return Err(BoothError::validation(format!(
                    "sticker {} has invalid scale {}",
                    s.id, s.scale
                )));
            }
            if !s.video_pos.x.is_finite() || !s.video_pos.y.is_finite() {
                return Err(BoothError::validation(format!(
                    "sticker {} has a non-finite position",
                    s.id
                )));
            }
            if s.is_template && s.in_video {
                return Err(BoothError::validation(format!(
                    "template {} is marked as placed",
                    s.id
                )));
            }
        }

        let high_water = snapshot
            .stickers
            .iter()
            .map(|s| s.id + 1)
            .max()
            .unwrap_or(0)
            .max(snapshot.next_id.unwrap_or(0));
        let kept: Vec<StickerEntity> = snapshot
            .stickers
            .into_iter()
            .filter(|s| s.is_template || s.in_video)
            .collect();
        let mut store = Self::from_entities(kept);
        store.next_id = store.next_id.max(high_water);
        Ok(store)
    }

    /// Clamp every non-template scale into `[min, max]`.
    pub(crate) fn clamp_scales(&mut self, min: f64, max: f64) {
        for s in self.stickers.iter_mut().filter(|s| !s.is_template) {
            s.scale = clamp_f64(s.scale, min, max);
        }
    }

    /// Capture the store as a serializable snapshot.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            stickers: self.stickers.clone(),
            next_id: Some(self.next_id),
        }
    }

    /// All entities in insertion order.
    pub fn stickers(&self) -> &[StickerEntity] {
        &self.stickers
    }

    pub fn len(&self) -> usize {
        self.stickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stickers.is_empty()
    }

    /// Next id the store would hand out.
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: u64) -> Option<&StickerEntity> {
        self.stickers.iter().find(|s| s.id == id)
    }

    /// Placed (in-canvas, non-template) entities in ascending id order.
    pub fn placed(&self) -> Vec<StickerEntity> {
        let mut out: Vec<StickerEntity> = self
            .stickers
            .iter()
            .filter(|s| s.is_placed())
            .cloned()
            .collect();
        out.sort_by_key(|s| s.id);
        out
    }

    /// Tray templates that are still resting in the tray.
    pub fn tray_templates(&self) -> impl Iterator<Item = &StickerEntity> {
        self.stickers
            .iter()
            .filter(|s| s.is_template && !s.in_video)
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut StickerEntity> {
        self.stickers.iter_mut().find(|s| s.id == id)
    }

    pub(crate) fn allocate_id(&mut self) -> u64 {
        let max_plus_one = self.stickers.iter().map(|s| s.id + 1).max().unwrap_or(0);
        let id = self.next_id.max(max_plus_one);
        self.next_id = id + 1;
        id
    }

    pub(crate) fn push(&mut self, entity: StickerEntity) {
        self.next_id = self.next_id.max(entity.id + 1);
        self.stickers.push(entity);
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<StickerEntity> {
        let idx = self.stickers.iter().position(|s| s.id == id)?;
        Some(self.stickers.remove(idx))
    }
}

/// JSON-serializable store snapshot, `{ "stickers": [...] }`.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoreSnapshot {
    /// Every entity, templates included.
    pub stickers: Vec<StickerEntity>,
    /// Id high-water mark. Older snapshots omit it.
    #[serde(rename = "nextId", default, skip_serializing_if = "Option::is_none")]
    pub next_id: Option<u64>,
}

impl StoreSnapshot {
    /// Encode as compact JSON.
    pub fn to_json(&self) -> BoothResult<String> {
        serde_json::to_string(self)
            .map_err(|e| BoothError::serde(format!("encode sticker snapshot: {e}")))
    }

    /// Decode from JSON.
    pub fn from_json(s: &str) -> BoothResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| BoothError::serde(format!("decode sticker snapshot: {e}")))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stickers/store.rs"]
mod tests;
