use std::sync::Arc;

use crate::foundation::core::{Point, Rect, rect_contains_inclusive};
use crate::foundation::math::clamp_f64;
use crate::stickers::entity::{DragGhost, StickerEntity, VideoPos};
use crate::stickers::persist::PersistencePort;
use crate::stickers::store::{EntityStore, StoreSnapshot};

/// The single active pointer gesture, if any.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum GestureState {
    /// No gesture in progress.
    #[default]
    Idle,
    /// A fresh clone is being dragged out of the tray.
    DraggingClone {
        /// Id of the clone.
        entity_id: u64,
    },
    /// A placed sticker is being dragged around (or off) the canvas.
    DraggingPlaced {
        /// Id of the placed sticker.
        entity_id: u64,
    },
    /// A placed sticker is being resized from its handle.
    Resizing {
        /// Id of the resized sticker.
        entity_id: u64,
        /// Scale when the handle was grabbed.
        start_scale: f64,
        /// Pointer position when the handle was grabbed.
        start: Point,
    },
}

impl GestureState {
    /// Entity targeted by the active gesture.
    pub fn entity_id(self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::DraggingClone { entity_id }
            | Self::DraggingPlaced { entity_id }
            | Self::Resizing { entity_id, .. } => Some(entity_id),
        }
    }

    pub fn is_idle(self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Resize sensitivity and scale bounds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GestureTuning {
    /// Pointer pixels of `dx + dy` per unit of scale.
    pub resize_sensitivity: f64,
    /// Smallest allowed scale.
    pub min_scale: f64,
    /// Largest allowed scale.
    pub max_scale: f64,
}

impl Default for GestureTuning {
    fn default() -> Self {
        Self {
            resize_sensitivity: 200.0,
            min_scale: 0.4,
            max_scale: 3.0,
        }
    }
}

/// Store-level effect of finishing a gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureOutcome {
    /// Nothing was active, or the target vanished.
    Ignored,
    /// A tray clone landed on the canvas.
    Placed { id: u64 },
    /// A placed sticker moved to a new position.
    Moved { id: u64 },
    /// The dragged entity was released off-canvas and deleted.
    Discarded { id: u64 },
    /// A resize gesture ended.
    Resized { id: u64 },
}

/// Pointer interaction controller over an [`EntityStore`].
///
/// Every mutation builds the next store from a copy of the current one and swaps it in whole,
/// then writes a snapshot to the persistence port when one is attached.
pub struct StickerBoard {
    store: EntityStore,
    ghost: Option<DragGhost>,
    state: GestureState,
    tuning: GestureTuning,
    port: Option<Arc<dyn PersistencePort>>,
    hydrated: bool,
}

impl std::fmt::Debug for StickerBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StickerBoard")
            .field("stickers", &self.store.len())
            .field("state", &self.state)
            .field("ghost", &self.ghost.as_ref().map(|g| g.id))
            .field("persistent", &self.port.is_some())
            .finish()
    }
}

impl StickerBoard {
    pub fn new(store: EntityStore, tuning: GestureTuning) -> Self {
        Self {
            store,
            ghost: None,
            state: GestureState::Idle,
            tuning,
            port: None,
            hydrated: false,
        }
    }

    /// Attach a persistence port; every later store change is saved to it.
    pub fn with_persistence(mut self, port: Arc<dyn PersistencePort>) -> Self {
        self.port = Some(port);
        self
    }

    /// Restore the store from the persistence port. Runs at most once per board.
    ///
    /// Absent, malformed or inconsistent snapshots leave the initial store untouched. Restored
    /// scales are clamped to the tuning range. Returns whether a snapshot was applied.
    pub fn hydrate(&mut self) -> bool {
        if self.hydrated {
            return false;
        }
        self.hydrated = true;

        let Some(port) = self.port.clone() else {
            return false;
        };
        let raw = match port.load() {
            Ok(Some(raw)) => raw,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read sticker state");
                return false;
            }
        };
        match StoreSnapshot::from_json(&raw).and_then(EntityStore::from_snapshot) {
            Ok(mut store) => {
                store.clamp_scales(self.tuning.min_scale, self.tuning.max_scale);
                self.store = store;
                tracing::debug!(stickers = self.store.len(), "restored sticker state");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed sticker state");
                false
            }
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn ghost(&self) -> Option<&DragGhost> {
        self.ghost.as_ref()
    }

    pub fn tuning(&self) -> GestureTuning {
        self.tuning
    }

    /// Every placed sticker in ascending id order, as the recorder draws them.
    pub fn placed_stickers(&self) -> Vec<StickerEntity> {
        self.store.placed()
    }

    /// Placed stickers minus the one currently represented by the drag ghost.
    pub fn visible_placed(&self) -> Vec<StickerEntity> {
        let hidden = self.ghost.as_ref().map(|g| g.id);
        self.store
            .placed()
            .into_iter()
            .filter(|s| Some(s.id) != hidden)
            .collect()
    }

    /// Pointer down on a sticker body (tray template or placed sticker).
    ///
    /// Returns whether a drag started.
    pub fn begin_gesture(&mut self, entity_id: u64, pointer: Point) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        let Some(target) = self.store.get(entity_id).cloned() else {
            return false;
        };

        if target.is_template && !target.in_video {
            let mut next = self.store.clone();
            let id = next.allocate_id();
            let clone = StickerEntity {
                id,
                is_template: false,
                in_video: false,
                scale: 1.0,
                ..target
            };
            self.ghost = Some(DragGhost::centered_on(&clone, pointer));
            next.push(clone);
            self.state = GestureState::DraggingClone { entity_id: id };
            self.commit(next);
            tracing::debug!(template = entity_id, clone = id, "drag from tray");
            return true;
        }

        if target.is_placed() {
            self.ghost = Some(DragGhost::centered_on(&target, pointer));
            self.state = GestureState::DraggingPlaced { entity_id };
            return true;
        }

        false
    }

    /// Pointer down on a placed sticker's resize handle.
    ///
    /// Returns whether a resize started.
    pub fn begin_resize(&mut self, entity_id: u64, pointer: Point) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        let Some(target) = self.store.get(entity_id) else {
            return false;
        };
        if !target.is_placed() {
            return false;
        }

        self.state = GestureState::Resizing {
            entity_id,
            start_scale: target.scale,
            start: pointer,
        };
        self.ghost = None;
        true
    }

    /// Pointer moved anywhere on screen.
    pub fn on_pointer_move(&mut self, pointer: Point) {
        match self.state {
            GestureState::Idle => {}
            GestureState::Resizing {
                entity_id,
                start_scale,
                start,
            } => {
                let delta = ((pointer.x - start.x) + (pointer.y - start.y))
                    / self.tuning.resize_sensitivity;
                let scale = clamp_f64(
                    start_scale + delta,
                    self.tuning.min_scale,
                    self.tuning.max_scale,
                );
                let mut next = self.store.clone();
                let Some(entity) = next.get_mut(entity_id) else {
                    return;
                };
                if entity.scale == scale {
                    return;
                }
                entity.scale = scale;
                self.commit(next);
            }
            GestureState::DraggingClone { .. } | GestureState::DraggingPlaced { .. } => {
                if let Some(ghost) = self.ghost.as_mut() {
                    ghost.recenter(pointer);
                }
            }
        }
    }

    /// Pointer released. `canvas` is the canvas' screen-space bounds, `None` when it is not
    /// mounted (treated as a drop outside).
    pub fn end_gesture(&mut self, pointer: Point, canvas: Option<Rect>) -> GestureOutcome {
        let state = std::mem::take(&mut self.state);
        self.ghost = None;

        let (entity_id, was_placed) = match state {
            GestureState::Idle => return GestureOutcome::Ignored,
            GestureState::Resizing { entity_id, .. } => {
                return GestureOutcome::Resized { id: entity_id };
            }
            GestureState::DraggingClone { entity_id } => (entity_id, false),
            GestureState::DraggingPlaced { entity_id } => (entity_id, true),
        };

        let mut next = self.store.clone();
        let Some(entity) = next.get_mut(entity_id) else {
            return GestureOutcome::Ignored;
        };
        if entity.is_template {
            return GestureOutcome::Ignored;
        }

        let inside = canvas.filter(|r| rect_contains_inclusive(*r, pointer));
        let Some(canvas) = inside else {
            next.remove(entity_id);
            self.commit(next);
            tracing::debug!(id = entity_id, "sticker dropped off canvas");
            return GestureOutcome::Discarded { id: entity_id };
        };

        entity.video_pos = drop_position(canvas, pointer, entity.box_size());
        entity.in_video = true;
        self.commit(next);
        if was_placed {
            GestureOutcome::Moved { id: entity_id }
        } else {
            GestureOutcome::Placed { id: entity_id }
        }
    }

    fn commit(&mut self, next: EntityStore) {
        self.store = next;
        self.persist();
    }

    fn persist(&self) {
        let Some(port) = self.port.as_ref() else {
            return;
        };
        let saved = self
            .store
            .snapshot()
            .to_json()
            .and_then(|json| port.save(&json));
        if let Err(e) = saved {
            tracing::warn!(error = %e, "failed to save sticker state");
        }
    }
}

/// Canvas-local top-left for a box of side `box_size` centered on `pointer`, clamped so the box
/// stays inside `canvas` (pinned to the top-left when it cannot fit).
pub fn drop_position(canvas: Rect, pointer: Point, box_size: f64) -> VideoPos {
    let half = box_size / 2.0;
    let rel_x = pointer.x - canvas.x0 - half;
    let rel_y = pointer.y - canvas.y0 - half;
    let max_x = (canvas.width() - box_size).max(0.0);
    let max_y = (canvas.height() - box_size).max(0.0);
    VideoPos::new(clamp_f64(rel_x, 0.0, max_x), clamp_f64(rel_y, 0.0, max_y))
}

#[cfg(test)]
#[path = "../../tests/unit/stickers/gesture.rs"]
mod tests;
