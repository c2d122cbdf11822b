//! Sticker entities, the store that owns them, and the pointer gesture machine that edits them.

/// Entity and drag-ghost value types.
pub mod entity;
/// Pointer-driven drag/clone/resize controller.
pub mod gesture;
/// Persistence port for store snapshots.
pub mod persist;
/// Authoritative entity collection.
pub mod store;
