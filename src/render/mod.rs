/// Frame compositor (background + stickers onto a rounded canvas).
pub mod compositor;
/// Rendered frame buffers.
pub mod frame;
