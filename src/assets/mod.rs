/// Shared, memoizing bitmap cache.
pub mod cache;
/// Bitmap decoding into premultiplied RGBA8.
pub mod decode;
