/// Facility and encoder contracts, plus an in-memory implementation.
pub mod facility;
/// `ffmpeg`-backed facility.
pub mod ffmpeg;
/// Container/codec negotiation.
pub mod mime;
