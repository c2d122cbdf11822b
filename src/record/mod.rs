/// Animation-frame clocks and cancellation.
pub mod clock;
/// The clip recorder.
pub mod recorder;
/// Live accessors the recorder reads on every frame.
pub mod scene;
