use std::sync::{
    Arc, RwLock,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    foundation::core::Size,
    record::clock::FrameClock,
    stickers::{entity::StickerEntity, gesture::StickerBoard},
};

/// Board shared between pointer handlers and the recorder.
pub type SharedBoard = Arc<RwLock<StickerBoard>>;

/// On-screen footprint of the element a recording is sized after.
pub trait HostFootprint: Send + Sync {
    /// Current layout box in logical pixels, or `None` when the host is not mounted.
    fn bounding_box(&self) -> Option<Size>;

    /// Backing pixels per logical pixel.
    fn device_pixel_ratio(&self) -> f64 {
        1.0
    }
}

/// Footprint with a fixed size, for headless use and tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedFootprint {
    size: Option<Size>,
    dpr: f64,
}

impl FixedFootprint {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: Some(Size::new(width, height)),
            dpr: 1.0,
        }
    }

    /// A host that is not mounted.
    pub fn unmounted() -> Self {
        Self {
            size: None,
            dpr: 1.0,
        }
    }

    pub fn with_dpr(mut self, dpr: f64) -> Self {
        self.dpr = dpr;
        self
    }
}

impl HostFootprint for FixedFootprint {
    fn bounding_box(&self) -> Option<Size> {
        self.size
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.dpr
    }
}

/// Live accessors. Implementations must return current values on every call.
pub trait LiveScene: Send + Sync {
    fn current_background_index(&self) -> usize;
    fn current_placed_stickers(&self) -> Vec<StickerEntity>;
}

/// Background slideshow position, shared by handle.
#[derive(Clone, Debug)]
pub struct Slideshow {
    index: Arc<AtomicUsize>,
    len: usize,
}

impl Slideshow {
    /// Slideshow over `len` photos, starting at 0.
    pub fn new(len: usize) -> Self {
        Self {
            index: Arc::new(AtomicUsize::new(0)),
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn current(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Step to the next photo, wrapping. Returns the new index.
    pub fn advance(&self) -> usize {
        if self.len == 0 {
            return 0;
        }
        let len = self.len;
        let prev = self
            .index
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % len))
            .unwrap_or(0);
        (prev + 1) % len
    }
}

/// Wraps a clock and advances a [`Slideshow`] every `interval_ms` of its time.
#[derive(Debug)]
pub struct SlideshowClock<C> {
    inner: C,
    slideshow: Slideshow,
    interval_ms: f64,
    last_advance: f64,
}

impl<C: FrameClock> SlideshowClock<C> {
    pub fn new(inner: C, slideshow: Slideshow, interval_ms: f64) -> Self {
        let last_advance = inner.now_ms();
        Self {
            inner,
            slideshow,
            interval_ms,
            last_advance,
        }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: FrameClock> FrameClock for SlideshowClock<C> {
    fn now_ms(&self) -> f64 {
        self.inner.now_ms()
    }

    fn next_tick(&mut self) -> Option<f64> {
        let ts = self.inner.next_tick()?;
        if self.interval_ms > 0.0 {
            while ts - self.last_advance >= self.interval_ms {
                self.last_advance += self.interval_ms;
                self.slideshow.advance();
            }
        }
        Some(ts)
    }
}

/// [`LiveScene`] reading straight from a shared board and slideshow.
#[derive(Clone, Debug)]
pub struct BoardScene {
    board: SharedBoard,
    slideshow: Slideshow,
}

impl BoardScene {
    pub fn new(board: SharedBoard, slideshow: Slideshow) -> Self {
        Self { board, slideshow }
    }
}

impl LiveScene for BoardScene {
    fn current_background_index(&self) -> usize {
        self.slideshow.current()
    }

    fn current_placed_stickers(&self) -> Vec<StickerEntity> {
        match self.board.read() {
            Ok(b) => b.placed_stickers(),
            Err(poisoned) => poisoned.into_inner().placed_stickers(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/record/scene.rs"]
mod tests;
