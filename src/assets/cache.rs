use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;

use crate::assets::decode::{Bitmap, decode_image};
use crate::foundation::error::{BoothError, BoothResult};

/// Resolves a resource reference to a decoded bitmap.
pub trait ImageLoader: Send + Sync {
    /// Fetch and decode `src`.
    fn load(&self, src: &str) -> BoothResult<Bitmap>;
}

/// Loads bitmaps from the filesystem.
///
/// Absolute references are read as-is; relative references resolve under `root` and may not
/// escape it.
#[derive(Clone, Debug)]
pub struct FsImageLoader {
    root: PathBuf,
}

impl FsImageLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, src: &str) -> BoothResult<PathBuf> {
        let p = Path::new(src);
        if p.is_absolute() {
            return Ok(p.to_path_buf());
        }
        Ok(self.root.join(normalize_rel_path(src)?))
    }
}

impl ImageLoader for FsImageLoader {
    fn load(&self, src: &str) -> BoothResult<Bitmap> {
        let path = self.resolve(src)?;
        let bytes = std::fs::read(&path).map_err(|e| {
            BoothError::resource(format!("read image '{}': {e}", path.display()))
        })?;
        decode_image(&bytes)
    }
}

/// Normalize and validate a relative resource path.
///
/// The result uses `/` separators, drops `.` segments, and rejects parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> BoothResult<String> {
    let s = source.replace('\\', "/");
    if s.is_empty() {
        return Err(BoothError::validation("resource path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(BoothError::validation(
                "resource paths must not contain '..'",
            ));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(BoothError::validation(
            "resource path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

#[derive(Default)]
struct Slot {
    bitmap: Mutex<Option<Arc<Bitmap>>>,
}

/// Outcome of a best-effort [`ImageCache::preload_all`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// References now resident in the cache.
    pub loaded: usize,
    /// References whose load failed.
    pub failed: Vec<String>,
}

/// Memoizing bitmap cache shared by the compositor and recorder.
///
/// Each reference is decoded at most once. Callers racing on the same reference wait on the
/// first caller's load instead of starting their own. Failed loads leave no entry, so the next
/// request retries.
pub struct ImageCache {
    loader: Arc<dyn ImageLoader>,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("resident", &self.resident())
            .finish()
    }
}

impl ImageCache {
    pub fn new(loader: Arc<dyn ImageLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached bitmap for `src`, loading it on first use.
    pub fn get_or_load(&self, src: &str) -> BoothResult<Arc<Bitmap>> {
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(src.to_string())
            .or_default()
            .clone();

        let mut guard = slot.bitmap.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bmp) = guard.as_ref() {
            return Ok(bmp.clone());
        }
        let bmp = Arc::new(self.loader.load(src)?);
        *guard = Some(bmp.clone());
        tracing::debug!(src, width = bmp.width, height = bmp.height, "image cached");
        Ok(bmp)
    }

    /// Like [`ImageCache::get_or_load`], but logs and swallows failures.
    pub fn load_or_skip(&self, src: &str) -> Option<Arc<Bitmap>> {
        match self.get_or_load(src) {
            Ok(bmp) => Some(bmp),
            Err(e) => {
                tracing::warn!(src, error = %e, "skipping unavailable image");
                None
            }
        }
    }

    /// Load every reference in parallel; individual failures are reported, never raised.
    pub fn preload_all<'a>(&self, srcs: impl IntoIterator<Item = &'a str>) -> PreloadReport {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = srcs.into_iter().filter(|s| seen.insert(*s)).collect();

        let failed: Vec<String> = unique
            .par_iter()
            .filter_map(|src| match self.get_or_load(src) {
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(src = *src, error = %e, "preload failed");
                    Some((*src).to_string())
                }
            })
            .collect();

        PreloadReport {
            loaded: unique.len() - failed.len(),
            failed,
        }
    }

    /// Number of references with a decoded bitmap.
    pub fn resident(&self) -> usize {
        let slots: Vec<Arc<Slot>> = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        slots
            .iter()
            .filter(|s| {
                s.bitmap
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
