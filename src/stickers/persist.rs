use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::Context as _;

use crate::foundation::error::{BoothError, BoothResult};

/// Default key of the sticker-state slot.
pub const STICKERS_STORAGE_KEY: &str = "stickers_state";

/// Key-value slot that survives screen transitions.
///
/// The slot holds one opaque string (the JSON store snapshot). Implementations must treat a
/// missing slot as `Ok(None)`.
pub trait PersistencePort: Send + Sync {
    /// Read the slot, if present.
    fn load(&self) -> BoothResult<Option<String>>;
    /// Overwrite the slot.
    fn save(&self, blob: &str) -> BoothResult<()>;
    /// Remove the slot. Removing an absent slot is not an error.
    fn clear(&self) -> BoothResult<()>;
}

/// Process-local slot, for tests and single-run tools.
#[derive(Debug, Default)]
pub struct MemoryPort {
    slot: Mutex<Option<String>>,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Port pre-filled with `blob`.
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(blob.into())),
        }
    }
}

impl PersistencePort for MemoryPort {
    fn load(&self) -> BoothResult<Option<String>> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, blob: &str) -> BoothResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(blob.to_string());
        Ok(())
    }

    fn clear(&self) -> BoothResult<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Slot backed by a single JSON file.
#[derive(Clone, Debug)]
pub struct FilePort {
    path: PathBuf,
}

impl FilePort {
    /// Slot stored at `<dir>/<key>.json`.
    pub fn new(dir: impl AsRef<Path>, key: &str) -> BoothResult<Self> {
        if key.is_empty() || key.contains(['/', '\\']) {
            return Err(BoothError::validation(format!(
                "storage key '{key}' must be a non-empty file name"
            )));
        }
        Ok(Self {
            path: dir.as_ref().join(format!("{key}.json")),
        })
    }

    /// Slot stored at an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistencePort for FilePort {
    fn load(&self) -> BoothResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("read sticker state '{}'", self.path.display()))
                .into()),
        }
    }

    fn save(&self, blob: &str) -> BoothResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create state dir '{}'", parent.display()))?;
        }
        std::fs::write(&self.path, blob)
            .with_context(|| format!("write sticker state '{}'", self.path.display()))?;
        Ok(())
    }

    fn clear(&self) -> BoothResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("remove sticker state '{}'", self.path.display()))
                .into()),
        }
    }
}

/// Drop any saved sticker state when leaving the decorating flow.
///
/// Failures are logged, never returned.
pub fn clear_sticker_state(port: &dyn PersistencePort) {
    if let Err(e) = port.clear() {
        tracing::warn!(error = %e, "failed to clear sticker state");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stickers/persist.rs"]
mod tests;
