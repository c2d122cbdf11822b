use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    encode::mime::extension_for_mime,
    foundation::error::{BoothError, BoothResult},
    record::recorder::ClipBlob,
    upload::port::{UploadPort, unix_ms_now},
};

/// Key prefix clips are written under.
pub const VIDEO_PREFIX: &str = "videos";

/// Minimal object storage: write bytes under a key, then resolve a public URL for it.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> BoothResult<()>;
    fn public_url(&self, key: &str) -> BoothResult<String>;
}

/// Object store backed by a local directory, optionally served from `base_url`.
#[derive(Clone, Debug)]
pub struct DirObjectStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl DirObjectStore {
    /// Store under `root`; URLs are `file://` paths.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// URLs are `<base_url>/<key>`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> BoothResult<PathBuf> {
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
        {
            return Err(BoothError::validation(format!("invalid object key '{key}'")));
        }
        Ok(self.root.join(key))
    }
}

impl ObjectStore for DirObjectStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> BoothResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create object directory '{}'", parent.display()))?;
        }
        std::fs::write(&path, bytes)
            .with_context(|| format!("write object '{}'", path.display()))?;
        tracing::debug!(key, content_type, bytes = bytes.len(), "object stored");
        Ok(())
    }

    fn public_url(&self, key: &str) -> BoothResult<String> {
        let path = self.path_for(key)?;
        if !path.is_file() {
            return Err(BoothError::transport(format!("object '{key}' does not exist")));
        }
        Ok(match &self.base_url {
            Some(base) => format!("{base}/{key}"),
            None => format!("file://{}", path.display()),
        })
    }
}

/// Object key for a clip: `videos/<ms>.<mp4|webm>`.
pub fn object_key(mime: &str, unix_ms: u64) -> String {
    format!("{VIDEO_PREFIX}/{unix_ms}.{}", extension_for_mime(mime))
}

/// Upload binding that writes clips straight into an [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct ObjectStoreUpload<S> {
    store: S,
}

impl<S: ObjectStore> ObjectStoreUpload<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: ObjectStore> UploadPort for ObjectStoreUpload<S> {
    fn upload(&self, clip: &ClipBlob) -> BoothResult<String> {
        let key = object_key(&clip.mime, unix_ms_now());
        self.store.put(&key, &clip.bytes, &clip.mime)?;
        self.store.public_url(&key)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/upload/object_store.rs"]
mod tests;
