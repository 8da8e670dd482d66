//! Where artifacts go and where baselines come from.
//!
//! [`ArtifactStore`] writes encoded images under a storage root.
//! [`AssetSource`] is the bundled-assets namespace consulted first when a
//! baseline is looked up; the reference is then tried as a plain file path.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::env_config;
use crate::error::{CaptureError, CaptureResult};

/// Storage root used when none is configured: `VIEW_CAPTURE_STORAGE_ROOT`,
/// then the user's pictures directory, then the system temp directory.
pub fn default_storage_root() -> PathBuf {
    env_config::env_var_path(env_config::STORAGE_ROOT_VAR)
        .or_else(dirs::picture_dir)
        .unwrap_or_else(std::env::temp_dir)
}

#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, label: &str, extension: &str) -> PathBuf {
        self.root.join(format!("{label}.{extension}"))
    }

    /// Write `bytes` to `<root>/<label>.<extension>`, creating the root if
    /// needed, and return the written path.
    pub fn persist(&self, label: &str, extension: &str, bytes: &[u8]) -> CaptureResult<PathBuf> {
        fs::create_dir_all(&self.root).map_err(|e| {
            CaptureError::io(
                format!("failed to create storage root {}", self.root.display()),
                e,
            )
        })?;
        let path = self.path_for(label, extension);
        fs::write(&path, bytes)
            .map_err(|e| CaptureError::io(format!("failed to write {}", path.display()), e))?;
        Ok(path)
    }
}

/// Bundled assets namespace.
pub trait AssetSource: Send + Sync {
    /// Bytes of the asset named `name`, or `None` when it is not bundled.
    fn open(&self, name: &str) -> CaptureResult<Option<Vec<u8>>>;
}

/// No bundled assets; every lookup falls through to the filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoAssets;

impl AssetSource for NoAssets {
    fn open(&self, _name: &str) -> CaptureResult<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// Assets held in memory, keyed by name.
#[derive(Clone, Debug, Default)]
pub struct MemoryAssets {
    entries: FxHashMap<String, Vec<u8>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> &mut Self {
        self.entries.insert(name.into(), bytes);
        self
    }

    pub fn with(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(name, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AssetSource for MemoryAssets {
    fn open(&self, name: &str) -> CaptureResult<Option<Vec<u8>>> {
        Ok(self.entries.get(name).cloned())
    }
}

/// Assets resolved relative to a directory. Absolute names and names that
/// climb out of the directory are not assets.
#[derive(Clone, Debug)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirectoryAssets {
    fn open(&self, name: &str) -> CaptureResult<Option<Vec<u8>>> {
        let relative = Path::new(name);
        let contained = relative
            .components()
            .all(|c| matches!(c, std::path::Component::Normal(_)));
        if name.is_empty() || !contained {
            return Ok(None);
        }
        read_if_present(&self.root.join(relative))
    }
}

fn read_if_present(path: &Path) -> CaptureResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if matches!(e.kind(), std::io::ErrorKind::NotFound | std::io::ErrorKind::IsADirectory) => {
            Ok(None)
        }
        Err(e) => Err(CaptureError::io(format!("failed to read {}", path.display()), e)),
    }
}

/// Load baseline bytes: the asset namespace first, then `reference` as a
/// filesystem path. An asset lookup error counts as a miss. Neither
/// succeeding is [`CaptureError::ResourceNotFound`].
pub fn load_baseline(assets: &dyn AssetSource, reference: &str) -> CaptureResult<Vec<u8>> {
    match assets.open(reference) {
        Ok(Some(bytes)) => return Ok(bytes),
        Ok(None) => {}
        Err(err) => {
            debug!(reference, error = %err, "asset lookup failed, trying filesystem");
        }
    }
    if !reference.is_empty() {
        match fs::read(reference) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                return Err(CaptureError::ResourceNotFound(format!("{reference}: {e}")));
            }
        }
    }
    Err(CaptureError::ResourceNotFound(
        "no compare image reference given".into(),
    ))
}
