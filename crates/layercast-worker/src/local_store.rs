//! Directory-backed artifact store.
//!
//! Objects live at `<root>/<bucket>/<key>`; keys may contain `/`.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use layercast_protocol::ArtifactLocation;

use crate::error::StoreError;
use crate::services::{ArtifactStore, LayerArtifact};

/// Artifact store over a local directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a location to a path under the root.
    ///
    /// Returns `None` for bucket or key components that would escape it.
    fn object_path(&self, location: &ArtifactLocation) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for part in [location.bucket(), location.key()] {
            let relative = Path::new(part);
            if part.is_empty()
                || !relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
            {
                return None;
            }
            path.push(relative);
        }
        Some(path)
    }

    /// Store `bytes` at `location`, replacing any previous object.
    pub fn put(&self, location: &ArtifactLocation, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.object_path(location).ok_or_else(|| StoreError::NotFound {
            location: location.to_string(),
        })?;
        let io_error = |source: io::Error| StoreError::TransientIo {
            location: location.to_string(),
            source,
        };

        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(io_error)?;

        let temp_path = parent.join(format!(".upload.{}", std::process::id()));
        let written = fs::File::create(&temp_path)
            .and_then(|mut file| {
                file.write_all(bytes)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&temp_path, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(io_error(e));
        }
        Ok(path)
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn get(&self, location: &ArtifactLocation) -> Result<LayerArtifact, StoreError> {
        let path = self.object_path(location).ok_or_else(|| StoreError::NotFound {
            location: location.to_string(),
        })?;

        match fs::read(&path) {
            Ok(bytes) => Ok(LayerArtifact::new(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                location: location.to_string(),
            }),
            Err(source) => Err(StoreError::TransientIo {
                location: location.to_string(),
                source,
            }),
        }
    }
}
