//! Asset loading: turns model sources into node hierarchies in a [`Scene`].
//!
//! Loaded roots are left detached; the caller decides whether to attach
//! them or keep them as templates for cloning. Every load is tagged with a
//! content-addressed [`AssetId`] so reloading identical data can be told
//! apart from replacing it.

mod builtin;
mod model;

use std::path::Path;

use sha2::{Digest, Sha256};
use shoal_animation::ClipError;
use shoal_common::NodeId;
use shoal_scene::{Scene, SceneError};

pub use builtin::{BUILTIN_SCHEME, FishRig};
pub use model::{ClipDef, ModelFile, NodeDef, NodeDefKind, SkeletonDef};

/// Content-addressed id computed from the bytes an asset was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetId(pub u64);

impl AssetId {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Self(u64::from_le_bytes(prefix))
    }
}

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown builtin model: {0}")]
    UnknownBuiltin(String),
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("invalid clip: {0}")]
    Clip(#[from] ClipError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Result of a successful load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedModel {
    pub root: NodeId,
    pub id: AssetId,
}

/// Source of node hierarchies.
pub trait AssetLoader {
    fn load(&mut self, path: &Path, scene: &mut Scene) -> Result<LoadedModel, AssetError>;
}

/// Loads `builtin:<name>` procedural models and JSON [`ModelFile`]s from disk.
#[derive(Debug, Default)]
pub struct DefaultLoader {
    pub fish: FishRig,
}

impl DefaultLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssetLoader for DefaultLoader {
    fn load(&mut self, path: &Path, scene: &mut Scene) -> Result<LoadedModel, AssetError> {
        let source = path.to_string_lossy();
        if let Some(name) = source.strip_prefix(BUILTIN_SCHEME) {
            let model = match name {
                "fish" => self.fish.model()?,
                other => return Err(AssetError::UnknownBuiltin(other.to_string())),
            };
            let root = model.instantiate(scene)?;
            let id = AssetId::of(source.as_bytes());
            tracing::debug!(source = %source, root = %root.short(), "instantiated builtin model");
            return Ok(LoadedModel { root, id });
        }

        let bytes = std::fs::read(path)?;
        let model: ModelFile = serde_json::from_slice(&bytes)?;
        let root = model.instantiate(scene)?;
        let id = AssetId::of(&bytes);
        tracing::debug!(path = %source, root = %root.short(), ?id, "loaded model file");
        Ok(LoadedModel { root, id })
    }
}
