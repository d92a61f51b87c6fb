//! Scene files with BLAKE3 integrity hashing.
//!
//! A scene file is a JSON envelope around the saved scene node:
//!
//! ```json
//! { "hash": "<64 hex chars>", "scene": { "type": "Scene", "val": { ... } } }
//! ```
//!
//! The hash covers the canonical (compact, key-sorted) JSON encoding of the
//! `scene` node, so reformatting a file by hand does not invalidate it but
//! editing any value does.

use std::path::Path;

use anyhow::Context;
use prism_reflect::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SceneIoConfig;
use crate::scene::Scene;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The recorded hash does not match the scene node.
    #[error("scene hash mismatch: recorded {recorded} but recomputed {computed} -- the file may be corrupted or edited")]
    HashMismatch { recorded: String, computed: String },

    #[error("scene JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scene file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Reflect(#[from] ReflectError),
}

// ---------------------------------------------------------------------------
// SceneFile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFile {
    /// BLAKE3 hex digest (64 lowercase hex chars) of the `scene` node.
    pub hash: String,
    pub scene: Value,
}

/// BLAKE3 hex digest of the compact JSON encoding of `node`.
fn compute_hash(node: &Value) -> String {
    blake3::hash(node.to_string().as_bytes()).to_hex().to_string()
}

impl SceneFile {
    /// Save `scene` and record its hash.
    pub fn capture(registry: &TypeRegistry, scene: &Scene) -> Result<Self, SceneError> {
        let node = prism_reflect::save_fixed(registry, scene)?;
        let hash = compute_hash(&node);
        tracing::debug!(hash = %hash, "scene captured");
        Ok(Self { hash, scene: node })
    }

    pub fn verify(&self) -> Result<(), SceneError> {
        let computed = compute_hash(&self.scene);
        if computed != self.hash {
            tracing::warn!(recorded = %self.hash, computed = %computed, "scene hash does not verify");
            return Err(SceneError::HashMismatch {
                recorded: self.hash.clone(),
                computed,
            });
        }
        Ok(())
    }

    /// Load the scene, verifying the hash first unless `verify_hash` is
    /// off. Nothing is loaded when verification fails.
    pub fn restore(&self, registry: &TypeRegistry, verify_hash: bool) -> Result<Scene, SceneError> {
        if verify_hash {
            self.verify()?;
        }
        Ok(prism_reflect::load_fixed(registry, &self.scene)?)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, SceneError> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }

    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn write_to(&self, path: impl AsRef<Path>, pretty: bool) -> Result<(), SceneError> {
        std::fs::write(path, self.to_json(pretty)?)?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}

// ---------------------------------------------------------------------------
// Application-facing entry points
// ---------------------------------------------------------------------------

/// Read and load the scene at `path`.
///
/// On any failure the partially built scene is dropped and nothing is
/// returned.
pub fn load_scene(path: impl AsRef<Path>, registry: &TypeRegistry, config: &SceneIoConfig) -> anyhow::Result<Scene> {
    let path = path.as_ref();
    let file = SceneFile::read_from(path).with_context(|| format!("failed to read scene file {}", path.display()))?;
    let scene = file
        .restore(registry, config.verify_hash)
        .with_context(|| format!("failed to load scene from {}", path.display()))?;
    tracing::info!(path = %path.display(), meshes = scene.meshes.len(), "scene loaded");
    Ok(scene)
}

/// Save `scene` to `path`.
pub fn save_scene(
    path: impl AsRef<Path>,
    registry: &TypeRegistry,
    scene: &Scene,
    config: &SceneIoConfig,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = SceneFile::capture(registry, scene).context("failed to save scene")?;
    file.write_to(path, config.pretty)
        .with_context(|| format!("failed to write scene file {}", path.display()))?;
    tracing::info!(path = %path.display(), hash = %file.hash, "scene saved");
    Ok(())
}
