//! Viewer configuration.
//!
//! Every field has a default, so an empty JSON object is a valid configuration.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::{fallback::FallbackResolver, normalize::NormalizeStrategy, resources::GltfLoader};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Prefix for relative asset references. `"."` leaves references untouched.
    pub asset_root: String,
    /// Directory holding the canonical `model<N>.glb` files used by the direct retry.
    pub fallback_base_path: String,
    /// Applied to models loaded from the requested asset.
    pub primary_normalization: NormalizeStrategy,
    /// Applied to models recovered through the direct retry.
    pub retry_normalization: NormalizeStrategy,
    /// Shadow casting and receiving for loaded meshes. Off for performance.
    pub shadows: bool,
    /// Base colour for materials that do not define one.
    pub neutral_color: [f32; 4],
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            asset_root: ".".to_string(),
            fallback_base_path: "assets".to_string(),
            primary_normalization: NormalizeStrategy::PRIMARY_VIEWER,
            retry_normalization: NormalizeStrategy::DIRECT_RETRY,
            shadows: false,
            neutral_color: [0.5, 0.5, 0.5, 1.0],
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid viewer configuration")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn loader(&self) -> GltfLoader {
        GltfLoader::new(&self.asset_root)
    }

    pub fn fallback_resolver(&self) -> FallbackResolver {
        FallbackResolver::new(&self.fallback_base_path, self.retry_normalization)
    }
}
