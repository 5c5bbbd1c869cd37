//! Recovery for assets that fail to load.
//!
//! The chain is linear and never backtracks:
//!
//! 1. **Direct retry**: if the file name embeds a model number
//!    (`model<N>.glb`), the canonical `<base>/model<N>.glb` is loaded instead.
//! 2. **Procedural placeholder**: a primitive shaped after the product
//!    category guessed from the reference. Building it cannot fail.
//!
//! A broken or missing asset therefore always leaves something representative
//! in the viewer.

use std::f32::consts::FRAC_PI_2;

use cgmath::Rotation3;

use crate::{
    data_structures::{
        model::{Material, Mesh},
        scene_graph::SceneNode,
        transform::Transform,
    },
    error::LoadError,
    normalize::{Normalization, NormalizeStrategy},
    resources::{AssetLoader, LoadProgress, animation::AnimationClip, mesh},
};

/// Product category guessed from an asset reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Archetype {
    Connector,
    Cable,
    Generic,
}

impl Archetype {
    /// Case-insensitive substring match; "connector" wins over "cable".
    pub fn classify(reference: &str) -> Self {
        let reference = reference.to_ascii_lowercase();
        if reference.contains("connector") {
            Archetype::Connector
        } else if reference.contains("cable") {
            Archetype::Cable
        } else {
            Archetype::Generic
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Archetype::Connector => "connector",
            Archetype::Cable => "cable",
            Archetype::Generic => "generic",
        }
    }
}

/// Where the displayed model came from.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelSource {
    /// The requested asset itself.
    Asset,
    /// The canonical fallback path of the requested model number.
    DirectRetry(String),
    Placeholder(Archetype),
}

/// A model produced by the fallback chain, ready to be attached.
#[derive(Debug)]
pub struct Recovered {
    pub root: SceneNode,
    pub animations: Vec<AnimationClip>,
    pub source: ModelSource,
    /// `None` for placeholders, which are built at display size.
    pub normalization: Option<Normalization>,
}

/**
 * The digits of a `model<N>.glb` file name.
 *
 * Only the last path segment is inspected and the digits are returned as
 * written, so `assets/model007.glb` yields `"007"`.
 */
pub fn model_number(reference: &str) -> Option<&str> {
    let file_name = reference.rsplit(['/', '\\']).next().unwrap_or(reference);
    let file_name = file_name.split(['?', '#']).next().unwrap_or(file_name);
    let mut search = file_name;
    while let Some(pos) = search.find("model") {
        let rest = &search[pos + "model".len()..];
        let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 && rest[digits..].eq_ignore_ascii_case(".glb") {
            return Some(&rest[..digits]);
        }
        search = rest;
    }
    None
}

#[derive(Clone, Debug)]
pub struct FallbackResolver {
    base_path: String,
    retry_normalization: NormalizeStrategy,
}

impl FallbackResolver {
    pub fn new(base_path: &str, retry_normalization: NormalizeStrategy) -> Self {
        Self {
            base_path: base_path.trim_end_matches('/').to_string(),
            retry_normalization,
        }
    }

    /// `<base>/model<N>.glb` for references that carry a model number.
    pub fn canonical_path(&self, reference: &str) -> Option<String> {
        let number = model_number(reference)?;
        if self.base_path.is_empty() {
            Some(format!("model{number}.glb"))
        } else {
            Some(format!("{}/model{number}.glb", self.base_path))
        }
    }

    /**
     * Runs the chain for `reference`, which failed with `error`.
     *
     * Never fails: the placeholder step is unconditional.
     */
    pub async fn resolve(
        &self,
        loader: &dyn AssetLoader,
        reference: &str,
        error: &LoadError,
    ) -> Recovered {
        log::warn!("{error}; trying fallbacks");
        if let Some(path) = self.canonical_path(reference) {
            match self.direct_retry(loader, &path).await {
                Ok(recovered) => return recovered,
                Err(retry_error) => log::warn!("{retry_error}"),
            }
        }
        let archetype = Archetype::classify(reference);
        log::info!(
            "showing {} placeholder for {}",
            archetype.name(),
            reference
        );
        Recovered {
            root: placeholder(archetype),
            animations: Vec::new(),
            source: ModelSource::Placeholder(archetype),
            normalization: None,
        }
    }

    async fn direct_retry(
        &self,
        loader: &dyn AssetLoader,
        path: &str,
    ) -> Result<Recovered, LoadError> {
        log::info!("retrying with canonical path {path}");
        let parsed = loader
            .load(path, &mut |_: LoadProgress| {})
            .await
            .map_err(|e| LoadError::unavailable(path, &e))?;
        let mut root = parsed.scene.ok_or_else(|| LoadError::empty(path))?;
        root.transform.reset_rotation();
        let normalization = self.retry_normalization.normalize(&mut root);
        Ok(Recovered {
            root,
            animations: parsed.animations,
            source: ModelSource::DirectRetry(path.to_string()),
            normalization: Some(normalization),
        })
    }
}

/// A primitive stand-in for `archetype`, sized for the default camera.
pub fn placeholder(archetype: Archetype) -> SceneNode {
    let (geometry, material, transform) = match archetype {
        Archetype::Connector => (
            mesh::cylinder("placeholder_connector", 0.5, 1.5, 32),
            Material::standard("placeholder_connector", [0.75, 0.75, 0.78, 1.0], 0.8, 0.3),
            Transform::default(),
        ),
        Archetype::Cable => (
            mesh::cylinder("placeholder_cable", 0.1, 3.0, 16),
            Material::standard("placeholder_cable", [0.1, 0.1, 0.1, 1.0], 0.0, 0.8),
            // lying along the x axis
            Transform {
                rotation: cgmath::Quaternion::from_angle_z(cgmath::Rad(FRAC_PI_2)),
                ..Default::default()
            },
        ),
        Archetype::Generic => (
            mesh::cube("placeholder_generic", 1.0),
            Material::standard("placeholder_generic", [0.53, 0.53, 0.53, 1.0], 0.1, 0.7),
            Transform::default(),
        ),
    };
    let mut mesh = Mesh::new(geometry, material);
    mesh.cast_shadow = false;
    mesh.receive_shadow = false;
    SceneNode::group(&format!("placeholder_{}", archetype.name()))
        .with_child(SceneNode::mesh("placeholder_mesh", mesh).with_transform(transform))
}
