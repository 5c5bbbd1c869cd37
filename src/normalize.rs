//! Model normalization.
//!
//! Assets come in arbitrary units and with arbitrary pivots. Normalizing a
//! model derives a uniform scale from its bounding box and a translation that
//! moves the scaled box center onto the world origin, then writes both into
//! the root transform. Geometry data is never touched.
//!
//! Two scale policies exist and are kept apart on purpose: the viewer sizes
//! models by their largest extent, while volume-based sizing keeps long thin
//! parts from shrinking to nothing.

use cgmath::{EuclideanSpace, InnerSpace, Vector3};
use serde::Deserialize;

use crate::data_structures::{bounds::BoundingBox, scene_graph::SceneNode};

/// Residual center offset (in world units) tolerated before a recenter pass corrects it.
const RECENTER_TOLERANCE: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum NormalizePolicy {
    /// `scale = target_span / max(size.x, size.y, size.z)`
    MaxDimension { target_span: f32 },
    /// `scale = cbrt(target_volume / (size.x * size.y * size.z))`
    Volume { target_volume: f32 },
}

impl NormalizePolicy {
    /// Uniform scale for `bounds`. Degenerate boxes keep their size (scale 1).
    pub fn scale_for(&self, bounds: &BoundingBox) -> f32 {
        let scale = match *self {
            NormalizePolicy::MaxDimension { target_span } => {
                let max_dim = bounds.max_dimension();
                if !(max_dim > 0.0) {
                    return 1.0;
                }
                target_span / max_dim
            }
            NormalizePolicy::Volume { target_volume } => {
                let volume = bounds.volume();
                if !(volume > 0.0) {
                    return 1.0;
                }
                (target_volume / volume).cbrt()
            }
        };
        if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        }
    }
}

/// A scale policy plus whether the result is re-measured and re-centered.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct NormalizeStrategy {
    #[serde(flatten)]
    pub policy: NormalizePolicy,
    #[serde(default)]
    pub recenter_check: bool,
}

impl NormalizeStrategy {
    /// Models loaded straight from the requested asset.
    pub const PRIMARY_VIEWER: Self = Self {
        policy: NormalizePolicy::MaxDimension { target_span: 6.0 },
        recenter_check: false,
    };

    /// Models recovered from the canonical fallback path.
    pub const DIRECT_RETRY: Self = Self {
        policy: NormalizePolicy::MaxDimension { target_span: 2.0 },
        recenter_check: true,
    };

    pub fn max_dimension(target_span: f32) -> Self {
        Self {
            policy: NormalizePolicy::MaxDimension { target_span },
            recenter_check: false,
        }
    }

    pub fn volume(target_volume: f32) -> Self {
        Self {
            policy: NormalizePolicy::Volume { target_volume },
            recenter_check: false,
        }
    }

    pub fn normalize(&self, root: &mut SceneNode) -> Normalization {
        normalize(root, self)
    }
}

/// What a normalization pass wrote into the root transform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Normalization {
    pub scale: f32,
    pub translation: Vector3<f32>,
}

/**
 * Scales and centers `root` in place.
 *
 * The subtree is measured in the root's rotated frame, ignoring the root's
 * current scale and position, so the result does not depend on earlier
 * normalization passes. After the pass the world bounding box is centered on
 * the origin and its size follows the strategy's policy.
 */
pub fn normalize(root: &mut SceneNode, strategy: &NormalizeStrategy) -> Normalization {
    let frame = root.transform.rotation_matrix();
    let bounds = root.bounds_with_own_matrix(&frame);
    let scale = strategy.policy.scale_for(&bounds);
    let mut translation = -bounds.center().to_vec() * scale;

    root.transform.set_uniform_scale(scale);
    root.transform.position = translation;

    if strategy.recenter_check {
        let residual = root.bounding_box().center().to_vec();
        if residual.magnitude() > RECENTER_TOLERANCE {
            log::debug!(
                "recentering {} by {:?} after normalization",
                root.name,
                residual
            );
            translation -= residual;
            root.transform.position = translation;
        }
    }

    log::debug!(
        "normalized {} with scale {} and translation {:?}",
        root.name,
        scale,
        translation
    );
    Normalization { scale, translation }
}
