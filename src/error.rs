//! Recoverable load failures.
//!
//! Neither variant reaches the caller of a load: both are handed to the
//! fallback chain, which always produces a displayable model. Customization
//! mismatches (unknown parameters, values or node names) are not errors at all
//! and are reported through [`crate::customization::RuleOutcome`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    /// The loader reported a network, filesystem or parse error.
    #[error("asset {reference} is unavailable: {reason}")]
    AssetUnavailable { reference: String, reason: String },

    /// The asset parsed but contains no scene graph.
    #[error("asset {reference} contains no displayable scene")]
    EmptyAsset { reference: String },
}

impl LoadError {
    pub fn unavailable(reference: &str, error: &anyhow::Error) -> Self {
        LoadError::AssetUnavailable {
            reference: reference.to_string(),
            reason: format!("{error:#}"),
        }
    }

    pub fn empty(reference: &str) -> Self {
        LoadError::EmptyAsset {
            reference: reference.to_string(),
        }
    }

    pub fn reference(&self) -> &str {
        match self {
            LoadError::AssetUnavailable { reference, .. } => reference,
            LoadError::EmptyAsset { reference } => reference,
        }
    }
}
