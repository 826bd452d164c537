use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Names an architecture and the pretrained parameters to start from.
///
/// Both fields are matched case-insensitively against the catalog, `weights_id` may be a
/// registered id (`IMAGENET1K_V1`), `DEFAULT` or `none` for a randomly initialized backbone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchitectureSpec {
    pub name: String,
    pub weights_id: String,
}

impl ArchitectureSpec {
    pub fn new(name: impl Into<String>, weights_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weights_id: weights_id.into(),
        }
    }
}

impl Display for ArchitectureSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.weights_id)
    }
}

/// Which parameters stay trainable after adaptation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainMode {
    /// Only the new heads train, the feature extractor is frozen.
    #[default]
    FrozenBackbone,
    FullTune,
}

/// The replacement for a sequential classifier block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadStyle {
    /// `Dropout(p) -> SELU -> Linear(in_features, 1)`.
    #[default]
    Regularized,
    /// A single `Linear(in_features, 1)`.
    Minimal,
}

/// Whether the primary head squashes its logit before returning it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadActivation {
    #[default]
    None,
    Sigmoid,
}
