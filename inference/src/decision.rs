use serde::{Deserialize, Serialize};

use crate::{InferErr, Result};

/// The names of the two classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    /// Reported when the probability is below one half.
    pub negative: String,
    pub positive: String,
}

impl Labels {
    pub fn new(negative: impl Into<String>, positive: impl Into<String>) -> Self {
        Self {
            negative: negative.into(),
            positive: positive.into(),
        }
    }

    /// Checks both labels are non-empty and distinct.
    pub fn problem(&self) -> Option<&'static str> {
        if self.negative.trim().is_empty() || self.positive.trim().is_empty() {
            return Some("labels must not be empty");
        }
        if self.negative == self.positive {
            return Some("labels must be distinct");
        }
        None
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self::new("Healthy", "Infected")
    }
}

/// The largest `f32` below one, the most a confidence can reach.
pub const MAX_CONFIDENCE: f32 = f32::from_bits(0x3F7F_FFFF);

/// A label and how sure the classifier is about it, always in `[0.5, MAX_CONFIDENCE]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: String,
    pub confidence: f32,
}

fn result(label: &str, confidence: f64) -> PredictionResult {
    PredictionResult {
        label: label.to_string(),
        confidence: (confidence as f32).min(MAX_CONFIDENCE),
    }
}

/// Decides from the probability of the positive class.
///
/// # Arguments
/// * `p` - The probability, clamped to `[0, 1]`.
/// * `labels` - The class names.
///
/// # Returns
/// The negative label with confidence `1 - p` when `p < 0.5`, the positive one with `p`
/// otherwise, or `NonFiniteOutput` if `p` is not a number.
pub fn decide_probability(p: f32, labels: &Labels) -> Result<PredictionResult> {
    if !p.is_finite() {
        return Err(InferErr::NonFiniteOutput(p));
    }

    let p = f64::from(p.clamp(0., 1.));
    Ok(if p < 0.5 {
        result(&labels.negative, 1. - p)
    } else {
        result(&labels.positive, p)
    })
}

/// Decides from the raw logit of the positive class, `p = sigmoid(logit)`.
///
/// The confidence is the sigmoid of `|logit|` taken in `f64`, so opposite logits get the
/// same confidence and large ones stay below one.
pub fn decide(logit: f32, labels: &Labels) -> Result<PredictionResult> {
    if !logit.is_finite() {
        return Err(InferErr::NonFiniteOutput(logit));
    }

    let confidence = 1. / (1. + (-f64::from(logit).abs()).exp());
    let label = if logit < 0. {
        &labels.negative
    } else {
        &labels.positive
    };

    Ok(result(label, confidence))
}
