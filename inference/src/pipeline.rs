use std::{fs, path::Path, sync::Arc};

use architectures::{HeadActivation, InferenceGraph};
use image::ImageError;
use log::debug;

use crate::{
    InferErr, Result,
    decision::{self, Labels, PredictionResult},
    preprocess::Preprocessor,
};

/// Turns images into decisions against a shared frozen graph.
///
/// Holds no mutable state: `predict` can be called from any number of threads at once and
/// gives the same answer for the same bytes.
#[derive(Debug, Clone)]
pub struct Pipeline {
    graph: Arc<InferenceGraph>,
    preprocessor: Preprocessor,
    labels: Labels,
}

impl Pipeline {
    /// Creates a new `Pipeline`.
    ///
    /// # Arguments
    /// * `graph` - The frozen graph, its preprocessing spec is used for every input.
    /// * `labels` - The class names.
    ///
    /// # Returns
    /// A new `Pipeline` or `InvalidPreprocess` if the graph's preprocessing is infeasible.
    pub fn new(graph: Arc<InferenceGraph>, labels: Labels) -> Result<Self> {
        let preprocessor = Preprocessor::new(graph.preprocess())?;

        Ok(Self {
            graph,
            preprocessor,
            labels,
        })
    }

    pub fn graph(&self) -> &Arc<InferenceGraph> {
        &self.graph
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Classifies an encoded image.
    ///
    /// # Arguments
    /// * `bytes` - The image as uploaded.
    ///
    /// # Returns
    /// The decision, or the first error of preprocessing, the forward pass or the decision.
    pub fn predict(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let tensor = self.preprocessor.prepare(bytes, self.graph.device())?;
        let outputs = self.graph.forward(&tensor)?;

        let value = outputs
            .primary
            .first()
            .copied()
            .ok_or(InferErr::NonFiniteOutput(f32::NAN))?;

        let result = match self.graph.head_activation() {
            HeadActivation::None => decision::decide(value, &self.labels)?,
            HeadActivation::Sigmoid => decision::decide_probability(value, &self.labels)?,
        };

        debug!(
            output = value, confidence = result.confidence;
            "classified image as {}", result.label
        );

        Ok(result)
    }

    /// Reads an image from disk and classifies it.
    pub fn predict_path(&self, path: impl AsRef<Path>) -> Result<PredictionResult> {
        let bytes = fs::read(path).map_err(ImageError::IoError)?;
        self.predict(&bytes)
    }
}
