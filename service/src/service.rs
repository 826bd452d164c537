use std::{fs, io, path::Path, sync::Arc};

use architectures::InferenceGraph;
use inference::{Pipeline, PredictionResult};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::{
    Result, ServiceErr,
    config::ServiceConfig,
    file_store::FileStore,
    store::{NewPrediction, Page, PredictionStore},
};

/// An upload that was classified and kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classified {
    pub image_reference: String,
    pub label: String,
    pub confidence: f32,
}

/// Ties the shared frozen graph to the file and record stores.
#[derive(Debug)]
pub struct PredictionService<S: PredictionStore> {
    pipeline: Pipeline,
    files: FileStore,
    store: S,
}

impl<S: PredictionStore> PredictionService<S> {
    /// Brings the service up.
    ///
    /// The graph is built, the fine-tuned checkpoint is loaded into it and the result is frozen
    /// and shared. Any failure is fatal, nothing is served from a partially loaded graph.
    ///
    /// # Arguments
    /// * `config` - The service configuration.
    /// * `store` - Where prediction records go.
    ///
    /// # Returns
    /// The ready service or the first startup error.
    pub fn start(config: &ServiceConfig, store: S) -> Result<Self> {
        config.validate()?;

        let spec = config.spec();
        let mut graph = config.adapter()?.build(&spec)?;

        let checkpoint = config
            .checkpoint
            .as_ref()
            .ok_or_else(|| ServiceErr::Config("a checkpoint is required to serve".into()))?;
        graph.load_checkpoint(checkpoint)?;
        info!("loaded fine-tuned checkpoint {}", checkpoint.display());

        let graph = Arc::new(graph.freeze());
        let pipeline = Pipeline::new(graph, config.labels.clone())
            .map_err(|e| ServiceErr::Config(e.to_string()))?;
        let files = FileStore::new(&config.upload_dir, &config.allowed_extensions).map_err(|e| {
            ServiceErr::Config(format!(
                "unusable upload folder {}: {e}",
                config.upload_dir.display()
            ))
        })?;

        info!("serving {spec}");
        Ok(Self {
            pipeline,
            files,
            store,
        })
    }

    pub fn graph(&self) -> &Arc<InferenceGraph> {
        self.pipeline.graph()
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Classifies an encoded image.
    pub fn predict(&self, bytes: &[u8]) -> Result<PredictionResult> {
        self.pipeline.predict(bytes).map_err(|e| {
            error!("prediction failed: {e}");
            ServiceErr::Prediction(e)
        })
    }

    /// Classifies an image already kept in the file store.
    pub fn predict_reference(&self, reference: &str) -> Result<PredictionResult> {
        let bytes = self.files.read(reference)?;
        self.predict(&bytes)
    }

    /// Classifies an image on the local filesystem.
    pub fn predict_path(&self, path: impl AsRef<Path>) -> Result<PredictionResult> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            error!("cannot read {}: {e}", path.display());
            match e.kind() {
                io::ErrorKind::NotFound => ServiceErr::FileNotFound(path.display().to_string()),
                _ => ServiceErr::Storage(e),
            }
        })?;

        self.predict(&bytes)
    }

    /// Classifies an upload and keeps it in the file store.
    ///
    /// The file is only written once the image was classified, so undecodable uploads leave
    /// nothing behind.
    ///
    /// # Arguments
    /// * `filename` - The client's name for the file, used for its extension.
    /// * `bytes` - The encoded image.
    ///
    /// # Returns
    /// The reference of the kept file together with the decision.
    pub fn upload(&self, filename: &str, bytes: &[u8]) -> Result<Classified> {
        if !self.files.allowed(filename) {
            return Err(ServiceErr::FileTypeNotAllowed(filename.to_string()));
        }

        let result = self.predict(bytes)?;
        let image_reference = self.files.save(filename, bytes)?;

        Ok(Classified {
            image_reference,
            label: result.label,
            confidence: result.confidence,
        })
    }

    /// Persists a prediction a user chose to keep.
    ///
    /// # Returns
    /// The id of the new record.
    pub fn save(&self, prediction: NewPrediction) -> Result<u64> {
        self.store.save(prediction).inspect_err(|e| {
            error!("saving prediction failed: {e}");
        })
    }

    /// Reads page `page` (1-based) of a user's history, newest first.
    pub fn history(&self, user_id: Option<u64>, page: usize, limit: usize) -> Result<Page> {
        Page::fetch(&self.store, user_id, page, limit)
    }
}
