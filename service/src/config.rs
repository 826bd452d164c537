use std::{env, fs, path::{Path, PathBuf}};

use architectures::{
    Adapter, ArchitectureSpec, HeadActivation, HeadStyle, PreprocessSpec, TrainMode,
};
use inference::Labels;
use log::info;
use nn::Device;
use serde::{Deserialize, Serialize};

use crate::{Result, ServiceErr};

/// Names the JSON file the configuration is read from.
pub const CONFIG_VAR: &str = "BINCLASS_CONFIG";
pub const UPLOAD_FOLDER_VAR: &str = "UPLOAD_FOLDER";
pub const DEVICE_VAR: &str = "BINCLASS_DEVICE";
pub const CHECKPOINT_VAR: &str = "BINCLASS_CHECKPOINT";

/// Everything needed to start the service.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub architecture: String,
    pub weights: String,
    /// Where `<family>-<weights id>.safetensors` pretrained files live.
    pub weights_dir: PathBuf,
    /// The fine-tuned parameters, required to serve.
    pub checkpoint: Option<PathBuf>,
    pub device: String,
    pub train_mode: TrainMode,
    pub head_style: HeadStyle,
    pub head_activation: HeadActivation,
    pub dropout: f32,
    pub seed: Option<u64>,
    pub labels: Labels,
    pub preprocess: Option<PreprocessSpec>,
    pub upload_dir: PathBuf,
    pub allowed_extensions: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            architecture: "inception_v3".into(),
            weights: "DEFAULT".into(),
            weights_dir: PathBuf::from("./weights"),
            checkpoint: None,
            device: "cpu".into(),
            train_mode: TrainMode::default(),
            head_style: HeadStyle::default(),
            head_activation: HeadActivation::default(),
            dropout: 0.2,
            seed: None,
            labels: Labels::default(),
            preprocess: None,
            upload_dir: PathBuf::from("./uploads"),
            allowed_extensions: ["png", "jpg", "jpeg"].map(String::from).to_vec(),
        }
    }
}

impl ServiceConfig {
    /// Reads a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - The JSON file.
    ///
    /// # Returns
    /// The configuration or a `Config` error if the file can't be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ServiceErr::Config(format!("cannot read '{}': {e}", path.display())))?;

        let config = serde_json::from_str(&content)?;
        info!("loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reads the configuration the process environment points at.
    ///
    /// The file named by `BINCLASS_CONFIG` is used if set, the defaults otherwise, and then
    /// `UPLOAD_FOLDER`, `BINCLASS_DEVICE` and `BINCLASS_CHECKPOINT` override their fields.
    pub fn from_env() -> Result<Self> {
        let config = match env::var(CONFIG_VAR) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };

        Ok(config.with_overrides(|key| env::var(key).ok()))
    }

    /// Applies the environment overrides.
    ///
    /// # Arguments
    /// * `var` - Looks up a variable, `None` when unset.
    pub fn with_overrides<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = var(UPLOAD_FOLDER_VAR) {
            self.upload_dir = dir.into();
        }
        if let Some(device) = var(DEVICE_VAR) {
            self.device = device;
        }
        if let Some(checkpoint) = var(CHECKPOINT_VAR) {
            self.checkpoint = Some(checkpoint.into());
        }
        self
    }

    /// Checks the configuration describes a feasible service.
    ///
    /// Whether the architecture, weights and device are supported is left to the adapter.
    pub fn validate(&self) -> Result<()> {
        if let Some(reason) = self.preprocess.as_ref().and_then(PreprocessSpec::problem) {
            return Err(ServiceErr::Config(reason.into()));
        }
        if let Some(reason) = self.labels.problem() {
            return Err(ServiceErr::Config(reason.into()));
        }
        if !(0. ..1.).contains(&self.dropout) {
            return Err(ServiceErr::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ServiceErr::Config("no file extension is allowed".into()));
        }

        self.parsed_device().map(|_| ())
    }

    pub fn spec(&self) -> ArchitectureSpec {
        ArchitectureSpec::new(&self.architecture, &self.weights)
    }

    /// Translates the configuration into an adapter.
    pub fn adapter(&self) -> Result<Adapter> {
        Ok(Adapter::new()
            .weights_dir(&self.weights_dir)
            .device(self.parsed_device()?)
            .train_mode(self.train_mode)
            .head_style(self.head_style)
            .dropout(self.dropout)
            .head_activation(self.head_activation)
            .preprocess(self.preprocess)
            .seed(self.seed))
    }

    fn parsed_device(&self) -> Result<Device> {
        self.device
            .parse()
            .map_err(|e| ServiceErr::Config(format!("{e}")))
    }
}
