use std::path::PathBuf;

use log::{info, warn};
use nn::{Device, Module, StateDict, init::Initializer};

use crate::{
    AdaptErr, Result,
    catalog::{Family, PRETRAINING_CLASSES, Weights},
    families::Network,
    graph::ClassificationGraph,
    head::{self, HeadConfig},
    preprocess::PreprocessSpec,
    spec::{ArchitectureSpec, HeadActivation, HeadStyle, TrainMode},
};

/// Builds binary `ClassificationGraph`s out of catalog architectures.
///
/// Resolution goes architecture, device, weights, head surgery and trainability, failing at
/// the first step that cannot be satisfied; nothing is read from disk before the
/// architecture and weights ids are known to be valid.
#[derive(Debug, Clone)]
pub struct Adapter {
    weights_dir: PathBuf,
    device: Device,
    train_mode: TrainMode,
    head: HeadConfig,
    preprocess: Option<PreprocessSpec>,
    seed: Option<u64>,
}

impl Default for Adapter {
    fn default() -> Self {
        Self {
            weights_dir: PathBuf::from("weights"),
            device: Device::Cpu,
            train_mode: TrainMode::default(),
            head: HeadConfig::default(),
            preprocess: None,
            seed: None,
        }
    }
}

impl Adapter {
    /// Creates a new `Adapter` with a frozen backbone, a regularized head and no sigmoid.
    pub fn new() -> Self {
        Self::default()
    }

    /// The directory holding `<family>-<weights id>.safetensors` pretrained parameters.
    pub fn weights_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.weights_dir = dir.into();
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn train_mode(mut self, mode: TrainMode) -> Self {
        self.train_mode = mode;
        self
    }

    pub fn head_style(mut self, style: HeadStyle) -> Self {
        self.head.style = style;
        self
    }

    pub fn dropout(mut self, p: f32) -> Self {
        self.head.dropout = p;
        self
    }

    pub fn head_activation(mut self, activation: HeadActivation) -> Self {
        self.head.activation = activation;
        self
    }

    /// Overrides the catalog preprocessing, for checkpoints fine-tuned at another resolution.
    pub fn preprocess(mut self, preprocess: Option<PreprocessSpec>) -> Self {
        self.preprocess = preprocess;
        self
    }

    /// Seeds the initialization of new heads and random backbones.
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Builds a binary graph following a spec.
    ///
    /// # Arguments
    /// * `spec` - The architecture and pretrained weights to start from.
    ///
    /// # Returns
    /// The adapted graph or the first resolution error.
    pub fn build(&self, spec: &ArchitectureSpec) -> Result<ClassificationGraph> {
        self.resolve_architecture(spec)
    }

    fn resolve_architecture(&self, spec: &ArchitectureSpec) -> Result<ClassificationGraph> {
        let family = Family::lookup(&spec.name)?;
        info!(
            "resolved architecture {family} with head shape {:?}",
            family.head_shape()
        );

        self.resolve_device(spec, family)
    }

    fn resolve_device(
        &self,
        spec: &ArchitectureSpec,
        family: Family,
    ) -> Result<ClassificationGraph> {
        let device = self.device.ensure_available()?;
        self.resolve_weights(spec, family, device)
    }

    fn resolve_weights(
        &self,
        spec: &ArchitectureSpec,
        family: Family,
        device: Device,
    ) -> Result<ClassificationGraph> {
        let weights = family.resolve_weights(&spec.weights_id)?;
        let init = Initializer::new(self.seed);
        let mut network = family.network(PRETRAINING_CLASSES);

        match weights {
            Weights::Random(_) => {
                warn!("no pretrained weights for {family}, the backbone is randomly initialized");
                network.reset_parameters(&init)?;
            }
            Weights::Pretrained(entry) => {
                let path = self.weights_dir.join(family.pretrained_file(&entry));
                if !path.is_file() {
                    return Err(AdaptErr::PretrainedUnavailable(path));
                }

                StateDict::read(&path)?.load_into(&mut network)?;
                info!("loaded {} pretrained weights from {}", entry.id, path.display());
            }
        }

        self.resolve_head(spec, family, device, weights, network, init)
    }

    fn resolve_head(
        &self,
        spec: &ArchitectureSpec,
        family: Family,
        device: Device,
        weights: Weights,
        mut network: Network,
        init: Initializer,
    ) -> Result<ClassificationGraph> {
        let surgery = head::replace_heads(
            &mut network,
            family.name(),
            family.head_shape(),
            &self.head,
            &init,
        )?;

        info!(
            in_features = surgery.in_features, aux_heads = surgery.aux_in_features.len();
            "replaced {family} head with a single output"
        );

        self.terminate_build(spec, family, device, weights, network)
    }

    fn terminate_build(
        &self,
        spec: &ArchitectureSpec,
        family: Family,
        device: Device,
        weights: Weights,
        network: Network,
    ) -> Result<ClassificationGraph> {
        let preprocess = match self.preprocess {
            Some(preprocess) => {
                info!(
                    "overriding {family} preprocessing to resize {} / crop {}",
                    preprocess.resize_dimension, preprocess.crop_dimension
                );
                preprocess
            }
            None => weights.preprocess(),
        };

        let mut graph = ClassificationGraph::new(
            family,
            spec.clone(),
            network,
            device,
            preprocess,
            self.head.activation,
        );
        graph.set_train_mode(self.train_mode);

        info!(
            params = graph.num_params(), trainable = graph.num_trainable();
            "built {family} on {device}"
        );

        Ok(graph)
    }
}
