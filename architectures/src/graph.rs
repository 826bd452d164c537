use std::path::Path;

use log::{info, warn};
use ndarray::{Array2, Ix2};
use nn::{
    Device, Layer, Module, Param, StateDict, Tensor, arch::layers::Linear, init::Initializer,
};

use crate::{
    AdaptErr, Result,
    catalog::Family,
    families::Network,
    head::last_linear,
    preprocess::PreprocessSpec,
    spec::{ArchitectureSpec, HeadActivation, TrainMode},
};

const ARCHITECTURE_KEY: &str = "architecture";

/// A feature extractor with binary heads, still open to parameter updates.
#[derive(Debug, Clone)]
pub struct ClassificationGraph {
    family: Family,
    spec: ArchitectureSpec,
    network: Network,
    device: Device,
    preprocess: PreprocessSpec,
    head_activation: HeadActivation,
    train_mode: TrainMode,
}

impl ClassificationGraph {
    pub(crate) fn new(
        family: Family,
        spec: ArchitectureSpec,
        network: Network,
        device: Device,
        preprocess: PreprocessSpec,
        head_activation: HeadActivation,
    ) -> Self {
        Self {
            family,
            spec,
            network,
            device,
            preprocess,
            head_activation,
            train_mode: TrainMode::FullTune,
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn spec(&self) -> &ArchitectureSpec {
        &self.spec
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn preprocess(&self) -> PreprocessSpec {
        self.preprocess
    }

    pub fn head_activation(&self) -> HeadActivation {
        self.head_activation
    }

    pub fn train_mode(&self) -> TrainMode {
        self.train_mode
    }

    /// The primary head, a linear layer or the block that replaced the classifier.
    pub fn head(&self) -> Option<&Layer> {
        self.network.stages.get(self.network.head)
    }

    /// The linear layer producing the primary logit.
    pub fn head_linear(&self) -> Option<&Linear> {
        self.head().and_then(last_linear)
    }

    /// The linear layers producing the auxiliary logits, one per auxiliary branch.
    pub fn aux_heads(&self) -> Vec<&Linear> {
        self.network
            .aux
            .iter()
            .filter_map(|aux| aux.body.get(aux.head).and_then(last_linear))
            .collect()
    }

    /// Full names of every parameter currently flagged as trainable.
    pub fn trainable_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit("", &mut |name, param| {
            if param.is_trainable() {
                names.push(name.to_string());
            }
        });
        names
    }

    /// Flags which parameters are trainable.
    ///
    /// # Arguments
    /// * `mode` - `FrozenBackbone` leaves only the heads trainable, `FullTune` everything.
    pub fn set_train_mode(&mut self, mode: TrainMode) {
        self.train_mode = mode;

        match mode {
            TrainMode::FullTune => self.network.set_trainable(true),
            TrainMode::FrozenBackbone => {
                self.network.set_trainable(false);

                let head = self.network.head;
                if let Some(head) = self.network.stages.get_mut(head) {
                    head.set_trainable(true);
                }
                for aux in &mut self.network.aux {
                    if let Some(head) = aux.body.get_mut(aux.head) {
                        head.set_trainable(true);
                    }
                }
            }
        }
    }

    /// Snapshots every parameter and buffer, tagged with the architecture name.
    pub fn state_dict(&self) -> StateDict {
        StateDict::from_module(&self.network).with_metadata(ARCHITECTURE_KEY, self.family.name())
    }

    /// Loads a fine-tuned state strictly, every entry must match a parameter of this graph.
    ///
    /// # Errors
    /// `CheckpointShapeMismatch` if entries are missing, unexpected or mis-shaped, in which
    /// case the graph is left untouched.
    pub fn load_state(&mut self, state: &StateDict) -> Result<()> {
        if let Some(architecture) = state.metadata(ARCHITECTURE_KEY)
            && architecture != self.family.name()
        {
            warn!(
                "checkpoint was saved from {architecture}, loading it into {}",
                self.family
            );
        }

        state.load_into(&mut self.network).map_err(AdaptErr::from_load)
    }

    /// Reads and strictly loads a checkpoint file.
    pub fn load_checkpoint(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let state = StateDict::read(path).map_err(AdaptErr::from_load)?;
        self.load_state(&state)?;

        info!(entries = state.len(); "loaded checkpoint {}", path.display());
        Ok(())
    }

    /// Writes the graph's state in the layout `load_checkpoint` reads.
    pub fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        Ok(self.state_dict().write(path)?)
    }

    /// Switches to evaluation mode for good.
    ///
    /// # Returns
    /// A read-only graph that can be shared between threads.
    pub fn freeze(self) -> InferenceGraph {
        info!(
            params = self.network.num_params();
            "froze {} graph", self.family
        );

        InferenceGraph {
            family: self.family,
            spec: self.spec,
            network: self.network,
            device: self.device,
            preprocess: self.preprocess,
            head_activation: self.head_activation,
        }
    }
}

impl Module for ClassificationGraph {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        self.network.visit(prefix, f);
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        self.network.visit_mut(prefix, f);
    }

    fn reset_parameters(&mut self, init: &Initializer) -> nn::Result<()> {
        self.network.reset_parameters(init)
    }
}

/// What a forward pass produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Outputs {
    /// The `(N, 1)` primary output, a logit or a probability per the head activation.
    pub primary: Array2<f32>,
    /// One `(N, 1)` logit per auxiliary branch, named after the branch.
    pub auxiliary: Vec<(&'static str, Array2<f32>)>,
}

/// A frozen graph in evaluation mode.
///
/// Has no mutable access to its parameters: the only way to get one is
/// `ClassificationGraph::freeze` and the only thing it does is forward passes.
#[derive(Debug)]
pub struct InferenceGraph {
    family: Family,
    spec: ArchitectureSpec,
    network: Network,
    device: Device,
    preprocess: PreprocessSpec,
    head_activation: HeadActivation,
}

impl InferenceGraph {
    pub fn family(&self) -> Family {
        self.family
    }

    pub fn spec(&self) -> &ArchitectureSpec {
        &self.spec
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// The preprocessing inputs must go through, paired with the parameters.
    pub fn preprocess(&self) -> PreprocessSpec {
        self.preprocess
    }

    /// Whether `Outputs::primary` is already a probability.
    pub fn head_activation(&self) -> HeadActivation {
        self.head_activation
    }

    pub fn num_params(&self) -> usize {
        self.network.num_params()
    }

    pub fn state_dict(&self) -> StateDict {
        StateDict::from_module(&self.network).with_metadata(ARCHITECTURE_KEY, self.family.name())
    }

    /// Makes a forward pass.
    ///
    /// # Arguments
    /// * `input` - A `(N, 3, H, W)` batch living on this graph's device.
    ///
    /// # Returns
    /// The primary and auxiliary outputs, or an error if the input is on another device or
    /// does not fit the network.
    pub fn forward(&self, input: &Tensor) -> nn::Result<Outputs> {
        self.device.check(input.device())?;

        let (primary, auxiliary) = self.network.forward(input.data().clone().into_dyn())?;

        let auxiliary = self
            .network
            .aux
            .iter()
            .zip(auxiliary)
            .map(|(aux, y)| -> nn::Result<_> { Ok((aux.name, y.into_dimensionality::<Ix2>()?)) })
            .collect::<nn::Result<Vec<_>>>()?;

        Ok(Outputs {
            primary: primary.into_dimensionality::<Ix2>()?,
            auxiliary,
        })
    }
}
