mod efficientnet;
mod inception;
mod mobilenet;
mod resnet;

use nn::{
    Feature, Layer, Param, Sequential,
    arch::{
        Module,
        activations::ActFn,
        layers::{BatchNorm2d, Conv2d, GlobalAvgPool, Residual, Scale},
    },
    init::Initializer,
    params::scoped,
};

pub use efficientnet::efficientnet_v2_s;
pub use inception::inception_v3;
pub use mobilenet::{mobilenet_v2, mobilenet_v3_small};
pub use resnet::{resnet18, resnet34, resnet50};

/// A classification network laid out the way it was pretrained, head still sized for the
/// pretraining classes.
#[derive(Debug, Clone)]
pub struct Network {
    pub(crate) stages: Sequential,
    /// The child of `stages` that produces the logits.
    pub(crate) head: &'static str,
    pub(crate) aux: Vec<AuxBranch>,
}

/// A side classifier fed from an intermediate stage.
#[derive(Debug, Clone)]
pub struct AuxBranch {
    pub(crate) name: &'static str,
    /// The child of the main stages whose output feeds this branch.
    pub(crate) after: &'static str,
    pub(crate) body: Sequential,
    /// The child of `body` that produces the logits.
    pub(crate) head: &'static str,
}

impl Network {
    pub(crate) fn new(stages: Sequential, head: &'static str) -> Self {
        Self {
            stages,
            head,
            aux: Vec::new(),
        }
    }

    pub(crate) fn with_aux(mut self, aux: AuxBranch) -> Self {
        self.aux.push(aux);
        self
    }

    /// Makes a forward pass through the stages, evaluating every auxiliary branch on the
    /// output of the stage it taps.
    ///
    /// # Returns
    /// The primary logits followed by one output per auxiliary branch.
    pub(crate) fn forward(&self, x: Feature) -> nn::Result<(Feature, Vec<Feature>)> {
        let mut aux_outputs = Vec::with_capacity(self.aux.len());
        let mut x = x;

        for (name, layer) in self.stages.layers() {
            x = layer.forward(x)?;

            for aux in self.aux.iter().filter(|aux| aux.after == name) {
                aux_outputs.push(aux.body.forward(x.clone())?);
            }
        }

        Ok((x, aux_outputs))
    }
}

impl Module for Network {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        self.stages.visit(prefix, f);
        for aux in &self.aux {
            aux.body.visit(&scoped(prefix, aux.name), f);
        }
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        self.stages.visit_mut(prefix, f);
        for aux in &mut self.aux {
            aux.body.visit_mut(&scoped(prefix, aux.name), f);
        }
    }

    fn reset_parameters(&mut self, init: &Initializer) -> nn::Result<()> {
        self.stages.reset_parameters(init)?;
        for aux in &mut self.aux {
            aux.body.reset_parameters(init)?;
        }
        Ok(())
    }
}

/// `conv -> bn -> act` as positional children, the usual mobile building block.
fn conv_bn_act(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    groups: usize,
    act: Option<ActFn>,
    bn_eps: f32,
) -> Sequential {
    let conv = Conv2d::new(in_channels, out_channels, kernel)
        .with_stride(stride)
        .with_padding((kernel - 1) / 2)
        .with_groups(groups);

    let mut block = Sequential::new([
        Layer::from(conv),
        Layer::from(BatchNorm2d::new(out_channels).with_eps(bn_eps)),
    ]);
    if let Some(act) = act {
        block.push(act);
    }
    block
}

/// Wraps `body` in a skip connection when input and output line up.
fn maybe_residual(
    body: Sequential,
    stride: usize,
    in_channels: usize,
    out_channels: usize,
) -> Layer {
    if stride == 1 && in_channels == out_channels {
        Layer::from(Residual::new(body))
    } else {
        Layer::from(body)
    }
}

/// Squeeze and excitation, `channels -> squeezed -> channels` through biased 1x1 convs.
fn squeeze_excite(channels: usize, squeezed: usize, act: ActFn, gate: ActFn) -> Scale {
    Scale::new(
        Sequential::default()
            .with("avgpool", GlobalAvgPool)
            .with("fc1", Conv2d::new(channels, squeezed, 1).with_bias())
            .with("act", act)
            .with("fc2", Conv2d::new(squeezed, channels, 1).with_bias())
            .with("gate", gate),
    )
}
