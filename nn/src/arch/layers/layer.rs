use super::{
    AvgPool2d, BatchNorm2d, ChannelAffine, Concat, Conv2d, Dropout, Flatten, GlobalAvgPool, Linear,
    MaxPool2d, Residual, Scale,
};
use crate::{
    Feature, Param, Result,
    arch::{Module, Sequential, activations::ActFn},
    init::Initializer,
};

/// Every building block a graph can be assembled from.
#[derive(Debug, Clone)]
pub enum Layer {
    Conv2d(Conv2d),
    BatchNorm2d(BatchNorm2d),
    Linear(Linear),
    Act(ActFn),
    MaxPool2d(MaxPool2d),
    AvgPool2d(AvgPool2d),
    GlobalAvgPool(GlobalAvgPool),
    Flatten(Flatten),
    Dropout(Dropout),
    Residual(Residual),
    Concat(Concat),
    Scale(Scale),
    Affine(ChannelAffine),
    Sequential(Sequential),
}

impl Layer {
    pub fn conv(in_channels: usize, out_channels: usize, kernel: usize) -> Self {
        Self::Conv2d(Conv2d::new(in_channels, out_channels, kernel))
    }

    pub fn batch_norm(channels: usize) -> Self {
        Self::BatchNorm2d(BatchNorm2d::new(channels))
    }

    pub fn linear(in_features: usize, out_features: usize) -> Self {
        Self::Linear(Linear::new(in_features, out_features))
    }

    pub fn dropout(p: f32) -> Self {
        Self::Dropout(Dropout::new(p))
    }

    /// Makes a forward pass through the layer.
    ///
    /// # Arguments
    /// * `x` - The input feature.
    ///
    /// # Returns
    /// The output feature or an error if the input does not fit the layer.
    pub fn forward(&self, x: Feature) -> Result<Feature> {
        match self {
            Self::Conv2d(l) => l.forward(x),
            Self::BatchNorm2d(l) => l.forward(x),
            Self::Linear(l) => l.forward(x),
            Self::Act(act_fn) => Ok(act_fn.forward(x)),
            Self::MaxPool2d(l) => l.forward(x),
            Self::AvgPool2d(l) => l.forward(x),
            Self::GlobalAvgPool(l) => l.forward(x),
            Self::Flatten(l) => l.forward(x),
            Self::Dropout(l) => Ok(l.forward(x)),
            Self::Residual(l) => l.forward(x),
            Self::Concat(l) => l.forward(x),
            Self::Scale(l) => l.forward(x),
            Self::Affine(l) => l.forward(x),
            Self::Sequential(l) => l.forward(x),
        }
    }

    fn module(&self) -> Option<&dyn Module> {
        match self {
            Self::Conv2d(l) => Some(l),
            Self::BatchNorm2d(l) => Some(l),
            Self::Linear(l) => Some(l),
            Self::Residual(l) => Some(l),
            Self::Concat(l) => Some(l),
            Self::Scale(l) => Some(l),
            Self::Sequential(l) => Some(l),
            Self::Act(_)
            | Self::MaxPool2d(_)
            | Self::AvgPool2d(_)
            | Self::GlobalAvgPool(_)
            | Self::Flatten(_)
            | Self::Dropout(_)
            | Self::Affine(_) => None,
        }
    }

    fn module_mut(&mut self) -> Option<&mut dyn Module> {
        match self {
            Self::Conv2d(l) => Some(l),
            Self::BatchNorm2d(l) => Some(l),
            Self::Linear(l) => Some(l),
            Self::Residual(l) => Some(l),
            Self::Concat(l) => Some(l),
            Self::Scale(l) => Some(l),
            Self::Sequential(l) => Some(l),
            Self::Act(_)
            | Self::MaxPool2d(_)
            | Self::AvgPool2d(_)
            | Self::GlobalAvgPool(_)
            | Self::Flatten(_)
            | Self::Dropout(_)
            | Self::Affine(_) => None,
        }
    }
}

impl Module for Layer {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        if let Some(module) = self.module() {
            module.visit(prefix, f);
        }
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        if let Some(module) = self.module_mut() {
            module.visit_mut(prefix, f);
        }
    }

    fn reset_parameters(&mut self, init: &Initializer) -> Result<()> {
        match self.module_mut() {
            Some(module) => module.reset_parameters(init),
            None => Ok(()),
        }
    }
}

macro_rules! impl_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<super::$variant> for Layer {
                fn from(value: super::$variant) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    Conv2d,
    BatchNorm2d,
    Linear,
    MaxPool2d,
    AvgPool2d,
    GlobalAvgPool,
    Flatten,
    Dropout,
    Residual,
    Concat,
    Scale,
);

impl From<ChannelAffine> for Layer {
    fn from(value: ChannelAffine) -> Self {
        Self::Affine(value)
    }
}

impl From<Sequential> for Layer {
    fn from(value: Sequential) -> Self {
        Self::Sequential(value)
    }
}

impl From<ActFn> for Layer {
    fn from(value: ActFn) -> Self {
        Self::Act(value)
    }
}
