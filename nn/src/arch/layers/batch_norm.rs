use ndarray::{Axis, Ix1, Ix4};

use crate::{Feature, NnErr, Param, Result, arch::Module, init::Initializer, params::scoped};

/// Batch normalization over the channel axis, evaluated with its running statistics.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    channels: usize,
    eps: f32,
    weight: Param,
    bias: Param,
    running_mean: Param,
    running_var: Param,
}

impl BatchNorm2d {
    /// Creates a new `BatchNorm2d` with the usual `eps = 1e-5`.
    ///
    /// # Arguments
    /// * `channels` - The channels of the normalized feature map.
    ///
    /// # Returns
    /// A new `BatchNorm2d` instance.
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            eps: 1e-5,
            weight: Param::learnable(&[channels]),
            bias: Param::learnable(&[channels]),
            running_mean: Param::buffer(&[channels], 0.),
            running_var: Param::buffer(&[channels], 1.),
        }
    }

    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    pub fn forward(&self, x: Feature) -> Result<Feature> {
        let mut x = x.into_dimensionality::<Ix4>()?;

        if x.dim().1 != self.channels {
            return Err(NnErr::SizeMismatch {
                what: "batch norm channels",
                got: x.dim().1,
                expected: self.channels,
            });
        }

        let gamma = self.weight.view::<Ix1>()?;
        let beta = self.bias.view::<Ix1>()?;
        let mean = self.running_mean.view::<Ix1>()?;
        let var = self.running_var.view::<Ix1>()?;

        for (c, mut channel) in x.axis_iter_mut(Axis(1)).enumerate() {
            let scale = gamma[c] / (var[c] + self.eps).sqrt();
            let shift = beta[c] - mean[c] * scale;
            channel.mapv_inplace(|v| v * scale + shift);
        }

        Ok(x.into_dyn())
    }
}

impl Module for BatchNorm2d {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        f(&scoped(prefix, "weight"), &self.weight);
        f(&scoped(prefix, "bias"), &self.bias);
        f(&scoped(prefix, "running_mean"), &self.running_mean);
        f(&scoped(prefix, "running_var"), &self.running_var);
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        f(&scoped(prefix, "weight"), &mut self.weight);
        f(&scoped(prefix, "bias"), &mut self.bias);
        f(&scoped(prefix, "running_mean"), &mut self.running_mean);
        f(&scoped(prefix, "running_var"), &mut self.running_var);
    }

    fn reset_parameters(&mut self, init: &Initializer) -> Result<()> {
        init.constant(&mut self.weight, 1.)?;
        init.constant(&mut self.bias, 0.)?;
        init.constant(&mut self.running_mean, 0.)?;
        init.constant(&mut self.running_var, 1.)
    }
}
