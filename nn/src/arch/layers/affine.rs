use ndarray::{Axis, Ix4};

use crate::{Feature, NnErr, Result};

/// A fixed per-channel `x * scale + shift`, owning no parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelAffine {
    scale: Vec<f32>,
    shift: Vec<f32>,
}

impl ChannelAffine {
    /// Creates a new `ChannelAffine`.
    ///
    /// # Arguments
    /// * `scale` - One factor per channel.
    /// * `shift` - One offset per channel, added after scaling.
    pub fn new(scale: Vec<f32>, shift: Vec<f32>) -> Self {
        Self { scale, shift }
    }

    /// Maps inputs normalized with `(means, stds)` to inputs normalized with
    /// `(target_means, target_stds)`.
    pub fn renormalize(
        (means, stds): ([f32; 3], [f32; 3]),
        (target_means, target_stds): ([f32; 3], [f32; 3]),
    ) -> Self {
        let scale: [f32; 3] = std::array::from_fn(|c| stds[c] / target_stds[c]);
        let shift: [f32; 3] =
            std::array::from_fn(|c| (means[c] - target_means[c]) / target_stds[c]);
        Self::new(scale.to_vec(), shift.to_vec())
    }

    pub fn forward(&self, x: Feature) -> Result<Feature> {
        let mut x = x.into_dimensionality::<Ix4>()?;

        if x.dim().1 != self.scale.len() || self.shift.len() != self.scale.len() {
            return Err(NnErr::SizeMismatch {
                what: "affine channels",
                got: x.dim().1,
                expected: self.scale.len(),
            });
        }

        for (c, mut channel) in x.axis_iter_mut(Axis(1)).enumerate() {
            let (scale, shift) = (self.scale[c], self.shift[c]);
            channel.mapv_inplace(|v| v * scale + shift);
        }

        Ok(x.into_dyn())
    }
}
