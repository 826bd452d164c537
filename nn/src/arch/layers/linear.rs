use ndarray::{Ix1, Ix2};

use crate::{Feature, NnErr, Param, Result, arch::Module, init::Initializer, params::scoped};

/// A fully connected layer, `y = x Wᵀ + b` with `W` stored as `(out_features, in_features)`.
#[derive(Debug, Clone)]
pub struct Linear {
    in_features: usize,
    out_features: usize,
    weight: Param,
    bias: Param,
}

impl Linear {
    /// Creates a new `Linear`.
    ///
    /// # Arguments
    /// * `in_features` - The width of the input rows.
    /// * `out_features` - The width of the output rows.
    ///
    /// # Returns
    /// A new `Linear` instance.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self {
            in_features,
            out_features,
            weight: Param::learnable(&[out_features, in_features]),
            bias: Param::learnable(&[out_features]),
        }
    }

    pub fn in_features(&self) -> usize {
        self.in_features
    }

    pub fn out_features(&self) -> usize {
        self.out_features
    }

    pub fn forward(&self, x: Feature) -> Result<Feature> {
        let x = x.into_dimensionality::<Ix2>()?;

        if x.ncols() != self.in_features {
            return Err(NnErr::SizeMismatch {
                what: "linear input features",
                got: x.ncols(),
                expected: self.in_features,
            });
        }

        let w = self.weight.view::<Ix2>()?;
        let b = self.bias.view::<Ix1>()?;

        Ok((x.dot(&w.t()) + &b).into_dyn())
    }
}

impl Module for Linear {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        f(&scoped(prefix, "weight"), &self.weight);
        f(&scoped(prefix, "bias"), &self.bias);
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        f(&scoped(prefix, "weight"), &mut self.weight);
        f(&scoped(prefix, "bias"), &mut self.bias);
    }

    fn reset_parameters(&mut self, init: &Initializer) -> Result<()> {
        init.fan_in_uniform(&mut self.weight, self.in_features)?;
        init.fan_in_uniform(&mut self.bias, self.in_features)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    #[test]
    fn affine_map() {
        let mut fc = Linear::new(3, 2);
        fc.weight.fill(vec![1., 0., 0., 1., 1., 1.]).unwrap();
        fc.bias.fill(vec![0., -1.]).unwrap();

        let x = ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![2., 3., 4.]).unwrap();
        let y = fc.forward(x).unwrap();

        assert_eq!(y.shape(), &[1, 2]);
        assert_eq!(y[[0, 0]], 2.);
        assert_eq!(y[[0, 1]], 8.);
    }

    #[test]
    fn rejects_wrong_width() {
        let fc = Linear::new(3, 1);
        let x = ArrayD::zeros(IxDyn(&[1, 4]));
        assert!(fc.forward(x).is_err());
    }
}
