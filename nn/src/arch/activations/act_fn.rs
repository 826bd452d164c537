use super::{hard_sigmoid, selu, sigmoid};
use crate::Feature;

/// Element-wise nonlinearities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActFn {
    Relu,
    Relu6,
    Selu,
    Sigmoid,
    Silu,
    Hardswish,
    Hardsigmoid,
}
use ActFn::*;

impl ActFn {
    pub fn f(&self, z: f32) -> f32 {
        match self {
            Relu => z.max(0.),
            Relu6 => z.clamp(0., 6.),
            Selu => selu(z),
            Sigmoid => sigmoid(z),
            Silu => z * sigmoid(z),
            Hardswish => z * hard_sigmoid(z),
            Hardsigmoid => hard_sigmoid(z),
        }
    }

    pub fn forward(&self, mut x: Feature) -> Feature {
        x.mapv_inplace(|z| self.f(z));
        x
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    #[test]
    fn relu_family() {
        assert_eq!(Relu.f(-1.), 0.);
        assert_eq!(Relu.f(2.), 2.);
        assert_eq!(Relu6.f(7.), 6.);
        assert_eq!(Hardswish.f(-3.), 0.);
        assert_eq!(Hardswish.f(3.), 3.);
    }

    #[test]
    fn silu_gates_by_sigmoid() {
        assert_eq!(Silu.f(0.), 0.);
        assert!((Silu.f(1.) - 0.731_058_6).abs() < 1e-6);
        assert!(Silu.f(-20.).abs() < 1e-6);
    }

    #[test]
    fn forward_is_elementwise() {
        let x = ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![-1., 0., 1.]).unwrap();
        let y = Sigmoid.forward(x);
        assert_eq!(y.shape(), &[1, 3]);
        assert_eq!(y[[0, 1]], 0.5);
        assert!(y[[0, 0]] < 0.5 && y[[0, 2]] > 0.5);
    }
}
