use ndarray::{Array2, Array4, ArrayView3, Ix1, Ix4, s};
use rayon::prelude::*;

use crate::{
    Feature, NnErr, Param, Result, arch::Module, init::Initializer, params::scoped,
};

/// A 2D convolution over `(N, C, H, W)` inputs, lowered to a matrix product per group.
#[derive(Debug, Clone)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
    groups: usize,
    weight: Param,
    bias: Option<Param>,
}

impl Conv2d {
    /// Creates a new bias-free `Conv2d` with a square kernel, unit stride and no padding.
    ///
    /// # Arguments
    /// * `in_channels` - The channels of the input.
    /// * `out_channels` - The channels of the output.
    /// * `kernel` - The side of the kernel.
    ///
    /// # Returns
    /// A new `Conv2d` instance.
    pub fn new(in_channels: usize, out_channels: usize, kernel: usize) -> Self {
        Self::rect(in_channels, out_channels, (kernel, kernel))
    }

    /// Creates a new bias-free `Conv2d` with a `(height, width)` kernel.
    pub fn rect(in_channels: usize, out_channels: usize, kernel: (usize, usize)) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel,
            stride: (1, 1),
            padding: (0, 0),
            groups: 1,
            weight: Param::learnable(&[out_channels, in_channels, kernel.0, kernel.1]),
            bias: None,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = (stride, stride);
        self
    }

    pub fn with_padding(mut self, padding: usize) -> Self {
        self.padding = (padding, padding);
        self
    }

    pub fn with_padding_hw(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }

    /// Splits the channels into `groups` independent convolutions. `groups == in_channels`
    /// gives a depthwise convolution.
    pub fn with_groups(mut self, groups: usize) -> Self {
        let groups = groups.max(1);
        self.groups = groups;
        self.weight = Param::learnable(&[
            self.out_channels,
            self.in_channels / groups,
            self.kernel.0,
            self.kernel.1,
        ]);
        self
    }

    pub fn with_bias(mut self) -> Self {
        self.bias = Some(Param::learnable(&[self.out_channels]));
        self
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// Makes a forward pass through the convolution.
    ///
    /// # Arguments
    /// * `x` - A `(N, C, H, W)` feature map with `C == in_channels`.
    ///
    /// # Returns
    /// The `(N, out_channels, H', W')` feature map.
    pub fn forward(&self, x: Feature) -> Result<Feature> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, c, h, w) = x.dim();

        if c != self.in_channels {
            return Err(NnErr::SizeMismatch {
                what: "conv2d input channels",
                got: c,
                expected: self.in_channels,
            });
        }

        let (kh, kw) = self.kernel;
        let (sh, sw) = self.stride;
        let (ph, pw) = self.padding;

        if h + 2 * ph < kh || w + 2 * pw < kw {
            return Err(NnErr::SizeMismatch {
                what: "conv2d input side",
                got: h.min(w),
                expected: kh.max(kw),
            });
        }

        let oh = (h + 2 * ph - kh) / sh + 1;
        let ow = (w + 2 * pw - kw) / sw + 1;
        let cin_g = c / self.groups;
        let cout_g = self.out_channels / self.groups;

        let weight = self
            .weight
            .value()
            .view()
            .into_shape_with_order((self.out_channels, cin_g * kh * kw))?;

        let mut out = Array4::<f32>::zeros((n, self.out_channels, oh, ow));

        for (b, mut out_b) in out.outer_iter_mut().enumerate() {
            let x_b = x.index_axis(ndarray::Axis(0), b);

            let blocks: Vec<Array2<f32>> = (0..self.groups)
                .into_par_iter()
                .map(|g| {
                    let x_g = x_b.slice(s![g * cin_g..(g + 1) * cin_g, .., ..]);
                    let cols = self.im2col(x_g, (oh, ow));
                    let w_g = weight.slice(s![g * cout_g..(g + 1) * cout_g, ..]);
                    w_g.dot(&cols)
                })
                .collect();

            for (g, block) in blocks.into_iter().enumerate() {
                let block = block.into_shape_with_order((cout_g, oh, ow))?;
                out_b
                    .slice_mut(s![g * cout_g..(g + 1) * cout_g, .., ..])
                    .assign(&block);
            }
        }

        if let Some(bias) = &self.bias {
            let bias = bias.view::<Ix1>()?;
            for (o, mut channel) in out.axis_iter_mut(ndarray::Axis(1)).enumerate() {
                channel += bias[o];
            }
        }

        Ok(out.into_dyn())
    }

    /// Unfolds every receptive field of `x` into a column.
    ///
    /// # Arguments
    /// * `x` - A single `(C, H, W)` group of channels.
    /// * `out_dim` - The spatial size of the output.
    ///
    /// # Returns
    /// A `(C * kh * kw, oh * ow)` matrix, rows ordered like the flattened kernel.
    fn im2col(&self, x: ArrayView3<f32>, (oh, ow): (usize, usize)) -> Array2<f32> {
        let (c, h, w) = x.dim();
        let (kh, kw) = self.kernel;
        let (sh, sw) = self.stride;
        let (ph, pw) = self.padding;

        let mut cols = Array2::<f32>::zeros((c * kh * kw, oh * ow));

        for ci in 0..c {
            for ki in 0..kh {
                for kj in 0..kw {
                    let mut row = cols.row_mut((ci * kh + ki) * kw + kj);

                    for oy in 0..oh {
                        let Some(iy) = (oy * sh + ki).checked_sub(ph).filter(|&iy| iy < h) else {
                            continue;
                        };

                        for ox in 0..ow {
                            let Some(ix) = (ox * sw + kj).checked_sub(pw).filter(|&ix| ix < w)
                            else {
                                continue;
                            };

                            row[oy * ow + ox] = x[[ci, iy, ix]];
                        }
                    }
                }
            }
        }

        cols
    }
}

impl Module for Conv2d {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        f(&scoped(prefix, "weight"), &self.weight);
        if let Some(bias) = &self.bias {
            f(&scoped(prefix, "bias"), bias);
        }
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        f(&scoped(prefix, "weight"), &mut self.weight);
        if let Some(bias) = &mut self.bias {
            f(&scoped(prefix, "bias"), bias);
        }
    }

    fn reset_parameters(&mut self, init: &Initializer) -> Result<()> {
        let (kh, kw) = self.kernel;
        init.kaiming(&mut self.weight, self.out_channels * kh * kw)?;
        if let Some(bias) = &mut self.bias {
            init.constant(bias, 0.)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;

    fn input(shape: &[usize]) -> Feature {
        let len: usize = shape.iter().product();
        ArrayD::from_shape_vec(IxDyn(shape), (0..len).map(|v| v as f32).collect()).unwrap()
    }

    #[test]
    fn ones_kernel_sums_windows() {
        let mut conv = Conv2d::new(1, 1, 2);
        conv.weight.fill(vec![1.; 4]).unwrap();

        // 0 1 2
        // 3 4 5
        // 6 7 8
        let y = conv.forward(input(&[1, 1, 3, 3])).unwrap();
        assert_eq!(y.shape(), &[1, 1, 2, 2]);
        assert_eq!(y[[0, 0, 0, 0]], 8.);
        assert_eq!(y[[0, 0, 1, 1]], 24.);
    }

    #[test]
    fn padding_and_stride() {
        let mut conv = Conv2d::new(1, 1, 3).with_stride(2).with_padding(1).with_bias();
        conv.weight.fill(vec![1.; 9]).unwrap();
        conv.bias.as_mut().unwrap().fill(vec![0.5]).unwrap();

        let y = conv.forward(input(&[1, 1, 4, 4])).unwrap();
        assert_eq!(y.shape(), &[1, 1, 2, 2]);
        // top left window only sees 0, 1, 4, 5
        assert_eq!(y[[0, 0, 0, 0]], 10.5);
    }

    #[test]
    fn depthwise_keeps_channels_apart() {
        let mut conv = Conv2d::new(2, 2, 1).with_groups(2);
        assert_eq!(conv.weight.shape(), &[2, 1, 1, 1]);
        conv.weight.fill(vec![1., -1.]).unwrap();

        let y = conv.forward(input(&[1, 2, 2, 2])).unwrap();
        assert_eq!(y[[0, 0, 1, 1]], 3.);
        assert_eq!(y[[0, 1, 1, 1]], -7.);
    }

    #[test]
    fn rect_kernel_padding() {
        let conv = Conv2d::rect(3, 4, (1, 7)).with_padding_hw((0, 3));
        let y = conv.forward(input(&[2, 3, 5, 9])).unwrap();
        assert_eq!(y.shape(), &[2, 4, 5, 9]);
    }

    #[test]
    fn rejects_wrong_channels() {
        let conv = Conv2d::new(3, 8, 3);
        assert!(matches!(
            conv.forward(input(&[1, 1, 5, 5])),
            Err(NnErr::SizeMismatch { .. })
        ));
    }
}
