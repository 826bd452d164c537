use ndarray::{Array4, Axis, Ix4, s};

use crate::{Feature, NnErr, Result};

#[derive(Debug, Clone, Copy)]
enum Reduction {
    Max,
    Avg,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    kernel: usize,
    stride: usize,
    padding: usize,
}

impl Window {
    fn out_side(&self, side: usize) -> Result<usize> {
        if side + 2 * self.padding < self.kernel {
            return Err(NnErr::SizeMismatch {
                what: "pooling input side",
                got: side,
                expected: self.kernel,
            });
        }

        Ok((side + 2 * self.padding - self.kernel) / self.stride + 1)
    }

    /// Clamps the window starting at output index `o` to the `[0, side)` input range.
    fn span(&self, o: usize, side: usize) -> (usize, usize) {
        let start = o * self.stride;
        let lo = start.saturating_sub(self.padding).min(side);
        let hi = (start + self.kernel).saturating_sub(self.padding).min(side);
        (lo, hi)
    }

    fn pool(&self, x: Feature, reduction: Reduction) -> Result<Feature> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, c, h, w) = x.dim();
        let (oh, ow) = (self.out_side(h)?, self.out_side(w)?);
        let area = (self.kernel * self.kernel) as f32;

        let mut out = Array4::<f32>::zeros((n, c, oh, ow));

        for ((b, ch, oy, ox), v) in out.indexed_iter_mut() {
            let (y0, y1) = self.span(oy, h);
            let (x0, x1) = self.span(ox, w);
            let window = x.slice(s![b, ch, y0..y1, x0..x1]);

            *v = match reduction {
                Reduction::Max => window.fold(f32::NEG_INFINITY, |m, &v| m.max(v)),
                Reduction::Avg => window.sum() / area,
            };
        }

        Ok(out.into_dyn())
    }
}

/// Max pooling, padded positions count as `-inf`.
#[derive(Debug, Clone)]
pub struct MaxPool2d {
    window: Window,
}

impl MaxPool2d {
    pub fn new(kernel: usize, stride: usize, padding: usize) -> Self {
        Self {
            window: Window {
                kernel,
                stride,
                padding,
            },
        }
    }

    pub fn forward(&self, x: Feature) -> Result<Feature> {
        self.window.pool(x, Reduction::Max)
    }
}

/// Average pooling, padded positions count as zeros in the average.
#[derive(Debug, Clone)]
pub struct AvgPool2d {
    window: Window,
}

impl AvgPool2d {
    pub fn new(kernel: usize, stride: usize, padding: usize) -> Self {
        Self {
            window: Window {
                kernel,
                stride,
                padding,
            },
        }
    }

    pub fn forward(&self, x: Feature) -> Result<Feature> {
        self.window.pool(x, Reduction::Avg)
    }
}

/// Averages every channel down to a single value, `(N, C, H, W) -> (N, C, 1, 1)`.
#[derive(Debug, Clone, Default)]
pub struct GlobalAvgPool;

impl GlobalAvgPool {
    pub fn forward(&self, x: Feature) -> Result<Feature> {
        let x = x.into_dimensionality::<Ix4>()?;
        let (n, c, h, w) = x.dim();

        let mean = x
            .into_shape_with_order((n, c, h * w))?
            .mean_axis(Axis(2))
            .ok_or(NnErr::SizeMismatch {
                what: "global pooling area",
                got: 0,
                expected: 1,
            })?;

        Ok(mean.into_shape_with_order((n, c, 1, 1))?.into_dyn())
    }
}
