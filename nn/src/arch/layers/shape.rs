use crate::{Feature, NnErr, Result};

/// Flattens everything after the batch axis, `(N, ...) -> (N, rest)`.
#[derive(Debug, Clone, Default)]
pub struct Flatten;

impl Flatten {
    pub fn forward(&self, x: Feature) -> Result<Feature> {
        let n = *x.shape().first().ok_or(NnErr::SizeMismatch {
            what: "flatten rank",
            got: 0,
            expected: 1,
        })?;
        let rest = if n == 0 { 0 } else { x.len() / n };

        let x = x.as_standard_layout().into_owned();
        Ok(x.into_shape_with_order((n, rest))?.into_dyn())
    }
}

/// Dropout as evaluated by a frozen graph: the identity.
#[derive(Debug, Clone)]
pub struct Dropout {
    p: f32,
}

impl Dropout {
    pub fn new(p: f32) -> Self {
        Self { p }
    }

    /// The drop probability used while training.
    pub fn p(&self) -> f32 {
        self.p
    }

    pub fn forward(&self, x: Feature) -> Feature {
        x
    }
}
