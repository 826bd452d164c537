use ndarray::{ArrayD, ArrayView, Dimension, IxDyn};

use crate::{NnErr, Result};

/// Whether a parameter is learned or a running statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Learnable,
    Buffer,
}

/// A named tensor owned by a layer.
///
/// Buffers (normalization running statistics) travel with checkpoints but are never trainable.
#[derive(Debug, Clone)]
pub struct Param {
    value: ArrayD<f32>,
    kind: ParamKind,
    trainable: bool,
}

impl Param {
    /// Creates a zeroed learnable parameter, trainable by default.
    pub fn learnable(shape: &[usize]) -> Self {
        Self {
            value: ArrayD::zeros(IxDyn(shape)),
            kind: ParamKind::Learnable,
            trainable: true,
        }
    }

    /// Creates a buffer filled with `value`.
    pub fn buffer(shape: &[usize], value: f32) -> Self {
        Self {
            value: ArrayD::from_elem(IxDyn(shape), value),
            kind: ParamKind::Buffer,
            trainable: false,
        }
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn value(&self) -> &ArrayD<f32> {
        &self.value
    }

    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn is_trainable(&self) -> bool {
        self.kind == ParamKind::Learnable && self.trainable
    }

    /// Flags this parameter as trainable or frozen. Buffers ignore the request.
    pub fn set_trainable(&mut self, trainable: bool) {
        if self.kind == ParamKind::Learnable {
            self.trainable = trainable;
        }
    }

    /// Gives a statically shaped view of the parameter.
    ///
    /// # Returns
    /// The view or an error if the parameter does not have `D`'s rank.
    pub fn view<D: Dimension>(&self) -> Result<ArrayView<'_, f32, D>> {
        Ok(self.value.view().into_dimensionality::<D>()?)
    }

    /// Replaces the parameter's values, keeping its shape.
    ///
    /// # Arguments
    /// * `name` - The parameter's full name, used for error reporting.
    /// * `value` - The new values, must have exactly this parameter's shape.
    pub fn assign(&mut self, name: &str, value: ArrayD<f32>) -> Result<()> {
        if value.shape() != self.value.shape() {
            return Err(NnErr::ParamShapeMismatch {
                name: name.to_string(),
                got: value.shape().to_vec(),
                expected: self.value.shape().to_vec(),
            });
        }

        self.value = value;
        Ok(())
    }

    /// Overwrites the parameter with a flat buffer in row-major order.
    ///
    /// # Arguments
    /// * `values` - Exactly `self.len()` values.
    pub fn fill(&mut self, values: Vec<f32>) -> Result<()> {
        if values.len() != self.value.len() {
            return Err(NnErr::SizeMismatch {
                what: "parameter values",
                got: values.len(),
                expected: self.value.len(),
            });
        }

        self.value = ArrayD::from_shape_vec(self.value.raw_dim(), values)?;
        Ok(())
    }
}

/// Joins a parent scope and a child name the way checkpoint keys are written, `layer1.0.conv1`.
pub fn scoped(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}
