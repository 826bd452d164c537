use ndarray::{Array4, ArrayD};

use crate::device::Device;

/// The activation type flowing between layers, `(N, C, H, W)` while spatial and `(N, F)` once
/// flattened.
pub type Feature = ArrayD<f32>;

/// A batch of images ready to be fed to a graph, tagged with the device it lives on.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Array4<f32>,
    device: Device,
}

impl Tensor {
    /// Creates a new `Tensor`.
    ///
    /// # Arguments
    /// * `data` - The `(N, C, H, W)` values.
    /// * `device` - The device the values are placed on.
    ///
    /// # Returns
    /// A new `Tensor` instance.
    pub fn new(data: Array4<f32>, device: Device) -> Self {
        Self { data, device }
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn into_data(self) -> Array4<f32> {
        self.data
    }
}
