use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};

use log::debug;
use ndarray::{ArrayD, IxDyn};
use safetensors::{Dtype, SafeTensors, tensor::TensorView};

use crate::{NnErr, Result, arch::Module};

/// A flat, name keyed snapshot of every parameter and buffer of a module.
///
/// Serialized as safetensors with little endian `F32` entries, plus free form string metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDict {
    tensors: BTreeMap<String, ArrayD<f32>>,
    metadata: HashMap<String, String>,
}

impl StateDict {
    /// Snapshots the current values of `module`.
    pub fn from_module<M: Module + ?Sized>(module: &M) -> Self {
        let mut tensors = BTreeMap::new();
        module.visit("", &mut |name, param| {
            tensors.insert(name.to_string(), param.value().clone());
        });

        Self {
            tensors,
            metadata: HashMap::new(),
        }
    }

    /// Parses a serialized checkpoint.
    ///
    /// # Arguments
    /// * `bytes` - The safetensors buffer.
    ///
    /// # Returns
    /// The state dict or an error if the buffer is malformed or holds anything but `F32`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (_, header) = SafeTensors::read_metadata(bytes)?;
        let metadata = header.metadata().clone().unwrap_or_default();
        let safetensors = SafeTensors::deserialize(bytes)?;

        let mut tensors = BTreeMap::new();
        for (name, view) in safetensors.tensors() {
            if view.dtype() != Dtype::F32 {
                return Err(NnErr::UnsupportedDtype {
                    name,
                    dtype: format!("{:?}", view.dtype()),
                });
            }

            let values = view
                .data()
                .chunks_exact(4)
                .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect();

            let value = ArrayD::from_shape_vec(IxDyn(view.shape()), values)?;
            tensors.insert(name, value);
        }

        Ok(Self { tensors, metadata })
    }

    /// Reads a checkpoint from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let state = Self::from_bytes(&bytes)?;

        debug!(entries = state.len(); "read checkpoint {}", path.display());
        Ok(state)
    }

    /// Serializes the checkpoint.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let raw: Vec<(&String, Vec<u8>, Vec<usize>)> = self
            .tensors
            .iter()
            .map(|(name, value)| {
                let bytes = value.iter().flat_map(|v| v.to_le_bytes()).collect();
                (name, bytes, value.shape().to_vec())
            })
            .collect();

        let mut views = BTreeMap::new();
        for (name, bytes, shape) in &raw {
            views.insert(
                name.as_str(),
                TensorView::new(Dtype::F32, shape.clone(), bytes)?,
            );
        }

        let metadata = (!self.metadata.is_empty()).then(|| self.metadata.clone());
        Ok(safetensors::serialize(views, &metadata)?)
    }

    /// Writes the checkpoint to disk.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_bytes()?)?;

        debug!(entries = self.len(); "wrote checkpoint {}", path.display());
        Ok(())
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.tensors.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Copies every entry into the matching parameter of `module`.
    ///
    /// Loading is strict: every parameter must have an entry, every entry must have a parameter
    /// and shapes must agree exactly. Nothing is written to `module` unless all checks pass.
    ///
    /// # Arguments
    /// * `module` - The module to load into.
    pub fn load_into<M: Module + ?Sized>(&self, module: &mut M) -> Result<()> {
        let mut expected = BTreeMap::new();
        module.visit("", &mut |name, param| {
            expected.insert(name.to_string(), param.shape().to_vec());
        });

        if let Some(name) = self.names().find(|name| !expected.contains_key(*name)) {
            return Err(NnErr::UnexpectedParam(name.to_string()));
        }

        for (name, shape) in &expected {
            let value = self
                .tensors
                .get(name)
                .ok_or_else(|| NnErr::MissingParam(name.clone()))?;

            if value.shape() != shape.as_slice() {
                return Err(NnErr::ParamShapeMismatch {
                    name: name.clone(),
                    got: value.shape().to_vec(),
                    expected: shape.clone(),
                });
            }
        }

        let mut result = Ok(());
        module.visit_mut("", &mut |name, param| {
            if result.is_err() {
                return;
            }
            if let Some(value) = self.tensors.get(name) {
                result = param.assign(name, value.clone());
            }
        });

        result
    }
}
