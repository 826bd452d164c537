use super::{Layer, Module};
use crate::{Feature, Param, Result, init::Initializer, params::scoped};

/// An ordered chain of named layers: information flows through them front to back.
///
/// Children are addressed by name so that a graph's head can be located and swapped after
/// the graph is built, and so that parameter names follow the chain (`classifier.3.weight`).
#[derive(Debug, Clone, Default)]
pub struct Sequential {
    layers: Vec<(String, Layer)>,
}

impl Sequential {
    /// Creates a new `Sequential` whose children are named by their position.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers
                .into_iter()
                .enumerate()
                .map(|(i, layer)| (i.to_string(), layer))
                .collect(),
        }
    }

    /// Creates a new `Sequential` with explicitly named children.
    pub fn named<I, S>(layers: I) -> Self
    where
        I: IntoIterator<Item = (S, Layer)>,
        S: Into<String>,
    {
        Self {
            layers: layers
                .into_iter()
                .map(|(name, layer)| (name.into(), layer))
                .collect(),
        }
    }

    /// Appends a layer named after its position.
    pub fn push(&mut self, layer: impl Into<Layer>) {
        let name = self.layers.len().to_string();
        self.layers.push((name, layer.into()));
    }

    /// Appends a named layer.
    pub fn push_named(&mut self, name: impl Into<String>, layer: impl Into<Layer>) {
        self.layers.push((name.into(), layer.into()));
    }

    /// Builder flavoured `push_named`.
    pub fn with(mut self, name: impl Into<String>, layer: impl Into<Layer>) -> Self {
        self.push_named(name, layer);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|(n, _)| n == name).map(|(_, l)| l)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, l)| l)
    }

    /// Swaps the child called `name` for `layer`, keeping its position and name.
    ///
    /// # Returns
    /// The replaced layer, or `None` (and `layer` is dropped) if there is no such child.
    pub fn replace(&mut self, name: &str, layer: Layer) -> Option<Layer> {
        self.get_mut(name)
            .map(|slot| std::mem::replace(slot, layer))
    }

    /// Iterates over the children and their names.
    pub fn layers(&self) -> impl Iterator<Item = (&str, &Layer)> {
        self.layers.iter().map(|(n, l)| (n.as_str(), l))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Makes a forward pass through every child in order.
    ///
    /// # Arguments
    /// * `x` - The input feature.
    ///
    /// # Returns
    /// The output of the last child or the first error that occurred.
    pub fn forward(&self, x: Feature) -> Result<Feature> {
        self.layers
            .iter()
            .try_fold(x, |x, (_, layer)| layer.forward(x))
    }
}

impl Module for Sequential {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        for (name, layer) in &self.layers {
            layer.visit(&scoped(prefix, name), f);
        }
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        for (name, layer) in &mut self.layers {
            layer.visit_mut(&scoped(prefix, name), f);
        }
    }

    fn reset_parameters(&mut self, init: &Initializer) -> Result<()> {
        self.layers
            .iter_mut()
            .try_for_each(|(_, layer)| layer.reset_parameters(init))
    }
}
