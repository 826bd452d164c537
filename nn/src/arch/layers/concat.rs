use ndarray::{Axis, concatenate};
use rayon::prelude::*;

use crate::{
    Feature, Param, Result,
    arch::{Module, Sequential},
    init::Initializer,
    params::scoped,
};

/// Runs named branches over the same input and stacks their outputs along the channel axis.
#[derive(Debug, Clone)]
pub struct Concat {
    branches: Vec<(String, Sequential)>,
}

impl Concat {
    /// Creates a new `Concat`.
    ///
    /// # Arguments
    /// * `branches` - The branches and the scope their parameters are named under.
    ///
    /// # Returns
    /// A new `Concat` instance.
    pub fn new<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = (S, Sequential)>,
        S: Into<String>,
    {
        Self {
            branches: branches
                .into_iter()
                .map(|(name, branch)| (name.into(), branch))
                .collect(),
        }
    }

    pub fn forward(&self, x: Feature) -> Result<Feature> {
        let outputs = self
            .branches
            .par_iter()
            .map(|(_, branch)| branch.forward(x.clone()))
            .collect::<Result<Vec<_>>>()?;

        let views: Vec<_> = outputs.iter().map(|y| y.view()).collect();
        Ok(concatenate(Axis(1), &views)?)
    }
}

impl Module for Concat {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        for (name, branch) in &self.branches {
            branch.visit(&scoped(prefix, name), f);
        }
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        for (name, branch) in &mut self.branches {
            branch.visit_mut(&scoped(prefix, name), f);
        }
    }

    fn reset_parameters(&mut self, init: &Initializer) -> Result<()> {
        self.branches
            .iter_mut()
            .try_for_each(|(_, branch)| branch.reset_parameters(init))
    }
}
