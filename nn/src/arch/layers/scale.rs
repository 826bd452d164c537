use crate::{
    Feature, Param, Result,
    arch::{Module, Sequential},
    init::Initializer,
};

/// Channel attention, `x * gate(x)` with the gate's `(N, C, 1, 1)` output broadcast over space.
#[derive(Debug, Clone)]
pub struct Scale {
    gate: Sequential,
}

impl Scale {
    pub fn new(gate: Sequential) -> Self {
        Self { gate }
    }

    pub fn forward(&self, x: Feature) -> Result<Feature> {
        let gate = self.gate.forward(x.clone())?;
        Ok(x * &gate)
    }
}

impl Module for Scale {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        self.gate.visit(prefix, f);
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        self.gate.visit_mut(prefix, f);
    }

    fn reset_parameters(&mut self, init: &Initializer) -> Result<()> {
        self.gate.reset_parameters(init)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};

    use super::*;
    use crate::{
        Layer,
        arch::{activations::ActFn, layers::GlobalAvgPool},
    };

    #[test]
    fn gate_broadcasts_over_space() {
        let se = Scale::new(Sequential::named([
            ("avgpool", Layer::GlobalAvgPool(GlobalAvgPool)),
            ("act", Layer::Act(ActFn::Hardsigmoid)),
        ]));

        let x = ArrayD::from_elem(IxDyn(&[1, 1, 2, 2]), 3.);
        let y = se.forward(x).unwrap();

        assert_eq!(y.shape(), &[1, 1, 2, 2]);
        assert!(y.iter().all(|&v| v == 3.));
    }
}
