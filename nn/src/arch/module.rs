use crate::{Param, ParamKind, Result, init::Initializer};

/// Anything that owns named parameters: single layers, blocks and whole graphs.
pub trait Module {
    /// Calls `f` with the full name and value of every parameter and buffer, in a stable order.
    ///
    /// # Arguments
    /// * `prefix` - The scope this module lives in, empty for the root.
    /// * `f` - The visitor.
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param));

    /// Mutable counterpart of `visit`, same order and names.
    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param));

    /// Draws fresh initial values for every parameter and resets every buffer.
    fn reset_parameters(&mut self, init: &Initializer) -> Result<()>;

    /// Returns the amount of learnable scalars.
    fn num_params(&self) -> usize {
        let mut total = 0;
        self.visit("", &mut |_, param| {
            if param.kind() == ParamKind::Learnable {
                total += param.len();
            }
        });
        total
    }

    /// Returns the amount of learnable scalars currently flagged as trainable.
    fn num_trainable(&self) -> usize {
        let mut total = 0;
        self.visit("", &mut |_, param| {
            if param.is_trainable() {
                total += param.len();
            }
        });
        total
    }

    /// Flags every learnable parameter as trainable or frozen.
    fn set_trainable(&mut self, trainable: bool) {
        self.visit_mut("", &mut |_, param| param.set_trainable(trainable));
    }

    /// Returns the full names of every parameter and buffer.
    fn param_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.visit("", &mut |name, _| names.push(name.to_string()));
        names
    }
}
