use crate::{
    Feature, Param, Result,
    arch::{Module, Sequential, activations::ActFn},
    init::Initializer,
    params::scoped,
};

/// A block with a skip connection, `act(body(x) + shortcut(x))`.
///
/// The body's children are named directly under the block (`layer1.0.conv1`) and the
/// projection shortcut, when present, under `downsample`.
#[derive(Debug, Clone)]
pub struct Residual {
    body: Sequential,
    shortcut: Option<Sequential>,
    act: Option<ActFn>,
}

impl Residual {
    /// Creates a new `Residual` with an identity shortcut and no activation after the sum.
    ///
    /// # Arguments
    /// * `body` - The main path.
    ///
    /// # Returns
    /// A new `Residual` instance.
    pub fn new(body: Sequential) -> Self {
        Self {
            body,
            shortcut: None,
            act: None,
        }
    }

    pub fn with_shortcut(mut self, shortcut: Sequential) -> Self {
        self.shortcut = Some(shortcut);
        self
    }

    pub fn with_act(mut self, act: ActFn) -> Self {
        self.act = Some(act);
        self
    }

    pub fn forward(&self, x: Feature) -> Result<Feature> {
        let skip = match &self.shortcut {
            Some(shortcut) => shortcut.forward(x.clone())?,
            None => x.clone(),
        };

        let mut y = self.body.forward(x)?;
        y += &skip;

        Ok(match self.act {
            Some(act) => act.forward(y),
            None => y,
        })
    }
}

impl Module for Residual {
    fn visit(&self, prefix: &str, f: &mut dyn FnMut(&str, &Param)) {
        self.body.visit(prefix, f);
        if let Some(shortcut) = &self.shortcut {
            shortcut.visit(&scoped(prefix, "downsample"), f);
        }
    }

    fn visit_mut(&mut self, prefix: &str, f: &mut dyn FnMut(&str, &mut Param)) {
        self.body.visit_mut(prefix, f);
        if let Some(shortcut) = &mut self.shortcut {
            shortcut.visit_mut(&scoped(prefix, "downsample"), f);
        }
    }

    fn reset_parameters(&mut self, init: &Initializer) -> Result<()> {
        self.body.reset_parameters(init)?;
        if let Some(shortcut) = &mut self.shortcut {
            shortcut.reset_parameters(init)?;
        }
        Ok(())
    }
}
