use nn::{
    Layer, Module, Sequential,
    arch::{
        activations::ActFn,
        layers::{Dropout, Linear},
    },
    init::Initializer,
};

use crate::{
    AdaptErr, Result,
    catalog::HeadShape,
    families::Network,
    spec::{HeadActivation, HeadStyle},
};

/// How the replacement heads are built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadConfig {
    pub style: HeadStyle,
    /// Drop probability of the `Regularized` style.
    pub dropout: f32,
    pub activation: HeadActivation,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            style: HeadStyle::default(),
            dropout: 0.2,
            activation: HeadActivation::default(),
        }
    }
}

/// What head surgery found and replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surgery {
    pub in_features: usize,
    pub aux_in_features: Vec<usize>,
}

/// Finds the last linear layer of `layer`, looking inside nested sequentials.
pub(crate) fn last_linear(layer: &Layer) -> Option<&Linear> {
    match layer {
        Layer::Linear(linear) => Some(linear),
        Layer::Sequential(seq) => seq
            .layers()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .find_map(|(_, l)| last_linear(l)),
        _ => None,
    }
}

fn first_linear(seq: &Sequential) -> Option<&Linear> {
    seq.layers().find_map(|(_, layer)| match layer {
        Layer::Linear(linear) => Some(linear),
        _ => None,
    })
}

/// Replaces the pretraining heads of `network` with single output heads.
///
/// # Arguments
/// * `network` - The network to operate on, as laid out by its family.
/// * `architecture` - The family's name, for error reporting.
/// * `shape` - The head shape the family was registered with.
/// * `config` - How the replacement heads are built.
/// * `init` - Draws the initial values of the new heads.
///
/// # Returns
/// The input widths that were preserved, or `UnsupportedHeadShape` if the network does not
/// have the structure `shape` promises. On error `network` is left untouched.
pub fn replace_heads(
    network: &mut Network,
    architecture: &'static str,
    shape: HeadShape,
    config: &HeadConfig,
    init: &Initializer,
) -> Result<Surgery> {
    let mismatch = |reason| AdaptErr::UnsupportedHeadShape {
        architecture,
        reason,
    };

    match (shape, network.aux.is_empty()) {
        (HeadShape::SingleLinearWithAux, true) => {
            return Err(mismatch("no auxiliary branch to resize"));
        }
        (HeadShape::SingleLinear | HeadShape::SequentialClassifier, false) => {
            return Err(mismatch("unexpected auxiliary branches"));
        }
        _ => {}
    }

    let head = network
        .stages
        .get(network.head)
        .ok_or_else(|| mismatch("head layer not found"))?;

    let (in_features, mut new_head) = match (shape, head) {
        (HeadShape::SingleLinear | HeadShape::SingleLinearWithAux, Layer::Linear(fc)) => {
            let in_features = fc.in_features();
            (in_features, single_linear(in_features, config.activation))
        }
        (HeadShape::SequentialClassifier, Layer::Sequential(classifier)) => {
            let in_features = first_linear(classifier)
                .ok_or_else(|| mismatch("classifier has no linear layer"))?
                .in_features();
            (in_features, sequential_classifier(in_features, config))
        }
        (HeadShape::SequentialClassifier, _) => {
            return Err(mismatch("head is not a sequential classifier"));
        }
        _ => return Err(mismatch("head is not a single linear layer")),
    };

    let mut aux_heads = Vec::with_capacity(network.aux.len());
    for aux in &network.aux {
        let Some(Layer::Linear(fc)) = aux.body.get(aux.head) else {
            return Err(mismatch("auxiliary head is not a single linear layer"));
        };
        aux_heads.push(Linear::new(fc.in_features(), 1));
    }

    new_head.reset_parameters(init)?;
    for aux_head in &mut aux_heads {
        aux_head.reset_parameters(init)?;
    }

    let aux_in_features = aux_heads.iter().map(Linear::in_features).collect();
    for (aux, aux_head) in network.aux.iter_mut().zip(aux_heads) {
        aux.body.replace(aux.head, Layer::from(aux_head));
    }
    network.stages.replace(network.head, new_head);

    Ok(Surgery {
        in_features,
        aux_in_features,
    })
}

fn single_linear(in_features: usize, activation: HeadActivation) -> Layer {
    let fc = Layer::from(Linear::new(in_features, 1));

    match activation {
        HeadActivation::None => fc,
        HeadActivation::Sigmoid => Layer::from(Sequential::new([fc, Layer::Act(ActFn::Sigmoid)])),
    }
}

fn sequential_classifier(in_features: usize, config: &HeadConfig) -> Layer {
    let mut classifier = match config.style {
        HeadStyle::Regularized => Sequential::new([
            Layer::from(Dropout::new(config.dropout)),
            Layer::Act(ActFn::Selu),
        ]),
        HeadStyle::Minimal => Sequential::default(),
    };

    classifier.push(Linear::new(in_features, 1));
    if config.activation == HeadActivation::Sigmoid {
        classifier.push(ActFn::Sigmoid);
    }

    Layer::from(classifier)
}

#[cfg(test)]
mod tests {
    use nn::arch::layers::{Flatten, GlobalAvgPool};

    use super::*;
    use crate::families::AuxBranch;

    fn tiny(head: Layer, head_name: &'static str) -> Network {
        Network::new(
            Sequential::default()
                .with("avgpool", GlobalAvgPool)
                .with("flatten", Flatten)
                .with(head_name, head),
            head_name,
        )
    }

    fn init() -> Initializer {
        Initializer::new(Some(0))
    }

    #[test]
    fn single_linear_keeps_width() {
        let mut net = tiny(Layer::linear(8, 1000), "fc");
        let config = HeadConfig::default();
        let surgery =
            replace_heads(&mut net, "tiny", HeadShape::SingleLinear, &config, &init()).unwrap();

        assert_eq!(surgery.in_features, 8);
        let fc = last_linear(net.stages.get("fc").unwrap()).unwrap();
        assert_eq!((fc.in_features(), fc.out_features()), (8, 1));
    }

    #[test]
    fn sigmoid_head_is_wrapped() {
        let mut net = tiny(Layer::linear(8, 1000), "fc");
        let config = HeadConfig {
            activation: HeadActivation::Sigmoid,
            ..HeadConfig::default()
        };
        replace_heads(&mut net, "tiny", HeadShape::SingleLinear, &config, &init()).unwrap();

        assert_eq!(net.param_names(), ["fc.0.weight", "fc.0.bias"]);
    }

    #[test]
    fn classifier_reads_first_linear() {
        let classifier = Sequential::new([
            Layer::linear(16, 32),
            Layer::Act(ActFn::Hardswish),
            Layer::linear(32, 1000),
        ]);
        let mut net = tiny(Layer::from(classifier), "classifier");

        let surgery = replace_heads(
            &mut net,
            "tiny",
            HeadShape::SequentialClassifier,
            &HeadConfig::default(),
            &init(),
        )
        .unwrap();
        assert_eq!(surgery.in_features, 16);

        let Some(Layer::Sequential(head)) = net.stages.get("classifier") else {
            panic!("classifier should stay a block");
        };
        let kinds: Vec<_> = head.layers().map(|(_, l)| l.clone()).collect();
        assert!(matches!(
            kinds.as_slice(),
            [Layer::Dropout(_), Layer::Act(ActFn::Selu), Layer::Linear(fc)]
                if fc.out_features() == 1
        ));
    }

    #[test]
    fn minimal_classifier() {
        let mut net = tiny(
            Layer::from(Sequential::new([Layer::dropout(0.2), Layer::linear(4, 10)])),
            "classifier",
        );
        let config = HeadConfig {
            style: HeadStyle::Minimal,
            ..HeadConfig::default()
        };
        replace_heads(&mut net, "tiny", HeadShape::SequentialClassifier, &config, &init()).unwrap();
        assert_eq!(net.param_names(), ["classifier.0.weight", "classifier.0.bias"]);
    }

    #[test]
    fn aux_heads_resized_in_lockstep() {
        let mut net = tiny(Layer::linear(8, 1000), "fc").with_aux(AuxBranch {
            name: "aux",
            after: "avgpool",
            body: Sequential::default()
                .with("flatten", Flatten)
                .with("fc", Linear::new(8, 1000)),
            head: "fc",
        });

        let surgery = replace_heads(
            &mut net,
            "tiny",
            HeadShape::SingleLinearWithAux,
            &HeadConfig::default(),
            &init(),
        )
        .unwrap();

        assert_eq!(surgery.aux_in_features, [8]);
        let aux_fc = last_linear(net.aux[0].body.get("fc").unwrap()).unwrap();
        assert_eq!(aux_fc.out_features(), 1);
    }

    #[test]
    fn mismatched_tag_is_rejected_untouched() {
        let mut net = tiny(Layer::linear(8, 1000), "fc");
        let before = net.param_names();

        for shape in [HeadShape::SequentialClassifier, HeadShape::SingleLinearWithAux] {
            let err = replace_heads(&mut net, "tiny", shape, &HeadConfig::default(), &init())
                .unwrap_err();
            assert!(matches!(err, AdaptErr::UnsupportedHeadShape { .. }));
        }

        let mut net2 = tiny(Layer::Act(ActFn::Relu), "fc");
        let shape = HeadShape::SingleLinear;
        assert!(replace_heads(&mut net2, "tiny", shape, &HeadConfig::default(), &init()).is_err());
        assert_eq!(net.param_names(), before);
    }
}
