use std::fmt::{self, Display};

use crate::{
    AdaptErr, Result,
    families::{self, Network},
    preprocess::{Interpolation, PreprocessSpec},
};

/// The number of classes every catalog network is pretrained on.
pub const PRETRAINING_CLASSES: usize = 1000;

/// Where a family keeps its classification head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadShape {
    /// A single linear layer maps the pooled features to the logits.
    SingleLinear,
    /// A block of layers whose first linear layer reads the pooled features.
    SequentialClassifier,
    /// A single linear layer plus auxiliary branches, each ending in its own linear layer.
    SingleLinearWithAux,
}

/// A set of pretrained parameters registered for a family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightsEntry {
    pub id: &'static str,
    pub preprocess: PreprocessSpec,
}

/// The architectures that can be adapted into binary classifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Resnet18,
    Resnet34,
    Resnet50,
    MobilenetV2,
    MobilenetV3Small,
    InceptionV3,
    EfficientnetV2S,
}

struct Registration {
    family: Family,
    name: &'static str,
    head_shape: HeadShape,
    /// The first entry is what `DEFAULT` resolves to.
    weights: &'static [WeightsEntry],
    build: fn(usize) -> Network,
}

const V1_256: WeightsEntry = WeightsEntry {
    id: "IMAGENET1K_V1",
    preprocess: PreprocessSpec::imagenet(256, 224),
};

const V2_232: WeightsEntry = WeightsEntry {
    id: "IMAGENET1K_V2",
    preprocess: PreprocessSpec::imagenet(232, 224),
};

static CATALOG: [Registration; 7] = [
    Registration {
        family: Family::Resnet18,
        name: "resnet18",
        head_shape: HeadShape::SingleLinear,
        weights: &[V1_256],
        build: families::resnet18,
    },
    Registration {
        family: Family::Resnet34,
        name: "resnet34",
        head_shape: HeadShape::SingleLinear,
        weights: &[V1_256],
        build: families::resnet34,
    },
    Registration {
        family: Family::Resnet50,
        name: "resnet50",
        head_shape: HeadShape::SingleLinear,
        weights: &[V2_232, V1_256],
        build: families::resnet50,
    },
    Registration {
        family: Family::MobilenetV2,
        name: "mobilenet_v2",
        head_shape: HeadShape::SequentialClassifier,
        weights: &[V2_232, V1_256],
        build: families::mobilenet_v2,
    },
    Registration {
        family: Family::MobilenetV3Small,
        name: "mobilenet_v3_small",
        head_shape: HeadShape::SequentialClassifier,
        weights: &[V1_256],
        build: families::mobilenet_v3_small,
    },
    Registration {
        family: Family::InceptionV3,
        name: "inception_v3",
        head_shape: HeadShape::SingleLinearWithAux,
        weights: &[WeightsEntry {
            id: "IMAGENET1K_V1",
            preprocess: PreprocessSpec::imagenet(342, 299),
        }],
        build: families::inception_v3,
    },
    Registration {
        family: Family::EfficientnetV2S,
        name: "efficientnet_v2_s",
        head_shape: HeadShape::SequentialClassifier,
        weights: &[WeightsEntry {
            id: "IMAGENET1K_V1",
            preprocess: PreprocessSpec::imagenet(384, 384)
                .with_interpolation(Interpolation::Bicubic),
        }],
        build: families::efficientnet_v2_s,
    },
];

/// The pretrained parameters a build starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weights {
    Pretrained(WeightsEntry),
    /// Random initialization, preprocessing still follows the family's default entry.
    Random(WeightsEntry),
}

impl Weights {
    pub fn preprocess(&self) -> PreprocessSpec {
        match self {
            Weights::Pretrained(entry) | Weights::Random(entry) => entry.preprocess,
        }
    }
}

impl Family {
    pub const ALL: [Family; 7] = [
        Family::Resnet18,
        Family::Resnet34,
        Family::Resnet50,
        Family::MobilenetV2,
        Family::MobilenetV3Small,
        Family::InceptionV3,
        Family::EfficientnetV2S,
    ];

    fn registration(self) -> &'static Registration {
        // every family is registered exactly once, in declaration order
        &CATALOG[self as usize]
    }

    /// Finds a family by name, ignoring case.
    ///
    /// # Errors
    /// `UnsupportedArchitecture` if the name is not in the catalog.
    pub fn lookup(name: &str) -> Result<Self> {
        CATALOG
            .iter()
            .find(|reg| reg.name.eq_ignore_ascii_case(name.trim()))
            .map(|reg| reg.family)
            .ok_or_else(|| AdaptErr::UnsupportedArchitecture(name.to_string()))
    }

    pub fn name(self) -> &'static str {
        self.registration().name
    }

    pub fn head_shape(self) -> HeadShape {
        self.registration().head_shape
    }

    /// The registered pretrained parameter sets, the default first.
    pub fn weights(self) -> &'static [WeightsEntry] {
        self.registration().weights
    }

    pub fn default_weights(self) -> WeightsEntry {
        self.weights()[0]
    }

    /// Resolves a weights id (`IMAGENET1K_V1`, `DEFAULT` or `none`), ignoring case.
    ///
    /// # Errors
    /// `UnsupportedWeights` if the id is not registered for this family.
    pub fn resolve_weights(self, id: &str) -> Result<Weights> {
        let id = id.trim();

        if id.eq_ignore_ascii_case("none") {
            return Ok(Weights::Random(self.default_weights()));
        }
        if id.eq_ignore_ascii_case("default") {
            return Ok(Weights::Pretrained(self.default_weights()));
        }

        self.weights()
            .iter()
            .find(|entry| entry.id.eq_ignore_ascii_case(id))
            .map(|entry| Weights::Pretrained(*entry))
            .ok_or_else(|| AdaptErr::UnsupportedWeights {
                architecture: self.name(),
                weights: id.to_string(),
            })
    }

    /// Builds the network as pretrained, every parameter zeroed.
    pub fn network(self, num_classes: usize) -> Network {
        (self.registration().build)(num_classes)
    }

    /// The file pretrained parameters for `entry` are read from, relative to the weights dir.
    pub fn pretrained_file(self, entry: &WeightsEntry) -> String {
        format!("{}-{}.safetensors", self.name(), entry.id)
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrations_line_up_with_families() {
        for family in Family::ALL {
            assert_eq!(family.registration().family, family);
            assert_eq!(Family::lookup(family.name()).unwrap(), family);
            assert!(!family.weights().is_empty());
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(Family::lookup("ResNet18").unwrap(), Family::Resnet18);
        assert_eq!(Family::lookup("INCEPTION_V3").unwrap(), Family::InceptionV3);
        assert!(matches!(
            Family::lookup("vgg16"),
            Err(AdaptErr::UnsupportedArchitecture(name)) if name == "vgg16"
        ));
    }

    #[test]
    fn weights_resolution() {
        let resnet50 = Family::Resnet50;
        assert_eq!(
            resnet50.resolve_weights("default").unwrap(),
            Weights::Pretrained(V2_232)
        );
        assert_eq!(
            resnet50.resolve_weights("imagenet1k_v1").unwrap(),
            Weights::Pretrained(V1_256)
        );
        assert!(matches!(
            resnet50.resolve_weights("None").unwrap(),
            Weights::Random(entry) if entry.id == "IMAGENET1K_V2"
        ));
        assert!(matches!(
            Family::Resnet18.resolve_weights("IMAGENET1K_V2"),
            Err(AdaptErr::UnsupportedWeights { .. })
        ));
    }

    #[test]
    fn preprocessing_per_entry() {
        let inception = Family::InceptionV3.default_weights().preprocess;
        assert_eq!(inception, PreprocessSpec::imagenet(342, 299));

        let efficientnet = Family::EfficientnetV2S.resolve_weights("default").unwrap();
        assert_eq!(
            efficientnet.preprocess(),
            PreprocessSpec::imagenet(384, 384).with_interpolation(Interpolation::Bicubic)
        );

        let mobilenet = Family::MobilenetV2.resolve_weights("IMAGENET1K_V2").unwrap();
        assert_eq!(mobilenet.preprocess().resize_dimension, 232);
        assert_eq!(mobilenet.preprocess().crop_dimension, 224);
    }

    #[test]
    fn head_shapes() {
        assert_eq!(Family::Resnet34.head_shape(), HeadShape::SingleLinear);
        assert_eq!(Family::MobilenetV3Small.head_shape(), HeadShape::SequentialClassifier);
        assert_eq!(Family::EfficientnetV2S.head_shape(), HeadShape::SequentialClassifier);
        assert_eq!(Family::InceptionV3.head_shape(), HeadShape::SingleLinearWithAux);
    }
}
