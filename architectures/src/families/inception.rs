use nn::{
    Layer, Sequential,
    arch::{
        activations::ActFn,
        layers::{
            AvgPool2d, BatchNorm2d, ChannelAffine, Concat, Conv2d, Dropout, Flatten,
            GlobalAvgPool, Linear, MaxPool2d,
        },
    },
};

use super::{AuxBranch, Network};
use crate::preprocess::{IMAGENET_MEANS, IMAGENET_STDS};

/// The statistics the inception parameters were trained with, every channel mapped to
/// `[-1, 1]`.
const INCEPTION_STATS: ([f32; 3], [f32; 3]) = ([0.5; 3], [0.5; 3]);

/// Converts ImageNet normalized inputs to the normalization inception was trained with.
fn transform_input() -> ChannelAffine {
    ChannelAffine::renormalize((IMAGENET_MEANS, IMAGENET_STDS), INCEPTION_STATS)
}

/// `conv -> bn -> relu` with the batch norm epsilon the inception weights were trained with.
fn basic_conv(
    in_channels: usize,
    out_channels: usize,
    kernel: (usize, usize),
    stride: usize,
    padding: (usize, usize),
) -> Sequential {
    Sequential::default()
        .with(
            "conv",
            Conv2d::rect(in_channels, out_channels, kernel)
                .with_stride(stride)
                .with_padding_hw(padding),
        )
        .with("bn", BatchNorm2d::new(out_channels).with_eps(1e-3))
        .with("relu", ActFn::Relu)
}

fn conv1x1(in_channels: usize, out_channels: usize) -> Sequential {
    basic_conv(in_channels, out_channels, (1, 1), 1, (0, 0))
}

fn conv1x7(channels: (usize, usize)) -> Sequential {
    basic_conv(channels.0, channels.1, (1, 7), 1, (0, 3))
}

fn conv7x1(channels: (usize, usize)) -> Sequential {
    basic_conv(channels.0, channels.1, (7, 1), 1, (3, 0))
}

/// Chains convolutions into a branch named `<prefix>_1`, `<prefix>_2`, ...
fn chain(prefix: &str, convs: impl IntoIterator<Item = Sequential>) -> Sequential {
    Sequential::named(
        convs
            .into_iter()
            .enumerate()
            .map(|(i, conv)| (format!("{prefix}_{}", i + 1), Layer::from(conv))),
    )
}

fn pool_branch(in_channels: usize, out_channels: usize) -> Sequential {
    Sequential::default()
        .with("pool", AvgPool2d::new(3, 1, 1))
        .with("conv", conv1x1(in_channels, out_channels))
}

fn inception_a(in_channels: usize, pool_features: usize) -> Concat {
    Concat::new([
        ("branch1x1", Sequential::new([Layer::from(conv1x1(in_channels, 64))])),
        (
            "branch5x5",
            chain(
                "5x5",
                [
                    conv1x1(in_channels, 48),
                    basic_conv(48, 64, (5, 5), 1, (2, 2)),
                ],
            ),
        ),
        (
            "branch3x3dbl",
            chain(
                "3x3dbl",
                [
                    conv1x1(in_channels, 64),
                    basic_conv(64, 96, (3, 3), 1, (1, 1)),
                    basic_conv(96, 96, (3, 3), 1, (1, 1)),
                ],
            ),
        ),
        ("branch_pool", pool_branch(in_channels, pool_features)),
    ])
}

fn inception_b(in_channels: usize) -> Concat {
    Concat::new([
        (
            "branch3x3",
            Sequential::new([Layer::from(basic_conv(in_channels, 384, (3, 3), 2, (0, 0)))]),
        ),
        (
            "branch3x3dbl",
            chain(
                "3x3dbl",
                [
                    conv1x1(in_channels, 64),
                    basic_conv(64, 96, (3, 3), 1, (1, 1)),
                    basic_conv(96, 96, (3, 3), 2, (0, 0)),
                ],
            ),
        ),
        (
            "branch_pool",
            Sequential::new([Layer::from(MaxPool2d::new(3, 2, 0))]),
        ),
    ])
}

fn inception_c(in_channels: usize, c7: usize) -> Concat {
    Concat::new([
        ("branch1x1", Sequential::new([Layer::from(conv1x1(in_channels, 192))])),
        (
            "branch7x7",
            chain(
                "7x7",
                [
                    conv1x1(in_channels, c7),
                    conv1x7((c7, c7)),
                    conv7x1((c7, 192)),
                ],
            ),
        ),
        (
            "branch7x7dbl",
            chain(
                "7x7dbl",
                [
                    conv1x1(in_channels, c7),
                    conv7x1((c7, c7)),
                    conv1x7((c7, c7)),
                    conv7x1((c7, c7)),
                    conv1x7((c7, 192)),
                ],
            ),
        ),
        ("branch_pool", pool_branch(in_channels, 192)),
    ])
}

fn inception_d(in_channels: usize) -> Concat {
    Concat::new([
        (
            "branch3x3",
            chain(
                "3x3",
                [
                    conv1x1(in_channels, 192),
                    basic_conv(192, 320, (3, 3), 2, (0, 0)),
                ],
            ),
        ),
        (
            "branch7x7x3",
            chain(
                "7x7x3",
                [
                    conv1x1(in_channels, 192),
                    conv1x7((192, 192)),
                    conv7x1((192, 192)),
                    basic_conv(192, 192, (3, 3), 2, (0, 0)),
                ],
            ),
        ),
        (
            "branch_pool",
            Sequential::new([Layer::from(MaxPool2d::new(3, 2, 0))]),
        ),
    ])
}

/// A `1x3` and a `3x1` convolution side by side, both fed with the same input.
fn split_3x3(channels: usize) -> Concat {
    Concat::new([
        ("2a", Sequential::new([Layer::from(basic_conv(channels, 384, (1, 3), 1, (0, 1)))])),
        ("2b", Sequential::new([Layer::from(basic_conv(channels, 384, (3, 1), 1, (1, 0)))])),
    ])
}

fn inception_e(in_channels: usize) -> Concat {
    Concat::new([
        ("branch1x1", Sequential::new([Layer::from(conv1x1(in_channels, 320))])),
        (
            "branch3x3",
            Sequential::default()
                .with("3x3_1", conv1x1(in_channels, 384))
                .with("3x3_2", split_3x3(384)),
        ),
        (
            "branch3x3dbl",
            Sequential::default()
                .with("3x3dbl_1", conv1x1(in_channels, 448))
                .with("3x3dbl_2", basic_conv(448, 384, (3, 3), 1, (1, 1)))
                .with("3x3dbl_3", split_3x3(384)),
        ),
        ("branch_pool", pool_branch(in_channels, 192)),
    ])
}

fn aux_logits(in_channels: usize, num_classes: usize) -> Sequential {
    Sequential::default()
        .with("pool", AvgPool2d::new(5, 3, 0))
        .with("conv0", conv1x1(in_channels, 128))
        .with("conv1", basic_conv(128, 768, (5, 5), 1, (0, 0)))
        .with("avgpool", GlobalAvgPool)
        .with("flatten", Flatten)
        .with("fc", Linear::new(768, num_classes))
}

/// Inception v3 for `299x299` ImageNet normalized inputs, 2048 features, with an auxiliary
/// classifier tapping the `17x17` grid after `mixed_6e`.
pub fn inception_v3(num_classes: usize) -> Network {
    let stages = Sequential::default()
        .with("transform_input", transform_input())
        .with("conv_1a", basic_conv(3, 32, (3, 3), 2, (0, 0)))
        .with("conv_2a", basic_conv(32, 32, (3, 3), 1, (0, 0)))
        .with("conv_2b", basic_conv(32, 64, (3, 3), 1, (1, 1)))
        .with("maxpool1", MaxPool2d::new(3, 2, 0))
        .with("conv_3b", conv1x1(64, 80))
        .with("conv_4a", basic_conv(80, 192, (3, 3), 1, (0, 0)))
        .with("maxpool2", MaxPool2d::new(3, 2, 0))
        .with("mixed_5b", inception_a(192, 32))
        .with("mixed_5c", inception_a(256, 64))
        .with("mixed_5d", inception_a(288, 64))
        .with("mixed_6a", inception_b(288))
        .with("mixed_6b", inception_c(768, 128))
        .with("mixed_6c", inception_c(768, 160))
        .with("mixed_6d", inception_c(768, 160))
        .with("mixed_6e", inception_c(768, 192))
        .with("mixed_7a", inception_d(768))
        .with("mixed_7b", inception_e(1280))
        .with("mixed_7c", inception_e(2048))
        .with("avgpool", GlobalAvgPool)
        .with("dropout", Dropout::new(0.5))
        .with("flatten", Flatten)
        .with("fc", Linear::new(2048, num_classes));

    Network::new(stages, "fc").with_aux(AuxBranch {
        name: "aux_logits",
        after: "mixed_6e",
        body: aux_logits(768, num_classes),
        head: "fc",
    })
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn};
    use nn::Module;

    use super::*;

    #[test]
    fn inception_v3_layout() {
        let net = inception_v3(1000);
        assert_eq!(net.num_params(), 27_161_264);

        let names = net.param_names();
        assert!(names.contains(&"mixed_7b.branch3x3.3x3_2.2b.0.conv.weight".to_string()));
        assert!(names.contains(&"aux_logits.fc.weight".to_string()));
        assert_eq!(net.aux.len(), 1);
    }

    #[test]
    fn imagenet_inputs_are_renormalized_before_the_stem() {
        let net = inception_v3(1000);
        let Some((name, Layer::Affine(affine))) = net.stages.layers().next() else {
            panic!("inception must start by transforming its input");
        };
        assert_eq!(name, "transform_input");

        // a raw value of 0.8 in every channel
        let x = ArrayD::from_shape_fn(IxDyn(&[1, 3, 1, 1]), |i| {
            (0.8 - IMAGENET_MEANS[i[1]]) / IMAGENET_STDS[i[1]]
        });
        let y = affine.forward(x).unwrap();
        assert!(y.iter().all(|v| (v - 0.6).abs() < 1e-5));
    }
}
