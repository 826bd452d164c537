use nn::{
    Layer, Sequential,
    arch::{
        activations::ActFn,
        layers::{Dropout, Flatten, GlobalAvgPool, Linear},
    },
};

use super::{Network, conv_bn_act, maybe_residual, squeeze_excite};

const V2_BN_EPS: f32 = 1e-5;
const V3_BN_EPS: f32 = 1e-3;

/// Rounds `v` to a multiple of 8 without going more than 10% below it.
fn make_divisible(v: f32) -> usize {
    let rounded = (((v + 4.) as usize) / 8 * 8).max(8);
    if (rounded as f32) < 0.9 * v {
        rounded + 8
    } else {
        rounded
    }
}

fn conv_bn_relu6(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    groups: usize,
) -> Sequential {
    conv_bn_act(in_channels, out_channels, kernel, stride, groups, Some(ActFn::Relu6), V2_BN_EPS)
}

fn inverted_residual_v2(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    t: usize,
) -> Layer {
    let hidden = in_channels * t;
    let mut body = Sequential::default();

    if t != 1 {
        body.push(conv_bn_relu6(in_channels, hidden, 1, 1, 1));
    }
    body.push(conv_bn_relu6(hidden, hidden, 3, stride, hidden));
    body.push(conv_bn_act(hidden, out_channels, 1, 1, 1, None, V2_BN_EPS));

    maybe_residual(body, stride, in_channels, out_channels)
}

/// MobileNetV2 with width multiplier 1, 1280 features and a `Dropout -> Linear` classifier.
pub fn mobilenet_v2(num_classes: usize) -> Network {
    // expansion, channels, repeats, first stride
    const SETTINGS: [(usize, usize, usize, usize); 7] = [
        (1, 16, 1, 1),
        (6, 24, 2, 2),
        (6, 32, 3, 2),
        (6, 64, 4, 2),
        (6, 96, 3, 1),
        (6, 160, 3, 2),
        (6, 320, 1, 1),
    ];

    let mut features = Sequential::new([Layer::from(conv_bn_relu6(3, 32, 3, 2, 1))]);
    let mut in_channels = 32;

    for (t, c, n, s) in SETTINGS {
        for i in 0..n {
            let stride = if i == 0 { s } else { 1 };
            features.push(inverted_residual_v2(in_channels, c, stride, t));
            in_channels = c;
        }
    }
    features.push(conv_bn_relu6(in_channels, 1280, 1, 1, 1));

    let classifier = Sequential::new([
        Layer::dropout(0.2),
        Layer::from(Linear::new(1280, num_classes)),
    ]);

    let stages = Sequential::default()
        .with("features", features)
        .with("avgpool", GlobalAvgPool)
        .with("flatten", Flatten)
        .with("classifier", classifier);

    Network::new(stages, "classifier")
}

/// A MobileNetV3 bottleneck: kernel, expanded channels, output channels, squeeze-excite,
/// activation and stride.
struct Bneck(usize, usize, usize, bool, ActFn, usize);

fn inverted_residual_v3(in_channels: usize, cfg: &Bneck) -> Layer {
    let Bneck(kernel, expanded, out_channels, se, act, stride) = *cfg;
    let mut body = Sequential::default();

    if expanded != in_channels {
        body.push(conv_bn_act(in_channels, expanded, 1, 1, 1, Some(act), V3_BN_EPS));
    }
    body.push(conv_bn_act(expanded, expanded, kernel, stride, expanded, Some(act), V3_BN_EPS));
    if se {
        let squeezed = make_divisible(expanded as f32 / 4.);
        body.push(squeeze_excite(expanded, squeezed, ActFn::Relu, ActFn::Hardsigmoid));
    }
    body.push(conv_bn_act(expanded, out_channels, 1, 1, 1, None, V3_BN_EPS));

    maybe_residual(body, stride, in_channels, out_channels)
}

/// MobileNetV3-Small, 576 features and a `Linear -> Hardswish -> Dropout -> Linear` classifier.
pub fn mobilenet_v3_small(num_classes: usize) -> Network {
    use ActFn::{Hardswish as HS, Relu as RE};

    let settings = [
        Bneck(3, 16, 16, true, RE, 2),
        Bneck(3, 72, 24, false, RE, 2),
        Bneck(3, 88, 24, false, RE, 1),
        Bneck(5, 96, 40, true, HS, 2),
        Bneck(5, 240, 40, true, HS, 1),
        Bneck(5, 240, 40, true, HS, 1),
        Bneck(5, 120, 48, true, HS, 1),
        Bneck(5, 144, 48, true, HS, 1),
        Bneck(5, 288, 96, true, HS, 2),
        Bneck(5, 576, 96, true, HS, 1),
        Bneck(5, 576, 96, true, HS, 1),
    ];

    let stem = conv_bn_act(3, 16, 3, 2, 1, Some(HS), V3_BN_EPS);
    let mut features = Sequential::new([Layer::from(stem)]);
    let mut in_channels = 16;

    for cfg in &settings {
        features.push(inverted_residual_v3(in_channels, cfg));
        in_channels = cfg.2;
    }
    features.push(conv_bn_act(in_channels, 576, 1, 1, 1, Some(HS), V3_BN_EPS));

    let classifier = Sequential::new([
        Layer::from(Linear::new(576, 1024)),
        Layer::Act(HS),
        Layer::from(Dropout::new(0.2)),
        Layer::from(Linear::new(1024, num_classes)),
    ]);

    let stages = Sequential::default()
        .with("features", features)
        .with("avgpool", GlobalAvgPool)
        .with("flatten", Flatten)
        .with("classifier", classifier);

    Network::new(stages, "classifier")
}

#[cfg(test)]
mod tests {
    use nn::Module;

    use super::*;

    #[test]
    fn divisible_rounding() {
        assert_eq!(make_divisible(4.), 8);
        assert_eq!(make_divisible(24.), 24);
        assert_eq!(make_divisible(60.), 64);
        assert_eq!(make_divisible(144.), 144);
    }

    #[test]
    fn mobilenet_v2_size() {
        assert_eq!(mobilenet_v2(1000).num_params(), 3_504_872);
    }

    #[test]
    fn mobilenet_v3_small_size() {
        let net = mobilenet_v3_small(1000);
        assert_eq!(net.num_params(), 2_542_856);
        assert!(
            net.param_names()
                .contains(&"features.1.1.fc1.bias".to_string())
        );
    }
}
