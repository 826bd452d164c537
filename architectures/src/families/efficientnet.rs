use nn::{
    Layer, Sequential,
    arch::{
        activations::ActFn,
        layers::{Dropout, Flatten, GlobalAvgPool, Linear},
    },
};

use super::{Network, conv_bn_act, maybe_residual, squeeze_excite};

const BN_EPS: f32 = 1e-3;

fn conv_bn_silu(
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    groups: usize,
) -> Sequential {
    conv_bn_act(in_channels, out_channels, kernel, stride, groups, Some(ActFn::Silu), BN_EPS)
}

fn projection(in_channels: usize, out_channels: usize) -> Sequential {
    conv_bn_act(in_channels, out_channels, 1, 1, 1, None, BN_EPS)
}

/// One stage of blocks: whether the expansion is fused into the spatial conv, expansion
/// ratio, kernel, first stride, input and output channels and how many blocks.
struct Stage {
    fused: bool,
    expand: usize,
    kernel: usize,
    stride: usize,
    in_channels: usize,
    out_channels: usize,
    blocks: usize,
}

const fn stage(
    fused: bool,
    expand: usize,
    stride: usize,
    (in_channels, out_channels): (usize, usize),
    blocks: usize,
) -> Stage {
    Stage {
        fused,
        expand,
        kernel: 3,
        stride,
        in_channels,
        out_channels,
        blocks,
    }
}

const V2_S: [Stage; 6] = [
    stage(true, 1, 1, (24, 24), 2),
    stage(true, 4, 2, (24, 48), 4),
    stage(true, 4, 2, (48, 64), 4),
    stage(false, 4, 2, (64, 128), 6),
    stage(false, 6, 1, (128, 160), 9),
    stage(false, 6, 2, (160, 256), 15),
];

/// A full conv doing the expansion and the spatial filtering at once, then a 1x1 projection.
fn fused_mbconv(cfg: &Stage, in_channels: usize, stride: usize) -> Layer {
    let mut body = Sequential::default();

    if cfg.expand == 1 {
        body.push(conv_bn_silu(in_channels, cfg.out_channels, cfg.kernel, stride, 1));
    } else {
        let expanded = in_channels * cfg.expand;
        body.push(conv_bn_silu(in_channels, expanded, cfg.kernel, stride, 1));
        body.push(projection(expanded, cfg.out_channels));
    }

    maybe_residual(body, stride, in_channels, cfg.out_channels)
}

/// 1x1 expansion, depthwise conv, squeeze and excitation, 1x1 projection.
fn mbconv(cfg: &Stage, in_channels: usize, stride: usize) -> Layer {
    let expanded = in_channels * cfg.expand;
    let squeezed = (in_channels / 4).max(1);

    let body = Sequential::new([
        Layer::from(conv_bn_silu(in_channels, expanded, 1, 1, 1)),
        Layer::from(conv_bn_silu(expanded, expanded, cfg.kernel, stride, expanded)),
        Layer::from(squeeze_excite(expanded, squeezed, ActFn::Silu, ActFn::Sigmoid)),
        Layer::from(projection(expanded, cfg.out_channels)),
    ]);

    maybe_residual(body, stride, in_channels, cfg.out_channels)
}

/// EfficientNetV2-S for `384x384` inputs, 1280 features and a `Dropout -> Linear` classifier.
///
/// Stochastic depth only drops blocks while training, so every residual block is evaluated
/// whole.
pub fn efficientnet_v2_s(num_classes: usize) -> Network {
    let mut features = Sequential::new([Layer::from(conv_bn_silu(3, 24, 3, 2, 1))]);

    for cfg in &V2_S {
        let mut blocks = Sequential::default();
        for i in 0..cfg.blocks {
            let (in_channels, stride) = match i {
                0 => (cfg.in_channels, cfg.stride),
                _ => (cfg.out_channels, 1),
            };
            blocks.push(if cfg.fused {
                fused_mbconv(cfg, in_channels, stride)
            } else {
                mbconv(cfg, in_channels, stride)
            });
        }
        features.push(blocks);
    }
    features.push(conv_bn_silu(256, 1280, 1, 1, 1));

    let classifier = Sequential::new([
        Layer::from(Dropout::new(0.2)),
        Layer::from(Linear::new(1280, num_classes)),
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
    fn efficientnet_v2_s_size() {
        let net = efficientnet_v2_s(1000);
        assert_eq!(net.num_params(), 21_458_488);

        let names = net.param_names();
        // fused stage without expansion, single conv per block
        assert!(names.contains(&"features.1.0.0.0.weight".to_string()));
        assert!(!names.contains(&"features.1.0.1.0.weight".to_string()));
        // squeeze and excitation inside the first MBConv block
        assert!(names.contains(&"features.4.0.2.fc1.bias".to_string()));
        assert!(names.contains(&"features.7.1.running_var".to_string()));
        assert_eq!(names.last().map(String::as_str), Some("classifier.1.bias"));
    }

    #[test]
    fn stages_chain_their_channels() {
        let mut in_channels = 24;
        for cfg in &V2_S {
            assert_eq!(cfg.in_channels, in_channels);
            in_channels = cfg.out_channels;
        }
        assert_eq!(in_channels, 256);
    }
}
