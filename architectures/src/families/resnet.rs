use nn::{
    Layer, Sequential,
    arch::{
        activations::ActFn,
        layers::{BatchNorm2d, Conv2d, Flatten, GlobalAvgPool, Linear, MaxPool2d, Residual},
    },
};

use super::Network;

#[derive(Debug, Clone, Copy)]
enum Block {
    Basic,
    Bottleneck,
}

impl Block {
    fn expansion(self) -> usize {
        match self {
            Block::Basic => 1,
            Block::Bottleneck => 4,
        }
    }

    fn build(self, in_channels: usize, planes: usize, stride: usize) -> Residual {
        let out_channels = planes * self.expansion();

        let body = match self {
            Block::Basic => Sequential::default()
                .with("conv1", conv3x3(in_channels, planes, stride))
                .with("bn1", BatchNorm2d::new(planes))
                .with("relu", ActFn::Relu)
                .with("conv2", conv3x3(planes, planes, 1))
                .with("bn2", BatchNorm2d::new(planes)),
            Block::Bottleneck => Sequential::default()
                .with("conv1", Conv2d::new(in_channels, planes, 1))
                .with("bn1", BatchNorm2d::new(planes))
                .with("relu1", ActFn::Relu)
                .with("conv2", conv3x3(planes, planes, stride))
                .with("bn2", BatchNorm2d::new(planes))
                .with("relu2", ActFn::Relu)
                .with("conv3", Conv2d::new(planes, out_channels, 1))
                .with("bn3", BatchNorm2d::new(out_channels)),
        };

        let block = Residual::new(body).with_act(ActFn::Relu);
        if stride == 1 && in_channels == out_channels {
            return block;
        }

        block.with_shortcut(Sequential::new([
            Layer::from(Conv2d::new(in_channels, out_channels, 1).with_stride(stride)),
            Layer::from(BatchNorm2d::new(out_channels)),
        ]))
    }
}

fn conv3x3(in_channels: usize, out_channels: usize, stride: usize) -> Conv2d {
    Conv2d::new(in_channels, out_channels, 3)
        .with_stride(stride)
        .with_padding(1)
}

fn resnet(block: Block, depths: [usize; 4], num_classes: usize) -> Network {
    let mut stages = Sequential::default()
        .with("conv1", Conv2d::new(3, 64, 7).with_stride(2).with_padding(3))
        .with("bn1", BatchNorm2d::new(64))
        .with("relu", ActFn::Relu)
        .with("maxpool", MaxPool2d::new(3, 2, 1));

    let mut in_channels = 64;
    for (i, (depth, planes)) in depths.into_iter().zip([64, 128, 256, 512]).enumerate() {
        let mut layer = Sequential::default();
        for j in 0..depth {
            let stride = if i > 0 && j == 0 { 2 } else { 1 };
            layer.push(block.build(in_channels, planes, stride));
            in_channels = planes * block.expansion();
        }
        stages.push_named(format!("layer{}", i + 1), layer);
    }

    let stages = stages
        .with("avgpool", GlobalAvgPool)
        .with("flatten", Flatten)
        .with("fc", Linear::new(in_channels, num_classes));

    Network::new(stages, "fc")
}

/// ResNet-18, basic blocks `[2, 2, 2, 2]`, 512 features.
pub fn resnet18(num_classes: usize) -> Network {
    resnet(Block::Basic, [2, 2, 2, 2], num_classes)
}

/// ResNet-34, basic blocks `[3, 4, 6, 3]`, 512 features.
pub fn resnet34(num_classes: usize) -> Network {
    resnet(Block::Basic, [3, 4, 6, 3], num_classes)
}

/// ResNet-50, bottleneck blocks `[3, 4, 6, 3]`, 2048 features.
pub fn resnet50(num_classes: usize) -> Network {
    resnet(Block::Bottleneck, [3, 4, 6, 3], num_classes)
}

#[cfg(test)]
mod tests {
    use nn::Module;

    use super::*;

    #[test]
    fn resnet18_layout() {
        let net = resnet18(1000);
        let names = net.param_names();

        assert_eq!(net.num_params(), 11_689_512);
        assert!(names.contains(&"layer1.0.conv1.weight".to_string()));
        assert!(names.contains(&"layer2.0.downsample.0.weight".to_string()));
        assert!(names.contains(&"layer4.1.bn2.running_var".to_string()));
        assert!(!names.contains(&"layer1.0.downsample.0.weight".to_string()));
        assert_eq!(names.last().map(String::as_str), Some("fc.bias"));
    }

    #[test]
    fn resnet50_widths() {
        let net = resnet50(1000);
        assert_eq!(net.num_params(), 25_557_032);

        let Some(Layer::Linear(fc)) = net.stages.get("fc") else {
            panic!("resnet50 should end in a linear layer");
        };
        assert_eq!(fc.in_features(), 2048);
    }
}
