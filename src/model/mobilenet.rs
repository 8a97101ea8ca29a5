//! MobileNetV2 feature extractor
//!
//! Parameter layout follows torchvision's `mobilenet_v2` so ImageNet weights
//! can be imported (see [`super::weights`]). Only the convolutional features
//! are built; the ImageNet classification top is not part of this module.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};

/// Channels produced by the final 1x1 convolution
pub const FEATURE_CHANNELS: usize = 1280;

/// Channels produced by the stem convolution
const STEM_CHANNELS: usize = 32;

/// Inverted residual settings: (expansion t, output channels c, repeats n, first stride s)
pub const INVERTED_RESIDUAL_SETTINGS: [(usize, usize, usize, usize); 7] = [
    (1, 16, 1, 1),
    (6, 24, 2, 2),
    (6, 32, 3, 2),
    (6, 64, 4, 2),
    (6, 96, 3, 1),
    (6, 160, 3, 2),
    (6, 320, 1, 1),
];

/// Number of stride-2 stages, counting the stem
const DOWNSAMPLING_STAGES: usize = 5;

/// Spatial size of the feature map for a square input of `image_size`
///
/// Every stride-2 3x3 convolution with padding 1 maps `n` to `ceil(n / 2)`.
pub fn feature_map_size(image_size: usize) -> usize {
    (0..DOWNSAMPLING_STAGES).fold(image_size, |n, _| n.div_ceil(2))
}

/// ReLU capped at 6
fn relu6<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.clamp(0.0, 6.0)
}

/// Convolution + BatchNorm + ReLU6
#[derive(Module, Debug)]
pub struct ConvNormRelu6<B: Backend> {
    pub conv: Conv2d<B>,
    pub norm: BatchNorm<B>,
}

impl<B: Backend> ConvNormRelu6<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        groups: usize,
        device: &B::Device,
    ) -> Self {
        let padding = (kernel_size - 1) / 2;
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(padding, padding))
            .with_groups(groups)
            .with_bias(false)
            .init(device);

        Self {
            conv,
            norm: BatchNormConfig::new(out_channels).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        relu6(self.norm.forward(self.conv.forward(x)))
    }
}

/// Inverted residual block: expand (1x1), depthwise (3x3), linear project (1x1)
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    /// Absent when the expansion factor is 1
    pub expand: Option<ConvNormRelu6<B>>,
    pub depthwise: ConvNormRelu6<B>,
    pub project: Conv2d<B>,
    pub project_norm: BatchNorm<B>,
    use_residual: bool,
}

impl<B: Backend> InvertedResidual<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        expansion: usize,
        device: &B::Device,
    ) -> Self {
        let hidden = in_channels * expansion;

        let expand = (expansion != 1)
            .then(|| ConvNormRelu6::new(in_channels, hidden, 1, 1, 1, device));
        let depthwise = ConvNormRelu6::new(hidden, hidden, 3, stride, hidden, device);
        let project = Conv2dConfig::new([hidden, out_channels], [1, 1])
            .with_bias(false)
            .init(device);

        Self {
            expand,
            depthwise,
            project,
            project_norm: BatchNormConfig::new(out_channels).init(device),
            use_residual: stride == 1 && in_channels == out_channels,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut out = x.clone();
        if let Some(expand) = &self.expand {
            out = expand.forward(out);
        }
        let out = self.depthwise.forward(out);
        let out = self.project_norm.forward(self.project.forward(out));

        if self.use_residual {
            out + x
        } else {
            out
        }
    }
}

/// MobileNetV2 (width multiplier 1.0) without the classification top
#[derive(Module, Debug)]
pub struct MobileNetV2<B: Backend> {
    pub stem: ConvNormRelu6<B>,
    pub blocks: Vec<InvertedResidual<B>>,
    pub head: ConvNormRelu6<B>,
}

impl<B: Backend> MobileNetV2<B> {
    /// Create a randomly initialised backbone
    pub fn new(device: &B::Device) -> Self {
        let stem = ConvNormRelu6::new(3, STEM_CHANNELS, 3, 2, 1, device);

        let mut blocks = Vec::new();
        let mut in_channels = STEM_CHANNELS;
        for (expansion, out_channels, repeats, stride) in INVERTED_RESIDUAL_SETTINGS {
            for i in 0..repeats {
                let stride = if i == 0 { stride } else { 1 };
                blocks.push(InvertedResidual::new(
                    in_channels,
                    out_channels,
                    stride,
                    expansion,
                    device,
                ));
                in_channels = out_channels;
            }
        }

        let head = ConvNormRelu6::new(in_channels, FEATURE_CHANNELS, 1, 1, 1, device);

        Self { stem, blocks, head }
    }

    /// Feature maps: [B, 3, S, S] -> [B, 1280, F, F] with `F = feature_map_size(S)`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let mut x = self.stem.forward(x);
        for block in &self.blocks {
            x = block.forward(x);
        }
        self.head.forward(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_feature_map_size() {
        assert_eq!(feature_map_size(224), 7);
        assert_eq!(feature_map_size(128), 4);
        assert_eq!(feature_map_size(32), 1);
        assert_eq!(feature_map_size(33), 2);
    }

    #[test]
    fn test_block_count_matches_torchvision() {
        let device = Default::default();
        let model = MobileNetV2::<TestBackend>::new(&device);
        // features.1 ..= features.17
        assert_eq!(model.blocks.len(), 17);
        assert!(model.blocks[0].expand.is_none());
        assert!(model.blocks[1].expand.is_some());
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = MobileNetV2::<TestBackend>::new(&device);
        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);

        let output = model.forward(input);
        assert_eq!(output.dims(), [2, FEATURE_CHANNELS, 1, 1]);
    }

    #[test]
    fn test_relu6_clamps() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([-3.0, 2.0, 9.0], &device);
        let y: Vec<f32> = relu6(x).into_data().to_vec().unwrap();
        assert_eq!(y, vec![0.0, 2.0, 6.0]);
    }
}
