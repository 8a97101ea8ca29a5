//! Fish species classifier
//!
//! A MobileNetV2 feature extractor followed by a small dense head. The head
//! flattens the backbone's feature maps rather than pooling them.

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Linear, LinearConfig, Relu},
    tensor::{activation::softmax, backend::Backend, Tensor},
};
use tracing::info;

use super::mobilenet::{feature_map_size, MobileNetV2, FEATURE_CHANNELS};
use super::weights::{load_pretrained, WeightsSource};
use crate::utils::error::FishError;

/// Configuration for the fish classifier
#[derive(Config, Debug)]
pub struct FishClassifierConfig {
    /// Number of fish species
    pub num_classes: usize,

    /// Input image size (square)
    #[config(default = "128")]
    pub image_size: usize,

    /// Units in the hidden dense layer
    #[config(default = "512")]
    pub hidden_units: usize,

    /// Dropout rate before each dense layer
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl FishClassifierConfig {
    /// Flattened feature length fed to the first dense layer
    pub fn flattened_features(&self) -> usize {
        let fm = feature_map_size(self.image_size);
        FEATURE_CHANNELS * fm * fm
    }

    /// Check the configuration can produce a usable model
    pub fn validate(&self) -> crate::Result<()> {
        if self.num_classes < 2 {
            return Err(FishError::Model(format!(
                "num_classes must be at least 2, got {}",
                self.num_classes
            )));
        }
        if self.image_size < 32 {
            return Err(FishError::Model(format!(
                "image_size must be at least 32, got {}",
                self.image_size
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(FishError::Model(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        Ok(())
    }

    /// Initialise with random backbone weights
    ///
    /// Used to receive a persisted record and in tests. Training starts from
    /// [`build_pretrained`] instead.
    pub fn init<B: Backend>(&self, device: &B::Device) -> FishClassifier<B> {
        self.init_with_backbone(MobileNetV2::new(device), device)
    }

    fn init_with_backbone<B: Backend>(
        &self,
        backbone: MobileNetV2<B>,
        device: &B::Device,
    ) -> FishClassifier<B> {
        FishClassifier {
            backbone,
            dropout1: DropoutConfig::new(self.dropout).init(),
            fc1: LinearConfig::new(self.flattened_features(), self.hidden_units).init(device),
            relu: Relu::new(),
            dropout2: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(self.hidden_units, self.num_classes).init(device),
            num_classes: self.num_classes,
            image_size: self.image_size,
        }
    }
}

/// Fish classifier: backbone -> flatten -> dropout -> dense(relu) -> dropout -> dense
#[derive(Module, Debug)]
pub struct FishClassifier<B: Backend> {
    pub backbone: MobileNetV2<B>,
    pub dropout1: Dropout,
    pub fc1: Linear<B>,
    pub relu: Relu,
    pub dropout2: Dropout,
    pub fc2: Linear<B>,
    num_classes: usize,
    image_size: usize,
}

impl<B: Backend> FishClassifier<B> {
    /// Forward pass
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, 3, image_size, image_size]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.backbone.forward(x);
        let x: Tensor<B, 2> = x.flatten(1, 3);

        let x = self.dropout1.forward(x);
        let x = self.relu.forward(self.fc1.forward(x));
        let x = self.dropout2.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass with softmax; every row sums to 1
    pub fn forward_probabilities(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(x), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Stop gradients from reaching the backbone parameters
    pub fn freeze_backbone(mut self) -> Self {
        self.backbone = self.backbone.no_grad();
        self
    }
}

/// Build a classifier on top of ImageNet-pretrained MobileNetV2 weights
///
/// Failing to obtain the weights aborts; there is no random-weight fallback.
pub fn build_pretrained<B: Backend>(
    config: &FishClassifierConfig,
    weights: &WeightsSource,
    freeze_backbone: bool,
    device: &B::Device,
) -> crate::Result<FishClassifier<B>> {
    config.validate()?;

    let backbone = load_pretrained::<B>(weights, device)?;
    let model = config.init_with_backbone(backbone, device);

    info!(
        "Built classifier: {} classes, {}x{} input, {} flattened features",
        config.num_classes,
        config.image_size,
        config.image_size,
        config.flattened_features()
    );

    if freeze_backbone {
        info!("Backbone frozen; only the dense head is trainable");
        Ok(model.freeze_backbone())
    } else {
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::Param;

    type TestBackend = NdArray;

    #[test]
    fn test_flattened_features() {
        assert_eq!(FishClassifierConfig::new(9).flattened_features(), 1280 * 4 * 4);
        assert_eq!(
            FishClassifierConfig::new(9).with_image_size(32).flattened_features(),
            1280
        );
    }

    #[test]
    fn test_forward_shapes_and_probabilities() {
        let device = Default::default();
        let config = FishClassifierConfig::new(4).with_image_size(32);
        let model = config.init::<TestBackend>(&device);

        let input = Tensor::<TestBackend, 4>::ones([2, 3, 32, 32], &device);
        assert_eq!(model.forward(input.clone()).dims(), [2, 4]);

        let probs = model.forward_probabilities(input);
        let sums: Vec<f32> = probs.sum_dim(1).into_data().to_vec().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_validate() {
        assert!(FishClassifierConfig::new(2).validate().is_ok());
        assert!(FishClassifierConfig::new(1).validate().is_err());
        assert!(FishClassifierConfig::new(3).with_image_size(16).validate().is_err());
    }

    #[test]
    fn test_build_pretrained_fails_without_weights() {
        let device = Default::default();
        let result = build_pretrained::<TestBackend>(
            &FishClassifierConfig::new(3).with_image_size(32),
            &WeightsSource::File("/no/such/weights.pth".into()),
            false,
            &device,
        );
        assert!(matches!(result, Err(FishError::PretrainedWeights(_))));
    }

    #[test]
    fn test_freeze_backbone_stops_gradients() {
        let device = Default::default();
        let model = FishClassifierConfig::new(3)
            .with_image_size(32)
            .init::<Autodiff<TestBackend>>(&device)
            .freeze_backbone();

        let weight: &Param<Tensor<Autodiff<TestBackend>, 4>> = &model.backbone.stem.conv.weight;
        assert!(!weight.is_require_grad());
        assert!(model.fc1.weight.is_require_grad());
    }
}
