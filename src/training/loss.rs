//! Loss and accuracy on one-hot targets

use burn::tensor::{activation::log_softmax, backend::Backend, ElementConversion, Int, Tensor};

/// Categorical cross-entropy between softmax(logits) and one-hot targets
///
/// Computed from `log_softmax` so large logits stay finite. Returns the batch
/// mean as a single-element tensor.
pub fn categorical_cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    one_hot: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    (log_probs * one_hot).sum_dim(1).mean().neg()
}

/// Number of rows whose argmax equals the target index
pub fn correct_predictions<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let [batch_size, _] = logits.dims();
    let predictions = logits.argmax(1).reshape([batch_size]);
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    #[test]
    fn test_uniform_logits_give_log_num_classes() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([2, 4], &device);
        let one_hot = Tensor::<TestBackend, 2>::from_floats(
            TensorData::new(vec![1.0f32, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0], [2, 4]),
            &device,
        );

        let loss: f32 = categorical_cross_entropy(logits, one_hot).into_scalar().elem();
        assert!((loss - 4.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_confident_correct_prediction_has_low_loss() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[20.0, 0.0, 0.0]], &device);
        let one_hot = Tensor::<TestBackend, 2>::from_floats([[1.0, 0.0, 0.0]], &device);

        let loss: f32 = categorical_cross_entropy(logits, one_hot).into_scalar().elem();
        assert!(loss < 1e-4);
    }

    #[test]
    fn test_correct_predictions() {
        let device = Default::default();
        let logits =
            Tensor::<TestBackend, 2>::from_floats([[0.1, 0.9], [0.8, 0.2], [0.3, 0.7]], &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_ints([1, 1, 1], &device);

        assert_eq!(correct_predictions(logits, targets), 2);
    }
}
