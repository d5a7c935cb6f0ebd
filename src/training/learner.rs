use burn::{
    backend::NdArray,
    prelude::*,
    tensor::{Int, Transaction},
    train::metric::{Adaptor, ItemLazy},
};

use super::metrics::SegmentationInput;

/// Logits and ground truth of one validation batch, as handed to the learner's metrics.
pub struct SegmentationOutput<B: Backend> {
    /// `[batch_size, num_classes, height, width]`
    pub output: Tensor<B, 4>,
    /// `[batch_size, height, width]`
    pub targets: Tensor<B, 3, Int>,
}

impl<B: Backend> SegmentationOutput<B> {
    pub fn new(output: Tensor<B, 4>, targets: Tensor<B, 3, Int>) -> Self {
        Self { output, targets }
    }

    /// For batchers that keep a channel axis on the masks: `[batch_size, 1, height, width]`.
    pub fn with_channel_targets(output: Tensor<B, 4>, targets: Tensor<B, 4, Int>) -> Self {
        Self::new(output, targets.squeeze(1))
    }
}

impl<B: Backend> ItemLazy for SegmentationOutput<B> {
    type ItemSync = SegmentationOutput<NdArray>;

    fn sync(self) -> Self::ItemSync {
        let [output, targets] = Transaction::default()
            .register(self.output)
            .register(self.targets)
            .execute()
            .try_into()
            .expect("Logits and targets are read back together");

        let device = &Default::default();

        SegmentationOutput::new(
            Tensor::from_data(output, device),
            Tensor::from_data(targets, device),
        )
    }
}

impl<B: Backend> Adaptor<SegmentationInput<B>> for SegmentationOutput<B> {
    fn adapt(&self) -> SegmentationInput<B> {
        SegmentationInput::new(self.output.clone(), self.targets.clone())
    }
}
