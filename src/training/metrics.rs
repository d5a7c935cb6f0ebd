use burn::prelude::*;
use burn::train::metric::{Metric, MetricEntry, MetricMetadata, Numeric};
use derive_new::new;

use crate::metrics::{SegmentationMetric, SegmentationMetricConfig};

/// Mean IoU over the whole validation epoch, background excluded.
///
/// Intersection and union areas are accumulated globally, so the reported value is
/// the mIoU of everything seen since the last `clear`, not a mean of batch scores.
pub struct MeanIoUMetric<B: Backend> {
    metric: SegmentationMetric<B>,
}

#[derive(new)]
pub struct SegmentationInput<B: Backend> {
    /// `[batch_size, num_classes, height, width]`
    outputs: Tensor<B, 4>,
    /// `[batch_size, height, width]`
    targets: Tensor<B, 3, Int>,
}

impl<B: Backend> MeanIoUMetric<B> {
    pub fn new(num_classes: usize) -> Self {
        Self::from_config(&SegmentationMetricConfig::new(num_classes))
    }

    pub fn from_config(config: &SegmentationMetricConfig) -> Self {
        Self {
            metric: config.init(),
        }
    }

    pub(crate) fn accumulate(&mut self, input: &SegmentationInput<B>) {
        if let Err(err) = self
            .metric
            .update(input.outputs.clone(), input.targets.clone())
        {
            panic!("Invalid segmentation metric input: {}", err);
        }
    }
}

impl<B: Backend> Metric for MeanIoUMetric<B> {
    type Input = SegmentationInput<B>;
    const NAME: &'static str = "mIoU";

    fn update(&mut self, input: &SegmentationInput<B>, _metadata: &MetricMetadata) -> MetricEntry {
        self.accumulate(input);

        let value = self.value();
        MetricEntry::new(
            Self::NAME.to_string(),
            format!("{} {:.2} %", Self::NAME, value),
            value.to_string(),
        )
    }

    fn clear(&mut self) {
        self.metric.reset()
    }
}

impl<B: Backend> Numeric for MeanIoUMetric<B> {
    fn value(&self) -> f64 {
        100.0 * self.metric.get(false).miou
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::one_hot_logits;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn class_map(data: TensorData) -> Tensor<TestBackend, 3, Int> {
        Tensor::from_data(
            data.convert::<<TestBackend as Backend>::IntElem>(),
            &Default::default(),
        )
    }

    fn input(predicted: TensorData, labels: TensorData) -> SegmentationInput<TestBackend> {
        SegmentationInput::new(one_hot_logits(class_map(predicted), 3), class_map(labels))
    }

    #[test]
    fn reports_epoch_miou_in_percent() {
        let mut metric = MeanIoUMetric::<TestBackend>::new(3);

        metric.accumulate(&input(
            TensorData::from([[[1, 1], [2, 0]]]),
            TensorData::from([[[1, 1], [2, 2]]]),
        ));

        assert!((metric.value() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn accumulates_counts_across_batches() {
        let mut metric = MeanIoUMetric::<TestBackend>::new(3);

        metric.accumulate(&input(
            TensorData::from([[[1, 1], [1, 1]]]),
            TensorData::from([[[1, 1], [2, 2]]]),
        ));
        metric.accumulate(&input(
            TensorData::from([[[2, 2], [2, 2]]]),
            TensorData::from([[[2, 2], [2, 2]]]),
        ));

        // Class 1: 2 / 4, class 2: 4 / 6.
        let expected = 100.0 * (2.0 / 4.0 + 4.0 / 6.0) / 2.0;
        assert!((metric.value() - expected).abs() < 1e-9);
    }

    #[test]
    fn clear_starts_a_new_epoch() {
        let mut metric = MeanIoUMetric::<TestBackend>::new(3);
        metric.accumulate(&input(
            TensorData::from([[[1, 1], [2, 2]]]),
            TensorData::from([[[1, 1], [2, 2]]]),
        ));

        metric.clear();

        assert_eq!(metric.value(), 0.0);
    }

    #[test]
    #[should_panic(expected = "Invalid segmentation metric input")]
    fn panics_on_mismatched_input() {
        let mut metric = MeanIoUMetric::<TestBackend>::new(3);
        let outputs = Tensor::<TestBackend, 4>::zeros([1, 3, 4, 4], &Default::default());
        let targets = class_map(TensorData::from([[[1, 1], [2, 2]]]));

        metric.accumulate(&SegmentationInput::new(outputs, targets));
    }
}
