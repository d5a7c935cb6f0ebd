//! Confusion-matrix scoring and per-image helpers for stored class maps.
//!
//! Unlike [SegmentationMetric](super::SegmentationMetric), the matrix keeps background
//! pixels: every label in `[0, num_classes)` is counted, and anything else is treated
//! as an ignore index.

use std::fmt;

use burn::{prelude::*, tensor::Transaction};

use super::hard_predictions;
use crate::error::MetricError;

/// `counts[label * num_classes + predicted]` pixels, summed over every image added.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    num_classes: usize,
    counts: Vec<u64>,
    labeled: u64,
    correct: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionScores {
    /// `NaN` for classes that appear neither in labels nor in predictions.
    pub iou: Vec<f64>,
    pub mean_iou: f64,
    pub mean_iou_no_background: f64,
    pub pix_acc: f64,
}

impl fmt::Display for ConfusionScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pixAcc: {:.3}%, mIoU: {:.3}%, mIoU (no background): {:.3}%",
            100.0 * self.pix_acc,
            100.0 * self.mean_iou,
            100.0 * self.mean_iou_no_background
        )
    }
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            counts: vec![0; num_classes * num_classes],
            labeled: 0,
            correct: 0,
        }
    }

    /// Matrix of one pair of flattened class maps.
    pub fn from_class_maps(
        predict: &[i64],
        label: &[i64],
        num_classes: usize,
    ) -> Result<Self, MetricError> {
        let mut matrix = Self::new(num_classes);
        matrix.add_class_maps(predict, label)?;

        Ok(matrix)
    }

    /// Matrix of a batch of raw scores `[batch_size, num_classes, height, width]`
    /// against labels `[batch_size, height, width]`.
    pub fn from_tensors<B: Backend>(
        predictions: Tensor<B, 4>,
        labels: Tensor<B, 3, Int>,
        num_classes: usize,
    ) -> Result<Self, MetricError> {
        let [batch_size, channels, height, width] = predictions.dims();
        if [batch_size, height, width] != labels.dims() {
            return Err(MetricError::ShapeMismatch {
                predictions: [batch_size, channels, height, width],
                labels: labels.dims(),
            });
        }

        let [predict, label]: [TensorData; 2] = Transaction::default()
            .register(hard_predictions(predictions))
            .register(labels)
            .execute()
            .try_into()
            .map_err(|data: Vec<TensorData>| {
                MetricError::TensorData(format!("expected 2 tensors, got {}", data.len()))
            })?;

        Self::from_class_maps(&read_indices(predict)?, &read_indices(label)?, num_classes)
    }

    /// Counts one more pair of flattened class maps.
    pub fn add_class_maps(&mut self, predict: &[i64], label: &[i64]) -> Result<(), MetricError> {
        if predict.len() != label.len() {
            return Err(MetricError::LengthMismatch {
                predictions: predict.len(),
                labels: label.len(),
            });
        }

        let num_classes = self.num_classes;
        let in_range = move |value: i64| value >= 0 && (value as usize) < num_classes;
        let counted = move || {
            predict
                .iter()
                .zip(label)
                .filter(move |&(_, &actual)| in_range(actual))
        };

        if let Some((&value, _)) = counted().find(|&(&predicted, _)| !in_range(predicted)) {
            return Err(MetricError::PredictionOutOfRange { value, num_classes });
        }

        for (&predicted, &actual) in counted() {
            self.counts[actual as usize * num_classes + predicted as usize] += 1;
            self.labeled += 1;
            if predicted == actual {
                self.correct += 1;
            }
        }

        Ok(())
    }

    /// Adds the counts of another matrix over the same classes.
    pub fn merge(&mut self, other: &Self) -> Result<(), MetricError> {
        if other.num_classes != self.num_classes {
            return Err(MetricError::ClassCountMismatch {
                expected: self.num_classes,
                actual: other.num_classes,
            });
        }

        self.counts
            .iter_mut()
            .zip(&other.counts)
            .for_each(|(count, other)| *count += other);
        self.labeled += other.labeled;
        self.correct += other.correct;

        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn count(&self, label: usize, predicted: usize) -> u64 {
        self.counts[label * self.num_classes + predicted]
    }

    pub fn labeled(&self) -> u64 {
        self.labeled
    }

    pub fn correct(&self) -> u64 {
        self.correct
    }

    /// Per-class IoU from the matrix diagonal, with NaN-skipping means.
    pub fn score(&self) -> ConfusionScores {
        let iou: Vec<f64> = (0..self.num_classes)
            .map(|class| {
                let hit = self.count(class, class) as f64;
                let labeled: u64 = (0..self.num_classes).map(|p| self.count(class, p)).sum();
                let predicted: u64 = (0..self.num_classes).map(|l| self.count(l, class)).sum();

                hit / (labeled as f64 + predicted as f64 - hit)
            })
            .collect();

        let mean_iou_no_background = nan_mean(iou.get(1..).unwrap_or_default());

        ConfusionScores {
            mean_iou: nan_mean(&iou),
            mean_iou_no_background,
            pix_acc: self.correct as f64 / self.labeled as f64,
            iou,
        }
    }
}

/// Mean of the non-NaN values. `NaN` when there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|value| !value.is_nan())
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    sum / count as f64
}

/// Returns `(accuracy, correct, labeled)` of one image. Label 0 is background and counts
/// toward neither; accuracy is `NaN` when nothing is labeled.
pub fn pixel_accuracy(predict: &[i64], label: &[i64]) -> (f64, u64, u64) {
    let (correct, labeled) = predict
        .iter()
        .zip(label)
        .filter(|&(_, &actual)| actual > 0)
        .fold((0u64, 0u64), |(correct, labeled), (predicted, actual)| {
            (correct + u64::from(predicted == actual), labeled + 1)
        });

    (correct as f64 / labeled as f64, correct, labeled)
}

/// Per-class `(area_inter, area_union)` of one image, indexed by class.
///
/// Predictions over negative labels are dropped. Class 0 is not scored and always
/// reports zero areas.
pub fn intersection_and_union(
    predict: &[i64],
    label: &[i64],
    num_classes: usize,
) -> (Vec<f64>, Vec<f64>) {
    let mut area_inter = vec![0.0; num_classes];
    let mut area_pred = vec![0.0; num_classes];
    let mut area_lab = vec![0.0; num_classes];
    let scored = |value: i64| value >= 1 && (value as usize) < num_classes;

    for (&predicted, &actual) in predict.iter().zip(label) {
        let predicted = if actual >= 0 { predicted } else { 0 };

        if scored(predicted) {
            area_pred[predicted as usize] += 1.0;
            if predicted == actual {
                area_inter[predicted as usize] += 1.0;
            }
        }
        if scored(actual) {
            area_lab[actual as usize] += 1.0;
        }
    }

    let area_union = area_pred
        .iter()
        .zip(&area_lab)
        .zip(&area_inter)
        .map(|((pred, lab), inter)| pred + lab - inter)
        .collect();

    (area_inter, area_union)
}

fn read_indices(data: TensorData) -> Result<Vec<i64>, MetricError> {
    data.convert::<i64>()
        .to_vec::<i64>()
        .map_err(|err| MetricError::TensorData(format!("{:?}", err)))
}
