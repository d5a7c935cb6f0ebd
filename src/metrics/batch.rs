use burn::{prelude::*, tensor::Transaction};

use crate::error::MetricError;

/// Statistics of one (predictions, labels) pair, read back from the device.
///
/// Counts are stored as `f64` so the whole record can travel through a
/// [Reducer](super::Reducer) as one flat vector. Pixel counts stay exact up to 2^53.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatistics {
    pub correct: f64,
    pub labeled: f64,
    pub mae: f64,
    pub area_inter: Vec<f64>,
    pub area_union: Vec<f64>,
    pub bers: Vec<f64>,
    pub bers_count: Vec<f64>,
}

impl BatchStatistics {
    const SCALARS: usize = 3;

    /// Length of the flattened record for `num_classes` classes.
    pub fn flat_len(num_classes: usize) -> usize {
        Self::SCALARS + 4 * num_classes
    }

    /// Layout: `[correct, labeled, mae, inter.., union.., bers.., bers_count..]`.
    pub fn flatten(&self) -> Vec<f64> {
        let mut values = Vec::with_capacity(Self::flat_len(self.area_inter.len()));
        values.extend([self.correct, self.labeled, self.mae]);
        values.extend_from_slice(&self.area_inter);
        values.extend_from_slice(&self.area_union);
        values.extend_from_slice(&self.bers);
        values.extend_from_slice(&self.bers_count);
        values
    }

    pub fn from_flat(values: &[f64], num_classes: usize) -> Result<Self, MetricError> {
        let expected = Self::flat_len(num_classes);
        if values.len() != expected || num_classes == 0 {
            return Err(MetricError::ReducerMismatch {
                expected,
                actual: values.len(),
            });
        }

        let (scalars, per_class) = values.split_at(Self::SCALARS);
        let mut per_class = per_class.chunks_exact(num_classes).map(<[f64]>::to_vec);
        let mut next = || per_class.next().unwrap_or_default();

        Ok(Self {
            correct: scalars[0],
            labeled: scalars[1],
            mae: scalars[2],
            area_inter: next(),
            area_union: next(),
            bers: next(),
            bers_count: next(),
        })
    }
}

/// Per-pixel hard class prediction: arg-max over the class dimension.
///
/// # Shapes
///
/// - predictions: `[batch_size, num_classes, height, width]`
/// - output: `[batch_size, height, width]`
pub fn hard_predictions<B: Backend>(predictions: Tensor<B, 4>) -> Tensor<B, 3, Int> {
    predictions.argmax(1).squeeze(1)
}

/// Logits whose arg-max is `class_map`. Classes outside `[0, num_classes)` get an
/// all-zero column and therefore resolve to class 0.
pub fn one_hot_logits<B: Backend>(class_map: Tensor<B, 3, Int>, num_classes: usize) -> Tensor<B, 4> {
    let channels = (0..num_classes)
        .map(|class| {
            class_map
                .clone()
                .equal_elem(class as i64)
                .float()
                .unsqueeze_dim::<4>(1)
        })
        .collect();

    Tensor::cat(channels, 1)
}

/// Returns `(correct, labeled)`. Label 0 is background and counts toward neither.
pub fn batch_pix_accuracy<B: Backend>(
    predict: Tensor<B, 3, Int>,
    target: Tensor<B, 3, Int>,
) -> (Tensor<B, 1, Int>, Tensor<B, 1, Int>) {
    let labeled = target.clone().greater_elem(0).int();
    let correct = predict.equal(target).int() * labeled.clone();

    (correct.sum(), labeled.sum())
}

/// Returns per-class `(area_inter, area_union)`, each of length `num_classes`.
///
/// Values are shifted by one so that 0 can mark pixels that take part in no
/// histogram: predictions over background labels and mismatched pixels of the
/// intersection map.
pub fn batch_intersection_union<B: Backend>(
    predict: Tensor<B, 3, Int>,
    target: Tensor<B, 3, Int>,
    num_classes: usize,
) -> (Tensor<B, 1, Int>, Tensor<B, 1, Int>) {
    let labeled = target.clone().greater_elem(0).int();
    let predict = predict.add_scalar(1) * labeled;
    let target = target.add_scalar(1);

    let intersection = predict.clone() * predict.clone().equal(target.clone()).int();

    let area_inter = class_histogram(intersection, num_classes);
    let area_pred = class_histogram(predict, num_classes);
    let area_lab = class_histogram(target, num_classes);
    let area_union = area_pred + area_lab - area_inter.clone();

    (area_inter, area_union)
}

/// Mean absolute difference between predicted and labeled class indices, background included.
pub fn batch_mae<B: Backend>(predict: Tensor<B, 3, Int>, target: Tensor<B, 3, Int>) -> Tensor<B, 1> {
    (predict.float() - target.float()).abs().mean()
}

/// Per-class `(positives, true_positives)` plus the total number of matching pixels.
pub fn ber_counts<B: Backend>(
    predict: Tensor<B, 3, Int>,
    target: Tensor<B, 3, Int>,
    num_classes: usize,
) -> [Tensor<B, 1, Int>; 3] {
    let matched = predict.equal(target.clone()).int();

    let mut positives = Vec::with_capacity(num_classes);
    let mut true_positives = Vec::with_capacity(num_classes);
    for class in 0..num_classes {
        let valid = target.clone().equal_elem(class as i64).int();
        positives.push(valid.clone().sum());
        true_positives.push((matched.clone() * valid).sum());
    }

    [
        Tensor::cat(positives, 0),
        Tensor::cat(true_positives, 0),
        matched.sum(),
    ]
}

/// Balanced error rate per class, in percent, with the per-class valid count.
///
/// A class without positive pixels in this batch is left out entirely. Class 0 is
/// never scored but always reports a count of 1.
pub fn batch_ber(
    positives: &[f64],
    true_positives: &[f64],
    matched: f64,
    pixels: f64,
) -> (Vec<f64>, Vec<f64>) {
    let num_classes = positives.len();
    let mut bers = vec![0.0; num_classes];
    let mut bers_count = vec![0.0; num_classes];

    if let Some(background) = bers_count.first_mut() {
        *background = 1.0;
    }

    for class in 1..num_classes {
        let n_p = positives[class];
        if n_p == 0.0 {
            continue;
        }

        let n_n = pixels - n_p;
        let tp = true_positives[class];
        let tn = matched - tp;

        bers[class] = 100.0 * (1.0 - 0.5 * (tp / n_p + tn / n_n));
        bers_count[class] = 1.0;
    }

    (bers, bers_count)
}

/// Panics if any class has a larger intersection than union.
pub fn check_intersection_union(area_inter: &[f64], area_union: &[f64]) {
    assert!(
        !area_inter
            .iter()
            .zip(area_union)
            .any(|(inter, union)| inter > union),
        "Intersection area should be smaller than union area: {:?} vs {:?}",
        area_inter,
        area_union
    );
}

/// Computes every per-batch statistic on the device and reads them back in one
/// blocking transaction.
pub fn batch_statistics<B: Backend>(
    predictions: Tensor<B, 4>,
    labels: Tensor<B, 3, Int>,
    num_classes: usize,
) -> Result<BatchStatistics, MetricError> {
    let [batch_size, channels, height, width] = predictions.dims();
    let label_dims = labels.dims();

    if [batch_size, height, width] != label_dims {
        return Err(MetricError::ShapeMismatch {
            predictions: [batch_size, channels, height, width],
            labels: label_dims,
        });
    }

    if channels != num_classes {
        return Err(MetricError::ClassCountMismatch {
            expected: num_classes,
            actual: channels,
        });
    }

    let label_min = labels.clone().min();
    let label_max = labels.clone().max();
    let predict = hard_predictions(predictions);
    let (correct, labeled) = batch_pix_accuracy(predict.clone(), labels.clone());
    let (area_inter, area_union) =
        batch_intersection_union(predict.clone(), labels.clone(), num_classes);
    let mae = batch_mae(predict.clone(), labels.clone());
    let [positives, true_positives, matched] = ber_counts(predict, labels, num_classes);

    let [
        label_min,
        label_max,
        correct,
        labeled,
        area_inter,
        area_union,
        mae,
        positives,
        true_positives,
        matched,
    ]: [TensorData; 10] = Transaction::default()
        .register(label_min)
        .register(label_max)
        .register(correct)
        .register(labeled)
        .register(area_inter)
        .register(area_union)
        .register(mae)
        .register(positives)
        .register(true_positives)
        .register(matched)
        .execute()
        .try_into()
        .map_err(|data: Vec<TensorData>| {
            MetricError::TensorData(format!("expected 10 tensors, got {}", data.len()))
        })?;

    check_label_range(read_scalar(label_min)?, read_scalar(label_max)?, num_classes)?;

    let correct = read_scalar(correct)?;
    let labeled = read_scalar(labeled)?;
    assert!(
        correct <= labeled,
        "Correct area should be smaller than labeled area: {} > {}",
        correct,
        labeled
    );

    let area_inter = read_values(area_inter)?;
    let area_union = read_values(area_union)?;
    check_intersection_union(&area_inter, &area_union);

    let pixels = (batch_size * height * width) as f64;
    let (bers, bers_count) = batch_ber(
        &read_values(positives)?,
        &read_values(true_positives)?,
        read_scalar(matched)?,
        pixels,
    );

    Ok(BatchStatistics {
        correct,
        labeled,
        mae: read_scalar(mae)?,
        area_inter,
        area_union,
        bers,
        bers_count,
    })
}

/// Labels must be class indices in `[0, num_classes)`.
fn check_label_range(min: f64, max: f64, num_classes: usize) -> Result<(), MetricError> {
    let out_of_range = [min, max]
        .into_iter()
        .find(|&value| value < 0.0 || value >= num_classes as f64);

    match out_of_range {
        Some(value) => Err(MetricError::LabelOutOfRange {
            value: value as i64,
            num_classes,
        }),
        None => Ok(()),
    }
}

/// Counts of the values `1..=num_classes`, one bin per value. Anything else is dropped.
fn class_histogram<B: Backend>(values: Tensor<B, 3, Int>, num_classes: usize) -> Tensor<B, 1, Int> {
    let bins = (1..=num_classes)
        .map(|bin| values.clone().equal_elem(bin as i64).int().sum())
        .collect();

    Tensor::cat(bins, 0)
}

fn read_values(data: TensorData) -> Result<Vec<f64>, MetricError> {
    data.convert::<f64>()
        .to_vec::<f64>()
        .map_err(|err| MetricError::TensorData(format!("{:?}", err)))
}

fn read_scalar(data: TensorData) -> Result<f64, MetricError> {
    read_values(data)?
        .first()
        .copied()
        .ok_or_else(|| MetricError::TensorData("empty scalar tensor".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn class_map(data: TensorData) -> Tensor<TestBackend, 3, Int> {
        Tensor::from_data(
            data.convert::<<TestBackend as Backend>::IntElem>(),
            &Default::default(),
        )
    }

    fn to_vec<const D: usize, K>(tensor: Tensor<TestBackend, D, K>) -> Vec<f64>
    where
        K: burn::tensor::BasicOps<TestBackend>,
    {
        read_values(tensor.into_data()).unwrap()
    }

    #[test]
    fn one_hot_logits_arg_max_recovers_class_map() {
        let map = class_map(TensorData::from([[[0, 2], [1, 2]]]));

        let logits = one_hot_logits(map, 3);
        assert_eq!(logits.dims(), [1, 3, 2, 2]);

        let predict = hard_predictions(logits);
        assert_eq!(to_vec(predict), vec![0.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn pix_accuracy_ignores_background_labels() {
        let predict = class_map(TensorData::from([[[1, 1], [2, 0]]]));
        let target = class_map(TensorData::from([[[0, 1], [2, 2]]]));

        let (correct, labeled) = batch_pix_accuracy(predict, target);

        assert_eq!(to_vec(correct), vec![2.0]);
        assert_eq!(to_vec(labeled), vec![3.0]);
    }

    #[test]
    fn intersection_union_drops_predictions_over_background() {
        let predict = class_map(TensorData::from([[[1, 1], [0, 1]]]));
        let target = class_map(TensorData::from([[[0, 1], [1, 1]]]));

        let (inter, union) = batch_intersection_union(predict, target, 2);

        // The class-1 prediction over the background label is not part of any area.
        assert_eq!(to_vec(inter), vec![0.0, 2.0]);
        assert_eq!(to_vec(union), vec![2.0, 3.0]);
    }

    #[test]
    fn intersection_union_ignores_out_of_range_labels() {
        let predict = class_map(TensorData::from([[[1, 1], [1, 1]]]));
        let target = class_map(TensorData::from([[[1, 1], [5, 5]]]));

        let (inter, union) = batch_intersection_union(predict, target, 2);

        assert_eq!(to_vec(inter), vec![0.0, 2.0]);
        assert_eq!(to_vec(union), vec![0.0, 4.0]);
    }

    #[test]
    fn mae_includes_background_pixels() {
        let predict = class_map(TensorData::from([[[0, 2], [1, 1]]]));
        let target = class_map(TensorData::from([[[2, 2], [1, 0]]]));

        let mae = batch_mae(predict, target);

        assert_eq!(to_vec(mae), vec![0.75]);
    }

    #[test]
    fn ber_skips_classes_without_positive_pixels() {
        // Four pixels, three matches: class 1 fully hit, class 2 half hit, class 3 absent.
        let (bers, bers_count) = batch_ber(&[0.0, 2.0, 2.0, 0.0], &[0.0, 2.0, 1.0, 0.0], 3.0, 4.0);

        assert_eq!(bers, vec![0.0, 25.0, 25.0, 0.0]);
        assert_eq!(bers_count, vec![1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn ber_of_class_covering_every_pixel_is_undefined() {
        let (bers, bers_count) = batch_ber(&[0.0, 4.0], &[0.0, 4.0], 4.0, 4.0);

        assert!(bers[1].is_nan());
        assert_eq!(bers_count, vec![1.0, 1.0]);
    }

    #[test]
    fn statistics_of_scenario_batch() {
        let logits = one_hot_logits(class_map(TensorData::from([[[1, 1], [2, 0]]])), 3);
        let labels = class_map(TensorData::from([[[1, 1], [2, 2]]]));

        let stats = batch_statistics(logits, labels, 3).unwrap();

        assert_eq!(stats.correct, 3.0);
        assert_eq!(stats.labeled, 4.0);
        assert_eq!(stats.area_inter, vec![0.0, 2.0, 1.0]);
        assert_eq!(stats.area_union, vec![1.0, 2.0, 2.0]);
        assert_eq!(stats.mae, 0.5);
        assert_eq!(stats.bers, vec![0.0, 25.0, 25.0]);
        assert_eq!(stats.bers_count, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn flattened_layout_groups_per_class_vectors() {
        let stats = BatchStatistics {
            correct: 3.0,
            labeled: 4.0,
            mae: 0.5,
            area_inter: vec![0.0, 2.0],
            area_union: vec![1.0, 2.0],
            bers: vec![0.0, 25.0],
            bers_count: vec![1.0, 1.0],
        };

        let flat = stats.flatten();
        assert_eq!(flat.len(), BatchStatistics::flat_len(2));
        assert_eq!(&flat[..5], &[3.0, 4.0, 0.5, 0.0, 2.0]);
        assert_eq!(BatchStatistics::from_flat(&flat, 2).unwrap(), stats);
    }

    #[test]
    fn from_flat_rejects_wrong_length() {
        let err = BatchStatistics::from_flat(&[1.0; 10], 2).unwrap_err();

        assert_eq!(
            err,
            MetricError::ReducerMismatch {
                expected: 11,
                actual: 10
            }
        );
    }

    #[test]
    fn rejects_mismatched_spatial_shapes() {
        let logits = Tensor::<TestBackend, 4>::zeros([1, 3, 2, 2], &Default::default());
        let labels = class_map(TensorData::from([[[1, 1, 1], [2, 2, 2]]]));

        let err = batch_statistics(logits, labels, 3).unwrap_err();

        assert_eq!(
            err,
            MetricError::ShapeMismatch {
                predictions: [1, 3, 2, 2],
                labels: [1, 2, 3]
            }
        );
    }

    #[test]
    fn rejects_wrong_class_channel_count() {
        let logits = Tensor::<TestBackend, 4>::zeros([1, 2, 2, 2], &Default::default());
        let labels = class_map(TensorData::from([[[1, 1], [2, 2]]]));

        let err = batch_statistics(logits, labels, 3).unwrap_err();

        assert_eq!(
            err,
            MetricError::ClassCountMismatch {
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_labels_outside_the_class_range() {
        let logits = one_hot_logits(class_map(TensorData::from([[[2, 2], [1, 0]]])), 3);
        let labels = class_map(TensorData::from([[[255, 255], [1, 0]]]));

        let err = batch_statistics(logits, labels, 3).unwrap_err();

        assert_eq!(
            err,
            MetricError::LabelOutOfRange {
                value: 255,
                num_classes: 3
            }
        );
    }

    #[test]
    fn rejects_negative_labels() {
        let logits = Tensor::<TestBackend, 4>::zeros([1, 2, 1, 2], &Default::default());
        let labels = class_map(TensorData::from([[[-1, 1]]]));

        let err = batch_statistics(logits, labels, 2).unwrap_err();

        assert!(matches!(err, MetricError::LabelOutOfRange { value: -1, .. }));
    }

    #[test]
    #[should_panic(expected = "Intersection area should be smaller than union area")]
    fn adversarial_histogram_fails_loudly() {
        check_intersection_union(&[0.0, 5.0, 1.0], &[1.0, 4.0, 1.0]);
    }
}
