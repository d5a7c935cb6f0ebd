use std::{fmt, marker::PhantomData};

use burn::prelude::*;

use super::{BatchStatistics, LocalReducer, Reducer, batch_statistics};
use crate::error::MetricError;

/// Running totals of an evaluation epoch.
///
/// Only [SegmentationMetric::update] adds to them and only [SegmentationMetric::reset]
/// clears them.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningTotals {
    pub total_correct: f64,
    pub total_label: f64,
    pub total_inter: Vec<f64>,
    pub total_union: Vec<f64>,
    /// One MAE value per batch. Averaged at the end rather than summed with a count.
    pub total_mae: Vec<f64>,
    pub total_bers: Vec<f64>,
    pub total_bers_count: Vec<f64>,
}

impl RunningTotals {
    fn new(num_classes: usize) -> Self {
        Self {
            total_correct: 0.0,
            total_label: 0.0,
            total_inter: vec![0.0; num_classes],
            total_union: vec![0.0; num_classes],
            total_mae: Vec::new(),
            total_bers: vec![0.0; num_classes],
            total_bers_count: vec![0.0; num_classes],
        }
    }

    fn fold(&mut self, stats: BatchStatistics) {
        self.total_correct += stats.correct;
        self.total_label += stats.labeled;
        add_assign(&mut self.total_inter, &stats.area_inter);
        add_assign(&mut self.total_union, &stats.area_union);
        self.total_mae.push(stats.mae);
        add_assign(&mut self.total_bers, &stats.bers);
        add_assign(&mut self.total_bers_count, &stats.bers_count);
    }
}

/// Per-class vectors, index 0 being the background.
#[derive(Debug, Clone, PartialEq)]
pub struct PerClassScores {
    pub iou: Vec<f64>,
    /// `NaN` for classes that never had a positive pixel.
    pub ber: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationScores {
    pub pix_acc: f64,
    pub miou: f64,
    pub mae: f64,
    pub mber: f64,
    pub per_class: Option<PerClassScores>,
}

impl fmt::Display for SegmentationScores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pixAcc: {:.3}%, mIoU: {:.3}%, MAE: {:.4}, mBER: {:.3}",
            100.0 * self.pix_acc,
            100.0 * self.miou,
            self.mae,
            self.mber
        )
    }
}

/// Accumulates pixel accuracy, IoU, MAE and BER over a stream of batches.
///
/// One instance per worker. `update` takes `&mut self`; concurrent updates of the same
/// instance are the caller's problem. In distributed mode each `update` is a
/// collective call: all workers must update the same number of times, in the same order.
#[derive(Debug, Clone)]
pub struct SegmentationMetric<B: Backend, R: Reducer = LocalReducer> {
    num_classes: usize,
    distributed: bool,
    num_workers: usize,
    reducer: R,
    totals: RunningTotals,
    _b: PhantomData<B>,
}

impl<B: Backend, R: Reducer> SegmentationMetric<B, R> {
    pub(crate) fn new(num_classes: usize, distributed: bool, num_workers: usize, reducer: R) -> Self {
        Self {
            num_classes,
            distributed,
            num_workers,
            reducer,
            totals: RunningTotals::new(num_classes),
            _b: PhantomData,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn is_distributed(&self) -> bool {
        self.distributed
    }

    pub fn totals(&self) -> &RunningTotals {
        &self.totals
    }

    /// Folds one batch into the running totals.
    ///
    /// # Shapes
    ///
    /// - predictions: `[batch_size, num_classes, height, width]` (raw class scores)
    /// - labels: `[batch_size, height, width]` (class indices, 0 is background)
    pub fn update(
        &mut self,
        predictions: Tensor<B, 4>,
        labels: Tensor<B, 3, Int>,
    ) -> Result<(), MetricError> {
        let stats = batch_statistics(predictions, labels, self.num_classes)?;

        let stats = if self.distributed {
            let reduced = self.reducer.all_reduce_sum(stats.flatten())?;
            BatchStatistics::from_flat(&reduced, self.num_classes)?
        } else {
            stats
        };

        tracing::debug!(
            correct = stats.correct,
            labeled = stats.labeled,
            mae = stats.mae,
            "folding batch statistics"
        );
        self.totals.fold(stats);

        Ok(())
    }

    /// Folds each pair in order, as for multi-scale or multi-output evaluation.
    pub fn update_multi<I>(&mut self, pairs: I) -> Result<(), MetricError>
    where
        I: IntoIterator<Item = (Tensor<B, 4>, Tensor<B, 3, Int>)>,
    {
        for (predictions, labels) in pairs {
            self.update(predictions, labels)?;
        }

        Ok(())
    }

    /// Finalizes the scores from the running totals without changing them.
    pub fn get(&self, return_per_class: bool) -> SegmentationScores {
        let totals = &self.totals;

        let pix_acc = totals.total_correct / (f64::EPSILON + totals.total_label);

        let iou: Vec<f64> = totals
            .total_inter
            .iter()
            .zip(&totals.total_union)
            .map(|(inter, union)| inter / (f64::EPSILON + union))
            .collect();
        let miou = mean(&iou[1..]);

        // Per-batch values were summed over workers and never divided back.
        // TODO: reduce MAE as a sum and a pixel count like the other scores.
        let mae = mean(&totals.total_mae) / self.num_workers as f64;

        let ber: Vec<f64> = totals
            .total_bers
            .iter()
            .zip(&totals.total_bers_count)
            .map(|(sum, count)| sum / count)
            .collect();
        let mber = mean(&ber[1..]);

        SegmentationScores {
            pix_acc,
            miou,
            mae,
            mber,
            per_class: return_per_class.then_some(PerClassScores { iou, ber }),
        }
    }

    pub fn reset(&mut self) {
        self.totals = RunningTotals::new(self.num_classes);
    }
}

fn add_assign(totals: &mut [f64], values: &[f64]) {
    totals
        .iter_mut()
        .zip(values)
        .for_each(|(total, value)| *total += value);
}

/// `NaN` for an empty slice.
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
