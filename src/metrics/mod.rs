//! Running segmentation scores: pixel accuracy, mIoU, MAE and balanced error rate.
//!
//! Intersection and union areas are accumulated as global counts over the whole
//! evaluation, never averaged per batch, so the final mIoU equals the one computed
//! over the concatenation of every batch.

mod accumulator;
mod batch;
mod config;
mod confusion;
mod reducer;

pub use accumulator::{PerClassScores, RunningTotals, SegmentationMetric, SegmentationScores};
pub use batch::{
    BatchStatistics, batch_ber, batch_intersection_union, batch_mae, batch_pix_accuracy,
    batch_statistics, ber_counts, check_intersection_union, hard_predictions, one_hot_logits,
};
pub use config::SegmentationMetricConfig;
pub use confusion::{
    ConfusionMatrix, ConfusionScores, intersection_and_union, nan_mean, pixel_accuracy,
};
pub use reducer::{LocalReducer, Reducer, ThreadGroup, ThreadReducer};
