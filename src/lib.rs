pub mod error;
pub mod metrics;

#[cfg(any(feature = "dataset", feature = "visualize"))]
pub mod mask;

#[cfg(feature = "dataset")]
pub mod dataset;

#[cfg(feature = "training")]
pub mod training;

#[cfg(feature = "visualize")]
pub mod visualize;

pub use error::MetricError;
pub use metrics::{
    ConfusionMatrix, ConfusionScores, LocalReducer, PerClassScores, Reducer, SegmentationMetric,
    SegmentationMetricConfig, SegmentationScores, ThreadGroup, ThreadReducer,
};

#[cfg(feature = "dataset")]
pub use dataset::{MaskPairDataset, MaskPairItem};

#[cfg(feature = "training")]
pub use training::{MeanIoUMetric, SegmentationInput, SegmentationOutput};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
