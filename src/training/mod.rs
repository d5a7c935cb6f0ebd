pub mod learner;
pub mod metrics;

pub use learner::SegmentationOutput;
pub use metrics::{MeanIoUMetric, SegmentationInput};
