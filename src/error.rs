use thiserror::Error;

/// Errors raised when a caller breaks the accumulator's input contract.
///
/// Invariant violations inside the statistics themselves (more correct pixels than
/// labeled ones, intersection larger than union) are not represented here: they
/// abort with a panic.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Shape mismatch: predictions {predictions:?} vs labels {labels:?}")]
    ShapeMismatch {
        predictions: [usize; 4],
        labels: [usize; 3],
    },

    #[error("Expected {expected} class channels in predictions, got {actual}")]
    ClassCountMismatch { expected: usize, actual: usize },

    #[error("Label value {value} is outside [0, {num_classes})")]
    LabelOutOfRange { value: i64, num_classes: usize },

    #[error("Predicted class {value} is outside [0, {num_classes})")]
    PredictionOutOfRange { value: i64, num_classes: usize },

    #[error("Length mismatch: {predictions} predicted pixels vs {labels} labels")]
    LengthMismatch { predictions: usize, labels: usize },

    #[error("Reducer mismatch: expected {expected} values, got {actual}")]
    ReducerMismatch { expected: usize, actual: usize },

    #[error("Failed to read tensor data: {0}")]
    TensorData(String),
}
