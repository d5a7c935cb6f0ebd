use burn::prelude::*;

use super::{LocalReducer, Reducer, SegmentationMetric};

/// Configuration to create a [SegmentationMetric] using [init](SegmentationMetricConfig::init)
/// or [init_with_reducer](SegmentationMetricConfig::init_with_reducer).
#[derive(Config, Debug)]
pub struct SegmentationMetricConfig {
    /// Number of classes, background (index 0) included.
    pub num_classes: usize,

    /// Sum every per-batch statistic across workers before folding it into the totals.
    #[config(default = false)]
    pub distributed: bool,

    /// Number of parallel workers. Only used to scale the final MAE.
    #[config(default = 1)]
    pub num_workers: usize,
}

impl SegmentationMetricConfig {
    /// Accumulator with the identity reducer, for single-process evaluation.
    pub fn init<B: Backend>(&self) -> SegmentationMetric<B> {
        self.init_with_reducer(LocalReducer)
    }

    pub fn init_with_reducer<B: Backend, R: Reducer>(&self, reducer: R) -> SegmentationMetric<B, R> {
        self.assertions();
        SegmentationMetric::new(self.num_classes, self.distributed, self.num_workers, reducer)
    }

    /// The same configuration without worker reduction, for a run in one process.
    ///
    /// A loaded multi-worker config would otherwise divide MAE by a worker count
    /// that no reducer backs.
    pub fn single_process(self) -> Self {
        if self.distributed || self.num_workers != 1 {
            tracing::warn!(
                distributed = self.distributed,
                num_workers = self.num_workers,
                "running in a single process, ignoring the worker settings"
            );
        }

        self.with_distributed(false).with_num_workers(1)
    }

    fn assertions(&self) {
        assert!(
            self.num_classes >= 1,
            "Number of classes must include at least the background class. Got {}",
            self.num_classes
        );

        assert!(
            self.num_workers >= 1,
            "Number of workers must be positive. Got {}",
            self.num_workers
        );
    }
}
