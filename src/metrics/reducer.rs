use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};

use crate::error::MetricError;

/// Collective sum across the workers of a distributed evaluation.
///
/// Every worker must call [all_reduce_sum](Reducer::all_reduce_sum) the same number of
/// times, in the same order, with vectors of the same length. Each call returns the
/// element-wise sum over all workers, identical on every worker.
pub trait Reducer {
    fn all_reduce_sum(&self, values: Vec<f64>) -> Result<Vec<f64>, MetricError>;
}

/// Single-process reducer: returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalReducer;

impl Reducer for LocalReducer {
    fn all_reduce_sum(&self, values: Vec<f64>) -> Result<Vec<f64>, MetricError> {
        Ok(values)
    }
}

/// In-process collective for workers running on separate threads.
pub struct ThreadGroup;

impl ThreadGroup {
    /// One reducer handle per worker. Each handle is meant to be moved to its own thread.
    pub fn new(workers: usize) -> Vec<ThreadReducer> {
        assert!(workers >= 1, "A thread group needs at least one worker");

        let shared = Arc::new(SharedRound {
            barrier: Barrier::new(workers),
            state: Mutex::new(RoundState::default()),
        });

        (0..workers)
            .map(|rank| ThreadReducer {
                shared: Arc::clone(&shared),
                rank,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ThreadReducer {
    shared: Arc<SharedRound>,
    rank: usize,
}

#[derive(Debug)]
struct SharedRound {
    barrier: Barrier,
    state: Mutex<RoundState>,
}

#[derive(Debug, Default)]
struct RoundState {
    sum: Vec<f64>,
    contributions: usize,
    mismatch: Option<(usize, usize)>,
}

impl ThreadReducer {
    pub fn rank(&self) -> usize {
        self.rank
    }

    fn state(&self) -> MutexGuard<'_, RoundState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Reducer for ThreadReducer {
    fn all_reduce_sum(&self, values: Vec<f64>) -> Result<Vec<f64>, MetricError> {
        {
            let mut state = self.state();
            if state.contributions == 0 {
                state.sum = values;
            } else if state.sum.len() != values.len() {
                state.mismatch = Some((state.sum.len(), values.len()));
            } else {
                state
                    .sum
                    .iter_mut()
                    .zip(&values)
                    .for_each(|(acc, value)| *acc += value);
            }
            state.contributions += 1;
        }

        // Every contribution is in.
        self.shared.barrier.wait();

        let result = {
            let state = self.state();
            match state.mismatch {
                Some((expected, actual)) => Err(MetricError::ReducerMismatch { expected, actual }),
                None => Ok(state.sum.clone()),
            }
        };

        // Every worker has read the sum; one of them clears the round.
        if self.shared.barrier.wait().is_leader() {
            *self.state() = RoundState::default();
        }
        self.shared.barrier.wait();

        result
    }
}
