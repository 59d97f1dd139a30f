//! Rayon-based parallelisation utilities.
//!
//! The engine's reduction is a data-parallel fan-out over the path
//! dimension with a three-phase contract: a per-worker initializer builds
//! thread-local state, the per-item body mutates only that state, and a
//! finalizer merges thread-local states under the reduction barrier. No
//! item-level locking is needed; floating-point summation order is not
//! bit-reproducible across worker counts and is not required to be.

use rayon::prelude::*;

/// Batch size for chunked parallel processing.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Configuration for parallel execution.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParallelConfig {
    /// Whether to fan out at all.
    pub enabled: bool,
    /// Minimum items per worker batch.
    pub batch_size: usize,
    /// Minimum item count before using parallelism.
    pub parallel_threshold: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_size: DEFAULT_BATCH_SIZE,
            parallel_threshold: num_cpus::get().max(1) * 2,
        }
    }
}

impl ParallelConfig {
    /// Configuration that always runs sequentially.
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether a workload of `n_items` should fan out.
    #[inline]
    pub fn should_parallelise(&self, n_items: usize) -> bool {
        self.enabled && n_items >= self.parallel_threshold
    }
}

/// Runs the three-phase fold over `0..n_items`.
///
/// * `init` builds fresh thread-local state per worker batch.
/// * `body` folds one item into the thread-local state.
/// * `merge` combines two partial states; it must be associative and
///   commutative because worker completion order is unspecified.
pub fn fold_items<S, I, B, M>(
    config: &ParallelConfig,
    n_items: usize,
    init: I,
    body: B,
    merge: M,
) -> S
where
    S: Send,
    I: Fn() -> S + Sync + Send,
    B: Fn(&mut S, usize) + Sync + Send,
    M: Fn(S, S) -> S + Sync + Send,
{
    if !config.should_parallelise(n_items) {
        let mut state = init();
        for i in 0..n_items {
            body(&mut state, i);
        }
        return state;
    }

    (0..n_items)
        .into_par_iter()
        .with_min_len(config.batch_size.max(1))
        .fold(&init, |mut state, i| {
            body(&mut state, i);
            state
        })
        .reduce(&init, merge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_and_parallel_agree() {
        let sum_via = |config: &ParallelConfig| {
            fold_items(
                config,
                1000,
                || 0u64,
                |acc, i| *acc += i as u64,
                |a, b| a + b,
            )
        };

        let expected: u64 = (0..1000).sum();
        assert_eq!(sum_via(&ParallelConfig::sequential()), expected);
        assert_eq!(
            sum_via(&ParallelConfig {
                enabled: true,
                batch_size: 16,
                parallel_threshold: 1,
            }),
            expected
        );
    }

    #[test]
    fn test_threshold_gates_parallelism() {
        let config = ParallelConfig {
            enabled: true,
            batch_size: 8,
            parallel_threshold: 100,
        };
        assert!(!config.should_parallelise(10));
        assert!(config.should_parallelise(100));
        assert!(!ParallelConfig::sequential().should_parallelise(1_000_000));
    }

    #[test]
    fn test_empty_workload_returns_init() {
        let v = fold_items(
            &ParallelConfig::default(),
            0,
            || 42usize,
            |_, _| unreachable!(),
            |a, _| a,
        );
        assert_eq!(v, 42);
    }
}
