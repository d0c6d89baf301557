//! Parallel processing strategies

use crate::error::{Error, Result};
use rayon::prelude::*;

/// How tiles are distributed over threads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Build from a thread count: 0 means all cores, 1 means sequential
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            0 => ProcessingMode::Parallel,
            1 => ProcessingMode::Sequential,
            n => ProcessingMode::ParallelWith(n),
        }
    }

    /// Map `f` over `items`, giving each worker its own state from `init`.
    ///
    /// Output order follows input order.
    pub fn map_init<I, S, T, INIT, F>(&self, items: Vec<I>, init: INIT, f: F) -> Result<Vec<T>>
    where
        I: Send,
        T: Send,
        INIT: Fn() -> S + Sync + Send,
        F: Fn(&mut S, I) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => {
                let mut state = init();
                Ok(items.into_iter().map(|item| f(&mut state, item)).collect())
            }
            ProcessingMode::Parallel => Ok(items.into_par_iter().map_init(init, f).collect()),
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .map_err(|e| Error::ThreadPool(e.to_string()))?;
                Ok(pool.install(|| items.into_par_iter().map_init(init, f).collect()))
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_init_keeps_order() {
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(2),
        ] {
            let out = mode
                .map_init((0..100).collect(), || 10, |offset, i| i + *offset)
                .unwrap();
            assert_eq!(out, (10..110).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_from_threads() {
        assert_eq!(ProcessingMode::from_threads(0), ProcessingMode::Parallel);
        assert_eq!(ProcessingMode::from_threads(1), ProcessingMode::Sequential);
        assert_eq!(ProcessingMode::from_threads(4), ProcessingMode::ParallelWith(4));
    }
}
