//! Parallel processing configuration
//!
//! [`crate::global_mean::global_mean`] reduces each time slice on Rayon's
//! global pool. This module lets callers size that pool once, up front.

use crate::errors::{PopUtilsError, Result};
use rayon::ThreadPoolBuilder;
use tracing::info;

/// Configuration for parallel processing
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    /// Set up the global Rayon thread pool with the specified configuration
    ///
    /// # Errors
    ///
    /// Returns [`PopUtilsError::ThreadPoolError`] if the global pool was
    /// already initialized.
    pub fn setup_global_pool(&self) -> Result<()> {
        if let Some(num_threads) = self.num_threads {
            ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| {
                    PopUtilsError::ThreadPoolError(format!(
                        "Failed to initialize thread pool with {} threads: {}",
                        num_threads, e
                    ))
                })?;

            info!("configured parallel processing with {} threads", num_threads);
        } else {
            info!("using default thread pool configuration");
        }

        Ok(())
    }

    /// Number of threads in the pool currently in use
    pub fn current_threads(&self) -> usize {
        rayon::current_num_threads()
    }

    /// Use every available CPU core
    pub fn all_cores() -> Self {
        Self {
            num_threads: Some(num_cpus::get()),
        }
    }

    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }
}
