//! Reduction emitter configuration.
//!
//! Provides typed configuration for the tile heuristics with bon builders.
//! Supports both explicit configuration and environment variable fallbacks.

use bon::bon;

/// Tuning knobs of the row and column tile heuristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionConfig {
    /// Target block size of row reductions.
    pub threads_per_block: usize,
    /// Upper bound on the lanes that share one row.
    pub max_threads_x: usize,
    /// Elements one lane aims to read per row before more lanes are added.
    pub row_tile: usize,
    /// Largest reduced-major extent a row reduction accepts.
    pub batch_bound: usize,
    /// Largest vector width in elements.
    pub max_vector: usize,
    /// Largest vector width of column reductions.
    pub column_vector: usize,
}

#[bon]
impl ReductionConfig {
    /// Create a reduction configuration with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(default = 256)] threads_per_block: usize,
        #[builder(default = 1024)] max_threads_x: usize,
        #[builder(default = 16)] row_tile: usize,
        #[builder(default = 8)] batch_bound: usize,
        #[builder(default = 4)] max_vector: usize,
        #[builder(default = 2)] column_vector: usize,
    ) -> Self {
        Self {
            threads_per_block: threads_per_block.max(1),
            max_threads_x: max_threads_x.max(1),
            row_tile: row_tile.max(1),
            batch_bound: batch_bound.max(1),
            max_vector: max_vector.max(1),
            column_vector: column_vector.max(1),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `STRATA_THREADS_PER_BLOCK` - Row reduction block size (default: 256)
    /// * `STRATA_MAX_THREADS_X` - Max lanes per row (default: 1024)
    /// * `STRATA_ROW_TILE` - Elements per lane per row (default: 16)
    /// * `STRATA_BATCH_BOUND` - Max reduced-major extent of row reductions (default: 8)
    /// * `STRATA_MAX_VECTOR` - Max vector width (default: 4)
    /// * `STRATA_COLUMN_VECTOR` - Max vector width of column reductions (default: 2)
    pub fn from_env() -> Self {
        let threads_per_block = std::env::var("STRATA_THREADS_PER_BLOCK").ok().and_then(|s| s.parse().ok());
        let max_threads_x = std::env::var("STRATA_MAX_THREADS_X").ok().and_then(|s| s.parse().ok());
        let row_tile = std::env::var("STRATA_ROW_TILE").ok().and_then(|s| s.parse().ok());
        let batch_bound = std::env::var("STRATA_BATCH_BOUND").ok().and_then(|s| s.parse().ok());
        let max_vector = std::env::var("STRATA_MAX_VECTOR").ok().and_then(|s| s.parse().ok());
        let column_vector = std::env::var("STRATA_COLUMN_VECTOR").ok().and_then(|s| s.parse().ok());

        Self::builder()
            .maybe_threads_per_block(threads_per_block)
            .maybe_max_threads_x(max_threads_x)
            .maybe_row_tile(row_tile)
            .maybe_batch_bound(batch_bound)
            .maybe_max_vector(max_vector)
            .maybe_column_vector(column_vector)
            .build()
    }
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
