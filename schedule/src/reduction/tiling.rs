//! Tile configuration and the row/column heuristics that choose it.
//!
//! Tiles are 4-D over the projected input `[major, middle, minor / v, v]`, where `v` is the vector width.
//! A thread reads `tile_per_thread` elements, a block covers `tile_per_thread * num_threads`.

use tracing::debug;

use crate::config::ReductionConfig;
use crate::device::DeviceDescription;
use crate::error::*;

use super::dimensions::ReductionDimensions;

/// Per-thread tile, thread and block grid of a reduction launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileConfiguration {
    pub tile_per_thread: [usize; 4],
    pub num_threads: [usize; 4],
    pub num_blocks: [usize; 4],
}

impl TileConfiguration {
    /// # Panics
    ///
    /// If any extent is zero or the vector width is not a power of two.
    pub fn new(tile_per_thread: [usize; 4], num_threads: [usize; 4], num_blocks: [usize; 4]) -> Self {
        assert!(
            tile_per_thread.iter().chain(&num_threads).chain(&num_blocks).all(|&n| n > 0),
            "tile extents must be positive: {tile_per_thread:?} {num_threads:?} {num_blocks:?}"
        );
        assert!(tile_per_thread[3].is_power_of_two(), "vector width {} is not a power of two", tile_per_thread[3]);
        Self { tile_per_thread, num_threads, num_blocks }
    }

    /// Elements one block covers along each tile dimension.
    pub fn tile_per_block(&self) -> [usize; 4] {
        std::array::from_fn(|i| self.tile_per_thread[i] * self.num_threads[i])
    }

    pub fn vector_size(&self) -> usize {
        self.tile_per_thread[3]
    }

    pub fn total_threads(&self) -> usize {
        self.num_threads.iter().product()
    }

    pub fn total_blocks(&self) -> usize {
        self.num_blocks.iter().product()
    }
}

// ============================================================================
// Heuristics
// ============================================================================

/// Tiling of a row reduction `[reduced_major, kept, reduced_minor]`.
pub fn row_tiling(
    dimensions: &ReductionDimensions,
    device: &DeviceDescription,
    config: &ReductionConfig,
    element_bytes: usize,
) -> Result<TileConfiguration> {
    let [r_major, kept, r_minor] = dimensions.dimensions;
    let warp = device.warp_size;

    if r_major > config.batch_bound {
        debug!(r_major, bound = config.batch_bound, "rejecting batched row reduction");
        return BatchTooLargeSnafu { batch: r_major, bound: config.batch_bound }.fail();
    }

    let threads_per_block = round_down(config.threads_per_block.min(device.max_threads_per_block), warp).max(warp);
    let max_threads_x = round_down(config.max_threads_x.min(device.max_threads_per_block), warp).max(warp);

    let rows_per_warp = if r_minor < warp && warp % r_minor == 0 { warp / r_minor } else { 1 };

    let vector_size = if rows_per_warp > 1 {
        1
    } else {
        let limit = config.row_tile.min(config.max_vector).min(device.max_vector_bytes / element_bytes);
        largest_dividing_power_of_two(limit, |v| r_minor % v == 0)
    };

    let vectors = r_minor / vector_size;
    let threads_x = if rows_per_warp > 1 {
        r_minor
    } else {
        let per_lane = (config.row_tile / vector_size).max(1);
        max_threads_x.min(vectors.div_ceil(per_lane).next_multiple_of(warp))
    };
    let tile_x = vectors.div_ceil(threads_x);

    let mut threads_y = if 2 * threads_x <= threads_per_block {
        if kept * threads_x <= threads_per_block { kept } else { threads_per_block / threads_x }
    } else {
        1
    };
    while (threads_x * threads_y) % warp != 0 {
        threads_y += 1;
    }

    let tiling = TileConfiguration::new(
        [r_major, 1, tile_x, vector_size],
        [1, threads_y, threads_x, 1],
        [1, kept.div_ceil(threads_y), 1, 1],
    );
    debug!(
        dims = ?dimensions.dimensions,
        rows_per_warp,
        vector_size,
        threads_x,
        threads_y,
        tile_x,
        "row reduction tiling"
    );
    Ok(tiling)
}

/// Tiling of a column reduction `[kept_major, reduced, kept_minor]`.
pub fn column_tiling(
    dimensions: &ReductionDimensions,
    device: &DeviceDescription,
    config: &ReductionConfig,
    element_bytes: usize,
) -> TileConfiguration {
    let [k_major, reduced, k_minor] = dimensions.dimensions;
    let warp = device.warp_size;

    let threads_r = warp.min(device.max_threads_per_block / warp);
    let limit = config.column_vector.min(config.max_vector).min(device.max_vector_bytes / element_bytes);
    let vector_size = largest_dividing_power_of_two(limit, |v| k_minor % (warp * v) == 0);

    let tiling = TileConfiguration::new(
        [1, reduced.div_ceil(threads_r), 1, vector_size],
        [1, threads_r, warp, 1],
        [k_major, 1, (k_minor / vector_size).div_ceil(warp), 1],
    );
    debug!(dims = ?dimensions.dimensions, threads_r, vector_size, "column reduction tiling");
    tiling
}

/// Largest power of two not above `limit` that satisfies `accept`, or 1.
fn largest_dividing_power_of_two(limit: usize, accept: impl Fn(usize) -> bool) -> usize {
    let mut v = if limit == 0 { 1 } else { 1 << limit.ilog2() };
    while v > 1 && !accept(v) {
        v /= 2;
    }
    v
}

fn round_down(value: usize, multiple: usize) -> usize {
    value - value % multiple
}
