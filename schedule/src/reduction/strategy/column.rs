use smallvec::{SmallVec, smallvec};
use tracing::debug;

use strata_ir::{AffineExpr, IndexingMap, Interval, Variable};

use super::ReductionEmitter;
use super::row::push_shuffle;
use crate::reduction::dimensions::ReductionDimensions;
use crate::reduction::maps::{self, BLOCK, THREAD};
use crate::reduction::program::{ReductionProgram, ReductionStep};
use crate::reduction::tiling::TileConfiguration;

/// Reduction across rows: a warp covers `warp_size` adjacent kept elements (times the vector width) and
/// `threads_r` warps stride down the reduced dimension.
///
/// Partials are transposed through shared memory so that the `threads_r` partials of one kept element end up
/// in adjacent lanes of one warp, which then finish with a shuffle tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReduction {
    dimensions: [usize; 3],
    tiling: TileConfiguration,
    pub(super) warp_size: usize,
    num_groups: usize,
}

impl ColumnReduction {
    pub fn new(
        dimensions: &ReductionDimensions,
        tiling: &TileConfiguration,
        warp_size: usize,
        num_groups: usize,
    ) -> Self {
        Self { dimensions: dimensions.dimensions, tiling: *tiling, warp_size, num_groups }
    }

    pub fn threads_r(&self) -> usize {
        self.tiling.num_threads[1]
    }

    /// `(bk0, bk1)`: kept-major element and block of `warp_size` kept-minor vectors.
    fn block_coordinates(&self) -> (AffineExpr, AffineExpr) {
        let [major, _, minor, _] = maps::delinearize(AffineExpr::dim(BLOCK), &self.tiling.num_blocks);
        (major, minor)
    }

    fn domain(&self) -> Vec<Variable> {
        maps::launch_domain(&self.tiling, self.num_groups)
    }

    /// The vector lane of the shared tile.
    fn lane_symbol(&self) -> Vec<Variable> {
        vec![Variable::new("vector_lane", Interval::extent(self.tiling.vector_size()))]
    }

    /// Number of kept-minor vectors.
    fn kept_vectors(&self) -> usize {
        self.dimensions[2] / self.tiling.vector_size()
    }
}

impl ReductionEmitter for ColumnReduction {
    fn input_map(&self) -> IndexingMap {
        let reduced = self.dimensions[1];
        let [_, thread_r, thread_k, _] = maps::delinearize(AffineExpr::dim(THREAD), &self.tiling.num_threads);
        let (block_major, block_minor) = self.block_coordinates();

        let row = thread_r + AffineExpr::symbol(1) * self.threads_r() as i64;
        let column = block_minor * self.warp_size as i64 + thread_k;
        let results = vec![
            block_major,
            row.clone(),
            column.clone() * self.tiling.vector_size() as i64 + AffineExpr::symbol(3),
        ];
        let constraints = vec![(row, Interval::extent(reduced)), (column, Interval::extent(self.kept_vectors()))];
        maps::indexing_map(self.domain(), maps::tile_symbols(&self.tiling), results, constraints)
    }

    fn output_map(&self) -> IndexingMap {
        let threads_r = self.threads_r() as i64;
        let thread = AffineExpr::dim(THREAD);
        let (block_major, block_minor) = self.block_coordinates();

        let column = block_minor * self.warp_size as i64 + thread.clone().floor_div(threads_r);
        let results =
            vec![block_major, column.clone() * self.tiling.vector_size() as i64 + AffineExpr::symbol(3)];
        let constraints = vec![
            (thread.modulo(threads_r), Interval::point(0)),
            (column, Interval::extent(self.kept_vectors())),
        ];
        maps::indexing_map(self.domain(), maps::tile_symbols(&self.tiling), results, constraints)
    }

    fn shared_write_map(&self) -> Option<IndexingMap> {
        let warp = self.warp_size as i64;
        let thread = AffineExpr::dim(THREAD);
        let results = vec![AffineExpr::symbol(0), thread.clone().modulo(warp), thread.floor_div(warp)];
        Some(maps::indexing_map(self.domain(), self.lane_symbol(), results, Vec::new()))
    }

    fn shared_read_map(&self) -> Option<IndexingMap> {
        let threads_r = self.threads_r() as i64;
        let thread = AffineExpr::dim(THREAD);
        let results = vec![AffineExpr::symbol(0), thread.clone().floor_div(threads_r), thread.modulo(threads_r)];
        Some(maps::indexing_map(self.domain(), self.lane_symbol(), results, Vec::new()))
    }

    /// `[vector_size, warp_size, threads_r + 1]`, with one column of padding.
    fn shared_tile(&self) -> Option<SmallVec<[usize; 3]>> {
        Some(smallvec![self.tiling.vector_size(), self.warp_size, self.threads_r() + 1])
    }

    fn program(&self) -> ReductionProgram {
        let vector_size = self.tiling.vector_size();
        let mut steps = vec![
            ReductionStep::AccumulateTile { lanes: vector_size, lane_symbol: Some(3) },
            ReductionStep::StoreShared { tile: self.shared_tile().unwrap_or_default(), lane_symbol: Some(0) },
            ReductionStep::Barrier,
            ReductionStep::LoadShared { lane_symbol: Some(0) },
        ];
        push_shuffle(&mut steps, self.threads_r() / 2);
        steps.push(ReductionStep::WriteOutputs { lane_symbol: Some(3) });

        debug!(threads_r = self.threads_r(), vector_size, steps = steps.len(), "emitted column reduction");
        ReductionProgram { steps }
    }
}
