use smallvec::{SmallVec, smallvec};
use tracing::debug;

use strata_ir::{AffineExpr, IndexingMap, Interval, Variable};

use super::ReductionEmitter;
use crate::reduction::dimensions::ReductionDimensions;
use crate::reduction::maps::{self, BLOCK, THREAD};
use crate::reduction::program::{ReductionProgram, ReductionStep};
use crate::reduction::tiling::TileConfiguration;

/// Reduction of contiguous elements: each row is reduced by `threads_x` lanes, `threads_y` rows per block.
///
/// Lanes of a row first reduce within their warp. Rows wider than a warp publish one partial per warp to
/// shared memory, and the first warp of the row folds those after the barrier. Rows narrower than a warp
/// share the warp with other rows.
///
/// A lane does not read one contiguous run of its row. Iteration `s2` of the tile reads the `v`-wide vector
/// at `(lane + s2 * threads_x) * v`, so the lanes of a warp cover consecutive vectors on every iteration and
/// each lane strides by `threads_x * v` elements between its own vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReduction {
    dimensions: [usize; 3],
    tiling: TileConfiguration,
    pub(super) warp_size: usize,
    num_groups: usize,
}

impl RowReduction {
    pub fn new(
        dimensions: &ReductionDimensions,
        tiling: &TileConfiguration,
        warp_size: usize,
        num_groups: usize,
    ) -> Self {
        Self { dimensions: dimensions.dimensions, tiling: *tiling, warp_size, num_groups }
    }

    pub fn threads_x(&self) -> usize {
        self.tiling.num_threads[2]
    }

    pub fn threads_y(&self) -> usize {
        self.tiling.num_threads[1]
    }

    pub fn rows_per_warp(&self) -> usize {
        let r_minor = self.dimensions[2];
        if r_minor < self.warp_size && self.warp_size % r_minor == 0 { self.warp_size / r_minor } else { 1 }
    }

    pub fn warps_per_row(&self) -> usize {
        self.threads_x().div_ceil(self.warp_size)
    }

    /// `(t floordiv Tx, t mod Tx)`: the row of the block and the lane within the row.
    fn thread_coordinates(&self) -> (AffineExpr, AffineExpr) {
        let [_, y, x, _] = maps::delinearize(AffineExpr::dim(THREAD), &self.tiling.num_threads);
        (y, x)
    }

    /// Kept element of the thread's row.
    fn row(&self) -> AffineExpr {
        let [_, block_y, _, _] = maps::delinearize(AffineExpr::dim(BLOCK), &self.tiling.num_blocks);
        let (thread_y, _) = self.thread_coordinates();
        block_y * self.threads_y() as i64 + thread_y
    }

    fn domain(&self) -> Vec<Variable> {
        maps::launch_domain(&self.tiling, self.num_groups)
    }
}

impl ReductionEmitter for RowReduction {
    fn input_map(&self) -> IndexingMap {
        let [_, kept, r_minor] = self.dimensions;
        let vector_size = self.tiling.vector_size();
        let (_, thread_x) = self.thread_coordinates();

        let x = thread_x + AffineExpr::symbol(2) * self.threads_x() as i64;
        let results = vec![AffineExpr::symbol(0), self.row(), x.clone() * vector_size as i64 + AffineExpr::symbol(3)];
        let constraints = vec![
            (self.row(), Interval::extent(kept)),
            (x, Interval::extent(r_minor / vector_size)),
        ];
        maps::indexing_map(self.domain(), maps::tile_symbols(&self.tiling), results, constraints)
    }

    fn output_map(&self) -> IndexingMap {
        let kept = self.dimensions[1];
        let (_, thread_x) = self.thread_coordinates();
        let constraints = vec![(thread_x, Interval::point(0)), (self.row(), Interval::extent(kept))];
        maps::indexing_map(self.domain(), maps::tile_symbols(&self.tiling), vec![self.row()], constraints)
    }

    fn shared_write_map(&self) -> Option<IndexingMap> {
        if self.warps_per_row() <= 1 {
            return None;
        }
        let warp = self.warp_size as i64;
        let (thread_y, thread_x) = self.thread_coordinates();
        let lane = AffineExpr::dim(THREAD).modulo(warp);
        Some(maps::indexing_map(
            self.domain(),
            Vec::new(),
            vec![thread_y, thread_x.floor_div(warp)],
            vec![(lane, Interval::point(0))],
        ))
    }

    fn shared_read_map(&self) -> Option<IndexingMap> {
        let warps_per_row = self.warps_per_row();
        if warps_per_row <= 1 {
            return None;
        }
        let (thread_y, thread_x) = self.thread_coordinates();
        let slot = thread_x.clone() + AffineExpr::symbol(0) * self.warp_size as i64;
        let chunks = Variable::new("slot_chunk", Interval::extent(warps_per_row.div_ceil(self.warp_size)));
        Some(maps::indexing_map(
            self.domain(),
            vec![chunks],
            vec![thread_y, slot.clone()],
            vec![(thread_x, Interval::extent(self.warp_size)), (slot, Interval::extent(warps_per_row))],
        ))
    }

    fn shared_tile(&self) -> Option<SmallVec<[usize; 3]>> {
        (self.warps_per_row() > 1).then(|| smallvec![self.threads_y(), self.warps_per_row()])
    }

    fn program(&self) -> ReductionProgram {
        let mut steps = vec![ReductionStep::AccumulateTile { lanes: 1, lane_symbol: None }];
        push_shuffle(&mut steps, self.threads_x().min(self.warp_size) / 2);

        if let Some(tile) = self.shared_tile() {
            let warps_per_row = self.warps_per_row();
            steps.push(ReductionStep::StoreShared { tile, lane_symbol: None });
            steps.push(ReductionStep::Barrier);
            steps.push(ReductionStep::LoadShared { lane_symbol: None });
            push_shuffle(&mut steps, self.warp_size.min(warps_per_row.next_power_of_two()) / 2);
        }
        steps.push(ReductionStep::WriteOutputs { lane_symbol: None });

        debug!(
            rows_per_warp = self.rows_per_warp(),
            warps_per_row = self.warps_per_row(),
            steps = steps.len(),
            "emitted row reduction"
        );
        ReductionProgram { steps }
    }
}

pub(super) fn push_shuffle(steps: &mut Vec<ReductionStep>, max_distance: usize) {
    if max_distance > 0 {
        steps.push(ReductionStep::ShuffleReduce { max_distance });
    }
}
