//! Row and column reduction strategies.
//!
//! A strategy turns the tile configuration into launch-level indexing maps and a [`ReductionProgram`]. The
//! set of strategies is closed; callers dispatch through [`ReductionStrategy`].

mod column;
mod row;

pub use column::ColumnReduction;
pub use row::RowReduction;

use smallvec::SmallVec;
use strata_ir::IndexingMap;

use super::dimensions::{ReductionDimensions, ReductionKind};
use super::program::ReductionProgram;
use super::tiling::TileConfiguration;

/// What a strategy provides to the emitter.
///
/// Maps are over the launch domain `(thread_id, block_id, group_id)` and not yet restricted to a group.
pub(crate) trait ReductionEmitter {
    /// Thread to canonical operand element.
    fn input_map(&self) -> IndexingMap;

    /// Thread to kept element it writes.
    fn output_map(&self) -> IndexingMap;

    /// Thread to the shared slot it publishes, if the strategy exchanges partials through shared memory.
    fn shared_write_map(&self) -> Option<IndexingMap>;

    fn shared_read_map(&self) -> Option<IndexingMap>;

    /// Shape of the shared tile of one hero.
    fn shared_tile(&self) -> Option<SmallVec<[usize; 3]>>;

    fn program(&self) -> ReductionProgram;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReductionStrategy {
    Row(RowReduction),
    Column(ColumnReduction),
}

impl ReductionStrategy {
    pub fn new(
        dimensions: &ReductionDimensions,
        tiling: &TileConfiguration,
        warp_size: usize,
        num_groups: usize,
    ) -> Self {
        match dimensions.kind {
            ReductionKind::Row => Self::Row(RowReduction::new(dimensions, tiling, warp_size, num_groups)),
            ReductionKind::Column => Self::Column(ColumnReduction::new(dimensions, tiling, warp_size, num_groups)),
        }
    }

    pub fn kind(&self) -> ReductionKind {
        match self {
            Self::Row(_) => ReductionKind::Row,
            Self::Column(_) => ReductionKind::Column,
        }
    }

    pub fn warp_size(&self) -> usize {
        match self {
            Self::Row(row) => row.warp_size,
            Self::Column(column) => column.warp_size,
        }
    }

    fn emitter(&self) -> &dyn ReductionEmitter {
        match self {
            Self::Row(row) => row,
            Self::Column(column) => column,
        }
    }

    pub fn input_map(&self) -> IndexingMap {
        self.emitter().input_map()
    }

    pub fn output_map(&self) -> IndexingMap {
        self.emitter().output_map()
    }

    pub fn shared_write_map(&self) -> Option<IndexingMap> {
        self.emitter().shared_write_map()
    }

    pub fn shared_read_map(&self) -> Option<IndexingMap> {
        self.emitter().shared_read_map()
    }

    pub fn shared_tile(&self) -> Option<SmallVec<[usize; 3]>> {
        self.emitter().shared_tile()
    }

    pub fn program(&self) -> ReductionProgram {
        self.emitter().program()
    }

    /// Shared memory one block allocates for `num_heroes` heroes.
    pub fn shared_memory_bytes(&self, num_heroes: usize, element_bytes: usize) -> usize {
        self.shared_tile().map_or(0, |tile| tile.iter().product::<usize>() * num_heroes * element_bytes)
    }
}
