//! Reduction fusion emitter.
//!
//! [`ReductionFusion`] is built once per fusion. Construction runs the [`ShapeAnalysis`], picks the row or
//! column [`ReductionStrategy`] and checks the shared-memory budget; afterwards every query is a pure function
//! of that state:
//!
//! - [`ReductionFusion::launch_dimensions`] - grid and block extents
//! - [`ReductionFusion::emit_group`] - indexing maps and program of one group
//! - [`ReductionFusion::thread_id_to_input_indexing`] / [`ReductionFusion::thread_id_to_output_indexing`] -
//!   thread-to-element maps onto the physical shapes of the fusion

pub mod analysis;
pub mod dimensions;
pub mod epilogue;
pub mod groups;
pub mod maps;
pub mod program;
pub mod strategy;
pub mod tiling;

pub use analysis::ShapeAnalysis;
pub use dimensions::{ReductionDimensions, ReductionKind};
pub use epilogue::{EpilogueEvaluator, EpilogueValue, RootValues, TensorElement};
pub use groups::{GroupRoot, ReductionGroup, RootKind};
pub use program::{EmittedGroup, GroupIndexing, ReductionProgram, ReductionStep};
pub use strategy::{ColumnReduction, ReductionStrategy, RowReduction};
pub use tiling::TileConfiguration;

use strata_ir::{Fusion, IndexingMap, bitcast_map};
use tracing::debug;

use crate::config::ReductionConfig;
use crate::device::DeviceDescription;
use crate::error::*;
use crate::launch::LaunchDimensions;

#[derive(Debug, Clone)]
pub struct ReductionFusion {
    fusion: Fusion,
    analysis: ShapeAnalysis,
    strategy: ReductionStrategy,
}

impl ReductionFusion {
    #[tracing::instrument(skip_all, fields(fusion = fusion.name()))]
    pub fn new(fusion: &Fusion, device: &DeviceDescription, config: &ReductionConfig) -> Result<Self> {
        let analysis = ShapeAnalysis::new(fusion, device, config)?;
        let strategy =
            ReductionStrategy::new(&analysis.dimensions, &analysis.tiling, device.warp_size, analysis.groups.len());

        let required = strategy.shared_memory_bytes(analysis.num_heroes(), analysis.element_bytes);
        if required > device.shared_memory_per_block {
            debug!(required, available = device.shared_memory_per_block, "rejecting shared memory budget");
            return SharedMemoryExceededSnafu { required, available: device.shared_memory_per_block }.fail();
        }

        Ok(Self { fusion: fusion.clone(), analysis, strategy })
    }

    pub fn fusion(&self) -> &Fusion {
        &self.fusion
    }

    pub fn analysis(&self) -> &ShapeAnalysis {
        &self.analysis
    }

    pub fn strategy(&self) -> &ReductionStrategy {
        &self.strategy
    }

    pub fn groups(&self) -> &[ReductionGroup] {
        &self.analysis.groups
    }

    /// Blocks `[tiles, groups, 1]`, threads `[threads per block, 1, 1]`.
    pub fn launch_dimensions(&self) -> LaunchDimensions {
        let tiling = &self.analysis.tiling;
        LaunchDimensions::new([tiling.total_blocks(), self.analysis.groups.len(), 1], [tiling.total_threads(), 1, 1])
    }

    /// The projected output shape: `[kept]` for rows, `[kept_major, kept_minor]` for columns.
    pub fn kept_shape(&self) -> &[usize] {
        &self.analysis.kept_shape
    }

    /// Maps of one group, restricted to `group_id == group`. `None` if there is no such group.
    pub fn group_indexing(&self, group: usize) -> Option<GroupIndexing> {
        (group < self.analysis.groups.len()).then(|| GroupIndexing {
            input: maps::for_group(&self.strategy.input_map(), group),
            output: maps::for_group(&self.strategy.output_map(), group),
            shared_write: self.strategy.shared_write_map().map(|m| maps::for_group(&m, group)),
            shared_read: self.strategy.shared_read_map().map(|m| maps::for_group(&m, group)),
        })
    }

    pub fn emit_group(&self, group: usize) -> Option<EmittedGroup> {
        let indexing = self.group_indexing(group)?;
        Some(EmittedGroup { group, indexing, program: self.strategy.program() })
    }

    pub fn epilogue(&self, group: usize) -> Option<EpilogueEvaluator<'_>> {
        let group = self.analysis.groups.get(group)?;
        Some(EpilogueEvaluator::new(group, &self.analysis.kept_shape))
    }

    /// Map from `(thread_id, block_id, group_id)` to the element of operand `operand` of the hero of root
    /// `root` that the thread reads.
    ///
    /// The init operand of a reduction is read once and has no indexing. Side outputs are produced while the
    /// input is read, so the `operand` of a side-output root is ignored and the map points into the root itself.
    pub fn thread_id_to_input_indexing(&self, root: usize, operand: usize) -> Option<IndexingMap> {
        let group = self.analysis.group_of_root(root)?;
        let group_root = group.root(root)?;
        let target = match group_root.kind {
            RootKind::Reduction => {
                if operand != 0 {
                    return None;
                }
                &self.analysis.input_shape
            }
            RootKind::SideOutput => group_root.instruction.shape(),
        };
        Some(self.project(&self.strategy.input_map(), &self.analysis.dimensions.input_shape(), target, group.id))
    }

    /// Map from `(thread_id, block_id, group_id)` to the element of root `root` that the thread writes.
    pub fn thread_id_to_output_indexing(&self, root: usize) -> Option<IndexingMap> {
        let group = self.analysis.group_of_root(root)?;
        let group_root = group.root(root)?;
        let shape = group_root.instruction.shape();
        Some(match group_root.kind {
            RootKind::Reduction => self.project(&self.strategy.output_map(), self.kept_shape(), shape, group.id),
            RootKind::SideOutput => {
                self.project(&self.strategy.input_map(), &self.analysis.dimensions.input_shape(), shape, group.id)
            }
        })
    }

    fn project(&self, map: &IndexingMap, from: &[usize], to: &[usize], group: usize) -> IndexingMap {
        maps::for_group(&map.compose(&bitcast_map(from, to)), group)
    }
}
