//! The per-group reduction program: an ordered list of SIMT steps over the group's indexing maps.

use std::fmt;

use smallvec::SmallVec;
use strata_ir::IndexingMap;

/// One step of a reduction program. Every thread of the block executes every step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ReductionStep {
    /// Fold the thread's input tile into `lanes` accumulators per hero, starting from the combiner identity.
    ///
    /// The accumulator of an element is selected by `lane_symbol` of the input map; all other symbols are
    /// folded. Side outputs are computed for every element read.
    #[display("accumulate_tile(lanes={lanes})")]
    AccumulateTile { lanes: usize, lane_symbol: Option<usize> },
    /// Shuffle-down tree with distances `max_distance, max_distance / 2, .., 1` within each warp.
    #[display("shuffle_reduce(max_distance={max_distance})")]
    ShuffleReduce { max_distance: usize },
    /// Publish partial results into a per-hero shared tile through the shared write map.
    #[display("store_shared(tile={tile:?})")]
    StoreShared { tile: SmallVec<[usize; 3]>, lane_symbol: Option<usize> },
    /// Block-wide barrier.
    #[display("barrier")]
    Barrier,
    /// Replace the accumulators with the values read through the shared read map.
    #[display("load_shared")]
    LoadShared { lane_symbol: Option<usize> },
    /// Fold each hero's init into its final value once, then evaluate the epilogue and write every root of
    /// the group.
    #[display("write_outputs")]
    WriteOutputs { lane_symbol: Option<usize> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ReductionProgram {
    pub steps: Vec<ReductionStep>,
}

impl ReductionProgram {
    pub fn barriers(&self) -> usize {
        self.steps.iter().filter(|step| matches!(step, ReductionStep::Barrier)).count()
    }

    pub fn uses_shared_memory(&self) -> bool {
        self.steps.iter().any(|step| matches!(step, ReductionStep::StoreShared { .. }))
    }
}

impl fmt::Display for ReductionProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            writeln!(f, "{i}: {step}")?;
        }
        Ok(())
    }
}

/// Thread-to-element maps of one group, projected onto the canonical shapes.
///
/// `input` maps into the canonical operand shape, `output` into the kept shape, the shared maps into the
/// shared tile of each hero.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupIndexing {
    pub input: IndexingMap,
    pub output: IndexingMap,
    pub shared_write: Option<IndexingMap>,
    pub shared_read: Option<IndexingMap>,
}

/// Everything needed to execute one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmittedGroup {
    pub group: usize,
    pub indexing: GroupIndexing,
    pub program: ReductionProgram,
}

impl fmt::Display for EmittedGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "group {}:", self.group)?;
        writeln!(f, "input: {}", self.indexing.input)?;
        writeln!(f, "output: {}", self.indexing.output)?;
        if let Some(map) = &self.indexing.shared_write {
            writeln!(f, "shared write: {map}")?;
        }
        if let Some(map) = &self.indexing.shared_read {
            writeln!(f, "shared read: {map}")?;
        }
        write!(f, "{}", self.program)
    }
}
