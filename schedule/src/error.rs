use snafu::Snafu;

use strata_ir::{ConstValue, Index, ReduceOp, Shape};

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    // =========================================================================
    // Unsupported fusion shapes
    // =========================================================================
    #[snafu(display("fusion {fusion} has no reduction root"))]
    NoReduction { fusion: String },

    #[snafu(display("reduction %{hero} consumes the result of another reduction"))]
    ChainedReduction { hero: u64 },

    #[snafu(display(
        "reductions of one kernel must agree on operand shape and dimensions: {expected:?} over {expected_dims:?} \
         vs {actual:?} over {actual_dims:?}"
    ))]
    IncompatibleHeroes { expected: Box<Shape>, expected_dims: Vec<usize>, actual: Box<Shape>, actual_dims: Vec<usize> },

    #[snafu(display("reducing {dims:?} of {shape:?} is neither a row nor a column reduction"))]
    UnsupportedLayout { shape: Box<Shape>, dims: Vec<usize> },

    #[snafu(display("row reduction batch {batch} exceeds the bound {bound}"))]
    BatchTooLarge { batch: usize, bound: usize },

    #[snafu(display("{count} reduction groups carry side outputs, at most one is supported"))]
    TooManySideOutputGroups { count: usize },

    #[snafu(display("side output at root {root} cannot be attached to any reduction group"))]
    OrphanSideOutput { root: usize },

    #[snafu(display("init value of reduction %{hero} is not a constant"))]
    NonConstantInit { hero: u64 },

    #[snafu(display("epilogue of root {root} reads a {actual:?} operand, expected {expected:?}"))]
    EpilogueOperandShape { root: usize, expected: Box<Shape>, actual: Box<Shape> },

    #[snafu(display("shared memory requirement {required} bytes exceeds {available} bytes per block"))]
    SharedMemoryExceeded { required: usize, available: usize },

    #[snafu(display("cannot emit a reduction over the empty tensor {shape:?}"))]
    EmptyTensor { shape: Box<Shape> },

    // =========================================================================
    // Epilogue
    // =========================================================================
    #[snafu(display("no value was provided for %{instruction}"))]
    MissingValue { instruction: u64 },

    #[snafu(display("value of %{instruction} was expected to be a {expected}"))]
    ValueKindMismatch { instruction: u64, expected: &'static str },

    #[snafu(display("{op} cannot combine {lhs} and {rhs}"))]
    CombineFailed { op: ReduceOp, lhs: ConstValue, rhs: ConstValue },

    // =========================================================================
    // Reference execution
    // =========================================================================
    #[snafu(display("argument {index}: {reason}"))]
    ArgumentMismatch { index: usize, reason: String },

    #[snafu(display("shared slot {slot:?} of hero {hero} is read before any barrier published it"))]
    UnsynchronizedSharedRead { hero: usize, slot: Index },

    #[snafu(display("shared slot {slot:?} of hero {hero} is read but never written"))]
    UnwrittenSharedRead { hero: usize, slot: Index },

    #[snafu(display("shared slot {slot:?} of hero {hero} is written twice"))]
    SharedSlotRewritten { hero: usize, slot: Index },

    #[snafu(display("shared slot {slot:?} of hero {hero} is read {reads} times"))]
    SharedSlotNotConsumed { hero: usize, slot: Index, reads: usize },

    #[snafu(display("output {root} element {index:?} is written twice"))]
    DuplicateOutputWrite { root: usize, index: Index },

    #[snafu(display("output {root} element {index:?} is never written"))]
    MissingOutputWrite { root: usize, index: Index },

    #[snafu(display("ir error: {source}"))]
    Ir { source: strata_ir::Error },
}

impl Error {
    /// Whether this error rejects the fusion shape; the caller is expected to fall back to another emitter.
    pub fn is_unsupported_shape(&self) -> bool {
        matches!(
            self,
            Self::NoReduction { .. }
                | Self::ChainedReduction { .. }
                | Self::IncompatibleHeroes { .. }
                | Self::UnsupportedLayout { .. }
                | Self::BatchTooLarge { .. }
                | Self::TooManySideOutputGroups { .. }
                | Self::OrphanSideOutput { .. }
                | Self::NonConstantInit { .. }
                | Self::EpilogueOperandShape { .. }
                | Self::SharedMemoryExceeded { .. }
                | Self::EmptyTensor { .. }
        )
    }
}

impl From<strata_ir::Error> for Error {
    fn from(source: strata_ir::Error) -> Self {
        Self::Ir { source }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
