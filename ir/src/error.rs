use smallvec::SmallVec;
use snafu::Snafu;
use strata_dtype::DType;

use crate::{BinaryOp, ReduceOp, UnaryOp, shape::Shape};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// DType mismatch in binary operation.
    #[snafu(display("dtype mismatch: cannot perform operation on {lhs} and {rhs}"))]
    DTypeMismatch { lhs: DType, rhs: DType },

    /// Invalid dtype for operation (e.g., bitwise on float).
    #[snafu(display("invalid dtype for operation: operation {operation:?}; dtype {dtype}"))]
    InvalidDTypeForUnaryOp { operation: UnaryOp, dtype: DType },

    /// Invalid dtype for operation (e.g., bitwise on float).
    #[snafu(display("invalid dtype for operation: operation {operation:?}; dtypes {dtypes:?}"))]
    InvalidDTypeForBinaryOp { operation: BinaryOp, dtypes: SmallVec<[DType; 2]> },

    /// Invalid dtype for a reduction combiner (e.g., `and` over floats).
    #[snafu(display("invalid dtype for reduction: reducer {operation:?}; dtype {dtype}"))]
    InvalidDTypeForReduceOp { operation: ReduceOp, dtype: DType },

    /// Shape mismatch in binary operation.
    #[snafu(display("shape mismatch in {op:?}: {lhs:?} vs {rhs:?}"))]
    BinaryShapeMismatch { op: BinaryOp, lhs: Box<Shape>, rhs: Box<Shape> },

    /// Reduce dimension invalid.
    #[snafu(display("reduce dimension {dim} is invalid for shape {shape:?}"))]
    ReduceDimInvalid { dim: usize, shape: Box<Shape> },

    /// Reduce dimensions must be strictly increasing.
    #[snafu(display("reduce dimensions {dims:?} are not strictly increasing"))]
    ReduceDimsUnsorted { dims: SmallVec<[usize; 4]> },

    /// Reduce init value must be a scalar of the operand dtype.
    #[snafu(display("reduce init must be a scalar {expected}, got {actual} with shape {shape:?}"))]
    ReduceInitInvalid { expected: DType, actual: DType, shape: Box<Shape> },

    /// Evaluation hit an operation that is undefined for the given values.
    #[snafu(display("cannot evaluate {operation} on {values}"))]
    EvaluationFailed { operation: String, values: String },

    /// Evaluation index does not address an element of the instruction.
    #[snafu(display("index {index:?} is out of bounds for shape {shape:?}"))]
    IndexOutOfBounds { index: Vec<i64>, shape: Box<Shape> },

    /// Two parameters of a fusion share a number but disagree on type or shape.
    #[snafu(display("parameter {index} is declared twice with different signatures"))]
    ParameterConflict { index: usize },

    /// A fusion without roots.
    #[snafu(display("fusion {name} has no roots"))]
    EmptyFusion { name: String },
}
