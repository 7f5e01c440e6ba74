//! Intermediate representation shared by the Strata reduction emitter.
//!
//! # Module Organization
//!
//! - [`types`] - Constant values and operation kinds
//! - [`instruction`] - Instruction DAG of a fused computation
//! - [`fusion`] - Ordered roots of one kernel launch
//! - [`eval`] - Scalar evaluation of operations and elementwise graphs
//! - [`indexing`] - Intervals, affine expressions and indexing maps
//! - [`shape`] - Row-major shape arithmetic
//! - [`error`] - Error types and result handling

pub mod error;
pub mod eval;
pub mod fusion;
pub mod indexing;
pub mod instruction;
pub mod shape;
pub mod types;

#[cfg(any(test, feature = "proptest"))]
pub mod test;

pub use error::{Error, Result};
pub use fusion::Fusion;
pub use indexing::{AffineExpr, AffineKind, IndexingMap, Interval, Variable, bitcast_map};
pub use instruction::{InstrKey, Instruction, Op};
pub use shape::{Index, Shape};
pub use types::{BinaryOp, ConstValue, ReduceOp, UnaryOp};

pub use strata_dtype::DType;
