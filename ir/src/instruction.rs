//! Instructions of a fused computation.
//!
//! Instructions form an `Arc`-linked DAG. They are produced by graph analysis and only read here; every
//! constructor validates dtypes and shapes up front so later stages can rely on a well-formed graph.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use snafu::ensure;
use strata_dtype::DType;

use crate::error::*;
use crate::shape::{Shape, num_elements, remove_dims};
use crate::types::{BinaryOp, ConstValue, ReduceOp, UnaryOp};

static INSTRUCTION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_instruction_id() -> u64 {
    INSTRUCTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Operation of an [`Instruction`].
#[derive(Debug, derive_more::Display)]
pub enum Op {
    /// Fusion argument with the given position.
    #[display("parameter({_0})")]
    Parameter(usize),
    /// Scalar literal, already truncated to the instruction dtype.
    #[display("constant({_0})")]
    Constant(ConstValue),
    #[display("{op}(%{})", operand.id())]
    Unary { op: UnaryOp, operand: Arc<Instruction> },
    /// Elementwise binary operation. A scalar operand is broadcast.
    #[display("{op}(%{}, %{})", lhs.id(), rhs.id())]
    Binary { op: BinaryOp, lhs: Arc<Instruction>, rhs: Arc<Instruction> },
    #[display("convert(%{})", _0.id())]
    Convert(Arc<Instruction>),
    /// Reduction of `operand` over `dims`, seeded with the scalar `init`.
    #[display("reduce(%{}, %{}), dims={dims:?}, to_apply={reduce_op}", operand.id(), init.id())]
    Reduce { operand: Arc<Instruction>, init: Arc<Instruction>, dims: SmallVec<[usize; 4]>, reduce_op: ReduceOp },
}

impl Op {
    /// Operands in evaluation order.
    pub fn operands(&self) -> SmallVec<[&Arc<Instruction>; 2]> {
        match self {
            Self::Parameter(_) | Self::Constant(_) => SmallVec::new(),
            Self::Unary { operand, .. } | Self::Convert(operand) => smallvec::smallvec![operand],
            Self::Binary { lhs, rhs, .. } => smallvec::smallvec![lhs, rhs],
            Self::Reduce { operand, init, .. } => smallvec::smallvec![operand, init],
        }
    }
}

/// Node of the fused computation graph.
#[derive(Debug)]
pub struct Instruction {
    id: u64,
    op: Op,
    dtype: DType,
    shape: Shape,
}

/// Identity key for instructions, hashing by id instead of structure.
#[derive(Clone)]
pub struct InstrKey(pub Arc<Instruction>);

impl std::fmt::Debug for InstrKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InstrKey(id={})", self.0.id)
    }
}

impl PartialEq for InstrKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for InstrKey {}

impl Hash for InstrKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl Instruction {
    fn new(op: Op, dtype: DType, shape: Shape) -> Arc<Self> {
        Arc::new(Self { id: next_instruction_id(), op, dtype, shape })
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn parameter(index: usize, dtype: DType, shape: &[usize]) -> Arc<Self> {
        Self::new(Op::Parameter(index), dtype, shape.into())
    }

    /// Scalar constant; the value is truncated to `dtype`.
    pub fn constant(value: impl Into<ConstValue>, dtype: DType) -> Arc<Self> {
        Self::new(Op::Constant(value.into().cast(dtype)), dtype, Shape::new())
    }

    pub fn unary(op: UnaryOp, operand: &Arc<Self>) -> Result<Arc<Self>> {
        ensure!(op.supports(operand.dtype), InvalidDTypeForUnaryOpSnafu { operation: op, dtype: operand.dtype });
        Ok(Self::new(Op::Unary { op, operand: operand.clone() }, operand.dtype, operand.shape.clone()))
    }

    /// Elementwise binary operation; operands must agree on dtype and on shape unless one of them is a scalar.
    pub fn binary(op: BinaryOp, lhs: &Arc<Self>, rhs: &Arc<Self>) -> Result<Arc<Self>> {
        ensure!(lhs.dtype == rhs.dtype, DTypeMismatchSnafu { lhs: lhs.dtype, rhs: rhs.dtype });
        ensure!(
            !op.is_bitwise() || lhs.dtype.is_bitwise(),
            InvalidDTypeForBinaryOpSnafu { operation: op, dtypes: smallvec::smallvec![lhs.dtype, rhs.dtype] }
        );

        let shape = match (lhs.is_scalar(), rhs.is_scalar()) {
            (true, _) => rhs.shape.clone(),
            (_, true) => lhs.shape.clone(),
            _ => {
                ensure!(
                    lhs.shape == rhs.shape,
                    BinaryShapeMismatchSnafu { op, lhs: Box::new(lhs.shape.clone()), rhs: Box::new(rhs.shape.clone()) }
                );
                lhs.shape.clone()
            }
        };

        Ok(Self::new(Op::Binary { op, lhs: lhs.clone(), rhs: rhs.clone() }, op.result_dtype(lhs.dtype), shape))
    }

    pub fn convert(operand: &Arc<Self>, dtype: DType) -> Arc<Self> {
        Self::new(Op::Convert(operand.clone()), dtype, operand.shape.clone())
    }

    /// Reduce `operand` over the strictly increasing `dims`.
    pub fn reduce(operand: &Arc<Self>, init: &Arc<Self>, dims: &[usize], reduce_op: ReduceOp) -> Result<Arc<Self>> {
        ensure!(dims.windows(2).all(|w| w[0] < w[1]), ReduceDimsUnsortedSnafu { dims: SmallVec::from_slice(dims) });
        if let Some(&dim) = dims.iter().find(|&&d| d >= operand.shape.len()) {
            return ReduceDimInvalidSnafu { dim, shape: Box::new(operand.shape.clone()) }.fail();
        }
        ensure!(
            init.is_scalar() && init.dtype == operand.dtype,
            ReduceInitInvalidSnafu { expected: operand.dtype, actual: init.dtype, shape: Box::new(init.shape.clone()) }
        );
        ensure!(
            reduce_op.supports(operand.dtype),
            InvalidDTypeForReduceOpSnafu { operation: reduce_op, dtype: operand.dtype }
        );

        let shape = remove_dims(&operand.shape, dims);
        let dims = SmallVec::from_slice(dims);
        let op = Op::Reduce { operand: operand.clone(), init: init.clone(), dims, reduce_op };
        Ok(Self::new(op, operand.dtype, shape))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn op(&self) -> &Op {
        &self.op
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn num_elements(&self) -> usize {
        num_elements(&self.shape)
    }

    pub fn is_reduce(&self) -> bool {
        matches!(self.op, Op::Reduce { .. })
    }

    pub fn operands(&self) -> SmallVec<[&Arc<Self>; 2]> {
        self.op.operands()
    }

    /// Parameter position, if this is a parameter.
    pub fn parameter_index(&self) -> Option<usize> {
        match self.op {
            Op::Parameter(index) => Some(index),
            _ => None,
        }
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Topological sort of the computation graph.
    ///
    /// Returns nodes in an order where all dependencies come before their dependents.
    pub fn toposort(self: &Arc<Self>) -> Vec<Arc<Self>> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut stack = vec![(self.clone(), false)];

        while let Some((node, processed)) = stack.pop() {
            if visited.contains(&node.id) {
                continue;
            }

            if processed {
                visited.insert(node.id);
                result.push(node);
            } else {
                stack.push((node.clone(), true));
                for child in node.operands().into_iter().rev() {
                    if !visited.contains(&child.id) {
                        stack.push((child.clone(), false));
                    }
                }
            }
        }

        result
    }

    /// Parameters reachable from this instruction, in topological order.
    pub fn parameters(self: &Arc<Self>) -> Vec<Arc<Self>> {
        self.toposort().into_iter().filter(|node| node.parameter_index().is_some()).collect()
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{} = {}{:?} {}", self.id, self.dtype, self.shape.as_slice(), self.op)
    }
}
