//! Scalar evaluation of operations on [`ConstValue`].
//!
//! [`evaluate`] walks the elementwise part of an instruction graph for one output index; parameters and
//! reductions are leaves resolved by the caller, which is how both the epilogue evaluator and the reference
//! executor plug their own storage in.

use std::sync::Arc;

use crate::error::{EvaluationFailedSnafu, IndexOutOfBoundsSnafu, Result};
use crate::instruction::{Instruction, Op};
use crate::types::{BinaryOp, ConstValue, UnaryOp};

/// Evaluate a unary operation on a constant value.
///
/// Returns `None` if the operation is not supported for the given value type.
/// Integer operations use wrapping arithmetic.
pub fn eval_unary_op(op: UnaryOp, v: ConstValue) -> Option<ConstValue> {
    match op {
        UnaryOp::Neg => eval_neg(v),
        UnaryOp::Abs => eval_abs(v),
        UnaryOp::Not => eval_not(v),
        UnaryOp::Sqrt => eval_float(v, f64::sqrt),
        UnaryOp::Exp => eval_float(v, f64::exp),
    }
}

/// Evaluate a binary operation on constant values.
///
/// Returns `None` if:
/// - The operation is not supported for the given value types
/// - The operands have incompatible types
/// - Integer division by zero
pub fn eval_binary_op(op: BinaryOp, a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match op {
        BinaryOp::Add => eval_add(a, b),
        BinaryOp::Sub => eval_sub(a, b),
        BinaryOp::Mul => eval_mul(a, b),
        BinaryOp::Div => eval_div(a, b),
        BinaryOp::Max => eval_max(a, b),
        BinaryOp::Min => eval_min(a, b),
        BinaryOp::Lt => eval_lt(a, b),
        BinaryOp::Eq => eval_eq(a, b),
        BinaryOp::Ne => eval_eq(a, b).map(|v| ConstValue::Bool(v == ConstValue::Bool(false))),
        BinaryOp::And => eval_bitwise(a, b, |x, y| x & y, |x, y| x & y, |x, y| x & y),
        BinaryOp::Or => eval_bitwise(a, b, |x, y| x | y, |x, y| x | y, |x, y| x | y),
        BinaryOp::Xor => eval_bitwise(a, b, |x, y| x ^ y, |x, y| x ^ y, |x, y| x ^ y),
    }
}

// ============================================================================
// Unary Operations
// ============================================================================

#[inline]
fn eval_neg(v: ConstValue) -> Option<ConstValue> {
    match v {
        ConstValue::Int(x) => Some(ConstValue::Int(x.wrapping_neg())),
        ConstValue::UInt(x) => Some(ConstValue::UInt(x.wrapping_neg())),
        ConstValue::Float(x) => Some(ConstValue::Float(-x)),
        ConstValue::Bool(_) => None,
    }
}

#[inline]
fn eval_abs(v: ConstValue) -> Option<ConstValue> {
    match v {
        ConstValue::Int(x) => Some(ConstValue::Int(x.wrapping_abs())),
        ConstValue::UInt(x) => Some(ConstValue::UInt(x)),
        ConstValue::Float(x) => Some(ConstValue::Float(x.abs())),
        ConstValue::Bool(_) => None,
    }
}

#[inline]
fn eval_not(v: ConstValue) -> Option<ConstValue> {
    match v {
        ConstValue::Int(x) => Some(ConstValue::Int(!x)),
        ConstValue::UInt(x) => Some(ConstValue::UInt(!x)),
        ConstValue::Bool(x) => Some(ConstValue::Bool(!x)),
        ConstValue::Float(_) => None,
    }
}

#[inline]
fn eval_float(v: ConstValue, f: fn(f64) -> f64) -> Option<ConstValue> {
    match v {
        ConstValue::Float(x) => Some(ConstValue::Float(f(x))),
        _ => None,
    }
}

// ============================================================================
// Binary Arithmetic Operations
// ============================================================================

#[inline]
fn eval_add(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_add(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_add(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x + y)),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x | y)),
        _ => None,
    }
}

#[inline]
fn eval_sub(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_sub(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_sub(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x - y)),
        _ => None,
    }
}

#[inline]
fn eval_mul(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_mul(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.wrapping_mul(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x * y)),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x & y)),
        _ => None,
    }
}

#[inline]
fn eval_div(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(_), ConstValue::Int(0)) | (ConstValue::UInt(_), ConstValue::UInt(0)) => None,
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.wrapping_div(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x / y)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x / y)),
        _ => None,
    }
}

#[inline]
fn eval_max(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.max(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.max(y))),
        // NaN propagates, matching device max.
        (ConstValue::Float(x), ConstValue::Float(y)) if x.is_nan() || y.is_nan() => Some(ConstValue::Float(f64::NAN)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x.max(y))),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x | y)),
        _ => None,
    }
}

#[inline]
fn eval_min(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(x.min(y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(x.min(y))),
        (ConstValue::Float(x), ConstValue::Float(y)) if x.is_nan() || y.is_nan() => Some(ConstValue::Float(f64::NAN)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Float(x.min(y))),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x & y)),
        _ => None,
    }
}

// ============================================================================
// Comparison Operations
// ============================================================================

#[inline]
fn eval_lt(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Bool(x < y)),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::Bool(x < y)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Bool(x < y)),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(!x & y)),
        _ => None,
    }
}

#[inline]
fn eval_eq(a: ConstValue, b: ConstValue) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Bool(x == y)),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::Bool(x == y)),
        (ConstValue::Float(x), ConstValue::Float(y)) => Some(ConstValue::Bool(x == y)),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(x == y)),
        _ => None,
    }
}

// ============================================================================
// Bitwise Operations
// ============================================================================

#[inline]
fn eval_bitwise(
    a: ConstValue,
    b: ConstValue,
    int: fn(i64, i64) -> i64,
    uint: fn(u64, u64) -> u64,
    boolean: fn(bool, bool) -> bool,
) -> Option<ConstValue> {
    match (a, b) {
        (ConstValue::Int(x), ConstValue::Int(y)) => Some(ConstValue::Int(int(x, y))),
        (ConstValue::UInt(x), ConstValue::UInt(y)) => Some(ConstValue::UInt(uint(x, y))),
        (ConstValue::Bool(x), ConstValue::Bool(y)) => Some(ConstValue::Bool(boolean(x, y))),
        _ => None,
    }
}

// ============================================================================
// Graph Evaluation
// ============================================================================

/// Evaluate `instruction` at the element `index` of its shape.
///
/// Elementwise operations recurse into their operands at the same index (scalar operands at the empty index).
/// `Parameter` and `Reduce` instructions are leaves and are resolved by `leaf`. Every intermediate result is
/// truncated to the instruction dtype.
pub fn evaluate<E>(
    instruction: &Arc<Instruction>,
    index: &[i64],
    leaf: &mut dyn FnMut(&Arc<Instruction>, &[i64]) -> Result<ConstValue, E>,
) -> Result<ConstValue, E>
where
    E: From<crate::Error>,
{
    let shape = instruction.shape();
    let in_bounds = index.len() == shape.len() && index.iter().zip(shape).all(|(&i, &d)| i >= 0 && (i as usize) < d);
    if !in_bounds {
        return Err(IndexOutOfBoundsSnafu { index: index.to_vec(), shape: Box::new(shape.clone()) }.build().into());
    }

    let value = match instruction.op() {
        Op::Parameter(_) | Op::Reduce { .. } => return leaf(instruction, index),
        Op::Constant(value) => *value,
        Op::Unary { op, operand } => {
            let v = evaluate(operand, operand_index(operand, index), leaf)?;
            eval_unary_op(*op, v).ok_or_else(|| failed(op.to_string(), &[v]))?
        }
        Op::Binary { op, lhs, rhs } => {
            let a = evaluate(lhs, operand_index(lhs, index), leaf)?;
            let b = evaluate(rhs, operand_index(rhs, index), leaf)?;
            eval_binary_op(*op, a, b).ok_or_else(|| failed(op.to_string(), &[a, b]))?
        }
        Op::Convert(operand) => evaluate(operand, operand_index(operand, index), leaf)?,
    };

    Ok(value.cast(instruction.dtype()))
}

fn operand_index<'a>(operand: &Instruction, index: &'a [i64]) -> &'a [i64] {
    if operand.is_scalar() { &[] } else { index }
}

fn failed(operation: String, values: &[ConstValue]) -> crate::Error {
    let values = values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    EvaluationFailedSnafu { operation, values }.build()
}
