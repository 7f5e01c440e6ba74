use std::sync::Arc;

use strata_dtype::DType;

use crate::eval::{eval_binary_op, eval_unary_op, evaluate};
use crate::{BinaryOp, ConstValue, Error, Instruction, ReduceOp, UnaryOp};

#[test]
fn unary_ops() {
    assert_eq!(eval_unary_op(UnaryOp::Neg, ConstValue::Int(3)), Some(ConstValue::Int(-3)));
    assert_eq!(eval_unary_op(UnaryOp::Abs, ConstValue::Int(-3)), Some(ConstValue::Int(3)));
    assert_eq!(eval_unary_op(UnaryOp::Not, ConstValue::Bool(true)), Some(ConstValue::Bool(false)));
    assert_eq!(eval_unary_op(UnaryOp::Sqrt, ConstValue::Float(9.0)), Some(ConstValue::Float(3.0)));
    assert_eq!(eval_unary_op(UnaryOp::Sqrt, ConstValue::Int(9)), None);
}

#[test]
fn binary_ops() {
    assert_eq!(eval_binary_op(BinaryOp::Div, ConstValue::Int(-7), ConstValue::Int(2)), Some(ConstValue::Int(-3)));
    assert_eq!(eval_binary_op(BinaryOp::Div, ConstValue::Int(1), ConstValue::Int(0)), None);
    assert_eq!(eval_binary_op(BinaryOp::Lt, ConstValue::UInt(1), ConstValue::UInt(2)), Some(ConstValue::Bool(true)));
    assert_eq!(eval_binary_op(BinaryOp::Ne, ConstValue::Int(1), ConstValue::Int(1)), Some(ConstValue::Bool(false)));
    assert_eq!(eval_binary_op(BinaryOp::Xor, ConstValue::Int(6), ConstValue::Int(3)), Some(ConstValue::Int(5)));
    assert_eq!(eval_binary_op(BinaryOp::Min, ConstValue::Float(1.0), ConstValue::Float(-1.0)), Some(ConstValue::Float(-1.0)));
    assert_eq!(eval_binary_op(BinaryOp::Add, ConstValue::Int(1), ConstValue::UInt(1)), None);
}

#[test]
fn max_propagates_nan() {
    let Some(ConstValue::Float(v)) = eval_binary_op(BinaryOp::Max, ConstValue::Float(f64::NAN), ConstValue::Float(1.0))
    else {
        panic!("max of floats must be a float");
    };
    assert!(v.is_nan());
}

#[test]
fn evaluate_resolves_leaves_and_truncates() {
    // (p0 + p0 * 100) converted to s8, with a scalar broadcast.
    let p0 = Instruction::parameter(0, DType::Int32, &[2, 3]);
    let scale = Instruction::constant(100, DType::Int32);
    let scaled = Instruction::binary(BinaryOp::Mul, &p0, &scale).unwrap();
    let sum = Instruction::binary(BinaryOp::Add, &p0, &scaled).unwrap();
    let narrow = Instruction::convert(&sum, DType::Int8);

    let mut leaf = |instr: &Arc<Instruction>, index: &[i64]| -> Result<ConstValue, Error> {
        assert_eq!(instr.parameter_index(), Some(0));
        Ok(ConstValue::Int(index[0] * 3 + index[1]))
    };

    // element 5: 5 + 500 = 505 -> 505 mod 256 = 249 -> -7 as s8
    assert_eq!(evaluate(&narrow, &[1, 2], &mut leaf).unwrap(), ConstValue::Int(-7));
    assert_eq!(evaluate(&sum, &[0, 1], &mut leaf).unwrap(), ConstValue::Int(101));
}

#[test]
fn evaluate_treats_reduce_as_leaf() {
    let p0 = Instruction::parameter(0, DType::Int32, &[4, 8]);
    let init = Instruction::constant(0, DType::Int32);
    let reduce = Instruction::reduce(&p0, &init, &[1], ReduceOp::Add).unwrap();
    let negated = Instruction::unary(UnaryOp::Neg, &reduce).unwrap();

    let mut calls = 0;
    let mut leaf = |instr: &Arc<Instruction>, index: &[i64]| -> Result<ConstValue, Error> {
        calls += 1;
        assert!(instr.is_reduce());
        Ok(ConstValue::Int(index[0] * 10))
    };
    assert_eq!(evaluate(&negated, &[3], &mut leaf).unwrap(), ConstValue::Int(-30));
    assert_eq!(calls, 1);
}

#[test]
fn evaluate_rejects_out_of_bounds() {
    let p0 = Instruction::parameter(0, DType::Int32, &[2]);
    let mut leaf = |_: &Arc<Instruction>, _: &[i64]| -> Result<ConstValue, Error> { Ok(ConstValue::Int(0)) };
    assert!(matches!(evaluate(&p0, &[2], &mut leaf), Err(Error::IndexOutOfBounds { .. })));
}

#[test]
fn evaluate_reports_undefined_operations() {
    let p0 = Instruction::parameter(0, DType::Int32, &[2]);
    let zero = Instruction::constant(0, DType::Int32);
    let div = Instruction::binary(BinaryOp::Div, &p0, &zero).unwrap();
    let mut leaf = |_: &Arc<Instruction>, _: &[i64]| -> Result<ConstValue, Error> { Ok(ConstValue::Int(4)) };
    assert!(matches!(evaluate(&div, &[0], &mut leaf), Err(Error::EvaluationFailed { .. })));
}
