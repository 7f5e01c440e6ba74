use strata_dtype::DType;

use crate::{BinaryOp, Error, Fusion, Instruction, Op, ReduceOp, UnaryOp};

#[test]
fn reduce_removes_dims() {
    let p0 = Instruction::parameter(0, DType::Float32, &[2, 3, 4]);
    let init = Instruction::constant(0.0, DType::Float32);
    let reduce = Instruction::reduce(&p0, &init, &[0, 2], ReduceOp::Add).unwrap();

    assert_eq!(reduce.shape().as_slice(), &[3]);
    assert_eq!(reduce.dtype(), DType::Float32);
    assert!(reduce.is_reduce());
    assert_eq!(reduce.operands().len(), 2);
}

#[test]
fn reduce_validation() {
    let p0 = Instruction::parameter(0, DType::Float32, &[2, 3]);
    let init = Instruction::constant(0.0, DType::Float32);
    let int_init = Instruction::constant(0, DType::Int32);
    let tensor_init = Instruction::parameter(1, DType::Float32, &[3]);

    assert!(matches!(Instruction::reduce(&p0, &init, &[1, 0], ReduceOp::Add), Err(Error::ReduceDimsUnsorted { .. })));
    assert!(matches!(Instruction::reduce(&p0, &init, &[2], ReduceOp::Add), Err(Error::ReduceDimInvalid { dim: 2, .. })));
    assert!(matches!(Instruction::reduce(&p0, &int_init, &[1], ReduceOp::Add), Err(Error::ReduceInitInvalid { .. })));
    assert!(matches!(Instruction::reduce(&p0, &tensor_init, &[1], ReduceOp::Add), Err(Error::ReduceInitInvalid { .. })));
    assert!(matches!(
        Instruction::reduce(&p0, &init, &[1], ReduceOp::And),
        Err(Error::InvalidDTypeForReduceOp { operation: ReduceOp::And, .. })
    ));
}

#[test]
fn binary_broadcasts_scalars_only() {
    let a = Instruction::parameter(0, DType::Int32, &[4]);
    let b = Instruction::parameter(1, DType::Int32, &[2, 2]);
    let c = Instruction::constant(1, DType::Int32);

    assert_eq!(Instruction::binary(BinaryOp::Add, &c, &a).unwrap().shape().as_slice(), &[4]);
    assert!(matches!(Instruction::binary(BinaryOp::Add, &a, &b), Err(Error::BinaryShapeMismatch { .. })));

    let lt = Instruction::binary(BinaryOp::Lt, &a, &c).unwrap();
    assert_eq!(lt.dtype(), DType::Bool);
}

#[test]
fn operand_dtypes_are_checked() {
    let f = Instruction::parameter(0, DType::Float32, &[4]);
    let i = Instruction::parameter(1, DType::Int32, &[4]);

    assert!(matches!(Instruction::binary(BinaryOp::Add, &f, &i), Err(Error::DTypeMismatch { .. })));
    assert!(matches!(Instruction::binary(BinaryOp::And, &f, &f), Err(Error::InvalidDTypeForBinaryOp { .. })));
    assert!(matches!(Instruction::unary(UnaryOp::Sqrt, &i), Err(Error::InvalidDTypeForUnaryOp { .. })));
}

#[test]
fn constants_are_truncated() {
    let c = Instruction::constant(1000, DType::UInt8);
    assert!(matches!(c.op(), Op::Constant(crate::ConstValue::UInt(232))));
}

#[test]
fn toposort_visits_shared_nodes_once() {
    let p0 = Instruction::parameter(0, DType::Int32, &[4]);
    let neg = Instruction::unary(UnaryOp::Neg, &p0).unwrap();
    let sum = Instruction::binary(BinaryOp::Add, &neg, &p0).unwrap();

    let order: Vec<_> = sum.toposort().iter().map(|n| n.id()).collect();
    assert_eq!(order, vec![p0.id(), neg.id(), sum.id()]);
    assert_eq!(sum.parameters().len(), 1);
}

#[test]
fn fusion_collects_parameters() {
    let p1 = Instruction::parameter(1, DType::Int32, &[4]);
    let p0 = Instruction::parameter(0, DType::Int32, &[4]);
    let sum = Instruction::binary(BinaryOp::Add, &p1, &p0).unwrap();
    let fusion = Fusion::new("f", vec![sum.clone(), p0.clone()]).unwrap();

    let positions: Vec<_> = fusion.parameters().iter().map(|p| p.parameter_index()).collect();
    assert_eq!(positions, vec![Some(0), Some(1)]);
    assert_eq!(fusion.instructions().len(), 3);
    assert!(fusion.to_string().contains("ROOT"));
}

#[test]
fn fusion_rejects_conflicting_parameters() {
    let a = Instruction::parameter(0, DType::Int32, &[4]);
    let b = Instruction::parameter(0, DType::Int32, &[8]);

    assert!(matches!(Fusion::new("f", vec![a, b]), Err(Error::ParameterConflict { index: 0 })));
    assert!(matches!(Fusion::new("f", vec![]), Err(Error::EmptyFusion { .. })));
}
