use test_case::test_case;

use strata_ir::{BinaryOp, ConstValue, DType, Fusion, Instruction, ReduceOp, UnaryOp};

use crate::error::Error;
use crate::simulate::{HostTensor, simulate};
use crate::test::helpers::{emit, ramp, reduce, reduce_of, reference_reduce, sum_fusion};
use crate::{DeviceDescription, ReductionConfig};

fn warp4() -> DeviceDescription {
    DeviceDescription::with_warp_size(4)
}

fn check_single(shape: &[usize], dims: &[usize], op: ReduceOp, device: &DeviceDescription, config: &ReductionConfig) {
    let fusion = Fusion::new("single", vec![reduce(shape, dims, op, DType::Int32)]).unwrap();
    let reduction = emit(&fusion, device, config);
    let input = ramp(DType::Int32, shape);

    let outputs = simulate(&reduction, std::slice::from_ref(&input)).unwrap();
    assert_eq!(outputs, vec![reference_reduce(&input, dims, op)]);
}

// =============================================================================
// Single reductions
// =============================================================================

#[test]
fn test_row_across_warps() {
    let config = ReductionConfig::builder().row_tile(1).build();
    check_single(&[2, 17], &[1], ReduceOp::Add, &warp4(), &config);
}

#[test]
fn test_row_several_rows_per_warp() {
    check_single(&[7, 2], &[1], ReduceOp::Add, &warp4(), &ReductionConfig::default());
}

#[test]
fn test_row_max_with_negatives() {
    check_single(&[3, 10], &[1], ReduceOp::Max, &warp4(), &ReductionConfig::default());
}

#[test]
fn test_row_batched() {
    check_single(&[3, 5, 64], &[0, 2], ReduceOp::Add, &DeviceDescription::cuda_sm80(), &ReductionConfig::default());
}

#[test]
fn test_full_reduction_to_scalar() {
    check_single(&[4, 6], &[0, 1], ReduceOp::Add, &warp4(), &ReductionConfig::default());
}

#[test]
fn test_column_ragged() {
    check_single(&[5, 6], &[0], ReduceOp::Add, &warp4(), &ReductionConfig::default());
}

#[test]
fn test_column_min_with_kept_major() {
    check_single(&[3, 5, 4], &[1], ReduceOp::Min, &warp4(), &ReductionConfig::default());
}

#[test]
fn test_column_vectorized_product() {
    check_single(&[3, 8], &[0], ReduceOp::Mul, &warp4(), &ReductionConfig::default());
}

#[test]
fn test_row_float_on_real_warp() {
    let fusion = sum_fusion(&[2, 1000], &[1], DType::Float32);
    let reduction = emit(&fusion, &DeviceDescription::cuda_sm80(), &ReductionConfig::default());
    assert!(reduction.strategy().program().uses_shared_memory());

    let input = ramp(DType::Float32, &[2, 1000]);
    let outputs = simulate(&reduction, std::slice::from_ref(&input)).unwrap();
    assert_eq!(outputs[0], reference_reduce(&input, &[1], ReduceOp::Add));
}

// =============================================================================
// Non-identity inits
// =============================================================================

#[test_case(&[8], &[0], ReduceOp::Add, 1 ; "full sum")]
#[test_case(&[2, 17], &[1], ReduceOp::Add, 3 ; "row across warps")]
#[test_case(&[7, 2], &[1], ReduceOp::Max, 4 ; "row max with several rows per warp")]
#[test_case(&[5, 6], &[0], ReduceOp::Add, 10 ; "column through shared memory")]
#[test_case(&[3, 8], &[0], ReduceOp::Min, -9 ; "vectorized column min")]
fn test_init_is_folded_once_per_output(shape: &[usize], dims: &[usize], op: ReduceOp, init: i64) {
    let input = Instruction::parameter(0, DType::Int32, shape);
    let init_value = Instruction::constant(ConstValue::Int(init), DType::Int32);
    let hero = Instruction::reduce(&input, &init_value, dims, op).unwrap();
    let fusion = Fusion::new("init", vec![hero]).unwrap();
    let config = ReductionConfig::builder().row_tile(1).build();
    let reduction = emit(&fusion, &warp4(), &config);

    let arg = ramp(DType::Int32, shape);
    let outputs = simulate(&reduction, std::slice::from_ref(&arg)).unwrap();

    let folded = reference_reduce(&arg, dims, op);
    let data = folded.data().iter().map(|&value| op.combine(DType::Int32, ConstValue::Int(init), value).unwrap());
    assert_eq!(outputs, vec![HostTensor::new(DType::Int32, folded.shape(), data.collect())]);
}

#[test]
fn test_sum_of_zeros_returns_init() {
    let input = Instruction::parameter(0, DType::Int32, &[8]);
    let one = Instruction::constant(ConstValue::Int(1), DType::Int32);
    let fusion = Fusion::new("zeros", vec![Instruction::reduce(&input, &one, &[0], ReduceOp::Add).unwrap()]).unwrap();
    let reduction = emit(&fusion, &warp4(), &ReductionConfig::default());

    let zeros = HostTensor::from_slice(&[8], &[0i32; 8]);
    let outputs = simulate(&reduction, &[zeros]).unwrap();
    assert_eq!(outputs[0].data(), &[ConstValue::Int(1)]);
}

// =============================================================================
// Multi-root fusions
// =============================================================================

#[test]
fn test_side_output_with_vectorized_column() {
    let input = Instruction::parameter(0, DType::Int32, &[3, 8]);
    let sum = reduce_of(&input, &[0], ReduceOp::Add);
    let doubled = Instruction::binary(BinaryOp::Add, &input, &input).unwrap();
    let reduction = emit(&Fusion::new("side", vec![sum, doubled]).unwrap(), &warp4(), &ReductionConfig::default());

    let arg = ramp(DType::Int32, &[3, 8]);
    let outputs = simulate(&reduction, std::slice::from_ref(&arg)).unwrap();

    assert_eq!(outputs[0], reference_reduce(&arg, &[0], ReduceOp::Add));
    let expected = HostTensor::from_fn(DType::Int32, &[3, 8], |index| match arg.get(index) {
        ConstValue::Int(v) => ConstValue::Int(2 * v),
        other => other,
    });
    assert_eq!(outputs[1], expected);
}

#[test]
fn test_heroes_feeding_one_epilogue() {
    let input = Instruction::parameter(0, DType::Int32, &[6, 9]);
    let max = reduce_of(&input, &[1], ReduceOp::Max);
    let min = reduce_of(&input, &[1], ReduceOp::Min);
    let sum = reduce_of(&input, &[1], ReduceOp::Add);
    let spread = Instruction::binary(BinaryOp::Sub, &max, &min).unwrap();
    let fusion = Fusion::new("stats", vec![spread, sum]).unwrap();
    let reduction = emit(&fusion, &warp4(), &ReductionConfig::default());
    assert_eq!(reduction.groups().len(), 2);

    let arg = ramp(DType::Int32, &[6, 9]);
    let outputs = simulate(&reduction, std::slice::from_ref(&arg)).unwrap();

    let (high, low) = (reference_reduce(&arg, &[1], ReduceOp::Max), reference_reduce(&arg, &[1], ReduceOp::Min));
    let expected = HostTensor::from_fn(DType::Int32, &[6], |index| match (high.get(index), low.get(index)) {
        (ConstValue::Int(h), ConstValue::Int(l)) => ConstValue::Int(h - l),
        _ => unreachable!(),
    });
    assert_eq!(outputs, vec![expected, reference_reduce(&arg, &[1], ReduceOp::Add)]);
}

#[test]
fn test_epilogue_with_parameter() {
    let sum = reduce(&[2, 3, 8], &[2], ReduceOp::Add, DType::Int32);
    let bias = Instruction::parameter(1, DType::Int32, &[2, 3]);
    let shifted = Instruction::binary(BinaryOp::Add, &sum, &bias).unwrap();
    let negated = Instruction::unary(UnaryOp::Neg, &shifted).unwrap();
    let reduction = emit(&Fusion::new("bias", vec![negated]).unwrap(), &warp4(), &ReductionConfig::default());

    let input = ramp(DType::Int32, &[2, 3, 8]);
    let bias = HostTensor::from_slice(&[2, 3], &[1i32, 2, 3, 4, 5, 6]);
    let outputs = simulate(&reduction, &[input.clone(), bias.clone()]).unwrap();

    let sums = reference_reduce(&input, &[2], ReduceOp::Add);
    let expected = HostTensor::from_fn(DType::Int32, &[2, 3], |index| match (sums.get(index), bias.get(index)) {
        (ConstValue::Int(s), ConstValue::Int(b)) => ConstValue::Int(-(s + b)),
        _ => unreachable!(),
    });
    assert_eq!(outputs, vec![expected]);
}

#[test]
fn test_independent_groups() {
    let a = reduce(&[4, 5], &[0], ReduceOp::Add, DType::Int32);
    let b = reduce_of(&Instruction::parameter(1, DType::Int32, &[4, 5]), &[0], ReduceOp::Max);
    let reduction = emit(&Fusion::new("pair", vec![a, b]).unwrap(), &warp4(), &ReductionConfig::default());

    let (x, y) = (ramp(DType::Int32, &[4, 5]), HostTensor::from_fn(DType::Int32, &[4, 5], |i| (i[0] - i[1]).into()));
    let outputs = simulate(&reduction, &[x.clone(), y.clone()]).unwrap();
    assert_eq!(outputs, vec![reference_reduce(&x, &[0], ReduceOp::Add), reference_reduce(&y, &[0], ReduceOp::Max)]);
}

// =============================================================================
// Arguments
// =============================================================================

#[test]
fn test_rejects_wrong_argument_shape() {
    let reduction = emit(&sum_fusion(&[4, 6], &[1], DType::Int32), &warp4(), &ReductionConfig::default());
    let err = simulate(&reduction, &[ramp(DType::Int32, &[6, 4])]).unwrap_err();
    assert!(matches!(err, Error::ArgumentMismatch { index: 0, .. }), "{err}");
}

#[test]
fn test_rejects_wrong_argument_dtype() {
    let reduction = emit(&sum_fusion(&[4, 6], &[1], DType::Int32), &warp4(), &ReductionConfig::default());
    let err = simulate(&reduction, &[ramp(DType::Int64, &[4, 6])]).unwrap_err();
    assert!(matches!(err, Error::ArgumentMismatch { index: 0, .. }), "{err}");
}

#[test]
fn test_rejects_missing_argument() {
    let reduction = emit(&sum_fusion(&[4, 6], &[1], DType::Int32), &warp4(), &ReductionConfig::default());
    let err = simulate(&reduction, &[]).unwrap_err();
    assert!(matches!(err, Error::ArgumentMismatch { index: 0, .. }), "{err}");
}

// =============================================================================
// HostTensor
// =============================================================================

#[test]
fn test_host_tensor_casts_on_construction() {
    let tensor = HostTensor::new(DType::UInt8, &[2], vec![ConstValue::Int(-1), ConstValue::Int(256)]);
    assert_eq!(tensor.data(), &[ConstValue::UInt(255), ConstValue::UInt(0)]);
    assert_eq!(tensor.get(&[0]), ConstValue::UInt(255));
    assert_eq!(tensor.shape(), &[2]);
    assert_eq!(tensor.dtype(), DType::UInt8);
}

#[test]
#[should_panic(expected = "values for shape")]
fn test_host_tensor_checks_length() {
    HostTensor::new(DType::Int32, &[2, 2], vec![ConstValue::Int(0); 3]);
}
