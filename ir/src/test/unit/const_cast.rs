use test_case::test_case;

use strata_dtype::DType;

use crate::{ConstValue, ReduceOp};

#[test_case(ConstValue::Int(300), DType::Int8, ConstValue::Int(44); "s8 wraps")]
#[test_case(ConstValue::Int(-1), DType::UInt16, ConstValue::UInt(65535); "negative to u16")]
#[test_case(ConstValue::UInt(u64::MAX), DType::Int32, ConstValue::Int(-1); "u64 max to s32")]
#[test_case(ConstValue::Float(-2.7), DType::Int32, ConstValue::Int(-2); "float truncates toward zero")]
#[test_case(ConstValue::Float(-1.0), DType::UInt8, ConstValue::UInt(255); "negative float to u8 wraps")]
#[test_case(ConstValue::Bool(true), DType::Float32, ConstValue::Float(1.0); "bool to float")]
#[test_case(ConstValue::Int(7), DType::Bool, ConstValue::Bool(true); "nonzero to pred")]
#[test_case(ConstValue::Float(0.1), DType::Float32, ConstValue::Float(0.1f32 as f64); "f64 rounds to f32")]
fn cast(value: ConstValue, dtype: DType, expected: ConstValue) {
    assert_eq!(value.cast(dtype), expected);
}

#[test]
fn bfloat16_keeps_eight_mantissa_bits() {
    assert_eq!(ConstValue::Float(1.0 + 1.0 / 512.0).cast(DType::BFloat16), ConstValue::Float(1.0));
    assert_eq!(ConstValue::Float(3.0).cast(DType::BFloat16), ConstValue::Float(3.0));
}

#[test_case(ReduceOp::Add, DType::Int32, ConstValue::Int(0))]
#[test_case(ReduceOp::Mul, DType::UInt8, ConstValue::UInt(1))]
#[test_case(ReduceOp::Max, DType::Int8, ConstValue::Int(-128))]
#[test_case(ReduceOp::Min, DType::UInt16, ConstValue::UInt(65535))]
#[test_case(ReduceOp::Max, DType::Float32, ConstValue::Float(f64::NEG_INFINITY))]
#[test_case(ReduceOp::And, DType::UInt8, ConstValue::UInt(255))]
#[test_case(ReduceOp::And, DType::Bool, ConstValue::Bool(true))]
#[test_case(ReduceOp::Or, DType::Int64, ConstValue::Int(0))]
fn identity(op: ReduceOp, dtype: DType, expected: ConstValue) {
    assert_eq!(op.identity(dtype), expected);
}

#[test]
fn identity_is_neutral() {
    use strum::IntoEnumIterator;

    for op in ReduceOp::iter() {
        for value in [-5i64, 0, 3, 127] {
            let value = ConstValue::Int(value).cast(DType::Int8);
            let combined = op.combine(DType::Int8, op.identity(DType::Int8), value);
            assert_eq!(combined, Some(value), "{op} identity is not neutral for {value}");
        }
    }
}

#[test]
fn combine_truncates() {
    assert_eq!(ReduceOp::Add.combine(DType::UInt8, ConstValue::UInt(200), ConstValue::UInt(100)), Some(ConstValue::UInt(44)));
    assert_eq!(ReduceOp::Add.combine(DType::Int32, ConstValue::Int(1), ConstValue::Float(1.0)), None);
}
