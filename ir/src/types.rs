//! Constant values and operation kinds.
//!
//! Values inside a fused computation are carried as [`ConstValue`] in the widest storage of their family and
//! truncated back to the instruction dtype after every operation, so a `s8` addition wraps exactly like the
//! device would.

use std::fmt;

use strata_dtype::DType;

use crate::eval::eval_binary_op;

/// A single element value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// Helper macro to cast to target width and back to storage type (for proper truncation/extension).
macro_rules! cast_via {
    ($v:expr, $target:ty, $storage:ty) => {
        ($v as $target) as $storage
    };
}

#[inline]
fn cast_int(v: i64, to: DType) -> ConstValue {
    use DType::*;
    match to {
        Bool => ConstValue::Bool(v != 0),
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v),
        UInt8 => ConstValue::UInt(cast_via!(v, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v, u32, u64)),
        UInt64 => ConstValue::UInt(v as u64),
        Float16 | BFloat16 | Float32 | Float64 => cast_float(v as f64, to),
    }
}

#[inline]
fn cast_uint(v: u64, to: DType) -> ConstValue {
    use DType::*;
    match to {
        Bool => ConstValue::Bool(v != 0),
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v as i64),
        UInt8 => ConstValue::UInt(cast_via!(v, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v, u32, u64)),
        UInt64 => ConstValue::UInt(v),
        Float16 | BFloat16 | Float32 | Float64 => cast_float(v as f64, to),
    }
}

#[inline]
fn cast_float(v: f64, to: DType) -> ConstValue {
    use DType::*;
    match to {
        Bool => ConstValue::Bool(v != 0.0),
        Int8 | Int16 | Int32 | Int64 => cast_int(v as i64, to),
        // Float-to-unsigned goes through i64 so negative values wrap instead of saturating at zero.
        UInt8 | UInt16 | UInt32 | UInt64 => cast_uint((v as i64) as u64, to),
        // Half precision is carried at single precision.
        Float16 | Float32 => ConstValue::Float(v as f32 as f64),
        BFloat16 => ConstValue::Float(round_bfloat16(v as f32) as f64),
        Float64 => ConstValue::Float(v),
    }
}

/// Round to nearest-even on the upper 16 bits of an `f32`.
fn round_bfloat16(v: f32) -> f32 {
    if v.is_nan() {
        return v;
    }
    let bits = v.to_bits();
    let rounded = bits.wrapping_add(0x7FFF + ((bits >> 16) & 1));
    f32::from_bits(rounded & 0xFFFF_0000)
}

impl ConstValue {
    pub const fn zero(dtype: DType) -> Self {
        if dtype.is_bool() {
            Self::Bool(false)
        } else if dtype.is_signed() {
            Self::Int(0)
        } else if dtype.is_unsigned() {
            Self::UInt(0)
        } else {
            Self::Float(0.0)
        }
    }

    pub const fn one(dtype: DType) -> Self {
        if dtype.is_bool() {
            Self::Bool(true)
        } else if dtype.is_signed() {
            Self::Int(1)
        } else if dtype.is_unsigned() {
            Self::UInt(1)
        } else {
            Self::Float(1.0)
        }
    }

    /// Smallest representable value (`-inf` for floats).
    pub const fn min_value(dtype: DType) -> Self {
        use DType::*;
        match dtype {
            Bool => Self::Bool(false),
            Int8 => Self::Int(i8::MIN as i64),
            Int16 => Self::Int(i16::MIN as i64),
            Int32 => Self::Int(i32::MIN as i64),
            Int64 => Self::Int(i64::MIN),
            UInt8 | UInt16 | UInt32 | UInt64 => Self::UInt(0),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(f64::NEG_INFINITY),
        }
    }

    /// Largest representable value (`inf` for floats).
    pub const fn max_value(dtype: DType) -> Self {
        use DType::*;
        match dtype {
            Bool => Self::Bool(true),
            Int8 => Self::Int(i8::MAX as i64),
            Int16 => Self::Int(i16::MAX as i64),
            Int32 => Self::Int(i32::MAX as i64),
            Int64 => Self::Int(i64::MAX),
            UInt8 => Self::UInt(u8::MAX as u64),
            UInt16 => Self::UInt(u16::MAX as u64),
            UInt32 => Self::UInt(u32::MAX as u64),
            UInt64 => Self::UInt(u64::MAX),
            Float16 | BFloat16 | Float32 | Float64 => Self::Float(f64::INFINITY),
        }
    }

    /// Cast this value to `dtype`, truncating or wrapping like a C cast.
    pub fn cast(&self, dtype: DType) -> Self {
        match *self {
            Self::Bool(v) => cast_uint(v as u64, dtype),
            Self::Int(v) => cast_int(v, dtype),
            Self::UInt(v) => cast_uint(v, dtype),
            Self::Float(v) => cast_float(v, dtype),
        }
    }

    /// Whether this value is stored in the family of `dtype`.
    pub const fn matches(&self, dtype: DType) -> bool {
        match self {
            Self::Bool(_) => dtype.is_bool(),
            Self::Int(_) => dtype.is_signed(),
            Self::UInt(_) => dtype.is_unsigned(),
            Self::Float(_) => dtype.is_float(),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ConstValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ConstValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u64> for ConstValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for ConstValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for ConstValue {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<bool> for ConstValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Reduction combiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum ReduceOp {
    /// Sum reduction (a + b).
    Add,
    /// Product reduction (a * b).
    Mul,
    /// Maximum reduction (max(a, b)).
    Max,
    /// Minimum reduction (min(a, b)).
    Min,
    /// Bitwise/logical conjunction (int/bool only).
    And,
    /// Bitwise/logical disjunction (int/bool only).
    Or,
}

impl ReduceOp {
    pub const fn binary_op(self) -> BinaryOp {
        match self {
            Self::Add => BinaryOp::Add,
            Self::Mul => BinaryOp::Mul,
            Self::Max => BinaryOp::Max,
            Self::Min => BinaryOp::Min,
            Self::And => BinaryOp::And,
            Self::Or => BinaryOp::Or,
        }
    }

    /// Whether this combiner is defined on `dtype`.
    pub const fn supports(self, dtype: DType) -> bool {
        match self {
            Self::And | Self::Or => dtype.is_bitwise(),
            Self::Add | Self::Mul | Self::Max | Self::Min => true,
        }
    }

    /// Neutral element of the combiner.
    pub fn identity(self, dtype: DType) -> ConstValue {
        match self {
            Self::Add | Self::Or => ConstValue::zero(dtype),
            Self::Mul => ConstValue::one(dtype),
            Self::Max => ConstValue::min_value(dtype),
            Self::Min => ConstValue::max_value(dtype),
            Self::And => match dtype {
                DType::Bool => ConstValue::Bool(true),
                _ => ConstValue::Int(-1).cast(dtype),
            },
        }
    }

    /// Combine two partial results and truncate to `dtype`.
    ///
    /// Returns `None` if the combiner is undefined for the value family.
    pub fn combine(self, dtype: DType, a: ConstValue, b: ConstValue) -> Option<ConstValue> {
        eval_binary_op(self.binary_op(), a, b).map(|v| v.cast(dtype))
    }
}

/// Unary operation types.
///
/// All unary operations preserve the input dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum UnaryOp {
    /// Negation: -x
    Neg,
    /// Absolute value: |x|
    Abs,
    /// Bitwise/logical not (int/bool only)
    Not,
    /// Square root (float only)
    Sqrt,
    /// Natural exponential (float only)
    Exp,
}

impl UnaryOp {
    /// Whether this operation is defined on `dtype`.
    pub const fn supports(self, dtype: DType) -> bool {
        match self {
            Self::Neg => !dtype.is_bool(),
            Self::Abs => !dtype.is_bool(),
            Self::Not => dtype.is_bitwise(),
            Self::Sqrt | Self::Exp => dtype.is_float(),
        }
    }
}

/// Binary operation types.
///
/// Arithmetic and bitwise operations preserve the LHS dtype.
/// Comparison operations (Lt, Eq, Ne) always return DType::Bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BinaryOp {
    // Arithmetic operations
    /// Addition: a + b
    Add,
    /// Subtraction: a - b
    Sub,
    /// Multiplication: a * b
    Mul,
    /// Division: a / b (truncated toward zero for integers)
    Div,
    /// Maximum: max(a, b)
    Max,
    /// Minimum: min(a, b)
    Min,

    // Comparison operations
    /// Less than: a < b
    Lt,
    /// Equality: a == b
    Eq,
    /// Inequality: a != b
    Ne,

    // Bitwise operations (int/bool only)
    /// Bitwise AND: a & b
    And,
    /// Bitwise OR: a | b
    Or,
    /// Bitwise XOR: a ^ b
    Xor,
}

impl BinaryOp {
    /// Returns true if this is a comparison operation.
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Lt | Self::Eq | Self::Ne)
    }

    /// Returns true if this is a bitwise operation.
    pub fn is_bitwise(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor)
    }

    /// Returns true if this operation is commutative.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::Eq | Self::Ne | Self::And | Self::Or | Self::Xor | Self::Max | Self::Min
        )
    }

    /// Result dtype for operands of `dtype`.
    pub fn result_dtype(self, dtype: DType) -> DType {
        if self.is_comparison() { DType::Bool } else { dtype }
    }
}
