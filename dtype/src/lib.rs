//! Element types of values flowing through a fused computation.
//!
//! The reduction emitter only needs to know how wide an element is (for vectorization and shared-memory
//! budgeting) and which arithmetic family it belongs to (for constant folding and truncation).


/// Scalar element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr, strum::Display)]
#[repr(u8)]
pub enum DType {
    #[strum(serialize = "pred")]
    Bool = 0,

    #[strum(serialize = "s8")]
    Int8 = 1,
    #[strum(serialize = "u8")]
    UInt8 = 2,
    #[strum(serialize = "s16")]
    Int16 = 3,
    #[strum(serialize = "u16")]
    UInt16 = 4,
    #[strum(serialize = "s32")]
    Int32 = 5,
    #[strum(serialize = "u32")]
    UInt32 = 6,
    #[strum(serialize = "s64")]
    Int64 = 7,
    #[strum(serialize = "u64")]
    UInt64 = 8,

    #[strum(serialize = "f16")]
    Float16 = 9,
    #[strum(serialize = "bf16")]
    BFloat16 = 10,
    #[strum(serialize = "f32")]
    Float32 = 11,
    #[strum(serialize = "f64")]
    Float64 = 12,
}

impl DType {
    pub const fn bytes(&self) -> usize {
        match self {
            Self::Bool => 1,
            Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 => 4,
            Self::Int64 | Self::UInt64 => 8,
            Self::Float16 | Self::BFloat16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub const fn bits(&self) -> usize {
        match self {
            Self::Bool => 1,
            _ => self.bytes() * 8,
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    /// Whether bitwise reductions (`and`, `or`) are defined for this type.
    pub const fn is_bitwise(&self) -> bool {
        self.is_bool() || self.is_int()
    }
}

/// Host scalar types whose values are elements of one fixed [`DType`].
pub trait HasDType {
    const DTYPE: DType;
}

macro_rules! host_dtypes {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl HasDType for $ty { const DTYPE: DType = DType::$variant; })*
    };
}

host_dtypes! {
    bool => Bool,
    i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64,
    u8 => UInt8, u16 => UInt16, u32 => UInt32, u64 => UInt64,
    f32 => Float32, f64 => Float64,
}
