//! This module defines shared traits used across different kernels.

/// A trait that maps a signed integer type to its unsigned counterpart.
pub trait HasUnsigned {
    type Unsigned;
}

/// Lossless mapping of signed integers onto unsigned ones so that values of
/// small magnitude (of either sign) become small unsigned numbers.
pub trait ZigZag: HasUnsigned + Sized {
    fn zigzag(self) -> Self::Unsigned;
    fn unzigzag(value: Self::Unsigned) -> Self;
}

// Implement the traits for all primitive integer types.
macro_rules! impl_signed_unsigned_pair {
    ($S:ty, $U:ty) => {
        impl HasUnsigned for $S {
            type Unsigned = $U;
        }
        impl ZigZag for $S {
            #[inline]
            fn zigzag(self) -> $U {
                // The right shift is arithmetic, smearing the sign bit.
                ((self << 1) ^ (self >> (<$S>::BITS - 1))) as $U
            }

            #[inline]
            fn unzigzag(value: $U) -> $S {
                ((value >> 1) as $S) ^ -((value & 1) as $S)
            }
        }
    };
}

impl_signed_unsigned_pair!(i8, u8);
impl_signed_unsigned_pair!(i16, u16);
impl_signed_unsigned_pair!(i32, u32);
impl_signed_unsigned_pair!(i64, u64);
