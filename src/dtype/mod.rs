//! Data type system for blocktri buffers
//!
//! This module provides the `DType` enum representing the supported element
//! types, together with the `Element` and `LinalgElement` traits that connect
//! Rust types to it.

pub mod complex;
mod element;

pub use complex::{Complex64, Complex128};
pub use element::{Element, LinalgElement};

use std::fmt;

/// Data types supported by blocktri buffers
///
/// The four floating point types mirror the s/d/c/z precisions of the
/// kernels; `I64` is the index type of sparse matrices.
///
/// # Discriminant Values (Serialization Stability)
///
/// - Floats: F64=0, F32=1
/// - Signed ints: I64=10
/// - Complex: Complex64=40, Complex128=41
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
    /// 64-bit signed integer (sparse indices)
    I64 = 10,
    /// 64-bit complex (two f32: re, im)
    Complex64 = 40,
    /// 128-bit complex (two f64: re, im)
    Complex128 = 41,
}

impl DType {
    /// The widest element type; zero-byte allocations are rounded up to it
    pub const LARGEST: DType = DType::Complex128;

    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Complex128 => 16,
            Self::F64 | Self::I64 | Self::Complex64 => 8,
            Self::F32 => 4,
        }
    }

    /// Returns true if this is a real floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32)
    }

    /// Returns true if this is a complex number type
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    /// LAPACK precision prefix (s, d, c, z); `None` for index types
    pub const fn precision_prefix(self) -> Option<char> {
        match self {
            Self::F32 => Some('s'),
            Self::F64 => Some('d'),
            Self::Complex64 => Some('c'),
            Self::Complex128 => Some('z'),
            Self::I64 => None,
        }
    }

    /// Short name for display (e.g., "f32", "c128")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::Complex64 => "c64",
            Self::Complex128 => "c128",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}
