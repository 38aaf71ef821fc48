//! Element traits for mapping Rust types to DType

use super::{Complex64, Complex128, DType};
use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;
use std::ops::{Add, Div, Mul, Sub};

/// Trait for types that can be stored in a device buffer
///
/// # Bounds
/// - `Copy + Send + Sync + 'static` - Basic trait requirements
/// - `Pod + Zeroable` - Safe memory transmutation (bytemuck)
/// - `Add + Sub + Mul + Div` - Arithmetic operations (Output = Self)
pub trait Element:
    Copy
    + Send
    + Sync
    + Pod
    + Zeroable
    + Debug
    + PartialEq
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;
}

/// Trait for elements that support the dense linear algebra kernels.
///
/// Implemented for the four s/d/c/z precisions. Real types treat `conj` as
/// the identity.
pub trait LinalgElement: Element + std::ops::Neg<Output = Self> {
    /// Machine epsilon of the underlying real type
    fn epsilon_val() -> f64;
    /// Complex conjugate
    fn conj_val(self) -> Self;
    /// Reciprocal; a zero value yields a non-finite result
    fn recip_val(self) -> Self;
    /// Absolute value (magnitude for complex) as f64
    fn abs_val(self) -> f64;
    /// Real part as f64
    fn real_val(self) -> f64;
    /// Build a real-valued element
    fn from_real(v: f64) -> Self;
    /// Principal square root
    fn sqrt_val(self) -> Self;
    /// True when every component is finite
    fn is_finite_val(self) -> bool;
}

macro_rules! impl_real_element {
    ($ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }
        }

        impl LinalgElement for $ty {
            #[inline]
            fn epsilon_val() -> f64 {
                <$ty>::EPSILON as f64
            }
            #[inline]
            fn conj_val(self) -> Self {
                self
            }
            #[inline]
            fn recip_val(self) -> Self {
                1.0 / self
            }
            #[inline]
            fn abs_val(self) -> f64 {
                self.abs() as f64
            }
            #[inline]
            fn real_val(self) -> f64 {
                self as f64
            }
            #[inline]
            fn from_real(v: f64) -> Self {
                v as $ty
            }
            #[inline]
            fn sqrt_val(self) -> Self {
                self.sqrt()
            }
            #[inline]
            fn is_finite_val(self) -> bool {
                self.is_finite()
            }
        }
    };
}

impl_real_element!(f32, DType::F32);
impl_real_element!(f64, DType::F64);

impl Element for i64 {
    const DTYPE: DType = DType::I64;

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn one() -> Self {
        1
    }
}

macro_rules! impl_complex_element {
    ($ty:ty, $float:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn zero() -> Self {
                <$ty>::ZERO
            }

            #[inline]
            fn one() -> Self {
                <$ty>::ONE
            }
        }

        impl LinalgElement for $ty {
            #[inline]
            fn epsilon_val() -> f64 {
                <$float>::EPSILON as f64
            }
            #[inline]
            fn conj_val(self) -> Self {
                self.conj()
            }
            #[inline]
            fn recip_val(self) -> Self {
                self.recip()
            }
            #[inline]
            fn abs_val(self) -> f64 {
                self.magnitude() as f64
            }
            #[inline]
            fn real_val(self) -> f64 {
                self.re as f64
            }
            #[inline]
            fn from_real(v: f64) -> Self {
                <$ty>::new(v as $float, 0.0)
            }
            #[inline]
            fn sqrt_val(self) -> Self {
                self.sqrt()
            }
            #[inline]
            fn is_finite_val(self) -> bool {
                self.re.is_finite() && self.im.is_finite()
            }
        }
    };
}

impl_complex_element!(Complex64, f32, DType::Complex64);
impl_complex_element!(Complex128, f64, DType::Complex128);
