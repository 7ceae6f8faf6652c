use std::{
    fmt::Debug,
    ops::{Add, Div, Mul, Neg, Sub},
};

/// Scalar values that random variables resolve to.
///
/// This is the boundary to the numerical engine. Every distribution and
/// every log density in this crate is written against `Real`, so a value
/// type that records operations for automatic differentiation can be used
/// instead of `f64` without changes to model templates.
pub trait Real:
    Clone
    + Debug
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Lift a constant into the value type.
    fn from_f64(value: f64) -> Self;

    /// The primal value, without any derivative information.
    fn to_f64(&self) -> f64;

    fn ln(&self) -> Self;
    fn exp(&self) -> Self;
    fn powi(&self, n: i32) -> Self;

    fn zero() -> Self {
        Self::from_f64(0.)
    }

    fn neg_infinity() -> Self {
        Self::from_f64(f64::NEG_INFINITY)
    }

    fn is_finite(&self) -> bool {
        self.to_f64().is_finite()
    }
}

impl Real for f64 {
    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn to_f64(&self) -> f64 {
        *self
    }

    #[inline]
    fn ln(&self) -> Self {
        f64::ln(*self)
    }

    #[inline]
    fn exp(&self) -> Self {
        f64::exp(*self)
    }

    #[inline]
    fn powi(&self, n: i32) -> Self {
        f64::powi(*self, n)
    }
}

/// Sum a sequence of values, starting from zero.
pub(crate) fn sum<R: Real>(values: impl IntoIterator<Item = R>) -> R {
    values.into_iter().fold(R::zero(), |acc, x| acc + x)
}
