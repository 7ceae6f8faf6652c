use std::fmt::Debug;

use rand::RngCore;
use thiserror::Error;

use crate::math_base::Real;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributionError {
    #[error("Invalid parameter {parameter} = {value} for {distribution} distribution")]
    InvalidParameter {
        distribution: &'static str,
        parameter: &'static str,
        value: f64,
    },
}

/// A parametric family with fixed parameters.
///
/// Implementations must be immutable. `sample` is only used by forward
/// traces, `log_density` by both kinds of traces.
pub trait Distribution<R: Real>: Debug + Send + Sync {
    /// Name of the family, e.g. `"normal"`.
    ///
    /// Traces of the same template are compared by family and not by
    /// parameter values, because parameters may depend on other variables.
    fn kind(&self) -> &'static str;

    /// The parameter values in a fixed, family specific order.
    fn params(&self) -> Vec<R>;

    /// Draw a value using the primal values of the parameters.
    fn sample(&self, rng: &mut dyn RngCore) -> Result<R, DistributionError>;

    /// Log density at `value`. Negative infinity outside of the support or
    /// if the parameters are invalid.
    fn log_density(&self, value: &R) -> R;
}
