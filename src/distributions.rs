//! Parametric families that can be used in model templates.
//!
//! Sampling is done on the primal values of the parameters with `rand_distr`,
//! densities are computed in the value type so that derivative information
//! flows from the parameters and the value into the result.

use std::f64::consts::PI;

use rand::RngCore;
use rand_distr::Distribution as _;

use crate::{
    distribution::{Distribution, DistributionError},
    math_base::Real,
};

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

fn positive(
    distribution: &'static str,
    parameter: &'static str,
    value: f64,
) -> Result<f64, DistributionError> {
    if value.is_finite() && value > 0. {
        Ok(value)
    } else {
        Err(DistributionError::InvalidParameter {
            distribution,
            parameter,
            value,
        })
    }
}

fn finite(
    distribution: &'static str,
    parameter: &'static str,
    value: f64,
) -> Result<f64, DistributionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DistributionError::InvalidParameter {
            distribution,
            parameter,
            value,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normal<R: Real = f64> {
    pub mu: R,
    pub sigma: R,
}

impl<R: Real> Normal<R> {
    pub fn new(mu: R, sigma: R) -> Self {
        Self { mu, sigma }
    }

    fn checked(&self) -> Result<(f64, f64), DistributionError> {
        Ok((
            finite("normal", "mu", self.mu.to_f64())?,
            positive("normal", "sigma", self.sigma.to_f64())?,
        ))
    }
}

impl<R: Real> Distribution<R> for Normal<R> {
    fn kind(&self) -> &'static str {
        "normal"
    }

    fn params(&self) -> Vec<R> {
        vec![self.mu.clone(), self.sigma.clone()]
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Result<R, DistributionError> {
        let (mu, sigma) = self.checked()?;
        let dist = rand_distr::Normal::new(mu, sigma).map_err(|_| {
            DistributionError::InvalidParameter {
                distribution: "normal",
                parameter: "sigma",
                value: sigma,
            }
        })?;
        Ok(R::from_f64(dist.sample(rng)))
    }

    fn log_density(&self, value: &R) -> R {
        if self.checked().is_err() {
            return R::neg_infinity();
        }
        let z = (value.clone() - self.mu.clone()) / self.sigma.clone();
        R::from_f64(-0.5) * z.powi(2) - self.sigma.ln() - R::from_f64(LN_SQRT_2PI)
    }
}

/// Normal distribution with mean zero, folded onto the positive half line.
#[derive(Debug, Clone, PartialEq)]
pub struct HalfNormal<R: Real = f64> {
    pub sigma: R,
}

impl<R: Real> HalfNormal<R> {
    pub fn new(sigma: R) -> Self {
        Self { sigma }
    }
}

impl<R: Real> Distribution<R> for HalfNormal<R> {
    fn kind(&self) -> &'static str {
        "half_normal"
    }

    fn params(&self) -> Vec<R> {
        vec![self.sigma.clone()]
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Result<R, DistributionError> {
        let sigma = positive("half_normal", "sigma", self.sigma.to_f64())?;
        let draw: f64 = rand_distr::StandardNormal.sample(rng);
        Ok(R::from_f64(draw.abs() * sigma))
    }

    fn log_density(&self, value: &R) -> R {
        if positive("half_normal", "sigma", self.sigma.to_f64()).is_err() || value.to_f64() < 0. {
            return R::neg_infinity();
        }
        let z = value.clone() / self.sigma.clone();
        R::from_f64(0.5 * (2. / PI).ln()) - self.sigma.ln() - R::from_f64(0.5) * z.powi(2)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogNormal<R: Real = f64> {
    pub mu: R,
    pub sigma: R,
}

impl<R: Real> LogNormal<R> {
    pub fn new(mu: R, sigma: R) -> Self {
        Self { mu, sigma }
    }

    fn checked(&self) -> Result<(f64, f64), DistributionError> {
        Ok((
            finite("log_normal", "mu", self.mu.to_f64())?,
            positive("log_normal", "sigma", self.sigma.to_f64())?,
        ))
    }
}

impl<R: Real> Distribution<R> for LogNormal<R> {
    fn kind(&self) -> &'static str {
        "log_normal"
    }

    fn params(&self) -> Vec<R> {
        vec![self.mu.clone(), self.sigma.clone()]
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Result<R, DistributionError> {
        let (mu, sigma) = self.checked()?;
        let dist = rand_distr::LogNormal::new(mu, sigma).map_err(|_| {
            DistributionError::InvalidParameter {
                distribution: "log_normal",
                parameter: "sigma",
                value: sigma,
            }
        })?;
        Ok(R::from_f64(dist.sample(rng)))
    }

    fn log_density(&self, value: &R) -> R {
        if self.checked().is_err() || value.to_f64() <= 0. {
            return R::neg_infinity();
        }
        let log_value = value.ln();
        let z = (log_value.clone() - self.mu.clone()) / self.sigma.clone();
        R::from_f64(-0.5) * z.powi(2) - log_value - self.sigma.ln() - R::from_f64(LN_SQRT_2PI)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exponential<R: Real = f64> {
    pub lambda: R,
}

impl<R: Real> Exponential<R> {
    pub fn new(lambda: R) -> Self {
        Self { lambda }
    }
}

impl<R: Real> Distribution<R> for Exponential<R> {
    fn kind(&self) -> &'static str {
        "exponential"
    }

    fn params(&self) -> Vec<R> {
        vec![self.lambda.clone()]
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Result<R, DistributionError> {
        let lambda = positive("exponential", "lambda", self.lambda.to_f64())?;
        let dist = rand_distr::Exp::new(lambda).map_err(|_| {
            DistributionError::InvalidParameter {
                distribution: "exponential",
                parameter: "lambda",
                value: lambda,
            }
        })?;
        Ok(R::from_f64(dist.sample(rng)))
    }

    fn log_density(&self, value: &R) -> R {
        if positive("exponential", "lambda", self.lambda.to_f64()).is_err() || value.to_f64() < 0. {
            return R::neg_infinity();
        }
        self.lambda.ln() - self.lambda.clone() * value.clone()
    }
}

/// Continuous uniform distribution on `[lower, upper]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Uniform<R: Real = f64> {
    pub lower: R,
    pub upper: R,
}

impl<R: Real> Uniform<R> {
    pub fn new(lower: R, upper: R) -> Self {
        Self { lower, upper }
    }

    fn checked(&self) -> Result<(f64, f64), DistributionError> {
        let lower = finite("uniform", "lower", self.lower.to_f64())?;
        let upper = finite("uniform", "upper", self.upper.to_f64())?;
        if upper <= lower {
            return Err(DistributionError::InvalidParameter {
                distribution: "uniform",
                parameter: "upper",
                value: upper,
            });
        }
        Ok((lower, upper))
    }
}

impl<R: Real> Distribution<R> for Uniform<R> {
    fn kind(&self) -> &'static str {
        "uniform"
    }

    fn params(&self) -> Vec<R> {
        vec![self.lower.clone(), self.upper.clone()]
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Result<R, DistributionError> {
        let (lower, upper) = self.checked()?;
        let dist = rand_distr::Uniform::new(lower, upper).map_err(|_| {
            DistributionError::InvalidParameter {
                distribution: "uniform",
                parameter: "upper",
                value: upper,
            }
        })?;
        Ok(R::from_f64(dist.sample(rng)))
    }

    fn log_density(&self, value: &R) -> R {
        let Ok((lower, upper)) = self.checked() else {
            return R::neg_infinity();
        };
        let x = value.to_f64();
        if x < lower || x > upper {
            return R::neg_infinity();
        }
        -(self.upper.clone() - self.lower.clone()).ln()
    }
}
