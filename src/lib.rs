//! Write a probabilistic model once, as a template that declares random
//! variables, and derive both a forward sampler and a log probability
//! function from it.
//!
//! ```
//! use tracemodel::{Model, ModelSettings, ModelTemplate, Normal, RandomVariable};
//!
//! let template = ModelTemplate::<f64>::new(|| {
//!     let x = RandomVariable::new("x", Normal::new(0., 1.))?;
//!     RandomVariable::new("y", Normal::new(x.value(), 1.))?;
//!     Ok(())
//! });
//! let mut model = Model::new(template, ModelSettings::default());
//! model.configure()?;
//!
//! let draw = model.sample_prior(1)?;
//! let logp = model.make_log_prob_function()?;
//! assert_eq!(logp.call(&draw.free_values())?, draw.logp());
//! # Ok::<(), tracemodel::ModelError>(())
//! ```

pub(crate) mod context;
pub(crate) mod distribution;
pub(crate) mod distributions;
pub(crate) mod error;
pub(crate) mod logp;
pub(crate) mod math_base;
pub(crate) mod model;
pub(crate) mod prior;
pub(crate) mod random_variable;
pub mod registry;
pub(crate) mod template;

pub use context::{Context, ForwardContext, InferenceContext};
pub use distribution::{Distribution, DistributionError};
pub use distributions::{Exponential, HalfNormal, LogNormal, Normal, Uniform};
pub use error::{ModelError, Result};
pub use logp::{LogProbFunction, LogpError, LogpFunc};
pub use math_base::Real;
pub use model::{Draw, Model, ModelSettings, VariableInfo};
pub use prior::sample_prior_predictive;
pub use random_variable::RandomVariable;
pub use registry::{ContextGuard, ModelId};
pub use template::{ModelTemplate, Trace};
