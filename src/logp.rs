use std::{fmt::Debug, sync::Arc};

use tracing::trace;

use crate::{
    context::Context,
    error::{ModelError, Result},
    math_base::Real,
    model::VariableInfo,
    registry::ModelId,
    template::{ModelTemplate, Trace},
};

/// Errors that happen when we evaluate a log probability function
pub trait LogpError: std::error::Error {
    /// Unrecoverable errors stop a sampler, recoverable errors are seen as
    /// divergences.
    fn is_recoverable(&self) -> bool;
}

/// A log density over a fixed number of unconstrained inputs.
///
/// This is the interface samplers consume. Gradients are the concern of the
/// value type `R`.
pub trait LogpFunc<R: Real> {
    type LogpError: Debug + Send + LogpError + 'static;

    fn logp(&mut self, position: &[R]) -> std::result::Result<R, Self::LogpError>;
    fn dim(&self) -> usize;
}

/// The log probability function of a configured [`Model`](crate::Model).
///
/// Every call runs the template under a fresh inference context, so calls
/// do not influence each other.
#[derive(Debug, Clone)]
pub struct LogProbFunction<R: Real> {
    model: ModelId,
    template: ModelTemplate<R>,
    expected: Arc<[VariableInfo<R>]>,
    check_kinds: bool,
    dim: usize,
}

impl<R: Real> LogProbFunction<R> {
    pub(crate) fn new(
        model: ModelId,
        template: ModelTemplate<R>,
        expected: Arc<[VariableInfo<R>]>,
        check_kinds: bool,
    ) -> Self {
        let dim = expected.iter().filter(|info| !info.observed).count();
        Self {
            model,
            template,
            expected,
            check_kinds,
            dim,
        }
    }

    /// Joint log density with the free variables bound to `inputs`.
    pub fn call(&self, inputs: &[R]) -> Result<R> {
        let logp = self.trace(inputs)?.log_density();
        trace!(logp = logp.to_f64(), "evaluated log probability");
        Ok(logp)
    }

    /// Log density of every variable, including observed ones, in
    /// declaration order.
    pub fn point_logps(&self, inputs: &[R]) -> Result<Vec<(String, R)>> {
        Ok(self.trace(inputs)?.point_logps())
    }

    /// Run the inference trace and return the bound variables.
    pub fn trace(&self, inputs: &[R]) -> Result<Trace<R>> {
        let context = Context::inference(inputs.to_vec(), self.expected.clone(), self.check_kinds)?;
        self.template.trace(context, Some(self.model))
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Names of the inputs, in order.
    pub fn input_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.expected
            .iter()
            .filter(|info| !info.observed)
            .map(|info| info.name.as_str())
    }
}

impl<R: Real> LogpFunc<R> for LogProbFunction<R> {
    type LogpError = ModelError;

    fn logp(&mut self, position: &[R]) -> Result<R> {
        self.call(position)
    }

    fn dim(&self) -> usize {
        self.dim
    }
}
