//! Models built from a template.
//!
//! A [`Model`] runs its template once under a forward context to learn which
//! variables exist, and then derives a forward sampler and a log probability
//! function from the same template.

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::{
    context::Context,
    distribution::Distribution,
    error::{ModelError, Result},
    logp::LogProbFunction,
    math_base::Real,
    random_variable::RandomVariable,
    registry::ModelId,
    template::{ModelTemplate, Trace},
};

/// Settings for a model.
#[derive(Debug, Clone, Copy)]
pub struct ModelSettings {
    /// Seed of the forward trace that configures the model.
    pub seed: u64,
    /// Compare the distribution family of each variable with the one seen
    /// during configuration, in addition to its name.
    pub check_kinds: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            check_kinds: true,
        }
    }
}

/// One entry of the manifest recorded by the configuring trace.
#[derive(Debug, Clone)]
pub struct VariableInfo<R: Real> {
    pub name: String,
    pub distribution: Arc<dyn Distribution<R>>,
    pub observed: bool,
}

impl<R: Real> VariableInfo<R> {
    pub fn new(name: impl Into<String>, distribution: Arc<dyn Distribution<R>>, observed: bool) -> Self {
        Self {
            name: name.into(),
            distribution,
            observed,
        }
    }

    fn from_variable(variable: &RandomVariable<R>) -> Self {
        Self::new(
            variable.name(),
            variable.shared_distribution(),
            variable.is_observed(),
        )
    }

    pub(crate) fn check(
        &self,
        position: usize,
        name: &str,
        distribution: &dyn Distribution<R>,
        observed: bool,
        check_kinds: bool,
    ) -> Result<()> {
        let kind_differs = check_kinds && distribution.kind() != self.distribution.kind();
        if name != self.name || kind_differs || observed != self.observed {
            return Err(ModelError::VariableShapeMismatch {
                position,
                expected: describe(&self.name, self.distribution.kind(), self.observed),
                found: describe(name, distribution.kind(), observed),
            });
        }
        Ok(())
    }
}

fn describe(name: &str, kind: &str, observed: bool) -> String {
    if observed {
        format!("`{name}` ~ {kind} (observed)")
    } else {
        format!("`{name}` ~ {kind}")
    }
}

/// Check a whole trace against a manifest, position by position.
pub(crate) fn validate_trace<R: Real>(
    expected: &[VariableInfo<R>],
    trace: &Trace<R>,
    check_kinds: bool,
) -> Result<()> {
    if trace.len() != expected.len() {
        return Err(ModelError::VariableCountMismatch {
            expected: expected.len(),
            found: trace.len(),
        });
    }
    for (position, (info, var)) in expected.iter().zip(trace.variables()).enumerate() {
        info.check(
            position,
            var.name(),
            var.distribution(),
            var.is_observed(),
            check_kinds,
        )?;
    }
    Ok(())
}

/// A joint sample of all variables of a model.
#[derive(Debug, Clone)]
pub struct Draw<R: Real> {
    variables: Vec<RandomVariable<R>>,
    logp: R,
}

impl<R: Real> Draw<R> {
    fn from_trace(trace: Trace<R>) -> Self {
        let logp = trace.log_density();
        Self {
            variables: trace.variables().to_vec(),
            logp,
        }
    }

    pub fn get(&self, name: &str) -> Option<R> {
        self.variables
            .iter()
            .find(|var| var.name() == name)
            .map(|var| var.value())
    }

    /// `(name, value)` of every variable in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, R)> + '_ {
        self.variables.iter().map(|var| (var.name(), var.value()))
    }

    /// Values of the free variables, in the order the log probability
    /// function expects them.
    pub fn free_values(&self) -> Vec<R> {
        self.variables
            .iter()
            .filter(|var| !var.is_observed())
            .map(|var| var.value())
            .collect()
    }

    /// Joint log density of the draw.
    pub fn logp(&self) -> R {
        self.logp.clone()
    }
}

#[derive(Debug, Clone)]
struct Configuration<R: Real> {
    variables: Arc<[VariableInfo<R>]>,
    initial_point: Vec<R>,
}

/// A probabilistic model defined by a template.
#[derive(Debug, Clone)]
pub struct Model<R: Real> {
    id: ModelId,
    template: ModelTemplate<R>,
    settings: ModelSettings,
    configuration: Option<Configuration<R>>,
}

impl<R: Real> Model<R> {
    pub fn new(template: ModelTemplate<R>, settings: ModelSettings) -> Self {
        Self {
            id: ModelId::new(),
            template,
            settings,
            configuration: None,
        }
    }

    pub fn id(&self) -> ModelId {
        self.id
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn template(&self) -> &ModelTemplate<R> {
        &self.template
    }

    /// Run the template once under a forward context and record the
    /// declared variables.
    ///
    /// Errors of the template are returned unchanged. Configuring again
    /// replaces the manifest.
    pub fn configure(&mut self) -> Result<()> {
        let rng = ChaCha8Rng::seed_from_u64(self.settings.seed);
        let trace = self.template.trace(Context::forward(rng), Some(self.id))?;
        let variables: Arc<[VariableInfo<R>]> = trace
            .variables()
            .iter()
            .map(VariableInfo::from_variable)
            .collect();
        let initial_point = Draw::from_trace(trace).free_values();
        debug!(
            num_variables = variables.len(),
            dim = initial_point.len(),
            "configured model"
        );
        self.configuration = Some(Configuration {
            variables,
            initial_point,
        });
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.configuration.is_some()
    }

    fn configuration(&self) -> Result<&Configuration<R>> {
        self.configuration.as_ref().ok_or(ModelError::NotConfigured)
    }

    /// The variables found by [`Model::configure`], in declaration order.
    pub fn forward_variables(&self) -> Result<&[VariableInfo<R>]> {
        Ok(&self.configuration()?.variables)
    }

    /// The variables that are inputs of the log probability function.
    pub fn free_variables(&self) -> Result<impl Iterator<Item = &VariableInfo<R>> + '_> {
        Ok(self
            .forward_variables()?
            .iter()
            .filter(|info| !info.observed))
    }

    /// Number of inputs of the log probability function.
    pub fn dim(&self) -> Result<usize> {
        Ok(self.free_variables()?.count())
    }

    /// Values of the free variables sampled while configuring.
    pub fn initial_point(&self) -> Result<&[R]> {
        Ok(&self.configuration()?.initial_point)
    }

    /// Draw one joint sample from the prior.
    pub fn sample_prior(&self, seed: u64) -> Result<Draw<R>> {
        self.sample_prior_with_rng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub(crate) fn sample_prior_with_rng(&self, rng: ChaCha8Rng) -> Result<Draw<R>> {
        let expected = self.forward_variables()?;
        let trace = self.template.trace(Context::forward(rng), Some(self.id))?;
        validate_trace(expected, &trace, self.settings.check_kinds)?;
        Ok(Draw::from_trace(trace))
    }

    /// Build the log probability function of the model.
    ///
    /// The returned function re-runs the template for every evaluation, with
    /// the free variables bound to its inputs in declaration order.
    pub fn make_log_prob_function(&self) -> Result<LogProbFunction<R>> {
        let configuration = self.configuration()?;
        Ok(LogProbFunction::new(
            self.id,
            self.template.clone(),
            configuration.variables.clone(),
            self.settings.check_kinds,
        ))
    }

    /// Like [`Model::make_log_prob_function`], as a plain closure.
    pub fn make_log_prob_closure(&self) -> Result<impl Fn(&[R]) -> Result<R> + Send + Sync> {
        let func = self.make_log_prob_function()?;
        Ok(move |inputs: &[R]| func.call(inputs))
    }
}
