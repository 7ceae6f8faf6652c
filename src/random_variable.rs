use std::sync::Arc;

use crate::{
    context::Declaration,
    distribution::Distribution,
    error::{ModelError, Result},
    math_base::Real,
    registry,
};

/// A random variable declared inside a model template.
///
/// The handle itself does not decide its value. Declaring it hands it to the
/// context that is active on the current thread, and that context resolves
/// the value: a forward trace samples it, an inference trace binds it to a
/// supplied input. Arithmetic in templates uses [`RandomVariable::value`].
#[derive(Debug, Clone)]
pub struct RandomVariable<R: Real> {
    name: Arc<str>,
    distribution: Arc<dyn Distribution<R>>,
    value: R,
    observed: bool,
}

impl<R: Real> RandomVariable<R> {
    /// Declare a free random variable.
    ///
    /// Fails with [`ModelError::NoActiveContext`] when called outside of a
    /// trace.
    pub fn new<D>(name: impl Into<String>, distribution: D) -> Result<Self>
    where
        D: Distribution<R> + 'static,
    {
        Self::declare(Declaration {
            name: name.into(),
            distribution: Arc::new(distribution),
            observed: None,
        })
    }

    /// Declare a random variable whose value is fixed to observed data.
    ///
    /// It contributes to the log probability like any other variable, but
    /// does not take an input of the log probability function.
    pub fn observed<D>(name: impl Into<String>, distribution: D, value: R) -> Result<Self>
    where
        D: Distribution<R> + 'static,
    {
        Self::declare(Declaration {
            name: name.into(),
            distribution: Arc::new(distribution),
            observed: Some(value),
        })
    }

    fn declare(declaration: Declaration<R>) -> Result<Self> {
        let Some(context) = registry::current::<R>()? else {
            return Err(ModelError::NoActiveContext {
                name: declaration.name,
            });
        };
        let mut context = context.borrow_mut();
        context.register(declaration)
    }

    pub(crate) fn resolved(
        name: String,
        distribution: Arc<dyn Distribution<R>>,
        value: R,
        observed: bool,
    ) -> Self {
        Self {
            name: name.into(),
            distribution,
            value,
            observed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value the active context resolved this variable to.
    pub fn value(&self) -> R {
        self.value.clone()
    }

    pub fn distribution(&self) -> &dyn Distribution<R> {
        self.distribution.as_ref()
    }

    pub(crate) fn shared_distribution(&self) -> Arc<dyn Distribution<R>> {
        self.distribution.clone()
    }

    pub fn is_observed(&self) -> bool {
        self.observed
    }

    pub fn log_density(&self) -> R {
        self.distribution.log_density(&self.value)
    }
}
