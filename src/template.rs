use std::{cell::RefCell, fmt::Debug, marker::PhantomData, rc::Rc, sync::Arc};

use itertools::Itertools;
use tracing::debug;

use crate::{
    context::Context,
    error::Result,
    math_base::{sum, Real},
    random_variable::RandomVariable,
    registry::{self, ModelId},
};

type TemplateFn = dyn Fn() -> Result<()> + Send + Sync;

/// A function that declares the random variables of a model.
///
/// The function is executed once per trace and must declare the same
/// sequence of variables every time. It may use the values of earlier
/// variables as parameters of later ones, but should not branch on them.
pub struct ModelTemplate<R: Real> {
    func: Arc<TemplateFn>,
    _value: PhantomData<fn() -> R>,
}

impl<R: Real> Clone for ModelTemplate<R> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            _value: PhantomData,
        }
    }
}

impl<R: Real> Debug for ModelTemplate<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelTemplate").finish_non_exhaustive()
    }
}

impl<R: Real> ModelTemplate<R> {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn() -> Result<()> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            _value: PhantomData,
        }
    }

    /// Execute the template once with `context` active.
    ///
    /// The context is deactivated before this returns, also if the
    /// template fails.
    pub fn trace(&self, context: Context<R>, model: Option<ModelId>) -> Result<Trace<R>> {
        let context = Rc::new(RefCell::new(context));
        registry::with_context(context.clone(), model, || (self.func)())?;
        let variables = context.borrow_mut().finish()?;
        debug!(num_variables = variables.len(), "finished trace");
        Ok(Trace { variables })
    }
}

/// The variables declared by one execution of a template.
#[derive(Debug, Clone)]
pub struct Trace<R: Real> {
    variables: Vec<RandomVariable<R>>,
}

impl<R: Real> Trace<R> {
    pub fn variables(&self) -> &[RandomVariable<R>] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Joint log density of all variables at their resolved values.
    pub fn log_density(&self) -> R {
        sum(self.variables.iter().map(|var| var.log_density()))
    }

    /// Log density of each variable, in declaration order.
    pub fn point_logps(&self) -> Vec<(String, R)> {
        self.variables
            .iter()
            .map(|var| (var.name().to_string(), var.log_density()))
            .collect()
    }

    pub fn names(&self) -> String {
        self.variables.iter().map(|var| var.name()).join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{distribution::Distribution, distributions::Normal, error::ModelError};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn forward() -> Context<f64> {
        Context::forward(ChaCha8Rng::seed_from_u64(42))
    }

    #[test]
    fn trace_collects_declarations() {
        let template = ModelTemplate::new(|| {
            let x = RandomVariable::new("x", Normal::new(0., 1.))?;
            RandomVariable::new("y", Normal::new(x.value(), 1.))?;
            Ok(())
        });
        let trace = template.trace(forward(), None).unwrap();
        assert_eq!(trace.names(), "x, y");
        let x = trace.variables()[0].value();
        let y = trace.variables()[1].value();
        let expected =
            Normal::new(0., 1.).log_density(&x) + Normal::new(x, 1.).log_density(&y);
        approx::assert_abs_diff_eq!(trace.log_density(), expected, epsilon = 1e-12);
        assert_eq!(registry::depth(), 0);
    }

    #[test]
    fn traces_are_independent() {
        let template = ModelTemplate::new(|| {
            RandomVariable::new("x", Normal::new(0., 1.))?;
            Ok(())
        });
        let first = template.trace(forward(), None).unwrap();
        let second = template.trace(forward(), None).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first.variables()[0].value(), second.variables()[0].value());
    }

    #[test]
    fn failing_template_releases_context() {
        let template: ModelTemplate<f64> = ModelTemplate::new(|| {
            RandomVariable::new("x", Normal::new(0., 1.))?;
            Err(anyhow::anyhow!("broken template").into())
        });
        let err = template.trace(forward(), None).unwrap_err();
        assert!(matches!(err, ModelError::Template(_)));
        assert_eq!(registry::depth(), 0);
    }

    #[test]
    fn empty_template() {
        let template: ModelTemplate<f64> = ModelTemplate::new(|| Ok(()));
        let trace = template.trace(forward(), None).unwrap();
        assert!(trace.is_empty());
        assert_eq!(trace.log_density(), 0.);
    }
}
