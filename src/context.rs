use std::{collections::HashSet, sync::Arc};

use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::{
    distribution::Distribution,
    error::{ModelError, Result},
    math_base::Real,
    model::VariableInfo,
    random_variable::RandomVariable,
};

/// A random variable as it is declared in a template, before the active
/// context decided on its value.
pub(crate) struct Declaration<R: Real> {
    pub(crate) name: String,
    pub(crate) distribution: Arc<dyn Distribution<R>>,
    pub(crate) observed: Option<R>,
}

/// The interpretation of random variables during one trace.
///
/// Every declaration made while a context is active is routed to
/// [`Context::register`], which decides what value the variable takes.
#[derive(Debug)]
pub enum Context<R: Real> {
    /// Draw every free variable from its distribution.
    Forward(ForwardContext<R>),
    /// Bind free variables to supplied values, in declaration order.
    Inference(InferenceContext<R>),
}

impl<R: Real> Context<R> {
    pub fn forward(rng: ChaCha8Rng) -> Self {
        Context::Forward(ForwardContext::new(rng))
    }

    pub fn inference(
        inputs: Vec<R>,
        expected: Arc<[VariableInfo<R>]>,
        check_kinds: bool,
    ) -> Result<Self> {
        Ok(Context::Inference(InferenceContext::new(
            inputs,
            expected,
            check_kinds,
        )?))
    }

    /// The variables registered so far, in declaration order.
    pub fn declared(&self) -> &[RandomVariable<R>] {
        match self {
            Context::Forward(ctx) => &ctx.declared,
            Context::Inference(ctx) => &ctx.declared,
        }
    }

    pub(crate) fn register(&mut self, declaration: Declaration<R>) -> Result<RandomVariable<R>> {
        let names = match self {
            Context::Forward(ctx) => &mut ctx.names,
            Context::Inference(ctx) => &mut ctx.names,
        };
        if !names.insert(declaration.name.clone()) {
            return Err(ModelError::DuplicateVariableName {
                name: declaration.name,
            });
        }

        let variable = match self {
            Context::Forward(ctx) => ctx.register(declaration)?,
            Context::Inference(ctx) => ctx.register(declaration)?,
        };
        trace!(
            name = variable.name(),
            kind = variable.distribution().kind(),
            observed = variable.is_observed(),
            "registered random variable"
        );
        Ok(variable)
    }

    /// Take the declared variables out of the context once the template
    /// returned.
    pub(crate) fn finish(&mut self) -> Result<Vec<RandomVariable<R>>> {
        match self {
            Context::Forward(ctx) => Ok(std::mem::take(&mut ctx.declared)),
            Context::Inference(ctx) => ctx.finish(),
        }
    }
}

#[derive(Debug)]
pub struct ForwardContext<R: Real> {
    rng: ChaCha8Rng,
    declared: Vec<RandomVariable<R>>,
    names: HashSet<String>,
}

impl<R: Real> ForwardContext<R> {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            declared: vec![],
            names: HashSet::new(),
        }
    }

    fn register(&mut self, declaration: Declaration<R>) -> Result<RandomVariable<R>> {
        let Declaration {
            name,
            distribution,
            observed,
        } = declaration;
        let is_observed = observed.is_some();
        let value = match observed {
            Some(value) => value,
            None => distribution
                .sample(&mut self.rng)
                .map_err(|source| ModelError::Distribution {
                    name: name.clone(),
                    source,
                })?,
        };
        let variable = RandomVariable::resolved(name, distribution, value, is_observed);
        self.declared.push(variable.clone());
        Ok(variable)
    }
}

#[derive(Debug)]
pub struct InferenceContext<R: Real> {
    inputs: Vec<R>,
    expected: Arc<[VariableInfo<R>]>,
    check_kinds: bool,
    next_input: usize,
    declared: Vec<RandomVariable<R>>,
    names: HashSet<String>,
}

impl<R: Real> InferenceContext<R> {
    /// Fails if `inputs` does not contain exactly one value per free
    /// variable of `expected`.
    pub fn new(
        inputs: Vec<R>,
        expected: Arc<[VariableInfo<R>]>,
        check_kinds: bool,
    ) -> Result<Self> {
        let free = expected.iter().filter(|info| !info.observed).count();
        if inputs.len() != free {
            return Err(ModelError::VariableCountMismatch {
                expected: free,
                found: inputs.len(),
            });
        }
        Ok(Self {
            inputs,
            expected,
            check_kinds,
            next_input: 0,
            declared: Vec::with_capacity(free),
            names: HashSet::new(),
        })
    }

    fn register(&mut self, declaration: Declaration<R>) -> Result<RandomVariable<R>> {
        let position = self.declared.len();
        let Some(info) = self.expected.get(position) else {
            return Err(ModelError::VariableCountMismatch {
                expected: self.expected.len(),
                found: position + 1,
            });
        };

        let Declaration {
            name,
            distribution,
            observed,
        } = declaration;
        info.check(
            position,
            &name,
            distribution.as_ref(),
            observed.is_some(),
            self.check_kinds,
        )?;

        let is_observed = observed.is_some();
        let value = match observed {
            Some(value) => value,
            None => {
                let value = self.inputs[self.next_input].clone();
                self.next_input += 1;
                value
            }
        };
        let variable = RandomVariable::resolved(name, distribution, value, is_observed);
        self.declared.push(variable.clone());
        Ok(variable)
    }

    fn finish(&mut self) -> Result<Vec<RandomVariable<R>>> {
        if self.declared.len() != self.expected.len() {
            return Err(ModelError::VariableCountMismatch {
                expected: self.expected.len(),
                found: self.declared.len(),
            });
        }
        Ok(std::mem::take(&mut self.declared))
    }
}
