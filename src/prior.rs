use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::debug;

use crate::{
    error::Result,
    math_base::Real,
    model::{Draw, Model},
    registry,
};

/// Draw `num_draws` independent joint samples from the prior of `model`.
///
/// Draws are computed on the rayon thread pool. Draw `i` uses the stream
/// `i` of a `ChaCha8Rng` seeded with `seed`, so the result does not depend
/// on how the draws are scheduled. Each draw is traced against an empty
/// registry, so a template that itself uses rayon never sees the trace of
/// another draw stolen onto the same worker.
pub fn sample_prior_predictive<R: Real>(
    model: &Model<R>,
    num_draws: u64,
    seed: u64,
) -> Result<Vec<Draw<R>>> {
    // fail early instead of once per draw
    model.forward_variables()?;
    debug!(num_draws, seed, "sampling prior predictive");
    (0..num_draws)
        .into_par_iter()
        .map(|draw| {
            registry::isolated(|| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                rng.set_stream(draw);
                model.sample_prior_with_rng(rng)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        distributions::{Exponential, Normal},
        error::ModelError,
        model::ModelSettings,
        random_variable::RandomVariable,
        template::ModelTemplate,
    };
    use pretty_assertions::assert_eq;

    fn hierarchical() -> Model<f64> {
        let mut model: Model<f64> = Model::new(
            ModelTemplate::new(|| {
                let mu = RandomVariable::new("mu", Normal::new(0., 1.))?;
                let sigma = RandomVariable::new("sigma", Exponential::new(1.))?;
                RandomVariable::new("theta", Normal::new(mu.value(), sigma.value()))?;
                Ok(())
            }),
            ModelSettings::default(),
        );
        model.configure().unwrap();
        model
    }

    #[test]
    fn reproducible_across_runs() {
        let model = hierarchical();
        let first = sample_prior_predictive(&model, 64, 5).unwrap();
        let second = sample_prior_predictive(&model, 64, 5).unwrap();
        assert_eq!(first.len(), 64);
        let values = |draws: &[Draw<f64>]| -> Vec<Vec<f64>> {
            draws.iter().map(|draw| draw.free_values()).collect()
        };
        assert_eq!(values(&first), values(&second));
        assert!(first[0].free_values() != first[1].free_values());
    }

    #[test]
    fn draws_match_sequential_sampling() {
        let model = hierarchical();
        let draws = sample_prior_predictive(&model, 4, 11).unwrap();
        for (i, draw) in draws.iter().enumerate() {
            let mut rng = ChaCha8Rng::seed_from_u64(11);
            rng.set_stream(i as u64);
            let expected = model.sample_prior_with_rng(rng).unwrap();
            assert_eq!(draw.free_values(), expected.free_values());
        }
    }

    #[test]
    fn templates_using_rayon_inside_draws() {
        let mut model: Model<f64> = Model::new(
            ModelTemplate::new(|| {
                let mu = RandomVariable::new("mu", Normal::new(0., 1.))?;
                let offset: f64 = (0..20_000)
                    .into_par_iter()
                    .map(|i| (i as f64).sin())
                    .sum();
                RandomVariable::new("y", Normal::new(mu.value() + offset * 1e-3, 1.))?;
                Ok(())
            }),
            ModelSettings::default(),
        );
        model.configure().unwrap();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .unwrap();
        pool.install(|| {
            for seed in 0..10 {
                let draws = sample_prior_predictive(&model, 64, seed).unwrap();
                assert_eq!(draws.len(), 64);
                assert!(draws.iter().all(|draw| draw.iter().count() == 2));
            }
        });
        assert_eq!(registry::depth(), 0);
    }

    #[test]
    fn requires_configuration() {
        let model: Model<f64> = Model::new(ModelTemplate::new(|| Ok(())), ModelSettings::default());
        assert!(matches!(
            sample_prior_predictive(&model, 3, 0),
            Err(ModelError::NotConfigured)
        ));
    }
}
