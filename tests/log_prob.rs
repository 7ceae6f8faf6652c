use std::f64::consts::PI;

use approx::assert_abs_diff_eq;
use tracemodel::{
    registry, sample_prior_predictive, HalfNormal, LogpError, LogpFunc, Model,
    ModelError, ModelSettings, ModelTemplate, Normal, RandomVariable,
};

fn normal_logp(v: f64, mu: f64, sigma: f64) -> f64 {
    -0.5 * ((v - mu) / sigma).powi(2) - sigma.ln() - 0.5 * (2. * PI).ln()
}

fn single_normal(mu: f64, sigma: f64) -> anyhow::Result<Model<f64>> {
    let mut model = Model::new(
        ModelTemplate::new(move || {
            RandomVariable::new("x", Normal::new(mu, sigma))?;
            Ok(())
        }),
        ModelSettings::default(),
    );
    model.configure()?;
    Ok(model)
}

#[test]
fn single_variable_scenario() -> anyhow::Result<()> {
    let model = single_normal(0., 1.)?;
    let vars = model.forward_variables()?;
    assert_eq!(vars.len(), 1);
    assert_eq!(vars[0].name, "x");
    assert_eq!(vars[0].distribution.kind(), "normal");
    assert_eq!(vars[0].distribution.params(), vec![0., 1.]);

    let logp = model.make_log_prob_closure()?;
    assert_abs_diff_eq!(logp(&[2.0])?, -2.919, epsilon = 1e-3);
    assert_abs_diff_eq!(logp(&[2.0])?, normal_logp(2., 0., 1.), epsilon = 1e-12);
    Ok(())
}

#[test]
fn closed_form_for_many_inputs() -> anyhow::Result<()> {
    let model = single_normal(1.5, 0.3)?;
    let func = model.make_log_prob_function()?;
    for i in -100..=100 {
        let v = i as f64 * 0.37;
        assert_abs_diff_eq!(func.call(&[v])?, normal_logp(v, 1.5, 0.3), epsilon = 1e-9);
    }
    Ok(())
}

#[test]
fn structure_is_deterministic_across_seeds() -> anyhow::Result<()> {
    let template = ModelTemplate::<f64>::new(|| {
        let mu = RandomVariable::new("mu", Normal::new(0., 5.))?;
        let sigma = RandomVariable::new("sigma", HalfNormal::new(2.))?;
        RandomVariable::new("obs", Normal::new(mu.value(), sigma.value()))?;
        Ok(())
    });
    type Manifest = Vec<(String, &'static str, Vec<f64>)>;
    let manifest = |seed| -> anyhow::Result<(Manifest, Vec<f64>)> {
        let mut model = Model::new(
            template.clone(),
            ModelSettings {
                seed,
                ..Default::default()
            },
        );
        model.configure()?;
        let variables = model
            .forward_variables()?
            .iter()
            .map(|info| {
                (
                    info.name.clone(),
                    info.distribution.kind(),
                    info.distribution.params(),
                )
            })
            .collect();
        Ok((variables, model.initial_point()?.to_vec()))
    };
    let (reference, _) = manifest(0)?;
    for seed in 1..20 {
        let (variables, point) = manifest(seed)?;
        // mu and sigma have constant parameters
        assert_eq!(variables[..2], reference[..2]);
        // obs is parameterized by the values bound in this trace
        let (name, kind, params) = &variables[2];
        assert_eq!((name.as_str(), *kind), ("obs", "normal"));
        assert_eq!(params, &point[..2]);
    }
    Ok(())
}

#[test]
fn count_mismatch_is_reported_and_registry_is_clean() -> anyhow::Result<()> {
    let model = single_normal(0., 1.)?;
    let func = model.make_log_prob_function()?;
    for inputs in [vec![], vec![1., 2.]] {
        match func.call(&inputs) {
            Err(ModelError::VariableCountMismatch { expected, found }) => {
                assert_eq!(expected, 1);
                assert_eq!(found, inputs.len());
            }
            other => panic!("expected a count mismatch, got {other:?}"),
        }
        assert_eq!(registry::depth(), 0);
    }
    Ok(())
}

#[test]
fn failing_template_restores_registry() -> anyhow::Result<()> {
    let mut model: Model<f64> = Model::new(
        ModelTemplate::new(|| {
            RandomVariable::new("x", Normal::new(0., 1.))?;
            Err(anyhow::anyhow!("no data for this model").into())
        }),
        ModelSettings::default(),
    );
    let err = model.configure().unwrap_err();
    assert_eq!(err.to_string(), "no data for this model");
    assert_eq!(registry::depth(), 0);
    Ok(())
}

#[test]
fn declaring_outside_a_trace_fails() {
    let err = RandomVariable::new("x", Normal::new(0f64, 1.)).unwrap_err();
    assert!(matches!(err, ModelError::NoActiveContext { .. }));
}

#[test]
fn logp_function_on_other_threads() -> anyhow::Result<()> {
    let model = single_normal(0., 1.)?;
    let func = model.make_log_prob_function()?;
    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let mut func = func.clone();
                scope.spawn(move || func.logp(&[i as f64]))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("logp thread panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;
    for (i, logp) in results.into_iter().enumerate() {
        assert_abs_diff_eq!(logp, normal_logp(i as f64, 0., 1.), epsilon = 1e-12);
    }
    Ok(())
}

#[test]
fn prior_predictive_and_logp_agree() -> anyhow::Result<()> {
    let mut model: Model<f64> = Model::new(
        ModelTemplate::new(|| {
            let mu = RandomVariable::new("mu", Normal::new(0., 1.))?;
            let sigma = RandomVariable::new("sigma", HalfNormal::new(1.))?;
            for (i, y) in [0.2, 1.4, -0.3].into_iter().enumerate() {
                RandomVariable::observed(
                    format!("y{i}"),
                    Normal::new(mu.value(), sigma.value()),
                    y,
                )?;
            }
            Ok(())
        }),
        ModelSettings::default(),
    );
    model.configure()?;
    assert_eq!(model.dim()?, 2);
    let func = model.make_log_prob_function()?;
    let draws = sample_prior_predictive(&model, 32, 3)?;
    for draw in draws {
        assert_abs_diff_eq!(func.call(&draw.free_values())?, draw.logp(), epsilon = 1e-12);
    }
    Ok(())
}

#[test]
fn errors_are_classified_for_samplers() -> anyhow::Result<()> {
    let model = single_normal(0., 1.)?;
    let mut func = model.make_log_prob_function()?;
    let err = func.logp(&[]).unwrap_err();
    assert!(!err.is_recoverable());
    assert!(!err.is_fatal());
    Ok(())
}
