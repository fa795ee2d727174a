use dropweights::{infer_weights, BayesOptions, Dataset, EstimateError, InputItem, OutputItem};

fn dataset(name: &str, inputs: &[&str], outputs: &[(&str, f64)]) -> Dataset {
    Dataset {
        name: name.to_string(),
        date: None,
        patch: None,
        description: None,
        sources: None,
        input_items: if inputs.is_empty() {
            None
        } else {
            Some(
                inputs
                    .iter()
                    .map(|id| InputItem { id: id.to_string() })
                    .collect(),
            )
        },
        items: outputs
            .iter()
            .map(|(id, count)| OutputItem {
                id: id.to_string(),
                count: *count,
            })
            .collect(),
    }
}

fn contract_datasets() -> Vec<Dataset> {
    vec![dataset(
        "contract run",
        &["a"],
        &[("x", 80.0), ("y", 20.0)],
    )]
}

#[test]
fn posterior_tracks_the_observed_split() {
    let result = infer_weights(&contract_datasets(), &BayesOptions::default()).unwrap();

    let x = &result.summary_statistics["x"];
    let y = &result.summary_statistics["y"];
    assert!(x.median > 0.7 && x.median < 0.9, "x median {}", x.median);
    assert!(y.median > 0.12 && y.median < 0.28, "y median {}", y.median);
    assert!(result.convergence_diagnostics.overall.converged);
}

#[test]
fn every_item_has_an_equal_length_chain() {
    let result = infer_weights(&contract_datasets(), &BayesOptions::default()).unwrap();

    let lengths: Vec<usize> = result
        .posterior_samples
        .values()
        .map(|chain| chain.len())
        .collect();
    assert!(!lengths.is_empty());
    assert!(lengths.iter().all(|len| *len == lengths[0] && *len > 0));
}

#[test]
fn credible_interval_contains_the_median() {
    let result = infer_weights(&contract_datasets(), &BayesOptions::default()).unwrap();

    for (id, s) in &result.summary_statistics {
        assert!(
            s.credible_interval.lower <= s.median && s.median <= s.credible_interval.upper,
            "interval for {id} does not bracket the median"
        );
    }
}

#[test]
fn same_seed_reproduces_the_chain() {
    let options = BayesOptions {
        chain_length: 3000,
        burn_in: 500,
        ..BayesOptions::default()
    };
    let a = infer_weights(&contract_datasets(), &options).unwrap();
    let b = infer_weights(&contract_datasets(), &options).unwrap();
    assert_eq!(a.posterior_samples, b.posterior_samples);

    let reseeded = BayesOptions {
        rng_seed: 42,
        ..options
    };
    let c = infer_weights(&contract_datasets(), &reseeded).unwrap();
    assert_ne!(a.posterior_samples, c.posterior_samples);
}

#[test]
fn single_item_universe_is_a_point_mass() {
    let result = infer_weights(
        &[dataset("lonely", &[], &[("only", 3.0)])],
        &BayesOptions::default(),
    )
    .unwrap();

    let chain = &result.posterior_samples["only"];
    assert!(!chain.is_empty());
    assert!(chain.iter().all(|w| *w == 1.0));

    let s = &result.summary_statistics["only"];
    assert_eq!(s.median, 1.0);
    assert_eq!(s.credible_interval.lower, 1.0);
    assert_eq!(s.credible_interval.upper, 1.0);
    assert!(result.convergence_diagnostics.overall.converged);
}

#[test]
fn empty_dataset_collection_is_invalid_input() {
    let err = infer_weights(&[], &BayesOptions::default()).unwrap_err();
    assert!(matches!(err, EstimateError::InvalidInput(_)));
}

#[test]
fn inconsistent_chain_options_are_invalid() {
    let options = BayesOptions {
        chain_length: 100,
        burn_in: 100,
        ..BayesOptions::default()
    };
    let err = infer_weights(&contract_datasets(), &options).unwrap_err();
    assert!(matches!(err, EstimateError::InvalidOptions(_)));
}

#[test]
fn result_serializes_with_the_persisted_field_names() {
    let options = BayesOptions {
        chain_length: 1200,
        burn_in: 200,
        ..BayesOptions::default()
    };
    let result = infer_weights(&contract_datasets(), &options).unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert!(value.get("posteriorSamples").is_some());
    assert!(value.get("summaryStatistics").is_some());
    assert!(value.get("convergenceDiagnostics").is_some());
    assert!(value.get("modelAssumptions").is_some());

    let x_stats = &value["summaryStatistics"]["x"];
    assert!(x_stats.get("median").is_some());
    assert!(x_stats.get("map").is_some());
    assert!(x_stats["credibleInterval"].get("lower").is_some());
    assert!(x_stats["credibleInterval"].get("upper").is_some());

    let diag = &value["convergenceDiagnostics"];
    assert!(diag.get("acceptanceRate").is_some());
    assert!(diag["overall"].get("converged").is_some());
}
