use dropweights::{
    estimate_weights_per_group, estimate_weights_per_input, infer_weights_per_input, BayesOptions,
    Dataset, EstimateError, InputItem, MleOptions, OutputItem,
};

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
    vec![
        dataset("easy runs", &["easy_contract"], &[("x", 90.0), ("y", 10.0)]),
        dataset("hard runs", &["hard_contract"], &[("x", 10.0), ("y", 90.0)]),
    ]
}

#[test]
fn each_input_gets_its_own_distribution() {
    let per_input = estimate_weights_per_input(&contract_datasets(), &MleOptions::default())
        .unwrap();

    assert_eq!(per_input.len(), 2);
    let easy = &per_input["easy_contract"];
    let hard = &per_input["hard_contract"];

    // Structurally different tables: the dominant output flips per input.
    assert!(easy["x"] > 0.8, "easy x = {}", easy["x"]);
    assert!(easy["y"] < 0.15, "easy y = {}", easy["y"]);
    assert!(hard["y"] > 0.8, "hard y = {}", hard["y"]);
    assert!(hard["x"] < 0.15, "hard x = {}", hard["x"]);
}

#[test]
fn partitions_are_estimated_independently() {
    let joint = contract_datasets();
    let per_input = estimate_weights_per_input(&joint, &MleOptions::default()).unwrap();
    let solo = estimate_weights_per_input(&joint[..1], &MleOptions::default()).unwrap();

    // Adding the other contract's datasets must not move this partition.
    let a = &per_input["easy_contract"];
    let b = &solo["easy_contract"];
    for (id, w) in a {
        assert!((w - b[id]).abs() < 1e-12, "{id} drifted");
    }
}

#[test]
fn unattributable_datasets_cannot_be_partitioned() {
    let datasets = vec![dataset("anonymous", &[], &[("x", 5.0)])];
    let err = estimate_weights_per_input(&datasets, &MleOptions::default()).unwrap_err();
    assert!(matches!(err, EstimateError::InvalidInput(_)));
}

#[test]
fn caller_grouping_key_overrides_input_partitioning() {
    let datasets = vec![
        dataset("week 1", &["easy_contract"], &[("x", 30.0)]),
        dataset("week 2", &["hard_contract"], &[("x", 10.0), ("y", 30.0)]),
    ];
    let grouped = estimate_weights_per_group(&datasets, &MleOptions::default(), |ds| {
        Some(ds.name.split_whitespace().next().unwrap_or_default().to_string())
    })
    .unwrap();

    // Both datasets share the "week" key, so a single pooled result comes back.
    assert_eq!(grouped.len(), 1);
    assert!(grouped.contains_key("week"));
}

#[test]
fn bayesian_per_input_results_are_independent_and_complete() {
    let options = BayesOptions {
        chain_length: 4000,
        burn_in: 1000,
        ..BayesOptions::default()
    };
    let per_input = infer_weights_per_input(&contract_datasets(), &options).unwrap();

    assert_eq!(per_input.len(), 2);
    let easy = &per_input["easy_contract"];
    let hard = &per_input["hard_contract"];

    assert!(easy.summary_statistics["x"].median > hard.summary_statistics["x"].median);
    for result in [easy, hard] {
        let lengths: Vec<usize> = result
            .posterior_samples
            .values()
            .map(|chain| chain.len())
            .collect();
        assert!(lengths.iter().all(|len| *len == lengths[0] && *len > 0));
    }
}
