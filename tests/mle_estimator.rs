use dropweights::{estimate_item_weights, Dataset, EstimateError, InputItem, MleOptions, OutputItem};

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

#[test]
fn weights_are_nonnegative_and_sum_to_one() {
    let datasets = vec![
        dataset("batch 1", &["ore"], &[("bar", 34.0), ("gem", 7.0), ("dust", 12.0)]),
        dataset("batch 2", &["ore"], &[("bar", 61.0), ("dust", 18.0)]),
        dataset("unattributed", &[], &[("bar", 9.0), ("gem", 2.0)]),
    ];
    let weights = estimate_item_weights(&datasets, &MleOptions::default()).unwrap();

    let total: f64 = weights.values().sum();
    assert!((total - 1.0).abs() < 1e-6, "weights sum to {total}");
    assert!(weights.values().all(|w| *w >= 0.0));
}

#[test]
fn single_item_universe_gets_full_weight() {
    let datasets = vec![dataset("lonely", &[], &[("only", 5.0)])];
    let weights = estimate_item_weights(&datasets, &MleOptions::default()).unwrap();

    assert_eq!(weights.len(), 1);
    assert_eq!(weights["only"], 1.0);
}

#[test]
fn recovers_a_four_to_one_split() {
    let datasets = vec![dataset(
        "contract run",
        &["a"],
        &[("x", 80.0), ("y", 20.0)],
    )];
    let weights = estimate_item_weights(&datasets, &MleOptions::default()).unwrap();

    assert!((weights["x"] - 0.8).abs() < 0.02, "x = {}", weights["x"]);
    assert!((weights["y"] - 0.2).abs() < 0.02, "y = {}", weights["y"]);
    // The input item itself is never observed as an output; its weight decays.
    assert!(weights["a"] < 0.02, "a = {}", weights["a"]);
}

#[test]
fn identical_counts_give_identical_weights() {
    let datasets = vec![dataset("even", &["c"], &[("x", 50.0), ("y", 50.0)])];
    let weights = estimate_item_weights(&datasets, &MleOptions::default()).unwrap();

    assert!(
        (weights["x"] - weights["y"]).abs() < 1e-3,
        "x = {}, y = {}",
        weights["x"],
        weights["y"]
    );
}

#[test]
fn dominant_counts_never_rank_below() {
    let datasets = vec![dataset(
        "ladder",
        &["c"],
        &[("gold", 60.0), ("silver", 30.0), ("bronze", 10.0)],
    )];
    let weights = estimate_item_weights(&datasets, &MleOptions::default()).unwrap();

    assert!(weights["gold"] >= weights["silver"]);
    assert!(weights["silver"] >= weights["bronze"]);
}

#[test]
fn empty_dataset_collection_is_invalid_input() {
    let err = estimate_item_weights(&[], &MleOptions::default()).unwrap_err();
    assert!(matches!(err, EstimateError::InvalidInput(_)));
}

#[test]
fn malformed_count_is_invalid_input() {
    let datasets = vec![dataset("bad", &["a"], &[("x", f64::INFINITY)])];
    let err = estimate_item_weights(&datasets, &MleOptions::default()).unwrap_err();
    assert!(matches!(err, EstimateError::InvalidInput(_)));
}

#[test]
fn loose_convergence_threshold_returns_the_uniform_start() {
    let datasets = vec![dataset("any", &["a"], &[("x", 80.0), ("y", 20.0)])];
    let options = MleOptions {
        convergence_threshold: Some(1e9),
        ..MleOptions::default()
    };
    let weights = estimate_item_weights(&datasets, &options).unwrap();

    // The threshold trips before the first update, leaving uniform scores.
    for w in weights.values() {
        assert!((w - 1.0 / 3.0).abs() < 1e-12);
    }
}

#[test]
fn non_positive_learning_rate_is_invalid_options() {
    let datasets = vec![dataset("any", &["a"], &[("x", 1.0)])];
    let options = MleOptions {
        learning_rate: -0.5,
        ..MleOptions::default()
    };
    let err = estimate_item_weights(&datasets, &options).unwrap_err();
    assert!(matches!(err, EstimateError::InvalidOptions(_)));
}
