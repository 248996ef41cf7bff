//! Built-in demo experiments, looked up by name
//!
//! Demos are generated from a fixed seed, so loading the same name twice
//! yields the same datapoints.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::experiment::{Datapoint, Experiment, Value};
use crate::fetcher::{ExperimentFetcher, FetchOutcome};

/// Builds one demo experiment.
pub type DemoFactory = fn() -> Experiment;

const SEED: u64 = 0x5eed_0f_d3;

/// Demo name -> factory, in listing order.
pub const DEMOS: [(&str, DemoFactory); 5] = [
    ("demo", demo),
    ("demo_basic_usage", demo_basic_usage),
    ("demo_line_xy", demo_line_xy),
    ("demo_big", demo_big),
    ("demo_distribution_cat", demo_distribution_cat),
];

/// Find the factory registered under `name`.
#[must_use]
pub fn lookup(name: &str) -> Option<DemoFactory> {
    DEMOS
        .iter()
        .find(|(demo_name, _)| *demo_name == name)
        .map(|(_, factory)| *factory)
}

/// Names of all demos.
#[must_use]
pub fn demo_names() -> Vec<&'static str> {
    DEMOS.iter().map(|(name, _)| *name).collect()
}

/// Serves the demos by exact name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoFetcher;

impl ExperimentFetcher for DemoFetcher {
    fn name(&self) -> &str {
        "demo"
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        match lookup(uri) {
            Some(factory) => FetchOutcome::Matched(factory()),
            None => FetchOutcome::NotApplicable(None),
        }
    }
}

const OPTIMIZERS: [&str; 3] = ["adam", "sgd", "adagrad"];

/// Random hyperparameter search: 100 runs, some continued from earlier ones.
fn demo() -> Experiment {
    random_search(100)
}

/// Large random search for stress-testing consumers.
fn demo_big() -> Experiment {
    random_search(10_000)
}

fn random_search(runs: usize) -> Experiment {
    let mut rng = StdRng::seed_from_u64(SEED);
    let mut datapoints = Vec::with_capacity(runs);

    for index in 0..runs {
        let lr = 10f64.powf(rng.gen_range(-5.0..-1.0_f64));
        let dropout: f64 = rng.gen_range(0.0..0.6);
        let batch_size = 16_i64 << rng.gen_range(0..5_u32);
        let optimizer = OPTIMIZERS[rng.gen_range(0..OPTIMIZERS.len())];
        let loss = dropout.mul_add(0.5, lr.log10().abs() * 0.1) + rng.gen_range(0.0..0.2_f64);

        let mut builder = Datapoint::builder(index.to_string())
            .value("lr", lr)
            .value("dropout", dropout)
            .value("batch_size", batch_size)
            .value("optimizer", optimizer)
            .value("loss", loss);
        if index > 0 && rng.gen_bool(0.2) {
            builder = builder.from_uid(rng.gen_range(0..index).to_string());
        }
        datapoints.push(builder.build());
    }

    Experiment::from_datapoints(datapoints)
}

fn demo_basic_usage() -> Experiment {
    Experiment::from_iterable(vec![
        vec![
            ("dropout", Value::from(0.1)),
            ("lr", Value::from(0.001)),
            ("loss", Value::from(10.0)),
            ("optimizer", Value::from("SGD")),
        ],
        vec![
            ("dropout", Value::from(0.15)),
            ("lr", Value::from(0.01)),
            ("loss", Value::from(3.5)),
            ("optimizer", Value::from("Adam")),
        ],
        vec![
            ("dropout", Value::from(0.3)),
            ("lr", Value::from(0.1)),
            ("loss", Value::from(4.5)),
            ("optimizer", Value::from("Adam")),
        ],
    ])
}

/// One training curve: each step continues the previous one.
fn demo_line_xy() -> Experiment {
    let mut rng = StdRng::seed_from_u64(SEED);
    let datapoints = (0..50_u32)
        .map(|step| {
            let x = f64::from(step);
            let y = (-x / 10.0).exp() + rng.gen_range(0.0..0.05_f64);
            let builder = Datapoint::builder(step.to_string())
                .value("x", x)
                .value("y", y);
            if step == 0 {
                builder.build()
            } else {
                builder.from_uid((step - 1).to_string()).build()
            }
        })
        .collect();
    Experiment::from_datapoints(datapoints)
}

/// Categorical values with skewed frequencies.
fn demo_distribution_cat() -> Experiment {
    const CATEGORIES: [(&str, f64); 4] = [("a", 0.5), ("b", 0.25), ("c", 0.15), ("d", 0.1)];

    let mut rng = StdRng::seed_from_u64(SEED);
    Experiment::from_iterable((0..200).map(|_| {
        let mut roll: f64 = rng.gen_range(0.0..1.0);
        let mut picked = CATEGORIES[CATEGORIES.len() - 1].0;
        for (name, weight) in CATEGORIES {
            if roll < weight {
                picked = name;
                break;
            }
            roll -= weight;
        }
        vec![("cat", Value::from(picked)), ("value", Value::from(rng.gen_range(0.0..1.0_f64)))]
    }))
}
