//! Property-based tests for dispatch and merging
//!
//! - Run with ProptestConfig::with_cases(100)

use std::sync::Arc;

use proptest::prelude::*;
use xpfetch::experiment::{Datapoint, Experiment};
use xpfetch::fetcher::{fetcher_fn, ExperimentFetcher, FetchOutcome, FetcherChain};
use xpfetch::{load_xp_with_fetchers, Error};

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Per fetcher: does it claim the uri?
fn arb_claims() -> impl Strategy<Value = Vec<bool>> {
    proptest::collection::vec(any::<bool>(), 0..12)
}

/// Experiment with `len` datapoints, each optionally derived from an earlier one.
fn arb_experiment() -> impl Strategy<Value = Experiment> {
    proptest::collection::vec((any::<f64>(), any::<Option<prop::sample::Index>>()), 0..20)
        .prop_map(|rows| {
            let datapoints = rows
                .iter()
                .enumerate()
                .map(|(i, (loss, parent))| {
                    let builder = Datapoint::builder(i.to_string()).value("loss", *loss);
                    match parent {
                        Some(index) if i > 0 => builder.from_uid(index.index(i).to_string()),
                        _ => builder,
                    }
                    .build()
                })
                .collect();
            Experiment::from_datapoints(datapoints)
        })
}

fn chain_from_claims(claims: &[bool]) -> Vec<Arc<dyn ExperimentFetcher>> {
    claims
        .iter()
        .enumerate()
        .map(|(i, &claimed)| {
            let fetcher = fetcher_fn(format!("f{i}"), move |_: &str| {
                if claimed {
                    FetchOutcome::Matched(Experiment::from_datapoints(vec![
                        Datapoint::builder(i.to_string()).build(),
                    ]))
                } else {
                    FetchOutcome::NotApplicable(None)
                }
            });
            Arc::new(fetcher) as Arc<dyn ExperimentFetcher>
        })
        .collect()
}

// ============================================================================
// Dispatch Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: result comes from the first claiming fetcher, or none claim
    #[test]
    fn prop_first_match_wins(claims in arb_claims()) {
        let chain = chain_from_claims(&claims);
        let result = load_xp_with_fetchers(&chain, "uri");

        match claims.iter().position(|&c| c) {
            Some(first) => {
                let xp = result.unwrap();
                prop_assert_eq!(xp.datapoints()[0].uid(), first.to_string());
            }
            None => {
                let no_fetcher_found = matches!(result, Err(Error::NoFetcherFound { .. }));
                prop_assert!(no_fetcher_found);
            }
        }
    }
}

// ============================================================================
// Merge Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: merge keeps every datapoint, uids stay unique, lineage stays valid
    #[test]
    fn prop_merge_preserves_datapoints(
        experiments in proptest::collection::vec(arb_experiment(), 0..5)
    ) {
        let total: usize = experiments.iter().map(Experiment::len).sum();
        let keyed = experiments
            .into_iter()
            .enumerate()
            .map(|(i, xp)| (format!("src{i}"), xp));

        let merged = Experiment::merge(keyed).unwrap();

        prop_assert_eq!(merged.len(), total);
        let mut uids: Vec<_> = merged.datapoints().iter().map(Datapoint::uid).collect();
        uids.sort_unstable();
        uids.dedup();
        prop_assert_eq!(uids.len(), total);
        prop_assert!(merged.validate().is_ok());
    }

    /// Property: a list multi-source has as many datapoints as its distinct parts
    #[test]
    fn prop_multi_list_len(counts in proptest::collection::vec(0usize..10, 0..6)) {
        let mem = fetcher_fn("mem", |uri: &str| match uri.strip_prefix("mem://") {
            Some(n) => n.parse::<usize>().map_or(FetchOutcome::NotApplicable(None), |n| {
                FetchOutcome::Matched(Experiment::from_datapoints(
                    (0..n).map(|i| Datapoint::builder(i.to_string()).build()).collect(),
                ))
            }),
            None => FetchOutcome::NotApplicable(None),
        });
        let fetchers: Vec<Arc<dyn ExperimentFetcher>> = vec![Arc::new(mem)];
        let chain = FetcherChain::new(fetchers);

        // Same count twice is the same sub-uri: a list keys by uri, so the
        // later entry replaces the earlier one.
        let mut distinct = counts.clone();
        distinct.sort_unstable();
        distinct.dedup();

        let uris: Vec<String> = counts.iter().map(|n| format!("mem://{n}")).collect();
        let uri = format!("multi://{}", serde_json::to_string(&uris).unwrap());
        let xp = chain.load(&uri).unwrap();

        prop_assert_eq!(xp.len(), distinct.iter().sum::<usize>());
    }
}
