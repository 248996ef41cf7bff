//! Multi-source composition tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use xpfetch::experiment::{Datapoint, Experiment, Value, MERGE_TAG_FIELD};
use xpfetch::fetcher::{fetcher_fn, ExperimentFetcher, FetchOutcome, FetcherChain, MultipleFetcher};
use xpfetch::Error;

/// `mem://<name>` -> two datapoints `0 -> 1` tagged with the name.
fn mem_fetcher() -> impl ExperimentFetcher {
    fetcher_fn("mem", |uri: &str| match uri.strip_prefix("mem://") {
        Some("broken") => FetchOutcome::Failed(Error::format(uri, "corrupt run")),
        Some(name) => FetchOutcome::Matched(Experiment::from_datapoints(vec![
            Datapoint::builder("0").value("run", name).build(),
            Datapoint::builder("1").value("run", name).from_uid("0").build(),
        ])),
        None => FetchOutcome::NotApplicable(None),
    })
}

fn chain() -> FetcherChain {
    let fetchers: Vec<Arc<dyn ExperimentFetcher>> = vec![Arc::new(mem_fetcher())];
    FetcherChain::new(fetchers)
}

// ============================================================================
// List and mapping payloads
// ============================================================================

#[test]
fn test_list_keys_by_sub_uri() {
    let xp = chain().load(r#"multi://["mem://a", "mem://b"]"#).unwrap();

    assert_eq!(xp.len(), 4);
    let child = xp.get("mem://b_1").unwrap();
    assert_eq!(child.from_uid(), Some("mem://b_0"));
    assert_eq!(child.get(MERGE_TAG_FIELD), Some(&Value::from("mem://b")));
    assert!(xp.validate().is_ok());
}

#[test]
fn test_mapping_same_sub_uri_under_two_keys() {
    let xp = chain()
        .load(r#"multi://{"base": "mem://a", "rerun": "mem://a"}"#)
        .unwrap();

    let uids: Vec<_> = xp.datapoints().iter().map(Datapoint::uid).collect();
    assert_eq!(uids, vec!["base_0", "base_1", "rerun_0", "rerun_1"]);

    let original = chain().load("mem://a").unwrap();
    for (key, merged) in [("base", &xp.datapoints()[..2]), ("rerun", &xp.datapoints()[2..])] {
        let prefix = format!("{key}_");
        for (dp, source) in merged.iter().zip(original.datapoints()) {
            assert_eq!(dp.uid().strip_prefix(&prefix), Some(source.uid()));
            assert_eq!(
                dp.from_uid().map(|uid| uid.strip_prefix(&prefix).unwrap()),
                source.from_uid()
            );
            assert_eq!(dp.get(MERGE_TAG_FIELD), Some(&Value::from(key)));

            let mut values = dp.values().clone();
            values.shift_remove(MERGE_TAG_FIELD);
            assert_eq!(&values, source.values());
        }
    }
}

#[test]
fn test_mapping_preserves_payload_order() {
    let xp = chain()
        .load(r#"multi://{"zeta": "mem://a", "alpha": "mem://b"}"#)
        .unwrap();
    assert_eq!(xp.datapoints()[0].uid(), "zeta_0");
}

#[test]
fn test_empty_list_is_empty_experiment() {
    assert!(chain().load("multi://[]").unwrap().is_empty());
    assert!(chain().load("multi://{}").unwrap().is_empty());
}

#[test]
fn test_nested_multi_resolves_through_itself() {
    let inner = r#"multi://[\"mem://a\",\"mem://b\"]"#;
    let uri = format!(r#"multi://["{inner}","mem://c"]"#);

    let xp = chain().load(&uri).unwrap();

    assert_eq!(xp.len(), 6);
    let inner_key = r#"multi://["mem://a","mem://b"]"#;
    assert!(xp.get(&format!("{inner_key}_mem://a_0")).is_some());
    assert!(xp.get("mem://c_1").is_some());
    assert!(xp.validate().is_ok());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_malformed_payload() {
    for bad in ["multi://", "multi://[", "multi://42", r#"multi://[1, "mem://a"]"#] {
        let err = chain().load(bad).unwrap_err();
        assert!(matches!(err, Error::MultiSpec { .. }), "{bad}: {err}");
    }
}

#[test]
fn test_unresolvable_sub_uri_identifies_the_entry() {
    let err = chain()
        .load(r#"multi://{"ok": "mem://a", "bad": "nowhere"}"#)
        .unwrap_err();

    match &err {
        Error::SubSource { key, uri, .. } => {
            assert_eq!(key, "bad");
            assert_eq!(uri, "nowhere");
        }
        other => panic!("expected SubSource, got {other:?}"),
    }
    assert!(matches!(err.root_cause(), Error::NoFetcherFound { .. }));
}

#[test]
fn test_failed_sub_source_aborts_whole_load() {
    let uri = r#"multi://["mem://a", "multi://[\"mem://broken\"]"]"#;
    let err = chain().load(uri).unwrap_err();

    assert_eq!(
        err.source_path(),
        vec![r#"multi://["mem://broken"]"#, "mem://broken"]
    );
    assert!(matches!(err.root_cause(), Error::Format { .. }));
}

#[test]
fn test_nesting_beyond_max_depth_fails() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let leaf = fetcher_fn("leaf", move |uri: &str| {
        if !uri.starts_with("leaf://") {
            return FetchOutcome::NotApplicable(None);
        }
        counter.fetch_add(1, Ordering::SeqCst);
        FetchOutcome::Matched(Experiment::from_datapoints(vec![Datapoint::builder(uri).build()]))
    });
    let fetchers: Vec<Arc<dyn ExperimentFetcher>> = vec![Arc::new(leaf)];
    let chain = FetcherChain::from_multi(MultipleFetcher::new(Arc::from(fetchers)).with_max_depth(4));

    let mut uri = String::from("leaf://x");
    for _ in 0..5 {
        uri = format!("multi://[{}]", serde_json::to_string(&uri).unwrap());
    }

    // Top level plus four nested multi-sources is still within bounds
    assert_eq!(chain.load(&uri).unwrap().len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    uri = format!("multi://[{}]", serde_json::to_string(&uri).unwrap());
    let err = chain.load(&uri).unwrap_err();
    assert!(matches!(err.root_cause(), Error::RecursionLimit { depth: 4, .. }));
    assert_eq!(err.source_path().len(), 5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_depth_guard_released_after_failure() {
    let fetchers: Vec<Arc<dyn ExperimentFetcher>> = vec![Arc::new(mem_fetcher())];
    let chain = FetcherChain::from_multi(MultipleFetcher::new(Arc::from(fetchers)).with_max_depth(0));

    assert!(chain.load(r#"multi://["multi://[]"]"#).is_err());
    assert_eq!(chain.load(r#"multi://["mem://a"]"#).unwrap().len(), 2);
}
