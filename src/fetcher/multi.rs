//! Multi-source composition: `multi://` + JSON list or mapping of sub-uris
//!
//! ```text
//! multi://["runs/a.csv", "runs/b.csv"]            keys = the sub-uris
//! multi://{"base": "runs/a.csv", "new": "w2l://x"} keys = user supplied
//! ```
//!
//! Each sub-uri is resolved through the full chain, this fetcher included,
//! so composite sources nest arbitrarily. Results are merged with
//! [`Experiment::merge`], keyed as above. Loading is all-or-nothing.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{load_xp_with_fetchers, ExperimentFetcher, FetchOutcome};
use crate::config::DEFAULT_MAX_DEPTH;
use crate::experiment::Experiment;
use crate::{Error, Result};

/// Reserved uri prefix claimed by [`MultipleFetcher`].
pub const MULTI_PREFIX: &str = "multi://";

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Tracks multi-source nesting on the current thread. Dispatch is
/// synchronous, so the nesting of a resolution is exactly the nesting of
/// these guards on its stack.
///
/// The top-level multi-source sits at level 0 and is always admitted;
/// `max_depth` bounds the multi-sources nested inside it.
struct DepthGuard;

impl DepthGuard {
    fn enter(max_depth: usize) -> Option<Self> {
        DEPTH.with(|depth| {
            let current = depth.get();
            if current > max_depth {
                return None;
            }
            depth.set(current + 1);
            Some(Self)
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Parsed `multi://` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiSpec {
    /// `[uri, ...]`: each sub-experiment is keyed by its own uri.
    List(Vec<String>),
    /// `{key: uri, ...}`: each sub-experiment is keyed by the user's key.
    Mapping(Vec<(String, String)>),
}

impl MultiSpec {
    /// Parse the JSON payload following the `multi://` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MultiSpec`] for invalid JSON, for a value that is
    /// neither a list nor a mapping, or for a sub-uri that is not a string.
    pub fn parse(payload: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(payload).map_err(|e| Error::MultiSpec {
                message: format!("invalid JSON payload: {e}"),
            })?;

        match value {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| expect_uri(item, None))
                .collect::<Result<Vec<_>>>()
                .map(Self::List),
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(key, item)| {
                    let uri = expect_uri(item, Some(&key))?;
                    Ok((key, uri))
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Mapping),
            other => Err(Error::MultiSpec {
                message: format!("expected a list or a mapping of uris, got {other}"),
            }),
        }
    }

    /// `(merge key, sub-uri)` pairs in payload order.
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, &str)> {
        match self {
            Self::List(uris) => uris.iter().map(|uri| (uri.as_str(), uri.as_str())).collect(),
            Self::Mapping(pairs) => pairs
                .iter()
                .map(|(key, uri)| (key.as_str(), uri.as_str()))
                .collect(),
        }
    }

    /// Number of sub-sources.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::List(uris) => uris.len(),
            Self::Mapping(pairs) => pairs.len(),
        }
    }

    /// Check if there are no sub-sources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn expect_uri(value: serde_json::Value, key: Option<&str>) -> Result<String> {
    match value {
        serde_json::Value::String(uri) => Ok(uri),
        other => Err(Error::MultiSpec {
            message: match key {
                Some(key) => format!("sub-uri for key '{key}' must be a string, got {other}"),
                None => format!("sub-uri must be a string, got {other}"),
            },
        }),
    }
}

/// Fetcher for `multi://` composite sources.
///
/// Holds a shared, read-only handle to every other fetcher of the chain and
/// appends itself when recursing, so it sees the full chain without the
/// chain having to contain a reference to itself.
#[derive(Clone)]
pub struct MultipleFetcher {
    fetchers: Arc<[Arc<dyn ExperimentFetcher>]>,
    max_depth: usize,
}

impl fmt::Debug for MultipleFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipleFetcher")
            .field(
                "fetchers",
                &self.fetchers.iter().map(|f| f.name()).collect::<Vec<_>>(),
            )
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl MultipleFetcher {
    /// Create a multi-source fetcher over `fetchers` (which must not include
    /// a `MultipleFetcher`; this one is appended implicitly).
    #[must_use]
    pub fn new(fetchers: Arc<[Arc<dyn ExperimentFetcher>]>) -> Self {
        Self {
            fetchers,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set how many multi-sources may nest inside the top-level one. `0`
    /// still resolves a flat multi-source.
    #[must_use]
    pub const fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Get the maximum multi-source nesting depth.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Fetchers this one delegates to, not including itself.
    #[must_use]
    pub fn fetchers(&self) -> &[Arc<dyn ExperimentFetcher>] {
        &self.fetchers
    }

    /// The full chain: every delegate, then this fetcher.
    pub fn chain(&self) -> impl Iterator<Item = &dyn ExperimentFetcher> + '_ {
        self.fetchers
            .iter()
            .map(|f| f.as_ref() as &dyn ExperimentFetcher)
            .chain(std::iter::once(self as &dyn ExperimentFetcher))
    }

    fn load(&self, uri: &str, payload: &str) -> Result<Experiment> {
        let spec = MultiSpec::parse(payload)?;
        let _depth = DepthGuard::enter(self.max_depth).ok_or_else(|| Error::RecursionLimit {
            uri: uri.to_string(),
            depth: self.max_depth,
        })?;

        debug!(uri, sources = spec.len(), "resolving multi-source");
        let mut resolved = Vec::with_capacity(spec.len());
        for (key, sub_uri) in spec.entries() {
            let xp = load_xp_with_fetchers(self.chain(), sub_uri).map_err(|source| {
                Error::SubSource {
                    key: key.to_string(),
                    uri: sub_uri.to_string(),
                    source: Box::new(source),
                }
            })?;
            resolved.push((key, xp));
        }

        Experiment::merge(resolved)
    }
}

impl ExperimentFetcher for MultipleFetcher {
    fn name(&self) -> &str {
        "multi"
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        match uri.strip_prefix(MULTI_PREFIX) {
            Some(payload) => self.load(uri, payload).into(),
            None => FetchOutcome::NotApplicable(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let spec = MultiSpec::parse(r#"["a.csv", "b.csv"]"#).unwrap();
        assert_eq!(spec.entries(), vec![("a.csv", "a.csv"), ("b.csv", "b.csv")]);
    }

    #[test]
    fn test_parse_mapping_keeps_payload_order() {
        let spec = MultiSpec::parse(r#"{"z": "a.csv", "a": "b.csv"}"#).unwrap();
        assert_eq!(spec.entries(), vec![("z", "a.csv"), ("a", "b.csv")]);
    }

    #[test]
    fn test_parse_rejects_scalars_and_bad_json() {
        assert!(matches!(MultiSpec::parse("42"), Err(Error::MultiSpec { .. })));
        assert!(matches!(MultiSpec::parse("[a"), Err(Error::MultiSpec { .. })));
        assert!(matches!(MultiSpec::parse("[1]"), Err(Error::MultiSpec { .. })));
        assert!(matches!(
            MultiSpec::parse(r#"{"k": null}"#),
            Err(Error::MultiSpec { .. })
        ));
    }

    #[test]
    fn test_declines_without_prefix() {
        let multi = MultipleFetcher::new(Arc::from(Vec::new()));
        assert!(multi.fetch("runs.csv").is_not_applicable());
        assert!(multi.fetch(" multi://[]").is_not_applicable());
    }

    #[test]
    fn test_malformed_payload_is_hard_failure() {
        let multi = MultipleFetcher::new(Arc::from(Vec::new()));
        assert!(matches!(
            multi.fetch("multi://not json"),
            FetchOutcome::Failed(Error::MultiSpec { .. })
        ));
    }

    #[test]
    fn test_depth_guard_releases_on_drop() {
        {
            let _top = DepthGuard::enter(1).unwrap();
            let _nested = DepthGuard::enter(1).unwrap();
            assert!(DepthGuard::enter(1).is_none());
        }
        assert!(DepthGuard::enter(1).is_some());
    }

    #[test]
    fn test_nesting_beyond_max_depth() {
        let multi = MultipleFetcher::new(Arc::from(Vec::new())).with_max_depth(1);
        assert!(multi.fetch("multi://[]").is_matched());
        assert!(multi.fetch(r#"multi://["multi://[]"]"#).is_matched());

        let nested = r#"multi://["multi://[\"multi://[]\"]"]"#;
        match multi.fetch(nested) {
            FetchOutcome::Failed(err) => {
                assert!(matches!(err.root_cause(), Error::RecursionLimit { depth: 1, .. }));
                assert_eq!(err.source_path(), vec![r#"multi://["multi://[]"]"#, "multi://[]"]);
            }
            other => panic!("expected recursion failure, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_depth_allows_flat_multi_only() {
        let multi = MultipleFetcher::new(Arc::from(Vec::new())).with_max_depth(0);

        let flat = multi.fetch("multi://[]").into_result().unwrap().unwrap();
        assert!(flat.is_empty());
        assert!(matches!(
            multi.fetch(r#"multi://{"inner": "multi://[]"}"#),
            FetchOutcome::Failed(Error::SubSource { .. })
        ));
    }
}
