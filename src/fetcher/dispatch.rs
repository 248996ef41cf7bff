//! First-match-wins dispatch over an ordered list of fetchers

use tracing::{debug, trace};

use super::{ExperimentFetcher, FetchOutcome};
use crate::experiment::Experiment;
use crate::{Error, Result};

/// Resolve `uri` against `fetchers`, in order.
///
/// The first fetcher to match wins and later fetchers are never invoked.
/// A fetcher that declines passes the uri on; one that fails ends the
/// dispatch with its error, untouched.
///
/// # Errors
///
/// Returns the first [`FetchOutcome::Failed`] error, or
/// [`Error::NoFetcherFound`] carrying `uri` when every fetcher declined.
pub fn load_xp_with_fetchers<I>(fetchers: I, uri: &str) -> Result<Experiment>
where
    I: IntoIterator,
    I::Item: ExperimentFetcher,
{
    for fetcher in fetchers {
        match fetcher.fetch(uri) {
            FetchOutcome::Matched(mut xp) => {
                debug!(fetcher = fetcher.name(), uri, datapoints = xp.len(), "fetcher matched");
                xp.set_source_if_absent(uri);
                return Ok(xp);
            }
            FetchOutcome::NotApplicable(reason) => {
                trace!(fetcher = fetcher.name(), uri, reason = reason.as_deref(), "fetcher declined");
            }
            FetchOutcome::Failed(err) => {
                debug!(fetcher = fetcher.name(), uri, error = %err, "fetcher failed");
                return Err(err);
            }
        }
    }

    Err(Error::NoFetcherFound {
        uri: uri.to_string(),
    })
}
