//! Immutable, shareable fetcher chain

use std::sync::Arc;

use super::{load_xp_with_fetchers, ExperimentFetcher, MultipleFetcher};
use crate::experiment::Experiment;
use crate::Result;

/// An ordered list of fetchers terminated by a [`MultipleFetcher`].
///
/// Built in two phases: the independent fetchers are frozen into a shared
/// slice first, then the multi-source fetcher is created over that slice.
/// Cloning is cheap and the list can never change afterwards, so a chain
/// can be handed to as many threads as needed.
#[derive(Debug, Clone)]
pub struct FetcherChain {
    multi: MultipleFetcher,
}

impl FetcherChain {
    /// Build a chain from `fetchers`, appending a multi-source fetcher.
    #[must_use]
    pub fn new(fetchers: Vec<Arc<dyn ExperimentFetcher>>) -> Self {
        Self::from_multi(MultipleFetcher::new(Arc::from(fetchers)))
    }

    /// Build a chain whose last element is `multi`.
    #[must_use]
    pub const fn from_multi(multi: MultipleFetcher) -> Self {
        Self { multi }
    }

    /// Resolve `uri` through the chain.
    ///
    /// # Errors
    ///
    /// See [`load_xp_with_fetchers`].
    pub fn load(&self, uri: &str) -> Result<Experiment> {
        load_xp_with_fetchers(self.iter(), uri)
    }

    /// Iterate over every fetcher, the multi-source fetcher last.
    pub fn iter(&self) -> impl Iterator<Item = &dyn ExperimentFetcher> + '_ {
        self.multi.chain()
    }

    /// Get the fetcher at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&dyn ExperimentFetcher> {
        self.iter().nth(index)
    }

    /// Number of fetchers, including the multi-source fetcher.
    #[must_use]
    pub fn len(&self) -> usize {
        self.multi.fetchers().len() + 1
    }

    /// Always false: a chain contains at least its multi-source fetcher.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Fetcher names in dispatch order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(ExperimentFetcher::name).collect()
    }

    /// The terminating multi-source fetcher.
    #[must_use]
    pub const fn multi(&self) -> &MultipleFetcher {
        &self.multi
    }
}
