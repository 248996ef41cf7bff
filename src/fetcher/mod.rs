//! Fetcher resolution and dispatch
//!
//! A fetcher turns an opaque uri into an [`Experiment`], or declines. Each
//! fetcher owns its own applicability test (a prefix, a suffix, a registry
//! lookup); there is no central table of uri schemes.
//!
//! ```text
//! FetcherChain ── demo ── csv ── json ── fairseq ── w2l ── <user> ── multi
//!                                                                     │
//!        load_xp_with_fetchers(chain, uri) <──── recursive sub-uris ──┘
//! ```
//!
//! The dispatcher is first-match-wins. [`FetchOutcome::NotApplicable`] moves
//! on to the next fetcher; [`FetchOutcome::Failed`] stops the chain, since a
//! fetcher that recognized the uri but could not parse it is a real error.
//!
//! # Example
//!
//! ```rust
//! use xpfetch::experiment::{Datapoint, Experiment};
//! use xpfetch::fetcher::{fetcher_fn, ExperimentFetcher, FetchOutcome, FetcherChain};
//! use std::sync::Arc;
//!
//! let runs = fetcher_fn("runs", |uri: &str| match uri.strip_prefix("runs://") {
//!     Some(id) => FetchOutcome::Matched(Experiment::from_datapoints(vec![
//!         Datapoint::builder(id).value("loss", 0.5).build(),
//!     ])),
//!     None => FetchOutcome::NotApplicable(None),
//! });
//!
//! let fetchers: Vec<Arc<dyn ExperimentFetcher>> = vec![Arc::new(runs)];
//! let chain = FetcherChain::new(fetchers);
//! let xp = chain.load(r#"multi://["runs://a", "runs://b"]"#)?;
//! assert_eq!(xp.len(), 2);
//! assert!(xp.get("runs://b_b").is_some());
//! # Ok::<(), xpfetch::Error>(())
//! ```

mod chain;
mod dispatch;
mod multi;
mod registry;
mod script;

pub use chain::FetcherChain;
pub use dispatch::load_xp_with_fetchers;
pub use multi::{MultiSpec, MultipleFetcher, MULTI_PREFIX};
pub use registry::{
    get_fetchers, FetcherModule, FetcherSpec, ModuleRegistry, ModuleResolver, RegisteredModules,
    RegistryBuilder, RegistryError, WorkingDirScripts,
};
pub use script::{load_script_module, ScriptFetcher, SCRIPT_EXTENSION};

use std::fmt;
use std::sync::Arc;

use crate::experiment::Experiment;
use crate::{Error, Result};

/// Outcome of offering a uri to one fetcher.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The fetcher claimed the uri and produced an experiment.
    Matched(Experiment),
    /// The fetcher is not responsible for this uri. The optional message is
    /// only a debugging aid; the dispatcher never acts on it.
    NotApplicable(Option<String>),
    /// The fetcher claimed the uri but failed to load it.
    Failed(Error),
}

impl FetchOutcome {
    /// Decline with a diagnostic message.
    #[must_use]
    pub fn declined(message: impl Into<String>) -> Self {
        Self::NotApplicable(Some(message.into()))
    }

    /// Check whether the fetcher claimed the uri successfully.
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Check whether the fetcher declined the uri.
    #[must_use]
    pub const fn is_not_applicable(&self) -> bool {
        matches!(self, Self::NotApplicable(_))
    }

    /// Collapse into a result; `None` means not applicable.
    #[must_use]
    pub fn into_result(self) -> Option<Result<Experiment>> {
        match self {
            Self::Matched(xp) => Some(Ok(xp)),
            Self::NotApplicable(_) => None,
            Self::Failed(err) => Some(Err(err)),
        }
    }
}

impl From<Result<Experiment>> for FetchOutcome {
    fn from(result: Result<Experiment>) -> Self {
        match result {
            Ok(xp) => Self::Matched(xp),
            Err(err) => Self::Failed(err),
        }
    }
}

/// A loader for one kind of experiment source.
///
/// Implementations must be free of shared mutable state: a chain is shared
/// read-only between concurrent dispatch calls.
pub trait ExperimentFetcher: Send + Sync {
    /// Short name used in logs and by the registry.
    fn name(&self) -> &str;

    /// Try to load `uri`.
    fn fetch(&self, uri: &str) -> FetchOutcome;
}

impl<T: ExperimentFetcher + ?Sized> ExperimentFetcher for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        (**self).fetch(uri)
    }
}

impl<T: ExperimentFetcher + ?Sized> ExperimentFetcher for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        (**self).fetch(uri)
    }
}

impl<T: ExperimentFetcher + ?Sized> ExperimentFetcher for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        (**self).fetch(uri)
    }
}

/// Fetcher backed by a closure.
pub struct FnFetcher<F> {
    name: String,
    func: F,
}

impl<F> fmt::Debug for FnFetcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFetcher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<F> ExperimentFetcher for FnFetcher<F>
where
    F: Fn(&str) -> FetchOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        (self.func)(uri)
    }
}

/// Wrap a closure as a named fetcher.
pub fn fetcher_fn<F>(name: impl Into<String>, func: F) -> FnFetcher<F>
where
    F: Fn(&str) -> FetchOutcome + Send + Sync,
{
    FnFetcher {
        name: name.into(),
        func,
    }
}
