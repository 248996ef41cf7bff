//! Error types for xpfetch
//!
//! Two outcomes are deliberately NOT errors: a fetcher declining a uri is a
//! [`FetchOutcome::NotApplicable`](crate::fetcher::FetchOutcome), never an
//! `Error`. Everything in this module means "a fetcher claimed the uri and
//! could not finish", or "nobody claimed it at all".

use std::path::PathBuf;

use thiserror::Error;

use crate::fetcher::RegistryError;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// xpfetch error types
#[derive(Error, Debug)]
pub enum Error {
    /// Every fetcher in the chain declined the uri
    #[error("No fetcher found for uri: {uri}")]
    NoFetcherFound {
        /// The uri that nobody claimed
        uri: String,
    },

    /// Reading a source failed after the fetcher matched
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        /// File or directory being read
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decoding error for a matched source
    #[error("JSON error in {uri}: {source}")]
    Json {
        /// Source being decoded
        uri: String,
        /// Underlying decoder failure
        #[source]
        source: serde_json::Error,
    },

    /// Source matched but its content has an unexpected shape
    #[error("Malformed source {uri}: {message}")]
    Format {
        /// Source being parsed
        uri: String,
        /// What was wrong with it
        message: String,
    },

    /// `multi://` payload is not a JSON list or mapping of uris
    #[error("Invalid multi-source specification: {message}")]
    MultiSpec {
        /// Parser diagnostic
        message: String,
    },

    /// A sub-source of a multi-source failed to load
    #[error("Failed to load sub-source '{key}' ({uri}): {source}")]
    SubSource {
        /// Merge key of the sub-source
        key: String,
        /// Sub-uri that failed
        uri: String,
        /// Failure raised while resolving it
        #[source]
        source: Box<Error>,
    },

    /// Multi-source nesting exceeded the configured depth
    #[error("Multi-source nesting deeper than {depth} levels while resolving {uri}\nCheck for a source that (indirectly) refers to itself")]
    RecursionLimit {
        /// Uri being resolved when the limit was hit
        uri: String,
        /// Configured maximum depth
        depth: usize,
    },

    /// Two datapoints share a uid
    #[error("Duplicate datapoint uid: {uid}")]
    DuplicateUid {
        /// Offending uid
        uid: String,
    },

    /// A lineage pointer refers to a uid outside the experiment
    #[error("Datapoint {uid} derives from unknown uid {from_uid}")]
    DanglingLineage {
        /// Datapoint holding the pointer
        uid: String,
        /// Missing parent uid
        from_uid: String,
    },

    /// Fetcher registry construction failed
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an [`Error::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an [`Error::Format`] for `uri`.
    pub fn format(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Format {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// Innermost error, looking through nested [`Error::SubSource`] wrappers.
    ///
    /// A failure three multi-sources deep is reported with every sub-uri on
    /// the way; this returns what actually went wrong at the bottom.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        let mut current = self;
        while let Self::SubSource { source, .. } = current {
            current = source;
        }
        current
    }

    /// Sub-uris traversed to reach the failure, outermost first.
    #[must_use]
    pub fn source_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let Self::SubSource { uri, source, .. } = current {
            path.push(uri.as_str());
            current = source;
        }
        path
    }
}
