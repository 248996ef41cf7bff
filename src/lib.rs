//! # xpfetch: Experiment Fetchers
//!
//! xpfetch turns an opaque uri (a file path, a demo name, a `fairseq://`
//! run, a `multi://` composition) into an [`Experiment`]: a flat list of
//! datapoints with optional lineage links between them.
//!
//! ## Design
//!
//! - **Fetchers own their uris**: each [`fetcher::ExperimentFetcher`]
//!   decides for itself whether a uri is its business
//! - **First match wins**: the dispatcher walks an ordered chain and stops
//!   at the first fetcher that claims the uri, successfully or not
//! - **Composition by recursion**: `multi://` payloads are resolved through
//!   the same chain, so composite sources nest
//!
//! ## Example Usage
//!
//! ```rust
//! use xpfetch::fetcher::{get_fetchers, ModuleRegistry};
//!
//! let chain = get_fetchers::<&str>(&[], ModuleRegistry::new())?;
//! let xp = chain.load(r#"multi://{"a": "demo_basic_usage", "b": "demo_basic_usage"}"#)?;
//!
//! assert_eq!(xp.len(), 6);
//! assert!(xp.get("a_0").is_some());
//! assert!(xp.get("b_2").is_some());
//! # Ok::<(), xpfetch::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod experiment;
pub mod fetcher;
pub mod loaders;

pub use config::FetchConfig;
pub use error::{Error, Result};
pub use experiment::{Datapoint, Experiment, Value};
pub use fetcher::{get_fetchers, load_xp_with_fetchers, ExperimentFetcher, FetcherChain};
