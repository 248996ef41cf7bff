//! Uniform experiment representation
//!
//! Every fetcher, whatever its source format, produces the same shape:
//!
//! ```text
//! Experiment ──< Datapoint (N)
//!                   ├── uid        (unique within the experiment)
//!                   ├── values     field -> Number | Text | Missing
//!                   └── from_uid   optional lineage pointer
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use xpfetch::experiment::{Datapoint, Experiment};
//!
//! let run = Experiment::from_datapoints(vec![
//!     Datapoint::builder("1").value("loss", 2.1).build(),
//!     Datapoint::builder("2").value("loss", 1.4).from_uid("1").build(),
//! ]);
//!
//! // Two runs with identical uids merge without colliding
//! let merged = Experiment::merge(vec![("baseline", run.clone()), ("tuned", run)])?;
//! assert_eq!(merged.len(), 4);
//! assert!(merged.get("tuned_2").is_some());
//! # Ok::<(), xpfetch::Error>(())
//! ```

mod collection;
mod datapoint;
mod value;

pub use collection::{Experiment, FROM_UID_FIELD, MERGE_TAG_FIELD, UID_FIELD};
pub use datapoint::{Datapoint, DatapointBuilder};
pub use value::Value;
