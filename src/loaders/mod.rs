//! Built-in fetchers
//!
//! Dispatch order matters (first match wins), so [`builtin_fetchers`]
//! returns them in a fixed order:
//!
//! | Fetcher      | Claims                         | Declines when                      |
//! |--------------|--------------------------------|------------------------------------|
//! | `demo`       | a known demo name (`demo`, ...)| name unknown                       |
//! | `csv`        | `*.csv`                        | other suffix, file does not exist  |
//! | `json`       | `*.json`                       | other suffix                       |
//! | `fairseq`    | `fairseq://<file or dir>`      | other prefix, no log file in dir   |
//! | `wav2letter` | `w2l://<dir>`                  | other prefix                       |

pub mod csv;
pub mod demo;
mod discover;
pub mod fairseq;
pub mod json;
pub mod wav2letter;

use std::sync::Arc;

pub use self::csv::CsvFetcher;
pub use self::demo::DemoFetcher;
pub use self::fairseq::FairseqFetcher;
pub use self::json::JsonFetcher;
pub use self::wav2letter::Wav2letterFetcher;

use crate::fetcher::ExperimentFetcher;

/// The built-in fetchers, in dispatch order.
#[must_use]
pub fn builtin_fetchers() -> Vec<Arc<dyn ExperimentFetcher>> {
    vec![
        Arc::new(DemoFetcher),
        Arc::new(CsvFetcher),
        Arc::new(JsonFetcher),
        Arc::new(FairseqFetcher),
        Arc::new(Wav2letterFetcher),
    ]
}
