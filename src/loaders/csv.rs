//! CSV fetcher: one datapoint per row, headers as field names

use std::fs::File;
use std::io::{ErrorKind, Read};

use tracing::warn;

use crate::experiment::{Experiment, Value, FROM_UID_FIELD, UID_FIELD};
use crate::fetcher::{ExperimentFetcher, FetchOutcome};
use crate::{Error, Result};

/// Suffix claimed by [`CsvFetcher`].
pub const CSV_SUFFIX: &str = ".csv";

/// Loads `*.csv` files.
///
/// A `.csv` uri that does not exist is declined rather than failed, so a
/// later fetcher may still claim it. Any other read or decode problem is a
/// hard error.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFetcher;

impl ExperimentFetcher for CsvFetcher {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        if !uri.ends_with(CSV_SUFFIX) {
            return FetchOutcome::declined(format!("Not a CSV file: {uri}"));
        }
        match File::open(uri) {
            Ok(file) => experiment_from_reader(file).into(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                FetchOutcome::declined(format!("No such file: {uri}"))
            }
            Err(e) => FetchOutcome::Failed(Error::io(uri, e)),
        }
    }
}

/// Parse CSV with a header row.
///
/// Cells are inferred with [`Value::parse`], except `uid` / `from_uid`
/// which stay verbatim (`"007"` must not become `7`). Short rows are padded
/// with missing values; cells beyond the header are dropped.
///
/// # Errors
///
/// Returns error on malformed CSV or invalid UTF-8
pub fn experiment_from_reader<R: Read>(reader: R) -> Result<Experiment> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        if record.len() > headers.len() {
            warn!(
                row = line + 1,
                extra = record.len() - headers.len(),
                "dropping CSV cells without a header"
            );
        }
        let row: Vec<(String, Value)> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let raw = record.get(i).unwrap_or("");
                (header.to_string(), cell_value(header, raw))
            })
            .collect();
        rows.push(row);
    }

    Ok(Experiment::from_iterable(rows))
}

fn cell_value(header: &str, raw: &str) -> Value {
    if header == UID_FIELD || header == FROM_UID_FIELD {
        if raw.is_empty() {
            Value::Missing
        } else {
            Value::Text(raw.to_string())
        }
    } else {
        Value::parse(raw)
    }
}
