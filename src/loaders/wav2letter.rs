//! wav2letter perf log fetcher
//!
//! A run directory holds one `<checkpoint>_perf` file per checkpoint:
//!
//! ```text
//! # date        time      lr    train-loss  dev-WER
//! 2019-09-30    12:00:01  0.4   12.1        45.3
//! ```
//!
//! Every row of every perf file (files in name order) becomes a datapoint
//! derived from the one before it.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use super::discover::matching_files;
use crate::experiment::{Datapoint, Experiment, Value};
use crate::fetcher::{ExperimentFetcher, FetchOutcome};
use crate::{Error, Result};

/// Prefix claimed by [`Wav2letterFetcher`].
pub const W2L_PREFIX: &str = "w2l://";

/// Prefix added to every metric name.
pub const PERF_PREFIX: &str = "perf_";

const PERF_PATTERN: &str = "*_perf";

/// Loads wav2letter runs from `w2l://<run directory>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Wav2letterFetcher;

impl ExperimentFetcher for Wav2letterFetcher {
    fn name(&self) -> &str {
        "wav2letter"
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        match uri.strip_prefix(W2L_PREFIX) {
            Some(dir) => load_run(dir).into(),
            None => FetchOutcome::NotApplicable(None),
        }
    }
}

fn load_run(dir: &str) -> Result<Experiment> {
    let run_tag: String = {
        let chars: Vec<char> = dir.chars().collect();
        chars[chars.len().saturating_sub(5)..].iter().collect()
    };

    let mut datapoints: Vec<Datapoint> = Vec::new();
    for perf in matching_files(Path::new(dir), PERF_PATTERN)? {
        let text = fs::read_to_string(&perf).map_err(|e| Error::io(&perf, e))?;
        for metrics in parse_perf(&text) {
            let uid = format!("{run_tag}_{}", datapoints.len());
            let mut dp = Datapoint::new(uid, metrics);
            dp.set_from_uid(datapoints.last().map(|prev| prev.uid().to_string()));
            datapoints.push(dp);
        }
    }

    Ok(Experiment::from_datapoints(datapoints))
}

/// Parse one perf file: a `#`-led header of column names, then one row per
/// evaluation. Blank rows are skipped.
#[must_use]
pub fn parse_perf(text: &str) -> Vec<IndexMap<String, Value>> {
    let mut lines = text.split('\n');
    let header: Vec<&str> = lines
        .next()
        .map(|h| h.split_whitespace().skip(1).collect())
        .unwrap_or_default();

    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            header
                .iter()
                .zip(line.split_whitespace())
                .map(|(name, raw)| (format!("{PERF_PREFIX}{name}"), Value::parse(raw)))
                .collect()
        })
        .collect()
}
