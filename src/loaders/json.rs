//! JSON fetcher: a list of records, or a Nevergrad job export

use std::fs;

use crate::experiment::{Experiment, Value};
use crate::fetcher::{ExperimentFetcher, FetchOutcome};
use crate::{Error, Result};

/// Suffix claimed by [`JsonFetcher`].
pub const JSON_SUFFIX: &str = ".json";

/// Loads `*.json` files.
///
/// Unlike CSV, a missing `.json` file is a hard error, as is malformed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFetcher;

impl ExperimentFetcher for JsonFetcher {
    fn name(&self) -> &str {
        "json"
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        if !uri.ends_with(JSON_SUFFIX) {
            return FetchOutcome::declined(format!("Not a JSON file: {uri}"));
        }
        fs::read_to_string(uri)
            .map_err(|e| Error::io(uri, e))
            .and_then(|text| experiment_from_str(&text, uri))
            .into()
    }
}

/// Parse a JSON array of flat objects.
///
/// Nevergrad exports (objects with `job_id`, `kwargs` and `results`) are
/// flattened to `id`, stringified kwargs and `results.scores`.
///
/// # Errors
///
/// Returns [`Error::Json`] for invalid JSON and [`Error::Format`] when the
/// payload is not an array of objects.
pub fn experiment_from_str(text: &str, uri: &str) -> Result<Experiment> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|source| Error::Json {
        uri: uri.to_string(),
        source,
    })?;
    let serde_json::Value::Array(items) = value else {
        return Err(Error::format(uri, "expected a JSON array of objects"));
    };

    let mut objects = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            serde_json::Value::Object(map) => objects.push(map),
            other => {
                return Err(Error::format(
                    uri,
                    format!("element {index} is not an object: {other}"),
                ))
            }
        }
    }

    if objects.first().is_some_and(is_nevergrad) {
        let rows = objects
            .iter()
            .map(|job| nevergrad_row(job, uri))
            .collect::<Result<Vec<_>>>()?;
        return Ok(Experiment::from_iterable(rows));
    }

    Ok(Experiment::from_iterable(objects.iter().map(|map| {
        map.iter()
            .map(|(key, value)| (key.clone(), Value::from_json(value)))
            .collect::<Vec<_>>()
    })))
}

fn is_nevergrad(job: &serde_json::Map<String, serde_json::Value>) -> bool {
    ["job_id", "kwargs", "results"]
        .iter()
        .all(|key| job.contains_key(*key))
}

fn nevergrad_row(
    job: &serde_json::Map<String, serde_json::Value>,
    uri: &str,
) -> Result<Vec<(String, Value)>> {
    let missing = |what: &str| Error::format(uri, format!("Nevergrad job without {what}"));

    let id = job.get("job_id").ok_or_else(|| missing("job_id"))?;
    let kwargs = job
        .get("kwargs")
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| missing("a kwargs object"))?;
    let scores = job
        .get("results")
        .and_then(|r| r.get("scores"))
        .and_then(serde_json::Value::as_object)
        .ok_or_else(|| missing("a results.scores object"))?;

    let mut row = vec![("id".to_string(), Value::from_json(id))];
    row.extend(
        kwargs
            .iter()
            .map(|(name, value)| (name.clone(), Value::Text(python_str(value)))),
    );
    row.extend(
        scores
            .iter()
            .map(|(name, value)| (name.clone(), Value::from_json(value))),
    );
    Ok(row)
}

/// Render a parameter the way Python's `str()` shows it in a Nevergrad
/// export, so categorical parameters read the same as in the optimizer.
fn python_str(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(true) => "True".to_string(),
        serde_json::Value::Bool(false) => "False".to_string(),
        serde_json::Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}
