//! fairseq training log fetcher
//!
//! ```text
//! Namespace(arch='transformer', lr=[0.0005], dropout=0.3, ...)
//! | epoch 001 | loss 9.812 | nll_loss 9.433 | ppl 691.2
//! | epoch 001 | valid on 'valid' subset | loss 8.901 | nll_loss 8.540
//! | epoch 002 | loss 8.413 | ...
//! ```
//!
//! One datapoint per epoch (uid = epoch number), chained to the previous
//! epoch, carrying the run's `Namespace(...)` parameters. Validation
//! metrics are prefixed with the subset name (`valid_loss`).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::warn;

use super::discover::matching_files;
use crate::experiment::{Datapoint, Experiment, Value};
use crate::fetcher::{ExperimentFetcher, FetchOutcome};
use crate::{Error, Result};

/// Prefix claimed by [`FairseqFetcher`].
pub const FAIRSEQ_PREFIX: &str = "fairseq://";

/// Files tried, in order, when the uri names a directory.
const LOG_CANDIDATES: [&str; 3] = ["train.log", "process.out", "process_0.out"];

const NAMESPACE_START: &str = "Namespace(";
const EPOCH_MARKER: &str = "| epoch";

/// Loads fairseq training logs from `fairseq://<file or directory>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FairseqFetcher;

impl ExperimentFetcher for FairseqFetcher {
    fn name(&self) -> &str {
        "fairseq"
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        let Some(path) = uri.strip_prefix(FAIRSEQ_PREFIX) else {
            return FetchOutcome::NotApplicable(None);
        };
        let path = Path::new(path);

        let log = if path.is_dir() {
            match find_log(path) {
                Ok(Some(log)) => log,
                Ok(None) => return FetchOutcome::declined("No log file found"),
                Err(e) => return FetchOutcome::Failed(e),
            }
        } else {
            path.to_path_buf()
        };

        fs::read_to_string(&log)
            .map_err(|e| Error::io(&log, e))
            .and_then(|text| parse_log(&text, uri))
            .into()
    }
}

fn find_log(dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(found) = LOG_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
    {
        return Ok(Some(found));
    }
    for search in [dir.to_path_buf(), dir.join("slurm_logs")] {
        if let Some(found) = matching_files(&search, "*.log")?.into_iter().next() {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Parse the text of a fairseq log.
///
/// # Errors
///
/// Returns [`Error::Format`] for an unparsable `Namespace(...)` line or an
/// epoch line without a numeric epoch.
pub fn parse_log(text: &str, uri: &str) -> Result<Experiment> {
    let mut datapoints: Vec<Datapoint> = Vec::new();
    let mut epoch_index: HashMap<u32, usize> = HashMap::new();
    let mut params: IndexMap<String, Value> = IndexMap::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix(NAMESPACE_START) {
            params = parse_namespace(rest).map_err(|message| Error::format(uri, message))?;
            continue;
        }
        if !line.starts_with(EPOCH_MARKER) {
            continue;
        }

        let body = line.trim_start_matches(|c: char| EPOCH_MARKER.contains(c));
        let epoch: u32 = body
            .get(..3)
            .and_then(|digits| digits.parse().ok())
            .ok_or_else(|| Error::format(uri, format!("bad epoch line: {line}")))?;

        let index = if let Some(&index) = epoch_index.get(&epoch) {
            index
        } else {
            let mut values = IndexMap::with_capacity(params.len() + 1);
            values.insert("epoch".to_string(), Value::from(epoch));
            values.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
            let mut dp = Datapoint::new(epoch.to_string(), values);
            dp.set_from_uid(
                epoch
                    .checked_sub(1)
                    .filter(|previous| epoch_index.contains_key(previous))
                    .map(|previous| previous.to_string()),
            );
            epoch_index.insert(epoch, datapoints.len());
            datapoints.push(dp);
            datapoints.len() - 1
        };

        let mut prefix = String::new();
        for part in body.split('|').skip(1) {
            let part = part.trim();
            if let Some(subset) = valid_subset(part) {
                prefix = format!("{subset}_");
                continue;
            }
            let Some((key, value)) = part.rsplit_once(' ') else {
                if !part.is_empty() {
                    warn!(uri, part, "skipping epoch field without a value");
                }
                continue;
            };
            datapoints[index].insert(format!("{prefix}{}", key.trim()), Value::parse(value));
        }
    }

    Ok(Experiment::from_datapoints(datapoints))
}

/// `valid on 'NAME' subset` -> `NAME`
fn valid_subset(part: &str) -> Option<&str> {
    let name = part.strip_prefix("valid on '")?.strip_suffix("' subset")?;
    name.chars()
        .all(|c| c.is_ascii_alphanumeric())
        .then_some(name)
}

/// Parse the keyword arguments of a `Namespace(...)` line (without the
/// leading `Namespace(`).
///
/// Values are Python literals: numbers, quoted strings, `True`, `False`,
/// `None`. Bracketed values (lists, tuples, dicts) are kept as text.
fn parse_namespace(rest: &str) -> std::result::Result<IndexMap<String, Value>, String> {
    let inner = rest
        .trim_end()
        .strip_suffix(')')
        .ok_or_else(|| "unterminated Namespace(...)".to_string())?;

    let mut params = IndexMap::new();
    for arg in split_top_level(inner)? {
        let arg = arg.trim();
        if arg.is_empty() {
            continue;
        }
        let (key, raw) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected key=value in Namespace, got '{arg}'"))?;
        params.insert(key.trim().to_string(), python_literal(raw.trim())?);
    }
    Ok(params)
}

fn split_top_level(text: &str) -> std::result::Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| format!("unbalanced '{c}' in Namespace"))?;
            }
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() || depth != 0 {
        return Err("unbalanced quotes or brackets in Namespace".to_string());
    }
    parts.push(&text[start..]);
    Ok(parts)
}

fn python_literal(raw: &str) -> std::result::Result<Value, String> {
    match raw {
        "None" => return Ok(Value::Missing),
        "True" | "False" => return Ok(Value::Text(raw.to_string())),
        _ => {}
    }
    if let Some(text) = unquote(raw) {
        return Ok(Value::Text(text));
    }
    if raw.starts_with(['[', '(', '{']) {
        return Ok(Value::Text(raw.to_string()));
    }
    raw.parse::<f64>()
        .map(Value::Number)
        .map_err(|_| format!("unsupported Namespace value '{raw}'"))
}

fn unquote(raw: &str) -> Option<String> {
    let quote = raw.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = raw.get(1..)?.strip_suffix(quote)?;

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    Some(out)
}
