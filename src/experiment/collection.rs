//! Experiment - ordered collection of datapoints
//!
//! This is the uniform representation every fetcher produces, whatever the
//! source format.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::{Datapoint, Value};
use crate::{Error, Result};

/// Field consumed by [`Experiment::from_iterable`] as the datapoint uid.
pub const UID_FIELD: &str = "uid";

/// Field consumed by [`Experiment::from_iterable`] as the lineage pointer.
pub const FROM_UID_FIELD: &str = "from_uid";

/// Field added by [`Experiment::merge`] holding the originating key.
pub const MERGE_TAG_FIELD: &str = "from_xp";

/// Experiment is an ordered collection of datapoints.
///
/// It is identified by the set of uids it contains. `source` records the uri
/// it was loaded from, when known.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Experiment {
    datapoints: Vec<Datapoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    loaded_at: DateTime<Utc>,
}

impl Default for Experiment {
    fn default() -> Self {
        Self::new()
    }
}

impl Experiment {
    /// Create an empty experiment stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self::from_datapoints(Vec::new())
    }

    /// Create an experiment from already-built datapoints.
    #[must_use]
    pub fn from_datapoints(datapoints: Vec<Datapoint>) -> Self {
        Self {
            datapoints,
            source: None,
            loaded_at: Utc::now(),
        }
    }

    /// Build an experiment from flat records (one map of fields per row).
    ///
    /// The `uid` field, when present and not missing, becomes the datapoint
    /// uid; otherwise the row index is used. A `from_uid` field becomes the
    /// lineage pointer. Both are removed from the values.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use xpfetch::experiment::{Experiment, Value};
    ///
    /// let xp = Experiment::from_iterable(vec![
    ///     vec![("lr", Value::from(0.1)), ("loss", Value::from(2.5))],
    ///     vec![("lr", Value::from(0.01)), ("loss", Value::from(1.5))],
    /// ]);
    /// assert_eq!(xp.len(), 2);
    /// assert_eq!(xp.datapoints()[1].uid(), "1");
    /// ```
    pub fn from_iterable<I, R, K, V>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let datapoints = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let mut values: IndexMap<String, Value> = record
                    .into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect();
                let uid = values
                    .shift_remove(UID_FIELD)
                    .filter(|v| !v.is_missing())
                    .map_or_else(|| index.to_string(), |v| v.to_string());
                let from_uid = values
                    .shift_remove(FROM_UID_FIELD)
                    .filter(|v| !v.is_missing())
                    .map(|v| v.to_string());

                let mut dp = Datapoint::new(uid, values);
                dp.set_from_uid(from_uid);
                dp
            })
            .collect();

        Self::from_datapoints(datapoints)
    }

    /// Merge several experiments into one, namespacing each by its key.
    ///
    /// Every datapoint's uid becomes `"{key}_{uid}"` (lineage pointers are
    /// rewritten the same way, so links never cross sub-sources) and the key
    /// is recorded in the [`MERGE_TAG_FIELD`] field. Entries behave like an
    /// ordered mapping: a repeated key replaces the earlier experiment but
    /// keeps its position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateUid`] if namespacing still makes datapoints
    /// from two different keys collide (e.g. key `a_b` uid `c` and key `a`
    /// uid `b_c`). Merging never silently overwrites a datapoint.
    pub fn merge<I, K>(experiments: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Self)>,
        K: Into<String>,
    {
        let mut ordered: Vec<(String, Self)> = Vec::new();
        for (key, xp) in experiments {
            let key = key.into();
            match ordered.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) => slot.1 = xp,
                None => ordered.push((key, xp)),
            }
        }

        let total = ordered.iter().map(|(_, xp)| xp.len()).sum();
        let mut datapoints = Vec::with_capacity(total);
        let mut owners: HashMap<String, usize> = HashMap::with_capacity(total);

        for (index, (key, xp)) in ordered.into_iter().enumerate() {
            for dp in xp.datapoints {
                let dp = dp.namespaced(&key, MERGE_TAG_FIELD);
                if let Some(&owner) = owners.get(dp.uid()) {
                    if owner != index {
                        return Err(Error::DuplicateUid {
                            uid: dp.uid().to_string(),
                        });
                    }
                } else {
                    owners.insert(dp.uid().to_string(), index);
                }
                datapoints.push(dp);
            }
        }

        Ok(Self::from_datapoints(datapoints))
    }

    /// Check uid uniqueness and that every lineage pointer resolves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateUid`] or [`Error::DanglingLineage`] for the
    /// first offending datapoint.
    pub fn validate(&self) -> Result<()> {
        let mut uids = HashSet::with_capacity(self.datapoints.len());
        for dp in &self.datapoints {
            if !uids.insert(dp.uid()) {
                return Err(Error::DuplicateUid {
                    uid: dp.uid().to_string(),
                });
            }
        }
        for dp in &self.datapoints {
            if let Some(parent) = dp.from_uid() {
                if !uids.contains(parent) {
                    return Err(Error::DanglingLineage {
                        uid: dp.uid().to_string(),
                        from_uid: parent.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Get all datapoints in order.
    #[must_use]
    pub fn datapoints(&self) -> &[Datapoint] {
        &self.datapoints
    }

    /// Append a datapoint.
    pub fn push(&mut self, datapoint: Datapoint) {
        self.datapoints.push(datapoint);
    }

    /// Find a datapoint by uid.
    #[must_use]
    pub fn get(&self, uid: &str) -> Option<&Datapoint> {
        self.datapoints.iter().find(|dp| dp.uid() == uid)
    }

    /// Number of datapoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    /// Check if the experiment has no datapoints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }

    /// Union of field names across all datapoints, in first-seen order.
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        self.datapoints
            .iter()
            .flat_map(|dp| dp.values().keys().map(String::as_str))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// Get the uri this experiment was loaded from, if recorded.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub(crate) fn set_source_if_absent(&mut self, source: &str) {
        if self.source.is_none() {
            self.source = Some(source.to_string());
        }
    }

    /// Get the load timestamp.
    #[must_use]
    pub const fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Serialize to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be represented in JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Other(format!("JSON export failed: {e}")))
    }

    /// Serialize to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be represented in JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("JSON export failed: {e}")))
    }
}
