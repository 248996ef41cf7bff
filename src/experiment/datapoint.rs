//! Datapoint - one record of an experiment

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Value;

/// Datapoint is a single record of named field values.
///
/// `uid` is unique within its experiment. `from_uid` optionally points to
/// the datapoint this one was derived from (previous epoch, parent trial),
/// which turns an experiment into a forest of lineage edges.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Datapoint {
    uid: String,
    values: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from_uid: Option<String>,
}

impl Datapoint {
    /// Create a root datapoint (no lineage).
    ///
    /// # Arguments
    ///
    /// * `uid` - Identifier, unique within the owning experiment
    /// * `values` - Field name to value mapping, in source order
    #[must_use]
    pub fn new(uid: impl Into<String>, values: IndexMap<String, Value>) -> Self {
        Self {
            uid: uid.into(),
            values,
            from_uid: None,
        }
    }

    /// Create a builder for constructing a datapoint field by field.
    #[must_use]
    pub fn builder(uid: impl Into<String>) -> DatapointBuilder {
        DatapointBuilder::new(uid)
    }

    /// Get the uid.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Get the uid of the parent datapoint, if any.
    #[must_use]
    pub fn from_uid(&self) -> Option<&str> {
        self.from_uid.as_deref()
    }

    /// Get all field values, in the order they were read.
    #[must_use]
    pub const fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Get a single field value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a field, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Set the parent datapoint.
    pub fn set_from_uid(&mut self, from_uid: Option<String>) {
        self.from_uid = from_uid;
    }

    /// Rewrite `uid` and `from_uid` under a namespace and tag the origin.
    ///
    /// Used by [`Experiment::merge`](super::Experiment::merge).
    pub(crate) fn namespaced(self, key: &str, tag_field: &str) -> Self {
        let Self {
            uid,
            mut values,
            from_uid,
        } = self;
        values.insert(tag_field.to_string(), Value::Text(key.to_string()));
        Self {
            uid: namespace(key, &uid),
            values,
            from_uid: from_uid.map(|parent| namespace(key, &parent)),
        }
    }
}

fn namespace(key: &str, uid: &str) -> String {
    format!("{key}_{uid}")
}

/// Builder for `Datapoint`.
#[derive(Debug)]
pub struct DatapointBuilder {
    uid: String,
    values: IndexMap<String, Value>,
    from_uid: Option<String>,
}

impl DatapointBuilder {
    /// Create a new builder with the required uid.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            values: IndexMap::new(),
            from_uid: None,
        }
    }

    /// Set a field value.
    #[must_use]
    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Set the parent datapoint.
    #[must_use]
    pub fn from_uid(mut self, from_uid: impl Into<String>) -> Self {
        self.from_uid = Some(from_uid.into());
        self
    }

    /// Build the `Datapoint`.
    #[must_use]
    pub fn build(self) -> Datapoint {
        Datapoint {
            uid: self.uid,
            values: self.values,
            from_uid: self.from_uid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datapoint_builder() {
        let dp = Datapoint::builder("7")
            .value("lr", 0.01)
            .value("optimizer", "adam")
            .from_uid("6")
            .build();

        assert_eq!(dp.uid(), "7");
        assert_eq!(dp.from_uid(), Some("6"));
        assert_eq!(dp.get("lr"), Some(&Value::Number(0.01)));
        assert_eq!(dp.get("optimizer").and_then(Value::as_str), Some("adam"));
    }

    #[test]
    fn test_values_keep_insertion_order() {
        let dp = Datapoint::builder("0")
            .value("zeta", 1.0)
            .value("alpha", 2.0)
            .value("mid", 3.0)
            .build()
            .namespaced("run", "from_xp");

        let keys: Vec<_> = dp.values().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid", "from_xp"]);
    }

    #[test]
    fn test_namespaced_rewrites_lineage() {
        let dp = Datapoint::builder("2").value("loss", 1.0).from_uid("1").build();
        let dp = dp.namespaced("run", "from_xp");

        assert_eq!(dp.uid(), "run_2");
        assert_eq!(dp.from_uid(), Some("run_1"));
        assert_eq!(dp.get("from_xp").and_then(Value::as_str), Some("run"));
        assert_eq!(dp.get("loss"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_root_datapoint_serializes_without_from_uid() {
        let dp = Datapoint::builder("a").value("x", 1.0).build();
        let json = serde_json::to_value(&dp).unwrap();
        assert!(json.get("from_uid").is_none());
    }
}
