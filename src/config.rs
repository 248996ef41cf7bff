//! Fetcher chain configuration
//!
//! Defaults can be overridden programmatically through
//! [`FetchConfig::builder`] or from the process environment:
//!
//! | Variable            | Field            | Format                       |
//! |---------------------|------------------|------------------------------|
//! | `XPFETCH_FETCHERS`  | `extra_fetchers` | comma-separated `module.name`|
//! | `XPFETCH_SCRIPT_DIR`| `script_dir`     | path                         |
//! | `XPFETCH_MAX_DEPTH` | `max_depth`      | non-negative integer         |

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Default bound on multi-sources nested inside a top-level one.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Environment variable listing extra fetchers.
pub const ENV_FETCHERS: &str = "XPFETCH_FETCHERS";
/// Environment variable overriding the script directory.
pub const ENV_SCRIPT_DIR: &str = "XPFETCH_SCRIPT_DIR";
/// Environment variable overriding the nesting bound.
pub const ENV_MAX_DEPTH: &str = "XPFETCH_MAX_DEPTH";

/// Configuration for building a fetcher chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    extra_fetchers: Vec<String>,
    script_dir: PathBuf,
    max_depth: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            extra_fetchers: Vec::new(),
            script_dir: PathBuf::from("."),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl FetchConfig {
    /// Create a configuration builder
    #[must_use]
    pub fn builder() -> FetchConfigBuilder {
        FetchConfigBuilder::default()
    }

    /// Defaults overridden by `XPFETCH_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if `XPFETCH_MAX_DEPTH` is not a non-negative integer
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup` (keyed like the
    /// environment variables).
    ///
    /// # Errors
    ///
    /// Returns error if the max depth value is not a non-negative integer
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(list) = lookup(ENV_FETCHERS) {
            builder = builder.extra_fetchers(
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from),
            );
        }
        if let Some(dir) = lookup(ENV_SCRIPT_DIR) {
            builder = builder.script_dir(dir);
        }
        if let Some(depth) = lookup(ENV_MAX_DEPTH) {
            let depth = depth
                .trim()
                .parse::<usize>()
                .map_err(|_| {
                    Error::Other(format!(
                        "Invalid {ENV_MAX_DEPTH} '{depth}': expected a non-negative integer"
                    ))
                })?;
            builder = builder.max_depth(depth);
        }

        Ok(builder.build())
    }

    /// Qualified names of user-supplied fetchers, in priority order.
    #[must_use]
    pub fn extra_fetchers(&self) -> &[String] {
        &self.extra_fetchers
    }

    /// Directory searched for fetcher script modules.
    #[must_use]
    pub fn script_dir(&self) -> &Path {
        &self.script_dir
    }

    /// Maximum multi-source nesting depth.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Builder for `FetchConfig`.
#[derive(Debug, Default)]
pub struct FetchConfigBuilder {
    config: FetchConfig,
}

impl FetchConfigBuilder {
    /// Append one user-supplied fetcher.
    #[must_use]
    pub fn extra_fetcher(mut self, spec: impl Into<String>) -> Self {
        self.config.extra_fetchers.push(spec.into());
        self
    }

    /// Append several user-supplied fetchers.
    #[must_use]
    pub fn extra_fetchers<I, S>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .extra_fetchers
            .extend(specs.into_iter().map(Into::into));
        self
    }

    /// Set the script module directory.
    #[must_use]
    pub fn script_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.script_dir = dir.into();
        self
    }

    /// Set how many multi-sources may nest inside the top-level one.
    #[must_use]
    pub const fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> FetchConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert!(config.extra_fetchers().is_empty());
        assert_eq!(config.script_dir(), Path::new("."));
        assert_eq!(config.max_depth(), DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_builder() {
        let config = FetchConfig::builder()
            .extra_fetcher("mymodule.myloader")
            .script_dir("/tmp/scripts")
            .max_depth(4)
            .build();

        assert_eq!(config.extra_fetchers(), ["mymodule.myloader".to_string()]);
        assert_eq!(config.script_dir(), Path::new("/tmp/scripts"));
        assert_eq!(config.max_depth(), 4);
    }

    #[test]
    fn test_from_lookup() {
        let config = FetchConfig::from_lookup(lookup_from(&[
            (ENV_FETCHERS, "a.b, c.d ,,"),
            (ENV_MAX_DEPTH, "8"),
        ]))
        .unwrap();

        assert_eq!(config.extra_fetchers(), ["a.b".to_string(), "c.d".to_string()]);
        assert_eq!(config.max_depth(), 8);
    }

    #[test]
    fn test_from_lookup_rejects_bad_depth() {
        for bad in ["zero", "-1", "1.5"] {
            let result = FetchConfig::from_lookup(lookup_from(&[(ENV_MAX_DEPTH, bad)]));
            assert!(matches!(result, Err(Error::Other(_))), "{bad} accepted");
        }
    }

    #[test]
    fn test_from_lookup_accepts_zero_depth() {
        let config = FetchConfig::from_lookup(lookup_from(&[(ENV_MAX_DEPTH, " 0 ")])).unwrap();
        assert_eq!(config.max_depth(), 0);
    }
}
