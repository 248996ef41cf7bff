//! Fetcher registry: assemble the chain from built-ins and named plugins
//!
//! User-supplied fetchers are named `<module.path>.<fetcher_name>`. A module
//! is found by asking each [`ModuleResolver`] in turn:
//!
//! 1. [`RegisteredModules`]: modules registered in-process by the host
//!    application.
//! 2. [`WorkingDirScripts`]: for two-segment names only, a
//!    `<module>.toml` script in the working directory.
//!
//! Any name that cannot be resolved aborts the whole build; a partial chain
//! is never returned.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::script::{load_script_module, SCRIPT_EXTENSION};
use super::{ExperimentFetcher, FetcherChain, MultipleFetcher};
use crate::config::{FetchConfig, DEFAULT_MAX_DEPTH};
use crate::loaders::builtin_fetchers;
use crate::Result;

/// Registry construction errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Name is not of the form `<module.path>.<fetcher_name>`
    #[error("Invalid fetcher name '{spec}': expected <module.path>.<fetcher_name>")]
    InvalidSpec {
        /// Name as given
        spec: String,
    },

    /// No resolver knows the module
    #[error("Cannot resolve module '{module}' for fetcher '{spec}'")]
    ModuleNotFound {
        /// Module path
        module: String,
        /// Full fetcher name
        spec: String,
    },

    /// Module exists but has no fetcher of that name
    #[error("Module '{module}' has no fetcher named '{name}'")]
    MissingFetcher {
        /// Module path
        module: String,
        /// Missing fetcher name
        name: String,
    },

    /// Script module exists but is not usable
    #[error("Invalid fetcher script {}: {message}", path.display())]
    Script {
        /// Script file
        path: PathBuf,
        /// What was wrong with it
        message: String,
    },
}

/// Parsed `<module.path>.<fetcher_name>` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherSpec {
    segments: Vec<String>,
}

impl FetcherSpec {
    /// Parse a dotted fetcher name.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidSpec`] for fewer than two segments or
    /// an empty segment.
    pub fn parse(spec: &str) -> std::result::Result<Self, RegistryError> {
        let segments: Vec<String> = spec.split('.').map(String::from).collect();
        if segments.len() < 2 || segments.iter().any(String::is_empty) {
            return Err(RegistryError::InvalidSpec {
                spec: spec.to_string(),
            });
        }
        Ok(Self { segments })
    }

    /// Module path (everything before the last dot).
    #[must_use]
    pub fn module(&self) -> String {
        self.segments[..self.segments.len() - 1].join(".")
    }

    /// Fetcher name (last segment).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    /// Number of dotted segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for FetcherSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// A named group of fetchers.
#[derive(Clone, Default)]
pub struct FetcherModule {
    fetchers: BTreeMap<String, Arc<dyn ExperimentFetcher>>,
}

impl fmt::Debug for FetcherModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.fetchers.keys()).finish()
    }
}

impl FetcherModule {
    /// Create an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fetcher under `name`.
    #[must_use]
    pub fn with_fetcher(
        mut self,
        name: impl Into<String>,
        fetcher: impl ExperimentFetcher + 'static,
    ) -> Self {
        self.insert(name, Arc::new(fetcher));
        self
    }

    /// Add a shared fetcher under `name`, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, fetcher: Arc<dyn ExperimentFetcher>) {
        self.fetchers.insert(name.into(), fetcher);
    }

    /// Look up a fetcher.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ExperimentFetcher>> {
        self.fetchers.get(name).cloned()
    }

    /// Fetcher names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.fetchers.keys().map(String::as_str).collect()
    }
}

/// In-process modules keyed by module path.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, FetcherModule>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one fetcher as `<module>.<name>`.
    pub fn register(
        &mut self,
        module: impl Into<String>,
        name: impl Into<String>,
        fetcher: impl ExperimentFetcher + 'static,
    ) -> &mut Self {
        self.modules
            .entry(module.into())
            .or_default()
            .insert(name, Arc::new(fetcher));
        self
    }

    /// Register (or replace) a whole module.
    pub fn register_module(&mut self, path: impl Into<String>, module: FetcherModule) -> &mut Self {
        self.modules.insert(path.into(), module);
        self
    }

    /// Look up a module.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FetcherModule> {
        self.modules.get(path)
    }
}

/// A strategy for turning a module path into a [`FetcherModule`].
pub trait ModuleResolver: Send + Sync {
    /// Name shown in logs.
    fn label(&self) -> &str;

    /// Whether this resolver should be consulted for `spec` at all.
    fn applies_to(&self, _spec: &FetcherSpec) -> bool {
        true
    }

    /// Resolve `module`; `Ok(None)` means "not mine, ask the next resolver".
    ///
    /// # Errors
    ///
    /// Returns error if the module was found but could not be loaded
    fn resolve(&self, module: &str) -> std::result::Result<Option<FetcherModule>, RegistryError>;
}

/// Resolver over modules registered in-process.
#[derive(Debug, Clone, Default)]
pub struct RegisteredModules {
    registry: ModuleRegistry,
}

impl RegisteredModules {
    /// Wrap a registry.
    #[must_use]
    pub const fn new(registry: ModuleRegistry) -> Self {
        Self { registry }
    }
}

impl ModuleResolver for RegisteredModules {
    fn label(&self) -> &str {
        "registered"
    }

    fn resolve(&self, module: &str) -> std::result::Result<Option<FetcherModule>, RegistryError> {
        Ok(self.registry.get(module).cloned())
    }
}

/// Resolver loading `<dir>/<module>.toml` script modules.
///
/// Only consulted for two-segment names (`script.fetcher`); deeper module
/// paths never fall back to the filesystem.
#[derive(Debug, Clone)]
pub struct WorkingDirScripts {
    dir: PathBuf,
}

impl WorkingDirScripts {
    /// Look for scripts in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ModuleResolver for WorkingDirScripts {
    fn label(&self) -> &str {
        "working-dir-script"
    }

    fn applies_to(&self, spec: &FetcherSpec) -> bool {
        spec.segment_count() == 2
    }

    fn resolve(&self, module: &str) -> std::result::Result<Option<FetcherModule>, RegistryError> {
        let path = self.dir.join(format!("{module}.{SCRIPT_EXTENSION}"));
        if !path.is_file() {
            return Ok(None);
        }
        load_script_module(&path).map(Some)
    }
}

/// Builds a [`FetcherChain`]: built-ins, then user-supplied fetchers in the
/// order given, then the multi-source fetcher.
pub struct RegistryBuilder {
    builtins: Vec<Arc<dyn ExperimentFetcher>>,
    resolvers: Vec<Box<dyn ModuleResolver>>,
    max_depth: usize,
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field(
                "builtins",
                &self.builtins.iter().map(|b| b.name()).collect::<Vec<_>>(),
            )
            .field(
                "resolvers",
                &self.resolvers.iter().map(|r| r.label()).collect::<Vec<_>>(),
            )
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    /// Built-in fetchers, no resolvers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            builtins: builtin_fetchers(),
            resolvers: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Built-ins, `modules`, then working-directory scripts from
    /// `config.script_dir()`.
    #[must_use]
    pub fn from_config(config: &FetchConfig, modules: ModuleRegistry) -> Self {
        Self::new()
            .resolver(RegisteredModules::new(modules))
            .resolver(WorkingDirScripts::new(config.script_dir()))
            .max_depth(config.max_depth())
    }

    /// Replace the built-in fetchers.
    #[must_use]
    pub fn builtins(mut self, builtins: Vec<Arc<dyn ExperimentFetcher>>) -> Self {
        self.builtins = builtins;
        self
    }

    /// Append a module resolution strategy.
    #[must_use]
    pub fn resolver(mut self, resolver: impl ModuleResolver + 'static) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// Set how many multi-sources may nest inside the top-level one.
    #[must_use]
    pub const fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Assemble the chain.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] (wrapped in [`crate::Error::Registry`]) for
    /// the first name that cannot be resolved.
    pub fn build<S: AsRef<str>>(&self, extra: &[S]) -> Result<FetcherChain> {
        let mut fetchers = self.builtins.clone();
        for raw in extra {
            let spec = FetcherSpec::parse(raw.as_ref())?;
            let fetcher = self.resolve(&spec)?;
            info!(spec = %spec, fetcher = fetcher.name(), "registered fetcher");
            fetchers.push(fetcher);
        }

        let multi = MultipleFetcher::new(Arc::from(fetchers)).with_max_depth(self.max_depth);
        let chain = FetcherChain::from_multi(multi);
        debug!(fetchers = ?chain.names(), "fetcher chain ready");
        Ok(chain)
    }

    fn resolve(
        &self,
        spec: &FetcherSpec,
    ) -> std::result::Result<Arc<dyn ExperimentFetcher>, RegistryError> {
        let module = spec.module();
        for resolver in self.resolvers.iter().filter(|r| r.applies_to(spec)) {
            if let Some(found) = resolver.resolve(&module)? {
                debug!(resolver = resolver.label(), module = %module, "module resolved");
                return found
                    .get(spec.name())
                    .ok_or_else(|| RegistryError::MissingFetcher {
                        module,
                        name: spec.name().to_string(),
                    });
            }
        }

        Err(RegistryError::ModuleNotFound {
            module,
            spec: spec.to_string(),
        })
    }
}

/// Build the standard chain: built-ins, then `extra` resolved against
/// `modules` and scripts in the current working directory, then the
/// multi-source fetcher.
///
/// # Errors
///
/// Returns [`crate::Error::Registry`] if any name cannot be resolved.
pub fn get_fetchers<S: AsRef<str>>(extra: &[S], modules: ModuleRegistry) -> Result<FetcherChain> {
    RegistryBuilder::from_config(&FetchConfig::default(), modules).build(extra)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{fetcher_fn, FetchOutcome};

    fn declines(name: &'static str) -> impl ExperimentFetcher {
        fetcher_fn(name, |_: &str| FetchOutcome::NotApplicable(None))
    }

    #[test]
    fn test_spec_parse() {
        let spec = FetcherSpec::parse("pkg.sub.loader").unwrap();
        assert_eq!(spec.module(), "pkg.sub");
        assert_eq!(spec.name(), "loader");
        assert_eq!(spec.segment_count(), 3);
        assert_eq!(spec.to_string(), "pkg.sub.loader");
    }

    #[test]
    fn test_spec_parse_rejects_malformed() {
        for bad in ["loader", "", "a..b", ".a", "a."] {
            assert!(
                matches!(FetcherSpec::parse(bad), Err(RegistryError::InvalidSpec { .. })),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn test_registered_module_lookup() {
        let mut modules = ModuleRegistry::new();
        modules.register("pkg.sub", "loader", declines("loader"));

        let chain = RegistryBuilder::new()
            .builtins(Vec::new())
            .resolver(RegisteredModules::new(modules))
            .build(&["pkg.sub.loader"])
            .unwrap();

        assert_eq!(chain.names(), vec!["loader", "multi"]);
    }

    #[test]
    fn test_missing_fetcher_in_known_module() {
        let mut modules = ModuleRegistry::new();
        modules.register("pkg", "loader", declines("loader"));

        let err = RegistryBuilder::new()
            .resolver(RegisteredModules::new(modules))
            .build(&["pkg.other"])
            .unwrap_err();

        assert!(matches!(
            err,
            crate::Error::Registry(RegistryError::MissingFetcher { ref name, .. }) if name == "other"
        ));
    }

    #[test]
    fn test_script_fallback_skipped_for_deep_names() {
        let scripts = WorkingDirScripts::new("/nonexistent");
        assert!(scripts.applies_to(&FetcherSpec::parse("a.b").unwrap()));
        assert!(!scripts.applies_to(&FetcherSpec::parse("a.b.c").unwrap()));
    }

    #[test]
    fn test_no_resolvers_means_module_not_found() {
        let err = RegistryBuilder::new().build(&["pkg.loader"]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Registry(RegistryError::ModuleNotFound { .. })
        ));
    }
}
