//! Working-directory script modules
//!
//! A script module is a TOML file declaring one or more fetchers:
//!
//! ```toml
//! # sweeps.toml, referenced as "sweeps.nightly"
//! [fetchers.nightly]
//! prefix = "nightly://"
//! format = "csv"                # or "json" (default)
//! root = "/data/nightly"        # nightly://run1.csv reads /data/nightly/run1.csv
//!
//! [fetchers.tracker]
//! prefix = "tracker://"
//! command = "tracker-export"    # stdout is parsed in `format`
//! args = ["--run", "{path}"]    # {path} is the uri without its prefix
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use super::{ExperimentFetcher, FetchOutcome, FetcherModule, RegistryError};
use crate::experiment::Experiment;
use crate::loaders::{csv as csv_loader, json as json_loader};
use crate::{Error, Result};

/// File extension of script modules.
pub const SCRIPT_EXTENSION: &str = "toml";

/// Placeholder substituted into command arguments.
const PATH_PLACEHOLDER: &str = "{path}";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFile {
    #[serde(default)]
    fetchers: BTreeMap<String, FetcherDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FetcherDef {
    prefix: String,
    #[serde(default)]
    format: SourceFormat,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    root: Option<PathBuf>,
}

/// Payload format produced by a script fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SourceFormat {
    #[default]
    Json,
    Csv,
}

#[derive(Debug, Clone)]
enum ScriptSource {
    Command { program: String, args: Vec<String> },
    Directory { root: PathBuf },
}

/// Fetcher declared in a script module.
#[derive(Debug, Clone)]
pub struct ScriptFetcher {
    name: String,
    prefix: String,
    format: SourceFormat,
    source: ScriptSource,
}

impl ScriptFetcher {
    fn load(&self, uri: &str, path: &str) -> Result<Experiment> {
        match &self.source {
            ScriptSource::Command { program, args } => {
                let args: Vec<String> = args
                    .iter()
                    .map(|arg| arg.replace(PATH_PLACEHOLDER, path))
                    .collect();
                debug!(program = %program, ?args, "running fetcher command");
                let output = Command::new(program)
                    .args(&args)
                    .output()
                    .map_err(|e| Error::io(program, e))?;
                if !output.status.success() {
                    return Err(Error::format(
                        uri,
                        format!(
                            "command '{program}' exited with {}: {}",
                            output.status,
                            String::from_utf8_lossy(&output.stderr).trim()
                        ),
                    ));
                }
                self.parse(uri, output.stdout)
            }
            ScriptSource::Directory { root } => {
                let file = root.join(path);
                let bytes = fs::read(&file).map_err(|e| Error::io(&file, e))?;
                self.parse(uri, bytes)
            }
        }
    }

    fn parse(&self, uri: &str, bytes: Vec<u8>) -> Result<Experiment> {
        match self.format {
            SourceFormat::Csv => csv_loader::experiment_from_reader(Cursor::new(bytes)),
            SourceFormat::Json => {
                let text = String::from_utf8(bytes)
                    .map_err(|e| Error::format(uri, format!("output is not UTF-8: {e}")))?;
                json_loader::experiment_from_str(&text, uri)
            }
        }
    }
}

impl ExperimentFetcher for ScriptFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch(&self, uri: &str) -> FetchOutcome {
        match uri.strip_prefix(self.prefix.as_str()) {
            Some(path) => self.load(uri, path).into(),
            None => FetchOutcome::declined(format!("Not a {} uri: {uri}", self.prefix)),
        }
    }
}

/// Load a script module from `path`.
///
/// Relative `root` directories are resolved against the script's own
/// directory.
///
/// # Errors
///
/// Returns [`RegistryError::Script`] if the file cannot be read, is not valid
/// TOML, or declares a fetcher without exactly one of `command` / `root`.
pub fn load_script_module(path: &Path) -> std::result::Result<FetcherModule, RegistryError> {
    let script_error = |message: String| RegistryError::Script {
        path: path.to_path_buf(),
        message,
    };

    let text = fs::read_to_string(path).map_err(|e| script_error(e.to_string()))?;
    let file: ScriptFile = toml::from_str(&text).map_err(|e| script_error(e.to_string()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut module = FetcherModule::new();
    for (name, def) in file.fetchers {
        if def.prefix.is_empty() {
            return Err(script_error(format!("fetcher '{name}' has an empty prefix")));
        }
        let source = match (def.command, def.root) {
            (Some(program), None) => ScriptSource::Command {
                program,
                args: def.args,
            },
            (None, Some(root)) => ScriptSource::Directory {
                root: base.join(root),
            },
            _ => {
                return Err(script_error(format!(
                    "fetcher '{name}' needs exactly one of `command` or `root`"
                )))
            }
        };
        let fetcher = ScriptFetcher {
            name: name.clone(),
            prefix: def.prefix,
            format: def.format,
            source,
        };
        module = module.with_fetcher(name, fetcher);
    }

    debug!(path = %path.display(), fetchers = ?module.names(), "loaded script module");
    Ok(module)
}
