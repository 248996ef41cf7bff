//! xpfetch - resolve an experiment uri and print it as JSON
//!
//! ```text
//! xpfetch runs.csv
//! xpfetch 'multi://{"base": "runs/a.csv", "new": "fairseq://ckpt/"}' --pretty
//! xpfetch --fetcher mymodule.myloader custom://run-42
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xpfetch::config::{DEFAULT_MAX_DEPTH, ENV_FETCHERS, ENV_MAX_DEPTH, ENV_SCRIPT_DIR};
use xpfetch::fetcher::{ModuleRegistry, RegistryBuilder};
use xpfetch::loaders::demo;
use xpfetch::FetchConfig;

/// Command-line arguments for xpfetch
#[derive(Parser, Debug)]
#[command(name = "xpfetch")]
#[command(about = "Load experiment results from any supported source")]
#[command(version)]
struct Args {
    /// Source uri: a file, a demo name, fairseq://, w2l://, multi://...
    #[arg(required_unless_present = "list")]
    uri: Option<String>,

    /// Extra fetcher as module.name (repeatable, tried after built-ins)
    #[arg(short, long = "fetcher", env = ENV_FETCHERS, value_delimiter = ',')]
    fetchers: Vec<String>,

    /// Directory searched for <module>.toml fetcher scripts
    #[arg(long, default_value = ".", env = ENV_SCRIPT_DIR)]
    script_dir: PathBuf,

    /// How many multi:// sources may nest inside the top-level one
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH, env = ENV_MAX_DEPTH)]
    max_depth: usize,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// List the fetcher chain and demo names, then exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the experiment
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "xpfetch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = FetchConfig::builder()
        .extra_fetchers(args.fetchers)
        .script_dir(args.script_dir)
        .max_depth(args.max_depth)
        .build();

    let chain = RegistryBuilder::from_config(&config, ModuleRegistry::new())
        .build(config.extra_fetchers())
        .context("Failed to build fetcher chain")?;

    if args.list {
        println!("fetchers: {}", chain.names().join(", "));
        println!("demos:    {}", demo::demo_names().join(", "));
        return Ok(());
    }

    let Some(uri) = args.uri else {
        bail!("missing <URI>");
    };

    let xp = chain
        .load(&uri)
        .with_context(|| format!("Failed to load '{uri}'"))?;
    info!(uri = %uri, datapoints = xp.len(), "experiment loaded");

    if let Err(e) = xp.validate() {
        warn!(error = %e, "experiment has inconsistent lineage");
    }

    let json = if args.pretty {
        xp.to_json_pretty()
    } else {
        xp.to_json()
    }
    .context("Failed to serialize experiment")?;
    println!("{json}");

    Ok(())
}
