//! Command-line front end: prints the variables each named template needs.
//!
//! ```bash
//! shimmyvars --root templates emails/welcome.twig
//! shimmyvars --root templates --key user --paths emails/welcome.twig
//! RUST_LOG=shimmyvars=trace shimmyvars page.twig
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use shimmyvars::{Analyzer, Environment, FileSystemLoader, InferOptions, RequirementTree};

/// Infer the input variables of Jinja/Twig-style templates.
#[derive(Parser, Debug)]
#[command(name = "shimmyvars", version, about)]
struct Cli {
    /// Directory template names are resolved against.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// TOML file with inference options.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Only report the requirements below this dotted path, e.g. `user.address`.
    #[arg(long)]
    key: Option<String>,

    /// Print dotted leaf paths instead of nested objects.
    #[arg(long)]
    paths: bool,

    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long)]
    verbose: bool,

    /// Template names, relative to `--root`.
    #[arg(required = true)]
    names: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = match &cli.config {
        Some(path) => InferOptions::load(path)?,
        None => InferOptions::default(),
    };
    debug!("Reserved names: {:?}", options.reserved);

    let env = Environment::new(FileSystemLoader::new(&cli.root));
    let analyzer = Analyzer::with_options(env, options);

    let mut report = Map::new();
    for name in &cli.names {
        let entry = match &cli.key {
            Some(key) => analyzer
                .lookup(name, key)
                .with_context(|| format!("Failed to analyze template '{}'", name))?
                .map_or(Value::Null, |tree| render(&tree, cli.paths)),
            None => {
                let tree = analyzer
                    .variables(name)
                    .with_context(|| format!("Failed to analyze template '{}'", name))?;
                render(&tree, cli.paths)
            }
        };
        report.insert(name.clone(), entry);
    }

    let output =
        serde_json::to_string_pretty(&Value::Object(report)).context("Failed to encode report")?;
    println!("{}", output);
    Ok(())
}

fn render(tree: &RequirementTree, paths: bool) -> Value {
    if paths {
        Value::from(tree.paths())
    } else {
        serde_json::to_value(tree).unwrap_or(Value::Null)
    }
}

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
