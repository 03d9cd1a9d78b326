//! lineage - resolve and inspect inheritable themes.
//!
//! ```text
//! lineage --config lineage.yml resolve child
//! lineage chain child
//! lineage assets --format json
//! lineage cache invalidate child
//! ```
//!
//! Without `--config`, `lineage.yml` in the current directory is used when it
//! exists; otherwise every setting takes its default. Commands that take a
//! theme name fall back to `active_theme`.

mod commands;
mod logging;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lineage::{RuntimeConfig, Theme, ThemeFactory};
use tracing::debug;

use commands::Format;

const DEFAULT_CONFIG: &str = "lineage.yml";

#[derive(Parser)]
#[command(name = "lineage")]
#[command(version)]
#[command(about = "Resolve themes through their inheritance chains")]
struct Cli {
    /// Runtime configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Check every dependency on every lookup, overriding the configuration
    #[arg(long, global = true)]
    debug: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a fully resolved theme
    Resolve {
        /// Theme name (defaults to active_theme)
        name: Option<String>,

        #[arg(short, long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },

    /// Print the inheritance chain, root first
    Chain {
        /// Theme name (defaults to active_theme)
        name: Option<String>,
    },

    /// Print stylesheets and scripts inherited through the chain
    Assets {
        /// Theme name (defaults to active_theme)
        name: Option<String>,

        #[arg(short, long, value_enum, default_value_t = Format::Yaml)]
        format: Format,
    },

    /// Manage cached themes
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Remove every cached theme
    Clear,

    /// Remove the cached record of one theme
    Invalidate {
        /// Theme name (defaults to active_theme)
        name: Option<String>,
    },
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).is_file() => {
            RuntimeConfig::from_file(DEFAULT_CONFIG).context("failed to load lineage.yml")
        }
        None => Ok(RuntimeConfig::default()),
    }
}

fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if cli.debug {
        config.debug = true;
    }
    debug!(
        theme_directory = %config.theme_directory.display(),
        cache_dir = %config.cache_dir.display(),
        debug = config.debug,
        "loaded configuration"
    );

    let factory: ThemeFactory<Theme> = ThemeFactory::new(&config)?;
    let theme_name = |name: Option<String>| name.unwrap_or_else(|| config.active_theme.clone());

    match cli.command {
        Command::Resolve { name, format } => {
            commands::resolve(&factory, &theme_name(name), format, out)
        }
        Command::Chain { name } => commands::chain(&factory, &theme_name(name), out),
        Command::Assets { name, format } => {
            commands::assets(&factory, &theme_name(name), format, out)
        }
        Command::Cache(CacheCommand::Clear) => commands::clear_cache(&factory, out),
        Command::Cache(CacheCommand::Invalidate { name }) => {
            commands::invalidate(&factory, &theme_name(name), out)
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out)
}
