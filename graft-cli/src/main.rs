mod commands;
mod confirm;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graft::config::LoggingConfig;
use graft::{Config, InstalledPackages};
use graft_store::ContentStore;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{ExportArgs, ImportArgs};
use confirm::Prompt;

#[derive(Parser, Debug)]
#[command(name = "graft")]
#[command(about = "Export a content subtree into a portable document and import it elsewhere")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.graft/config.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Store file (overrides config)
    #[arg(long, global = true, env = "GRAFT_STORE")]
    store: Option<PathBuf>,

    /// Answer every confirmation with yes
    #[arg(long, short, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export a node and its subtree
    Export {
        /// Node path (site-a/section/page) or identifier
        source: String,

        /// Root container the source lives in (required for identifiers)
        #[arg(long)]
        site: Option<String>,

        /// Write to this file instead of stdout
        #[arg(short, long, conflicts_with = "package_key")]
        filename: Option<String>,

        /// Write into Private/Content of this package
        #[arg(short, long)]
        package_key: Option<String>,

        /// Do not indent the document
        #[arg(long)]
        no_tidy: bool,

        /// Node types to include, comma-separated; prefix with ! to exclude
        #[arg(long)]
        node_type_filter: Option<String>,

        /// Extension to include (repeatable)
        #[arg(long = "extension", short = 'e')]
        extensions: Vec<String>,

        /// Do not offer installed extensions that were not requested
        #[arg(long)]
        no_detect_extensions: bool,
    },

    /// Import a partial export document
    Import {
        /// Document path, or file name inside the package
        #[arg(short, long)]
        filename: Option<String>,

        /// Read the document from Private/Content of this package
        #[arg(short, long)]
        package_key: Option<String>,

        /// Node to import below (default: the original parent)
        #[arg(short, long)]
        target_path: Option<String>,

        /// Print the import plan as JSON and stop
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli, config) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_path) => Config::load_or_create(config_path)?,
        None => Config::load()?,
    };
    if let Some(store) = &cli.store {
        config.store.path = store.clone();
    }
    config.ensure_dirs().context("Unable to create directories")?;
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let json = logging.format == "json";

    match &logging.file {
        Some(log_file) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
                .with_context(|| format!("Unable to open log file {}", log_file.display()))?;
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file)
                .with_ansi(false);
            if json {
                builder.json().init();
            } else {
                builder.init();
            }
        }
        None => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr);
            if json {
                builder.json().init();
            } else {
                builder.init();
            }
        }
    }
    Ok(())
}

fn run(cli: Cli, config: Config) -> Result<()> {
    let mut store = ContentStore::open(&config.store.path, config.store.assets_dir.clone())
        .with_context(|| format!("Unable to open store {}", config.store.path.display()))?
        .with_workspace(config.store.workspace.clone());
    let packages = InstalledPackages::from_config(&config.packages);
    let prompt = Prompt::new(cli.yes);

    match cli.command {
        Commands::Export {
            source,
            site,
            filename,
            package_key,
            no_tidy,
            node_type_filter,
            extensions,
            no_detect_extensions,
        } => {
            tracing::info!("Exporting {}", source);
            commands::run_export(
                &config,
                &store,
                &packages,
                ExportArgs {
                    source,
                    site,
                    filename,
                    package_key,
                    no_tidy,
                    node_type_filter,
                    extensions,
                    no_detect_extensions,
                },
                &prompt,
            )
        }
        Commands::Import {
            filename,
            package_key,
            target_path,
            dry_run,
        } => commands::run_import(
            &config,
            &mut store,
            &packages,
            ImportArgs {
                filename,
                package_key,
                target_path,
                dry_run,
            },
            &prompt,
        ),
    }
}
