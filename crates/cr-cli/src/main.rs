//! CMDB Reconciler CLI
//!
//! Command-line interface for the asset catalog reconciliation jobs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use cr_connectors::{Connector, ConnectorHealth};
use cr_core::ObjectType;
use std::path::PathBuf;

mod commands;
mod config;
mod validator;

use commands::{run_backup_sync, run_reconcile, BackupSyncArgs, ReconcileArgs};
use config::AppConfig;
use validator::ConfigValidator;

#[derive(Parser)]
#[command(name = "cmdb-reconciler")]
#[command(author = "CMDB Reconciler Team")]
#[command(version)]
#[command(about = "Keeps asset catalog IPs, sites and device types in sync", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "CMDB_RECONCILER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile IPs, sites and device types
    Reconcile {
        /// Object types to process (host, virtual-guest, device). Defaults to all.
        #[arg(short = 't', long = "object-type", value_name = "TYPE")]
        object_types: Vec<ObjectType>,

        /// Check and derive everything, but send no writes
        #[arg(long)]
        dry_run: bool,
    },

    /// Record backup storage locations from a hostname mapping
    BackupSync {
        /// JSON or YAML file mapping hostnames to storage locations
        #[arg(short, long, value_name = "FILE")]
        mapping: PathBuf,

        /// Check everything, but send no writes
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration
    Validate {
        /// Configuration file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also check that the asset catalog is reachable with the configured credentials
        #[arg(long)]
        check_connection: bool,
    },

    /// Show current configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    // Validate reports its own load errors
    if let Commands::Validate {
        config: cfg_path,
        check_connection,
    } = &cli.command
    {
        let path = cfg_path.clone().unwrap_or(config_path);
        let config = AppConfig::load(&path).ok();
        init_logging(&cli, config.as_ref())?;
        return cmd_validate(path, *check_connection).await;
    }

    let config = AppConfig::load(&config_path)?;
    init_logging(&cli, Some(&config))?;

    match cli.command {
        Commands::Reconcile {
            object_types,
            dry_run,
        } => {
            let args = ReconcileArgs {
                object_types,
                dry_run,
            };
            if !run_reconcile(config, args, cli.format).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::BackupSync { mapping, dry_run } => {
            let args = BackupSyncArgs { mapping, dry_run };
            if !run_backup_sync(config, args, cli.format).await? {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Config { show_secrets } => cmd_config(config, show_secrets, cli.format),
        Commands::Validate { .. } => Ok(()),
    }
}

/// Sets up logging from the config file, overridden by `--verbose` and `--format json`.
fn init_logging(cli: &Cli, config: Option<&AppConfig>) -> Result<()> {
    let mut logging = config
        .map(|c| c.logging.to_observability())
        .unwrap_or_default();

    if cli.verbose {
        logging.level = tracing::Level::DEBUG;
    }
    if cli.format == OutputFormat::Json {
        logging.json_format = true;
    }

    cr_observability::init_logging_with_config(logging).context("Failed to initialize logging")
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("com", "cmdb-reconciler", "cmdb-reconciler")
    {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/default.yaml")
    }
}

async fn cmd_validate(config_path: PathBuf, check_connection: bool) -> Result<()> {
    println!(
        "Validating configuration: {}",
        config_path.display().to_string().cyan()
    );

    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("{}: {:#}", "Configuration file error".red().bold(), e);
            std::process::exit(1);
        }
    };

    let validation_result = ConfigValidator::validate(&config);
    validation_result.print();

    println!();
    println!("{}", "Configuration Summary".bold());
    println!("─────────────────────");
    println!("  CMDB: {}", config.cmdb.base_url);
    println!("  Schema: {}", config.reconcile.schema_id);
    let types: Vec<String> = config
        .reconcile
        .object_types
        .keys()
        .map(|t| t.to_string())
        .collect();
    println!("  Object types: {}", types.join(", "));
    println!("  Sites mapped: {}", config.reconcile.site_object_ids.len());
    println!(
        "  Notifications: {}",
        if config.notification.webhook_url.is_some() {
            "webhook"
        } else {
            "log"
        }
    );

    if check_connection && !validation_result.has_errors() {
        println!();
        print!("Checking connection to {}... ", config.cmdb.base_url);
        let connector = cr_connectors::JiraAssetsConnector::new(config.cmdb.connector_config())
            .context("Failed to create the Jira Assets client")?;
        match connector.health_check().await {
            Ok(ConnectorHealth::Healthy) => println!("{}", "OK".green()),
            Ok(ConnectorHealth::Degraded(reason)) => {
                println!("{}: {}", "degraded".yellow(), reason)
            }
            Ok(ConnectorHealth::Unhealthy(reason)) => {
                println!("{}: {}", "unreachable".red(), reason);
                std::process::exit(1);
            }
            Err(e) => {
                println!("{}: {}", "failed".red(), e);
                std::process::exit(1);
            }
        }
    }

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Configuration validation failed. Fix the errors above."
                .red()
                .bold()
        );
        std::process::exit(1);
    } else if validation_result.has_warnings() {
        println!();
        println!(
            "{}",
            "Configuration is valid with warnings. Review the warnings above."
                .yellow()
                .bold()
        );
    } else {
        println!();
        println!("{}", "Configuration is valid.".green().bold());
    }

    Ok(())
}

fn cmd_config(config: AppConfig, show_secrets: bool, format: OutputFormat) -> Result<()> {
    let display_config = if show_secrets {
        config
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&display_config)?);
    } else {
        println!("{}", "Current Configuration".bold());
        println!("─────────────────────────");
        print!("{}", serde_yaml::to_string(&display_config)?);
    }

    Ok(())
}
