//! Backup-sync command - records backup storage locations on catalog objects.

use anyhow::{Context, Result};
use colored::Colorize;
use cr_core::{BackupLocationSync, BackupOutcome, BackupSyncReport, ReconcileOptions};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Instrument};

use super::{connect, deliver, ensure_valid};
use crate::config::AppConfig;
use crate::OutputFormat;

/// Backup-sync arguments from the command line.
#[derive(Debug, Clone)]
pub struct BackupSyncArgs {
    /// `hostname -> location` file, JSON or YAML.
    pub mapping: PathBuf,
    pub dry_run: bool,
}

/// Reads a `hostname -> location` map. `.json` files are parsed as JSON,
/// anything else as YAML.
pub fn load_mapping(path: &Path) -> Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mapping file: {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let mapping = if is_json {
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse mapping file: {}", path.display()))?
    } else {
        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse mapping file: {}", path.display()))?
    };
    Ok(mapping)
}

/// Runs the backup-location sync. Returns whether every hostname resolved.
pub async fn run_backup_sync(
    config: AppConfig,
    args: BackupSyncArgs,
    format: OutputFormat,
) -> Result<bool> {
    ensure_valid(&config)?;
    let mapping = load_mapping(&args.mapping)?;
    info!(hosts = mapping.len(), path = %args.mapping.display(), "Loaded backup location mapping");

    let cmdb = connect(&config)?;
    let notifier = config.notification.build()?;

    let sync = BackupLocationSync::new(Arc::new(config.reconcile), cmdb).with_options(
        ReconcileOptions {
            dry_run: args.dry_run,
        },
    );

    let span = cr_observability::run_span!(cr_core::backup::BACKUP_JOB_NAME, dry_run = args.dry_run);
    let report = sync.run(&mapping).instrument(span).await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, args.dry_run);
    }

    if args.dry_run {
        info!("Dry run: notification not sent");
    } else {
        deliver(notifier.as_ref(), &report.to_notification()).await;
    }

    Ok(report.unresolved().is_empty())
}

fn print_report(report: &BackupSyncReport, dry_run: bool) {
    println!();
    if dry_run {
        println!("{} {}", "Backup Location Sync".bold(), "(dry run)".yellow());
    } else {
        println!("{}", "Backup Location Sync".bold());
    }
    println!("────────────────────");

    for (hostname, outcome) in &report.outcomes {
        let status = match outcome {
            BackupOutcome::Updated => "updated".green(),
            BackupOutcome::WouldUpdate => "would update".yellow(),
            BackupOutcome::Unchanged => "unchanged".normal(),
            BackupOutcome::Inactive => "inactive, skipped".dimmed(),
            BackupOutcome::NotFound => "not found".red(),
            BackupOutcome::Failed(reason) => format!("failed: {}", reason).red(),
        };
        println!("  {}: {}", hostname.cyan(), status);
    }

    println!();
    println!(
        "  Updated: {}  Unchanged: {}  Inactive: {}  Unresolved: {}",
        report.updated(),
        report.unchanged(),
        report.inactive(),
        report.unresolved().len()
    );
}
