//! Reconcile command - runs the site reconciliation over the catalog.

use anyhow::Result;
use colored::Colorize;
use cr_connectors::SystemResolver;
use cr_core::{ObjectType, ReconcileOptions, Reconciler, RunSummary};
use std::sync::Arc;
use tracing::{info, Instrument};

use super::{connect, deliver, ensure_valid};
use crate::config::AppConfig;
use crate::OutputFormat;

/// Reconcile arguments from the command line.
#[derive(Debug, Clone, Default)]
pub struct ReconcileArgs {
    /// Types to process. Empty means all, in the default order.
    pub object_types: Vec<ObjectType>,
    pub dry_run: bool,
}

/// Types to process, without duplicates, keeping the order given.
pub fn selected_types(requested: &[ObjectType]) -> Vec<ObjectType> {
    if requested.is_empty() {
        return ObjectType::ALL.to_vec();
    }
    let mut types = Vec::with_capacity(requested.len());
    for object_type in requested {
        if !types.contains(object_type) {
            types.push(*object_type);
        }
    }
    types
}

/// Runs the reconciliation. Returns whether the run was clean.
pub async fn run_reconcile(
    config: AppConfig,
    args: ReconcileArgs,
    format: OutputFormat,
) -> Result<bool> {
    ensure_valid(&config)?;

    let cmdb = connect(&config)?;
    let dns = Arc::new(SystemResolver::new(config.dns.retry_policy()));
    let notifier = config.notification.build()?;
    let types = selected_types(&args.object_types);

    let reconciler = Reconciler::new(Arc::new(config.reconcile), cmdb, dns)
        .with_options(ReconcileOptions {
            dry_run: args.dry_run,
        });

    let span = cr_observability::run_span!("Site Reconciliation", dry_run = args.dry_run);
    let summary = reconciler.run(&types).instrument(span).await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if args.dry_run {
        info!("Dry run: notification not sent");
    } else {
        deliver(notifier.as_ref(), &summary.to_notification()).await;
    }

    Ok(summary.is_clean())
}

fn print_summary(summary: &RunSummary) {
    println!();
    if summary.dry_run {
        println!("{} {}", "Reconciliation Summary".bold(), "(dry run)".yellow());
    } else {
        println!("{}", "Reconciliation Summary".bold());
    }
    println!("──────────────────────");

    for t in &summary.types {
        let pages = if t.is_complete() {
            format!("{}/{} pages", t.pages_fetched, t.total_pages).normal()
        } else {
            format!(
                "stopped at page {}",
                t.failed_page.unwrap_or_default()
            )
            .red()
        };
        let writes = if summary.dry_run {
            format!("{} would write", t.would_write)
        } else {
            format!("{} writes", t.writes)
        };
        println!(
            "  {}: {} objects, {} updated, {} failed, {} undecidable, {} ({})",
            t.object_type.to_string().cyan(),
            t.objects_seen,
            t.updated,
            t.failed,
            t.undecidable,
            writes,
            pages
        );
    }

    let failed: Vec<_> = summary
        .types
        .iter()
        .flat_map(|t| t.failed_reports())
        .collect();
    if !failed.is_empty() {
        println!();
        println!("{}", "Failed objects:".red().bold());
        for report in failed {
            println!(
                "  {} {}: {}",
                "✗".red(),
                report.object.label,
                report.failures().join("; ")
            );
        }
    }

    println!();
    if summary.is_clean() {
        println!("{}", "All objects reconciled.".green().bold());
    } else {
        println!(
            "{}",
            format!("{} items unresolved.", summary.unresolved().len())
                .yellow()
                .bold()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_selection_is_all_types() {
        assert_eq!(
            selected_types(&[]),
            vec![ObjectType::Host, ObjectType::Device, ObjectType::VirtualGuest]
        );
    }

    #[test]
    fn test_selection_keeps_order_and_drops_duplicates() {
        assert_eq!(
            selected_types(&[
                ObjectType::VirtualGuest,
                ObjectType::Host,
                ObjectType::VirtualGuest
            ]),
            vec![ObjectType::VirtualGuest, ObjectType::Host]
        );
    }
}
