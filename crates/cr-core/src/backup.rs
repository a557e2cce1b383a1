//! Backup-location sync batch job.
//!
//! Takes a `hostname -> storage location` mapping (produced by the backup
//! system's report) and records each location on the matching host or
//! virtual guest. Independent of the site reconciliation run.

use crate::attributes::AttributeAccessor;
use crate::config::ReconcileConfig;
use crate::guard::{Convergence, IdempotencyGuard, Matching};
use crate::models::{AssetObject, Lookup, ObjectType, SemanticAttribute};
use crate::orchestrator::ReconcileOptions;
use cr_connectors::cmdb::escape_aql_value;
use cr_connectors::{CmdbConnector, RunNotification};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Job name used in notifications.
pub const BACKUP_JOB_NAME: &str = "Set Backup Locations";

/// Types searched for a hostname, in order.
const SEARCH_ORDER: [ObjectType; 2] = [ObjectType::Host, ObjectType::VirtualGuest];

/// What happened to one hostname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum BackupOutcome {
    Updated,
    WouldUpdate,
    Unchanged,
    /// The asset is decommissioned; left alone.
    Inactive,
    NotFound,
    Failed(String),
}

impl BackupOutcome {
    /// Outcomes reported back as hosts that failed to update.
    pub fn is_unresolved(&self) -> bool {
        matches!(self, BackupOutcome::NotFound | BackupOutcome::Failed(_))
    }
}

/// Result of a backup-location sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupSyncReport {
    pub outcomes: BTreeMap<String, BackupOutcome>,
}

impl BackupSyncReport {
    fn count(&self, pred: impl Fn(&BackupOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| pred(*o)).count()
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, BackupOutcome::Updated))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, BackupOutcome::Unchanged))
    }

    pub fn inactive(&self) -> usize {
        self.count(|o| matches!(o, BackupOutcome::Inactive))
    }

    /// Hostnames that were not found or failed, sorted.
    pub fn unresolved(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_unresolved())
            .map(|(host, _)| host.clone())
            .collect()
    }

    pub fn to_notification(&self) -> RunNotification {
        let notification = RunNotification::for_job(BACKUP_JOB_NAME, self.unresolved());
        if notification.success {
            notification.with_summary("All backup locations were updated successfully")
        } else {
            notification
        }
    }
}

/// Applies backup locations to catalog objects.
pub struct BackupLocationSync {
    cmdb: Arc<dyn CmdbConnector>,
    accessor: Arc<AttributeAccessor>,
    guard: IdempotencyGuard,
    options: ReconcileOptions,
}

impl BackupLocationSync {
    pub fn new(config: Arc<ReconcileConfig>, cmdb: Arc<dyn CmdbConnector>) -> Self {
        let accessor = Arc::new(AttributeAccessor::new(cmdb.clone(), config));
        Self {
            cmdb,
            guard: IdempotencyGuard::new(accessor.clone()),
            accessor,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Query that finds objects of a type by name.
    pub fn name_query(object_type: ObjectType, hostname: &str) -> Result<String, String> {
        let hostname = escape_aql_value(hostname).map_err(|e| e.to_string())?;
        Ok(format!(
            "objectType = \"{}\" AND \"Name\" LIKE \"{}\" ORDER BY Name ASC",
            object_type.catalog_name(),
            hostname
        ))
    }

    /// Finds a hostname among hosts, then virtual guests.
    ///
    /// `Unknown` when a search failed before anything was found.
    pub async fn find_object(&self, hostname: &str) -> Lookup<AssetObject> {
        for object_type in SEARCH_ORDER {
            let query = match Self::name_query(object_type, hostname) {
                Ok(q) => q,
                Err(e) => {
                    error!(hostname, error = %e, "Cannot build name query");
                    return Lookup::Unknown;
                }
            };
            match self.cmdb.aql_search(&query, 0, 25).await {
                Ok(entries) => {
                    if let Some(entry) = entries.into_iter().next() {
                        return Lookup::Present(AssetObject::from_entry(entry, object_type));
                    }
                }
                Err(e) => {
                    error!(hostname, object_type = %object_type, error = %e, "Name search failed");
                    return Lookup::Unknown;
                }
            }
        }
        Lookup::Absent
    }

    /// Records one hostname's backup location.
    #[instrument(skip(self))]
    pub async fn sync_one(&self, hostname: &str, location: &str) -> BackupOutcome {
        let object = match self.find_object(hostname).await {
            Lookup::Present(object) => object,
            Lookup::Absent => {
                info!(hostname, "Not found in the catalog, adding to failed list");
                return BackupOutcome::NotFound;
            }
            Lookup::Unknown => return BackupOutcome::Failed("lookup failed".into()),
        };
        info!(hostname, object_id = %object.id, label = %object.label, "Found object");

        match self.guard.install_status_is_active(&object).await {
            Lookup::Present(true) => {}
            Lookup::Present(false) | Lookup::Absent => {
                info!(object_id = %object.id, "Install status is not active, skipping");
                return BackupOutcome::Inactive;
            }
            Lookup::Unknown => {
                return BackupOutcome::Failed("could not read install status".into())
            }
        }

        match self
            .guard
            .check(&object, SemanticAttribute::BackupLocation, location, Matching::Exact)
            .await
        {
            Convergence::Converged => {
                info!(object_id = %object.id, location, "Backup location already set, skipping");
                BackupOutcome::Unchanged
            }
            Convergence::Unknown => {
                BackupOutcome::Failed("could not read backup location".into())
            }
            Convergence::Diverged if self.options.dry_run => {
                info!(object_id = %object.id, location, "Dry run: would update backup location");
                BackupOutcome::WouldUpdate
            }
            Convergence::Diverged => match self
                .accessor
                .write_text(&object, SemanticAttribute::BackupLocation, location)
                .await
            {
                Ok(()) => {
                    info!(object_id = %object.id, location, "Updated backup location");
                    BackupOutcome::Updated
                }
                Err(e) => {
                    error!(object_id = %object.id, error = %e, "Failed to update backup location");
                    BackupOutcome::Failed(e.to_string())
                }
            },
        }
    }

    /// Processes the whole mapping, one hostname at a time.
    pub async fn run(&self, mapping: &BTreeMap<String, String>) -> BackupSyncReport {
        let mut report = BackupSyncReport::default();
        for (hostname, location) in mapping {
            let outcome = self.sync_one(hostname, location).await;
            if outcome.is_unresolved() {
                warn!(hostname, outcome = ?outcome, "Backup location not applied");
            }
            report.outcomes.insert(hostname.clone(), outcome);
        }
        info!(
            updated = report.updated(),
            unchanged = report.unchanged(),
            inactive = report.inactive(),
            unresolved = report.unresolved().len(),
            "Backup location sync finished"
        );
        report
    }
}
