//! Run summaries.

use crate::catalog::CatalogWalk;
use crate::models::ObjectType;
use crate::orchestrator::{ObjectReport, StepOutcome};
use chrono::{DateTime, Utc};
use cr_connectors::RunNotification;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of reconciling one object type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeSummary {
    pub object_type: ObjectType,
    /// Objects listed by the catalog walk.
    pub objects_seen: u64,
    /// Objects that received at least one write.
    pub updated: u64,
    /// Objects with at least one failed step.
    pub failed: u64,
    /// Objects where a site or device type could not be derived.
    pub undecidable: u64,
    pub writes: u64,
    pub would_write: u64,
    pub total_pages: u32,
    pub pages_fetched: u32,
    /// Page at which the catalog walk stopped, if it did.
    pub failed_page: Option<u32>,
    pub duration_ms: u64,
    pub reports: Vec<ObjectReport>,
}

impl TypeSummary {
    pub fn from_walk(walk: &CatalogWalk, reports: Vec<ObjectReport>, elapsed: Duration) -> Self {
        let count = |pred: fn(&ObjectReport) -> bool| reports.iter().filter(|r| pred(*r)).count() as u64;
        Self {
            object_type: walk.object_type,
            objects_seen: walk.objects.len() as u64,
            updated: count(ObjectReport::is_changed),
            failed: count(ObjectReport::is_failed),
            undecidable: count(|r| {
                r.site == StepOutcome::Undecidable || r.device_type == StepOutcome::Undecidable
            }),
            writes: reports.iter().map(|r| r.writes as u64).sum(),
            would_write: reports.iter().map(|r| r.would_write as u64).sum(),
            total_pages: walk.total_pages,
            pages_fetched: walk.pages_fetched,
            failed_page: walk.failed_page,
            duration_ms: elapsed.as_millis() as u64,
            reports,
        }
    }

    /// True when every page was fetched.
    pub fn is_complete(&self) -> bool {
        self.failed_page.is_none()
    }

    /// Returns whether the type was fully listed and no object failed.
    pub fn is_clean(&self) -> bool {
        self.is_complete() && self.failed == 0
    }

    pub fn failed_reports(&self) -> impl Iterator<Item = &ObjectReport> {
        self.reports.iter().filter(|r| r.is_failed())
    }
}

/// Result of a full run across object types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub types: Vec<TypeSummary>,
}

impl RunSummary {
    pub fn start(dry_run: bool) -> Self {
        Self {
            dry_run,
            started_at: Utc::now(),
            completed_at: None,
            types: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn total_writes(&self) -> u64 {
        self.types.iter().map(|t| t.writes).sum()
    }

    pub fn total_would_write(&self) -> u64 {
        self.types.iter().map(|t| t.would_write).sum()
    }

    pub fn failed_object_count(&self) -> u64 {
        self.types.iter().map(|t| t.failed).sum()
    }

    /// Types whose catalog walk was truncated.
    pub fn partial_types(&self) -> Vec<ObjectType> {
        self.types
            .iter()
            .filter(|t| !t.is_complete())
            .map(|t| t.object_type)
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.types.iter().all(TypeSummary::is_clean)
    }

    /// Labels of failed objects, then one entry per truncated listing.
    pub fn unresolved(&self) -> Vec<String> {
        let mut unresolved: Vec<String> = self
            .types
            .iter()
            .flat_map(|t| t.failed_reports())
            .map(|r| r.object.label.clone())
            .collect();
        unresolved.extend(self.types.iter().filter(|t| !t.is_complete()).map(|t| {
            format!(
                "{} listing (stopped at page {})",
                t.object_type,
                t.failed_page.unwrap_or_default()
            )
        }));
        unresolved
    }

    /// Notification for the end of a run.
    pub fn to_notification(&self) -> RunNotification {
        let notification = RunNotification::for_job("Site Reconciliation", self.unresolved());
        if notification.success {
            notification.with_summary(format!(
                "All objects reconciled: {} writes across {} object types",
                self.total_writes(),
                self.types.len()
            ))
        } else {
            let summary = format!(
                "{} objects failed to reconcile, {} listings incomplete: {}",
                self.failed_object_count(),
                self.partial_types().len(),
                notification.unresolved.join(", ")
            );
            notification.with_summary(summary)
        }
    }
}
