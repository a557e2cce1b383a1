//! Reconciliation orchestrator.
//!
//! For each object of each type: resolve its IP, then its site, then its
//! device type. Objects are processed one at a time and independently; a
//! failure is recorded on the object's report and the walk moves on.

use crate::attributes::AttributeAccessor;
use crate::catalog::CatalogWalker;
use crate::config::ReconcileConfig;
use crate::derivation::device_type_from_model;
use crate::guard::{Convergence, IdempotencyGuard, Matching};
use crate::models::{AssetObject, Lookup, ObjectType, SemanticAttribute};
use crate::summary::{RunSummary, TypeSummary};
use cr_connectors::{CmdbConnector, DnsResolver};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Run options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Derive and check everything, but send no writes.
    pub dry_run: bool,
}

/// Outcome of one reconciliation step on one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Catalog already held the target value.
    Unchanged,
    /// A write was sent.
    Updated,
    /// A write would have been sent (dry run).
    WouldUpdate,
    /// No target value could be derived from the available facts.
    Undecidable,
    /// A prerequisite was missing (no IP, no OS).
    Skipped,
    /// A read, write or mapping failed.
    Failed(String),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

/// Everything that happened to one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReport {
    pub object: AssetObject,
    /// IPs the site decision was based on.
    pub ips: Vec<String>,
    pub ip: StepOutcome,
    pub site: StepOutcome,
    pub device_type: StepOutcome,
    /// Mutating calls sent (a network object create and its attach count as two).
    pub writes: u32,
    /// Mutating calls suppressed by dry run.
    pub would_write: u32,
}

impl ObjectReport {
    fn new(object: AssetObject) -> Self {
        Self {
            object,
            ips: Vec::new(),
            ip: StepOutcome::Skipped,
            site: StepOutcome::Skipped,
            device_type: StepOutcome::Skipped,
            writes: 0,
            would_write: 0,
        }
    }

    pub fn steps(&self) -> [&StepOutcome; 3] {
        [&self.ip, &self.site, &self.device_type]
    }

    pub fn is_failed(&self) -> bool {
        self.steps().iter().any(|s| s.is_failed())
    }

    pub fn is_changed(&self) -> bool {
        self.writes > 0
    }

    /// Failure messages, prefixed with the step that produced them.
    pub fn failures(&self) -> Vec<String> {
        [("ip", &self.ip), ("site", &self.site), ("device_type", &self.device_type)]
            .into_iter()
            .filter_map(|(step, outcome)| match outcome {
                StepOutcome::Failed(reason) => Some(format!("{}: {}", step, reason)),
                _ => None,
            })
            .collect()
    }
}

/// Drives catalog walks and per-object fix-ups.
pub struct Reconciler {
    config: Arc<ReconcileConfig>,
    dns: Arc<dyn DnsResolver>,
    accessor: Arc<AttributeAccessor>,
    guard: IdempotencyGuard,
    walker: CatalogWalker,
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(
        config: Arc<ReconcileConfig>,
        cmdb: Arc<dyn CmdbConnector>,
        dns: Arc<dyn DnsResolver>,
    ) -> Self {
        let accessor = Arc::new(AttributeAccessor::new(cmdb.clone(), config.clone()));
        Self {
            guard: IdempotencyGuard::new(accessor.clone()),
            walker: CatalogWalker::new(cmdb, config.clone()),
            config,
            dns,
            accessor,
            options: ReconcileOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    /// Reconciles every object of each type, in the given order.
    pub async fn run(&self, object_types: &[ObjectType]) -> RunSummary {
        let mut summary = RunSummary::start(self.options.dry_run);
        for object_type in object_types {
            info!(object_type = %object_type, "Processing {} objects", object_type);
            summary.types.push(self.reconcile_type(*object_type).await);
        }
        summary.finish();
        info!(
            writes = summary.total_writes(),
            failed_objects = summary.failed_object_count(),
            partial_types = summary.partial_types().len(),
            "Reconciliation run finished"
        );
        summary
    }

    /// Walks one object type and reconciles each object.
    #[instrument(skip(self))]
    pub async fn reconcile_type(&self, object_type: ObjectType) -> TypeSummary {
        let started = Instant::now();
        let walk = self.walker.list_objects(object_type).await;
        if !walk.is_complete() {
            warn!(
                object_type = %object_type,
                failed_page = ?walk.failed_page,
                objects = walk.objects.len(),
                "Catalog listing is partial; reconciling the objects that were listed"
            );
        }

        let mut reports = Vec::with_capacity(walk.objects.len());
        for object in &walk.objects {
            reports.push(self.reconcile_object(object).await);
        }

        info!(object_type = %object_type, "Finished all {} objects", object_type);
        TypeSummary::from_walk(&walk, reports, started.elapsed())
    }

    /// Runs the IP, site and device type steps on one object.
    #[instrument(skip(self, object), fields(object_id = %object.id, label = %object.label))]
    pub async fn reconcile_object(&self, object: &AssetObject) -> ObjectReport {
        info!(object_id = %object.id, label = %object.label, "Working on object");
        let mut report = ObjectReport::new(object.clone());

        self.resolve_ip(object, &mut report).await;
        self.resolve_site(object, &mut report).await;
        self.resolve_device_type(object, &mut report).await;

        report
    }

    async fn resolve_ip(&self, object: &AssetObject, report: &mut ObjectReport) {
        match self
            .accessor
            .read_displays(object, SemanticAttribute::Network)
            .await
        {
            Lookup::Present(ips) => {
                report.ips = ips;
                report.ip = StepOutcome::Unchanged;
            }
            Lookup::Unknown => {
                report.ip = StepOutcome::Failed("could not read network attribute".into());
            }
            Lookup::Absent => {
                info!(object_id = %object.id, "No IP set, resolving {}", object.label);
                match self.dns.resolve_ipv4(&object.label).await {
                    Ok(ip) => {
                        let ip = ip.to_string();
                        info!(object_id = %object.id, ip = %ip, "Found IP");
                        report.ip = self.attach_ip(object, &ip, report).await;
                        report.ips = vec![ip];
                    }
                    Err(e) => {
                        warn!(object_id = %object.id, label = %object.label, error = %e, "Hostname did not resolve");
                        report.ip = StepOutcome::Failed(format!("dns: {}", e));
                    }
                }
            }
        }
    }

    /// Creates a network object for `ip` and links it into the object.
    async fn attach_ip(&self, object: &AssetObject, ip: &str, report: &mut ObjectReport) -> StepOutcome {
        if let Err(e) = self.accessor.attribute_id(object, SemanticAttribute::Network) {
            error!(object_id = %object.id, error = %e, "Cannot attach IP");
            return StepOutcome::Failed(e.to_string());
        }

        if self.options.dry_run {
            info!(object_id = %object.id, ip, "Dry run: would create network object and attach it");
            report.would_write += 2;
            return StepOutcome::WouldUpdate;
        }

        let network_object = match self.accessor.create_network_object(ip).await {
            Ok(created) => {
                report.writes += 1;
                info!(ip, network_object_id = %created.id, "Created network object");
                created
            }
            Err(e) => {
                error!(object_id = %object.id, ip, error = %e, "Failed to create network object");
                return StepOutcome::Failed(format!("create network object: {}", e));
            }
        };

        match self
            .accessor
            .write(object, SemanticAttribute::Network, &network_object.id)
            .await
        {
            Ok(()) => {
                report.writes += 1;
                info!(object_id = %object.id, ip, "Updated IP");
                StepOutcome::Updated
            }
            Err(e) => {
                error!(object_id = %object.id, ip, error = %e, "Failed to attach network object");
                StepOutcome::Failed(format!("attach network object: {}", e))
            }
        }
    }

    async fn resolve_site(&self, object: &AssetObject, report: &mut ObjectReport) {
        if report.ips.is_empty() {
            info!(object_id = %object.id, "No IP available, site left unresolved");
            report.site = StepOutcome::Skipped;
            return;
        }

        let Some((site, ip_used)) = self.config.site_map.site_from_ips(&report.ips) else {
            info!(object_id = %object.id, ips = ?report.ips, "No site matches the object's IPs");
            report.site = StepOutcome::Undecidable;
            return;
        };
        info!(object_id = %object.id, site = %site, ip = %ip_used, "Site decided");

        let Some(site_object_id) = self.config.site_object_id(site) else {
            error!(object_id = %object.id, site = %site, "No catalog object id configured for site");
            report.site = StepOutcome::Failed(format!("no object id configured for site {}", site));
            return;
        };

        report.site = self
            .apply(
                object,
                SemanticAttribute::Site,
                site.as_str(),
                site_object_id,
                Matching::Exact,
                report,
            )
            .await;
    }

    /// Derives the device type and writes it when it differs. The comparison
    /// ignores case, so a catalog value such as "Server" counts as converged.
    async fn resolve_device_type(&self, object: &AssetObject, report: &mut ObjectReport) {
        let (source, derived) = match object.object_type {
            ObjectType::Host | ObjectType::VirtualGuest => {
                match self
                    .accessor
                    .read_first_display(object, SemanticAttribute::OperatingSystem)
                    .await
                {
                    Lookup::Present(os) => {
                        let tag = self.config.os_classes.device_type_from_os(&os, object.object_type);
                        (os, tag)
                    }
                    Lookup::Absent => {
                        report.device_type = StepOutcome::Skipped;
                        return;
                    }
                    Lookup::Unknown => {
                        report.device_type =
                            StepOutcome::Failed("could not read operating system".into());
                        return;
                    }
                }
            }
            ObjectType::Device => {
                match self
                    .accessor
                    .read_first_display(object, SemanticAttribute::Model)
                    .await
                {
                    Lookup::Present(model) => {
                        let tag = device_type_from_model(&model);
                        (model, tag)
                    }
                    Lookup::Absent => {
                        report.device_type = StepOutcome::Skipped;
                        return;
                    }
                    Lookup::Unknown => {
                        report.device_type = StepOutcome::Failed("could not read model".into());
                        return;
                    }
                }
            }
        };

        let Some(tag) = derived else {
            info!(object_id = %object.id, source = %source, "No device type derivable");
            report.device_type = StepOutcome::Undecidable;
            return;
        };
        info!(object_id = %object.id, device_type = %tag, "Device type decided");

        let Some(device_type_id) = self.config.device_type_id(tag) else {
            error!(object_id = %object.id, device_type = %tag, "No catalog object id configured for device type");
            report.device_type =
                StepOutcome::Failed(format!("no object id configured for device type {}", tag));
            return;
        };

        report.device_type = self
            .apply(
                object,
                SemanticAttribute::DeviceType,
                tag.as_str(),
                device_type_id,
                Matching::IgnoreCase,
                report,
            )
            .await;
    }

    /// Guarded write of `value` into `attribute`, where `expected` is how the
    /// catalog displays it once written.
    async fn apply(
        &self,
        object: &AssetObject,
        attribute: SemanticAttribute,
        expected: &str,
        value: &str,
        matching: Matching,
        report: &mut ObjectReport,
    ) -> StepOutcome {
        match self.guard.check(object, attribute, expected, matching).await {
            Convergence::Converged => {
                info!(object_id = %object.id, attribute = %attribute, "{} already set", attribute);
                StepOutcome::Unchanged
            }
            Convergence::Unknown => {
                StepOutcome::Failed(format!("could not read current {}", attribute))
            }
            Convergence::Diverged if self.options.dry_run => {
                info!(object_id = %object.id, attribute = %attribute, expected, "Dry run: would update");
                report.would_write += 1;
                StepOutcome::WouldUpdate
            }
            Convergence::Diverged => match self.accessor.write(object, attribute, value).await {
                Ok(()) => {
                    report.writes += 1;
                    info!(object_id = %object.id, attribute = %attribute, "Updated {}: {}", attribute, expected);
                    StepOutcome::Updated
                }
                Err(e) => {
                    error!(object_id = %object.id, attribute = %attribute, error = %e, "Failed to update {}", attribute);
                    StepOutcome::Failed(e.to_string())
                }
            },
        }
    }
}
