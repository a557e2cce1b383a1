//! # cr-core
//!
//! Reconciliation engine for the CMDB reconciler.
//!
//! Walks the asset catalog type by type and, for each object, resolves its
//! IP address, derives its site and device type, and writes only what differs
//! from what the catalog already holds. Reads that fail are reported as
//! unknown and never trigger writes.

pub mod attributes;
pub mod backup;
pub mod catalog;
pub mod config;
pub mod derivation;
pub mod error;
pub mod guard;
pub mod models;
pub mod orchestrator;
pub mod summary;
pub mod testing;

pub use attributes::AttributeAccessor;
pub use backup::{BackupLocationSync, BackupOutcome, BackupSyncReport};
pub use catalog::{CatalogWalk, CatalogWalker};
pub use config::{ConfigError, NetworkObjectConfig, ObjectTypeConfig, ReconcileConfig};
pub use derivation::{device_type_from_model, OsClassMap, SiteMap};
pub use error::{ReconcileError, ReconcileResult};
pub use guard::{Convergence, IdempotencyGuard, Matching};
pub use models::{AssetObject, DeviceTypeTag, Lookup, ObjectType, SemanticAttribute, SiteCode};
pub use orchestrator::{ObjectReport, ReconcileOptions, Reconciler, StepOutcome};
pub use summary::{RunSummary, TypeSummary};
