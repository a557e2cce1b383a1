//! Idempotency guard: decides whether a write is needed.
//!
//! Every mutation goes through [`IdempotencyGuard::check`] first. A
//! `Converged` answer means the catalog already holds the target value and
//! the write is skipped, which makes repeated runs no-ops.

use crate::attributes::AttributeAccessor;
use crate::models::{AssetObject, Lookup, SemanticAttribute};
use cr_connectors::AttributeValue;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Install states that mark an asset as decommissioned.
pub const RETIRED_INSTALL_STATES: [&str; 3] = ["disposed", "retired", "lost-stolen"];

/// How stored and expected display values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matching {
    Exact,
    IgnoreCase,
}

impl Matching {
    pub fn matches(&self, stored: &str, expected: &str) -> bool {
        match self {
            Matching::Exact => stored == expected,
            Matching::IgnoreCase => stored.to_lowercase() == expected.to_lowercase(),
        }
    }
}

/// Whether an attribute already holds its target value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Convergence {
    /// Stored value equals the target; no write.
    Converged,
    /// Stored value differs or is absent; write.
    Diverged,
    /// Stored value could not be read; never write.
    Unknown,
}

/// True iff the first stored value's display form matches `expected`.
pub fn first_value_matches(values: &[AttributeValue], expected: &str, matching: Matching) -> bool {
    values
        .first()
        .and_then(AttributeValue::display)
        .is_some_and(|stored| matching.matches(stored, expected))
}

/// True iff at least one install status is not a retirement state.
pub fn any_install_status_active(values: &[AttributeValue]) -> bool {
    values.iter().filter_map(AttributeValue::display).any(|status| {
        let status = status.to_lowercase();
        !RETIRED_INSTALL_STATES.contains(&status.as_str())
    })
}

/// Pre-write equality check over the attribute accessor.
#[derive(Clone)]
pub struct IdempotencyGuard {
    accessor: Arc<AttributeAccessor>,
}

impl IdempotencyGuard {
    pub fn new(accessor: Arc<AttributeAccessor>) -> Self {
        Self { accessor }
    }

    /// Compares the stored attribute with its target value.
    pub async fn check(
        &self,
        object: &AssetObject,
        attribute: SemanticAttribute,
        expected: &str,
        matching: Matching,
    ) -> Convergence {
        match self.accessor.read(object, attribute).await {
            Lookup::Unknown => Convergence::Unknown,
            Lookup::Absent => Convergence::Diverged,
            Lookup::Present(values) if first_value_matches(&values, expected, matching) => {
                debug!(
                    object_id = %object.id,
                    attribute = %attribute,
                    expected,
                    "Attribute already set"
                );
                Convergence::Converged
            }
            Lookup::Present(_) => Convergence::Diverged,
        }
    }

    /// Whether the asset is still in service.
    ///
    /// An empty or unset install status counts as inactive.
    pub async fn install_status_is_active(&self, object: &AssetObject) -> Lookup<bool> {
        match self
            .accessor
            .read(object, SemanticAttribute::InstallStatus)
            .await
        {
            Lookup::Unknown => Lookup::Unknown,
            Lookup::Absent => Lookup::Present(false),
            Lookup::Present(values) => Lookup::Present(any_install_status_active(&values)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObjectType;
    use crate::testing::{sample_config, HOST_TYPE_ID};
    use cr_connectors::testing::{slot, text_slot};
    use cr_connectors::MockCmdbConnector;

    fn values(displays: &[&str]) -> Vec<AttributeValue> {
        displays.iter().map(|d| AttributeValue::text(*d)).collect()
    }

    async fn guard_with(slots: Vec<cr_connectors::AttributeSlot>) -> (Arc<MockCmdbConnector>, IdempotencyGuard) {
        let mock = Arc::new(MockCmdbConnector::new("mock"));
        mock.insert_object("1", "host-1", HOST_TYPE_ID, slots).await;
        let accessor = Arc::new(AttributeAccessor::new(mock.clone(), Arc::new(sample_config())));
        (mock, IdempotencyGuard::new(accessor))
    }

    fn host() -> AssetObject {
        AssetObject::new("1", "host-1", ObjectType::Host)
    }

    #[test]
    fn test_first_value_matches() {
        assert!(first_value_matches(&values(&["MTL-A"]), "MTL-A", Matching::Exact));
        assert!(!first_value_matches(&values(&["mtl-a"]), "MTL-A", Matching::Exact));
        assert!(first_value_matches(&values(&["Server"]), "server", Matching::IgnoreCase));
        // Only the first value counts.
        assert!(!first_value_matches(&values(&["TOR-A", "MTL-A"]), "MTL-A", Matching::Exact));
        assert!(!first_value_matches(&[], "MTL-A", Matching::Exact));
    }

    #[test]
    fn test_install_status_active() {
        assert!(any_install_status_active(&values(&["In Use"])));
        assert!(any_install_status_active(&values(&["Retired", "Installed"])));
        assert!(!any_install_status_active(&values(&["Disposed", "LOST-STOLEN"])));
        assert!(!any_install_status_active(&[]));
    }

    #[tokio::test]
    async fn test_check_outcomes() {
        let (_, guard) = guard_with(vec![slot("103", &[("50", "MTL-A")])]).await;
        assert_eq!(
            guard.check(&host(), SemanticAttribute::Site, "MTL-A", Matching::Exact).await,
            Convergence::Converged
        );
        assert_eq!(
            guard.check(&host(), SemanticAttribute::Site, "TOR-A", Matching::Exact).await,
            Convergence::Diverged
        );
        assert_eq!(
            guard
                .check(&host(), SemanticAttribute::DeviceType, "server", Matching::IgnoreCase)
                .await,
            Convergence::Diverged
        );
    }

    #[tokio::test]
    async fn test_check_unknown_on_failed_read() {
        let (mock, guard) = guard_with(vec![slot("103", &[("50", "MTL-A")])]).await;
        mock.fail_reads_for("1").await;
        assert_eq!(
            guard.check(&host(), SemanticAttribute::Site, "MTL-A", Matching::Exact).await,
            Convergence::Unknown
        );
    }

    #[tokio::test]
    async fn test_install_status_lookup() {
        let (_, guard) = guard_with(vec![text_slot("107", &["Retired"])]).await;
        assert_eq!(guard.install_status_is_active(&host()).await, Lookup::Present(false));

        let (_, guard) = guard_with(vec![text_slot("107", &["In Use"])]).await;
        assert_eq!(guard.install_status_is_active(&host()).await, Lookup::Present(true));

        let (_, guard) = guard_with(vec![]).await;
        assert_eq!(guard.install_status_is_active(&host()).await, Lookup::Present(false));

        let (mock, guard) = guard_with(vec![text_slot("107", &["In Use"])]).await;
        mock.fail_reads_for("1").await;
        assert_eq!(guard.install_status_is_active(&host()).await, Lookup::Unknown);
    }
}
