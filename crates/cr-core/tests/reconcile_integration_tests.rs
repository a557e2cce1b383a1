//! Integration tests for full reconciliation runs.
//!
//! These run the orchestrator against the in-memory catalog and a static
//! resolver and check the run-level guarantees: repeated runs are no-ops,
//! one object's failure does not affect its siblings, and truncated catalog
//! listings are reported.

use cr_connectors::testing::{slot, text_slot};
use cr_connectors::{MockCmdbConnector, StaticResolver};
use cr_core::testing::{attr, register_references, sample_config, GUEST_TYPE_ID, HOST_TYPE_ID, NETWORK_TYPE_ID};
use cr_core::{ObjectType, ReconcileOptions, Reconciler, SemanticAttribute, StepOutcome};
use std::net::Ipv4Addr;
use std::sync::Arc;

async fn catalog() -> Arc<MockCmdbConnector> {
    let mock = Arc::new(MockCmdbConnector::new("mock"));
    register_references(&mock).await;
    mock
}

fn reconciler(mock: &Arc<MockCmdbConnector>, dns: StaticResolver) -> Reconciler {
    Reconciler::new(Arc::new(sample_config()), mock.clone(), Arc::new(dns))
}

#[tokio::test]
async fn test_convergence_creates_attaches_and_sets_site_once() {
    let mock = catalog().await;
    mock.insert_object("1", "mtl-web-01", HOST_TYPE_ID, vec![]).await;
    let dns = StaticResolver::new().with_host("mtl-web-01", Ipv4Addr::new(10, 1, 2, 3));
    let reconciler = reconciler(&mock, dns);

    let first = reconciler.run(&[ObjectType::Host]).await;

    assert_eq!(mock.create_count(), 1);
    assert_eq!(mock.update_count(), 2);
    let report = &first.types[0].reports[0];
    assert_eq!(report.ip, StepOutcome::Updated);
    assert_eq!(report.site, StepOutcome::Updated);
    assert_eq!(report.ips, vec!["10.1.2.3".to_string()]);

    let network_objects = mock.objects_of_type(NETWORK_TYPE_ID).await;
    assert_eq!(network_objects.len(), 1);

    let host = mock.object("1").await.unwrap();
    assert_eq!(
        host.displays(attr(ObjectType::Host, SemanticAttribute::Network)),
        vec!["10.1.2.3".to_string()]
    );
    assert_eq!(
        host.displays(attr(ObjectType::Host, SemanticAttribute::Site)),
        vec!["MTL-A".to_string()]
    );

    mock.reset_counters();
    let second = reconciler.run(&[ObjectType::Host]).await;
    assert_eq!(mock.write_count(), 0);
    assert_eq!(second.total_writes(), 0);
    assert_eq!(second.types[0].reports[0].site, StepOutcome::Unchanged);
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let mock = catalog().await;
    mock.insert_object(
        "1",
        "tem-db-01",
        HOST_TYPE_ID,
        vec![
            text_slot("102", &["10.39.0.5"]),
            slot("103", &[("50", "MTL-A")]),
            text_slot("104", &["CentOS Linux 7"]),
        ],
    )
    .await;
    mock.insert_object(
        "2",
        "vdi-07",
        GUEST_TYPE_ID,
        vec![
            text_slot("202", &["172.16.8.7"]),
            text_slot("204", &["Windows 10 Enterprise"]),
        ],
    )
    .await;
    let reconciler = reconciler(&mock, StaticResolver::new());

    let first = reconciler.run(&ObjectType::ALL).await;
    assert_eq!(first.total_writes(), 4);
    assert!(first.is_clean());

    mock.reset_counters();
    let second = reconciler.run(&ObjectType::ALL).await;
    assert_eq!(mock.write_count(), 0);
    assert_eq!(second.total_writes(), 0);
    for report in second.types.iter().flat_map(|t| t.reports.iter()) {
        assert_eq!(report.site, StepOutcome::Unchanged, "{}", report.object.label);
        assert_eq!(report.device_type, StepOutcome::Unchanged, "{}", report.object.label);
    }

    let guest = mock.object("2").await.unwrap();
    assert_eq!(guest.displays("205"), vec!["virtual workstation".to_string()]);
}

#[tokio::test]
async fn test_failed_object_does_not_affect_siblings() {
    let mock = catalog().await;
    for (id, label) in [("1", "host-a"), ("2", "host-b"), ("3", "host-c")] {
        mock.insert_object(
            id,
            label,
            HOST_TYPE_ID,
            vec![text_slot("102", &["10.60.1.1"]), text_slot("104", &["Windows 7"])],
        )
        .await;
    }
    mock.fail_reads_for("2").await;
    let reconciler = reconciler(&mock, StaticResolver::new());

    let summary = reconciler.run(&[ObjectType::Host]).await;
    let host_summary = &summary.types[0];
    assert_eq!(host_summary.objects_seen, 3);
    assert_eq!(host_summary.failed, 1);
    assert_eq!(summary.unresolved(), vec!["host-b".to_string()]);

    for id in ["1", "3"] {
        let stored = mock.object(id).await.unwrap();
        assert_eq!(stored.displays("103"), vec!["TOR-A".to_string()]);
        assert_eq!(stored.displays("105"), vec!["computer".to_string()]);
    }
    let b = mock.object("2").await.unwrap();
    assert!(b.displays("103").is_empty());

    let b_report = &host_summary.reports[1];
    assert!(b_report.ip.is_failed());
    assert_eq!(b_report.site, StepOutcome::Skipped);
    assert_eq!(b_report.writes, 0);
}

#[tokio::test]
async fn test_three_pages_are_walked_in_order() {
    let mock = catalog().await;
    for i in 1..=60 {
        mock.insert_object(&i.to_string(), &format!("host-{:02}", i), HOST_TYPE_ID, vec![])
            .await;
    }
    let reconciler = reconciler(&mock, StaticResolver::new());

    let summary = reconciler.run(&[ObjectType::Host]).await;
    let host_summary = &summary.types[0];
    assert!(host_summary.is_complete());
    assert_eq!(host_summary.total_pages, 3);
    assert_eq!(host_summary.pages_fetched, 3);
    let labels: Vec<String> = host_summary
        .reports
        .iter()
        .map(|r| r.object.label.clone())
        .collect();
    let expected: Vec<String> = (1..=60).map(|i| format!("host-{:02}", i)).collect();
    assert_eq!(labels, expected);
}

#[tokio::test]
async fn test_truncated_listing_is_reported_as_partial() {
    let mock = catalog().await;
    for i in 1..=60 {
        mock.insert_object(&i.to_string(), &format!("host-{:02}", i), HOST_TYPE_ID, vec![])
            .await;
    }
    mock.fail_page(3).await;
    let reconciler = reconciler(&mock, StaticResolver::new());

    let summary = reconciler.run(&[ObjectType::Host, ObjectType::VirtualGuest]).await;
    assert_eq!(summary.partial_types(), vec![ObjectType::Host]);
    let host_summary = &summary.types[0];
    assert_eq!(host_summary.objects_seen, 50);
    assert_eq!(host_summary.failed_page, Some(3));
    assert!(!summary.is_clean());
    assert!(summary.types[1].is_complete());

    let notification = summary.to_notification();
    assert!(!notification.success);
    assert!(notification
        .unresolved
        .contains(&"host listing (stopped at page 3)".to_string()));
}

#[tokio::test]
async fn test_dry_run_then_real_run() {
    let mock = catalog().await;
    mock.insert_object(
        "1",
        "ind-app-01",
        HOST_TYPE_ID,
        vec![text_slot("102", &["10.64.5.5"])],
    )
    .await;

    let dry = Reconciler::new(
        Arc::new(sample_config()),
        mock.clone(),
        Arc::new(StaticResolver::new()),
    )
    .with_options(ReconcileOptions { dry_run: true });
    let summary = dry.run(&[ObjectType::Host]).await;
    assert_eq!(summary.total_writes(), 0);
    assert_eq!(summary.total_would_write(), 1);
    assert_eq!(mock.write_count(), 0);

    let real = reconciler(&mock, StaticResolver::new());
    let summary = real.run(&[ObjectType::Host]).await;
    assert_eq!(summary.total_writes(), 1);
    let host = mock.object("1").await.unwrap();
    assert_eq!(host.displays("103"), vec!["IND-A".to_string()]);
}

#[tokio::test]
async fn test_unresolvable_host_is_reported() {
    let mock = catalog().await;
    mock.insert_object("1", "gone-01", HOST_TYPE_ID, vec![]).await;
    let reconciler = reconciler(&mock, StaticResolver::new());

    let summary = reconciler.run(&[ObjectType::Host]).await;
    let host_summary = &summary.types[0];
    assert_eq!(host_summary.failed, 1);
    assert!(host_summary.reports[0].ip.is_failed());
    assert_eq!(host_summary.reports[0].site, StepOutcome::Skipped);
    assert_eq!(summary.unresolved(), vec!["gone-01".to_string()]);
    assert!(!summary.is_clean());
    assert_eq!(mock.write_count(), 0);

    let notification = summary.to_notification();
    assert!(!notification.success);
    assert_eq!(notification.unresolved, vec!["gone-01".to_string()]);
}
