//! Fixtures shared by unit and integration tests.

use crate::config::{NetworkObjectConfig, ObjectTypeConfig, ReconcileConfig};
use crate::derivation::{OsClassMap, SiteMap};
use crate::models::{DeviceTypeTag, ObjectType, SemanticAttribute, SiteCode};
use cr_connectors::MockCmdbConnector;
use std::collections::BTreeMap;

pub const HOST_TYPE_ID: &str = "8";
pub const GUEST_TYPE_ID: &str = "9";
pub const DEVICE_TYPE_ID: &str = "10";
pub const NETWORK_TYPE_ID: &str = "36";

/// Attribute id of `attribute` on `object_type` in [`sample_config`].
pub fn attr(object_type: ObjectType, attribute: SemanticAttribute) -> &'static str {
    use SemanticAttribute::*;
    match (object_type, attribute) {
        (ObjectType::Host, Name) => "101",
        (ObjectType::Host, Network) => "102",
        (ObjectType::Host, Site) => "103",
        (ObjectType::Host, OperatingSystem) => "104",
        (ObjectType::Host, DeviceType) => "105",
        (ObjectType::Host, Model) => "106",
        (ObjectType::Host, InstallStatus) => "107",
        (ObjectType::Host, BackupLocation) => "108",
        (ObjectType::VirtualGuest, Name) => "201",
        (ObjectType::VirtualGuest, Network) => "202",
        (ObjectType::VirtualGuest, Site) => "203",
        (ObjectType::VirtualGuest, OperatingSystem) => "204",
        (ObjectType::VirtualGuest, DeviceType) => "205",
        (ObjectType::VirtualGuest, InstallStatus) => "207",
        (ObjectType::VirtualGuest, BackupLocation) => "208",
        (ObjectType::Device, Name) => "301",
        (ObjectType::Device, Network) => "302",
        (ObjectType::Device, Site) => "303",
        (ObjectType::Device, DeviceType) => "305",
        (ObjectType::Device, Model) => "306",
        _ => "",
    }
}

fn type_config(object_type: ObjectType, type_id: &str) -> ObjectTypeConfig {
    use SemanticAttribute::*;
    let attributes = [
        Name,
        Network,
        Site,
        OperatingSystem,
        DeviceType,
        Model,
        InstallStatus,
        BackupLocation,
    ]
    .into_iter()
    .filter_map(|a| {
        let id = attr(object_type, a);
        (!id.is_empty()).then(|| (a, id.to_string()))
    })
    .collect();

    ObjectTypeConfig {
        object_type_id: type_id.to_string(),
        attributes,
    }
}

/// A complete configuration for the three object types.
///
/// Virtual guests have no model attribute; devices have no OS, install
/// status or backup location.
pub fn sample_config() -> ReconcileConfig {
    let object_types = BTreeMap::from([
        (ObjectType::Host, type_config(ObjectType::Host, HOST_TYPE_ID)),
        (
            ObjectType::VirtualGuest,
            type_config(ObjectType::VirtualGuest, GUEST_TYPE_ID),
        ),
        (ObjectType::Device, type_config(ObjectType::Device, DEVICE_TYPE_ID)),
    ]);

    ReconcileConfig {
        schema_id: "3".to_string(),
        results_per_page: 25,
        object_types,
        network_object: NetworkObjectConfig {
            object_type_id: NETWORK_TYPE_ID.to_string(),
            name_attribute_id: "361".to_string(),
            ipv4_attribute_id: "362".to_string(),
        },
        site_object_ids: site_object_ids(),
        device_type_ids: BTreeMap::from([
            (DeviceTypeTag::Server, "70".to_string()),
            (DeviceTypeTag::Computer, "71".to_string()),
            (DeviceTypeTag::VirtualWorkstation, "72".to_string()),
        ]),
        hardware_device_type_ids: BTreeMap::from([("switch".to_string(), "80".to_string())]),
        site_map: SiteMap::default(),
        os_classes: OsClassMap::default(),
    }
}

fn site_object_ids() -> BTreeMap<SiteCode, String> {
    BTreeMap::from([
        (SiteCode::MtlA, "50".to_string()),
        (SiteCode::TemA, "54".to_string()),
        (SiteCode::QueA, "52".to_string()),
        (SiteCode::TorA, "55".to_string()),
        (SiteCode::IndA, "49".to_string()),
        (SiteCode::TwnA, "56".to_string()),
    ])
}

/// Registers the site and device type objects of [`sample_config`] so
/// reference writes resolve to their display names.
pub async fn register_references(mock: &MockCmdbConnector) {
    for (site, id) in site_object_ids() {
        mock.add_reference(&id, site.as_str()).await;
    }
    for (tag, id) in sample_config().device_type_ids {
        mock.add_reference(&id, tag.as_str()).await;
    }
}
