//! Domain model of the reconciler.

use cr_connectors::ObjectEntry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of tracked asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    Host,
    #[serde(alias = "virtual guest", alias = "virtual_guest")]
    VirtualGuest,
    Device,
}

impl ObjectType {
    /// Default processing order of a full run.
    pub const ALL: [ObjectType; 3] = [ObjectType::Host, ObjectType::Device, ObjectType::VirtualGuest];

    /// Object type name as it appears in catalog queries.
    pub fn catalog_name(&self) -> &'static str {
        match self {
            ObjectType::Host => "Host",
            ObjectType::VirtualGuest => "Virtual Guest",
            ObjectType::Device => "Device",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Host => "host",
            ObjectType::VirtualGuest => "virtual-guest",
            ObjectType::Device => "device",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "host" => Ok(ObjectType::Host),
            "virtual-guest" => Ok(ObjectType::VirtualGuest),
            "device" => Ok(ObjectType::Device),
            other => Err(format!("unknown object type: {}", other)),
        }
    }
}

/// Physical/network site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SiteCode {
    #[serde(rename = "MTL-A")]
    MtlA,
    #[serde(rename = "TEM-A")]
    TemA,
    #[serde(rename = "QUE-A")]
    QueA,
    #[serde(rename = "TOR-A")]
    TorA,
    #[serde(rename = "IND-A")]
    IndA,
    #[serde(rename = "TWN-A")]
    TwnA,
}

impl SiteCode {
    pub const ALL: [SiteCode; 6] = [
        SiteCode::MtlA,
        SiteCode::TemA,
        SiteCode::QueA,
        SiteCode::TorA,
        SiteCode::IndA,
        SiteCode::TwnA,
    ];

    /// Canonical name, which is also the display value of the site object in the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteCode::MtlA => "MTL-A",
            SiteCode::TemA => "TEM-A",
            SiteCode::QueA => "QUE-A",
            SiteCode::TorA => "TOR-A",
            SiteCode::IndA => "IND-A",
            SiteCode::TwnA => "TWN-A",
        }
    }
}

impl fmt::Display for SiteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|site| site.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown site code: {}", s))
    }
}

/// Device classification derived for hosts and virtual guests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceTypeTag {
    #[serde(rename = "server")]
    Server,
    #[serde(rename = "computer")]
    Computer,
    #[serde(rename = "virtual workstation", alias = "virtual-workstation")]
    VirtualWorkstation,
}

impl DeviceTypeTag {
    pub const ALL: [DeviceTypeTag; 3] = [
        DeviceTypeTag::Server,
        DeviceTypeTag::Computer,
        DeviceTypeTag::VirtualWorkstation,
    ];

    /// Display value of the device type object in the catalog.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceTypeTag::Server => "server",
            DeviceTypeTag::Computer => "computer",
            DeviceTypeTag::VirtualWorkstation => "virtual workstation",
        }
    }
}

impl fmt::Display for DeviceTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes the engine knows how to read and write.
///
/// Each maps to a different catalog attribute id per object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticAttribute {
    Name,
    Network,
    Site,
    OperatingSystem,
    DeviceType,
    Model,
    InstallStatus,
    BackupLocation,
}

impl SemanticAttribute {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticAttribute::Name => "name",
            SemanticAttribute::Network => "network",
            SemanticAttribute::Site => "site",
            SemanticAttribute::OperatingSystem => "operating_system",
            SemanticAttribute::DeviceType => "device_type",
            SemanticAttribute::Model => "model",
            SemanticAttribute::InstallStatus => "install_status",
            SemanticAttribute::BackupLocation => "backup_location",
        }
    }
}

impl fmt::Display for SemanticAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entry of the asset catalog. The engine edits its attributes but never
/// creates or deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetObject {
    pub id: String,
    /// Display name, usually the hostname.
    pub label: String,
    pub object_type: ObjectType,
}

impl AssetObject {
    pub fn new(id: impl Into<String>, label: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            object_type,
        }
    }

    pub fn from_entry(entry: ObjectEntry, object_type: ObjectType) -> Self {
        Self {
            id: entry.id,
            label: entry.label,
            object_type,
        }
    }
}

/// Result of a read that can fail.
///
/// `Unknown` means the value could not be determined (the remote call gave
/// up or the attribute is not configured); it must never be treated as
/// `Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Unknown,
    Absent,
    Present(T),
}

impl<T> Lookup<T> {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Lookup::Unknown)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Lookup::Present(_))
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Lookup::Present(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Unknown => Lookup::Unknown,
            Lookup::Absent => Lookup::Absent,
            Lookup::Present(value) => Lookup::Present(f(value)),
        }
    }

    /// Chains a fallible step; `None` from `f` turns into `Absent`.
    pub fn and_then_opt<U, F: FnOnce(T) -> Option<U>>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Unknown => Lookup::Unknown,
            Lookup::Absent => Lookup::Absent,
            Lookup::Present(value) => f(value).map_or(Lookup::Absent, Lookup::Present),
        }
    }
}
