//! Fact derivation: pure mappings from observed facts to target values.

use crate::models::{DeviceTypeTag, ObjectType, SiteCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Site lookup keyed by the first two IPv4 octets.
///
/// Serialized as a map of `"octet1.octet2"` to site code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, SiteCode>", into = "BTreeMap<String, SiteCode>")]
pub struct SiteMap {
    entries: BTreeMap<(String, String), SiteCode>,
}

impl SiteMap {
    /// Builds a map from `"a.b"` keys.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (&'a str, SiteCode)>,
    {
        let mut entries = BTreeMap::new();
        for (key, site) in pairs {
            let (first, second) = parse_octet_pair(key)?;
            if entries.insert((first, second), site).is_some() {
                return Err(format!("duplicate site map entry: {}", key));
            }
        }
        Ok(Self { entries })
    }

    /// Site of the first IP (in list order) whose first two octets are mapped.
    ///
    /// Entries that are not four dot-separated components are skipped.
    /// Returns the site together with the IP that decided it.
    pub fn site_from_ips<S: AsRef<str>>(&self, ips: &[S]) -> Option<(SiteCode, String)> {
        ips.iter().find_map(|ip| {
            let ip = ip.as_ref();
            let octets: Vec<&str> = ip.split('.').collect();
            if octets.len() != 4 {
                return None;
            }
            self.entries
                .get(&(octets[0].to_string(), octets[1].to_string()))
                .map(|site| (*site, ip.to_string()))
        })
    }

    /// Sites reachable through this map.
    pub fn sites(&self) -> impl Iterator<Item = SiteCode> + '_ {
        let mut seen: Vec<SiteCode> = self.entries.values().copied().collect();
        seen.sort();
        seen.dedup();
        seen.into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SiteMap {
    fn default() -> Self {
        let entries = [
            ("10", "64", SiteCode::IndA),
            ("10", "1", SiteCode::MtlA),
            ("10", "2", SiteCode::MtlA),
            ("10", "3", SiteCode::MtlA),
            ("10", "4", SiteCode::MtlA),
            ("10", "51", SiteCode::MtlA),
            ("10", "39", SiteCode::TemA),
            ("10", "33", SiteCode::TemA),
            ("10", "32", SiteCode::TemA),
            ("10", "35", SiteCode::TemA),
            ("10", "16", SiteCode::QueA),
            ("10", "18", SiteCode::QueA),
            ("10", "31", SiteCode::QueA),
            ("10", "60", SiteCode::TorA),
            ("10", "48", SiteCode::TorA),
            ("10", "242", SiteCode::TwnA),
            ("172", "16", SiteCode::MtlA),
            ("172", "17", SiteCode::MtlA),
        ]
        .into_iter()
        .map(|(a, b, site)| ((a.to_string(), b.to_string()), site))
        .collect();
        Self { entries }
    }
}

impl TryFrom<BTreeMap<String, SiteCode>> for SiteMap {
    type Error = String;

    fn try_from(map: BTreeMap<String, SiteCode>) -> Result<Self, Self::Error> {
        Self::from_pairs(map.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

impl From<SiteMap> for BTreeMap<String, SiteCode> {
    fn from(map: SiteMap) -> Self {
        map.entries
            .into_iter()
            .map(|((a, b), site)| (format!("{}.{}", a, b), site))
            .collect()
    }
}

fn parse_octet_pair(key: &str) -> Result<(String, String), String> {
    let parts: Vec<&str> = key.split('.').collect();
    match parts.as_slice() {
        [a, b] if a.parse::<u8>().is_ok() && b.parse::<u8>().is_ok() => {
            Ok((a.to_string(), b.to_string()))
        }
        _ => Err(format!(
            "invalid site map key '{}': expected two octets like \"10.64\"",
            key
        )),
    }
}

/// Operating-system classification lists.
///
/// An OS string belongs to a class if it contains any listed substring
/// (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OsClassMap {
    #[serde(default = "default_server_os")]
    pub server_os: Vec<String>,
    #[serde(default = "default_computer_os")]
    pub computer_os: Vec<String>,
}

fn default_server_os() -> Vec<String> {
    ["CentOS", "Ubuntu", "Server", "Linux"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_computer_os() -> Vec<String> {
    ["Windows 10", "Windows 8.1", "Windows 7"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for OsClassMap {
    fn default() -> Self {
        Self {
            server_os: default_server_os(),
            computer_os: default_computer_os(),
        }
    }
}

impl OsClassMap {
    fn is_server(&self, os: &str) -> bool {
        self.server_os.iter().any(|s| os.contains(s.as_str()))
    }

    fn is_computer(&self, os: &str) -> bool {
        self.computer_os.iter().any(|s| os.contains(s.as_str()))
    }

    /// Device type implied by an operating system.
    ///
    /// Virtual guests are virtual workstations when they run a desktop OS and
    /// undecided otherwise. Everything else is a server if a server OS
    /// matches, then a computer if a desktop OS matches.
    pub fn device_type_from_os(&self, os: &str, object_type: ObjectType) -> Option<DeviceTypeTag> {
        match object_type {
            ObjectType::VirtualGuest => self
                .is_computer(os)
                .then_some(DeviceTypeTag::VirtualWorkstation),
            ObjectType::Host | ObjectType::Device => {
                if self.is_server(os) {
                    Some(DeviceTypeTag::Server)
                } else if self.is_computer(os) {
                    Some(DeviceTypeTag::Computer)
                } else {
                    None
                }
            }
        }
    }

    /// Entries present in both lists.
    pub fn overlapping(&self) -> Vec<&str> {
        self.server_os
            .iter()
            .filter(|s| self.computer_os.contains(s))
            .map(String::as_str)
            .collect()
    }
}

/// Device type implied by a hardware model.
///
/// No model rules exist yet, so this never decides.
pub fn device_type_from_model(_model: &str) -> Option<DeviceTypeTag> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_from_ips_examples() {
        let map = SiteMap::default();
        assert_eq!(
            map.site_from_ips(&["10.64.5.5"]),
            Some((SiteCode::IndA, "10.64.5.5".to_string()))
        );
        assert_eq!(map.site_from_ips(&["192.168.1.1"]), None);
        assert_eq!(
            map.site_from_ips(&["bad", "10.1.2.3"]),
            Some((SiteCode::MtlA, "10.1.2.3".to_string()))
        );
    }

    #[test]
    fn test_site_from_ips_first_match_wins() {
        let map = SiteMap::default();
        let ips = ["192.168.0.9", "10.60.1.1", "10.1.1.1"];
        assert_eq!(
            map.site_from_ips(&ips),
            Some((SiteCode::TorA, "10.60.1.1".to_string()))
        );
    }

    #[test]
    fn test_site_from_ips_malformed_and_empty() {
        let map = SiteMap::default();
        let empty: [&str; 0] = [];
        assert_eq!(map.site_from_ips(&empty), None);
        assert_eq!(map.site_from_ips(&["10.64", "10.64.1", "10.64.1.1.1", ""]), None);
        assert_eq!(
            map.site_from_ips(&["172.17.0.1".to_string()]),
            Some((SiteCode::MtlA, "172.17.0.1".to_string()))
        );
    }

    #[test]
    fn test_default_site_map_covers_every_site() {
        let map = SiteMap::default();
        assert_eq!(map.len(), 18);
        assert_eq!(map.sites().count(), SiteCode::ALL.len());
    }

    #[test]
    fn test_site_map_yaml_round_trip() {
        let yaml = "\"10.64\": IND-A\n\"192.168\": TOR-A\n";
        let map: SiteMap = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            map.site_from_ips(&["192.168.3.4"]),
            Some((SiteCode::TorA, "192.168.3.4".to_string()))
        );

        let bad: Result<SiteMap, _> = serde_yaml::from_str("\"10\": IND-A\n");
        assert!(bad.is_err());
        let bad: Result<SiteMap, _> = serde_yaml::from_str("\"10.999\": IND-A\n");
        assert!(bad.is_err());
    }

    #[test]
    fn test_device_type_from_os_examples() {
        let os = OsClassMap::default();
        assert_eq!(
            os.device_type_from_os("Windows 10", ObjectType::Host),
            Some(DeviceTypeTag::Computer)
        );
        assert_eq!(
            os.device_type_from_os("Ubuntu 22.04", ObjectType::Host),
            Some(DeviceTypeTag::Server)
        );
        assert_eq!(
            os.device_type_from_os("Windows 7", ObjectType::VirtualGuest),
            Some(DeviceTypeTag::VirtualWorkstation)
        );
        assert_eq!(os.device_type_from_os("AIX", ObjectType::Host), None);
    }

    #[test]
    fn test_device_type_from_os_precedence_and_case() {
        let os = OsClassMap::default();
        // Both lists match; server wins for hosts.
        assert_eq!(
            os.device_type_from_os("Windows 10 Server Edition", ObjectType::Host),
            Some(DeviceTypeTag::Server)
        );
        // Guests never become servers.
        assert_eq!(
            os.device_type_from_os("Ubuntu 22.04", ObjectType::VirtualGuest),
            None
        );
        assert_eq!(os.device_type_from_os("ubuntu 22.04", ObjectType::Host), None);
        assert!(os.overlapping().is_empty());
    }

    #[test]
    fn test_device_type_from_model_never_decides() {
        assert_eq!(device_type_from_model("PowerEdge R740"), None);
        assert_eq!(device_type_from_model(""), None);
    }
}
