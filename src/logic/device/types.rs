//! Device records
//!
//! One row per observed device, keyed by its 64-bit hardware address.
//! Knowledge only grows: sets union, maps last-write-win, the type enum
//! upgrades away from Unknown exactly once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type DeviceId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "unknown")]
    Unknown,
    Coordinator,
    Router,
    #[serde(rename = "End Device")]
    EndDevice,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Unknown => "unknown",
            DeviceType::Coordinator => "Coordinator",
            DeviceType::Router => "Router",
            DeviceType::EndDevice => "End Device",
        }
    }

    /// Anything the dissector vocabulary does not name is Unknown.
    pub fn parse(text: &str) -> Self {
        match text {
            "Coordinator" => DeviceType::Coordinator,
            "Router" => DeviceType::Router,
            "End Device" => DeviceType::EndDevice,
            _ => DeviceType::Unknown,
        }
    }

    /// Upgrade-only transition: Unknown may become concrete, a concrete
    /// type never changes. Returns whether the value moved.
    pub fn upgrade(&mut self, observed: DeviceType) -> bool {
        if *self == DeviceType::Unknown && observed != DeviceType::Unknown {
            *self = observed;
            true
        } else {
            false
        }
    }
}

impl Default for DeviceType {
    fn default() -> Self {
        DeviceType::Unknown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    pub hardware_address: String,
    /// Latest logical (short) address binding; reassignable.
    pub logical_address: Option<String>,
    pub channel: Option<i64>,
    pub device_type: DeviceType,
    pub manufacturer: Option<String>,
    pub power_source: Option<String>,
    pub link_quality: Option<String>,
    pub first_seen: i64,
    pub last_seen: i64,
    pub neighbor_set: Vec<String>,
    pub capability_map: BTreeMap<String, Value>,
    pub cluster_map: BTreeMap<String, Value>,
    pub src_network_addresses: Vec<String>,
    pub dst_network_addresses: Vec<String>,
    pub src_link_addresses: Vec<String>,
    pub dst_link_addresses: Vec<String>,
    pub protocol_version: Option<String>,
    pub associated_pan_id: Option<String>,
    /// Per-kind last-observed values backing edge-triggered detection.
    pub sticky_state: BTreeMap<String, String>,
    pub location: Option<String>,
}

impl DeviceRecord {
    pub fn new(hardware_address: &str, timestamp: i64) -> Self {
        Self {
            id: 0,
            hardware_address: hardware_address.to_string(),
            logical_address: None,
            channel: None,
            device_type: DeviceType::Unknown,
            manufacturer: None,
            power_source: None,
            link_quality: None,
            first_seen: timestamp,
            last_seen: timestamp,
            neighbor_set: Vec::new(),
            capability_map: BTreeMap::new(),
            cluster_map: BTreeMap::new(),
            src_network_addresses: Vec::new(),
            dst_network_addresses: Vec::new(),
            src_link_addresses: Vec::new(),
            dst_link_addresses: Vec::new(),
            protocol_version: None,
            associated_pan_id: None,
            sticky_state: BTreeMap::new(),
            location: None,
        }
    }

    /// last_seen is monotone: max(previous, observed).
    pub fn touch(&mut self, timestamp: i64) -> bool {
        if timestamp > self.last_seen {
            self.last_seen = timestamp;
            true
        } else {
            false
        }
    }
}

/// Idempotent set append keyed by value equality. Returns whether the
/// value was new.
pub fn set_append(set: &mut Vec<String>, value: &str) -> bool {
    if set.iter().any(|v| v == value) {
        false
    } else {
        set.push(value.to_string());
        true
    }
}
