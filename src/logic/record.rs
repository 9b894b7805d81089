//! Attribute records
//!
//! The canonical input unit: a normalized key-value bag derived from one
//! decoded frame by the external dissection facility. Keys follow a fixed
//! vocabulary; unknown keys are carried along and ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute key vocabulary produced by the dissector.
pub mod keys {
    pub const PKT_NUMBER: &str = "pkt_number";
    pub const PKT_TIMESTAMP: &str = "pkt_timestamp";
    pub const PAN_DST: &str = "pan_dst";
    pub const WPAN_MAC_SRC: &str = "wpan_mac_src";
    pub const WPAN_ADDR_SRC: &str = "wpan_addr_src";
    pub const WPAN_ADDR_DST: &str = "wpan_addr_dst";
    pub const NWK_MAC_SRC: &str = "nwk_mac_src";
    pub const NWK_MAC_DST: &str = "nwk_mac_dst";
    pub const NWK_ADDR_SRC: &str = "nwk_addr_src";
    pub const NWK_ADDR_DST: &str = "nwk_addr_dst";
    pub const MAC_SEC_SRC: &str = "mac_sec_src";
    pub const PROTOCOL_VERSION: &str = "protocol_version";
    pub const SRC_ENDPOINT: &str = "src_endpoint";
    pub const DST_ENDPOINT: &str = "dst_endpoint";
    pub const CLUSTER: &str = "cluster";
    pub const DEVICE_TYPE: &str = "device_type";
    pub const DETECTION: &str = "detection";
    pub const LINK_KEY_SECRET: &str = "link_key_secret";
    pub const LINK_KEY_STANDARD: &str = "link_key_standard";
    pub const ZDP_NODE_LQI: &str = "zdp_node_lqi";
    pub const ZDP_NODE_DURATION: &str = "zdp_node_duration";
    pub const ZDP_NODE_STATUS: &str = "zdp_node_status";
    pub const ZDP_CINFO_AC_POWER: &str = "zdp_cinfo_ac_power";
    pub const OCCUPANCY_OCCUPIED: &str = "command_sensing_occupancy_occupied";
    pub const ONOFF_ATTR: &str = "command_onoff_attr_onoff";
    pub const ONOFF_CMD_ID: &str = "command_onoff_cmd_id";
    pub const ZONE_ALARM_1: &str = "command_zone_alarm_1";
}

/// One decoded frame's worth of attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeRecord {
    #[serde(flatten)]
    attrs: BTreeMap<String, Value>,
}

impl AttributeRecord {
    pub fn contains(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    /// String view of an attribute. Numbers are rendered in their JSON
    /// form so "0x01"-style hex strings and raw integers both compare.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.attrs.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match self.attrs.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.attrs.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn pkt_number(&self) -> Option<i64> {
        self.get_i64(keys::PKT_NUMBER)
    }

    pub fn pkt_timestamp(&self) -> Option<i64> {
        self.get_i64(keys::PKT_TIMESTAMP)
    }

    /// The dissector flags frames that carry detection-worthy fields.
    pub fn detection_flagged(&self) -> bool {
        match self.attrs.get(keys::DETECTION) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
            _ => false,
        }
    }

    /// Network-layer hardware address of the sender, falling back to the
    /// security-header source when the NWK header omits it.
    pub fn hardware_source(&self) -> Option<String> {
        self.get_str(keys::NWK_MAC_SRC)
            .or_else(|| self.get_str(keys::MAC_SEC_SRC))
    }
}
