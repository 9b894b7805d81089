//! Capability/cluster merger
//!
//! Folds the per-record attribute subset into the device's cumulative
//! capability and cluster maps. Classification is table-driven
//! (`tables.rs`); merging is per-key last-write-wins and entries are never
//! removed.

pub mod tables;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::logic::device::types::{set_append, DeviceType};
use crate::logic::error::EngineResult;
use crate::logic::record::{keys, AttributeRecord};
use crate::logic::store::DeviceStore;
use tables::{MapFallback, Transform, CAPABILITY_RULES};

/// Result of classifying one record against the capability table.
#[derive(Debug, Default)]
pub struct CapabilityUpdates {
    pub entries: BTreeMap<String, Value>,
    pub device_type: Option<DeviceType>,
}

/// Run the record through the capability table. Unrecognized attribute
/// keys are silently ignored; recognized keys with unusable values are
/// skipped.
pub fn classify(record: &AttributeRecord) -> CapabilityUpdates {
    let mut updates = CapabilityUpdates::default();
    for rule in CAPABILITY_RULES.iter() {
        if !record.contains(rule.attribute) {
            continue;
        }
        let value = match rule.transform {
            Transform::Scale(divisor) => record
                .get_f64(rule.attribute)
                .map(|v| Value::from(v / divisor)),
            Transform::Integer => record.get_i64(rule.attribute).map(Value::from),
            Transform::Text => record.get_str(rule.attribute).map(Value::from),
            Transform::Map { table, fallback } => record.get_str(rule.attribute).map(|raw| {
                let decoded = table
                    .iter()
                    .find(|(wire, _)| *wire == raw)
                    .map(|(_, label)| label.to_string());
                match (decoded, fallback) {
                    (Some(label), _) => Value::from(label),
                    (None, MapFallback::Literal(label)) => Value::from(label),
                    (None, MapFallback::Raw) => Value::from(raw),
                }
            }),
        };
        let Some(value) = value else {
            log::debug!("attribute {} present but not usable", rule.attribute);
            continue;
        };
        updates.entries.insert(rule.capability.to_string(), value);
        if rule.device_type.is_some() {
            updates.device_type = rule.device_type;
        }
    }
    updates
}

/// Fixed cluster-id lookup with total coverage: every code yields at least
/// one entry, unknown codes synthesize one labeled by the raw code.
pub fn classify_cluster(code: &str, record: &AttributeRecord) -> Vec<(String, Value)> {
    let entry = |k: &str, v: &str| (k.to_string(), Value::from(v));
    match code {
        "0x0000" => vec![entry(
            "Cluster_Basic",
            "Device communicates basic attributes and configurations",
        )],
        "0x0001" => vec![entry("Cluster_Power_Configuration", "Device is battery powered")],
        "0x0005" => vec![entry("Cluster_Scenes", "Device has pre/user -defined scenes")],
        "0x0006" => {
            let endpoint = record
                .get_str(keys::DST_ENDPOINT)
                .unwrap_or_else(|| "unknown".to_string());
            vec![
                entry("Cluster_switch-button", "On-Off"),
                (
                    format!("Endpoint-Button/Endpoint_id_{endpoint}"),
                    Value::from(endpoint),
                ),
            ]
        }
        "0x0008" => vec![entry("Cluster_Level_Control", "Unknown")],
        "0x000a" => vec![entry("Cluster_Time", "Syncs time with RTC/Server")],
        "0x0012" => vec![entry("Cluster_Multistate_input", "Multistate_input")],
        "0x0013" => vec![entry("Cluster_Multistate_output", "Multistate_output")],
        "0x0019" => vec![entry(
            "Cluster_OTA_Upgrade",
            "Supports OTA firmware upgrade/downgrade/mod",
        )],
        "0x0036" => {
            let duration = record
                .get_str(keys::ZDP_NODE_DURATION)
                .unwrap_or_else(|| "unknown".to_string());
            vec![("Cluster_Network_Join_Enabled".to_string(), Value::from(duration))]
        }
        "0x0101" => vec![entry("Cluster_Status", "Door Lock (vibr det)")],
        "0x0300" => vec![entry("Cluster_Color_Ctrl", "Manages colors")],
        "0x0400" => vec![entry("Cluster_Illuminance_Measurement", "Measures light")],
        "0x0402" => vec![entry("Cluster_Temperature_Measurement", "Measures Temperatures")],
        "0x0403" => vec![entry("Cluster_Pressure_Measurement", "Measures pressure (pro Air)")],
        "0x0405" => vec![entry("Cluster_Humidity_Measurement", "Measures air humidity")],
        "0x0406" => vec![entry("Cluster_Occupancy_Detection", "Measure movement/occupancy")],
        "0x0500" => vec![entry("Cluster_Alarm_Zone", "Intruder Alarm Zone")],
        "0x0702" => vec![entry(
            "Cluster_Simple_Metering",
            "Measures stuff (electric, gas, water or thermal)",
        )],
        "0x8000" => match record.get_i64(keys::ZDP_NODE_STATUS) {
            Some(0) => vec![entry("Cluster_Network_Address_Response", "Success")],
            Some(1) => vec![entry("Cluster_Network_Address_Response", "Failed")],
            Some(status) => vec![(
                "Cluster_Network_Address_Response".to_string(),
                Value::from(format!("Status {status}")),
            )],
            None => vec![entry("Cluster_0x8000", "Network Address Response")],
        },
        "0x8006" => vec![entry("Cluster_Status", "Group Cluster Member")],
        "0x0b04" => vec![entry(
            "Cluster_Electrical_Measurement",
            "Measures its or a devices electrical usage",
        )],
        _ => vec![(format!("Cluster_{code}"), Value::from(code))],
    }
}

/// Per-key last-write-wins merge. An empty update map is a no-op and must
/// not cause a persistence write, so the changed flag stays false.
pub fn merge(existing: &mut BTreeMap<String, Value>, updates: BTreeMap<String, Value>) -> bool {
    if updates.is_empty() {
        return false;
    }
    for (key, value) in updates {
        existing.insert(key, value);
    }
    true
}

/// The full merger stage for one record: correlate by the sender's current
/// logical address, then fold in device type, neighbor, link quality,
/// capabilities and clusters in a single device transaction.
pub fn apply(store: &DeviceStore, record: &AttributeRecord) -> EngineResult<bool> {
    let Some(logical) = record.get_str(keys::NWK_ADDR_SRC) else {
        return Ok(false);
    };
    let Some(id) = store.device_id_by_logical(&logical)? else {
        log::debug!("device with address {logical} not registered yet, skipping merge");
        return Ok(false);
    };

    let capability = classify(record);
    let cluster_updates: BTreeMap<String, Value> = record
        .get_str(keys::CLUSTER)
        .map(|code| classify_cluster(&code, record).into_iter().collect())
        .unwrap_or_default();
    let observed_type = record
        .get_str(keys::DEVICE_TYPE)
        .map(|t| DeviceType::parse(&t))
        .unwrap_or(DeviceType::Unknown);
    let timestamp = record.pkt_timestamp();

    store.update_device(id, |rec| {
        let mut changed = rec.device_type.upgrade(observed_type);
        if let Some(inferred) = capability.device_type {
            changed |= rec.device_type.upgrade(inferred);
        }
        if let Some(peer) = record.get_str(keys::NWK_MAC_DST) {
            changed |= set_append(&mut rec.neighbor_set, &peer);
        }
        if let Some(lqi) = record.get_str(keys::ZDP_NODE_LQI) {
            if rec.link_quality.as_deref() != Some(lqi.as_str()) {
                rec.link_quality = Some(lqi);
                changed = true;
            }
        }
        changed |= merge(&mut rec.capability_map, capability.entries);
        changed |= merge(&mut rec.cluster_map, cluster_updates);
        if changed {
            if let Some(ts) = timestamp {
                rec.touch(ts);
            }
        }
        changed
    })
}

#[cfg(test)]
mod tests;
