use std::collections::BTreeMap;

use serde_json::{json, Value};
use tempfile::tempdir;

use super::{apply, classify, classify_cluster, merge};
use crate::logic::device::registry::{bind_logical_address, upsert, ObservedDefaults};
use crate::logic::device::types::DeviceType;
use crate::logic::record::AttributeRecord;
use crate::logic::store::DeviceStore;

fn record(v: Value) -> AttributeRecord {
    serde_json::from_value(v).unwrap()
}

#[test]
fn test_classify_scales_temperature() {
    let updates = classify(&record(json!({
        "command_temperature_measured": 2150
    })));
    assert_eq!(
        updates.entries.get("Measure Temperature"),
        Some(&Value::from(21.5))
    );
    assert_eq!(updates.device_type, None);
}

#[test]
fn test_classify_decodes_and_infers_device_type() {
    let updates = classify(&record(json!({
        "command_battery_percentage": 150,
        "command_battery_status": "1"
    })));
    assert_eq!(
        updates.entries.get("Battery Percentage"),
        Some(&Value::from(75.0))
    );
    assert_eq!(updates.entries.get("Battery Status"), Some(&Value::from("Ok")));
    assert_eq!(updates.device_type, Some(DeviceType::EndDevice));
}

#[test]
fn test_classify_onoff_fallback_literal() {
    let updates = classify(&record(json!({"command_onoff_attr_onoff": "0x7e"})));
    assert_eq!(
        updates.entries.get("On/Off Switch"),
        Some(&Value::from("unknown"))
    );
}

#[test]
fn test_classify_ignores_unrecognized_keys() {
    let updates = classify(&record(json!({
        "radius": "30",
        "zcl_type": "0x01",
        "made_up_attribute": 7
    })));
    assert!(updates.entries.is_empty());
}

#[test]
fn test_cluster_table_known_codes() {
    let rec = record(json!({}));
    let entries = classify_cluster("0x0402", &rec);
    assert_eq!(entries[0].0, "Cluster_Temperature_Measurement");

    let entries = classify_cluster("0x0500", &rec);
    assert_eq!(entries[0].0, "Cluster_Alarm_Zone");
}

#[test]
fn test_cluster_total_coverage() {
    // any code, including ones absent from the fixed table, yields an entry
    let rec = record(json!({}));
    for code in ["0x0000", "0x0006", "0x8000", "0xbeef", "garbage"] {
        let entries = classify_cluster(code, &rec);
        assert!(!entries.is_empty(), "no entry for {code}");
    }
    let entries = classify_cluster("0xbeef", &rec);
    assert_eq!(entries[0], ("Cluster_0xbeef".to_string(), Value::from("0xbeef")));
}

#[test]
fn test_cluster_switch_records_endpoint() {
    let entries = classify_cluster("0x0006", &record(json!({"dst_endpoint": "0x0b"})));
    assert!(entries
        .iter()
        .any(|(k, v)| k == "Endpoint-Button/Endpoint_id_0x0b" && *v == Value::from("0x0b")));
}

#[test]
fn test_merge_last_write_wins_and_empty_noop() {
    let mut map = BTreeMap::new();
    map.insert("Battery Status".to_string(), Value::from("Bad"));

    assert!(!merge(&mut map, BTreeMap::new()));

    let mut updates = BTreeMap::new();
    updates.insert("Battery Status".to_string(), Value::from("Ok"));
    assert!(merge(&mut map, updates.clone()));
    assert_eq!(map.get("Battery Status"), Some(&Value::from("Ok")));

    // merging the same updates twice equals merging them once
    merge(&mut map, updates);
    assert_eq!(map.len(), 1);
    assert_eq!(map.get("Battery Status"), Some(&Value::from("Ok")));
}

#[test]
fn test_apply_scenario_temperature() {
    let dir = tempdir().unwrap();
    let store = DeviceStore::open(&dir.path().join("devices.db")).unwrap();
    let hw = "AA:BB:CC:DD:EE:01";
    upsert(
        &store,
        hw,
        &ObservedDefaults {
            timestamp: 1000,
            ..Default::default()
        },
    )
    .unwrap();
    let id = bind_logical_address(&store, hw, "0x4522", "0x1a62").unwrap();

    let changed = apply(
        &store,
        &record(json!({
            "pkt_timestamp": 1050,
            "nwk_addr_src": "0x4522",
            "cluster": "0x0402",
            "command_temperature_measured": 2150
        })),
    )
    .unwrap();
    assert!(changed);

    let rec = store.load_device(id).unwrap();
    assert_eq!(
        rec.capability_map.get("Measure Temperature"),
        Some(&Value::from(21.5))
    );
    assert!(rec.cluster_map.contains_key("Cluster_Temperature_Measurement"));
    assert_eq!(rec.last_seen, 1050);
}

#[test]
fn test_apply_unknown_logical_is_skipped() {
    let dir = tempdir().unwrap();
    let store = DeviceStore::open(&dir.path().join("devices.db")).unwrap();
    let changed = apply(
        &store,
        &record(json!({"nwk_addr_src": "0x9999", "cluster": "0x0006"})),
    )
    .unwrap();
    assert!(!changed);
}

#[test]
fn test_apply_without_updates_writes_nothing() {
    let dir = tempdir().unwrap();
    let store = DeviceStore::open(&dir.path().join("devices.db")).unwrap();
    let hw = "AA:BB:CC:DD:EE:02";
    upsert(
        &store,
        hw,
        &ObservedDefaults {
            timestamp: 1000,
            ..Default::default()
        },
    )
    .unwrap();
    let id = bind_logical_address(&store, hw, "0x0100", "0x1a62").unwrap();

    // record carries nothing the merger recognizes
    let changed = apply(
        &store,
        &record(json!({"pkt_timestamp": 2000, "nwk_addr_src": "0x0100", "radius": "30"})),
    )
    .unwrap();
    assert!(!changed);
    // last_seen untouched because no write happened
    assert_eq!(store.load_device(id).unwrap().last_seen, 1000);
}
