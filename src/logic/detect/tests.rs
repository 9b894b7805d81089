use std::fs;

use serde_json::{json, Value};
use tempfile::tempdir;

use super::types::DetectionEvent;
use super::DetectionEngine;
use crate::logic::config::UnmatchedPolicy;
use crate::logic::device::registry::{bind_logical_address, upsert, ObservedDefaults};
use crate::logic::error::EngineError;
use crate::logic::keyvault::KeyVault;
use crate::logic::record::AttributeRecord;
use crate::logic::store::DeviceStore;

struct Fixture {
    _dir: tempfile::TempDir,
    store: DeviceStore,
    vault: KeyVault,
    engine: DetectionEngine,
    events_dir: std::path::PathBuf,
}

fn fixture(policy: UnmatchedPolicy) -> Fixture {
    let dir = tempdir().unwrap();
    let store = DeviceStore::open(&dir.path().join("devices.db")).unwrap();
    let vault = KeyVault::new(&dir.path().join("zigbee_pc_keys"));
    let events_dir = dir.path().join("events");
    let engine = DetectionEngine::new(&events_dir, policy);
    Fixture {
        _dir: dir,
        store,
        vault,
        engine,
        events_dir,
    }
}

fn register(f: &Fixture, hw: &str, logical: &str) {
    upsert(
        &f.store,
        hw,
        &ObservedDefaults {
            timestamp: 1000,
            ..Default::default()
        },
    )
    .unwrap();
    bind_logical_address(&f.store, hw, logical, "0x1a62").unwrap();
}

fn record(v: Value) -> AttributeRecord {
    serde_json::from_value(v).unwrap()
}

fn evaluate(f: &Fixture, v: Value) -> Option<DetectionEvent> {
    f.engine
        .evaluate(&f.store, &f.vault, &record(v), 15, "capture.jsonl")
        .unwrap()
}

#[test]
fn test_occupancy_emits_then_suppresses() {
    let f = fixture(UnmatchedPolicy::Abort);
    register(&f, "AA:BB:CC:DD:EE:01", "0x4522");

    let body = json!({
        "pkt_number": 5,
        "pkt_timestamp": 1700000000,
        "pan_dst": "0x1a62",
        "nwk_addr_src": "0x4522",
        "command_sensing_occupancy_occupied": "0x01",
        "detection": 1
    });

    let event = evaluate(&f, body.clone()).expect("first observation emits");
    assert_eq!(event.detection, "Motion sensor detected occupancy");
    assert_eq!(event.action.as_deref(), Some("yes"));
    assert_eq!(event.device_address, "0x4522");
    assert_eq!(fs::read_dir(&f.events_dir).unwrap().count(), 1);

    // identical repeat is suppressed, no second artifact
    assert!(evaluate(&f, body).is_none());
    assert_eq!(fs::read_dir(&f.events_dir).unwrap().count(), 1);
}

#[test]
fn test_occupancy_transition_emits_again() {
    let f = fixture(UnmatchedPolicy::Abort);
    register(&f, "AA:BB:CC:DD:EE:01", "0x4522");

    let mk = |value: &str| {
        json!({
            "pkt_timestamp": 1700000000,
            "nwk_addr_src": "0x4522",
            "command_sensing_occupancy_occupied": value,
            "detection": 1
        })
    };
    assert!(evaluate(&f, mk("0x00")).is_some());
    assert!(evaluate(&f, mk("0x00")).is_none());
    let event = evaluate(&f, mk("0x01")).expect("transition emits");
    assert_eq!(event.action.as_deref(), Some("yes"));
}

#[test]
fn test_switch_state_tracked_per_endpoint() {
    let f = fixture(UnmatchedPolicy::Abort);
    register(&f, "AA:BB:CC:DD:EE:02", "0x0100");

    let mk = |endpoint: &str| {
        json!({
            "pkt_timestamp": 1700000000,
            "nwk_addr_src": "0x0100",
            "src_endpoint": endpoint,
            "command_onoff_attr_onoff": "0x01",
            "detection": 1
        })
    };
    let event = evaluate(&f, mk("0x0b")).expect("endpoint 0x0b first sight");
    assert_eq!(event.detection, "A switch request was triggered");
    assert_eq!(event.action.as_deref(), Some("On"));

    assert!(evaluate(&f, mk("0x0b")).is_none());
    // same capability on a different endpoint is independent
    assert!(evaluate(&f, mk("0x0c")).is_some());
}

#[test]
fn test_key_discovery_unconditional_and_vault_backed() {
    let f = fixture(UnmatchedPolicy::Abort);
    register(&f, "AA:BB:CC:DD:EE:03", "0x0000");
    let key = "11:22:33:44:55:66:77:88:99:aa:bb:cc:dd:ee:ff:00";

    let body = json!({
        "pkt_timestamp": 1700000000,
        "pan_dst": "0x1a62",
        "nwk_addr_src": "0x0000",
        "link_key_secret": key,
        "detection": 1
    });

    let event = evaluate(&f, body.clone()).expect("key discovery emits");
    assert_eq!(event.detection, "Network Transport Key has been found");
    assert_eq!(event.network_key_secret.as_deref(), Some(key));

    // sticky state never gates key material: the repeat emits again
    let event = evaluate(&f, body).expect("repeat still emits");
    assert_eq!(event.detection, "Network Transport Key has been found");

    // while the vault holds exactly one entry
    let contents = fs::read_to_string(f.vault.path()).unwrap();
    assert_eq!(contents.lines().filter(|l| l.contains(key)).count(), 1);
}

#[test]
fn test_key_rule_outranks_occupancy() {
    let f = fixture(UnmatchedPolicy::Abort);
    register(&f, "AA:BB:CC:DD:EE:04", "0x0200");

    let event = evaluate(
        &f,
        json!({
            "pkt_timestamp": 1700000000,
            "nwk_addr_src": "0x0200",
            "link_key_standard": "00:11:22:33:44:55:66:77:88:99:aa:bb:cc:dd:ee:ff",
            "command_sensing_occupancy_occupied": "0x01",
            "detection": 1
        }),
    )
    .unwrap();
    assert_eq!(event.detection, "Network Link Key has been found");
}

#[test]
fn test_button_press_emits_every_time() {
    let f = fixture(UnmatchedPolicy::Abort);
    register(&f, "AA:BB:CC:DD:EE:05", "0x0300");

    let body = json!({
        "pkt_timestamp": 1700000000,
        "nwk_addr_src": "0x0300",
        "src_endpoint": "0x01",
        "command_onoff_cmd_id": "0x42",
        "detection": 1
    });
    let event = evaluate(&f, body.clone()).unwrap();
    assert_eq!(event.detection, "A Button was triggered");
    assert_eq!(
        event.action.as_deref(),
        Some("Cmd ID: On with timed Off Endp ID: 0x01")
    );
    // no sticky gate on button presses
    assert!(evaluate(&f, body).is_some());
}

#[test]
fn test_zone_alarm_decodes_for_alarm_cluster() {
    let f = fixture(UnmatchedPolicy::Abort);
    register(&f, "AA:BB:CC:DD:EE:06", "0x0400");

    let mk = |value: &str| {
        json!({
            "pkt_timestamp": 1700000000,
            "nwk_addr_src": "0x0400",
            "cluster": "0x0500",
            "command_zone_alarm_1": value,
            "detection": 1
        })
    };
    let event = evaluate(&f, mk("1")).unwrap();
    assert_eq!(event.detection, "Zone sensor status");
    assert_eq!(event.action.as_deref(), Some("Open/Alarm"));

    assert!(evaluate(&f, mk("1")).is_none());
    let event = evaluate(&f, mk("0")).unwrap();
    assert_eq!(event.action.as_deref(), Some("Closed/Safe"));
}

#[test]
fn test_zone_alarm_unknown_cluster_reports_record() {
    let f = fixture(UnmatchedPolicy::Abort);
    register(&f, "AA:BB:CC:DD:EE:07", "0x0500");

    let event = evaluate(
        &f,
        json!({
            "pkt_timestamp": 1700000000,
            "nwk_addr_src": "0x0500",
            "cluster": "0x0700",
            "command_zone_alarm_1": "1",
            "detection": 1
        }),
    )
    .unwrap();
    assert_eq!(event.detection, "Unknown cluster with command_zone_alarm_1");
    assert!(event.action.unwrap().contains("command_zone_alarm_1"));
}

#[test]
fn test_unmatched_policy_abort_and_skip() {
    let body = json!({
        "pkt_number": 9,
        "pkt_timestamp": 1700000000,
        "nwk_addr_src": "0x0600",
        "detection": 1
    });

    let f = fixture(UnmatchedPolicy::Abort);
    register(&f, "AA:BB:CC:DD:EE:08", "0x0600");
    let err = f
        .engine
        .evaluate(&f.store, &f.vault, &record(body.clone()), 15, "live")
        .unwrap_err();
    assert!(matches!(err, EngineError::UnrecognizedDetection(Some(9))));

    let f = fixture(UnmatchedPolicy::Skip);
    register(&f, "AA:BB:CC:DD:EE:08", "0x0600");
    assert!(evaluate(&f, body).is_none());
}

#[test]
fn test_sticky_rule_without_device_row_is_skipped() {
    let f = fixture(UnmatchedPolicy::Abort);
    // no device registered for this logical address
    assert!(evaluate(
        &f,
        json!({
            "pkt_timestamp": 1700000000,
            "nwk_addr_src": "0x7777",
            "command_sensing_occupancy_occupied": "0x01",
            "detection": 1
        })
    )
    .is_none());
}
