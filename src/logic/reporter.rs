//! Periodic snapshot reporter
//!
//! Time-windowed export of devices touched within the trailing interval.
//! Runs on its own thread; per-device transactions on the store guarantee
//! it never sees a half-applied mutation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;

use crate::logic::artifacts;
use crate::logic::error::EngineResult;
use crate::logic::store::DeviceStore;

pub fn start(store: Arc<DeviceStore>, work_dir: PathBuf, period_secs: u64) {
    thread::spawn(move || {
        log::info!("snapshot reporter started (period {period_secs}s)");
        loop {
            thread::sleep(Duration::from_secs(period_secs));
            match export_window(&store, &work_dir, period_secs) {
                Ok(0) => {}
                Ok(count) => log::info!("exported {count} device snapshots"),
                Err(e) => log::error!("snapshot export failed: {e}"),
            }
        }
    });
}

/// Export every device seen within the trailing window, one file each.
pub fn export_window(store: &DeviceStore, dir: &Path, window_secs: u64) -> EngineResult<usize> {
    export_at(store, dir, Utc::now().timestamp(), window_secs)
}

fn export_at(store: &DeviceStore, dir: &Path, now: i64, window_secs: u64) -> EngineResult<usize> {
    let devices = store.devices_seen_since(now - window_secs as i64)?;
    for device in &devices {
        let snapshot = serde_json::to_string(device)?;
        artifacts::write_device_snapshot(dir, now, &snapshot)?;
    }
    Ok(devices.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::device::registry::{upsert, ObservedDefaults};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_export_only_devices_in_window() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::open(&dir.path().join("devices.db")).unwrap();
        let export_dir = dir.path().join("exports");

        let defaults = |ts| ObservedDefaults {
            timestamp: ts,
            ..Default::default()
        };
        upsert(&store, "aa:aa", &defaults(900)).unwrap();
        upsert(&store, "bb:bb", &defaults(950)).unwrap();
        upsert(&store, "cc:cc", &defaults(100)).unwrap(); // outside the window

        let count = export_at(&store, &export_dir, 1000, 300).unwrap();
        assert_eq!(count, 2);
        assert_eq!(fs::read_dir(&export_dir).unwrap().count(), 2);
    }

    #[test]
    fn test_exported_snapshot_is_valid_json() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::open(&dir.path().join("devices.db")).unwrap();
        let export_dir = dir.path().join("exports");
        upsert(
            &store,
            "aa:aa",
            &ObservedDefaults {
                timestamp: 990,
                ..Default::default()
            },
        )
        .unwrap();

        export_at(&store, &export_dir, 1000, 60).unwrap();
        let entry = fs::read_dir(&export_dir).unwrap().next().unwrap().unwrap();
        let body = fs::read_to_string(entry.path()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["hardware_address"], "aa:aa");
    }

    #[test]
    fn test_empty_window_exports_nothing() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::open(&dir.path().join("devices.db")).unwrap();
        let export_dir = dir.path().join("exports");
        let count = export_at(&store, &export_dir, 1000, 300).unwrap();
        assert_eq!(count, 0);
        assert!(!export_dir.exists() || fs::read_dir(&export_dir).unwrap().count() == 0);
    }
}
