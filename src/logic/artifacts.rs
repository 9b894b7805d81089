//! Artifact writers
//!
//! Detection events and periodic device exports each land in their own
//! file, named by a SHA-256 content hash so names are collision-resistant
//! and re-emission of identical content is harmless.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::logic::detect::types::DetectionEvent;
use crate::logic::error::EngineResult;

/// One file per detection event, named by the hash of the event body.
pub fn write_event(dir: &Path, event: &DetectionEvent) -> EngineResult<PathBuf> {
    let body = serde_json::to_string(event)?;
    let digest = Sha256::digest(body.as_bytes());
    let path = dir.join(format!("detection-{}.json", hex::encode(digest)));
    fs::create_dir_all(dir)?;
    fs::write(&path, body)?;
    Ok(path)
}

/// One file per exported device per interval, named by the hash of
/// (export time, device snapshot).
pub fn write_device_snapshot(
    dir: &Path,
    exported_at: i64,
    snapshot_json: &str,
) -> EngineResult<PathBuf> {
    let mut hasher = Sha256::new();
    hasher.update(exported_at.to_string().as_bytes());
    hasher.update(snapshot_json.as_bytes());
    let path = dir.join(format!("export-{}.json", hex::encode(hasher.finalize())));
    fs::create_dir_all(dir)?;
    fs::write(&path, snapshot_json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::detect::types::DetectionEvent;
    use tempfile::tempdir;

    #[test]
    fn test_event_file_named_by_content() {
        let dir = tempdir().unwrap();
        let event = DetectionEvent {
            session_id: "s".to_string(),
            pan_id: Some("0x1a62".to_string()),
            pkt_number: Some(12),
            timestamp: 1700000000,
            channel: 15,
            device_address: "0x4522".to_string(),
            detection: "A switch request was triggered".to_string(),
            action: Some("On".to_string()),
            network_key_secret: None,
            capture_source: "capture.jsonl".to_string(),
        };

        let first = write_event(dir.path(), &event).unwrap();
        let second = write_event(dir.path(), &event).unwrap();
        // identical body, identical name
        assert_eq!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        let mut other = event.clone();
        other.action = Some("Off".to_string());
        let third = write_event(dir.path(), &other).unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn test_snapshot_name_includes_export_time() {
        let dir = tempdir().unwrap();
        let a = write_device_snapshot(dir.path(), 100, "{\"id\":1}").unwrap();
        let b = write_device_snapshot(dir.path(), 200, "{\"id\":1}").unwrap();
        assert_ne!(a, b);
    }
}
