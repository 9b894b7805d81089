//! Engine configuration
//!
//! One immutable `EngineConfig` value is deserialized at startup and passed
//! by reference to every component. There is no runtime mutation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::logic::error::{EngineError, EngineResult};

/// What to do with a detection-flagged record that matches no rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedPolicy {
    /// Stop ingestion. Legacy behavior, the default.
    Abort,
    /// Log the full record and continue.
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output directory: database, detection events, periodic exports.
    pub work_dir: PathBuf,
    /// Capture channel (11-26), stamped onto every device observation.
    pub channel: i64,
    /// Periodic snapshot interval, also the trailing export window.
    pub report_period_secs: u64,
    /// FIFO/file the live record feed is read from.
    pub feed_path: PathBuf,
    /// Append-only key file consumed by the external decryption facility.
    pub key_vault_path: PathBuf,
    pub on_unmatched_detection: UnmatchedPolicy,
    /// Attach best-effort coordinates to device observations.
    pub gps_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let work_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("zigsentry");
        Self {
            key_vault_path: PathBuf::from("zigbee_pc_keys"),
            work_dir,
            channel: 11,
            report_period_secs: 300,
            feed_path: PathBuf::from("/tmp/zigsentry.fifo"),
            on_unmatched_detection: UnmatchedPolicy::Abort,
            gps_enabled: false,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file. A missing file yields the defaults; a file
    /// that exists but does not parse is fatal.
    pub fn load(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            log::info!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = fs::read(path)?;
        let config: EngineConfig = serde_json::from_slice(&data)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> EngineResult<()> {
        if !(11..=26).contains(&self.channel) {
            return Err(EngineError::Config(format!(
                "channel {} outside 11-26",
                self.channel
            )));
        }
        if self.report_period_secs == 0 {
            return Err(EngineError::Config("report_period_secs must be > 0".into()));
        }
        Ok(())
    }
}
