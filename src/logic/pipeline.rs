//! Ingestion pipeline
//!
//! Single sequential path: every attribute record flows through registry
//! upsert, address binding, capability/cluster merge and detection in
//! arrival order. Sticky compare-and-update and the map merges depend on
//! that per-device ordering, so there are no parallel ingestion workers.

use std::io::BufRead;
use std::sync::Arc;

use chrono::Utc;

use crate::logic::capability;
use crate::logic::config::EngineConfig;
use crate::logic::detect::types::DetectionEvent;
use crate::logic::detect::DetectionEngine;
use crate::logic::device::binder::{self, Direction, Scope};
use crate::logic::device::registry::{self, ObservedDefaults};
use crate::logic::device::types::DeviceType;
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::keyvault::KeyVault;
use crate::logic::location::LocationProvider;
use crate::logic::record::{keys, AttributeRecord};
use crate::logic::store::DeviceStore;

/// A live record this far behind wall-clock time means the capture feed
/// has stalled; ingestion stops and an external restart is required.
const STALE_FEED_SECS: i64 = 60;

#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub records: u64,
    pub events: u64,
    pub skipped: u64,
}

pub struct Engine {
    config: EngineConfig,
    store: Arc<DeviceStore>,
    vault: KeyVault,
    detector: DetectionEngine,
    location: Box<dyn LocationProvider>,
    capture_source: String,
    live: bool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        store: Arc<DeviceStore>,
        location: Box<dyn LocationProvider>,
        capture_source: &str,
        live: bool,
    ) -> Self {
        let vault = KeyVault::new(&config.key_vault_path);
        let detector = DetectionEngine::new(&config.work_dir, config.on_unmatched_detection);
        Self {
            config,
            store,
            vault,
            detector,
            location,
            capture_source: capture_source.to_string(),
            live,
        }
    }

    /// Consume a JSONL stream of attribute records. Lines the dissector
    /// could not decode properly are logged and skipped; fatal engine
    /// errors stop the run.
    pub fn run<R: BufRead>(&self, reader: R) -> EngineResult<IngestStats> {
        let mut stats = IngestStats::default();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: AttributeRecord = match serde_json::from_str(trimmed) {
                Ok(record) => record,
                Err(e) => {
                    log::warn!("undecodable record skipped: {e}");
                    stats.skipped += 1;
                    continue;
                }
            };
            stats.records += 1;
            if self.ingest(&record)?.is_some() {
                stats.events += 1;
            }
        }
        Ok(stats)
    }

    /// Run one record through every stage. Returns the detection event if
    /// the record produced one.
    pub fn ingest(&self, record: &AttributeRecord) -> EngineResult<Option<DetectionEvent>> {
        let Some(timestamp) = record.pkt_timestamp() else {
            log::warn!(
                "{}, record skipped",
                EngineError::MissingAttribute(keys::PKT_TIMESTAMP)
            );
            return Ok(None);
        };

        if self.live {
            let lag = Utc::now().timestamp() - timestamp;
            if lag >= STALE_FEED_SECS {
                return Err(EngineError::StaleCaptureFeed { lag_secs: lag });
            }
        }

        let location = if self.config.gps_enabled {
            self.location
                .current()
                .map(|(longitude, latitude)| format!("{longitude}, {latitude}"))
        } else {
            None
        };

        // network-layer sender: full registration plus logical binding
        if let Some(hardware) = record.hardware_source() {
            let defaults = ObservedDefaults {
                timestamp,
                channel: Some(self.config.channel),
                device_type: observed_device_type(record),
                manufacturer: Some("unknown".to_string()),
                logical_address: record.get_str(keys::NWK_ADDR_SRC),
                protocol_version: record.get_str(keys::PROTOCOL_VERSION),
                power_source: observed_power_source(record),
                location: location.clone(),
            };
            registry::upsert(&self.store, &hardware, &defaults)?;
            self.bind_network_addresses(record, &hardware)?;
        }

        // link-layer sender: partial row when only WPAN fields are visible
        if let Some(hardware) = record.get_str(keys::WPAN_MAC_SRC) {
            let defaults = ObservedDefaults {
                timestamp,
                channel: Some(self.config.channel),
                device_type: observed_device_type(record),
                manufacturer: Some("unknown".to_string()),
                location: location.clone(),
                ..Default::default()
            };
            registry::upsert(&self.store, &hardware, &defaults)?;
        }

        self.bind_link_addresses(record)?;

        if record.contains(keys::NWK_ADDR_SRC) {
            capability::apply(&self.store, record)?;
        }

        if record.detection_flagged() {
            return self.detector.evaluate(
                &self.store,
                &self.vault,
                record,
                self.config.channel,
                &self.capture_source,
            );
        }
        Ok(None)
    }

    fn bind_network_addresses(
        &self,
        record: &AttributeRecord,
        hardware: &str,
    ) -> EngineResult<()> {
        let (Some(logical), Some(pan), Some(dst)) = (
            record.get_str(keys::NWK_ADDR_SRC),
            record.get_str(keys::PAN_DST),
            record.get_str(keys::NWK_ADDR_DST),
        ) else {
            log::debug!("incomplete network addressing for {hardware}, binding skipped");
            return Ok(());
        };
        match registry::bind_logical_address(&self.store, hardware, &logical, &pan) {
            Ok(id) => {
                binder::record_directional_address(
                    &self.store,
                    id,
                    Direction::Dst,
                    Scope::Network,
                    &dst,
                )?;
                Ok(())
            }
            Err(EngineError::UnknownHardwareAddress(addr)) => {
                log::warn!("binding skipped: no device registered for {addr}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Link-layer adjacency, correlated through the sender's current
    /// logical binding. A device never seen with a hardware address at
    /// this point simply does not match and is skipped.
    fn bind_link_addresses(&self, record: &AttributeRecord) -> EngineResult<()> {
        let (Some(src), Some(pan), Some(dst)) = (
            record.get_str(keys::WPAN_ADDR_SRC),
            record.get_str(keys::PAN_DST),
            record.get_str(keys::WPAN_ADDR_DST),
        ) else {
            return Ok(());
        };
        let Some(id) = self.store.device_id_by_logical(&src)? else {
            log::debug!("device with address {src} not registered yet, link adjacency skipped");
            return Ok(());
        };
        self.store.update_device(id, |rec| {
            if rec.associated_pan_id.as_deref() != Some(pan.as_str()) {
                rec.associated_pan_id = Some(pan.clone());
                true
            } else {
                false
            }
        })?;
        binder::record_directional_address(&self.store, id, Direction::Src, Scope::Link, &src)?;
        binder::record_directional_address(&self.store, id, Direction::Dst, Scope::Link, &dst)?;
        Ok(())
    }
}

fn observed_device_type(record: &AttributeRecord) -> DeviceType {
    record
        .get_str(keys::DEVICE_TYPE)
        .map(|t| DeviceType::parse(&t))
        .unwrap_or_default()
}

fn observed_power_source(record: &AttributeRecord) -> Option<String> {
    match record.get_str(keys::ZDP_CINFO_AC_POWER)?.as_str() {
        "1" => Some("Mains".to_string()),
        "0" => Some("Battery".to_string()),
        _ => None,
    }
}
