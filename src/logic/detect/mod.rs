//! Detection engine
//!
//! Classifies detection-flagged records against the ordered rule table and
//! emits at most one event per genuine state change. Sticky kinds gate the
//! stateful rules; key material always reaches the vault and always emits.

pub mod rules;
pub mod sticky;
pub mod types;

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::logic::artifacts;
use crate::logic::config::UnmatchedPolicy;
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::keyvault::KeyVault;
use crate::logic::record::{keys, AttributeRecord};
use crate::logic::store::DeviceStore;
use rules::{decode, RuleKind, BUTTON_COMMANDS, DETECTION_RULES, ZONE_STATES};
use sticky::StickyOutcome;
use types::{capture_session_id, DetectionEvent};

pub struct DetectionEngine {
    events_dir: PathBuf,
    unmatched_policy: UnmatchedPolicy,
}

impl DetectionEngine {
    pub fn new(events_dir: &Path, unmatched_policy: UnmatchedPolicy) -> Self {
        Self {
            events_dir: events_dir.to_path_buf(),
            unmatched_policy,
        }
    }

    /// Run one flagged record through the rule table. Returns the emitted
    /// event, or None when the observation was suppressed or skipped.
    pub fn evaluate(
        &self,
        store: &DeviceStore,
        vault: &KeyVault,
        record: &AttributeRecord,
        channel: i64,
        capture_source: &str,
    ) -> EngineResult<Option<DetectionEvent>> {
        let Some(device_address) = record.get_str(keys::NWK_ADDR_SRC) else {
            log::warn!(
                "{}, detection stage skipped",
                EngineError::MissingAttribute(keys::NWK_ADDR_SRC)
            );
            return Ok(None);
        };

        let Some(rule) = DETECTION_RULES
            .iter()
            .find(|rule| record.contains(rule.trigger))
        else {
            return self.handle_unmatched(record);
        };

        let base = DetectionEvent {
            session_id: capture_session_id(),
            pan_id: record.get_str(keys::PAN_DST),
            pkt_number: record.pkt_number(),
            timestamp: record
                .pkt_timestamp()
                .unwrap_or_else(|| Utc::now().timestamp()),
            channel,
            device_address: device_address.clone(),
            detection: rule.label.to_string(),
            action: None,
            network_key_secret: None,
            capture_source: capture_source.to_string(),
        };

        // trigger presence was just checked; values that are not string-like
        // stringify through the record accessor
        let Some(raw) = record.get_str(rule.trigger) else {
            log::warn!("{}, detection stage skipped", EngineError::MissingAttribute(rule.trigger));
            return Ok(None);
        };

        let event = match rule.kind {
            RuleKind::KeyMaterial => {
                let event = base.with_key(&raw);
                self.emit(&event)?;
                // vault dedup is the only dedup for keys
                vault.add_key(&raw)?;
                Some(event)
            }
            RuleKind::StickyToggle {
                decode: table,
                fallback,
                endpoint_scoped,
            } => {
                let Some(device) = store.device_id_by_logical(&device_address)? else {
                    log::debug!("no device row for {device_address}, detection skipped");
                    return Ok(None);
                };
                let kind = if endpoint_scoped {
                    match record.get_str(keys::SRC_ENDPOINT) {
                        Some(endpoint) => format!("{}_{}", rule.trigger, endpoint),
                        None => rule.trigger.to_string(),
                    }
                } else {
                    rule.trigger.to_string()
                };
                match sticky::observe(store, device, &kind, &raw)? {
                    StickyOutcome::Suppress => None,
                    StickyOutcome::Emit => {
                        let event = base.with_action(&decode(table, &raw, fallback));
                        self.emit(&event)?;
                        Some(event)
                    }
                }
            }
            RuleKind::ButtonPress => {
                let command = decode(BUTTON_COMMANDS, &raw, &format!("Unk Cmd {raw}"));
                let endpoint = record
                    .get_str(keys::SRC_ENDPOINT)
                    .unwrap_or_else(|| "unknown".to_string());
                let event = base.with_action(&format!("Cmd ID: {command} Endp ID: {endpoint}"));
                self.emit(&event)?;
                Some(event)
            }
            RuleKind::ZoneStatus => {
                let Some(device) = store.device_id_by_logical(&device_address)? else {
                    log::debug!("no device row for {device_address}, detection skipped");
                    return Ok(None);
                };
                match sticky::observe(store, device, rule.trigger, &raw)? {
                    StickyOutcome::Suppress => None,
                    StickyOutcome::Emit => {
                        let event = if record.get_str(keys::CLUSTER).as_deref() == Some("0x0500") {
                            base.with_action(&decode(ZONE_STATES, &raw, "Unknown"))
                        } else {
                            let mut event = base;
                            event.detection =
                                "Unknown cluster with command_zone_alarm_1".to_string();
                            event.with_action(&serde_json::to_string(record)?)
                        };
                        self.emit(&event)?;
                        Some(event)
                    }
                }
            }
        };
        Ok(event)
    }

    fn handle_unmatched(&self, record: &AttributeRecord) -> EngineResult<Option<DetectionEvent>> {
        let dump = serde_json::to_string(record)?;
        match self.unmatched_policy {
            UnmatchedPolicy::Abort => {
                log::error!("detection not handled: {dump}");
                Err(EngineError::UnrecognizedDetection(record.pkt_number()))
            }
            UnmatchedPolicy::Skip => {
                log::warn!("detection not handled, skipping: {dump}");
                Ok(None)
            }
        }
    }

    fn emit(&self, event: &DetectionEvent) -> EngineResult<()> {
        let path = artifacts::write_event(&self.events_dir, event)?;
        log::info!(
            "detection event for {}: {} -> {}",
            event.device_address,
            event.detection,
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests;
