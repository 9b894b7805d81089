//! Device registry
//!
//! Upsert-by-hardware-address and logical-address binding. A row is created
//! the first time a hardware address is seen (network layer or link layer);
//! after that every sighting only merges knowledge in.

use crate::logic::device::types::{set_append, DeviceId, DeviceRecord, DeviceType};
use crate::logic::error::{EngineError, EngineResult};
use crate::logic::store::DeviceStore;

/// Non-conflicting fields observed alongside a hardware address. Merged
/// into an existing row only where the row has no value yet (device_type
/// upgrades, location follows the latest fix).
#[derive(Debug, Clone, Default)]
pub struct ObservedDefaults {
    pub timestamp: i64,
    pub channel: Option<i64>,
    pub device_type: DeviceType,
    pub manufacturer: Option<String>,
    pub logical_address: Option<String>,
    pub protocol_version: Option<String>,
    pub power_source: Option<String>,
    pub location: Option<String>,
}

impl ObservedDefaults {
    /// A sender holding logical address 0x0000 or 0x0001 is the PAN
    /// coordinator regardless of what the frame itself suggested.
    fn effective_device_type(&self) -> DeviceType {
        match self.logical_address.as_deref() {
            Some("0x0000") | Some("0x0001") => DeviceType::Coordinator,
            _ => self.device_type,
        }
    }
}

/// Create on first sight (first_seen = last_seen = observation time),
/// otherwise merge defaults and advance last_seen.
pub fn upsert(
    store: &DeviceStore,
    hardware_address: &str,
    defaults: &ObservedDefaults,
) -> EngineResult<DeviceId> {
    let observed_type = defaults.effective_device_type();

    if let Some(id) = store.device_id(hardware_address)? {
        store.update_device(id, |rec| {
            let mut changed = rec.touch(defaults.timestamp);
            changed |= rec.device_type.upgrade(observed_type);
            changed |= merge_missing(&mut rec.channel, defaults.channel);
            changed |= merge_missing(&mut rec.manufacturer, defaults.manufacturer.clone());
            changed |= merge_missing(&mut rec.protocol_version, defaults.protocol_version.clone());
            changed |= merge_missing(&mut rec.power_source, defaults.power_source.clone());
            if let Some(location) = &defaults.location {
                if rec.location.as_deref() != Some(location) {
                    rec.location = Some(location.clone());
                    changed = true;
                }
            }
            changed
        })?;
        return Ok(id);
    }

    let mut rec = DeviceRecord::new(hardware_address, defaults.timestamp);
    rec.channel = defaults.channel;
    rec.device_type = observed_type;
    rec.manufacturer = defaults.manufacturer.clone();
    rec.protocol_version = defaults.protocol_version.clone();
    rec.power_source = defaults.power_source.clone();
    rec.location = defaults.location.clone();
    if let Some(logical) = &defaults.logical_address {
        rec.logical_address = Some(logical.clone());
        set_append(&mut rec.src_network_addresses, logical);
    }
    let id = store.insert_device(&rec)?;
    log::info!(
        "registered device {} ({}) as #{}",
        hardware_address,
        rec.device_type.as_str(),
        id
    );
    Ok(id)
}

/// Rebind the logical (short) address and associated PAN. Latest binding
/// wins. Unknown hardware addresses are an error for the caller to log
/// and skip.
pub fn bind_logical_address(
    store: &DeviceStore,
    hardware_address: &str,
    logical_address: &str,
    pan_id: &str,
) -> EngineResult<DeviceId> {
    let id = store
        .device_id(hardware_address)?
        .ok_or_else(|| EngineError::UnknownHardwareAddress(hardware_address.to_string()))?;
    store.update_device(id, |rec| {
        let mut changed = false;
        if rec.logical_address.as_deref() != Some(logical_address) {
            rec.logical_address = Some(logical_address.to_string());
            changed = true;
        }
        if rec.associated_pan_id.as_deref() != Some(pan_id) {
            rec.associated_pan_id = Some(pan_id.to_string());
            changed = true;
        }
        changed |= set_append(&mut rec.src_network_addresses, logical_address);
        changed
    })?;
    Ok(id)
}

fn merge_missing<T: PartialEq>(slot: &mut Option<T>, observed: Option<T>) -> bool {
    if slot.is_none() && observed.is_some() {
        *slot = observed;
        true
    } else {
        false
    }
}
