//! Sticky-state tracker
//!
//! Per-(device, kind) cache of the last relevant value, backing
//! edge-triggered notification: the first observation of a kind always
//! emits, a repeat of the cached value suppresses, a different value
//! updates the cache and emits.

use crate::logic::device::types::DeviceId;
use crate::logic::error::EngineResult;
use crate::logic::store::DeviceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickyOutcome {
    Emit,
    Suppress,
}

/// Compare-and-update the cached value for one kind. The cache write and
/// the comparison happen inside a single device transaction; a suppressed
/// observation leaves the row untouched.
pub fn observe(
    store: &DeviceStore,
    device: DeviceId,
    kind: &str,
    value: &str,
) -> EngineResult<StickyOutcome> {
    let mut outcome = StickyOutcome::Suppress;
    store.update_device(device, |rec| match rec.sticky_state.get(kind) {
        Some(previous) if previous == value => false,
        _ => {
            rec.sticky_state.insert(kind.to_string(), value.to_string());
            outcome = StickyOutcome::Emit;
            true
        }
    })?;
    Ok(outcome)
}
