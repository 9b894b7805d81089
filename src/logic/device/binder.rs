//! Address binder
//!
//! Append-only adjacency and direction/scope address sets. Everything here
//! is an idempotent set union; nothing is ever removed.

use crate::logic::device::types::{set_append, DeviceId};
use crate::logic::error::EngineResult;
use crate::logic::store::DeviceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Src,
    Dst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Network,
    Link,
}

/// Record that `device` was seen talking to `peer_address`. Returns whether
/// the set grew.
pub fn record_neighbor(
    store: &DeviceStore,
    device: DeviceId,
    peer_address: &str,
) -> EngineResult<bool> {
    store.update_device(device, |rec| set_append(&mut rec.neighbor_set, peer_address))
}

/// Append one address to the (direction, scope) set of a device, keyed by
/// value equality.
pub fn record_directional_address(
    store: &DeviceStore,
    device: DeviceId,
    direction: Direction,
    scope: Scope,
    address: &str,
) -> EngineResult<bool> {
    store.update_device(device, |rec| {
        let set = match (direction, scope) {
            (Direction::Src, Scope::Network) => &mut rec.src_network_addresses,
            (Direction::Dst, Scope::Network) => &mut rec.dst_network_addresses,
            (Direction::Src, Scope::Link) => &mut rec.src_link_addresses,
            (Direction::Dst, Scope::Link) => &mut rec.dst_link_addresses,
        };
        set_append(set, address)
    })
}
