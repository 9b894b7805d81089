//! Device store
//!
//! SQLite-backed persistence for the device table. One pooled connection is
//! shared behind a lock; every mutation is a single transaction so the
//! snapshot reporter never observes a half-applied device update. Set- and
//! map-valued columns are stored as JSON text and go through
//! deserialize-mutate-reserialize inside the owning transaction.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use crate::logic::device::types::{DeviceId, DeviceRecord, DeviceType};
use crate::logic::error::EngineResult;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hardware_address TEXT NOT NULL UNIQUE,
    logical_address TEXT,
    channel INTEGER,
    device_type TEXT NOT NULL DEFAULT 'unknown',
    manufacturer TEXT,
    power_source TEXT,
    link_quality TEXT,
    first_seen INTEGER NOT NULL,
    last_seen INTEGER NOT NULL,
    neighbor_set TEXT NOT NULL DEFAULT '[]',
    capability_map TEXT NOT NULL DEFAULT '{}',
    cluster_map TEXT NOT NULL DEFAULT '{}',
    src_network_addresses TEXT NOT NULL DEFAULT '[]',
    dst_network_addresses TEXT NOT NULL DEFAULT '[]',
    src_link_addresses TEXT NOT NULL DEFAULT '[]',
    dst_link_addresses TEXT NOT NULL DEFAULT '[]',
    protocol_version TEXT,
    associated_pan_id TEXT,
    sticky_state TEXT NOT NULL DEFAULT '{}',
    location TEXT
);

CREATE INDEX IF NOT EXISTS idx_devices_logical ON devices(logical_address);
CREATE INDEX IF NOT EXISTS idx_devices_last_seen ON devices(last_seen);
"#;

const SELECT_COLUMNS: &str = "id, hardware_address, logical_address, channel, device_type, \
     manufacturer, power_source, link_quality, first_seen, last_seen, neighbor_set, \
     capability_map, cluster_map, src_network_addresses, dst_network_addresses, \
     src_link_addresses, dst_link_addresses, protocol_version, associated_pan_id, \
     sticky_state, location";

pub struct DeviceStore {
    conn: Mutex<Connection>,
}

impl DeviceStore {
    pub fn open(path: &Path) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        log::info!("device store ready at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn device_id(&self, hardware_address: &str) -> EngineResult<Option<DeviceId>> {
        let conn = self.conn.lock();
        let id = conn
            .query_row(
                "SELECT id FROM devices WHERE hardware_address=?1 LIMIT 1",
                params![hardware_address],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Lookup by the *current* logical binding. A device whose binding has
    /// moved on, or that was never bound, does not match.
    pub fn device_id_by_logical(&self, logical_address: &str) -> EngineResult<Option<DeviceId>> {
        let conn = self.conn.lock();
        let id = conn
            .query_row(
                "SELECT id FROM devices WHERE logical_address=?1 LIMIT 1",
                params![logical_address],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn insert_device(&self, record: &DeviceRecord) -> EngineResult<DeviceId> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO devices (hardware_address, logical_address, channel, device_type, \
             manufacturer, power_source, link_quality, first_seen, last_seen, neighbor_set, \
             capability_map, cluster_map, src_network_addresses, dst_network_addresses, \
             src_link_addresses, dst_link_addresses, protocol_version, associated_pan_id, \
             sticky_state, location) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
             ?17, ?18, ?19, ?20)",
            params![
                record.hardware_address,
                record.logical_address,
                record.channel,
                record.device_type.as_str(),
                record.manufacturer,
                record.power_source,
                record.link_quality,
                record.first_seen,
                record.last_seen,
                serde_json::to_string(&record.neighbor_set)?,
                serde_json::to_string(&record.capability_map)?,
                serde_json::to_string(&record.cluster_map)?,
                serde_json::to_string(&record.src_network_addresses)?,
                serde_json::to_string(&record.dst_network_addresses)?,
                serde_json::to_string(&record.src_link_addresses)?,
                serde_json::to_string(&record.dst_link_addresses)?,
                record.protocol_version,
                record.associated_pan_id,
                serde_json::to_string(&record.sticky_state)?,
                record.location,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(id)
    }

    pub fn load_device(&self, id: DeviceId) -> EngineResult<DeviceRecord> {
        let conn = self.conn.lock();
        let raw = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM devices WHERE id=?1 LIMIT 1"),
            params![id],
            RawDeviceRow::from_row,
        )?;
        raw.into_record()
    }

    /// Atomic read-modify-write of one device row. The closure mutates the
    /// deserialized record and reports whether anything changed; an
    /// unchanged record produces no write at all.
    pub fn update_device<F>(&self, id: DeviceId, mutate: F) -> EngineResult<bool>
    where
        F: FnOnce(&mut DeviceRecord) -> bool,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let raw = tx.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM devices WHERE id=?1 LIMIT 1"),
            params![id],
            RawDeviceRow::from_row,
        )?;
        let mut record = raw.into_record()?;
        if !mutate(&mut record) {
            // dropping the transaction rolls back the (read-only) work
            return Ok(false);
        }
        tx.execute(
            "UPDATE devices SET logical_address=?1, channel=?2, device_type=?3, \
             manufacturer=?4, power_source=?5, link_quality=?6, last_seen=?7, \
             neighbor_set=?8, capability_map=?9, cluster_map=?10, \
             src_network_addresses=?11, dst_network_addresses=?12, \
             src_link_addresses=?13, dst_link_addresses=?14, protocol_version=?15, \
             associated_pan_id=?16, sticky_state=?17, location=?18 WHERE id=?19",
            params![
                record.logical_address,
                record.channel,
                record.device_type.as_str(),
                record.manufacturer,
                record.power_source,
                record.link_quality,
                record.last_seen,
                serde_json::to_string(&record.neighbor_set)?,
                serde_json::to_string(&record.capability_map)?,
                serde_json::to_string(&record.cluster_map)?,
                serde_json::to_string(&record.src_network_addresses)?,
                serde_json::to_string(&record.dst_network_addresses)?,
                serde_json::to_string(&record.src_link_addresses)?,
                serde_json::to_string(&record.dst_link_addresses)?,
                record.protocol_version,
                record.associated_pan_id,
                serde_json::to_string(&record.sticky_state)?,
                record.location,
                id,
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Devices touched within the trailing window, for the snapshot
    /// reporter. Read-only.
    pub fn devices_seen_since(&self, cutoff: i64) -> EngineResult<Vec<DeviceRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM devices WHERE last_seen>?1"
        ))?;
        let raw_rows = stmt
            .query_map(params![cutoff], RawDeviceRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw_rows.into_iter().map(|raw| raw.into_record()).collect()
    }

    pub fn device_count(&self) -> EngineResult<i64> {
        let conn = self.conn.lock();
        let count = conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Column-level image of a row; JSON columns stay text until converted.
struct RawDeviceRow {
    id: DeviceId,
    hardware_address: String,
    logical_address: Option<String>,
    channel: Option<i64>,
    device_type: String,
    manufacturer: Option<String>,
    power_source: Option<String>,
    link_quality: Option<String>,
    first_seen: i64,
    last_seen: i64,
    neighbor_set: String,
    capability_map: String,
    cluster_map: String,
    src_network_addresses: String,
    dst_network_addresses: String,
    src_link_addresses: String,
    dst_link_addresses: String,
    protocol_version: Option<String>,
    associated_pan_id: Option<String>,
    sticky_state: String,
    location: Option<String>,
}

impl RawDeviceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            hardware_address: row.get(1)?,
            logical_address: row.get(2)?,
            channel: row.get(3)?,
            device_type: row.get(4)?,
            manufacturer: row.get(5)?,
            power_source: row.get(6)?,
            link_quality: row.get(7)?,
            first_seen: row.get(8)?,
            last_seen: row.get(9)?,
            neighbor_set: row.get(10)?,
            capability_map: row.get(11)?,
            cluster_map: row.get(12)?,
            src_network_addresses: row.get(13)?,
            dst_network_addresses: row.get(14)?,
            src_link_addresses: row.get(15)?,
            dst_link_addresses: row.get(16)?,
            protocol_version: row.get(17)?,
            associated_pan_id: row.get(18)?,
            sticky_state: row.get(19)?,
            location: row.get(20)?,
        })
    }

    fn into_record(self) -> EngineResult<DeviceRecord> {
        Ok(DeviceRecord {
            id: self.id,
            hardware_address: self.hardware_address,
            logical_address: self.logical_address,
            channel: self.channel,
            device_type: DeviceType::parse(&self.device_type),
            manufacturer: self.manufacturer,
            power_source: self.power_source,
            link_quality: self.link_quality,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            neighbor_set: serde_json::from_str::<Vec<String>>(&self.neighbor_set)?,
            capability_map: serde_json::from_str::<BTreeMap<String, Value>>(&self.capability_map)?,
            cluster_map: serde_json::from_str::<BTreeMap<String, Value>>(&self.cluster_map)?,
            src_network_addresses: serde_json::from_str(&self.src_network_addresses)?,
            dst_network_addresses: serde_json::from_str(&self.dst_network_addresses)?,
            src_link_addresses: serde_json::from_str(&self.src_link_addresses)?,
            dst_link_addresses: serde_json::from_str(&self.dst_link_addresses)?,
            protocol_version: self.protocol_version,
            associated_pan_id: self.associated_pan_id,
            sticky_state: serde_json::from_str::<BTreeMap<String, String>>(&self.sticky_state)?,
            location: self.location,
        })
    }
}
