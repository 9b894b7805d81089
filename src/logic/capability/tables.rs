//! Capability classification tables
//!
//! Table-driven mapping from dissector attribute keys to capability-map
//! entries. Each entry names the capability, how to transform the raw
//! value (unit scaling or enum decode) and, where the attribute implies
//! one, the device type.

use once_cell::sync::Lazy;

use crate::logic::device::types::DeviceType;

#[derive(Debug, Clone, Copy)]
pub enum MapFallback {
    /// Unmapped values decode to this literal.
    Literal(&'static str),
    /// Unmapped values pass through unchanged.
    Raw,
}

#[derive(Debug, Clone, Copy)]
pub enum Transform {
    /// Numeric value divided by the divisor (wire units to engineering
    /// units).
    Scale(f64),
    Integer,
    Text,
    Map {
        table: &'static [(&'static str, &'static str)],
        fallback: MapFallback,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct CapabilityRule {
    pub attribute: &'static str,
    pub capability: &'static str,
    pub transform: Transform,
    pub device_type: Option<DeviceType>,
}

pub static CAPABILITY_RULES: Lazy<Vec<CapabilityRule>> = Lazy::new(|| {
    vec![
        // ZCL measurement attributes arrive in centi-units
        CapabilityRule {
            attribute: "command_temperature_measured",
            capability: "Measure Temperature",
            transform: Transform::Scale(100.0),
            device_type: None,
        },
        CapabilityRule {
            attribute: "command_humidity_measured",
            capability: "Measure Humidity",
            transform: Transform::Scale(100.0),
            device_type: None,
        },
        CapabilityRule {
            attribute: "command_pressure_level_detail",
            capability: "Air Pressure Level Detection",
            transform: Transform::Scale(100.0),
            device_type: None,
        },
        CapabilityRule {
            attribute: "command_illummeas_value",
            capability: "Illumination Detection",
            transform: Transform::Scale(100.0),
            device_type: None,
        },
        // Battery reporting marks battery-driven end devices
        CapabilityRule {
            attribute: "command_battery_percentage",
            capability: "Battery Percentage",
            transform: Transform::Scale(2.0),
            device_type: Some(DeviceType::EndDevice),
        },
        CapabilityRule {
            attribute: "command_battery_voltage",
            capability: "Battery Voltage",
            transform: Transform::Scale(10.0),
            device_type: Some(DeviceType::EndDevice),
        },
        CapabilityRule {
            attribute: "command_battery_status",
            capability: "Battery Status",
            transform: Transform::Map {
                table: &[("0", "Bad"), ("1", "Ok")],
                fallback: MapFallback::Raw,
            },
            device_type: Some(DeviceType::EndDevice),
        },
        // Lighting control implies a mains-powered router
        CapabilityRule {
            attribute: "command_color_temperature",
            capability: "Light Color Temperature",
            transform: Transform::Integer,
            device_type: Some(DeviceType::Router),
        },
        CapabilityRule {
            attribute: "command_color_attr_color_x",
            capability: "Light Color Control X",
            transform: Transform::Integer,
            device_type: Some(DeviceType::Router),
        },
        CapabilityRule {
            attribute: "command_color_attr_color_y",
            capability: "Light Color Control Y",
            transform: Transform::Integer,
            device_type: Some(DeviceType::Router),
        },
        CapabilityRule {
            attribute: "command_color_control_id",
            capability: "Light Color Control ID",
            transform: Transform::Text,
            device_type: None,
        },
        CapabilityRule {
            attribute: "command_onoff_cmd_id",
            capability: "Light Send On/Off Command id",
            transform: Transform::Text,
            device_type: None,
        },
        CapabilityRule {
            attribute: "command_onoff_attr_onoff",
            capability: "On/Off Switch",
            transform: Transform::Map {
                table: &[("0x00", "Off"), ("0x01", "On")],
                fallback: MapFallback::Literal("unknown"),
            },
            device_type: None,
        },
        CapabilityRule {
            attribute: "command_sensing_occupancy_occupied",
            capability: "Occupancy Detection",
            transform: Transform::Map {
                table: &[("0", "Clear"), ("1", "Occupied")],
                fallback: MapFallback::Raw,
            },
            device_type: None,
        },
        CapabilityRule {
            attribute: "zdp_node_manufacturer",
            capability: "Device Manufacturer",
            transform: Transform::Text,
            device_type: None,
        },
        // OTA upgrade negotiation
        CapabilityRule {
            attribute: "ota_manufacturer_code",
            capability: "OTA Manufacturer code",
            transform: Transform::Text,
            device_type: None,
        },
        CapabilityRule {
            attribute: "ota_hardware_version",
            capability: "OTA Hardware Version",
            transform: Transform::Text,
            device_type: None,
        },
        CapabilityRule {
            attribute: "ota_image_type",
            capability: "OTA Image Type",
            transform: Transform::Text,
            device_type: None,
        },
        CapabilityRule {
            attribute: "ota_status",
            capability: "OTA Status",
            transform: Transform::Text,
            device_type: None,
        },
        CapabilityRule {
            attribute: "ota_file_version",
            capability: "OTA File Version",
            transform: Transform::Text,
            device_type: None,
        },
    ]
});
