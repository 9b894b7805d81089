//! Detection rule table
//!
//! Ordered, first-match-wins. Priority: key-material discovery, then
//! motion/occupancy, binary switch state, button-press command, zone/alarm
//! state. Key-material rules bypass the sticky gate entirely; the vault's
//! own set semantics deduplicate keys.

use once_cell::sync::Lazy;

use crate::logic::record::keys;

#[derive(Debug, Clone, Copy)]
pub enum RuleKind {
    /// Forward the key to the vault and emit unconditionally.
    KeyMaterial,
    /// Edge-triggered on the sticky cache for this rule's kind.
    StickyToggle {
        decode: &'static [(&'static str, &'static str)],
        fallback: &'static str,
        /// Track the kind per source endpoint when one is present.
        endpoint_scoped: bool,
    },
    /// Emit on every press; the command id is device specific.
    ButtonPress,
    /// Edge-triggered zone state, decode depends on the cluster.
    ZoneStatus,
}

#[derive(Debug, Clone, Copy)]
pub struct DetectionRule {
    pub id: &'static str,
    /// Attribute key whose presence selects this rule.
    pub trigger: &'static str,
    pub label: &'static str,
    pub kind: RuleKind,
}

pub static DETECTION_RULES: Lazy<Vec<DetectionRule>> = Lazy::new(|| {
    vec![
        DetectionRule {
            id: "KEY_TRANSPORT",
            trigger: keys::LINK_KEY_SECRET,
            label: "Network Transport Key has been found",
            kind: RuleKind::KeyMaterial,
        },
        DetectionRule {
            id: "KEY_LINK",
            trigger: keys::LINK_KEY_STANDARD,
            label: "Network Link Key has been found",
            kind: RuleKind::KeyMaterial,
        },
        DetectionRule {
            id: "OCCUPANCY",
            trigger: keys::OCCUPANCY_OCCUPIED,
            label: "Motion sensor detected occupancy",
            kind: RuleKind::StickyToggle {
                decode: &[("0x00", "no"), ("0x01", "yes")],
                fallback: "Unknown",
                endpoint_scoped: false,
            },
        },
        DetectionRule {
            id: "SWITCH_STATE",
            trigger: keys::ONOFF_ATTR,
            label: "A switch request was triggered",
            kind: RuleKind::StickyToggle {
                decode: &[("0x00", "Off"), ("0x01", "On")],
                fallback: "Unknown",
                endpoint_scoped: true,
            },
        },
        DetectionRule {
            id: "BUTTON_PRESS",
            trigger: keys::ONOFF_CMD_ID,
            label: "A Button was triggered",
            kind: RuleKind::ButtonPress,
        },
        DetectionRule {
            id: "ZONE_ALARM",
            trigger: keys::ZONE_ALARM_1,
            label: "Zone sensor status",
            kind: RuleKind::ZoneStatus,
        },
    ]
});

/// Command ids a button press can carry; anything else is reported raw.
pub const BUTTON_COMMANDS: &[(&str, &str)] = &[
    ("0x00", "Off"),
    ("0x01", "On"),
    ("0x42", "On with timed Off"),
    ("0xfd", "Device Specific 0xfd"),
];

/// Zone state decode, valid only for the alarm-zone cluster.
pub const ZONE_STATES: &[(&str, &str)] = &[("0", "Closed/Safe"), ("1", "Open/Alarm")];

pub fn decode(table: &[(&str, &str)], raw: &str, fallback: &str) -> String {
    table
        .iter()
        .find(|(wire, _)| *wire == raw)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| fallback.to_string())
}
