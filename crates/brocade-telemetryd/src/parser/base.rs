//! Chassis identity and telemetry timestamp shared by all parsers

use crate::diff::{ChassisIdentity, VfId, same_chassis};
use crate::record::JsonFields;
use crate::telemetry::{Module, TelemetrySnapshot};

/// Identity and timestamp of the snapshot a parser was built from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseParser {
    pub chassis: ChassisIdentity,
    pub telemetry_date: String,
    pub telemetry_time: String,
}

impl BaseParser {
    pub fn new(snapshot: &TelemetrySnapshot) -> Self {
        let chassis = snapshot
            .chassis_entries(Module::Chassis)
            .first()
            .map(|entry| ChassisIdentity {
                chassis_wwn: entry.str_field("chassis-wwn"),
                chassis_name: entry.str_field("chassis-user-friendly-name"),
            })
            .unwrap_or_default();
        Self {
            chassis,
            telemetry_date: snapshot.telemetry_date(),
            telemetry_time: snapshot.telemetry_time(),
        }
    }

    pub fn chassis_wwn(&self) -> Option<&str> {
        self.chassis.chassis_wwn.as_deref()
    }

    pub fn chassis_name(&self) -> Option<&str> {
        self.chassis.chassis_name.as_deref()
    }

    pub fn same_chassis(&self, other: &BaseParser) -> bool {
        same_chassis(&self.chassis, &other.chassis)
    }

    /// Both sides name a chassis and the names differ. A side without a
    /// chassis WWN (switch unreachable) does not count as a replacement.
    pub fn chassis_replaced(&self, other: &BaseParser) -> bool {
        match (self.chassis_wwn(), other.chassis_wwn()) {
            (Some(now), Some(before)) => now != before,
            _ => false,
        }
    }

    /// `"<date> <time>"` of the poll
    pub fn telemetry_hrf(&self) -> String {
        format!("{} {}", self.telemetry_date, self.telemetry_time)
    }
}

/// Access to the base part of a parser
pub trait EntityParser {
    fn base(&self) -> &BaseParser;
}

/// The previous instance, if it exists and describes the same chassis
pub fn comparable_previous<'a, P: EntityParser>(
    current: &BaseParser,
    previous: Option<&'a P>,
) -> Option<&'a P> {
    previous.filter(|prev| current.same_chassis(prev.base()))
}

/// Logical switch a unit belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwitchIdentity {
    pub switch_name: Option<String>,
    pub switch_wwn: Option<String>,
}

impl SwitchIdentity {
    pub fn from_snapshot(snapshot: &TelemetrySnapshot, vf_id: VfId) -> Self {
        snapshot
            .entries(Module::FcSwitch, vf_id)
            .first()
            .map(|entry| SwitchIdentity {
                switch_name: entry.str_field("user-friendly-name"),
                switch_wwn: entry.str_field("name"),
            })
            .unwrap_or_default()
    }
}

/// Normalize a FOS port name (`"fc/0/1"`, `"0/1"`) to `"slot/port"`
pub(crate) fn slot_port(name: &str) -> String {
    name.trim()
        .strip_prefix("fc/")
        .unwrap_or(name.trim())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_base_parser_reads_chassis_identity() {
        let mut snapshot =
            TelemetrySnapshot::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
        snapshot.insert_payload(
            Module::Chassis,
            -1,
            json!({"chassis": {
                "chassis-wwn": "10:00:c4:f5:7c:00:00:01",
                "chassis-user-friendly-name": "san-a-core"
            }}),
        );
        let base = BaseParser::new(&snapshot);
        assert_eq!(base.chassis_wwn(), Some("10:00:c4:f5:7c:00:00:01"));
        assert_eq!(base.chassis_name(), Some("san-a-core"));
        assert_eq!(base.telemetry_hrf(), "2024-03-01 12:30:00");
    }

    #[test]
    fn test_base_parser_without_chassis_module() {
        let base = BaseParser::new(&TelemetrySnapshot::new(Utc::now()));
        assert_eq!(base.chassis_wwn(), None);
        assert!(!base.same_chassis(&base.clone()));
    }

    #[test]
    fn test_slot_port_and_switch_identity() {
        assert_eq!(slot_port("fc/3/12"), "3/12");
        assert_eq!(slot_port("0/1"), "0/1");

        let mut snapshot = TelemetrySnapshot::new(Utc::now());
        snapshot.insert_payload(
            Module::FcSwitch,
            128,
            json!({"fibrechannel-switch": [{
                "name": "10:00:c4:f5:7c:00:00:80",
                "user-friendly-name": "vf128"
            }]}),
        );
        let id = SwitchIdentity::from_snapshot(&snapshot, 128);
        assert_eq!(id.switch_name.as_deref(), Some("vf128"));
        assert_eq!(SwitchIdentity::from_snapshot(&snapshot, 1), SwitchIdentity::default());
    }
}
