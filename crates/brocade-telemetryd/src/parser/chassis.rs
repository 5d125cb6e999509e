//! Chassis parameters

use super::base::{BaseParser, EntityParser, comparable_previous};
use crate::diff::{ChangedRecord, get_changed_chassis_params};
use crate::record::{FieldLookup, JsonFields, Scalar};
use crate::telemetry::{Module, TelemetrySnapshot};

/// Fields whose change is worth logging
pub const CHASSIS_PARAMS_CHANGED: &[&str] = &["chassis-name", "product-name", "vf-enabled"];
const CHASSIS_CONST_KEYS: &[&str] = &["chassis-wwn", "serial-number"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChassisParams {
    pub chassis_wwn: Option<String>,
    pub chassis_name: Option<String>,
    pub serial_number: Option<String>,
    pub product_name: Option<String>,
    pub vendor_name: Option<String>,
    pub vf_enabled: Option<bool>,
}

impl FieldLookup for ChassisParams {
    fn field(&self, name: &str) -> Option<Scalar> {
        let value: Scalar = match name {
            "chassis-wwn" => (&self.chassis_wwn).into(),
            "chassis-name" => (&self.chassis_name).into(),
            "serial-number" => (&self.serial_number).into(),
            "product-name" => (&self.product_name).into(),
            "vendor-name" => (&self.vendor_name).into(),
            "vf-enabled" => self.vf_enabled.into(),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct ChassisParser {
    base: BaseParser,
    params: ChassisParams,
    changed: Option<ChangedRecord>,
}

impl ChassisParser {
    pub fn new(snapshot: &TelemetrySnapshot, previous: Option<&ChassisParser>) -> Self {
        let base = BaseParser::new(snapshot);
        let params = snapshot
            .chassis_entries(Module::Chassis)
            .first()
            .map(|entry| ChassisParams {
                chassis_wwn: entry.str_field("chassis-wwn"),
                chassis_name: entry.str_field("chassis-user-friendly-name"),
                serial_number: entry.str_field("serial-number"),
                product_name: entry.str_field("product-name"),
                vendor_name: entry.str_field("vendor-name"),
                vf_enabled: entry.bool_field("vf-enabled"),
            })
            .unwrap_or_default();

        let changed = comparable_previous(&base, previous).map(|prev| {
            get_changed_chassis_params(
                &params,
                &prev.params,
                CHASSIS_PARAMS_CHANGED,
                CHASSIS_CONST_KEYS,
                Some(base.telemetry_hrf().as_str()),
                Some(prev.base.telemetry_hrf().as_str()),
            )
        });

        Self {
            base,
            params,
            changed,
        }
    }

    pub fn params(&self) -> &ChassisParams {
        &self.params
    }

    /// `None` when there was no comparable previous snapshot
    pub fn changed(&self) -> Option<&ChangedRecord> {
        self.changed.as_ref()
    }
}

impl EntityParser for ChassisParser {
    fn base(&self) -> &BaseParser {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn snapshot(wwn: &str, name: &str) -> TelemetrySnapshot {
        let mut s = TelemetrySnapshot::new(Utc::now());
        s.insert_payload(
            Module::Chassis,
            -1,
            json!({"chassis": {
                "chassis-wwn": wwn,
                "chassis-user-friendly-name": name,
                "serial-number": "CZC1234567",
                "product-name": "G720",
                "vf-enabled": false
            }}),
        );
        s
    }

    #[test]
    fn test_chassis_params_parsed() {
        let parser = ChassisParser::new(&snapshot("10:00:00:00:00:00:00:01", "core"), None);
        assert_eq!(parser.params().product_name.as_deref(), Some("G720"));
        assert_eq!(parser.params().vf_enabled, Some(false));
        assert!(parser.changed().is_none());
    }

    #[test]
    fn test_chassis_rename_is_logged() {
        let prev = ChassisParser::new(&snapshot("10:00:00:00:00:00:00:01", "core"), None);
        let now = ChassisParser::new(&snapshot("10:00:00:00:00:00:00:01", "core-a"), Some(&prev));
        let changed = now.changed().unwrap();
        assert_eq!(changed["chassis-name"], Scalar::Text("core-a".to_string()));
        assert_eq!(changed["chassis-name-prev"], Scalar::Text("core".to_string()));
        assert_eq!(changed["serial-number"], Scalar::Text("CZC1234567".to_string()));
    }

    #[test]
    fn test_different_chassis_not_comparable() {
        let prev = ChassisParser::new(&snapshot("10:00:00:00:00:00:00:01", "core"), None);
        let now = ChassisParser::new(&snapshot("10:00:00:00:00:00:00:02", "core"), Some(&prev));
        assert!(now.changed().is_none());
    }
}
