//! Field replaceable units: fans, power supplies, temperature sensors, blades
//!
//! FRUs are chassis-wide. Their worst status per kind is ratcheted into
//! every logical switch registered with the accumulator.

use super::base::{BaseParser, EntityParser, comparable_previous};
use crate::aggregate::{
    BLADE_FRU_STATUS, FAN_FRU_STATUS, POWER_SUPPLY_FRU_STATUS, SENSOR_FRU_STATUS,
    SwitchStatusAccumulator,
};
use crate::diff::{ChangedUnits, UnitTable, get_changed_vfid_ports};
use crate::record::{FieldLookup, JsonFields, Scalar, status_field};
use crate::status::StatusId;
use crate::telemetry::{Module, TelemetrySnapshot};
use serde_json::Value;
use std::fmt;
use tracing::debug;

pub const FRU_CHANGED: &[&str] = &[
    "operational-state",
    "airflow-direction",
    "power-source",
    "blade-state",
];

const FRU_CONST: &[&str] = &["fru-type", "unit-key"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FruKind {
    Fan,
    PowerSupply,
    Sensor,
    Blade,
}

impl FruKind {
    pub const ALL: [FruKind; 4] = [
        FruKind::Fan,
        FruKind::PowerSupply,
        FruKind::Sensor,
        FruKind::Blade,
    ];

    pub fn module(self) -> Module {
        match self {
            FruKind::Fan => Module::FruFan,
            FruKind::PowerSupply => Module::FruPowerSupply,
            FruKind::Sensor => Module::FruSensor,
            FruKind::Blade => Module::FruBlade,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FruKind::Fan => "fan",
            FruKind::PowerSupply => "power-supply",
            FruKind::Sensor => "sensor",
            FruKind::Blade => "blade",
        }
    }

    pub fn aggregate_field(self) -> &'static str {
        match self {
            FruKind::Fan => FAN_FRU_STATUS,
            FruKind::PowerSupply => POWER_SUPPLY_FRU_STATUS,
            FruKind::Sensor => SENSOR_FRU_STATUS,
            FruKind::Blade => BLADE_FRU_STATUS,
        }
    }

    fn id_field(self) -> &'static str {
        match self {
            FruKind::Fan | FruKind::PowerSupply => "unit-number",
            FruKind::Sensor => "id",
            FruKind::Blade => "slot-number",
        }
    }

    fn state_field(self) -> &'static str {
        match self {
            FruKind::Fan | FruKind::PowerSupply => "operational-state",
            FruKind::Sensor => "state",
            FruKind::Blade => "blade-state",
        }
    }
}

impl fmt::Display for FruKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a FRU state string onto the status scale
pub fn fru_state_status(state: Option<&str>) -> StatusId {
    let Some(state) = state else {
        return StatusId::Unknown;
    };
    let state = state.trim().to_ascii_lowercase();
    match state.as_str() {
        "ok" | "enabled" | "on" => StatusId::Ok,
        "absent" | "off" | "disabled" => StatusId::Warning,
        s if s.contains("fault")
            || s.contains("below minimum")
            || s.contains("above maximum") =>
        {
            StatusId::Critical
        }
        _ => StatusId::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FruUnit {
    pub kind: FruKind,
    /// `fan 1`, `power-supply 2`, `sensor 7`, `blade 3`
    pub unit_key: String,
    pub state: Option<String>,
    pub status: StatusId,
    pub airflow_direction: Option<String>,
    pub power_source: Option<String>,
    pub speed: Option<i64>,
    pub temperature: Option<f64>,
    pub input_voltage: Option<f64>,
    pub blade_type: Option<String>,
    pub model_name: Option<String>,
    pub serial_number: Option<String>,
    pub power_consumption: Option<f64>,
}

impl FruUnit {
    fn from_entry(kind: FruKind, entry: &Value) -> Option<Self> {
        let unit_key = format!("{} {}", kind.label(), entry.str_field(kind.id_field())?);
        let state = entry.str_field(kind.state_field());
        Some(Self {
            kind,
            unit_key,
            status: fru_state_status(state.as_deref()),
            state,
            airflow_direction: entry.str_field("airflow-direction"),
            power_source: entry.str_field("power-source"),
            speed: entry.i64_field("speed"),
            temperature: entry.f64_field("temperature"),
            input_voltage: entry.f64_field("input-voltage"),
            blade_type: entry.str_field("blade-type"),
            model_name: entry.str_field("model-name"),
            serial_number: entry.str_field("serial-number"),
            power_consumption: entry.f64_field("power-consumption"),
        })
    }
}

impl FieldLookup for FruUnit {
    fn field(&self, name: &str) -> Option<Scalar> {
        let value: Scalar = match name {
            "fru-type" => self.kind.label().into(),
            "unit-key" => self.unit_key.as_str().into(),
            "operational-state" if self.kind != FruKind::Blade => (&self.state).into(),
            "blade-state" if self.kind == FruKind::Blade => (&self.state).into(),
            "airflow-direction" if self.kind == FruKind::Fan => (&self.airflow_direction).into(),
            "power-source" if self.kind == FruKind::PowerSupply => (&self.power_source).into(),
            "speed" => self.speed.into(),
            "temperature" => self.temperature.into(),
            "input-voltage" => self.input_voltage.into(),
            "blade-type" => (&self.blade_type).into(),
            "model-name" => (&self.model_name).into(),
            "serial-number" => (&self.serial_number).into(),
            "power-consumption" => self.power_consumption.into(),
            _ => return status_field(name, "fru", Some(self.status)).flatten(),
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct FruParser {
    base: BaseParser,
    units: UnitTable<FruUnit>,
    changed: Option<ChangedUnits>,
}

impl FruParser {
    pub fn new(
        snapshot: &TelemetrySnapshot,
        previous: Option<&FruParser>,
        accumulator: &mut SwitchStatusAccumulator,
    ) -> Self {
        let base = BaseParser::new(snapshot);
        let mut units = UnitTable::new();
        for kind in FruKind::ALL {
            for entry in snapshot.chassis_entries(kind.module()) {
                let Some(unit) = FruUnit::from_entry(kind, entry) else {
                    debug!(fru = %kind, "skipping unit without identifier");
                    continue;
                };
                accumulator.update_chassis_status(kind.aggregate_field(), unit.status);
                units.insert(unit.unit_key.clone(), unit);
            }
        }

        let changed = comparable_previous(&base, previous).map(|prev| {
            get_changed_vfid_ports(
                &units,
                &prev.units,
                FRU_CHANGED,
                FRU_CONST,
                Some(base.telemetry_hrf().as_str()),
                Some(prev.base.telemetry_hrf().as_str()),
            )
        });

        Self {
            base,
            units,
            changed,
        }
    }

    pub fn units(&self) -> &UnitTable<FruUnit> {
        &self.units
    }

    pub fn units_of(&self, kind: FruKind) -> impl Iterator<Item = &FruUnit> {
        self.units.values().filter(move |u| u.kind == kind)
    }

    pub fn changed(&self) -> Option<&ChangedUnits> {
        self.changed.as_ref()
    }
}

impl EntityParser for FruParser {
    fn base(&self) -> &BaseParser {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn snapshot(fan_state: &str) -> TelemetrySnapshot {
        let mut s = TelemetrySnapshot::new(Utc::now());
        s.insert_payload(
            Module::Chassis,
            -1,
            json!({"chassis": {"chassis-wwn": "10:00:00:00:00:00:00:01"}}),
        );
        s.insert_payload(
            Module::FruFan,
            -1,
            json!({"fan": [
                {"unit-number": 1, "operational-state": fan_state, "airflow-direction": "port-side-intake", "speed": 7000},
                {"unit-number": 2, "operational-state": "ok", "speed": 7100}
            ]}),
        );
        s.insert_payload(
            Module::FruPowerSupply,
            -1,
            json!({"power-supply": [{"unit-number": 1, "operational-state": "absent"}]}),
        );
        s.insert_payload(
            Module::FruSensor,
            -1,
            json!({"sensor": [{"id": 3, "state": "Ok", "temperature": 31}]}),
        );
        s
    }

    #[test]
    fn test_fru_state_status() {
        assert_eq!(fru_state_status(Some("OK")), StatusId::Ok);
        assert_eq!(fru_state_status(Some("absent")), StatusId::Warning);
        assert_eq!(fru_state_status(Some("faulty")), StatusId::Critical);
        assert_eq!(fru_state_status(Some("below minimum")), StatusId::Critical);
        assert_eq!(fru_state_status(Some("initializing")), StatusId::Unknown);
        assert_eq!(fru_state_status(None), StatusId::Unknown);
    }

    #[test]
    fn test_fru_units_and_chassis_aggregate() {
        let mut acc = SwitchStatusAccumulator::new();
        acc.register_vf(10);
        acc.register_vf(20);
        let parser = FruParser::new(&snapshot("faulty"), None, &mut acc);
        assert_eq!(parser.units().len(), 4);
        assert_eq!(parser.units_of(FruKind::Fan).count(), 2);
        assert_eq!(parser.units()["sensor 3"].status, StatusId::Ok);
        for vf in [10, 20] {
            let agg = acc.get(vf).unwrap();
            assert_eq!(agg.status(FAN_FRU_STATUS), Some(StatusId::Critical));
            assert_eq!(agg.status(POWER_SUPPLY_FRU_STATUS), Some(StatusId::Warning));
            assert_eq!(agg.status(BLADE_FRU_STATUS), None);
        }
    }

    #[test]
    fn test_fru_state_change_logged() {
        let mut acc = SwitchStatusAccumulator::new();
        let prev = FruParser::new(&snapshot("ok"), None, &mut acc);
        let now = FruParser::new(&snapshot("faulty"), Some(&prev), &mut acc);
        let changed = now.changed().unwrap();
        assert_eq!(changed.len(), 1);
        let fan = &changed["fan 1"];
        assert_eq!(fan["operational-state"], Scalar::Text("faulty".to_string()));
        assert_eq!(fan["operational-state-prev"], Scalar::Text("ok".to_string()));
        assert_eq!(fan["fru-type"], Scalar::Text("fan".to_string()));
    }

    #[test]
    fn test_replaced_chassis_not_comparable() {
        let mut acc = SwitchStatusAccumulator::new();
        let prev = FruParser::new(&snapshot("ok"), None, &mut acc);
        let mut swapped = snapshot("faulty");
        swapped.insert_payload(
            Module::Chassis,
            -1,
            json!({"chassis": {"chassis-wwn": "10:00:00:00:00:00:00:02"}}),
        );
        let now = FruParser::new(&swapped, Some(&prev), &mut acc);
        assert!(now.changed().is_none());
        assert_eq!(now.units()["fan 1"].status, StatusId::Critical);
    }
}
