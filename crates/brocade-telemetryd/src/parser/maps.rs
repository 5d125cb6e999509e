//! MAPS health: system resources, switch status policy report, active policy

use super::base::{BaseParser, EntityParser, SwitchIdentity, comparable_previous};
use crate::aggregate::{
    SSP_REPORT_MAPS_STATUS, SYSTEM_RESOURCES_MAPS_STATUS, SwitchStatusAccumulator,
};
use crate::diff::{ChangedVfRecords, VfId, get_changed_vf_records};
use crate::record::{FieldLookup, JsonFields, Scalar, status_field};
use crate::status::StatusId;
use crate::telemetry::{Module, TelemetrySnapshot};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Switch status policy report components
pub const SSP_COMPONENTS: &[&str] = &[
    "switch-health",
    "power-supply-health",
    "fan-health",
    "temperature-sensor-health",
    "flash-health",
    "marginal-port-health",
    "faulty-port-health",
    "missing-sfp-health",
    "error-port-health",
    "expired-certificate-health",
    "airflow-mismatch-health",
];

pub const MAPS_CHANGED: &[&str] = &[
    "active-policy",
    "cpu-usage-status",
    "memory-usage-status",
    "flash-usage-status",
    "switch-health-status",
    "power-supply-health-status",
    "fan-health-status",
    "temperature-sensor-health-status",
    "flash-health-status",
    "marginal-port-health-status",
    "faulty-port-health-status",
    "missing-sfp-health-status",
    "error-port-health-status",
    "expired-certificate-health-status",
    "airflow-mismatch-health-status",
];

const MAPS_CONST: &[&str] = &["switch-name", "switch-wwn"];

/// Gap between the ok-if-below level and the critical level
const CRITICAL_GAP: f64 = 10.0;

/// Ok-if-below levels in percent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapsThresholds {
    pub cpu_ok_below: f64,
    pub memory_ok_below: f64,
    pub flash_ok_below: f64,
}

impl Default for MapsThresholds {
    fn default() -> Self {
        Self {
            cpu_ok_below: 80.0,
            memory_ok_below: 75.0,
            flash_ok_below: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SystemResource {
    Cpu,
    Memory,
    Flash,
}

impl SystemResource {
    pub const ALL: [SystemResource; 3] = [
        SystemResource::Cpu,
        SystemResource::Memory,
        SystemResource::Flash,
    ];

    /// Wire field name of the usage percentage
    pub fn field_name(self) -> &'static str {
        match self {
            SystemResource::Cpu => "cpu-usage",
            SystemResource::Memory => "memory-usage",
            SystemResource::Flash => "flash-usage",
        }
    }

    pub fn ok_below(self, thresholds: &MapsThresholds) -> f64 {
        match self {
            SystemResource::Cpu => thresholds.cpu_ok_below,
            SystemResource::Memory => thresholds.memory_ok_below,
            SystemResource::Flash => thresholds.flash_ok_below,
        }
    }
}

impl fmt::Display for SystemResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// `< t` OK, `< t + 10` Warning, otherwise Critical
pub fn resource_status(usage: Option<f64>, ok_below: f64) -> StatusId {
    match usage {
        None => StatusId::Unknown,
        Some(u) if u < ok_below => StatusId::Ok,
        Some(u) if u < ok_below + CRITICAL_GAP => StatusId::Warning,
        Some(_) => StatusId::Critical,
    }
}

/// healthy / marginal / down
pub fn ssp_status(state: Option<&str>) -> StatusId {
    match state.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("healthy") => StatusId::Ok,
        Some("marginal") => StatusId::Warning,
        Some("down") => StatusId::Critical,
        _ => StatusId::Unknown,
    }
}

/// One resource reading with its derived status
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    pub usage: Option<f64>,
    pub status: StatusId,
}

/// MAPS view of one logical switch
#[derive(Debug, Clone, PartialEq)]
pub struct MapsRecord {
    pub switch: SwitchIdentity,
    pub active_policy: Option<String>,
    pub resources: BTreeMap<SystemResource, ResourceUsage>,
    /// Component state as reported, `None` when the report lacks it
    pub ssp: BTreeMap<&'static str, Option<String>>,
}

impl MapsRecord {
    pub fn resource(&self, resource: SystemResource) -> Option<&ResourceUsage> {
        self.resources.get(&resource)
    }

    pub fn ssp_status(&self, component: &str) -> Option<StatusId> {
        self.ssp
            .get(component)
            .map(|state| ssp_status(state.as_deref()))
    }

    /// Usage readings, component states and their status pairs
    fn health_field(&self, name: &str) -> Option<Scalar> {
        for (resource, usage) in &self.resources {
            if name == resource.field_name() {
                return Some(usage.usage.into());
            }
            if let Some(value) = status_field(name, resource.field_name(), Some(usage.status)) {
                return value;
            }
        }
        for (component, state) in &self.ssp {
            if name == *component {
                return Some(state.clone().into());
            }
            let status = ssp_status(state.as_deref());
            if let Some(value) = status_field(name, component, Some(status)) {
                return value;
            }
        }
        None
    }

    /// Worst resource status, `None` without system resource data
    pub fn system_resources_status(&self) -> Option<StatusId> {
        self.resources.values().map(|r| r.status).max()
    }

    /// Worst SSP component status, `None` without a report
    pub fn ssp_report_status(&self) -> Option<StatusId> {
        self.ssp
            .values()
            .map(|state| ssp_status(state.as_deref()))
            .max()
    }
}

impl FieldLookup for MapsRecord {
    fn field(&self, name: &str) -> Option<Scalar> {
        let value: Scalar = match name {
            "switch-name" => (&self.switch.switch_name).into(),
            "switch-wwn" => (&self.switch.switch_wwn).into(),
            "active-policy" => (&self.active_policy).into(),
            _ => return self.health_field(name),
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct MapsParser {
    base: BaseParser,
    records: BTreeMap<VfId, MapsRecord>,
    changed: Option<ChangedVfRecords>,
}

impl MapsParser {
    pub fn new(
        snapshot: &TelemetrySnapshot,
        previous: Option<&MapsParser>,
        thresholds: &MapsThresholds,
        accumulator: &mut SwitchStatusAccumulator,
    ) -> Self {
        let base = BaseParser::new(snapshot);

        let resources: BTreeMap<SystemResource, ResourceUsage> = snapshot
            .chassis_entries(Module::MapsSystemResources)
            .first()
            .map(|entry| {
                SystemResource::ALL
                    .into_iter()
                    .map(|resource| {
                        let usage = entry.f64_field(resource.field_name());
                        let status = resource_status(usage, resource.ok_below(thresholds));
                        (resource, ResourceUsage { usage, status })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let mut vf_ids: BTreeSet<VfId> = snapshot.vf_ids();
        for module in [Module::MapsPolicy, Module::MapsSspReport] {
            if let Some(data) = snapshot.module(module) {
                vf_ids.extend(data.keys().copied());
            }
        }

        let mut records = BTreeMap::new();
        for vf_id in vf_ids {
            let active_policy = snapshot
                .entries(Module::MapsPolicy, vf_id)
                .into_iter()
                .find(|policy| policy.bool_field("is-active-policy") == Some(true))
                .and_then(|policy| policy.str_field("name"));
            let ssp = snapshot
                .entries(Module::MapsSspReport, vf_id)
                .first()
                .map(|report| {
                    SSP_COMPONENTS
                        .iter()
                        .map(|component| (*component, report.str_field(component)))
                        .collect()
                })
                .unwrap_or_default();
            let record = MapsRecord {
                switch: SwitchIdentity::from_snapshot(snapshot, vf_id),
                active_policy,
                resources: resources.clone(),
                ssp,
            };
            if let Some(status) = record.system_resources_status() {
                accumulator.update_status(vf_id, SYSTEM_RESOURCES_MAPS_STATUS, status);
            }
            if let Some(status) = record.ssp_report_status() {
                accumulator.update_status(vf_id, SSP_REPORT_MAPS_STATUS, status);
            }
            records.insert(vf_id, record);
        }

        let changed = comparable_previous(&base, previous).map(|prev| {
            get_changed_vf_records(
                &records,
                &prev.records,
                MAPS_CHANGED,
                MAPS_CONST,
                Some(base.telemetry_hrf().as_str()),
                Some(prev.base.telemetry_hrf().as_str()),
            )
        });

        Self {
            base,
            records,
            changed,
        }
    }

    pub fn records(&self) -> &BTreeMap<VfId, MapsRecord> {
        &self.records
    }

    pub fn record(&self, vf_id: VfId) -> Option<&MapsRecord> {
        self.records.get(&vf_id)
    }

    pub fn changed(&self) -> Option<&ChangedVfRecords> {
        self.changed.as_ref()
    }
}

impl EntityParser for MapsParser {
    fn base(&self) -> &BaseParser {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn snapshot(cpu: f64, fan_health: &str, policy: &str) -> TelemetrySnapshot {
        let mut s = TelemetrySnapshot::new(Utc::now());
        s.insert_payload(
            Module::Chassis,
            -1,
            json!({"chassis": {"chassis-wwn": "10:00:00:00:00:00:00:01"}}),
        );
        s.insert_payload(
            Module::FcSwitch,
            -1,
            json!({"fibrechannel-switch": [{"name": "10:00:00:00:00:00:00:aa"}]}),
        );
        s.insert_payload(
            Module::MapsSystemResources,
            -1,
            json!({"system-resources": {"cpu-usage": cpu, "memory-usage": 40, "flash-usage": 91}}),
        );
        s.insert_payload(
            Module::MapsPolicy,
            -1,
            json!({"maps-policy": [
                {"name": "dflt_base_policy", "is-active-policy": false},
                {"name": policy, "is-active-policy": true}
            ]}),
        );
        s.insert_payload(
            Module::MapsSspReport,
            -1,
            json!({"switch-status-policy-report": {
                "switch-health": "healthy",
                "fan-health": fan_health
            }}),
        );
        s
    }

    #[test]
    fn test_resource_status_gap() {
        assert_eq!(resource_status(Some(79.9), 80.0), StatusId::Ok);
        assert_eq!(resource_status(Some(80.0), 80.0), StatusId::Warning);
        assert_eq!(resource_status(Some(89.9), 80.0), StatusId::Warning);
        assert_eq!(resource_status(Some(90.0), 80.0), StatusId::Critical);
        assert_eq!(resource_status(None, 80.0), StatusId::Unknown);
    }

    #[test]
    fn test_maps_record() {
        let mut acc = SwitchStatusAccumulator::new();
        let parser = MapsParser::new(
            &snapshot(50.0, "marginal", "custom_policy"),
            None,
            &MapsThresholds::default(),
            &mut acc,
        );
        let record = parser.record(-1).unwrap();
        assert_eq!(record.active_policy.as_deref(), Some("custom_policy"));
        assert_eq!(
            record.resource(SystemResource::Flash).unwrap().status,
            StatusId::Warning
        );
        assert_eq!(record.ssp_status("fan-health"), Some(StatusId::Warning));
        assert_eq!(record.ssp_status("flash-health"), Some(StatusId::Unknown));
        assert_eq!(
            record.field("cpu-usage-status-id"),
            Some(Scalar::Int(1))
        );
        let agg = acc.get(-1).unwrap();
        assert_eq!(agg.status(SYSTEM_RESOURCES_MAPS_STATUS), Some(StatusId::Warning));
        assert_eq!(agg.status(SSP_REPORT_MAPS_STATUS), Some(StatusId::Warning));
    }

    #[test]
    fn test_maps_changes() {
        let mut acc = SwitchStatusAccumulator::new();
        let thresholds = MapsThresholds::default();
        let prev = MapsParser::new(&snapshot(50.0, "healthy", "p1"), None, &thresholds, &mut acc);
        let now = MapsParser::new(
            &snapshot(95.0, "down", "p2"),
            Some(&prev),
            &thresholds,
            &mut acc,
        );
        let changed = &now.changed().unwrap()[&-1];
        assert_eq!(changed["active-policy"], Scalar::Text("p2".to_string()));
        assert_eq!(changed["cpu-usage-status"], Scalar::Text("Critical".to_string()));
        assert_eq!(changed["fan-health-status-prev"], Scalar::Text("OK".to_string()));
        assert_eq!(
            changed["switch-wwn"],
            Scalar::Text("10:00:00:00:00:00:00:aa".to_string())
        );
    }

    #[test]
    fn test_replaced_chassis_not_comparable() {
        let mut acc = SwitchStatusAccumulator::new();
        let thresholds = MapsThresholds::default();
        let prev = MapsParser::new(&snapshot(50.0, "healthy", "p1"), None, &thresholds, &mut acc);
        let mut swapped = snapshot(95.0, "down", "p2");
        swapped.insert_payload(
            Module::Chassis,
            -1,
            json!({"chassis": {"chassis-wwn": "10:00:00:00:00:00:00:02"}}),
        );
        let now = MapsParser::new(&swapped, Some(&prev), &thresholds, &mut acc);
        assert!(now.changed().is_none());
    }
}
