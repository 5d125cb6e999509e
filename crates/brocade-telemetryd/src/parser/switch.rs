//! Logical switch parameters and the per-switch status summary

use super::base::{BaseParser, EntityParser, comparable_previous};
use super::port_enums::UNKNOWN_ID;
use crate::aggregate::{PortQuantity, SwitchAggregate, SwitchStatusAccumulator};
use crate::diff::{ChangedVfRecords, VfId, get_changed_vf_records};
use crate::record::{FieldLookup, JsonFields, Scalar, status_field};
use crate::status::StatusId;
use crate::telemetry::{Module, TelemetrySnapshot};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const SWITCH_PARAMS_CHANGED: &[&str] = &[
    "switch-name",
    "switch-state",
    "switch-role",
    "domain-id",
    "firmware-version",
    "fabric-name",
    "switch-enabled",
];

const SWITCH_PARAMS_CONST: &[&str] = &["switch-wwn", "vf-id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchOperationalStatus {
    Undefined,
    Online,
    Offline,
    Testing,
    Unknown(i64),
}

impl SwitchOperationalStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => SwitchOperationalStatus::Undefined,
            2 => SwitchOperationalStatus::Online,
            3 => SwitchOperationalStatus::Offline,
            7 => SwitchOperationalStatus::Testing,
            other => SwitchOperationalStatus::Unknown(other),
        }
    }

    pub fn id(self) -> i64 {
        match self {
            SwitchOperationalStatus::Undefined => 0,
            SwitchOperationalStatus::Online => 2,
            SwitchOperationalStatus::Offline => 3,
            SwitchOperationalStatus::Testing => 7,
            SwitchOperationalStatus::Unknown(_) => UNKNOWN_ID,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SwitchOperationalStatus::Undefined => "Undefined",
            SwitchOperationalStatus::Online => "Online",
            SwitchOperationalStatus::Offline => "Offline",
            SwitchOperationalStatus::Testing => "Testing",
            SwitchOperationalStatus::Unknown(_) => "Unknown",
        }
    }

    /// An offline switch only alarms when it is supposed to be enabled
    pub fn status(self, enabled: bool) -> StatusId {
        match self {
            SwitchOperationalStatus::Online => StatusId::Ok,
            SwitchOperationalStatus::Testing => StatusId::Warning,
            SwitchOperationalStatus::Offline if enabled => StatusId::Critical,
            SwitchOperationalStatus::Offline => StatusId::Warning,
            SwitchOperationalStatus::Undefined | SwitchOperationalStatus::Unknown(_) => {
                StatusId::Unknown
            }
        }
    }
}

impl fmt::Display for SwitchOperationalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchParams {
    pub vf_id: VfId,
    pub switch_wwn: Option<String>,
    pub switch_name: Option<String>,
    pub domain_id: Option<i64>,
    pub fabric_name: Option<String>,
    pub firmware_version: Option<String>,
    pub model: Option<String>,
    pub principal: Option<bool>,
    pub enabled: Option<bool>,
    pub operational_status: Option<SwitchOperationalStatus>,
}

impl SwitchParams {
    fn from_entry(vf_id: VfId, entry: &Value) -> Self {
        Self {
            vf_id,
            switch_wwn: entry.str_field("name"),
            switch_name: entry.str_field("user-friendly-name"),
            domain_id: entry.i64_field("domain-id"),
            fabric_name: entry.str_field("fabric-user-friendly-name"),
            firmware_version: entry.str_field("firmware-version"),
            model: entry.str_field("model"),
            principal: entry.bool_field("principal"),
            enabled: entry.bool_field("is-enabled-state"),
            operational_status: entry
                .i64_field("operational-status")
                .map(SwitchOperationalStatus::from_code),
        }
    }

    pub fn role(&self) -> Option<&'static str> {
        self.principal
            .map(|p| if p { "Principal" } else { "Subordinate" })
    }

    pub fn state_status(&self) -> StatusId {
        self.operational_status
            .map(|s| s.status(self.enabled.unwrap_or(true)))
            .unwrap_or(StatusId::Unknown)
    }
}

impl FieldLookup for SwitchParams {
    fn field(&self, name: &str) -> Option<Scalar> {
        let value: Scalar = match name {
            "vf-id" => i64::from(self.vf_id).into(),
            "switch-wwn" => (&self.switch_wwn).into(),
            "switch-name" => (&self.switch_name).into(),
            "domain-id" => self.domain_id.into(),
            "fabric-name" => (&self.fabric_name).into(),
            "firmware-version" => (&self.firmware_version).into(),
            "model" => (&self.model).into(),
            "switch-role" => self.role().into(),
            "switch-enabled" => self.enabled.into(),
            "switch-state" => self.operational_status.map(|s| s.label()).into(),
            "switch-state-id" => self.operational_status.map(|s| s.id()).into(),
            _ => return status_field(name, "switch-state", Some(self.state_status())).flatten(),
        };
        Some(value)
    }
}

/// Switch identity, port counts and every aggregated status of one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchSummary {
    pub vf_id: VfId,
    pub switch_name: Option<String>,
    pub switch_wwn: Option<String>,
    pub state_status: StatusId,
    pub quantities: BTreeMap<PortQuantity, u32>,
    pub statuses: BTreeMap<&'static str, StatusId>,
    /// Worst of all aggregated status fields
    pub switch_status: Option<StatusId>,
}

impl SwitchSummary {
    fn new(
        params: Option<&SwitchParams>,
        vf_id: VfId,
        aggregate: Option<&SwitchAggregate>,
    ) -> Self {
        let quantities = PortQuantity::ALL
            .into_iter()
            .map(|q| (q, aggregate.map(|a| a.quantity(q)).unwrap_or(0)))
            .collect();
        Self {
            vf_id,
            switch_name: params.and_then(|p| p.switch_name.clone()),
            switch_wwn: params.and_then(|p| p.switch_wwn.clone()),
            state_status: params
                .map(SwitchParams::state_status)
                .unwrap_or(StatusId::Unknown),
            quantities,
            statuses: aggregate.map(|a| a.statuses().clone()).unwrap_or_default(),
            switch_status: aggregate.and_then(SwitchAggregate::worst_status),
        }
    }

    /// Port quantity or aggregated status id
    fn aggregate_field(&self, name: &str) -> Option<Scalar> {
        if let Some(q) = PortQuantity::ALL.iter().find(|q| q.field_name() == name) {
            return Some(i64::from(self.quantities.get(q).copied().unwrap_or(0)).into());
        }
        self.statuses.get(name).map(|s| s.id().into())
    }
}

impl FieldLookup for SwitchSummary {
    fn field(&self, name: &str) -> Option<Scalar> {
        let value: Scalar = match name {
            "vf-id" => i64::from(self.vf_id).into(),
            "switch-name" => (&self.switch_name).into(),
            "switch-wwn" => (&self.switch_wwn).into(),
            "switch-status-id" => self.switch_status.map(StatusId::id).into(),
            "switch-status" => self.switch_status.into(),
            _ => return self.aggregate_field(name),
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct SwitchParser {
    base: BaseParser,
    switches: BTreeMap<VfId, SwitchParams>,
    changed: Option<ChangedVfRecords>,
}

impl SwitchParser {
    pub fn new(snapshot: &TelemetrySnapshot, previous: Option<&SwitchParser>) -> Self {
        let base = BaseParser::new(snapshot);
        let mut switches = BTreeMap::new();
        if let Some(data) = snapshot.module(Module::FcSwitch) {
            for (vf_id, response) in data {
                if let Some(entry) = response.entries(Module::FcSwitch).first() {
                    switches.insert(*vf_id, SwitchParams::from_entry(*vf_id, entry));
                }
            }
        }

        let changed = comparable_previous(&base, previous).map(|prev| {
            get_changed_vf_records(
                &switches,
                &prev.switches,
                SWITCH_PARAMS_CHANGED,
                SWITCH_PARAMS_CONST,
                Some(base.telemetry_hrf().as_str()),
                Some(prev.base.telemetry_hrf().as_str()),
            )
        });

        Self {
            base,
            switches,
            changed,
        }
    }

    pub fn switches(&self) -> &BTreeMap<VfId, SwitchParams> {
        &self.switches
    }

    pub fn switch(&self, vf_id: VfId) -> Option<&SwitchParams> {
        self.switches.get(&vf_id)
    }

    /// Summary of every switch known either from telemetry or the accumulator.
    /// Read once all entity passes of the cycle have run.
    pub fn summaries(&self, accumulator: &SwitchStatusAccumulator) -> Vec<SwitchSummary> {
        let mut vf_ids: Vec<VfId> = self.switches.keys().copied().collect();
        vf_ids.extend(accumulator.vf_ids());
        vf_ids.sort_unstable();
        vf_ids.dedup();
        vf_ids
            .into_iter()
            .map(|vf_id| SwitchSummary::new(self.switch(vf_id), vf_id, accumulator.get(vf_id)))
            .collect()
    }

    pub fn changed(&self) -> Option<&ChangedVfRecords> {
        self.changed.as_ref()
    }
}

impl EntityParser for SwitchParser {
    fn base(&self) -> &BaseParser {
        &self.base
    }
}
