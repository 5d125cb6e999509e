//! Raw FOS REST telemetry as fetched in one poll cycle
//!
//! Each module is fetched per virtual fabric. A fetch either carries a
//! `Response` payload or a failure description; parsers treat any fetch
//! without `Response` as absent data.

use crate::diff::{VF_DISABLED, VfId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// FOS REST module polled by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Module {
    Chassis,
    LogicalSwitch,
    FcSwitch,
    FcInterface,
    FcStatistics,
    MediaRdp,
    FruFan,
    FruPowerSupply,
    FruSensor,
    FruBlade,
    MapsSystemResources,
    MapsPolicy,
    MapsSspReport,
}

impl Module {
    pub const ALL: [Module; 13] = [
        Module::Chassis,
        Module::LogicalSwitch,
        Module::FcSwitch,
        Module::FcInterface,
        Module::FcStatistics,
        Module::MediaRdp,
        Module::FruFan,
        Module::FruPowerSupply,
        Module::FruSensor,
        Module::FruBlade,
        Module::MapsSystemResources,
        Module::MapsPolicy,
        Module::MapsSspReport,
    ];

    /// Path below `/rest/running/`
    pub fn uri(self) -> &'static str {
        match self {
            Module::Chassis => "brocade-chassis/chassis",
            Module::LogicalSwitch => {
                "brocade-fibrechannel-logical-switch/fibrechannel-logical-switch"
            }
            Module::FcSwitch => "brocade-fibrechannel-switch/fibrechannel-switch",
            Module::FcInterface => "brocade-interface/fibrechannel",
            Module::FcStatistics => "brocade-interface/fibrechannel-statistics",
            Module::MediaRdp => "brocade-media/media-rdp",
            Module::FruFan => "brocade-fru/fan",
            Module::FruPowerSupply => "brocade-fru/power-supply",
            Module::FruSensor => "brocade-fru/sensor",
            Module::FruBlade => "brocade-fru/blade",
            Module::MapsSystemResources => "brocade-maps/system-resources",
            Module::MapsPolicy => "brocade-maps/maps-policy",
            Module::MapsSspReport => "brocade-maps/switch-status-policy-report",
        }
    }

    /// Key of the payload inside `Response`
    pub fn container(self) -> &'static str {
        let uri = self.uri();
        uri.rsplit('/').next().unwrap_or(uri)
    }

    /// Chassis-wide modules are fetched once rather than per virtual fabric
    pub fn is_chassis_scoped(self) -> bool {
        matches!(
            self,
            Module::Chassis
                | Module::LogicalSwitch
                | Module::FruFan
                | Module::FruPowerSupply
                | Module::FruSensor
                | Module::FruBlade
                | Module::MapsSystemResources
        )
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.container())
    }
}

/// Outcome of one module fetch for one virtual fabric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VfResponse {
    Payload {
        #[serde(rename = "Response")]
        response: Value,
    },
    Failure {
        #[serde(rename = "status-code", default)]
        status_code: Option<u16>,
        #[serde(rename = "error-message", default)]
        error_message: Option<String>,
        #[serde(default)]
        date: Option<String>,
        #[serde(default)]
        time: Option<String>,
    },
}

impl VfResponse {
    /// Failure stamped with the current date and time
    pub fn failure(status_code: Option<u16>, error_message: Option<String>) -> Self {
        let now = Utc::now();
        VfResponse::Failure {
            status_code,
            error_message,
            date: Some(now.format("%Y-%m-%d").to_string()),
            time: Some(now.format("%H:%M:%S").to_string()),
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            VfResponse::Payload { response } => Some(response),
            VfResponse::Failure { .. } => None,
        }
    }

    /// Entries of the module container; a single object counts as one entry
    pub fn entries(&self, module: Module) -> Vec<&Value> {
        let Some(container) = self.payload().and_then(|r| r.get(module.container())) else {
            return Vec::new();
        };
        match container {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![container],
            _ => Vec::new(),
        }
    }
}

/// Module fetches keyed by virtual fabric
pub type ModuleData = BTreeMap<VfId, VfResponse>;

/// Everything fetched in one poll cycle
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    pub collected_at: DateTime<Utc>,
    pub modules: BTreeMap<Module, ModuleData>,
}

impl TelemetrySnapshot {
    pub fn new(collected_at: DateTime<Utc>) -> Self {
        Self {
            collected_at,
            modules: BTreeMap::new(),
        }
    }

    /// Record the outcome of one fetch
    pub fn insert(&mut self, module: Module, vf_id: VfId, response: VfResponse) {
        self.modules
            .entry(module)
            .or_default()
            .insert(vf_id, response);
    }

    /// Record a successful payload
    pub fn insert_payload(&mut self, module: Module, vf_id: VfId, response: Value) {
        self.insert(module, vf_id, VfResponse::Payload { response });
    }

    pub fn module(&self, module: Module) -> Option<&ModuleData> {
        self.modules.get(&module)
    }

    /// Entries of a per-vf module for one virtual fabric
    pub fn entries(&self, module: Module, vf_id: VfId) -> Vec<&Value> {
        self.module(module)
            .and_then(|data| data.get(&vf_id))
            .map(|response| response.entries(module))
            .unwrap_or_default()
    }

    /// Entries of a chassis-scoped module, from whichever vf carried a payload
    pub fn chassis_entries(&self, module: Module) -> Vec<&Value> {
        self.module(module)
            .and_then(|data| data.values().find(|r| r.payload().is_some()))
            .map(|response| response.entries(module))
            .unwrap_or_default()
    }

    /// Virtual fabrics the per-vf switch module was fetched for
    pub fn vf_ids(&self) -> BTreeSet<VfId> {
        self.module(Module::FcSwitch)
            .map(|data| data.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Date and time of the poll, formatted like FOS error responses
    pub fn telemetry_date(&self) -> String {
        self.collected_at.format("%Y-%m-%d").to_string()
    }

    pub fn telemetry_time(&self) -> String {
        self.collected_at.format("%H:%M:%S").to_string()
    }
}

/// Extract vf ids from a logical-switch payload; VF disabled yields `[-1]`
pub fn discover_vf_ids(logical_switches: Option<&VfResponse>) -> Vec<VfId> {
    let ids: BTreeSet<VfId> = logical_switches
        .map(|r| r.entries(Module::LogicalSwitch))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| entry.get("fabric-id").and_then(Value::as_i64))
        .filter_map(|id| VfId::try_from(id).ok())
        .collect();
    if ids.is_empty() {
        vec![VF_DISABLED]
    } else {
        ids.into_iter().collect()
    }
}
