//! FC port parameters (state and physical layer)

use super::base::{BaseParser, EntityParser, SwitchIdentity, comparable_previous, slot_port};
use super::port_enums::{LongDistance, PhysicalState, PortEnableStatus, PortType};
use crate::aggregate::{PHYSICAL_STATE_PORT_STATUS, PortQuantity, SwitchStatusAccumulator};
use crate::diff::{ChangedVfTable, VfId, VfTable, get_changed_vf_table};
use crate::record::{FieldLookup, JsonFields, Scalar};
use crate::status::StatusId;
use crate::telemetry::{Module, TelemetrySnapshot};
use serde_json::Value;
use tracing::debug;

/// Fields whose change is worth logging
pub const FC_PORT_PARAMS_CHANGED: &[&str] = &[
    "port-name",
    "port-type",
    "physical-state",
    "physical-state-status",
    "port-enable-status",
    "speed-hrf",
    "long-distance",
    "neighbor-wwn",
    "pod-license",
];

/// Identity attached to every changed port record
pub const FC_PORT_PARAMS_CONST: &[&str] = &["switch-name", "switch-wwn", "slot-port", "port-wwn"];

/// One port's configuration and state
#[derive(Debug, Clone, PartialEq)]
pub struct PortParams {
    pub switch: SwitchIdentity,
    pub slot_port: String,
    pub port_index: Option<i64>,
    pub port_wwn: Option<String>,
    pub port_name: Option<String>,
    pub fcid_hex: Option<String>,
    pub port_type: Option<PortType>,
    pub physical_state: Option<PhysicalState>,
    pub enable_status: PortEnableStatus,
    /// Line rate in bits per second
    pub speed: Option<i64>,
    pub auto_negotiate: Option<bool>,
    pub long_distance: Option<LongDistance>,
    pub neighbor_wwns: Vec<String>,
    pub pod_license: Option<bool>,
    pub physical_state_status: StatusId,
}

impl PortParams {
    fn from_entry(entry: &Value, switch: &SwitchIdentity) -> Option<Self> {
        let slot_port = slot_port(&entry.str_field("name")?);
        let enable_status = PortEnableStatus::from_flags(
            entry.bool_field("is-enabled-state"),
            entry.bool_field("persistent-disable"),
        );
        let physical_state = entry
            .str_field("physical-state")
            .map(|raw| PhysicalState::parse(&raw));
        let physical_state_status = physical_state
            .as_ref()
            .map(|state| state.status(enable_status.is_enabled()))
            .unwrap_or(StatusId::Unknown);
        let neighbor_wwns = entry
            .get("neighbor")
            .and_then(|n| n.get("wwn"))
            .map(|wwns| match wwns {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|w| w.as_str().map(str::to_string))
                    .collect(),
                Value::String(w) => vec![w.clone()],
                _ => Vec::new(),
            })
            .unwrap_or_default();

        Some(Self {
            switch: switch.clone(),
            slot_port,
            port_index: entry.i64_field("index"),
            port_wwn: entry.str_field("wwn"),
            port_name: entry.str_field("user-friendly-name"),
            fcid_hex: entry.str_field("fcid-hex"),
            port_type: entry.i64_field("port-type").map(PortType::from_code),
            physical_state,
            enable_status,
            speed: entry.i64_field("speed"),
            auto_negotiate: entry.bool_field("auto-negotiate"),
            long_distance: entry.i64_field("long-distance").map(LongDistance::from_code),
            neighbor_wwns,
            pod_license: entry.bool_field("pod-license-status"),
            physical_state_status,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enable_status.is_enabled()
    }

    pub fn is_online(&self) -> bool {
        self.physical_state
            .as_ref()
            .is_some_and(PhysicalState::is_online)
    }

    /// `16G`, or `N16G` when the speed was auto-negotiated
    pub fn speed_hrf(&self) -> Option<String> {
        let speed = self.speed?;
        let gbps = if speed % 1_000_000_000 == 0 {
            format!("{}", speed / 1_000_000_000)
        } else {
            format!("{:.1}", speed as f64 / 1e9)
        };
        let prefix = if self.auto_negotiate == Some(true) {
            "N"
        } else {
            ""
        };
        Some(format!("{}{}G", prefix, gbps))
    }

    pub fn neighbor_wwn(&self) -> Option<String> {
        if self.neighbor_wwns.is_empty() {
            None
        } else {
            Some(self.neighbor_wwns.join(", "))
        }
    }
}

impl FieldLookup for PortParams {
    fn field(&self, name: &str) -> Option<Scalar> {
        let value: Scalar = match name {
            "switch-name" => (&self.switch.switch_name).into(),
            "switch-wwn" => (&self.switch.switch_wwn).into(),
            "slot-port" => self.slot_port.as_str().into(),
            "port-index" => self.port_index.into(),
            "port-wwn" => (&self.port_wwn).into(),
            "port-name" => (&self.port_name).into(),
            "fcid-hex" => (&self.fcid_hex).into(),
            "port-type" => self.port_type.map(PortType::label).into(),
            "port-type-id" => self.port_type.map(PortType::id).into(),
            "physical-state" => self.physical_state.as_ref().map(|s| s.label().to_string()).into(),
            "physical-state-id" => self.physical_state.as_ref().map(PhysicalState::id).into(),
            "physical-state-status" => self.physical_state_status.into(),
            "physical-state-status-id" => self.physical_state_status.id().into(),
            "port-enable-status" => self.enable_status.label().into(),
            "port-enable-status-id" => self.enable_status.id().into(),
            "speed" => self.speed.into(),
            "speed-hrf" => self.speed_hrf().into(),
            "auto-negotiate" => self.auto_negotiate.into(),
            "long-distance" => self.long_distance.map(LongDistance::label).into(),
            "long-distance-id" => self.long_distance.map(LongDistance::id).into(),
            "neighbor-wwn" => self.neighbor_wwn().into(),
            "neighbor-quantity" => (self.neighbor_wwns.len() as i64).into(),
            "pod-license" => self.pod_license.into(),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct PortParamsParser {
    base: BaseParser,
    ports: VfTable<PortParams>,
    changed: Option<ChangedVfTable>,
}

impl PortParamsParser {
    /// Parse every port and feed port counts and the physical-state status
    /// into the accumulator.
    pub fn new(
        snapshot: &TelemetrySnapshot,
        previous: Option<&PortParamsParser>,
        accumulator: &mut SwitchStatusAccumulator,
    ) -> Self {
        let base = BaseParser::new(snapshot);
        let mut ports = VfTable::new();

        if let Some(data) = snapshot.module(Module::FcInterface) {
            for (vf_id, response) in data {
                let switch = SwitchIdentity::from_snapshot(snapshot, *vf_id);
                let vf_ports = ports.entry(*vf_id).or_default();
                for entry in response.entries(Module::FcInterface) {
                    let Some(port) = PortParams::from_entry(entry, &switch) else {
                        debug!(vf_id, "skipping port entry without name");
                        continue;
                    };
                    Self::account(*vf_id, &port, accumulator);
                    vf_ports.insert(port.slot_port.clone(), port);
                }
            }
        }

        let changed = comparable_previous(&base, previous).map(|prev| {
            get_changed_vf_table(
                &ports,
                &prev.ports,
                FC_PORT_PARAMS_CHANGED,
                FC_PORT_PARAMS_CONST,
                Some(base.telemetry_hrf().as_str()),
                Some(prev.base.telemetry_hrf().as_str()),
            )
        });

        Self {
            base,
            ports,
            changed,
        }
    }

    fn account(vf_id: VfId, port: &PortParams, accumulator: &mut SwitchStatusAccumulator) {
        accumulator.register_vf(vf_id);
        if port.is_enabled() {
            accumulator.increment(vf_id, PortQuantity::Enabled);
            if port.port_type.is_some_and(PortType::is_universal) {
                accumulator.increment(vf_id, PortQuantity::UportGportEnabled);
            }
        }
        if port.is_online() {
            accumulator.increment(vf_id, PortQuantity::Online);
        }
        accumulator.update_status(vf_id, PHYSICAL_STATE_PORT_STATUS, port.physical_state_status);
    }

    pub fn ports(&self) -> &VfTable<PortParams> {
        &self.ports
    }

    pub fn port(&self, vf_id: VfId, slot_port: &str) -> Option<&PortParams> {
        self.ports.get(&vf_id).and_then(|vf| vf.get(slot_port))
    }

    /// `None` when there was no comparable previous snapshot
    pub fn changed(&self) -> Option<&ChangedVfTable> {
        self.changed.as_ref()
    }
}

impl EntityParser for PortParamsParser {
    fn base(&self) -> &BaseParser {
        &self.base
    }
}
