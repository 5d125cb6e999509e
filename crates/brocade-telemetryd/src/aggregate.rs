//! Switch-level status accumulator
//!
//! Port, SFP, FRU and MAPS passes ratchet worst-case status ids into one
//! entry per virtual fabric. The collector owns the accumulator and calls
//! [`SwitchStatusAccumulator::reset_for_cycle`] once per poll, never per port.

use crate::diff::VfId;
use crate::status::{StatusId, ratchet};
use std::collections::BTreeMap;

pub const HIGH_SEVERITY_PORT_STATUS: &str = "high-severity-errors_port-status-id";
pub const MEDIUM_SEVERITY_PORT_STATUS: &str = "medium-severity-errors_port-status-id";
pub const LOW_SEVERITY_PORT_STATUS: &str = "low-severity-errors_port-status-id";
pub const PHYSICAL_STATE_PORT_STATUS: &str = "physical-state_port-status-id";
pub const THROUGHPUT_PORT_STATUS: &str = "throughput_port-status-id";
pub const SFP_RX_POWER_PORT_STATUS: &str = "sfp-rx-power_port-status-id";
pub const SFP_TX_POWER_PORT_STATUS: &str = "sfp-tx-power_port-status-id";
pub const FAN_FRU_STATUS: &str = "fan_fru-status-id";
pub const POWER_SUPPLY_FRU_STATUS: &str = "power-supply_fru-status-id";
pub const SENSOR_FRU_STATUS: &str = "sensor_fru-status-id";
pub const BLADE_FRU_STATUS: &str = "blade_fru-status-id";
pub const SYSTEM_RESOURCES_MAPS_STATUS: &str = "system-resources_maps-status-id";
pub const SSP_REPORT_MAPS_STATUS: &str = "ssp-report_maps-status-id";

/// Port counts accumulated while iterating port parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PortQuantity {
    Enabled,
    Online,
    UportGportEnabled,
}

impl PortQuantity {
    pub const ALL: [PortQuantity; 3] = [
        PortQuantity::Enabled,
        PortQuantity::Online,
        PortQuantity::UportGportEnabled,
    ];

    pub fn field_name(self) -> &'static str {
        match self {
            PortQuantity::Enabled => "enabled-port-quantity",
            PortQuantity::Online => "online-port-quantity",
            PortQuantity::UportGportEnabled => "uport-gport-enabled-quantity",
        }
    }
}

/// Aggregate for one logical switch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwitchAggregate {
    statuses: BTreeMap<&'static str, StatusId>,
    quantities: BTreeMap<PortQuantity, u32>,
}

impl SwitchAggregate {
    /// Worst status seen for a field this cycle
    pub fn status(&self, field: &str) -> Option<StatusId> {
        self.statuses.get(field).copied()
    }

    pub fn statuses(&self) -> &BTreeMap<&'static str, StatusId> {
        &self.statuses
    }

    pub fn quantity(&self, quantity: PortQuantity) -> u32 {
        self.quantities.get(&quantity).copied().unwrap_or(0)
    }

    /// Worst status across every field
    pub fn worst_status(&self) -> Option<StatusId> {
        self.statuses.values().copied().max()
    }

    fn update(&mut self, field: &'static str, status: StatusId) {
        let mut slot = self.statuses.get(field).copied();
        ratchet(&mut slot, status);
        if let Some(status) = slot {
            self.statuses.insert(field, status);
        }
    }
}

/// Per-cycle accumulator keyed by virtual fabric
#[derive(Debug, Clone, Default)]
pub struct SwitchStatusAccumulator {
    switches: BTreeMap<VfId, SwitchAggregate>,
}

impl SwitchStatusAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything accumulated by the previous cycle
    pub fn reset_for_cycle(&mut self) {
        self.switches.clear();
    }

    /// Make sure a logical switch has an entry even if nothing reports on it
    pub fn register_vf(&mut self, vf_id: VfId) {
        self.switches.entry(vf_id).or_default();
    }

    pub fn vf_ids(&self) -> Vec<VfId> {
        self.switches.keys().copied().collect()
    }

    /// Ratchet a status field upward for one logical switch
    pub fn update_status(&mut self, vf_id: VfId, field: &'static str, status: StatusId) {
        self.switches.entry(vf_id).or_default().update(field, status);
    }

    /// Ratchet a chassis-wide status into every registered logical switch
    pub fn update_chassis_status(&mut self, field: &'static str, status: StatusId) {
        for aggregate in self.switches.values_mut() {
            aggregate.update(field, status);
        }
    }

    pub fn increment(&mut self, vf_id: VfId, quantity: PortQuantity) {
        *self
            .switches
            .entry(vf_id)
            .or_default()
            .quantities
            .entry(quantity)
            .or_insert(0) += 1;
    }

    pub fn get(&self, vf_id: VfId) -> Option<&SwitchAggregate> {
        self.switches.get(&vf_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VfId, &SwitchAggregate)> {
        self.switches.iter()
    }
}
