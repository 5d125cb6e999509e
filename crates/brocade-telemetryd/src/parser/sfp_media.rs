//! SFP media (transceiver) readings

use super::base::{BaseParser, EntityParser, SwitchIdentity, comparable_previous, slot_port};
use super::port_params::PortParamsParser;
use crate::aggregate::{
    SFP_RX_POWER_PORT_STATUS, SFP_TX_POWER_PORT_STATUS, SwitchStatusAccumulator,
};
use crate::diff::{ChangedVfTable, VfId, VfTable, get_changed_vf_table};
use crate::hrf::uw_to_dbm;
use crate::record::{FieldLookup, JsonFields, Scalar, status_field};
use crate::status::StatusId;
use crate::telemetry::{Module, TelemetrySnapshot};
use serde_json::Value;
use std::fmt;

pub const SFP_MEDIA_CHANGED: &[&str] = &[
    "vendor-name",
    "part-number",
    "serial-number",
    "wave-type",
    "rx-power-status",
    "tx-power-status",
];

const SFP_MEDIA_CONST: &[&str] = &["switch-name", "switch-wwn", "slot-port"];

/// Optical power alarm and warning levels in microwatts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerThresholds {
    pub low_alarm: f64,
    pub low_warning: f64,
    pub high_warning: f64,
    pub high_alarm: f64,
}

impl PowerThresholds {
    pub fn status(&self, microwatts: Option<f64>) -> StatusId {
        match microwatts {
            None => StatusId::Unknown,
            Some(v) if v <= self.low_alarm || v >= self.high_alarm => StatusId::Critical,
            Some(v) if v <= self.low_warning || v >= self.high_warning => StatusId::Warning,
            Some(_) => StatusId::Ok,
        }
    }
}

const SW_RX_POWER: PowerThresholds = PowerThresholds {
    low_alarm: 31.6,
    low_warning: 50.1,
    high_warning: 1258.9,
    high_alarm: 1584.9,
};
const SW_TX_POWER: PowerThresholds = PowerThresholds {
    low_alarm: 125.9,
    low_warning: 158.5,
    high_warning: 794.3,
    high_alarm: 1000.0,
};
const LW_RX_POWER: PowerThresholds = PowerThresholds {
    low_alarm: 10.0,
    low_warning: 15.8,
    high_warning: 631.0,
    high_alarm: 794.3,
};
const LW_TX_POWER: PowerThresholds = PowerThresholds {
    low_alarm: 63.1,
    low_warning: 79.4,
    high_warning: 1000.0,
    high_alarm: 1258.9,
};

/// Optical wavelength class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaveType {
    ShortWave,
    LongWave,
    Unknown,
}

impl WaveType {
    pub fn from_wavelength(nm: Option<i64>) -> Self {
        match nm {
            Some(nm) if nm >= 1200 => WaveType::LongWave,
            Some(nm) if nm > 0 => WaveType::ShortWave,
            _ => WaveType::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WaveType::ShortWave => "Short Wave Laser",
            WaveType::LongWave => "Long Wave Laser",
            WaveType::Unknown => "Unknown",
        }
    }

    /// Rx and tx tables; unknown media is judged as short wave
    pub fn thresholds(self) -> (PowerThresholds, PowerThresholds) {
        match self {
            WaveType::LongWave => (LW_RX_POWER, LW_TX_POWER),
            WaveType::ShortWave | WaveType::Unknown => (SW_RX_POWER, SW_TX_POWER),
        }
    }
}

impl fmt::Display for WaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SfpMedia {
    pub switch: SwitchIdentity,
    pub slot_port: String,
    pub vendor_name: Option<String>,
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub wavelength: Option<i64>,
    pub wave_type: WaveType,
    pub rx_power_uw: Option<f64>,
    pub tx_power_uw: Option<f64>,
    pub temperature: Option<f64>,
    pub current: Option<f64>,
    pub voltage: Option<f64>,
    pub rx_power_status: StatusId,
    pub tx_power_status: StatusId,
}

impl SfpMedia {
    fn from_entry(
        entry: &Value,
        switch: &SwitchIdentity,
        port_enabled: Option<bool>,
    ) -> Option<Self> {
        let slot_port = slot_port(&entry.str_field("name")?);
        let wavelength = entry.i64_field("wavelength");
        let wave_type = WaveType::from_wavelength(wavelength);
        let rx_power_uw = entry.f64_field("rx-power");
        let tx_power_uw = entry.f64_field("tx-power");
        let (rx_table, tx_table) = wave_type.thresholds();
        let (rx_power_status, tx_power_status) = if port_enabled == Some(false) {
            (StatusId::Ok, StatusId::Ok)
        } else {
            (rx_table.status(rx_power_uw), tx_table.status(tx_power_uw))
        };
        Some(Self {
            switch: switch.clone(),
            slot_port,
            vendor_name: entry.str_field("vendor-name").map(|v| v.trim().to_string()),
            part_number: entry.str_field("part-number").map(|v| v.trim().to_string()),
            serial_number: entry.str_field("serial-number").map(|v| v.trim().to_string()),
            wavelength,
            wave_type,
            rx_power_uw,
            tx_power_uw,
            temperature: entry.f64_field("temperature"),
            current: entry.f64_field("current"),
            voltage: entry.f64_field("voltage"),
            rx_power_status,
            tx_power_status,
        })
    }

    pub fn rx_power_dbm(&self) -> Option<f64> {
        self.rx_power_uw.and_then(uw_to_dbm)
    }

    pub fn tx_power_dbm(&self) -> Option<f64> {
        self.tx_power_uw.and_then(uw_to_dbm)
    }
}

impl FieldLookup for SfpMedia {
    fn field(&self, name: &str) -> Option<Scalar> {
        let value: Scalar = match name {
            "switch-name" => (&self.switch.switch_name).into(),
            "switch-wwn" => (&self.switch.switch_wwn).into(),
            "slot-port" => self.slot_port.as_str().into(),
            "vendor-name" => (&self.vendor_name).into(),
            "part-number" => (&self.part_number).into(),
            "serial-number" => (&self.serial_number).into(),
            "wavelength" => self.wavelength.into(),
            "wave-type" => self.wave_type.label().into(),
            "rx-power" => self.rx_power_uw.into(),
            "tx-power" => self.tx_power_uw.into(),
            "rx-power-dbm" => self.rx_power_dbm().into(),
            "tx-power-dbm" => self.tx_power_dbm().into(),
            "temperature" => self.temperature.into(),
            "current" => self.current.into(),
            "voltage" => self.voltage.into(),
            _ => {
                return status_field(name, "rx-power", Some(self.rx_power_status))
                    .or_else(|| status_field(name, "tx-power", Some(self.tx_power_status)))
                    .flatten();
            }
        };
        Some(value)
    }
}

#[derive(Debug, Clone)]
pub struct SfpMediaParser {
    base: BaseParser,
    media: VfTable<SfpMedia>,
    changed: Option<ChangedVfTable>,
}

impl SfpMediaParser {
    /// Parse transceiver readings. Ports administratively disabled in the
    /// current port parameters read OK regardless of optical power.
    pub fn new(
        snapshot: &TelemetrySnapshot,
        previous: Option<&SfpMediaParser>,
        port_params: &PortParamsParser,
        accumulator: &mut SwitchStatusAccumulator,
    ) -> Self {
        let base = BaseParser::new(snapshot);
        let mut media = VfTable::new();

        if let Some(data) = snapshot.module(Module::MediaRdp) {
            for (vf_id, response) in data {
                let vf_id = *vf_id;
                let switch = SwitchIdentity::from_snapshot(snapshot, vf_id);
                let vf_media = media.entry(vf_id).or_default();
                for entry in response.entries(Module::MediaRdp) {
                    let enabled = entry
                        .str_field("name")
                        .and_then(|name| port_params.port(vf_id, &slot_port(&name)))
                        .map(|port| port.is_enabled());
                    let Some(sfp) = SfpMedia::from_entry(entry, &switch, enabled) else {
                        continue;
                    };
                    Self::account(vf_id, &sfp, accumulator);
                    vf_media.insert(sfp.slot_port.clone(), sfp);
                }
            }
        }

        let changed = comparable_previous(&base, previous).map(|prev| {
            get_changed_vf_table(
                &media,
                &prev.media,
                SFP_MEDIA_CHANGED,
                SFP_MEDIA_CONST,
                Some(base.telemetry_hrf().as_str()),
                Some(prev.base.telemetry_hrf().as_str()),
            )
        });

        Self {
            base,
            media,
            changed,
        }
    }

    fn account(vf_id: VfId, sfp: &SfpMedia, accumulator: &mut SwitchStatusAccumulator) {
        accumulator.update_status(vf_id, SFP_RX_POWER_PORT_STATUS, sfp.rx_power_status);
        accumulator.update_status(vf_id, SFP_TX_POWER_PORT_STATUS, sfp.tx_power_status);
    }

    pub fn media(&self) -> &VfTable<SfpMedia> {
        &self.media
    }

    pub fn changed(&self) -> Option<&ChangedVfTable> {
        self.changed.as_ref()
    }
}

impl EntityParser for SfpMediaParser {
    fn base(&self) -> &BaseParser {
        &self.base
    }
}
