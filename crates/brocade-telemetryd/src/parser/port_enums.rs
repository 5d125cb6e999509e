//! Static code tables for FC port parameters
//!
//! FOS reports port type, enable state and long-distance mode as integers
//! and physical state as a string. Unseen codes are kept verbatim in an
//! explicit fallback variant and render with [`UNKNOWN_ID`].

use crate::status::StatusId;
use std::fmt;

/// Gauge id for any code outside the known tables
pub const UNKNOWN_ID: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    Undefined,
    EPort,
    GPort,
    UPort,
    FPort,
    LPort,
    FcoePort,
    ExPort,
    DPort,
    SimPort,
    AfPort,
    AePort,
    VePort,
    EthernetFlexPort,
    FlexPort,
    NPort,
    LbPort,
    /// Code missing from the table
    Unknown(i64),
}

impl PortType {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => PortType::Undefined,
            7 => PortType::EPort,
            10 => PortType::GPort,
            11 => PortType::UPort,
            15 => PortType::FPort,
            16 => PortType::LPort,
            17 => PortType::FcoePort,
            19 => PortType::ExPort,
            20 => PortType::DPort,
            21 => PortType::SimPort,
            22 => PortType::AfPort,
            23 => PortType::AePort,
            25 => PortType::VePort,
            26 => PortType::EthernetFlexPort,
            29 => PortType::FlexPort,
            30 => PortType::NPort,
            32768 => PortType::LbPort,
            other => PortType::Unknown(other),
        }
    }

    /// FOS code, or [`UNKNOWN_ID`] for unrecognised codes
    pub fn id(self) -> i64 {
        match self {
            PortType::Undefined => 0,
            PortType::EPort => 7,
            PortType::GPort => 10,
            PortType::UPort => 11,
            PortType::FPort => 15,
            PortType::LPort => 16,
            PortType::FcoePort => 17,
            PortType::ExPort => 19,
            PortType::DPort => 20,
            PortType::SimPort => 21,
            PortType::AfPort => 22,
            PortType::AePort => 23,
            PortType::VePort => 25,
            PortType::EthernetFlexPort => 26,
            PortType::FlexPort => 29,
            PortType::NPort => 30,
            PortType::LbPort => 32768,
            PortType::Unknown(_) => UNKNOWN_ID,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PortType::Undefined | PortType::Unknown(_) => "Unknown",
            PortType::EPort => "E-Port",
            PortType::GPort => "G-Port",
            PortType::UPort => "U-Port",
            PortType::FPort => "F-Port",
            PortType::LPort => "L-Port",
            PortType::FcoePort => "FCoE-Port",
            PortType::ExPort => "EX-Port",
            PortType::DPort => "D-Port",
            PortType::SimPort => "SIM-Port",
            PortType::AfPort => "AF-Port",
            PortType::AePort => "AE-Port",
            PortType::VePort => "VE-Port",
            PortType::EthernetFlexPort => "Ethernet-Flex-Port",
            PortType::FlexPort => "Flex-Port",
            PortType::NPort => "N-Port",
            PortType::LbPort => "LB-Port",
        }
    }

    /// Ports still waiting for a login to settle their type
    pub fn is_universal(self) -> bool {
        matches!(self, PortType::UPort | PortType::GPort)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Port physical state as reported in `physical-state`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhysicalState {
    Online,
    Offline,
    Testing,
    Faulty,
    EPort,
    FPort,
    Segmented,
    NoPort,
    NoModule,
    LaserFlt,
    NoLight,
    NoSync,
    InSync,
    PortFlt,
    DiagFlt,
    LockRef,
    NoSigdet,
    ModInv,
    ModVal,
    HardFault,
    RemoteFault,
    Unrecognized(String),
}

static PHYSICAL_STATES: [(&str, PhysicalState); 21] = [
    ("online", PhysicalState::Online),
    ("offline", PhysicalState::Offline),
    ("testing", PhysicalState::Testing),
    ("faulty", PhysicalState::Faulty),
    ("e_port", PhysicalState::EPort),
    ("f_port", PhysicalState::FPort),
    ("segmented", PhysicalState::Segmented),
    ("no_port", PhysicalState::NoPort),
    ("no_module", PhysicalState::NoModule),
    ("laser_flt", PhysicalState::LaserFlt),
    ("no_light", PhysicalState::NoLight),
    ("no_sync", PhysicalState::NoSync),
    ("in_sync", PhysicalState::InSync),
    ("port_flt", PhysicalState::PortFlt),
    ("diag_flt", PhysicalState::DiagFlt),
    ("lock_ref", PhysicalState::LockRef),
    ("no_sigdet", PhysicalState::NoSigdet),
    ("mod_inv", PhysicalState::ModInv),
    ("mod_val", PhysicalState::ModVal),
    ("hard_fault", PhysicalState::HardFault),
    ("remote_fault", PhysicalState::RemoteFault),
];

impl PhysicalState {
    /// Parse a FOS state string; dashes and underscores are interchangeable
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        PHYSICAL_STATES
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, state)| state.clone())
            .unwrap_or_else(|| PhysicalState::Unrecognized(raw.to_string()))
    }

    pub fn id(&self) -> i64 {
        PHYSICAL_STATES
            .iter()
            .position(|(_, state)| state == self)
            .map(|pos| pos as i64)
            .unwrap_or(UNKNOWN_ID)
    }

    pub fn label(&self) -> &str {
        match self {
            PhysicalState::Unrecognized(raw) => raw,
            known => PHYSICAL_STATES
                .iter()
                .find(|(_, state)| state == known)
                .map(|(name, _)| *name)
                .unwrap_or("unknown"),
        }
    }

    /// Port carries traffic
    pub fn is_online(&self) -> bool {
        matches!(
            self,
            PhysicalState::Online | PhysicalState::EPort | PhysicalState::FPort
        )
    }

    /// Health of the state; a dark port only matters when it is enabled
    pub fn status(&self, port_enabled: bool) -> StatusId {
        use PhysicalState::*;
        match self {
            Online | EPort | FPort => StatusId::Ok,
            Faulty | LaserFlt | PortFlt | DiagFlt | HardFault | RemoteFault | Segmented => {
                StatusId::Critical
            }
            Testing => StatusId::Warning,
            NoSync | InSync => {
                if port_enabled {
                    StatusId::Critical
                } else {
                    StatusId::Warning
                }
            }
            Offline | NoPort | NoModule | NoLight | NoSigdet => {
                if port_enabled {
                    StatusId::Warning
                } else {
                    StatusId::Ok
                }
            }
            // known states outside the priority table
            LockRef | ModInv | ModVal | Unrecognized(_) => StatusId::Unknown,
        }
    }
}

impl fmt::Display for PhysicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Administrative state combined with persistent disable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortEnableStatus {
    Enabled,
    Disabled,
    DisabledPersistent,
    Unknown,
}

impl PortEnableStatus {
    pub fn from_flags(is_enabled: Option<bool>, persistent_disable: Option<bool>) -> Self {
        match (is_enabled, persistent_disable) {
            (Some(true), _) => PortEnableStatus::Enabled,
            (Some(false), Some(true)) => PortEnableStatus::DisabledPersistent,
            (Some(false), _) => PortEnableStatus::Disabled,
            (None, _) => PortEnableStatus::Unknown,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            PortEnableStatus::Enabled => 1,
            PortEnableStatus::Disabled => 0,
            PortEnableStatus::DisabledPersistent => -1,
            PortEnableStatus::Unknown => UNKNOWN_ID,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PortEnableStatus::Enabled => "Enabled",
            PortEnableStatus::Disabled => "Disabled",
            PortEnableStatus::DisabledPersistent => "Disabled (Persistent)",
            PortEnableStatus::Unknown => "Unknown",
        }
    }

    pub fn is_enabled(self) -> bool {
        self == PortEnableStatus::Enabled
    }
}

impl fmt::Display for PortEnableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Long distance buffer allocation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LongDistance {
    L0,
    Le,
    Ld,
    Ls,
    Unknown(i64),
}

impl LongDistance {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => LongDistance::L0,
            3 => LongDistance::Le,
            4 => LongDistance::Ld,
            5 => LongDistance::Ls,
            other => LongDistance::Unknown(other),
        }
    }

    pub fn id(self) -> i64 {
        match self {
            LongDistance::L0 => 0,
            LongDistance::Le => 3,
            LongDistance::Ld => 4,
            LongDistance::Ls => 5,
            LongDistance::Unknown(_) => UNKNOWN_ID,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LongDistance::L0 => "L0",
            LongDistance::Le => "LE",
            LongDistance::Ld => "LD",
            LongDistance::Ls => "LS",
            LongDistance::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for LongDistance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
