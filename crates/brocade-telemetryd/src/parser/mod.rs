//! Entity parsers
//!
//! Every parser turns raw module payloads into a normalized table and, given
//! the previous instance of the same parser kind, a changed-only table. The
//! previous instance is only borrowed during construction.

pub mod base;
pub mod chassis;
pub mod fru;
pub mod maps;
pub mod port_enums;
pub mod port_params;
pub mod port_stats;
pub mod request_status;
pub mod sfp_media;
pub mod switch;

pub use base::{BaseParser, EntityParser, comparable_previous};
pub use chassis::{ChassisParams, ChassisParser};
pub use fru::{FruKind, FruParser, FruUnit};
pub use maps::{MapsParser, MapsRecord, MapsThresholds, SystemResource};
pub use port_enums::{LongDistance, PhysicalState, PortEnableStatus, PortType, UNKNOWN_ID};
pub use port_params::{PortParams, PortParamsParser};
pub use port_stats::{PortGrowth, PortStatistics, PortStatsParser, Severity};
pub use request_status::{RequestStatus, RequestStatusParser, RequestStatusRecord};
pub use sfp_media::{SfpMedia, SfpMediaParser, WaveType};
pub use switch::{SwitchOperationalStatus, SwitchParams, SwitchParser, SwitchSummary};
