//! Brocade FOS REST telemetry daemon
//!
//! Polls a Brocade Fibre Channel switch over the FOS REST API, turns every
//! module into typed records, detects what changed since the previous poll,
//! rolls port, SFP, FRU and MAPS health up into per-switch statuses and
//! exports the result as Prometheus gauges.

pub mod aggregate;
pub mod client;
pub mod collector;
pub mod config;
pub mod diff;
pub mod error;
pub mod gauges;
pub mod history;
pub mod hrf;
pub mod metrics_server;
pub mod parser;
pub mod poller;
pub mod record;
pub mod status;
pub mod systemd;
pub mod telemetry;

pub use aggregate::{PortQuantity, SwitchAggregate, SwitchStatusAccumulator};
pub use client::{RestClient, TelemetrySource};
pub use collector::{Collector, CycleReport};
pub use config::TelemetryConfig;
pub use diff::{VF_DISABLED, VfId};
pub use error::*;
pub use gauges::Gauges;
pub use history::{ChangeLog, ChangeLogEntry, ParserHistory};
pub use metrics_server::{
    BoundMetricsServer, MetricsServer, MetricsServerConfig, spawn_metrics_server,
};
pub use poller::{Poller, shutdown_on_ctrl_c};
pub use record::{FieldLookup, Record, Scalar};
pub use status::StatusId;
pub use systemd::SystemdNotifier;
pub use telemetry::{Module, TelemetrySnapshot, VfResponse};
