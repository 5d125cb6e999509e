//! One poll cycle over every entity parser
//!
//! The collector owns the parser histories, the switch status accumulator
//! and the change log. Parsers run in dependency order: port statistics and
//! SFP media read the port parameters of the same cycle, FRU and MAPS ratchet
//! into switches registered by the earlier passes.

use crate::aggregate::SwitchStatusAccumulator;
use crate::diff::{ChangedRecord, VfId};
use crate::history::{ChangeLog, ChangeLogEntry, ParserHistory};
use crate::parser::{
    ChassisParser, FruParser, MapsParser, MapsThresholds, PortParamsParser, PortStatsParser,
    RequestStatusParser, SfpMediaParser, SwitchParser, SwitchSummary,
};
use crate::record::PREV_TAG;
use crate::telemetry::{Module, TelemetrySnapshot};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

pub const SOURCE_CHASSIS: &str = "chassis";
pub const SOURCE_SWITCH: &str = "switch";
pub const SOURCE_PORT_PARAMS: &str = "port-params";
pub const SOURCE_PORT_STATS: &str = "port-stats";
pub const SOURCE_SFP_MEDIA: &str = "sfp-media";
pub const SOURCE_FRU: &str = "fru";
pub const SOURCE_MAPS: &str = "maps";
pub const SOURCE_REQUEST_STATUS: &str = "request-status";

/// What one cycle produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    pub cycle: u64,
    /// Entries pushed into the change log
    pub changes: usize,
    /// Requests that did not come back OK
    pub failed_requests: usize,
    /// Logical switches known to the accumulator
    pub switches: usize,
}

/// Runs the parsers for each snapshot and keeps their history
#[derive(Debug)]
pub struct Collector {
    chassis: ParserHistory<ChassisParser>,
    switch: ParserHistory<SwitchParser>,
    port_params: ParserHistory<PortParamsParser>,
    port_stats: ParserHistory<PortStatsParser>,
    sfp_media: ParserHistory<SfpMediaParser>,
    fru: ParserHistory<FruParser>,
    maps: ParserHistory<MapsParser>,
    request_status: ParserHistory<RequestStatusParser>,
    accumulator: SwitchStatusAccumulator,
    change_log: ChangeLog,
    maps_thresholds: MapsThresholds,
    cycles: u64,
}

impl Collector {
    pub fn new(change_log_capacity: usize, maps_thresholds: MapsThresholds) -> Self {
        Self {
            chassis: ParserHistory::new(),
            switch: ParserHistory::new(),
            port_params: ParserHistory::new(),
            port_stats: ParserHistory::new(),
            sfp_media: ParserHistory::new(),
            fru: ParserHistory::new(),
            maps: ParserHistory::new(),
            request_status: ParserHistory::new(),
            accumulator: SwitchStatusAccumulator::new(),
            change_log: ChangeLog::new(change_log_capacity),
            maps_thresholds,
            cycles: 0,
        }
    }

    /// Parse one snapshot against the previous cycle.
    ///
    /// Never fails: modules that were not fetched simply produce empty tables.
    pub fn process(&mut self, snapshot: &TelemetrySnapshot) -> CycleReport {
        self.cycles += 1;
        let mut changes = 0;

        self.accumulator.reset_for_cycle();
        for vf_id in snapshot.vf_ids() {
            self.accumulator.register_vf(vf_id);
        }
        if let Some(data) = snapshot.module(Module::FcInterface) {
            for vf_id in data.keys() {
                self.accumulator.register_vf(*vf_id);
            }
        }

        let chassis = ChassisParser::new(snapshot, self.chassis.current());
        if let Some(changed) = chassis.changed() {
            changes += self.log_change(snapshot.collected_at, SOURCE_CHASSIS, None, None, changed);
        }

        let switch = SwitchParser::new(snapshot, self.switch.current());
        for (vf_id, changed) in switch.changed().into_iter().flatten() {
            changes += self.log_change(
                snapshot.collected_at,
                SOURCE_SWITCH,
                Some(*vf_id),
                None,
                changed,
            );
        }

        let port_params =
            PortParamsParser::new(snapshot, self.port_params.current(), &mut self.accumulator);
        let port_stats = PortStatsParser::new(
            snapshot,
            self.port_stats.current(),
            &port_params,
            &mut self.accumulator,
        );
        for (vf_id, ports) in port_stats.growth() {
            for growth in ports.values() {
                let counters = growth
                    .deltas
                    .iter()
                    .map(|(counter, delta)| format!("{}=+{}", counter, delta))
                    .collect::<Vec<_>>()
                    .join(", ");
                info!(
                    vf_id,
                    slot_port = %growth.slot_port,
                    switch_name = growth.switch.switch_name.as_deref().unwrap_or(""),
                    counters = %counters,
                    "port counters grew"
                );
            }
        }

        let sfp_media = SfpMediaParser::new(
            snapshot,
            self.sfp_media.current(),
            &port_params,
            &mut self.accumulator,
        );

        for (source, table) in [
            (SOURCE_PORT_PARAMS, port_params.changed()),
            (SOURCE_PORT_STATS, port_stats.changed()),
            (SOURCE_SFP_MEDIA, sfp_media.changed()),
        ] {
            for (vf_id, units) in table.into_iter().flatten() {
                for (unit, changed) in units {
                    changes += self.log_change(
                        snapshot.collected_at,
                        source,
                        Some(*vf_id),
                        Some(unit),
                        changed,
                    );
                }
            }
        }

        let fru = FruParser::new(snapshot, self.fru.current(), &mut self.accumulator);
        for (unit, changed) in fru.changed().into_iter().flatten() {
            changes += self.log_change(
                snapshot.collected_at,
                SOURCE_FRU,
                None,
                Some(unit),
                changed,
            );
        }

        let maps = MapsParser::new(
            snapshot,
            self.maps.current(),
            &self.maps_thresholds,
            &mut self.accumulator,
        );
        for (vf_id, changed) in maps.changed().into_iter().flatten() {
            changes += self.log_change(
                snapshot.collected_at,
                SOURCE_MAPS,
                Some(*vf_id),
                None,
                changed,
            );
        }

        let request_status = RequestStatusParser::new(snapshot, self.request_status.current());
        for (vf_id, record) in request_status.failed() {
            warn!(
                vf_id,
                module = %record.module,
                status = %record.status,
                status_code = ?record.status_code,
                error = record.error_message.as_deref().unwrap_or(""),
                "request failed"
            );
        }
        let failed_requests = request_status.failed().count();
        for (vf_id, modules) in request_status.changed().into_iter().flatten() {
            for (module, changed) in modules {
                changes += self.log_change(
                    snapshot.collected_at,
                    SOURCE_REQUEST_STATUS,
                    Some(*vf_id),
                    Some(module),
                    changed,
                );
            }
        }

        self.chassis.push(chassis);
        self.switch.push(switch);
        self.port_params.push(port_params);
        self.port_stats.push(port_stats);
        self.sfp_media.push(sfp_media);
        self.fru.push(fru);
        self.maps.push(maps);
        self.request_status.push(request_status);

        debug!(cycle = self.cycles, changes, failed_requests, "cycle parsed");

        CycleReport {
            cycle: self.cycles,
            changes,
            failed_requests,
            switches: self.accumulator.vf_ids().len(),
        }
    }

    fn log_change(
        &mut self,
        logged_at: DateTime<Utc>,
        source: &'static str,
        vf_id: Option<VfId>,
        unit: Option<&String>,
        changes: &ChangedRecord,
    ) -> usize {
        if changes.is_empty() {
            return 0;
        }
        let fields = changed_fields(changes).join(", ");
        info!(
            source,
            vf_id = ?vf_id,
            unit = unit.map(String::as_str).unwrap_or(""),
            fields = %fields,
            "change detected"
        );
        self.change_log.push(ChangeLogEntry {
            logged_at,
            source,
            vf_id,
            unit: unit.cloned(),
            changes: changes.clone(),
        });
        1
    }

    pub fn chassis(&self) -> Option<&ChassisParser> {
        self.chassis.current()
    }

    pub fn switch(&self) -> Option<&SwitchParser> {
        self.switch.current()
    }

    pub fn port_params(&self) -> Option<&PortParamsParser> {
        self.port_params.current()
    }

    pub fn port_stats(&self) -> Option<&PortStatsParser> {
        self.port_stats.current()
    }

    pub fn sfp_media(&self) -> Option<&SfpMediaParser> {
        self.sfp_media.current()
    }

    pub fn fru(&self) -> Option<&FruParser> {
        self.fru.current()
    }

    pub fn maps(&self) -> Option<&MapsParser> {
        self.maps.current()
    }

    pub fn request_status(&self) -> Option<&RequestStatusParser> {
        self.request_status.current()
    }

    pub fn accumulator(&self) -> &SwitchStatusAccumulator {
        &self.accumulator
    }

    /// Switch summaries of the last processed cycle
    pub fn summaries(&self) -> Vec<SwitchSummary> {
        self.switch
            .current()
            .map(|switch| switch.summaries(&self.accumulator))
            .unwrap_or_default()
    }

    pub fn change_log(&self) -> &ChangeLog {
        &self.change_log
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// Names of the fields that carry a previous value
fn changed_fields(changes: &ChangedRecord) -> Vec<&str> {
    changes
        .keys()
        .filter(|key| !key.ends_with(PREV_TAG))
        .filter(|key| changes.contains_key(&format!("{}{}", key, PREV_TAG)))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{FAN_FRU_STATUS, PHYSICAL_STATE_PORT_STATUS};
    use crate::record::Scalar;
    use crate::status::StatusId;
    use crate::telemetry::VfResponse;
    use chrono::TimeZone;
    use serde_json::json;

    fn snapshot(secs: i64, state: &str, fan_state: &str) -> TelemetrySnapshot {
        let mut s = TelemetrySnapshot::new(Utc.timestamp_opt(secs, 0).unwrap());
        s.insert_payload(
            Module::Chassis,
            -1,
            json!({"chassis": {"chassis-wwn": "10:00:00:00:00:00:00:01", "chassis-user-friendly-name": "sanA"}}),
        );
        s.insert_payload(
            Module::FcSwitch,
            -1,
            json!({"fibrechannel-switch": {"name": "10:00:00:00:00:00:00:10", "user-friendly-name": "sw1", "operational-status": 2, "is-enabled-state": true}}),
        );
        s.insert_payload(
            Module::FcInterface,
            -1,
            json!({"fibrechannel": [
                {"name": "0/1", "physical-state": state, "is-enabled-state": true, "port-type": 7, "speed": 16000000000_i64}
            ]}),
        );
        s.insert_payload(
            Module::FruFan,
            -1,
            json!({"fan": [{"unit-number": 1, "operational-state": fan_state}]}),
        );
        s
    }

    #[test]
    fn test_first_cycle_logs_nothing() {
        let mut collector = Collector::new(10, MapsThresholds::default());
        let report = collector.process(&snapshot(1000, "online", "ok"));
        assert_eq!(report.cycle, 1);
        assert_eq!(report.changes, 0);
        assert!(collector.change_log().is_empty());
        assert!(collector.port_params().unwrap().changed().is_none());
    }

    #[test]
    fn test_second_cycle_logs_changes_and_resets_aggregate() {
        let mut collector = Collector::new(10, MapsThresholds::default());
        collector.process(&snapshot(1000, "online", "faulty"));
        assert_eq!(
            collector.accumulator().get(-1).unwrap().status(FAN_FRU_STATUS),
            Some(StatusId::Critical)
        );

        let report = collector.process(&snapshot(1060, "no_light", "ok"));
        assert_eq!(report.cycle, 2);
        assert_eq!(report.changes, 2);

        let agg = collector.accumulator().get(-1).unwrap();
        assert_eq!(agg.status(FAN_FRU_STATUS), Some(StatusId::Ok));
        assert_eq!(agg.status(PHYSICAL_STATE_PORT_STATUS), Some(StatusId::Warning));

        let ports = collector.change_log().entries_from(SOURCE_PORT_PARAMS);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].vf_id, Some(-1));
        assert_eq!(ports[0].unit.as_deref(), Some("0/1"));
        assert_eq!(
            ports[0].changes["physical-state-prev"],
            Scalar::Text("online".to_string())
        );
        assert_eq!(collector.change_log().entries_from(SOURCE_FRU).len(), 1);
    }

    #[test]
    fn test_summaries_cover_registered_switches() {
        let mut collector = Collector::new(10, MapsThresholds::default());
        collector.process(&snapshot(1000, "online", "ok"));
        let summaries = collector.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].switch_name.as_deref(), Some("sw1"));
        assert_eq!(summaries[0].switch_status, Some(StatusId::Ok));
    }

    #[test]
    fn test_switch_going_unreachable_is_logged() {
        let mut collector = Collector::new(10, MapsThresholds::default());
        collector.process(&snapshot(1000, "online", "ok"));

        let mut down = TelemetrySnapshot::new(Utc.timestamp_opt(1060, 0).unwrap());
        for module in [
            Module::Chassis,
            Module::FcSwitch,
            Module::FcInterface,
            Module::FruFan,
        ] {
            down.insert(
                module,
                -1,
                VfResponse::failure(None, Some("connection refused".to_string())),
            );
        }
        let report = collector.process(&down);
        assert_eq!(report.failed_requests, 4);
        assert_eq!(report.changes, 4);
        assert!(collector.port_params().unwrap().changed().is_none());

        let logged = collector.change_log().entries_from(SOURCE_REQUEST_STATUS);
        assert_eq!(logged.len(), 4);
        let fan = logged
            .iter()
            .find(|e| e.unit.as_deref() == Some("fan"))
            .unwrap();
        assert_eq!(fan.changes["request-status"], Scalar::Text("FAIL".to_string()));
        assert_eq!(fan.changes["request-status-prev"], Scalar::Text("OK".to_string()));
    }

    #[test]
    fn test_changed_fields_pairs_only() {
        let mut record = ChangedRecord::new();
        record.insert("slot-port".to_string(), Scalar::Text("0/1".to_string()));
        record.insert("speed-hrf".to_string(), Scalar::Text("16G".to_string()));
        record.insert("speed-hrf-prev".to_string(), Scalar::Text("8G".to_string()));
        assert_eq!(changed_fields(&record), vec!["speed-hrf"]);
    }
}
