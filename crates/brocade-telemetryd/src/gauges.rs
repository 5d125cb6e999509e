//! Prometheus gauges for brocade-telemetryd
//!
//! Gauge vectors are filled from the collector after every cycle and exposed
//! via the `/metrics` endpoint. Every vector is reset before it is filled so
//! ports and units that disappear from telemetry also disappear here.

use crate::collector::{Collector, CycleReport};
use crate::parser::{FruKind, SystemResource};
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};
use std::time::Duration;

const PORT_LABELS: &[&str] = &["vf_id", "switch_name", "slot_port"];

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, prometheus::Error> {
    let gauge = GaugeVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

/// Prometheus registry with every gauge the daemon exports
#[derive(Clone)]
pub struct Gauges {
    // Ports
    port_physical_state_status: GaugeVec,
    port_enable_status: GaugeVec,
    port_speed_bps: GaugeVec,
    port_severity_status: GaugeVec,
    port_counter_delta: GaugeVec,
    port_error_growth: GaugeVec,
    port_throughput_percent: GaugeVec,
    port_throughput_status: GaugeVec,

    // Transceivers
    sfp_power_dbm: GaugeVec,
    sfp_power_status: GaugeVec,

    // Chassis and switch health
    fru_status: GaugeVec,
    maps_resource_usage_percent: GaugeVec,
    maps_resource_status: GaugeVec,
    switch_state_status: GaugeVec,
    switch_status: GaugeVec,
    switch_port_quantity: GaugeVec,
    request_status: GaugeVec,

    // Poll loop
    cycles: IntCounter,
    cycle_overruns: IntCounter,
    fetch_failures: IntCounter,
    changes: IntCounter,
    cycle_duration_seconds: Histogram,

    registry: Registry,
}

impl Gauges {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let port_physical_state_status = gauge_vec(
            &registry,
            "brocade_port_physical_state_status",
            "Port physical state status (1=OK, 2=Unknown, 3=Warning, 4=Critical)",
            PORT_LABELS,
        )?;
        let port_enable_status = gauge_vec(
            &registry,
            "brocade_port_enable_status",
            "Port enable status (1=enabled, 0=disabled, -1=persistently disabled)",
            PORT_LABELS,
        )?;
        let port_speed_bps = gauge_vec(
            &registry,
            "brocade_port_speed_bps",
            "Port line rate in bits per second",
            PORT_LABELS,
        )?;
        let port_severity_status = gauge_vec(
            &registry,
            "brocade_port_severity_status",
            "Worst error counter status per severity",
            &["vf_id", "switch_name", "slot_port", "severity"],
        )?;
        let port_counter_delta = gauge_vec(
            &registry,
            "brocade_port_counter_delta",
            "Counter growth since the previous poll",
            &["vf_id", "switch_name", "slot_port", "counter"],
        )?;
        let port_error_growth = gauge_vec(
            &registry,
            "brocade_port_error_growth",
            "Error and link counters that grew since the previous poll",
            &["vf_id", "switch_name", "slot_port", "counter"],
        )?;
        let port_throughput_percent = gauge_vec(
            &registry,
            "brocade_port_throughput_percent",
            "Port utilisation in percent of usable throughput",
            &["vf_id", "switch_name", "slot_port", "direction"],
        )?;
        let port_throughput_status = gauge_vec(
            &registry,
            "brocade_port_throughput_status",
            "Port utilisation status",
            &["vf_id", "switch_name", "slot_port", "direction"],
        )?;
        let sfp_power_dbm = gauge_vec(
            &registry,
            "brocade_sfp_power_dbm",
            "Transceiver optical power in dBm",
            &["vf_id", "switch_name", "slot_port", "direction"],
        )?;
        let sfp_power_status = gauge_vec(
            &registry,
            "brocade_sfp_power_status",
            "Transceiver optical power status",
            &["vf_id", "switch_name", "slot_port", "direction"],
        )?;
        let fru_status = gauge_vec(
            &registry,
            "brocade_fru_status",
            "Field replaceable unit status",
            &["fru_type", "unit"],
        )?;
        let maps_resource_usage_percent = gauge_vec(
            &registry,
            "brocade_maps_resource_usage_percent",
            "MAPS system resource usage in percent",
            &["vf_id", "resource"],
        )?;
        let maps_resource_status = gauge_vec(
            &registry,
            "brocade_maps_resource_status",
            "MAPS system resource status",
            &["vf_id", "resource"],
        )?;
        let switch_state_status = gauge_vec(
            &registry,
            "brocade_switch_state_status",
            "Logical switch operational state status",
            &["vf_id", "switch_name"],
        )?;
        let switch_status = gauge_vec(
            &registry,
            "brocade_switch_status",
            "Aggregated worst status per field of a logical switch",
            &["vf_id", "switch_name", "field"],
        )?;
        let switch_port_quantity = gauge_vec(
            &registry,
            "brocade_switch_port_quantity",
            "Port counts of a logical switch",
            &["vf_id", "switch_name", "quantity"],
        )?;
        let request_status = gauge_vec(
            &registry,
            "brocade_request_status",
            "REST request status (1=OK, 2=WARNING, 3=FAIL)",
            &["vf_id", "module"],
        )?;

        let cycles = counter(
            &registry,
            "brocade_telemetryd_cycles_total",
            "Poll cycles completed",
        )?;
        let cycle_overruns = counter(
            &registry,
            "brocade_telemetryd_cycle_overruns_total",
            "Poll cycles that took longer than the interval",
        )?;
        let fetch_failures = counter(
            &registry,
            "brocade_telemetryd_fetch_failures_total",
            "Poll cycles without a snapshot",
        )?;
        let changes = counter(
            &registry,
            "brocade_telemetryd_changes_total",
            "Changed records written to the change log",
        )?;
        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "brocade_telemetryd_cycle_duration_seconds",
                "Poll cycle duration in seconds",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        Ok(Self {
            port_physical_state_status,
            port_enable_status,
            port_speed_bps,
            port_severity_status,
            port_counter_delta,
            port_error_growth,
            port_throughput_percent,
            port_throughput_status,
            sfp_power_dbm,
            sfp_power_status,
            fru_status,
            maps_resource_usage_percent,
            maps_resource_status,
            switch_state_status,
            switch_status,
            switch_port_quantity,
            request_status,
            cycles,
            cycle_overruns,
            fetch_failures,
            changes,
            cycle_duration_seconds,
            registry,
        })
    }

    fn reset(&self) {
        for vec in [
            &self.port_physical_state_status,
            &self.port_enable_status,
            &self.port_speed_bps,
            &self.port_severity_status,
            &self.port_counter_delta,
            &self.port_error_growth,
            &self.port_throughput_percent,
            &self.port_throughput_status,
            &self.sfp_power_dbm,
            &self.sfp_power_status,
            &self.fru_status,
            &self.maps_resource_usage_percent,
            &self.maps_resource_status,
            &self.switch_state_status,
            &self.switch_status,
            &self.switch_port_quantity,
            &self.request_status,
        ] {
            vec.reset();
        }
    }

    /// Replace every gauge with the state of the collector's last cycle
    pub fn update(&self, collector: &Collector) {
        self.reset();
        self.update_ports(collector);
        self.update_health(collector);
        self.update_switches(collector);
    }

    fn update_ports(&self, collector: &Collector) {
        if let Some(params) = collector.port_params() {
            for (vf_id, ports) in params.ports() {
                let vf = vf_id.to_string();
                for port in ports.values() {
                    let name = port.switch.switch_name.as_deref().unwrap_or("");
                    let labels = [vf.as_str(), name, port.slot_port.as_str()];
                    self.port_physical_state_status
                        .with_label_values(&labels)
                        .set(port.physical_state_status.id() as f64);
                    self.port_enable_status
                        .with_label_values(&labels)
                        .set(port.enable_status.id() as f64);
                    if let Some(speed) = port.speed {
                        self.port_speed_bps.with_label_values(&labels).set(speed as f64);
                    }
                }
            }
        }

        if let Some(stats) = collector.port_stats() {
            for (vf_id, ports) in stats.ports() {
                let vf = vf_id.to_string();
                for port in ports.values() {
                    let name = port.switch.switch_name.as_deref().unwrap_or("");
                    let slot_port = port.slot_port.as_str();
                    for (severity, status) in &port.severity_status {
                        self.port_severity_status
                            .with_label_values(&[vf.as_str(), name, slot_port, severity.label()])
                            .set(status.id() as f64);
                    }
                    for (counter, delta) in &port.deltas {
                        if let Some(delta) = delta {
                            self.port_counter_delta
                                .with_label_values(&[vf.as_str(), name, slot_port, *counter])
                                .set(*delta as f64);
                        }
                    }
                    for (direction, throughput) in
                        [("in", &port.in_throughput), ("out", &port.out_throughput)]
                    {
                        let labels = [vf.as_str(), name, slot_port, direction];
                        if let Some(pct) = throughput.percentage {
                            self.port_throughput_percent
                                .with_label_values(&labels)
                                .set(pct);
                        }
                        if let Some(status) = throughput.status {
                            self.port_throughput_status
                                .with_label_values(&labels)
                                .set(status.id() as f64);
                        }
                    }
                }
            }
            for (vf_id, ports) in stats.growth() {
                let vf = vf_id.to_string();
                for growth in ports.values() {
                    let name = growth.switch.switch_name.as_deref().unwrap_or("");
                    let slot_port = growth.slot_port.as_str();
                    for (counter, delta) in &growth.deltas {
                        self.port_error_growth
                            .with_label_values(&[vf.as_str(), name, slot_port, *counter])
                            .set(*delta as f64);
                    }
                }
            }
        }

        if let Some(sfp) = collector.sfp_media() {
            for (vf_id, media) in sfp.media() {
                let vf = vf_id.to_string();
                for sfp in media.values() {
                    let name = sfp.switch.switch_name.as_deref().unwrap_or("");
                    let slot_port = sfp.slot_port.as_str();
                    for (direction, dbm, status) in [
                        ("rx", sfp.rx_power_dbm(), sfp.rx_power_status),
                        ("tx", sfp.tx_power_dbm(), sfp.tx_power_status),
                    ] {
                        let labels = [vf.as_str(), name, slot_port, direction];
                        if let Some(dbm) = dbm {
                            self.sfp_power_dbm.with_label_values(&labels).set(dbm);
                        }
                        self.sfp_power_status
                            .with_label_values(&labels)
                            .set(status.id() as f64);
                    }
                }
            }
        }
    }

    fn update_health(&self, collector: &Collector) {
        if let Some(fru) = collector.fru() {
            for kind in FruKind::ALL {
                for unit in fru.units_of(kind) {
                    self.fru_status
                        .with_label_values(&[kind.label(), unit.unit_key.as_str()])
                        .set(unit.status.id() as f64);
                }
            }
        }

        if let Some(maps) = collector.maps() {
            for (vf_id, record) in maps.records() {
                let vf = vf_id.to_string();
                for resource in SystemResource::ALL {
                    let Some(usage) = record.resource(resource) else {
                        continue;
                    };
                    let labels = [vf.as_str(), resource.field_name()];
                    if let Some(pct) = usage.usage {
                        self.maps_resource_usage_percent
                            .with_label_values(&labels)
                            .set(pct);
                    }
                    self.maps_resource_status
                        .with_label_values(&labels)
                        .set(usage.status.id() as f64);
                }
            }
        }

        if let Some(requests) = collector.request_status() {
            for (vf_id, modules) in requests.requests() {
                let vf = vf_id.to_string();
                for (module, record) in modules {
                    self.request_status
                        .with_label_values(&[vf.as_str(), module.as_str()])
                        .set(record.status.id() as f64);
                }
            }
        }
    }

    fn update_switches(&self, collector: &Collector) {
        for summary in collector.summaries() {
            let vf = summary.vf_id.to_string();
            let name = summary.switch_name.as_deref().unwrap_or("");
            self.switch_state_status
                .with_label_values(&[vf.as_str(), name])
                .set(summary.state_status.id() as f64);
            for (field, status) in &summary.statuses {
                self.switch_status
                    .with_label_values(&[vf.as_str(), name, *field])
                    .set(status.id() as f64);
            }
            if let Some(worst) = summary.switch_status {
                self.switch_status
                    .with_label_values(&[vf.as_str(), name, "switch-status-id"])
                    .set(worst.id() as f64);
            }
            for (quantity, count) in &summary.quantities {
                self.switch_port_quantity
                    .with_label_values(&[vf.as_str(), name, quantity.field_name()])
                    .set(f64::from(*count));
            }
        }
    }

    /// Account for one completed cycle
    pub fn record_cycle(&self, report: &CycleReport) {
        self.cycles.inc();
        self.changes.inc_by(report.changes as u64);
    }

    pub fn record_overrun(&self) {
        self.cycle_overruns.inc();
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.inc();
    }

    pub fn observe_cycle_duration(&self, elapsed: Duration) {
        self.cycle_duration_seconds.observe(elapsed.as_secs_f64());
    }

    pub fn cycle_overruns(&self) -> u64 {
        self.cycle_overruns.get()
    }

    pub fn fetch_failures(&self) -> u64 {
        self.fetch_failures.get()
    }

    /// Gather metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = vec![];
        encoder.encode(&self.registry.gather(), &mut buf).ok();
        String::from_utf8(buf).unwrap_or_else(|_| String::from("# Error encoding metrics\n"))
    }
}
