//! FC port statistics delta engine
//!
//! Turns raw monotonic hardware counters into per-cycle deltas, classifies
//! error and link counters into severity buckets, derives throughput
//! utilisation and checks link-reset / offline-sequence consistency across
//! the two ends of a link.
//!
//! Per port the outcome depends on the baseline:
//!
//! | previous parser | port in previous | deltas | severity status |
//! |-----------------|------------------|--------|-----------------|
//! | none            | -                | `None` | OK              |
//! | not comparable  | -                | `None` | Unknown         |
//! | comparable      | no               | `None` | Unknown         |
//! | comparable      | yes              | computed | ratcheted from OK |

use super::base::{BaseParser, EntityParser, SwitchIdentity, comparable_previous, slot_port};
use super::port_params::PortParamsParser;
use crate::aggregate::{
    HIGH_SEVERITY_PORT_STATUS, LOW_SEVERITY_PORT_STATUS, MEDIUM_SEVERITY_PORT_STATUS,
    SwitchStatusAccumulator, THROUGHPUT_PORT_STATUS,
};
use crate::diff::{ChangedVfTable, VfId, VfTable, get_changed_vf_table};
use crate::hrf::{int_to_hrf, round2};
use crate::record::{DELTA_SUFFIX, FieldLookup, HRF_SUFFIX, JsonFields, Scalar, status_field};
use crate::status::{
    HIGH_SEVERITY_THRESHOLDS, LINK_ERROR_THRESHOLDS, LOW_SEVERITY_THRESHOLDS, LR_OLS_THRESHOLDS,
    MEDIUM_SEVERITY_THRESHOLDS, StatusId, THROUGHPUT_CRITICAL_PERCENT, THROUGHPUT_WARNING_PERCENT,
    Thresholds, get_error_status, get_percentage_status, ratchet,
};
use crate::telemetry::{Module, TelemetrySnapshot};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Pure traffic counters; growth here is normal and never reported
pub const STAT_COUNTERS: &[&str] = &[
    "in-frames",
    "out-frames",
    "in-octets",
    "out-octets",
    "class-3-frames",
    "in-lcs",
    "in-multicast-pkts",
    "out-multicast-pkts",
];

pub const HIGH_SEVERITY_COUNTERS: &[&str] = &[
    "crc-errors",
    "in-crc-errors",
    "pcs-block-errors",
    "truncated-frames",
    "frames-too-long",
    "bad-eofs-received",
    "encoding-disparity-errors",
    "delimiter-errors",
    "address-errors",
];

pub const MEDIUM_SEVERITY_COUNTERS: &[&str] = &[
    "class-3-discards",
    "class3-in-discards",
    "class3-out-discards",
    "f-rjt-frames",
    "f-busy-frames",
    "p-rjt-frames",
    "p-busy-frames",
    "multicast-timeouts",
    "invalid-ordered-sets",
    "invalid-transmission-words",
    "primitive-sequence-protocol-error",
];

pub const LOW_SEVERITY_COUNTERS: &[&str] = &[
    "bb-credit-zero",
    "input-buffer-full",
    "too-many-rdys",
    "encoding-errors-outside-frame",
];

/// Link level counters, bucketed as high severity with link thresholds
pub const LINK_ERROR_COUNTERS: &[&str] = &[
    "in-link-resets",
    "out-link-resets",
    "in-offline-sequences",
    "out-offline-sequences",
    "link-failures",
    "loss-of-sync",
    "loss-of-signal",
];

/// Counters with a delta but no classification
pub const OTHER_COUNTERS: &[&str] = &[
    "non-operational-sequences",
    "fec-corrected-blocks",
    "fec-uncorrected-blocks",
];

pub const OUT_LR_IN_OLS_MISMATCH: &str = "out-lr-in-ols-mismatch";
pub const IN_LR_OUT_OLS_MISMATCH: &str = "in-lr-out-ols-mismatch";

/// Fields whose change is worth logging
pub const FC_PORT_STATS_CHANGED: &[&str] = &[
    "high-severity-errors_port-status",
    "medium-severity-errors_port-status",
    "low-severity-errors_port-status",
    "high-severity_ok-status_errors",
    "high-severity_ok-status_errors-delta",
    "high-severity_warning-status_errors",
    "high-severity_warning-status_errors-delta",
    "high-severity_critical-status_errors",
    "high-severity_critical-status_errors-delta",
    "medium-severity_ok-status_errors",
    "medium-severity_ok-status_errors-delta",
    "medium-severity_warning-status_errors",
    "medium-severity_warning-status_errors-delta",
    "medium-severity_critical-status_errors",
    "medium-severity_critical-status_errors-delta",
    "low-severity_ok-status_errors",
    "low-severity_ok-status_errors-delta",
    "low-severity_warning-status_errors",
    "low-severity_warning-status_errors-delta",
    "low-severity_critical-status_errors",
    "low-severity_critical-status_errors-delta",
    "in-throughput-status",
    "out-throughput-status",
];

const FC_PORT_STATS_CONST: &[&str] = &["switch-name", "switch-wwn", "slot-port"];

/// Error severity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 3] = [Severity::High, Severity::Medium, Severity::Low];

    pub fn label(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Port and switch aggregate status id field
    pub fn aggregate_field(self) -> &'static str {
        match self {
            Severity::High => HIGH_SEVERITY_PORT_STATUS,
            Severity::Medium => MEDIUM_SEVERITY_PORT_STATUS,
            Severity::Low => LOW_SEVERITY_PORT_STATUS,
        }
    }

    /// Prefix of the `-status` / `-status-id` pair on the port record
    fn status_prefix(self) -> &'static str {
        match self {
            Severity::High => "high-severity-errors_port",
            Severity::Medium => "medium-severity-errors_port",
            Severity::Low => "low-severity-errors_port",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `"<severity>-severity_<status>-status_errors"`
pub fn category_key(severity: Severity, status: StatusId) -> String {
    format!(
        "{}-severity_{}-status_errors",
        severity.label(),
        status.key_label()
    )
}

/// Classification rule for one counter
#[derive(Debug, Clone, Copy)]
struct CounterClass {
    severity: Severity,
    thresholds: Thresholds,
}

fn classified_counters() -> impl Iterator<Item = (&'static str, CounterClass)> {
    let class = |severity, thresholds| CounterClass {
        severity,
        thresholds,
    };
    let high = class(Severity::High, HIGH_SEVERITY_THRESHOLDS);
    let medium = class(Severity::Medium, MEDIUM_SEVERITY_THRESHOLDS);
    let low = class(Severity::Low, LOW_SEVERITY_THRESHOLDS);
    let link = class(Severity::High, LINK_ERROR_THRESHOLDS);
    HIGH_SEVERITY_COUNTERS
        .iter()
        .map(move |c| (*c, high))
        .chain(MEDIUM_SEVERITY_COUNTERS.iter().map(move |c| (*c, medium)))
        .chain(LOW_SEVERITY_COUNTERS.iter().map(move |c| (*c, low)))
        .chain(LINK_ERROR_COUNTERS.iter().map(move |c| (*c, link)))
}

/// Every counter read from the statistics module
pub fn all_counters() -> impl Iterator<Item = &'static str> {
    STAT_COUNTERS
        .iter()
        .copied()
        .chain(classified_counters().map(|(c, _)| c))
        .chain(OTHER_COUNTERS.iter().copied())
}

/// Counters whose growth puts a port in the growth table
fn is_growth_counter(name: &str) -> bool {
    !STAT_COUNTERS.contains(&name)
}

/// Counters in one `<severity, status>` bucket with their deltas
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorCategory {
    pub counters: Vec<&'static str>,
    pub deltas: BTreeMap<&'static str, i64>,
}

impl ErrorCategory {
    fn push(&mut self, counter: &'static str, delta: i64) {
        self.counters.push(counter);
        self.deltas.insert(counter, delta);
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn counters_scalar(&self) -> Scalar {
        if self.is_empty() {
            Scalar::Null
        } else {
            Scalar::Text(self.counters.join(", "))
        }
    }

    fn deltas_scalar(&self) -> Scalar {
        if self.is_empty() {
            return Scalar::Null;
        }
        let rendered: Vec<String> = self
            .deltas
            .iter()
            .map(|(counter, delta)| format!("{}: {}", counter, delta))
            .collect();
        Scalar::Text(rendered.join(", "))
    }
}

/// Per-direction utilisation
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Throughput {
    pub megabytes_per_sec: Option<f64>,
    pub percentage: Option<f64>,
    pub status: Option<StatusId>,
}

/// Usable throughput in MB/s for a line rate in bits per second
pub fn port_throughput_megabytes(speed_bps: i64) -> f64 {
    match speed_bps {
        8_000_000_000 => 810.0,
        16_000_000_000 => 1622.0,
        32_000_000_000 => 3243.0,
        64_000_000_000 => 6487.0,
        other => other as f64 / 10_000_000.0,
    }
}

fn throughput(octets_delta: Option<i64>, secs: Option<i64>, capacity: Option<f64>) -> Throughput {
    let megabytes_per_sec = match (octets_delta, secs) {
        (Some(bytes), Some(secs)) if bytes >= 0 && secs > 0 => {
            Some(round2(bytes as f64 / 1_000_000.0 / secs as f64))
        }
        _ => None,
    };
    let percentage = match (megabytes_per_sec, capacity) {
        (Some(mbps), Some(capacity)) if capacity > 0.0 => Some(round2(mbps / capacity * 100.0)),
        _ => None,
    };
    let status = percentage.map(|pct| {
        get_percentage_status(pct, THROUGHPUT_WARNING_PERCENT, THROUGHPUT_CRITICAL_PERCENT)
    });
    Throughput {
        megabytes_per_sec,
        percentage,
        status,
    }
}

/// `|a - b|`, `None` when either side is unknown
fn abs_delta_mismatch(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    Some((a? - b?).abs())
}

/// Port counters, deltas and everything derived from them
#[derive(Debug, Clone, PartialEq)]
pub struct PortStatistics {
    pub switch: SwitchIdentity,
    pub slot_port: String,
    /// Epoch seconds at which the switch sampled the counters
    pub time_generated: Option<i64>,
    pub interval_secs: Option<i64>,
    pub counters: BTreeMap<&'static str, Option<i64>>,
    /// Counter and LR/OLS mismatch deltas
    pub deltas: BTreeMap<&'static str, Option<i64>>,
    pub severity_status: BTreeMap<Severity, StatusId>,
    pub categories: BTreeMap<(Severity, StatusId), ErrorCategory>,
    pub port_throughput_megabytes: Option<f64>,
    pub in_throughput: Throughput,
    pub out_throughput: Throughput,
}

/// What a port is compared against
enum Baseline<'a> {
    /// No previous parser at all
    FirstRun,
    /// A previous parser existed but has nothing usable for this port
    Missing,
    Present(&'a PortStatistics),
}

impl PortStatistics {
    fn from_entry(entry: &Value, switch: &SwitchIdentity, fallback_time: i64) -> Option<Self> {
        let slot_port = slot_port(&entry.str_field("name")?);
        let counters = all_counters()
            .map(|counter| (counter, entry.i64_field(counter)))
            .collect();
        let mut categories = BTreeMap::new();
        for severity in Severity::ALL {
            for status in StatusId::CATEGORIZED {
                categories.insert((severity, status), ErrorCategory::default());
            }
        }
        Some(Self {
            switch: switch.clone(),
            slot_port,
            time_generated: entry.i64_field("time-generated").or(Some(fallback_time)),
            interval_secs: None,
            counters,
            deltas: BTreeMap::new(),
            severity_status: BTreeMap::new(),
            categories,
            port_throughput_megabytes: None,
            in_throughput: Throughput::default(),
            out_throughput: Throughput::default(),
        })
    }

    pub fn counter(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied().flatten()
    }

    pub fn delta(&self, name: &str) -> Option<i64> {
        self.deltas.get(name).copied().flatten()
    }

    pub fn severity_status(&self, severity: Severity) -> Option<StatusId> {
        self.severity_status.get(&severity).copied()
    }

    pub fn category(&self, severity: Severity, status: StatusId) -> Option<&ErrorCategory> {
        self.categories.get(&(severity, status))
    }

    /// Fill deltas, statuses, categories and throughput against a baseline
    fn evaluate(
        &mut self,
        vf_id: VfId,
        baseline: Baseline<'_>,
        speed: Option<i64>,
        accumulator: &mut SwitchStatusAccumulator,
    ) {
        self.port_throughput_megabytes = speed.map(port_throughput_megabytes);

        let prev = match baseline {
            Baseline::FirstRun => return self.without_baseline(vf_id, StatusId::Ok, accumulator),
            Baseline::Missing => {
                return self.without_baseline(vf_id, StatusId::Unknown, accumulator);
            }
            Baseline::Present(prev) => prev,
        };

        for counter in all_counters() {
            let delta = match (self.counter(counter), prev.counter(counter)) {
                (Some(now), Some(before)) => Some(now - before),
                _ => None,
            };
            self.deltas.insert(counter, delta);
        }

        let mut statuses: BTreeMap<Severity, Option<StatusId>> =
            Severity::ALL.iter().map(|s| (*s, Some(StatusId::Ok))).collect();

        for (counter, class) in classified_counters() {
            self.classify(counter, class, &mut statuses);
        }

        let out_lr_in_ols = abs_delta_mismatch(
            self.delta("out-link-resets"),
            self.delta("in-offline-sequences"),
        );
        let in_lr_out_ols = abs_delta_mismatch(
            self.delta("in-link-resets"),
            self.delta("out-offline-sequences"),
        );
        self.deltas.insert(OUT_LR_IN_OLS_MISMATCH, out_lr_in_ols);
        self.deltas.insert(IN_LR_OUT_OLS_MISMATCH, in_lr_out_ols);
        let lr_ols = CounterClass {
            severity: Severity::Medium,
            thresholds: LR_OLS_THRESHOLDS,
        };
        self.classify(OUT_LR_IN_OLS_MISMATCH, lr_ols, &mut statuses);
        self.classify(IN_LR_OUT_OLS_MISMATCH, lr_ols, &mut statuses);

        for (severity, status) in statuses {
            if let Some(status) = status {
                self.severity_status.insert(severity, status);
                accumulator.update_status(vf_id, severity.aggregate_field(), status);
            }
        }

        self.interval_secs = match (self.time_generated, prev.time_generated) {
            (Some(now), Some(before)) => Some(now - before),
            _ => None,
        };
        self.in_throughput = throughput(
            self.delta("in-octets"),
            self.interval_secs,
            self.port_throughput_megabytes,
        );
        self.out_throughput = throughput(
            self.delta("out-octets"),
            self.interval_secs,
            self.port_throughput_megabytes,
        );
        for status in [self.in_throughput.status, self.out_throughput.status]
            .into_iter()
            .flatten()
        {
            accumulator.update_status(vf_id, THROUGHPUT_PORT_STATUS, status);
        }
    }

    /// Null deltas and a forced status for every severity
    fn without_baseline(
        &mut self,
        vf_id: VfId,
        forced: StatusId,
        accumulator: &mut SwitchStatusAccumulator,
    ) {
        for counter in all_counters() {
            self.deltas.insert(counter, None);
        }
        self.deltas.insert(OUT_LR_IN_OLS_MISMATCH, None);
        self.deltas.insert(IN_LR_OUT_OLS_MISMATCH, None);
        for severity in Severity::ALL {
            self.severity_status.insert(severity, forced);
            accumulator.update_status(vf_id, severity.aggregate_field(), forced);
        }
    }

    /// Classify one non-zero delta, ratchet its severity and file it into a
    /// category unless it came out Unknown.
    fn classify(
        &mut self,
        counter: &'static str,
        class: CounterClass,
        statuses: &mut BTreeMap<Severity, Option<StatusId>>,
    ) {
        let Some(delta) = self.delta(counter).filter(|d| *d != 0) else {
            return;
        };
        let status = get_error_status(delta, class.thresholds);
        ratchet(statuses.entry(class.severity).or_default(), status);
        if status != StatusId::Unknown {
            self.categories
                .entry((class.severity, status))
                .or_default()
                .push(counter, delta);
        }
    }

    /// Non-traffic counters that grew this cycle
    pub fn growth(&self) -> BTreeMap<&'static str, i64> {
        self.deltas
            .iter()
            .filter(|(name, _)| is_growth_counter(name) && self.counters.contains_key(*name))
            .filter_map(|(name, delta)| delta.filter(|d| *d > 0).map(|d| (*name, d)))
            .collect()
    }

    /// Status pairs, counters, deltas, `-hrf` renderings and category buckets
    fn derived_field(&self, name: &str) -> Option<Scalar> {
        for severity in Severity::ALL {
            if let Some(value) =
                status_field(name, severity.status_prefix(), self.severity_status(severity))
            {
                return value;
            }
        }
        if let Some(value) = status_field(name, "in-throughput", self.in_throughput.status)
            .or_else(|| status_field(name, "out-throughput", self.out_throughput.status))
        {
            return value;
        }
        if let Some(value) = self.counters.get(name) {
            return Some((*value).into());
        }
        if let Some(value) = name
            .strip_suffix(DELTA_SUFFIX)
            .and_then(|counter| self.deltas.get(counter))
        {
            return Some((*value).into());
        }
        if let Some(counter) = name
            .strip_suffix(HRF_SUFFIX)
            .filter(|counter| STAT_COUNTERS.contains(counter))
        {
            return Some(self.counter(counter).map(int_to_hrf).into());
        }
        self.category_field(name)
    }

    fn category_field(&self, name: &str) -> Option<Scalar> {
        let (key, is_delta) = match name.strip_suffix(DELTA_SUFFIX) {
            Some(key) => (key, true),
            None => (name, false),
        };
        for ((severity, status), category) in &self.categories {
            if category_key(*severity, *status) == key {
                return Some(if is_delta {
                    category.deltas_scalar()
                } else {
                    category.counters_scalar()
                });
            }
        }
        None
    }
}

impl FieldLookup for PortStatistics {
    fn field(&self, name: &str) -> Option<Scalar> {
        let value: Scalar = match name {
            "switch-name" => (&self.switch.switch_name).into(),
            "switch-wwn" => (&self.switch.switch_wwn).into(),
            "slot-port" => self.slot_port.as_str().into(),
            "time-generated" => self.time_generated.into(),
            "interval-secs" => self.interval_secs.into(),
            "port-throughput-megabytes" => self.port_throughput_megabytes.into(),
            "in-throughput-megabytes" => self.in_throughput.megabytes_per_sec.into(),
            "out-throughput-megabytes" => self.out_throughput.megabytes_per_sec.into(),
            "in-throughput-percentage" => self.in_throughput.percentage.into(),
            "out-throughput-percentage" => self.out_throughput.percentage.into(),
            _ => return self.derived_field(name),
        };
        Some(value)
    }
}

/// Port identity plus every non-traffic counter that grew
#[derive(Debug, Clone, PartialEq)]
pub struct PortGrowth {
    pub switch: SwitchIdentity,
    pub slot_port: String,
    pub deltas: BTreeMap<&'static str, i64>,
}

#[derive(Debug, Clone)]
pub struct PortStatsParser {
    base: BaseParser,
    ports: VfTable<PortStatistics>,
    growth: VfTable<PortGrowth>,
    changed: Option<ChangedVfTable>,
}

impl PortStatsParser {
    /// Parse counters, compute deltas against `previous` and feed severity
    /// and throughput statuses into the accumulator.
    ///
    /// Link speed comes from the current port parameters.
    pub fn new(
        snapshot: &TelemetrySnapshot,
        previous: Option<&PortStatsParser>,
        port_params: &PortParamsParser,
        accumulator: &mut SwitchStatusAccumulator,
    ) -> Self {
        let base = BaseParser::new(snapshot);
        let comparable = comparable_previous(&base, previous);
        let fallback_time = snapshot.collected_at.timestamp();
        let mut ports = VfTable::new();

        if let Some(data) = snapshot.module(Module::FcStatistics) {
            for (vf_id, response) in data {
                let vf_id = *vf_id;
                let switch = SwitchIdentity::from_snapshot(snapshot, vf_id);
                let prev_vf = comparable
                    .and_then(|prev| prev.ports.get(&vf_id))
                    .filter(|vf| !vf.is_empty());
                let vf_ports = ports.entry(vf_id).or_default();
                for entry in response.entries(Module::FcStatistics) {
                    let Some(mut port) = PortStatistics::from_entry(entry, &switch, fallback_time)
                    else {
                        debug!(vf_id, "skipping statistics entry without name");
                        continue;
                    };
                    let baseline = match (previous, prev_vf) {
                        (None, _) => Baseline::FirstRun,
                        (Some(_), Some(prev_vf)) => prev_vf
                            .get(&port.slot_port)
                            .map(Baseline::Present)
                            .unwrap_or(Baseline::Missing),
                        (Some(_), None) => Baseline::Missing,
                    };
                    let speed = port_params
                        .port(vf_id, &port.slot_port)
                        .and_then(|params| params.speed);
                    accumulator.register_vf(vf_id);
                    port.evaluate(vf_id, baseline, speed, accumulator);
                    vf_ports.insert(port.slot_port.clone(), port);
                }
            }
        }

        let growth = Self::collect_growth(&ports);
        let changed = comparable.map(|prev| {
            get_changed_vf_table(
                &ports,
                &prev.ports,
                FC_PORT_STATS_CHANGED,
                FC_PORT_STATS_CONST,
                Some(base.telemetry_hrf().as_str()),
                Some(prev.base.telemetry_hrf().as_str()),
            )
        });

        Self {
            base,
            ports,
            growth,
            changed,
        }
    }

    fn collect_growth(ports: &VfTable<PortStatistics>) -> VfTable<PortGrowth> {
        let mut growth = VfTable::new();
        for (vf_id, vf_ports) in ports {
            for (key, port) in vf_ports {
                let deltas = port.growth();
                if deltas.is_empty() {
                    continue;
                }
                growth
                    .entry(*vf_id)
                    .or_insert_with(BTreeMap::new)
                    .insert(
                        key.clone(),
                        PortGrowth {
                            switch: port.switch.clone(),
                            slot_port: port.slot_port.clone(),
                            deltas,
                        },
                    );
            }
        }
        growth
    }

    pub fn ports(&self) -> &VfTable<PortStatistics> {
        &self.ports
    }

    pub fn port(&self, vf_id: VfId, slot_port: &str) -> Option<&PortStatistics> {
        self.ports.get(&vf_id).and_then(|vf| vf.get(slot_port))
    }

    /// Ports whose error or link counters grew this cycle
    pub fn growth(&self) -> &VfTable<PortGrowth> {
        &self.growth
    }

    /// `None` when there was no comparable previous snapshot
    pub fn changed(&self) -> Option<&ChangedVfTable> {
        self.changed.as_ref()
    }
}

impl EntityParser for PortStatsParser {
    fn base(&self) -> &BaseParser {
        &self.base
    }
}
