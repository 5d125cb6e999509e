//! End-to-end poll cycles: scripted snapshots through the poller, collector
//! and gauges.

use async_trait::async_trait;
use brocade_telemetryd::aggregate::{HIGH_SEVERITY_PORT_STATUS, THROUGHPUT_PORT_STATUS};
use brocade_telemetryd::collector::{SOURCE_PORT_PARAMS, SOURCE_PORT_STATS};
use brocade_telemetryd::parser::{MapsThresholds, RequestStatus, Severity};
use brocade_telemetryd::*;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHASSIS_A: &str = "10:00:00:05:1e:00:00:01";
const CHASSIS_B: &str = "10:00:00:05:1e:00:00:02";

// ============================================================================
// FIXTURES
// ============================================================================

/// Hands out prepared snapshots in order
struct ScriptedSource {
    snapshots: Mutex<VecDeque<TelemetrySnapshot>>,
}

impl ScriptedSource {
    fn new(snapshots: Vec<TelemetrySnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots.into()),
        }
    }
}

#[async_trait]
impl TelemetrySource for ScriptedSource {
    async fn fetch(&self) -> Result<TelemetrySnapshot> {
        self.snapshots
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TelemetryError::Other("script exhausted".to_string()))
    }
}

fn port_stats(name: &str, time: i64, crc_errors: i64, out_octets: i64) -> Value {
    json!({
        "name": name,
        "time-generated": time,
        "in-frames": 1000,
        "out-frames": 1000,
        "in-octets": 0,
        "out-octets": out_octets,
        "crc-errors": crc_errors,
        "in-link-resets": 2,
        "out-link-resets": 2,
        "in-offline-sequences": 2,
        "out-offline-sequences": 2
    })
}

fn snapshot(chassis: &str, secs: i64, stats: Vec<Value>) -> TelemetrySnapshot {
    let mut s = TelemetrySnapshot::new(Utc.timestamp_opt(secs, 0).unwrap());
    s.insert_payload(
        Module::Chassis,
        -1,
        json!({"chassis": {"chassis-wwn": chassis, "chassis-user-friendly-name": "san-a"}}),
    );
    s.insert_payload(
        Module::FcSwitch,
        -1,
        json!({"fibrechannel-switch": {
            "name": "10:00:00:05:1e:00:00:10",
            "user-friendly-name": "sw1",
            "operational-status": 2,
            "is-enabled-state": true
        }}),
    );
    s.insert_payload(
        Module::FcInterface,
        -1,
        json!({"fibrechannel": [
            {"name": "0/1", "physical-state": "online", "is-enabled-state": true, "speed": 16000000000_i64, "port-type": 7},
            {"name": "0/2", "physical-state": "online", "is-enabled-state": true, "speed": 16000000000_i64, "port-type": 7}
        ]}),
    );
    s.insert_payload(
        Module::FcStatistics,
        -1,
        json!({ "fibrechannel-statistics": stats }),
    );
    s.insert_payload(
        Module::FruFan,
        -1,
        json!({"fan": [{"unit-number": 1, "operational-state": "ok"}]}),
    );
    s
}

fn poller(snapshots: Vec<TelemetrySnapshot>) -> (Poller<ScriptedSource>, Arc<Gauges>) {
    let gauges = Arc::new(Gauges::new().unwrap());
    let poller = Poller::new(
        ScriptedSource::new(snapshots),
        Collector::new(100, MapsThresholds::default()),
        gauges.clone(),
        Duration::from_secs(60),
    );
    (poller, gauges)
}

// ============================================================================
// TWO-CYCLE DELTA TESTS
// ============================================================================

#[tokio::test]
async fn test_error_burst_and_throughput_over_two_cycles() {
    // 1500 MB/s over 60 s on a 16G port (1622 MB/s usable)
    let out_octets = 60 * 1500 * 1_000_000_i64;
    let (mut poller, gauges) = poller(vec![
        snapshot(
            CHASSIS_A,
            1000,
            vec![port_stats("0/1", 1000, 5, 0), port_stats("0/2", 1000, 0, 0)],
        ),
        snapshot(
            CHASSIS_A,
            1060,
            vec![
                port_stats("0/1", 1060, 45, out_octets),
                port_stats("0/2", 1060, 0, 0),
            ],
        ),
    ]);

    let first = poller.run_cycle().await.unwrap();
    assert_eq!(first.changes, 0);
    let stats = poller.collector().port_stats().unwrap();
    assert_eq!(
        stats.port(-1, "0/1").unwrap().severity_status(Severity::High),
        Some(StatusId::Ok)
    );
    assert!(stats.growth().is_empty());

    let second = poller.run_cycle().await.unwrap();
    assert_eq!(second.cycle, 2);

    let collector = poller.collector();
    let stats = collector.port_stats().unwrap();
    let port = stats.port(-1, "0/1").unwrap();
    assert_eq!(port.delta("crc-errors"), Some(40));
    assert_eq!(port.interval_secs, Some(60));
    assert_eq!(port.severity_status(Severity::High), Some(StatusId::Critical));
    assert_eq!(port.out_throughput.percentage, Some(92.48));
    assert_eq!(port.out_throughput.status, Some(StatusId::Critical));
    assert_eq!(
        port.field("high-severity_critical-status_errors"),
        Some(Scalar::Text("crc-errors".to_string()))
    );

    let growth = &stats.growth()[&-1];
    assert_eq!(growth.len(), 1);
    assert_eq!(growth["0/1"].deltas["crc-errors"], 40);

    let aggregate = collector.accumulator().get(-1).unwrap();
    assert_eq!(
        aggregate.status(HIGH_SEVERITY_PORT_STATUS),
        Some(StatusId::Critical)
    );
    assert_eq!(
        aggregate.status(THROUGHPUT_PORT_STATUS),
        Some(StatusId::Critical)
    );
    assert_eq!(aggregate.quantity(PortQuantity::Online), 2);

    let summaries = collector.summaries();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].switch_status, Some(StatusId::Critical));

    let logged = collector.change_log().entries_from(SOURCE_PORT_STATS);
    let burst = logged
        .iter()
        .find(|e| e.unit.as_deref() == Some("0/1"))
        .unwrap();
    assert_eq!(
        burst.changes["high-severity-errors_port-status"],
        Scalar::Text("Critical".to_string())
    );
    assert_eq!(
        burst.changes["high-severity-errors_port-status-prev"],
        Scalar::Text("OK".to_string())
    );
    assert_eq!(
        burst.changes["switch-name"],
        Scalar::Text("sw1".to_string())
    );

    let text = gauges.render();
    assert!(text.contains(
        r#"brocade_port_severity_status{severity="high",slot_port="0/1",switch_name="sw1",vf_id="-1"} 4"#
    ));
    assert!(text.contains(
        r#"brocade_port_counter_delta{counter="crc-errors",slot_port="0/1",switch_name="sw1",vf_id="-1"} 40"#
    ));
    assert!(text.contains(
        r#"brocade_port_error_growth{counter="crc-errors",slot_port="0/1",switch_name="sw1",vf_id="-1"} 40"#
    ));
    assert!(!text.contains(r#"brocade_port_error_growth{counter="in-frames""#));
    assert!(text.contains("brocade_telemetryd_cycles_total 2"));
}

#[tokio::test]
async fn test_chassis_swap_is_not_compared() {
    let (mut poller, _gauges) = poller(vec![
        snapshot(CHASSIS_A, 1000, vec![port_stats("0/1", 1000, 5, 0)]),
        snapshot(CHASSIS_B, 1060, vec![port_stats("0/1", 1060, 500, 0)]),
    ]);
    poller.run_cycle().await.unwrap();
    let report = poller.run_cycle().await.unwrap();
    assert_eq!(report.changes, 0);

    let collector = poller.collector();
    assert!(collector.port_params().unwrap().changed().is_none());
    let stats = collector.port_stats().unwrap();
    assert!(stats.changed().is_none());
    let port = stats.port(-1, "0/1").unwrap();
    assert_eq!(port.delta("crc-errors"), None);
    assert_eq!(port.severity_status(Severity::High), Some(StatusId::Unknown));
    assert!(collector.change_log().is_empty());
}

#[tokio::test]
async fn test_counter_reset_reads_unknown() {
    let (mut poller, _gauges) = poller(vec![
        snapshot(CHASSIS_A, 1000, vec![port_stats("0/1", 1000, 500, 0)]),
        snapshot(CHASSIS_A, 1060, vec![port_stats("0/1", 1060, 3, 0)]),
    ]);
    poller.run_cycle().await.unwrap();
    poller.run_cycle().await.unwrap();

    let stats = poller.collector().port_stats().unwrap();
    let port = stats.port(-1, "0/1").unwrap();
    assert_eq!(port.delta("crc-errors"), Some(-497));
    assert_eq!(port.severity_status(Severity::High), Some(StatusId::Unknown));
    assert!(stats.growth().is_empty());
}

// ============================================================================
// PARTIAL FAILURE TESTS
// ============================================================================

#[tokio::test]
async fn test_failed_module_does_not_block_the_others() {
    let mut broken = snapshot(CHASSIS_A, 1000, vec![port_stats("0/1", 1000, 0, 0)]);
    broken.insert(
        Module::MediaRdp,
        -1,
        VfResponse::failure(Some(401), Some("Invalid credentials".to_string())),
    );
    broken.insert(
        Module::FruBlade,
        -1,
        VfResponse::failure(Some(400), Some("Not supported on this platform".to_string())),
    );
    broken.insert(
        Module::MapsSspReport,
        -1,
        VfResponse::failure(Some(503), None),
    );

    let (mut poller, gauges) = poller(vec![broken]);
    let report = poller.run_cycle().await.unwrap();
    assert_eq!(report.failed_requests, 2);

    let collector = poller.collector();
    assert_eq!(collector.port_params().unwrap().ports()[&-1].len(), 2);
    assert!(collector.sfp_media().unwrap().media()[&-1].is_empty());

    let requests = collector.request_status().unwrap();
    assert_eq!(
        requests.request(-1, Module::MediaRdp).unwrap().status,
        RequestStatus::Fail
    );
    assert_eq!(
        requests.request(-1, Module::FruBlade).unwrap().status,
        RequestStatus::Ok
    );
    assert_eq!(
        requests.request(-1, Module::MapsSspReport).unwrap().status,
        RequestStatus::Warning
    );
    assert_eq!(
        requests.request(-1, Module::FcInterface).unwrap().status,
        RequestStatus::Ok
    );

    assert!(gauges.render().contains(
        r#"brocade_request_status{module="media-rdp",vf_id="-1"} 3"#
    ));
}

#[tokio::test]
async fn test_port_state_change_logged_once_per_port() {
    let first = snapshot(CHASSIS_A, 1000, vec![]);
    let mut second = snapshot(CHASSIS_A, 1060, vec![]);
    second.insert_payload(
        Module::FcInterface,
        -1,
        json!({"fibrechannel": [
            {"name": "0/1", "physical-state": "no_light", "is-enabled-state": true, "speed": 16000000000_i64, "port-type": 7},
            {"name": "0/2", "physical-state": "online", "is-enabled-state": true, "speed": 16000000000_i64, "port-type": 7}
        ]}),
    );

    let (mut poller, _gauges) = poller(vec![first, second]);
    poller.run_cycle().await.unwrap();
    poller.run_cycle().await.unwrap();

    let collector = poller.collector();
    let logged = collector.change_log().entries_from(SOURCE_PORT_PARAMS);
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].unit.as_deref(), Some("0/1"));
    assert_eq!(
        logged[0].changes["physical-state"],
        Scalar::Text("no_light".to_string())
    );
    assert_eq!(
        collector
            .accumulator()
            .get(-1)
            .unwrap()
            .quantity(PortQuantity::Online),
        1
    );
}

#[tokio::test]
async fn test_exhausted_source_counts_fetch_failure() {
    let (mut poller, gauges) = poller(vec![]);
    assert!(poller.run_cycle().await.is_err());
    assert_eq!(gauges.fetch_failures(), 1);
    assert_eq!(poller.collector().cycles(), 0);
}
