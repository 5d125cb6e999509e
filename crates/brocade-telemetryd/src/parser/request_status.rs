//! Outcome of every REST request of a poll cycle
//!
//! Independent of the entity parsers: a failed module only shows up here,
//! the entity parsers simply see no data for it.

use super::base::{BaseParser, EntityParser};
use crate::diff::{ChangedVfTable, VfId, VfTable, get_changed_vf_table};
use crate::record::{FieldLookup, Scalar};
use crate::telemetry::{Module, TelemetrySnapshot, VfResponse};
use serde_json::Value;
use std::fmt;

/// Error messages FOS returns for features that simply are not there
pub const IGNORED_ERROR_MESSAGES: &[&str] = &[
    "VF feature is not enabled",
    "Not supported on this platform",
    "No Rules",
    "No Ports Found",
];

pub const REQUEST_STATUS_CHANGED: &[&str] = &["request-status"];

const REQUEST_STATUS_CONST: &[&str] = &["module", "status-code", "error-message"];

const HTTP_UNAUTHORIZED: u16 = 401;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestStatus {
    Ok,
    Warning,
    Fail,
}

impl RequestStatus {
    pub fn id(self) -> i64 {
        match self {
            RequestStatus::Ok => 1,
            RequestStatus::Warning => 2,
            RequestStatus::Fail => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RequestStatus::Ok => "OK",
            RequestStatus::Warning => "WARNING",
            RequestStatus::Fail => "FAIL",
        }
    }

    /// Classify one fetch
    pub fn classify(response: &VfResponse) -> Self {
        match response {
            VfResponse::Payload { response } if has_data(response) => RequestStatus::Ok,
            VfResponse::Payload { .. } => RequestStatus::Fail,
            VfResponse::Failure {
                status_code,
                error_message,
                ..
            } => {
                let ignored = error_message
                    .as_deref()
                    .is_some_and(|msg| IGNORED_ERROR_MESSAGES.iter().any(|i| msg.contains(i)));
                match status_code {
                    _ if ignored => RequestStatus::Ok,
                    Some(HTTP_UNAUTHORIZED) => RequestStatus::Fail,
                    Some(_) => RequestStatus::Warning,
                    None => RequestStatus::Fail,
                }
            }
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn has_data(response: &Value) -> bool {
    match response {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Null => false,
        _ => true,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestStatusRecord {
    pub module: Module,
    pub status: RequestStatus,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

impl RequestStatusRecord {
    pub fn new(module: Module, response: &VfResponse) -> Self {
        let status = RequestStatus::classify(response);
        match response {
            VfResponse::Payload { .. } => Self {
                module,
                status,
                status_code: None,
                error_message: None,
                date: None,
                time: None,
            },
            VfResponse::Failure {
                status_code,
                error_message,
                date,
                time,
            } => Self {
                module,
                status,
                status_code: *status_code,
                error_message: error_message.clone(),
                date: date.clone(),
                time: time.clone(),
            },
        }
    }
}

impl FieldLookup for RequestStatusRecord {
    fn field(&self, name: &str) -> Option<Scalar> {
        let value: Scalar = match name {
            "module" => self.module.container().into(),
            "request-status" => self.status.label().into(),
            "request-status-id" => self.status.id().into(),
            "status-code" => self.status_code.map(i64::from).into(),
            "error-message" => (&self.error_message).into(),
            "date" => (&self.date).into(),
            "time" => (&self.time).into(),
            _ => return None,
        };
        Some(value)
    }
}

/// Request outcomes keyed by vf and module container name
#[derive(Debug, Clone)]
pub struct RequestStatusParser {
    base: BaseParser,
    requests: VfTable<RequestStatusRecord>,
    changed: Option<ChangedVfTable>,
}

impl RequestStatusParser {
    pub fn new(snapshot: &TelemetrySnapshot, previous: Option<&RequestStatusParser>) -> Self {
        let base = BaseParser::new(snapshot);
        let mut requests = VfTable::new();
        for (module, data) in &snapshot.modules {
            for (vf_id, response) in data {
                requests
                    .entry(*vf_id)
                    .or_insert_with(Default::default)
                    .insert(
                        module.container().to_string(),
                        RequestStatusRecord::new(*module, response),
                    );
            }
        }

        // availability is diffed even when the chassis module itself failed
        let changed = previous
            .filter(|prev| !base.chassis_replaced(&prev.base))
            .map(|prev| {
                get_changed_vf_table(
                    &requests,
                    &prev.requests,
                    REQUEST_STATUS_CHANGED,
                    REQUEST_STATUS_CONST,
                    Some(base.telemetry_hrf().as_str()),
                    Some(prev.base.telemetry_hrf().as_str()),
                )
            });

        Self {
            base,
            requests,
            changed,
        }
    }

    pub fn requests(&self) -> &VfTable<RequestStatusRecord> {
        &self.requests
    }

    pub fn request(&self, vf_id: VfId, module: Module) -> Option<&RequestStatusRecord> {
        self.requests
            .get(&vf_id)
            .and_then(|vf| vf.get(module.container()))
    }

    /// Requests that did not come back OK
    pub fn failed(&self) -> impl Iterator<Item = (VfId, &RequestStatusRecord)> {
        self.requests.iter().flat_map(|(vf_id, modules)| {
            modules
                .values()
                .filter(|r| r.status != RequestStatus::Ok)
                .map(move |r| (*vf_id, r))
        })
    }

    pub fn changed(&self) -> Option<&ChangedVfTable> {
        self.changed.as_ref()
    }
}

impl EntityParser for RequestStatusParser {
    fn base(&self) -> &BaseParser {
        &self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn failure(code: Option<u16>, msg: Option<&str>) -> VfResponse {
        VfResponse::failure(code, msg.map(str::to_string))
    }

    #[test]
    fn test_classify() {
        let ok = VfResponse::Payload {
            response: json!({"fan": [{"unit-number": 1}]}),
        };
        assert_eq!(RequestStatus::classify(&ok), RequestStatus::Ok);
        assert_eq!(
            RequestStatus::classify(&VfResponse::Payload { response: json!({}) }),
            RequestStatus::Fail
        );
        assert_eq!(
            RequestStatus::classify(&failure(Some(400), Some("VF feature is not enabled"))),
            RequestStatus::Ok
        );
        assert_eq!(
            RequestStatus::classify(&failure(Some(401), Some("Invalid credentials"))),
            RequestStatus::Fail
        );
        assert_eq!(
            RequestStatus::classify(&failure(Some(500), None)),
            RequestStatus::Warning
        );
        assert_eq!(
            RequestStatus::classify(&failure(None, Some("connection refused"))),
            RequestStatus::Fail
        );
    }

    fn snapshot(fan: VfResponse) -> TelemetrySnapshot {
        let mut s = TelemetrySnapshot::new(Utc::now());
        s.insert_payload(
            Module::Chassis,
            -1,
            json!({"chassis": {"chassis-wwn": "10:00:00:00:00:00:00:01"}}),
        );
        s.insert(Module::FruFan, -1, fan);
        s
    }

    #[test]
    fn test_request_status_table_and_changes() {
        let prev = RequestStatusParser::new(
            &snapshot(VfResponse::Payload {
                response: json!({"fan": []}),
            }),
            None,
        );
        assert_eq!(
            prev.request(-1, Module::FruFan).unwrap().status,
            RequestStatus::Ok
        );

        let busy = snapshot(failure(Some(503), Some("busy")));
        let now = RequestStatusParser::new(&busy, Some(&prev));
        assert_eq!(now.failed().count(), 1);
        let changed = &now.changed().unwrap()[&-1]["fan"];
        assert_eq!(changed["request-status"], Scalar::Text("WARNING".to_string()));
        assert_eq!(changed["request-status-prev"], Scalar::Text("OK".to_string()));
        assert_eq!(changed["status-code"], Scalar::Int(503));
    }

    #[test]
    fn test_unreachable_switch_is_still_diffed() {
        let prev = RequestStatusParser::new(
            &snapshot(VfResponse::Payload {
                response: json!({"fan": [{"unit-number": 1}]}),
            }),
            None,
        );

        let mut down = TelemetrySnapshot::new(Utc::now());
        down.insert(Module::Chassis, -1, failure(None, Some("connection refused")));
        down.insert(Module::FruFan, -1, failure(None, Some("connection refused")));
        let now = RequestStatusParser::new(&down, Some(&prev));

        let changed = now.changed().unwrap();
        assert_eq!(
            changed[&-1]["fan"]["request-status"],
            Scalar::Text("FAIL".to_string())
        );
        assert_eq!(
            changed[&-1]["chassis"]["request-status-prev"],
            Scalar::Text("OK".to_string())
        );
    }

    #[test]
    fn test_different_chassis_not_comparable() {
        let prev = RequestStatusParser::new(&snapshot(failure(Some(503), None)), None);
        let mut other = TelemetrySnapshot::new(Utc::now());
        other.insert_payload(
            Module::Chassis,
            -1,
            json!({"chassis": {"chassis-wwn": "10:00:00:00:00:00:00:02"}}),
        );
        other.insert_payload(Module::FruFan, -1, json!({"fan": [{"unit-number": 1}]}));
        let now = RequestStatusParser::new(&other, Some(&prev));
        assert!(now.changed().is_none());
    }
}
