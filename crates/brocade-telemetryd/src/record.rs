//! Flat field records shared by all parsers
//!
//! Entity records are typed structs. The diff primitives only need to look a
//! field up by its wire name, which is what [`FieldLookup`] provides.

use crate::status::StatusId;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Suffix for counter deltas (`in-crc-errors-delta`)
pub const DELTA_SUFFIX: &str = "-delta";
/// Default tag for previous values in a changed record
pub const PREV_TAG: &str = "-prev";
/// Suffix for a status label field
pub const STATUS_SUFFIX: &str = "-status";
/// Suffix for a status id field
pub const STATUS_ID_SUFFIX: &str = "-status-id";
/// Suffix for human readable renderings
pub const HRF_SUFFIX: &str = "-hrf";

/// Telemetry time attached to every changed record
pub const TIME_GENERATED_HRF: &str = "time-generated-hrf";
pub const TIME_GENERATED_PREV_HRF: &str = "time-generated-prev-hrf";

/// Single field value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Scalar::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Convert a JSON leaf. Arrays and objects have no scalar form.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(v) => Scalar::Bool(*v),
            Value::Number(n) => n
                .as_i64()
                .map(Scalar::Int)
                .or_else(|| n.as_f64().map(Scalar::Float))
                .unwrap_or(Scalar::Null),
            Value::String(s) => Scalar::Text(s.clone()),
            _ => Scalar::Null,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("None"),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<StatusId> for Scalar {
    fn from(v: StatusId) -> Self {
        Scalar::Text(v.label().to_string())
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Scalar::Null)
    }
}

impl<T: Into<Scalar> + Clone> From<&Option<T>> for Scalar {
    fn from(v: &Option<T>) -> Self {
        v.clone().into()
    }
}

/// Flat mapping of field name to scalar
pub type Record = BTreeMap<String, Scalar>;

/// Field access by wire name.
///
/// `None` means the record has no such field, `Some(Scalar::Null)` means the
/// field exists but carries no value this cycle.
pub trait FieldLookup {
    fn field(&self, name: &str) -> Option<Scalar>;
}

impl FieldLookup for Record {
    fn field(&self, name: &str) -> Option<Scalar> {
        self.get(name).cloned()
    }
}

/// Status label + id helpers for `<prefix>-status` / `<prefix>-status-id` pairs
pub(crate) fn status_field(
    name: &str,
    prefix: &str,
    status: Option<StatusId>,
) -> Option<Option<Scalar>> {
    let rest = name.strip_prefix(prefix)?;
    match rest {
        STATUS_SUFFIX => Some(Some(status.into())),
        STATUS_ID_SUFFIX => Some(Some(status.map(StatusId::id).into())),
        _ => None,
    }
}

/// Read helpers over a raw FOS JSON object
pub(crate) trait JsonFields {
    fn str_field(&self, key: &str) -> Option<String>;
    fn i64_field(&self, key: &str) -> Option<i64>;
    fn f64_field(&self, key: &str) -> Option<f64>;
    fn bool_field(&self, key: &str) -> Option<bool>;
}

impl JsonFields for Value {
    fn str_field(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn i64_field(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn f64_field(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn bool_field(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}
