//! Shared health scale
//!
//! Every derived status in the daemon reduces to one of four ids and a label
//! from a single table: 1 OK, 2 Unknown, 3 Warning, 4 Critical.

use serde::Serialize;
use std::fmt;

/// Universal health status id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StatusId {
    Ok = 1,
    Unknown = 2,
    Warning = 3,
    Critical = 4,
}

impl StatusId {
    /// All statuses in ascending id order
    pub const ALL: [StatusId; 4] = [
        StatusId::Ok,
        StatusId::Unknown,
        StatusId::Warning,
        StatusId::Critical,
    ];

    /// Statuses that may appear in an error category bucket (never Unknown)
    pub const CATEGORIZED: [StatusId; 3] = [StatusId::Ok, StatusId::Warning, StatusId::Critical];

    /// Numeric id
    pub fn id(self) -> i64 {
        self as i64
    }

    /// Human label
    pub fn label(self) -> &'static str {
        match self {
            StatusId::Ok => "OK",
            StatusId::Unknown => "Unknown",
            StatusId::Warning => "Warning",
            StatusId::Critical => "Critical",
        }
    }

    /// Lowercase label used inside category key names
    pub fn key_label(self) -> &'static str {
        match self {
            StatusId::Ok => "ok",
            StatusId::Unknown => "unknown",
            StatusId::Warning => "warning",
            StatusId::Critical => "critical",
        }
    }

    /// Look up a status by numeric id
    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    /// Ratchet: the worse (higher id) of two statuses
    pub fn worst(self, other: StatusId) -> StatusId {
        self.max(other)
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ratchet an optional status slot upward, never downgrading it
pub fn ratchet(slot: &mut Option<StatusId>, status: StatusId) {
    *slot = Some(match *slot {
        Some(current) => current.worst(status),
        None => status,
    });
}

/// Warning/critical pair for a counter delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub warning: i64,
    pub critical: i64,
}

pub const HIGH_SEVERITY_THRESHOLDS: Thresholds = Thresholds {
    warning: 10,
    critical: 30,
};
pub const MEDIUM_SEVERITY_THRESHOLDS: Thresholds = Thresholds {
    warning: 30,
    critical: 100,
};
pub const LOW_SEVERITY_THRESHOLDS: Thresholds = Thresholds {
    warning: 30,
    critical: 100,
};
pub const LINK_ERROR_THRESHOLDS: Thresholds = Thresholds {
    warning: 10,
    critical: 20,
};
pub const LR_OLS_THRESHOLDS: Thresholds = Thresholds {
    warning: 30,
    critical: 100,
};

/// Throughput utilisation thresholds in percent of port capacity
pub const THROUGHPUT_WARNING_PERCENT: f64 = 75.0;
pub const THROUGHPUT_CRITICAL_PERCENT: f64 = 90.0;

/// Classify a counter delta.
///
/// A negative delta means the counter was reset or rolled over, which is
/// reported as Unknown rather than an error spike.
pub fn get_error_status(value: i64, thresholds: Thresholds) -> StatusId {
    if value < 0 {
        StatusId::Unknown
    } else if value < thresholds.warning {
        StatusId::Ok
    } else if value < thresholds.critical {
        StatusId::Warning
    } else {
        StatusId::Critical
    }
}

/// Classify a utilisation percentage against warning/critical levels
pub fn get_percentage_status(value: f64, warning: f64, critical: f64) -> StatusId {
    if value.is_nan() || value < 0.0 {
        StatusId::Unknown
    } else if value >= critical {
        StatusId::Critical
    } else if value >= warning {
        StatusId::Warning
    } else {
        StatusId::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ids_and_labels() {
        assert_eq!(StatusId::Ok.id(), 1);
        assert_eq!(StatusId::Unknown.id(), 2);
        assert_eq!(StatusId::Warning.id(), 3);
        assert_eq!(StatusId::Critical.id(), 4);
        assert_eq!(StatusId::Critical.label(), "Critical");
        assert_eq!(StatusId::from_id(3), Some(StatusId::Warning));
        assert_eq!(StatusId::from_id(7), None);
    }

    #[test]
    fn test_threshold_boundaries() {
        let t = Thresholds {
            warning: 10,
            critical: 30,
        };
        assert_eq!(get_error_status(0, t), StatusId::Ok);
        assert_eq!(get_error_status(9, t), StatusId::Ok);
        assert_eq!(get_error_status(10, t), StatusId::Warning);
        assert_eq!(get_error_status(29, t), StatusId::Warning);
        assert_eq!(get_error_status(30, t), StatusId::Critical);
        assert_eq!(get_error_status(-1, t), StatusId::Unknown);
    }

    #[test]
    fn test_ratchet_is_order_independent() {
        let feeds = [
            vec![StatusId::Ok, StatusId::Critical, StatusId::Warning],
            vec![StatusId::Critical, StatusId::Warning, StatusId::Ok],
            vec![StatusId::Warning, StatusId::Ok, StatusId::Critical],
        ];
        for feed in feeds {
            let mut slot = None;
            for status in feed {
                ratchet(&mut slot, status);
            }
            assert_eq!(slot, Some(StatusId::Critical));
        }
    }

    #[test]
    fn test_ratchet_never_downgrades() {
        let mut slot = Some(StatusId::Warning);
        ratchet(&mut slot, StatusId::Ok);
        assert_eq!(slot, Some(StatusId::Warning));
    }

    #[test]
    fn test_percentage_status() {
        assert_eq!(get_percentage_status(74.99, 75.0, 90.0), StatusId::Ok);
        assert_eq!(get_percentage_status(75.0, 75.0, 90.0), StatusId::Warning);
        assert_eq!(get_percentage_status(90.0, 75.0, 90.0), StatusId::Critical);
        assert_eq!(get_percentage_status(f64::NAN, 75.0, 90.0), StatusId::Unknown);
    }
}
