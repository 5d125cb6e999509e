//! Field-level change detection shared by every entity parser
//!
//! None of these functions fail. Missing keys, missing units and missing
//! virtual fabrics all read as "no change detected".

use crate::record::{FieldLookup, PREV_TAG, Record, TIME_GENERATED_HRF, TIME_GENERATED_PREV_HRF};
use std::collections::BTreeMap;

/// Virtual fabric id; `-1` means VF mode is disabled
pub type VfId = i32;

/// VF id used when virtual fabrics are disabled
pub const VF_DISABLED: VfId = -1;

/// Units of one virtual fabric keyed by their stable identity (`"0/1"`, `"fan 2"`)
pub type UnitTable<T> = BTreeMap<String, T>;

/// Units keyed by virtual fabric
pub type VfTable<T> = BTreeMap<VfId, UnitTable<T>>;

/// Only the fields that flipped, with their `-prev` companions
pub type ChangedRecord = Record;

/// Changed records of one virtual fabric keyed by unit
pub type ChangedUnits = BTreeMap<String, ChangedRecord>;

/// Changed records keyed by virtual fabric and unit
pub type ChangedVfTable = BTreeMap<VfId, ChangedUnits>;

/// Changed switch-level records keyed by virtual fabric
pub type ChangedVfRecords = BTreeMap<VfId, ChangedRecord>;

/// Chassis identity used to gate comparability of two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChassisIdentity {
    pub chassis_wwn: Option<String>,
    pub chassis_name: Option<String>,
}

/// Two snapshots are comparable only when both carry the same chassis WWN
pub fn same_chassis(a: &ChassisIdentity, b: &ChassisIdentity) -> bool {
    match (&a.chassis_wwn, &b.chassis_wwn) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Collect `key: now` and `key<tag>: prev` for every key present on both
/// sides whose values differ. Equality is plain value equality.
pub fn get_changed_values<N, P>(now: &N, prev: &P, keys: &[&str], tag: &str) -> ChangedRecord
where
    N: FieldLookup + ?Sized,
    P: FieldLookup + ?Sized,
{
    let mut changed = ChangedRecord::new();
    for key in keys {
        let (Some(now_value), Some(prev_value)) = (now.field(key), prev.field(key)) else {
            continue;
        };
        if now_value != prev_value {
            changed.insert(format!("{}{}", key, tag), prev_value);
            changed.insert((*key).to_string(), now_value);
        }
    }
    changed
}

/// Copy identity fields from `source` into `dest`.
///
/// With `ignore_empty_dest` an empty `dest` is left untouched so that a
/// record with no tracked change never turns into an identity-only entry.
pub fn copy_dict_values<S>(dest: &mut Record, source: &S, keys: &[&str], ignore_empty_dest: bool)
where
    S: FieldLookup + ?Sized,
{
    if ignore_empty_dest && dest.is_empty() {
        return;
    }
    for key in keys {
        if let Some(value) = source.field(key) {
            dest.insert((*key).to_string(), value);
        }
    }
}

fn attach_times(changed: &mut ChangedRecord, time_now: Option<&str>, time_prev: Option<&str>) {
    changed.insert(TIME_GENERATED_HRF.to_string(), time_now.into());
    changed.insert(TIME_GENERATED_PREV_HRF.to_string(), time_prev.into());
}

/// Per-unit change detection inside one virtual fabric.
///
/// Units absent from `prev_vf` are skipped. Only units with at least one
/// changed field are returned.
pub fn get_changed_vfid_ports<T>(
    now_vf: &UnitTable<T>,
    prev_vf: &UnitTable<T>,
    changed_keys: &[&str],
    const_keys: &[&str],
    time_now: Option<&str>,
    time_prev: Option<&str>,
) -> ChangedUnits
where
    T: FieldLookup,
{
    let mut changed_units = ChangedUnits::new();
    for (unit, now_unit) in now_vf {
        let Some(prev_unit) = prev_vf.get(unit) else {
            continue;
        };
        let mut changed = get_changed_values(now_unit, prev_unit, changed_keys, PREV_TAG);
        copy_dict_values(&mut changed, now_unit, const_keys, true);
        if !changed.is_empty() {
            attach_times(&mut changed, time_now, time_prev);
            changed_units.insert(unit.clone(), changed);
        }
    }
    changed_units
}

/// Same contract as [`get_changed_vfid_ports`] across every virtual fabric
/// present in both tables.
pub fn get_changed_vf_table<T>(
    now: &VfTable<T>,
    prev: &VfTable<T>,
    changed_keys: &[&str],
    const_keys: &[&str],
    time_now: Option<&str>,
    time_prev: Option<&str>,
) -> ChangedVfTable
where
    T: FieldLookup,
{
    let mut changed = ChangedVfTable::new();
    for (vf_id, now_vf) in now {
        let Some(prev_vf) = prev.get(vf_id) else {
            continue;
        };
        let units =
            get_changed_vfid_ports(now_vf, prev_vf, changed_keys, const_keys, time_now, time_prev);
        if !units.is_empty() {
            changed.insert(*vf_id, units);
        }
    }
    changed
}

/// Change detection at chassis or switch granularity (no unit loop)
pub fn get_changed_chassis_params<N, P>(
    now: &N,
    prev: &P,
    changed_keys: &[&str],
    const_keys: &[&str],
    time_now: Option<&str>,
    time_prev: Option<&str>,
) -> ChangedRecord
where
    N: FieldLookup + ?Sized,
    P: FieldLookup + ?Sized,
{
    let mut changed = get_changed_values(now, prev, changed_keys, PREV_TAG);
    copy_dict_values(&mut changed, now, const_keys, true);
    if !changed.is_empty() {
        attach_times(&mut changed, time_now, time_prev);
    }
    changed
}

/// [`get_changed_chassis_params`] for one record per virtual fabric.
/// Virtual fabrics without a change are left out.
pub fn get_changed_vf_records<T>(
    now: &BTreeMap<VfId, T>,
    prev: &BTreeMap<VfId, T>,
    changed_keys: &[&str],
    const_keys: &[&str],
    time_now: Option<&str>,
    time_prev: Option<&str>,
) -> ChangedVfRecords
where
    T: FieldLookup,
{
    now.iter()
        .filter_map(|(vf_id, now_record)| {
            let prev_record = prev.get(vf_id)?;
            let changed = get_changed_chassis_params(
                now_record,
                prev_record,
                changed_keys,
                const_keys,
                time_now,
                time_prev,
            );
            (!changed.is_empty()).then_some((*vf_id, changed))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Scalar;

    fn record(pairs: &[(&str, Scalar)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_same_chassis() {
        let a = ChassisIdentity {
            chassis_wwn: Some("10:00:c4:f5:7c:00:00:01".to_string()),
            chassis_name: Some("sw1".to_string()),
        };
        let mut b = a.clone();
        b.chassis_name = Some("renamed".to_string());
        assert!(same_chassis(&a, &b));

        b.chassis_wwn = Some("10:00:c4:f5:7c:00:00:02".to_string());
        assert!(!same_chassis(&a, &b));
        assert!(!same_chassis(&ChassisIdentity::default(), &ChassisIdentity::default()));
    }

    #[test]
    fn test_get_changed_values_emits_now_and_prev() {
        let now = record(&[("speed", Scalar::Int(16)), ("state", "online".into())]);
        let prev = record(&[("speed", Scalar::Int(8)), ("state", "online".into())]);
        let changed = get_changed_values(&now, &prev, &["speed", "state"], "-prev");
        assert_eq!(changed.len(), 2);
        assert_eq!(changed["speed"], Scalar::Int(16));
        assert_eq!(changed["speed-prev"], Scalar::Int(8));
    }

    #[test]
    fn test_get_changed_values_skips_missing_keys() {
        let now = record(&[("speed", Scalar::Int(16))]);
        let prev = record(&[("state", "online".into())]);
        assert!(get_changed_values(&now, &prev, &["speed", "state"], "-prev").is_empty());
    }

    #[test]
    fn test_get_changed_values_no_type_coercion() {
        let now = record(&[("id", Scalar::Text("0".to_string()))]);
        let prev = record(&[("id", Scalar::Int(0))]);
        assert_eq!(get_changed_values(&now, &prev, &["id"], "-prev").len(), 2);
    }

    #[test]
    fn test_copy_dict_values_ignores_empty_dest() {
        let source = record(&[("switch-name", "sw1".into())]);
        let mut dest = Record::new();
        copy_dict_values(&mut dest, &source, &["switch-name"], true);
        assert!(dest.is_empty());

        copy_dict_values(&mut dest, &source, &["switch-name"], false);
        assert_eq!(dest["switch-name"], Scalar::Text("sw1".to_string()));
    }

    #[test]
    fn test_get_changed_vfid_ports_only_changed_units() {
        let mut now = UnitTable::new();
        now.insert(
            "0/1".to_string(),
            record(&[("state", "offline".into()), ("slot-port", "0/1".into())]),
        );
        now.insert(
            "0/2".to_string(),
            record(&[("state", "online".into()), ("slot-port", "0/2".into())]),
        );
        now.insert(
            "0/3".to_string(),
            record(&[("state", "online".into()), ("slot-port", "0/3".into())]),
        );
        let mut prev = now.clone();
        prev.insert(
            "0/1".to_string(),
            record(&[("state", "online".into()), ("slot-port", "0/1".into())]),
        );
        prev.remove("0/3");

        let changed = get_changed_vfid_ports(
            &now,
            &prev,
            &["state"],
            &["slot-port"],
            Some("2024-01-01 00:01:00"),
            Some("2024-01-01 00:00:00"),
        );
        assert_eq!(changed.len(), 1);
        let entry = &changed["0/1"];
        assert_eq!(entry["state"], Scalar::Text("offline".to_string()));
        assert_eq!(entry["state-prev"], Scalar::Text("online".to_string()));
        assert_eq!(entry["slot-port"], Scalar::Text("0/1".to_string()));
        assert_eq!(
            entry[TIME_GENERATED_PREV_HRF],
            Scalar::Text("2024-01-01 00:00:00".to_string())
        );
    }

    #[test]
    fn test_identical_snapshots_have_no_changes() {
        let mut vf = UnitTable::new();
        vf.insert("0/1".to_string(), record(&[("state", "online".into())]));
        let mut table = VfTable::new();
        table.insert(VF_DISABLED, vf);
        assert!(get_changed_vf_table(&table, &table, &["state"], &[], None, None).is_empty());

        let chassis = record(&[("chassis-name", "sw1".into())]);
        assert!(
            get_changed_chassis_params(&chassis, &chassis, &["chassis-name"], &[], None, None)
                .is_empty()
        );
    }
}
