//! Group-by rollups shared by every view.
//!
//! Records with no value in the grouping column never form a group, and a
//! group only exists once at least one record (after filtering) lands in it.
//! Ranked output is ordered by value descending, then key ascending.

use crate::types::{GroupCount, GroupValue, ProjectRecord};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Region,
    RegionStd,
    Province,
    ImplementingOffice,
    Contractor,
}

impl GroupKey {
    pub fn key_of<'a>(&self, record: &'a ProjectRecord) -> Option<&'a str> {
        match self {
            GroupKey::Region => Some(record.region.as_str()),
            GroupKey::RegionStd => Some(record.region_std.as_str()),
            GroupKey::Province => record.province.as_deref(),
            GroupKey::ImplementingOffice => record.implementing_office.as_deref(),
            GroupKey::Contractor => Some(record.contractor.as_str()),
        }
    }
}

/// Bucket records by `key`, keys in ascending order.
pub fn group_by<'a>(
    records: &'a [ProjectRecord],
    key: GroupKey,
) -> BTreeMap<&'a str, Vec<&'a ProjectRecord>> {
    let mut groups: BTreeMap<&'a str, Vec<&'a ProjectRecord>> = BTreeMap::new();
    for r in records {
        if let Some(k) = key.key_of(r) {
            groups.entry(k).or_default().push(r);
        }
    }
    groups
}

pub fn sum_by<F>(records: &[ProjectRecord], key: GroupKey, value: F) -> Vec<GroupValue>
where
    F: Fn(&ProjectRecord) -> f64,
{
    group_by(records, key)
        .into_iter()
        .map(|(k, rows)| GroupValue {
            key: k.to_string(),
            value: rows.iter().map(|r| value(r)).sum(),
        })
        .collect()
}

/// Mean of `value` over the records that pass `include`. A group whose
/// records are all excluded is absent from the output.
pub fn mean_by<F, P>(records: &[ProjectRecord], key: GroupKey, value: F, include: P) -> Vec<GroupValue>
where
    F: Fn(&ProjectRecord) -> f64,
    P: Fn(&ProjectRecord) -> bool,
{
    let mut acc: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for r in records.iter().filter(|r| include(r)) {
        if let Some(k) = key.key_of(r) {
            let e = acc.entry(k).or_insert((0.0, 0));
            e.0 += value(r);
            e.1 += 1;
        }
    }
    acc.into_iter()
        .map(|(k, (sum, n))| GroupValue {
            key: k.to_string(),
            value: sum / n as f64,
        })
        .collect()
}

pub fn count_by(records: &[ProjectRecord], key: GroupKey) -> Vec<GroupCount> {
    group_by(records, key)
        .into_iter()
        .map(|(k, rows)| GroupCount {
            key: k.to_string(),
            count: rows.len(),
        })
        .collect()
}

fn desc_then_key(a_val: f64, a_key: &str, b_val: f64, b_key: &str) -> Ordering {
    b_val
        .partial_cmp(&a_val)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a_key.cmp(b_key))
}

/// Top `n` groups by value.
pub fn nlargest(mut values: Vec<GroupValue>, n: usize) -> Vec<GroupValue> {
    values.sort_by(|a, b| desc_then_key(a.value, &a.key, b.value, &b.key));
    values.truncate(n);
    values
}

pub fn nlargest_counts(mut counts: Vec<GroupCount>, n: usize) -> Vec<GroupCount> {
    counts.sort_by(|a, b| desc_then_key(a.count as f64, &a.key, b.count as f64, &b.key));
    counts.truncate(n);
    counts
}

pub fn sorted_desc(values: Vec<GroupValue>) -> Vec<GroupValue> {
    let n = values.len();
    nlargest(values, n)
}

/// Ascending by value, then key ascending.
pub fn sorted_asc(mut values: Vec<GroupValue>) -> Vec<GroupValue> {
    values.sort_by(|a, b| {
        a.value
            .partial_cmp(&b.value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    values
}

/// Top `n` records by `value` among those passing `include`. Equal values
/// keep their input order.
pub fn nlargest_records<'a, F, P>(
    records: &'a [ProjectRecord],
    n: usize,
    value: F,
    include: P,
) -> Vec<&'a ProjectRecord>
where
    F: Fn(&ProjectRecord) -> f64,
    P: Fn(&ProjectRecord) -> bool,
{
    let mut picked: Vec<&ProjectRecord> = records.iter().filter(|r| include(r)).collect();
    picked.sort_by(|a, b| value(b).partial_cmp(&value(a)).unwrap_or(Ordering::Equal));
    picked.truncate(n);
    picked
}

/// Contract value per contractor inside an already-selected set of records.
pub fn contractor_totals<'a, I>(records: I) -> Vec<GroupValue>
where
    I: IntoIterator<Item = &'a ProjectRecord>,
{
    let mut acc: BTreeMap<&str, f64> = BTreeMap::new();
    for r in records {
        *acc.entry(r.contractor.as_str()).or_insert(0.0) += r.contract_cost;
    }
    acc.into_iter()
        .map(|(k, v)| GroupValue {
            key: k.to_string(),
            value: v,
        })
        .collect()
}
