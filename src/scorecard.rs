//! Risk scorecard over provinces, implementing offices or contractors.
//!
//! Every entity gets one row combining volume, mean delay (over *all* its
//! projects, early ones included), mean cost underrun, the share of projects
//! with under 1% savings, and how much of its contract value went to its
//! three biggest contractors.

use crate::aggregate::{contractor_totals, group_by, nlargest, nlargest_records, GroupKey};
use crate::types::{GroupValue, ProjectRecord, ScorecardRow};
use crate::util::{average, percent_of};
use std::cmp::Ordering;

/// Savings below this percentage count as "low underrun".
pub const LOW_UNDERRUN_THRESHOLD_PCT: f64 = 1.0;
pub const CONCENTRATION_TOP_N: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityDimension {
    Province,
    ImplementingOffice,
    Contractor,
}

impl EntityDimension {
    pub const ALL: [EntityDimension; 3] = [
        EntityDimension::Province,
        EntityDimension::ImplementingOffice,
        EntityDimension::Contractor,
    ];

    pub fn group_key(&self) -> GroupKey {
        match self {
            EntityDimension::Province => GroupKey::Province,
            EntityDimension::ImplementingOffice => GroupKey::ImplementingOffice,
            EntityDimension::Contractor => GroupKey::Contractor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityDimension::Province => "Provinces",
            EntityDimension::ImplementingOffice => "Implementing Offices",
            EntityDimension::Contractor => "Contractors",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            EntityDimension::Province => "province",
            EntityDimension::ImplementingOffice => "implementing_office",
            EntityDimension::Contractor => "contractor",
        }
    }
}

/// Share of a group's contract value held by its top three contractors.
///
/// Groups with fewer than three projects score 100. A group with no contract
/// value scores 0.
pub fn top3_concentration(group: &[&ProjectRecord]) -> f64 {
    if group.len() < CONCENTRATION_TOP_N {
        return 100.0;
    }
    let total: f64 = group.iter().map(|r| r.contract_cost).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let per_contractor = contractor_totals(group.iter().copied());
    let top: f64 = nlargest(per_contractor, CONCENTRATION_TOP_N)
        .iter()
        .map(|g| g.value)
        .sum();
    top / total * 100.0
}

fn score_group(key: &str, group: &[&ProjectRecord]) -> ScorecardRow {
    let total_projects = group.len();
    let total_contract_value: f64 = group.iter().map(|r| r.contract_cost).sum();
    let delays: Vec<f64> = group.iter().map(|r| r.project_delay as f64).collect();
    let underruns: Vec<f64> = group.iter().map(|r| r.cost_underrun_pct).collect();
    let low_underrun_projects = underruns
        .iter()
        .filter(|u| **u < LOW_UNDERRUN_THRESHOLD_PCT)
        .count();

    ScorecardRow {
        key: key.to_string(),
        total_projects,
        total_contract_value,
        average_delay_days: average(&delays),
        avg_cost_underrun_pct: average(&underruns),
        low_underrun_projects,
        low_underrun_pct_of_projects: percent_of(
            low_underrun_projects as f64,
            total_projects as f64,
        ),
        top3_concentration_pct: top3_concentration(group),
    }
}

/// One row per entity, largest total contract value first.
pub fn compute_scorecard(records: &[ProjectRecord], dimension: EntityDimension) -> Vec<ScorecardRow> {
    let mut rows: Vec<ScorecardRow> = group_by(records, dimension.group_key())
        .into_iter()
        .map(|(key, group)| score_group(key, &group))
        .collect();
    rows.sort_by(|a, b| {
        b.total_contract_value
            .partial_cmp(&a.total_contract_value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
    rows
}

/// Drill-down for a single entity.
#[derive(Debug, Clone)]
pub struct EntityDeepDive<'a> {
    pub key: String,
    /// Up to five late projects, most overdue first.
    pub top_delayed: Vec<&'a ProjectRecord>,
    /// Up to five contractors by contract value inside the entity.
    pub top_contractors: Vec<GroupValue>,
}

pub fn entity_deep_dive<'a>(
    records: &'a [ProjectRecord],
    dimension: EntityDimension,
    key: &str,
) -> Option<EntityDeepDive<'a>> {
    let group_key = dimension.group_key();
    let matches = |r: &ProjectRecord| group_key.key_of(r) == Some(key);
    if !records.iter().any(|r| matches(r)) {
        return None;
    }
    let top_delayed = nlargest_records(
        records,
        5,
        |r| r.project_delay as f64,
        |r| matches(r) && r.project_delay > 0,
    );
    let top_contractors = nlargest(contractor_totals(records.iter().filter(|r| matches(r))), 5);
    Some(EntityDeepDive {
        key: key.to_string(),
        top_delayed,
        top_contractors,
    })
}
