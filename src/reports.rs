use crate::aggregate::{
    count_by, mean_by, nlargest, nlargest_counts, nlargest_records, sorted_asc, sorted_desc,
    sum_by, GroupKey,
};
use crate::types::{
    ContractorSummaryRow, DelayedProjectRow, GroupCount, GroupValue, HistogramBin, OverviewStats,
    ProjectRecord, SummaryStats,
};
use crate::util::{average, mean, percent_of};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

pub const TOP_CONTRACTORS: usize = 15;
pub const TOP_DELAYED: usize = 20;
pub const DELAY_HISTOGRAM_BINS: usize = 50;
const LABEL_CHARS: usize = 70;

fn is_late(r: &ProjectRecord) -> bool {
    r.project_delay > 0
}

fn late_delays(records: &[ProjectRecord]) -> Vec<f64> {
    records
        .iter()
        .filter(|r| is_late(r))
        .map(|r| r.project_delay as f64)
        .collect()
}

/// National KPIs. Average delay here counts late projects only.
pub fn overview(records: &[ProjectRecord]) -> OverviewStats {
    let total_projects = records.len();
    let delays = late_delays(records);
    OverviewStats {
        total_projects,
        total_investment: records.iter().map(|r| r.contract_cost).sum(),
        overdue_projects: delays.len(),
        overdue_share_pct: percent_of(delays.len() as f64, total_projects as f64),
        avg_delay_overdue_days: mean(&delays),
    }
}

/// Total contract cost per raw region, largest first.
pub fn investment_by_region(records: &[ProjectRecord]) -> Vec<GroupValue> {
    sorted_desc(sum_by(records, GroupKey::Region, |r| r.contract_cost))
}

pub fn top_contractors_by_count(records: &[ProjectRecord], n: usize) -> Vec<GroupCount> {
    nlargest_counts(count_by(records, GroupKey::Contractor), n)
}

pub fn top_contractors_by_value(records: &[ProjectRecord], n: usize) -> Vec<GroupValue> {
    nlargest(sum_by(records, GroupKey::Contractor, |r| r.contract_cost), n)
}

fn project_label(r: &ProjectRecord) -> String {
    let description: String = r
        .project_description
        .as_deref()
        .unwrap_or("")
        .chars()
        .take(LABEL_CHARS)
        .collect();
    format!(
        "{}... ({})",
        description,
        r.province.as_deref().unwrap_or("Unknown")
    )
}

fn delayed_row(r: &ProjectRecord, label: String) -> DelayedProjectRow {
    DelayedProjectRow {
        label,
        region: r.region.clone(),
        contractor: r.contractor.clone(),
        contract_cost: r.contract_cost,
        project_delay: r.project_delay,
    }
}

/// The `n` most overdue projects, labelled `"<description…>... (<province>)"`.
pub fn top_delayed_projects(records: &[ProjectRecord], n: usize) -> Vec<DelayedProjectRow> {
    nlargest_records(records, n, |r| r.project_delay as f64, is_late)
        .into_iter()
        .map(|r| delayed_row(r, project_label(r)))
        .collect()
}

/// Equal-width bins over the positive delays. The last bin is closed.
pub fn delay_histogram(records: &[ProjectRecord], bins: usize) -> Vec<HistogramBin> {
    let delays = late_delays(records);
    if delays.is_empty() || bins == 0 {
        return Vec::new();
    }
    let min = delays.iter().copied().fold(f64::INFINITY, f64::min);
    let max = delays.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: delays.len(),
        }];
    }
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for d in &delays {
        let idx = (((d - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count,
        })
        .collect()
}

/// Mean delay per raw region over late projects only, shortest first.
pub fn avg_delay_by_region(records: &[ProjectRecord]) -> Vec<GroupValue> {
    sorted_asc(mean_by(
        records,
        GroupKey::Region,
        |r| r.project_delay as f64,
        is_late,
    ))
}

#[derive(Debug, Clone)]
pub struct ContractorProfile {
    pub contractor: String,
    pub total_projects: usize,
    pub total_contract_value: f64,
    /// Mean over late projects; `None` means no delays at all.
    pub avg_delay_days: Option<f64>,
    /// Every project of the contractor, most delayed first.
    pub projects: Vec<DelayedProjectRow>,
}

pub fn contractor_profile(records: &[ProjectRecord], contractor: &str) -> Option<ContractorProfile> {
    let mut own: Vec<&ProjectRecord> = records.iter().filter(|r| r.contractor == contractor).collect();
    if own.is_empty() {
        return None;
    }
    own.sort_by(|a, b| b.project_delay.cmp(&a.project_delay));
    let late: Vec<f64> = own
        .iter()
        .filter(|r| is_late(r))
        .map(|r| r.project_delay as f64)
        .collect();
    Some(ContractorProfile {
        contractor: contractor.to_string(),
        total_projects: own.len(),
        total_contract_value: own.iter().map(|r| r.contract_cost).sum(),
        avg_delay_days: mean(&late),
        projects: own
            .iter()
            .map(|r| delayed_row(r, r.project_description.clone().unwrap_or_default()))
            .collect(),
    })
}

/// Sorted distinct contractor names, for pick lists.
pub fn contractor_names(records: &[ProjectRecord]) -> Vec<String> {
    let names: HashSet<&str> = records.iter().map(|r| r.contractor.as_str()).collect();
    let mut names: Vec<String> = names.into_iter().map(str::to_string).collect();
    names.sort();
    names
}

/// Contractors whose name contains any of `patterns` (case-insensitive,
/// literal substrings), summarized by value, largest first.
pub fn contractors_of_interest(
    records: &[ProjectRecord],
    patterns: &[String],
) -> Vec<ContractorSummaryRow> {
    let needles: Vec<String> = patterns
        .iter()
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty())
        .collect();
    let mut acc: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for r in records {
        let name = r.contractor.to_uppercase();
        if needles.iter().any(|n| name.contains(n.as_str())) {
            let e = acc.entry(r.contractor.as_str()).or_insert((0.0, 0));
            e.0 += r.contract_cost;
            e.1 += 1;
        }
    }
    let mut rows: Vec<ContractorSummaryRow> = acc
        .into_iter()
        .map(|(k, (value, count))| ContractorSummaryRow {
            contractor: k.to_string(),
            total_contract_value: value,
            number_of_projects: count,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_contract_value
            .partial_cmp(&a.total_contract_value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.contractor.cmp(&b.contractor))
    });
    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapMetric {
    TotalContractCost,
    NumberOfProjects,
}

impl MapMetric {
    pub fn label(&self) -> &'static str {
        match self {
            MapMetric::TotalContractCost => "Total Contract Cost",
            MapMetric::NumberOfProjects => "Number of Projects",
        }
    }
}

/// Per canonical region, ready to join with the boundary GeoJSON.
pub fn regional_map(records: &[ProjectRecord], metric: MapMetric) -> Vec<GroupValue> {
    let values = match metric {
        MapMetric::TotalContractCost => sum_by(records, GroupKey::RegionStd, |r| r.contract_cost),
        MapMetric::NumberOfProjects => count_by(records, GroupKey::RegionStd)
            .into_iter()
            .map(|c| GroupValue {
                key: c.key,
                value: c.count as f64,
            })
            .collect(),
    };
    sorted_desc(values)
}

pub fn generate_summary(records: &[ProjectRecord]) -> SummaryStats {
    let kpis = overview(records);
    let contractors: HashSet<&str> = records.iter().map(|r| r.contractor.as_str()).collect();
    let provinces: HashSet<&str> = records.iter().filter_map(|r| r.province.as_deref()).collect();
    let all_delays: Vec<f64> = records.iter().map(|r| r.project_delay as f64).collect();
    SummaryStats {
        total_projects: kpis.total_projects,
        total_contractors: contractors.len(),
        total_provinces: provinces.len(),
        total_investment: kpis.total_investment,
        overdue_projects: kpis.overdue_projects,
        avg_delay_overdue_days: kpis.avg_delay_overdue_days,
        avg_delay_all_days: average(&all_delays),
        total_budget_vs_cost_difference: records.iter().map(|r| r.budget_vs_cost_difference).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::derive_record;
    use crate::types::ValidatedRow;
    use chrono::{Duration, NaiveDate};

    fn rec(region: &str, contractor: &str, cost: f64, delay: i64) -> ProjectRecord {
        let original = NaiveDate::from_ymd_opt(2021, 12, 15).unwrap();
        derive_record(ValidatedRow {
            project_id: None,
            project_description: Some(format!("Construction of flood control structure for {}", contractor)),
            region: region.into(),
            province: Some("Pampanga".into()),
            implementing_office: None,
            contractor: contractor.into(),
            approved_budget: cost * 1.05,
            contract_cost: cost,
            start_date: original - Duration::days(300),
            completion_date_original: original,
            completion_date_actual: original + Duration::days(delay),
        })
    }

    fn sample() -> Vec<ProjectRecord> {
        vec![
            rec("Region III", "Legacy Construction (JV)", 500.0, 30),
            rec("Region III", "BETA", 100.0, -4),
            rec("NCR", "BETA", 300.0, 10),
            rec("NCR", "St. Gerrard Construction", 50.0, 0),
        ]
    }

    #[test]
    fn overview_counts_late_projects_only() {
        let kpis = overview(&sample());
        assert_eq!(kpis.total_projects, 4);
        assert_eq!(kpis.total_investment, 950.0);
        assert_eq!(kpis.overdue_projects, 2);
        assert_eq!(kpis.overdue_share_pct, 50.0);
        assert_eq!(kpis.avg_delay_overdue_days, Some(20.0));
        assert_eq!(overview(&[]).avg_delay_overdue_days, None);
    }

    #[test]
    fn region_views() {
        let data = sample();
        let invest = investment_by_region(&data);
        assert_eq!(invest[0].key, "Region III");
        assert_eq!(invest[0].value, 600.0);

        let delay = avg_delay_by_region(&data);
        assert_eq!(
            delay,
            vec![
                GroupValue { key: "NCR".into(), value: 10.0 },
                GroupValue { key: "Region III".into(), value: 30.0 },
            ]
        );

        let map = regional_map(&data, MapMetric::NumberOfProjects);
        assert_eq!(map.len(), 2);
        assert!(map.iter().any(|g| g.key == "Region III (Central Luzon)" && g.value == 2.0));
    }

    #[test]
    fn contractor_rankings() {
        let data = sample();
        let by_count = top_contractors_by_count(&data, TOP_CONTRACTORS);
        assert_eq!(by_count[0], GroupCount { key: "BETA".into(), count: 2 });
        let by_value = top_contractors_by_value(&data, 1);
        assert_eq!(by_value, vec![GroupValue { key: "LEGACY CONSTRUCTION".into(), value: 500.0 }]);
    }

    #[test]
    fn contractor_profile_reports_no_delays() {
        let data = sample();
        let beta = contractor_profile(&data, "BETA").unwrap();
        assert_eq!(beta.total_projects, 2);
        assert_eq!(beta.avg_delay_days, Some(10.0));
        assert_eq!(beta.projects[0].project_delay, 10);
        let st = contractor_profile(&data, "ST. GERRARD CONSTRUCTION").unwrap();
        assert_eq!(st.avg_delay_days, None);
        assert!(contractor_profile(&data, "NOBODY").is_none());
        assert_eq!(contractor_names(&data).len(), 3);
    }

    #[test]
    fn delayed_labels_are_truncated() {
        let mut data = sample();
        data[0].project_description = Some("x".repeat(100));
        let top = top_delayed_projects(&data, TOP_DELAYED);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].label, format!("{}... (Pampanga)", "x".repeat(70)));
    }

    #[test]
    fn histogram_bins_positive_delays() {
        let data = vec![
            rec("NCR", "A", 1.0, 10),
            rec("NCR", "A", 1.0, 20),
            rec("NCR", "A", 1.0, 30),
            rec("NCR", "A", 1.0, -5),
        ];
        let bins = delay_histogram(&data, 2);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[1].count, 2);
        assert_eq!(bins[1].upper, 30.0);
    }

    #[test]
    fn interest_filter_is_configurable() {
        let data = sample();
        let patterns = vec!["legacy construction".to_string(), "st. gerrard".to_string()];
        let rows = contractors_of_interest(&data, &patterns);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].contractor, "LEGACY CONSTRUCTION");
        assert_eq!(rows[1].number_of_projects, 1);
        assert!(contractors_of_interest(&data, &[]).is_empty());
    }
}
