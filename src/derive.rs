//! Per-record derived fields: delay, budget/cost differentials and the
//! canonical contractor and region labels.

use crate::types::{ProjectRecord, ValidatedRow};
use crate::util::{days_diff, percent_of};
use once_cell::sync::Lazy;
use regex::Regex;

/// Raw regional code (upper-cased, trimmed) to the label used by the
/// boundary GeoJSON. Closed table; unknown codes pass through.
pub const REGION_TABLE: &[(&str, &str)] = &[
    ("REGION I", "Region I (Ilocos Region)"),
    ("REGION II", "Region II (Cagayan Valley)"),
    ("REGION III", "Region III (Central Luzon)"),
    ("REGION IV-A", "Region IV-A (CALABARZON)"),
    ("REGION IV-B", "Region IV-B (MIMAROPA)"),
    ("REGION V", "Region V (Bicol Region)"),
    ("REGION VI", "Region VI (Western Visayas)"),
    ("REGION VII", "Region VII (Central Visayas)"),
    ("REGION VIII", "Region VIII (Eastern Visayas)"),
    ("REGION IX", "Region IX (Zamboanga Peninsula)"),
    ("REGION X", "Region X (Northern Mindanao)"),
    ("REGION XI", "Region XI (Davao Region)"),
    ("REGION XII", "Region XII (SOCCSKSARGEN)"),
    ("REGION XIII", "Region XIII (Caraga)"),
    ("CAR", "Cordillera Administrative Region (CAR)"),
    ("NCR", "National Capital Region (NCR)"),
    ("BARMM", "Bangsamoro Autonomous Region in Muslim Mindanao (BARMM)"),
];

static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(.*\)").expect("static pattern compiles"));

/// `" region iii "` -> `"Region III (Central Luzon)"`; unknown values come
/// back upper-cased and trimmed.
pub fn canonical_region(raw: &str) -> String {
    let code = raw.trim().to_uppercase();
    REGION_TABLE
        .iter()
        .find(|(k, _)| *k == code)
        .map(|(_, label)| label.to_string())
        .unwrap_or(code)
}

/// Trim, upper-case and drop any parenthesized part: `"Acme (PH)"` -> `"ACME"`.
pub fn canonical_contractor(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    PARENTHESIZED.replace_all(&upper, "").trim().to_string()
}

/// Budget minus cost as a share of the budget, 0 when the budget is 0.
pub fn budget_vs_cost_pct(approved_budget: f64, contract_cost: f64) -> f64 {
    if approved_budget > 0.0 {
        percent_of(approved_budget - contract_cost, approved_budget)
    } else {
        0.0
    }
}

/// Savings ratio used by the scorecard. Kept apart from
/// [`budget_vs_cost_pct`] because the two views compute it separately;
/// both share the zero-budget rule.
pub fn cost_underrun_pct(approved_budget: f64, contract_cost: f64) -> f64 {
    if approved_budget == 0.0 {
        return 0.0;
    }
    let pct = (approved_budget - contract_cost) / approved_budget * 100.0;
    if pct.is_finite() {
        pct
    } else {
        0.0
    }
}

pub fn derive_record(row: ValidatedRow) -> ProjectRecord {
    let project_delay = days_diff(row.completion_date_original, row.completion_date_actual);
    let budget_vs_cost_difference = row.approved_budget - row.contract_cost;
    let budget_vs_cost_pct = budget_vs_cost_pct(row.approved_budget, row.contract_cost);
    let cost_underrun_pct = cost_underrun_pct(row.approved_budget, row.contract_cost);
    let contractor = canonical_contractor(&row.contractor);
    let region_std = canonical_region(&row.region);

    ProjectRecord {
        project_id: row.project_id,
        project_description: row.project_description,
        region: row.region,
        province: row.province,
        implementing_office: row.implementing_office,
        contractor,
        approved_budget: row.approved_budget,
        contract_cost: row.contract_cost,
        start_date: row.start_date,
        completion_date_original: row.completion_date_original,
        completion_date_actual: row.completion_date_actual,
        project_delay,
        budget_vs_cost_difference,
        budget_vs_cost_pct,
        cost_underrun_pct,
        region_std,
    }
}

pub fn derive_all(rows: Vec<ValidatedRow>) -> Vec<ProjectRecord> {
    rows.into_iter().map(derive_record).collect()
}
