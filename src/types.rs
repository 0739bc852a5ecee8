use crate::util::format_number;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// One spreadsheet/CSV cell before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Text form of the cell, with integral numbers rendered without a
    /// fractional part (`2025.0` -> `"2025"`).
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => Some(format!("{}", *v as i64)),
            Cell::Number(v) => Some(v.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

/// Project row exactly as it appears in the export; every cell is optional text.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "ProjectID")]
    pub project_id: Option<String>,
    #[serde(rename = "ProjectDescription")]
    pub project_description: Option<String>,
    #[serde(rename = "Region")]
    pub region: Option<String>,
    #[serde(rename = "Province")]
    pub province: Option<String>,
    #[serde(rename = "ImplementingOffice")]
    pub implementing_office: Option<String>,
    #[serde(rename = "Contractor")]
    pub contractor: Option<String>,
    #[serde(rename = "ApprovedBudgetForTheContract")]
    pub approved_budget: Option<String>,
    #[serde(rename = "ContractCost")]
    pub contract_cost: Option<String>,
    #[serde(rename = "StartDate")]
    pub start_date: Option<String>,
    #[serde(rename = "CompletionDateOriginal")]
    pub completion_date_original: Option<String>,
    #[serde(rename = "CompletionDateActual")]
    pub completion_date_actual: Option<String>,
}

/// Header names the loader refuses to run without.
pub const PROJECT_COLUMNS: &[&str] = &[
    "ProjectID",
    "ProjectDescription",
    "Region",
    "Province",
    "ImplementingOffice",
    "Contractor",
    "ApprovedBudgetForTheContract",
    "ContractCost",
    "StartDate",
    "CompletionDateOriginal",
    "CompletionDateActual",
];

/// A row that passed validation: every required field is present.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRow {
    pub project_id: Option<String>,
    pub project_description: Option<String>,
    pub region: String,
    pub province: Option<String>,
    pub implementing_office: Option<String>,
    pub contractor: String,
    pub approved_budget: f64,
    pub contract_cost: f64,
    pub start_date: NaiveDate,
    pub completion_date_original: NaiveDate,
    pub completion_date_actual: NaiveDate,
}

/// Cleaned project with its derived metrics. Serializes back to the source
/// column names so an export can be fed to the loader again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectRecord {
    #[serde(rename = "ProjectID")]
    pub project_id: Option<String>,
    #[serde(rename = "ProjectDescription")]
    pub project_description: Option<String>,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Province")]
    pub province: Option<String>,
    #[serde(rename = "ImplementingOffice")]
    pub implementing_office: Option<String>,
    #[serde(rename = "Contractor")]
    pub contractor: String,
    #[serde(rename = "ApprovedBudgetForTheContract")]
    pub approved_budget: f64,
    #[serde(rename = "ContractCost")]
    pub contract_cost: f64,
    #[serde(rename = "StartDate")]
    pub start_date: NaiveDate,
    #[serde(rename = "CompletionDateOriginal")]
    pub completion_date_original: NaiveDate,
    #[serde(rename = "CompletionDateActual")]
    pub completion_date_actual: NaiveDate,
    #[serde(rename = "ProjectDelay")]
    pub project_delay: i64,
    #[serde(rename = "BudgetVsCostDifference")]
    pub budget_vs_cost_difference: f64,
    #[serde(rename = "BudgetVsCostPercentage")]
    pub budget_vs_cost_pct: f64,
    #[serde(rename = "CostUnderrunPct")]
    pub cost_underrun_pct: f64,
    #[serde(rename = "Region_std")]
    pub region_std: String,
}

fn display_money(v: &f64) -> String {
    format_number(*v, 2)
}

fn display_whole(v: &f64) -> String {
    format_number(*v, 0)
}

fn display_opt_money(v: &Option<f64>) -> String {
    v.map(|x| format_number(x, 2)).unwrap_or_else(|| "-".to_string())
}

/// One `(key, value)` pair from a group-by rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct GroupValue {
    #[serde(rename = "Key")]
    #[tabled(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value", display_with = "display_money")]
    pub value: f64,
}

/// One `(key, count)` pair from a group-by rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct GroupCount {
    #[serde(rename = "Key")]
    #[tabled(rename = "Key")]
    pub key: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct ScorecardRow {
    #[serde(rename = "Entity")]
    #[tabled(rename = "Entity")]
    pub key: String,
    #[serde(rename = "Total_Projects")]
    #[tabled(rename = "Total_Projects")]
    pub total_projects: usize,
    #[serde(rename = "Total_Contract_Value")]
    #[tabled(rename = "Total_Contract_Value", display_with = "display_whole")]
    pub total_contract_value: f64,
    #[serde(rename = "Average_Delay_Days")]
    #[tabled(rename = "Average_Delay_Days", display_with = "display_money")]
    pub average_delay_days: f64,
    #[serde(rename = "Avg_Cost_Underrun_Pct")]
    #[tabled(rename = "Avg_Cost_Underrun_Pct", display_with = "display_money")]
    pub avg_cost_underrun_pct: f64,
    #[serde(rename = "Low_Underrun_Projects")]
    #[tabled(rename = "Low_Underrun_Projects")]
    pub low_underrun_projects: usize,
    #[serde(rename = "Low_Underrun_Pct_of_Projects")]
    #[tabled(rename = "Low_Underrun_Pct_of_Projects", display_with = "display_money")]
    pub low_underrun_pct_of_projects: f64,
    #[serde(rename = "Top_3_Contractor_Concentration_Pct")]
    #[tabled(rename = "Top_3_Contractor_Concentration_Pct", display_with = "display_money")]
    pub top3_concentration_pct: f64,
}

/// A late project as shown in the delay rankings.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DelayedProjectRow {
    #[serde(rename = "ProjectLabel")]
    #[tabled(rename = "ProjectLabel")]
    pub label: String,
    #[serde(rename = "Region")]
    #[tabled(rename = "Region")]
    pub region: String,
    #[serde(rename = "Contractor")]
    #[tabled(rename = "Contractor")]
    pub contractor: String,
    #[serde(rename = "ContractCost")]
    #[tabled(rename = "ContractCost", display_with = "display_money")]
    pub contract_cost: f64,
    #[serde(rename = "ProjectDelay")]
    #[tabled(rename = "ProjectDelay")]
    pub project_delay: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct HistogramBin {
    #[serde(rename = "From")]
    #[tabled(rename = "From", display_with = "display_money")]
    pub lower: f64,
    #[serde(rename = "To")]
    #[tabled(rename = "To", display_with = "display_money")]
    pub upper: f64,
    #[serde(rename = "Projects")]
    #[tabled(rename = "Projects")]
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct ContractorSummaryRow {
    #[serde(rename = "Contractor")]
    #[tabled(rename = "Contractor")]
    pub contractor: String,
    #[serde(rename = "Total_Contract_Value")]
    #[tabled(rename = "Total_Contract_Value", display_with = "display_money")]
    pub total_contract_value: f64,
    #[serde(rename = "Number_of_Projects")]
    #[tabled(rename = "Number_of_Projects")]
    pub number_of_projects: usize,
}

/// Headline numbers for the national overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewStats {
    pub total_projects: usize,
    pub total_investment: f64,
    pub overdue_projects: usize,
    pub overdue_share_pct: f64,
    /// Mean delay over late projects only; `None` when nothing is late.
    pub avg_delay_overdue_days: Option<f64>,
}

/// Budget summary line: one program amount in one fiscal year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetRecord {
    #[serde(rename = "FISCAL YEAR")]
    pub fiscal_year: i32,
    #[serde(rename = "AMOUNT")]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct YearTotal {
    #[serde(rename = "FISCAL YEAR")]
    #[tabled(rename = "FISCAL YEAR")]
    pub fiscal_year: i32,
    #[serde(rename = "AMOUNT")]
    #[tabled(rename = "AMOUNT", display_with = "display_money")]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct NepGaaRow {
    #[serde(rename = "Program")]
    #[tabled(rename = "Program")]
    pub program: String,
    #[serde(rename = "NEP")]
    #[tabled(rename = "NEP", display_with = "display_opt_money")]
    pub nep: Option<f64>,
    #[serde(rename = "GAA")]
    #[tabled(rename = "GAA", display_with = "display_opt_money")]
    pub gaa: Option<f64>,
    #[serde(rename = "Variance")]
    #[tabled(rename = "Variance", display_with = "display_opt_money")]
    pub variance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct AgencyBudget {
    #[serde(rename = "Agency")]
    #[tabled(rename = "Agency")]
    pub agency: String,
    #[serde(rename = "Budget")]
    #[tabled(rename = "Budget", display_with = "display_money")]
    pub budget: f64,
}

#[derive(Debug, Serialize)]
pub struct SummaryStats {
    pub total_projects: usize,
    pub total_contractors: usize,
    pub total_provinces: usize,
    pub total_investment: f64,
    pub overdue_projects: usize,
    pub avg_delay_overdue_days: Option<f64>,
    pub avg_delay_all_days: f64,
    pub total_budget_vs_cost_difference: f64,
}
