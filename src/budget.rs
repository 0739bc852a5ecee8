//! Budget sheets: the DPWH yearly summary, the NEP vs GAA comparison, and
//! the cross-agency GAA table.
//!
//! All three share the currency rule of the project loader: amounts are
//! normalized cell by cell and a bad amount becomes `None`, never 0.

use crate::error::{PipelineError, PipelineResult};
use crate::sheet::Grid;
use crate::types::{AgencyBudget, BudgetRecord, Cell, NepGaaRow, YearTotal};
use crate::util::{normalize_amount, parse_f64_safe};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Source amounts in the agency sheet are in thousands of pesos.
pub const AGENCY_AMOUNT_SCALE: f64 = 1000.0;

fn header_text(cell: &Cell) -> Option<String> {
    cell.as_text().map(|s| s.trim().to_uppercase())
}

fn find_column(header: &[Cell], name: &str) -> Option<usize> {
    let wanted = name.trim().to_uppercase();
    header
        .iter()
        .position(|c| header_text(c).as_deref() == Some(wanted.as_str()))
}

fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    row.get(idx).unwrap_or(&Cell::Empty)
}

fn year_of(cell: &Cell) -> Option<i32> {
    let v = match cell {
        Cell::Number(v) => Some(*v),
        Cell::Text(s) => parse_f64_safe(Some(s)),
        Cell::Empty => None,
    }?;
    if v.fract() == 0.0 && (1900.0..=2200.0).contains(&v) {
        Some(v as i32)
    } else {
        None
    }
}

/// Rows of the yearly summary sheet. The first row is the header and must
/// carry `FISCAL YEAR` and `AMOUNT`. Rows without a readable year are skipped.
pub fn load_budget_summary(grid: &Grid, source_name: &str) -> PipelineResult<Vec<BudgetRecord>> {
    let header = grid
        .first()
        .ok_or_else(|| PipelineError::schema(source_name, "sheet is empty"))?;
    let year_col = find_column(header, "FISCAL YEAR")
        .ok_or_else(|| PipelineError::schema(source_name, "no 'FISCAL YEAR' column"))?;
    let amount_col = find_column(header, "AMOUNT")
        .ok_or_else(|| PipelineError::schema(source_name, "no 'AMOUNT' column"))?;

    let records: Vec<BudgetRecord> = grid
        .iter()
        .skip(1)
        .filter_map(|row| {
            let fiscal_year = year_of(cell_at(row, year_col))?;
            Some(BudgetRecord {
                fiscal_year,
                amount: normalize_amount(cell_at(row, amount_col)),
            })
        })
        .collect();
    debug!(source = source_name, rows = records.len(), "budget summary rows");
    Ok(records)
}

/// Total per fiscal year, ascending. Missing amounts are skipped, so a year
/// whose amounts are all missing totals 0.
pub fn yearly_totals(records: &[BudgetRecord]) -> Vec<YearTotal> {
    let mut acc: BTreeMap<i32, f64> = BTreeMap::new();
    for r in records {
        *acc.entry(r.fiscal_year).or_insert(0.0) += r.amount.unwrap_or(0.0);
    }
    acc.into_iter()
        .map(|(fiscal_year, amount)| YearTotal {
            fiscal_year,
            amount,
        })
        .collect()
}

/// Rows of the NEP vs GAA sheet whose program contains `program_filter`
/// (case-sensitive). The first four columns are read as
/// `Program, NEP, GAA, Variance` whatever the header says.
pub fn load_nep_gaa(
    grid: &Grid,
    source_name: &str,
    program_filter: &str,
) -> PipelineResult<Vec<NepGaaRow>> {
    let header = grid
        .first()
        .ok_or_else(|| PipelineError::schema(source_name, "sheet is empty"))?;
    let width = header.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
    if width != 4 {
        return Err(PipelineError::schema(
            source_name,
            format!("expected 4 columns (Program, NEP, GAA, Variance), found {}", width),
        ));
    }

    let rows = grid
        .iter()
        .skip(1)
        .filter_map(|row| {
            let program = cell_at(row, 0).as_text()?;
            if !program.contains(program_filter) {
                return None;
            }
            Some(NepGaaRow {
                program: program.replace('-', "").trim().to_string(),
                nep: normalize_amount(cell_at(row, 1)),
                gaa: normalize_amount(cell_at(row, 2)),
                variance: normalize_amount(cell_at(row, 3)),
            })
        })
        .collect();
    Ok(rows)
}

/// Locate the header row holding `header_label` (it is not always the first
/// row), then read `(agency, budget)` from the `fiscal_year` column.
/// Rows missing either value are dropped; budgets are scaled from thousands.
pub fn load_agency_budgets(
    grid: &Grid,
    source_name: &str,
    header_label: &str,
    fiscal_year: i32,
) -> PipelineResult<Vec<AgencyBudget>> {
    let header_idx = grid
        .iter()
        .position(|row| {
            row.iter()
                .any(|c| c.as_text().is_some_and(|t| t.contains(header_label)))
        })
        .ok_or_else(|| {
            PipelineError::schema(
                source_name,
                format!("could not find the header row ('{}')", header_label),
            )
        })?;
    let header = &grid[header_idx];
    let agency_col = header
        .iter()
        .position(|c| c.as_text().is_some_and(|t| t.contains(header_label)))
        .ok_or_else(|| PipelineError::schema(source_name, "header label column missing"))?;
    let year_col = header
        .iter()
        .position(|c| year_of(c) == Some(fiscal_year))
        .ok_or_else(|| {
            PipelineError::schema(source_name, format!("no column for fiscal year {}", fiscal_year))
        })?;
    debug!(source = source_name, header_row = header_idx, year_col, "agency header located");

    let agencies = grid
        .iter()
        .skip(header_idx + 1)
        .filter_map(|row| {
            let agency = cell_at(row, agency_col).as_text()?.trim().to_string();
            if agency.is_empty() {
                return None;
            }
            let budget = normalize_amount(cell_at(row, year_col))?;
            Some(AgencyBudget {
                agency,
                budget: budget * AGENCY_AMOUNT_SCALE,
            })
        })
        .collect();
    Ok(agencies)
}

/// The `n` largest budgets, ties by agency name.
pub fn top_agencies(mut agencies: Vec<AgencyBudget>, n: usize) -> Vec<AgencyBudget> {
    agencies.sort_by(|a, b| {
        b.budget
            .partial_cmp(&a.budget)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.agency.cmp(&b.agency))
    });
    agencies.truncate(n);
    agencies
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn n(v: f64) -> Cell {
        Cell::Number(v)
    }

    #[test]
    fn yearly_totals_skip_bad_amounts() {
        let grid: Grid = vec![
            vec![t("PROGRAM"), t("FISCAL YEAR"), t("AMOUNT")],
            vec![t("Flood"), n(2024.0), t("1,000")],
            vec![t("Roads"), n(2024.0), n(500.0)],
            vec![t("Roads"), t("2025"), t("n/a")],
            vec![t("Total"), Cell::Empty, n(99999.0)],
        ];
        let records = load_budget_summary(&grid, "summary").unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].amount, None);
        let totals = yearly_totals(&records);
        assert_eq!(
            totals,
            vec![
                YearTotal { fiscal_year: 2024, amount: 1500.0 },
                YearTotal { fiscal_year: 2025, amount: 0.0 },
            ]
        );
    }

    #[test]
    fn summary_without_amount_column_is_rejected() {
        let grid: Grid = vec![vec![t("FISCAL YEAR"), t("TOTAL")]];
        let err = load_budget_summary(&grid, "summary").unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn nep_gaa_filter_is_case_sensitive() {
        let grid: Grid = vec![
            vec![t("Particulars"), t("NEP 2025"), t("GAA 2025"), t("Diff")],
            vec![t("- DPWH Flood Control"), t("1,000"), t("1,200"), t("200")],
            vec![t("dpwh roads"), n(10.0), n(10.0), n(0.0)],
            vec![t("DepEd"), n(5.0), n(6.0), n(1.0)],
        ];
        let rows = load_nep_gaa(&grid, "nep", "DPWH").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].program, "DPWH Flood Control");
        assert_eq!(rows[0].gaa, Some(1200.0));
        assert_eq!(rows[0].variance, Some(200.0));
    }

    #[test]
    fn agency_header_found_below_title_rows() {
        let grid: Grid = vec![
            vec![t("TOTAL GAA per Agency"), Cell::Empty, Cell::Empty],
            vec![t("(in thousand pesos)"), Cell::Empty, Cell::Empty],
            vec![t("AGENCY NAME"), n(2024.0), t("2025")],
            vec![t("DPWH"), n(900.0), t("1,000,000")],
            vec![t("DepEd"), n(800.0), n(950_000.0)],
            vec![t("Orphan"), n(1.0), Cell::Empty],
            vec![Cell::Empty, n(1.0), n(5.0)],
        ];
        let agencies = load_agency_budgets(&grid, "nga", "AGENCY NAME", 2025).unwrap();
        assert_eq!(agencies.len(), 2);
        assert_eq!(agencies[0].budget, 1_000_000_000.0);
        let top = top_agencies(agencies, 1);
        assert_eq!(top[0].agency, "DPWH");
    }

    #[test]
    fn agency_sheet_without_header_is_schema_mismatch() {
        let grid: Grid = vec![vec![t("Agency"), t("2025")]];
        let err = load_agency_budgets(&grid, "nga", "AGENCY NAME", 2025).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }
}
