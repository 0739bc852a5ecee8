// Reading budget sheets into a plain grid of cells.
//
// Budget data arrives either as a workbook (xlsx/xlsm/xls/ods) or as a CSV
// export of the same sheet. Both end up as `Vec<Vec<Cell>>` with no header
// interpretation; the budget loaders decide which row is the header.
use crate::error::{PipelineError, PipelineResult};
use crate::types::Cell;
use calamine::{open_workbook_auto, DataType, Reader};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, warn};

pub type Grid = Vec<Vec<Cell>>;

/// Read `sheet_name` from the workbook at `path`, or the whole file when it
/// is a CSV.
pub fn read_grid(path: &Path, sheet_name: &str) -> PipelineResult<Grid> {
    if !path.is_file() {
        return Err(PipelineError::MissingSourceFile {
            path: path.display().to_string(),
        });
    }
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if is_csv {
        read_csv_grid(path)
    } else {
        read_workbook_grid(path, sheet_name)
    }
}

fn read_csv_grid(path: &Path) -> PipelineResult<Grid> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut grid = Grid::new();
    for record in rdr.records() {
        let record = record?;
        grid.push(record.iter().map(text_cell).collect());
    }
    debug!(path = %path.display(), rows = grid.len(), "read csv grid");
    Ok(grid)
}

fn text_cell(s: &str) -> Cell {
    if s.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

fn read_workbook_grid(path: &Path, sheet_name: &str) -> PipelineResult<Grid> {
    let mut workbook = open_workbook_auto(path)?;
    let names: Vec<String> = workbook.sheet_names().to_vec();
    let Some(resolved) = resolve_sheet_name(&names, sheet_name) else {
        return Err(PipelineError::schema(
            path.display().to_string(),
            format!(
                "no sheet named '{}' (available: {})",
                sheet_name,
                names.join(", ")
            ),
        ));
    };
    if resolved != sheet_name {
        warn!(requested = sheet_name, found = %resolved, "using closest sheet name");
    }
    let range = workbook
        .worksheet_range(&resolved)
        .ok_or_else(|| PipelineError::schema(path.display().to_string(), "sheet vanished"))??;

    let grid: Grid = range
        .rows()
        .map(|row| row.iter().map(workbook_cell).collect())
        .collect();
    debug!(path = %path.display(), sheet = %resolved, rows = grid.len(), "read workbook grid");
    Ok(grid)
}

fn workbook_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Float(f) => Cell::Number(*f),
        // Excel serial date; kept numeric.
        DataType::DateTime(f) => Cell::Number(*f),
        DataType::String(s) => text_cell(s),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        _ => Cell::Empty,
    }
}

/// Exports rename sheets loosely (case, stray spaces, Excel's 31-character
/// cut-off), so match exactly first, then case-insensitively, then by prefix.
pub fn resolve_sheet_name(available: &[String], wanted: &str) -> Option<String> {
    if let Some(exact) = available.iter().find(|n| n.as_str() == wanted) {
        return Some(exact.clone());
    }
    let wanted_norm = wanted.trim().to_lowercase();
    if let Some(loose) = available
        .iter()
        .find(|n| n.trim().to_lowercase() == wanted_norm)
    {
        return Some(loose.clone());
    }
    available
        .iter()
        .find(|n| {
            let n = n.trim().to_lowercase();
            !n.is_empty() && (n.starts_with(&wanted_norm) || wanted_norm.starts_with(&n))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn sheet_names_match_loosely() {
        let names = vec![
            "Sheet1".to_string(),
            "WIP - DPWH Budget Summary 2011-".to_string(),
        ];
        assert_eq!(resolve_sheet_name(&names, "Sheet1").as_deref(), Some("Sheet1"));
        assert_eq!(resolve_sheet_name(&names, " sheet1 ").as_deref(), Some("Sheet1"));
        assert_eq!(
            resolve_sheet_name(&names, "WIP - DPWH Budget Summary 2011-2025").as_deref(),
            Some("WIP - DPWH Budget Summary 2011-")
        );
        assert_eq!(resolve_sheet_name(&names, "Other"), None);
    }

    #[test]
    fn csv_files_read_as_text_cells() {
        let mut tmp = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(tmp, "FISCAL YEAR,AMOUNT").unwrap();
        writeln!(tmp, "2024,\"1,500\"").unwrap();
        writeln!(tmp, "2025,").unwrap();
        let grid = read_grid(tmp.path(), "ignored").unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1][1], Cell::Text("1,500".into()));
        assert_eq!(grid[2][1], Cell::Empty);
    }

    #[test]
    fn missing_workbook_is_missing_source() {
        let err = read_grid(Path::new("data/nope.xlsx"), "Sheet1").unwrap_err();
        assert!(err.is_missing_source());
    }
}
