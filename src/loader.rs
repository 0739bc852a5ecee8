use crate::error::{PipelineError, PipelineResult};
use crate::types::{RawRow, ValidatedRow, PROJECT_COLUMNS};
use crate::util::{clean_text, parse_date_safe, parse_f64_safe};
use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    /// Rows missing a required date, amount, contractor or region.
    pub dropped_incomplete: usize,
    /// Kept rows whose ProjectID had already been seen (multi-lot contracts).
    pub duplicate_ids: usize,
    /// Lines the CSV reader itself could not decode.
    pub unreadable_rows: usize,
}

/// Read and validate the project export at `path`.
///
/// A row survives only if all three dates parse, both amounts normalize to a
/// non-negative number, and contractor and region are non-blank. Nothing is
/// repaired. Repeated `ProjectID`s are kept and only counted.
pub fn load_project_rows(path: &Path) -> PipelineResult<(Vec<ValidatedRow>, LoadReport)> {
    if !path.is_file() {
        return Err(PipelineError::MissingSourceFile {
            path: path.display().to_string(),
        });
    }
    let file = std::fs::File::open(path)?;
    let (rows, report) = load_project_rows_from_reader(file, &path.display().to_string())?;
    info!(
        path = %path.display(),
        total = report.total_rows,
        kept = report.kept_rows,
        dropped = report.dropped_incomplete,
        repeated_ids = report.duplicate_ids,
        "loaded project records"
    );
    Ok((rows, report))
}

pub fn load_project_rows_from_reader<R: Read>(
    reader: R,
    source_name: &str,
) -> PipelineResult<(Vec<ValidatedRow>, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let present: HashSet<&str> = headers.iter().map(str::trim).collect();
    let missing: Vec<&str> = PROJECT_COLUMNS
        .iter()
        .copied()
        .filter(|c| !present.contains(c))
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::schema(
            source_name,
            format!("missing column(s): {}", missing.join(", ")),
        ));
    }

    let mut report = LoadReport::default();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut rows: Vec<ValidatedRow> = Vec::new();

    for (idx, result) in rdr.deserialize::<RawRow>().enumerate() {
        report.total_rows += 1;
        let raw = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(line = idx + 2, error = %e, "unreadable row");
                report.unreadable_rows += 1;
                report.dropped_incomplete += 1;
                continue;
            }
        };

        let Some(row) = validate_row(raw) else {
            debug!(line = idx + 2, "dropping incomplete row");
            report.dropped_incomplete += 1;
            continue;
        };

        if let Some(id) = &row.project_id {
            if !seen_ids.insert(id.clone()) {
                debug!(line = idx + 2, project_id = %id, "repeated project id");
                report.duplicate_ids += 1;
            }
        }
        rows.push(row);
    }

    report.kept_rows = rows.len();
    Ok((rows, report))
}

/// All-or-nothing check of the required fields.
fn validate_row(raw: RawRow) -> Option<ValidatedRow> {
    let start_date = parse_date_safe(raw.start_date.as_deref());
    let completion_date_original = parse_date_safe(raw.completion_date_original.as_deref());
    let completion_date_actual = parse_date_safe(raw.completion_date_actual.as_deref());
    let approved_budget = parse_f64_safe(raw.approved_budget.as_deref()).filter(|v| *v >= 0.0);
    let contract_cost = parse_f64_safe(raw.contract_cost.as_deref()).filter(|v| *v >= 0.0);
    let contractor = clean_text(raw.contractor.as_deref());
    let region = clean_text(raw.region.as_deref());

    Some(ValidatedRow {
        project_id: clean_text(raw.project_id.as_deref()),
        project_description: clean_text(raw.project_description.as_deref()),
        region: region?,
        province: clean_text(raw.province.as_deref()),
        implementing_office: clean_text(raw.implementing_office.as_deref()),
        contractor: contractor?,
        approved_budget: approved_budget?,
        contract_cost: contract_cost?,
        start_date: start_date?,
        completion_date_original: completion_date_original?,
        completion_date_actual: completion_date_actual?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "ProjectID,ProjectDescription,Region,Province,ImplementingOffice,Contractor,ApprovedBudgetForTheContract,ContractCost,StartDate,CompletionDateOriginal,CompletionDateActual,PresTerm";

    fn load(body: &str) -> (Vec<ValidatedRow>, LoadReport) {
        let content = format!("{}\n{}", HEADER, body);
        load_project_rows_from_reader(content.as_bytes(), "test").unwrap()
    }

    #[test]
    fn keeps_complete_rows_and_parses_currency() {
        let (rows, report) = load(
            "P-1,Dike,Region III,Bulacan,Bulacan 1st DEO,ACME (PH),\"1,000,000.00\",950000,2022-01-10,2022-06-01,2022-06-11,Duterte\n",
        );
        assert_eq!(report.total_rows, 1);
        assert_eq!(report.kept_rows, 1);
        let row = &rows[0];
        assert_eq!(row.approved_budget, 1_000_000.0);
        assert_eq!(row.contract_cost, 950_000.0);
        assert_eq!(row.contractor, "ACME (PH)");
        assert_eq!(
            row.completion_date_actual,
            NaiveDate::from_ymd_opt(2022, 6, 11).unwrap()
        );
    }

    #[test]
    fn drops_rows_missing_any_required_field() {
        let body = "\
P-1,Dike,Region III,Bulacan,DEO,ACME,100,90,2022-01-10,2022-06-01,bad-date,X
P-2,Dike,Region III,Bulacan,DEO,ACME,N/A,90,2022-01-10,2022-06-01,2022-06-11,X
P-3,Dike,,Bulacan,DEO,ACME,100,90,2022-01-10,2022-06-01,2022-06-11,X
P-4,Dike,Region III,Bulacan,DEO,  ,100,90,2022-01-10,2022-06-01,2022-06-11,X
P-5,Dike,Region III,,,ACME,100,90,2022-01-10,2022-06-01,2022-06-11,X
";
        let (rows, report) = load(body);
        assert_eq!(report.dropped_incomplete, 4);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].project_id.as_deref(), Some("P-5"));
        assert_eq!(rows[0].province, None);
    }

    #[test]
    fn repeated_project_ids_are_kept_and_counted() {
        let body = "\
P-1,First lot,NCR,Manila,DEO,ACME,100,100,2022-01-10,2022-06-01,2022-06-11,X
P-1,Second lot,NCR,Manila,DEO,BETA,500,500,2022-01-10,2022-06-01,2022-06-11,X
,No id,NCR,Manila,DEO,ACME,100,90,2022-01-10,2022-06-01,2022-06-11,X
,No id,NCR,Manila,DEO,ACME,100,90,2022-01-10,2022-06-01,2022-06-11,X
";
        let (rows, report) = load(body);
        assert_eq!(report.duplicate_ids, 1);
        assert_eq!(report.kept_rows, 4);
        assert_eq!(rows.len(), 4);
        let lot_cost: f64 = rows
            .iter()
            .filter(|r| r.project_id.as_deref() == Some("P-1"))
            .map(|r| r.contract_cost)
            .sum();
        assert_eq!(lot_cost, 600.0);
        assert_eq!(rows[1].project_description.as_deref(), Some("Second lot"));
    }

    #[test]
    fn missing_column_is_schema_mismatch() {
        let content = "ProjectID,Region\nP-1,NCR\n";
        let err = load_project_rows_from_reader(content.as_bytes(), "short.csv").unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_project_rows(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.is_missing_source());
    }

    #[test]
    fn loads_from_disk() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "{}", HEADER).unwrap();
        writeln!(
            tmp,
            "P-9,Seawall,CAR,Benguet,DEO,BETA,50,50,2021-02-01,2021-05-01,2021-04-26,X"
        )
        .unwrap();
        let (rows, report) = load_project_rows(tmp.path()).unwrap();
        assert_eq!(report.kept_rows, 1);
        assert_eq!(rows[0].region, "CAR");
    }
}
