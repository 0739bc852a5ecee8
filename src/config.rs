use crate::error::{PipelineError, PipelineResult};
use crate::geo::DEFAULT_GEOJSON_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A sheet inside a workbook (or a CSV export of it).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SheetSource {
    pub file: String,
    pub sheet: String,
}

impl SheetSource {
    fn new(file: &str, sheet: &str) -> Self {
        Self {
            file: file.to_string(),
            sheet: sheet.to_string(),
        }
    }
}

/// Runtime settings. Every field has a default, so a config file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Input files are resolved relative to this directory.
    pub data_dir: PathBuf,
    /// Report CSV/JSON exports go here.
    pub output_dir: PathBuf,
    pub projects_file: String,
    pub budget_summary: SheetSource,
    pub nep_gaa: SheetSource,
    /// Substring a NEP/GAA program line must contain (case-sensitive).
    pub program_filter: String,
    pub agency_budget: SheetSource,
    pub agency_header_label: String,
    pub agency_fiscal_year: i32,
    pub geojson_url: String,
    pub http_timeout_secs: u64,
    /// Matched case-insensitively as substrings of canonical contractor names.
    pub contractors_of_interest: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("reports"),
            projects_file: "Flood_Control_Data.csv".to_string(),
            budget_summary: SheetSource::new(
                "DPWH_budget_consolidated.xlsx",
                "WIP - DPWH Budget Summary 2011-",
            ),
            nep_gaa: SheetSource::new("NEP v GAA Comparison.xlsx", "Sheet1"),
            program_filter: "DPWH".to_string(),
            agency_budget: SheetSource::new("NGAs Budget per FY.xlsx", "TOTAL GAA per Agency"),
            agency_header_label: "AGENCY NAME".to_string(),
            agency_fiscal_year: 2025,
            geojson_url: DEFAULT_GEOJSON_URL.to_string(),
            http_timeout_secs: 15,
            contractors_of_interest: [
                "LEGACY CONSTRUCTION",
                "AL-JANA CONSTRUCTION",
                "L.L.M. CONSTRUCTION",
                "R.D. INTERIOR JUNIOR CONSTRUCTION",
                "ST. GERRARD CONSTRUCTION",
                "IBAYO CONSTRUCTION",
                "A.M.S. GONZALES",
                "B.M.D. CONSTRUCTION",
                "R.D. DISCAYA",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl AppConfig {
    /// Defaults, overlaid with the TOML file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> PipelineResult<Self> {
        let config: AppConfig = toml::from_str(text)?;
        if config.http_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "http_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    pub fn projects_path(&self) -> PathBuf {
        self.data_path(&self.projects_file)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_data_dir() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.projects_path(), PathBuf::from("data/Flood_Control_Data.csv"));
        assert_eq!(cfg.contractors_of_interest.len(), 9);
        assert_eq!(cfg.http_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
data_dir = "/srv/dpwh"
contractors_of_interest = ["ACME"]

[nep_gaa]
file = "nep.csv"
sheet = "Sheet1"
"#,
        )
        .unwrap();
        assert_eq!(cfg.data_path(&cfg.nep_gaa.file), PathBuf::from("/srv/dpwh/nep.csv"));
        assert_eq!(cfg.contractors_of_interest, vec!["ACME".to_string()]);
        assert_eq!(cfg.program_filter, "DPWH");
        assert_eq!(cfg.agency_fiscal_year, 2025);
    }

    #[test]
    fn rejects_zero_timeout_and_bad_toml() {
        assert!(AppConfig::from_toml("http_timeout_secs = 0").is_err());
        assert!(matches!(
            AppConfig::from_toml("data_dir = ["),
            Err(PipelineError::Config(_))
        ));
    }
}
