//! What the presentation layer talks to: the cleaned project dataset, the
//! region geometry, and the budget tables, each loaded at most once.

use crate::budget::{load_agency_budgets, load_budget_summary, load_nep_gaa, top_agencies, yearly_totals};
use crate::cache::MemoCache;
use crate::config::AppConfig;
use crate::derive::derive_all;
use crate::error::PipelineResult;
use crate::geo::{GeoAvailability, GeoLookup};
use crate::loader::{load_project_rows, LoadReport};
use crate::sheet::read_grid;
use crate::types::{AgencyBudget, NepGaaRow, ProjectRecord, YearTotal};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TOP_AGENCIES: usize = 10;

/// Immutable, shared snapshot of the cleaned projects.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub records: Vec<ProjectRecord>,
    pub report: LoadReport,
}

/// Load, validate and derive in one go, without caching.
pub fn build_dataset(path: &Path) -> PipelineResult<Dataset> {
    let (rows, report) = load_project_rows(path)?;
    Ok(Dataset {
        records: derive_all(rows),
        report,
    })
}

pub struct DataService {
    config: AppConfig,
    projects: MemoCache<PathBuf, Arc<Dataset>>,
    geo: GeoLookup,
}

impl DataService {
    pub fn new(config: AppConfig, geo: GeoLookup) -> Self {
        Self {
            config,
            projects: MemoCache::new(),
            geo,
        }
    }

    /// Service backed by a real HTTP client for the geometry.
    pub fn from_config(config: AppConfig) -> Self {
        let geo = GeoLookup::http(config.geojson_url.clone(), config.http_timeout());
        Self::new(config, geo)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Cleaned project records from the configured file.
    pub fn project_dataset(&self) -> PipelineResult<Arc<Dataset>> {
        self.project_dataset_at(&self.config.projects_path())
    }

    /// Cleaned project records from `path`, memoized per path.
    pub fn project_dataset_at(&self, path: &Path) -> PipelineResult<Arc<Dataset>> {
        self.projects
            .get_or_try_load(&path.to_path_buf(), || build_dataset(path).map(Arc::new))
    }

    /// Whether the default dataset has been loaded already.
    pub fn dataset_loaded(&self) -> bool {
        self.projects.get(&self.config.projects_path()).is_some()
    }

    pub fn region_geometry(&self) -> GeoAvailability {
        self.geo.region_geometry()
    }

    pub fn budget_trend(&self) -> PipelineResult<Vec<YearTotal>> {
        let src = &self.config.budget_summary;
        let path = self.config.data_path(&src.file);
        let grid = read_grid(&path, &src.sheet)?;
        let records = load_budget_summary(&grid, &src.file)?;
        Ok(yearly_totals(&records))
    }

    pub fn nep_vs_gaa(&self) -> PipelineResult<Vec<NepGaaRow>> {
        let src = &self.config.nep_gaa;
        let grid = read_grid(&self.config.data_path(&src.file), &src.sheet)?;
        load_nep_gaa(&grid, &src.file, &self.config.program_filter)
    }

    pub fn top_agencies(&self) -> PipelineResult<Vec<AgencyBudget>> {
        let src = &self.config.agency_budget;
        let grid = read_grid(&self.config.data_path(&src.file), &src.sheet)?;
        let agencies = load_agency_budgets(
            &grid,
            &src.file,
            &self.config.agency_header_label,
            self.config.agency_fiscal_year,
        )?;
        Ok(top_agencies(agencies, TOP_AGENCIES))
    }
}
