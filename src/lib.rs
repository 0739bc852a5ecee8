//! Cleaning and aggregation layer for DPWH flood-control project records and
//! national budget sheets.
//!
//! Raw exports go through [`loader`] (validation) and [`derive`] (computed
//! fields); the resulting [`types::ProjectRecord`] snapshot feeds
//! [`aggregate`], [`scorecard`] and the dashboard views in [`reports`].
//! [`service::DataService`] is the entry point for callers.

pub mod aggregate;
pub mod budget;
pub mod cache;
pub mod config;
pub mod derive;
pub mod error;
pub mod geo;
pub mod loader;
pub mod output;
pub mod reports;
pub mod scorecard;
pub mod service;
pub mod sheet;
pub mod types;
pub mod util;

pub use error::{PipelineError, PipelineResult};
pub use service::{DataService, Dataset};
