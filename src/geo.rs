//! Region boundary GeoJSON, fetched once and shared.
//!
//! A failed fetch is never an error for the caller: it comes back as
//! [`GeoAvailability::Unavailable`] and the map view falls back to its table.

use crate::cache::MemoCache;
use crate::error::{PipelineError, PipelineResult};
use crate::types::GroupValue;
use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_GEOJSON_URL: &str =
    "https://raw.githubusercontent.com/gjevel/philippines-geojson/master/regions/ph-regions-no-islands.json";

/// Where the boundary document comes from.
pub trait GeoSource: Send + Sync {
    fn fetch(&self, url: &str) -> PipelineResult<Value>;
}

pub struct HttpGeoSource {
    client: Client,
}

impl HttpGeoSource {
    pub fn new(timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl GeoSource for HttpGeoSource {
    fn fetch(&self, url: &str) -> PipelineResult<Value> {
        let response = self.client.get(url).send()?.error_for_status()?;
        let doc: Value = response.json()?;
        if doc.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
            return Err(PipelineError::schema(url, "not a GeoJSON FeatureCollection"));
        }
        Ok(doc)
    }
}

/// Stands in when no working source could be built; every fetch fails with
/// the original reason.
struct Unbuildable {
    reason: String,
}

impl GeoSource for Unbuildable {
    fn fetch(&self, _url: &str) -> PipelineResult<Value> {
        Err(PipelineError::Network(self.reason.clone()))
    }
}

#[derive(Debug, Clone)]
pub enum GeoAvailability {
    Available(Arc<Value>),
    Unavailable { reason: String },
}

impl GeoAvailability {
    pub fn document(&self) -> Option<&Value> {
        match self {
            GeoAvailability::Available(doc) => Some(doc.as_ref()),
            GeoAvailability::Unavailable { .. } => None,
        }
    }
}

pub struct GeoLookup {
    url: String,
    source: Box<dyn GeoSource>,
    cache: MemoCache<String, Arc<Value>>,
}

impl GeoLookup {
    pub fn new(url: impl Into<String>, source: Box<dyn GeoSource>) -> Self {
        Self {
            url: url.into(),
            source,
            cache: MemoCache::new(),
        }
    }

    /// Lookup over HTTP. A client that cannot be built leaves the map
    /// unavailable instead of failing the caller.
    pub fn http(url: impl Into<String>, timeout: Duration) -> Self {
        let source = HttpGeoSource::new(timeout).map(|s| Box::new(s) as Box<dyn GeoSource>);
        Self::or_unavailable(url, source)
    }

    pub fn or_unavailable(url: impl Into<String>, source: PipelineResult<Box<dyn GeoSource>>) -> Self {
        match source {
            Ok(source) => Self::new(url, source),
            Err(e) => {
                warn!(error = %e, "geometry client unavailable");
                Self::new(
                    url,
                    Box::new(Unbuildable {
                        reason: e.to_string(),
                    }),
                )
            }
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The boundary document, fetched on first success and then reused.
    pub fn region_geometry(&self) -> GeoAvailability {
        let loaded = self.cache.get_or_try_load(&self.url, || {
            info!(url = %self.url, "fetching region geometry");
            self.source.fetch(&self.url).map(Arc::new)
        });
        match loaded {
            Ok(doc) => GeoAvailability::Available(doc),
            Err(e) => {
                warn!(url = %self.url, error = %e, "region geometry unavailable");
                GeoAvailability::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// `properties.region_name` of every feature, in document order.
pub fn feature_region_names(doc: &Value) -> Vec<String> {
    doc.get("features")
        .and_then(Value::as_array)
        .map(|features| {
            features
                .iter()
                .filter_map(|f| f.pointer("/properties/region_name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Per-region aggregates split by whether the map has a shape for them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionJoin {
    pub matched: Vec<GroupValue>,
    pub unmatched: Vec<GroupValue>,
}

pub fn join_regions(values: &[GroupValue], doc: &Value) -> RegionJoin {
    let names: HashSet<String> = feature_region_names(doc).into_iter().collect();
    let (matched, unmatched) = values
        .iter()
        .cloned()
        .partition(|v| names.contains(&v.key));
    RegionJoin { matched, unmatched }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Offline;

    impl GeoSource for Offline {
        fn fetch(&self, _url: &str) -> PipelineResult<Value> {
            Err(PipelineError::Network("connection refused".into()))
        }
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail_first: bool,
    }

    impl GeoSource for Counting {
        fn fetch(&self, _url: &str) -> PipelineResult<Value> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(PipelineError::Network("timeout".into()));
            }
            Ok(sample())
        }
    }

    fn sample() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"region_name": "National Capital Region (NCR)"}},
                {"type": "Feature", "properties": {"region_name": "Region III (Central Luzon)"}},
                {"type": "Feature", "properties": {}}
            ]
        })
    }

    #[test]
    fn network_failure_is_unavailable() {
        let lookup = GeoLookup::new("http://example.invalid/geo.json", Box::new(Offline));
        match lookup.region_geometry() {
            GeoAvailability::Unavailable { reason } => assert!(reason.contains("connection refused")),
            GeoAvailability::Available(_) => panic!("expected unavailable"),
        }
    }

    #[test]
    fn success_is_fetched_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = GeoLookup::new(
            "http://example.invalid/geo.json",
            Box::new(Counting { calls: Arc::clone(&calls), fail_first: false }),
        );
        assert!(lookup.region_geometry().document().is_some());
        assert!(lookup.region_geometry().document().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_is_retried_later() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lookup = GeoLookup::new(
            "http://example.invalid/geo.json",
            Box::new(Counting { calls: Arc::clone(&calls), fail_first: true }),
        );
        assert!(lookup.region_geometry().document().is_none());
        assert!(lookup.region_geometry().document().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unbuildable_client_is_unavailable() {
        let lookup = GeoLookup::or_unavailable(
            "http://example.invalid/geo.json",
            Err(PipelineError::Network("no tls backend".into())),
        );
        match lookup.region_geometry() {
            GeoAvailability::Unavailable { reason } => assert!(reason.contains("no tls backend")),
            GeoAvailability::Available(_) => panic!("expected unavailable"),
        }
    }

    #[test]
    fn joins_on_region_name() {
        let values = vec![
            GroupValue { key: "National Capital Region (NCR)".into(), value: 10.0 },
            GroupValue { key: "REGION XIV".into(), value: 3.0 },
        ];
        let join = join_regions(&values, &sample());
        assert_eq!(join.matched.len(), 1);
        assert_eq!(join.unmatched[0].key, "REGION XIV");
        assert_eq!(feature_region_names(&sample()).len(), 2);
    }
}
