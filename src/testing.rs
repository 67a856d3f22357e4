//! Test doubles for the land service and the map.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::{Result, SyncError};
use crate::map::feature::{Feature, FeatureCollection, Geometry, LandId, LandProperties, LandSummary};
use crate::map::geo::{GeoBounds, Viewport};
use crate::map::handle::{CameraTarget, MapHandle};
use crate::maps_api::{LandSource, Section, StatsSummary};
use crate::sync::filter::FilterCriteria;

/// Axis-aligned square parcel with its south-west corner at `(min_lng, min_lat)`.
pub(crate) fn parcel(id: i64, min_lng: f64, min_lat: f64, size: f64) -> Feature {
    let ring = vec![
        vec![min_lng, min_lat],
        vec![min_lng + size, min_lat],
        vec![min_lng + size, min_lat + size],
        vec![min_lng, min_lat + size],
        vec![min_lng, min_lat],
    ];
    Feature::new(
        LandId(id),
        Some(Geometry::Polygon { coordinates: vec![ring] }),
        LandProperties::default(),
    )
}

/// Small parcel sitting at the center of `bounds`.
pub(crate) fn parcel_in(id: i64, bounds: &GeoBounds) -> Feature {
    let center = bounds.center();
    let size = bounds.span().0 / 10.0;
    parcel(id, center.longitude - size / 2.0, center.latitude - size / 2.0, size)
}

/// Disjoint parcels, one per id, all near 121.5 / 25.0.
pub(crate) fn collection(ids: &[i64]) -> FeatureCollection {
    ids.iter()
        .map(|&id| parcel(id, 121.5 + id as f64 * 0.001, 25.0, 0.0005))
        .collect()
}

#[derive(Default)]
struct State {
    features: Vec<Feature>,
    details: HashMap<LandId, Feature>,
    search_rows: Option<Vec<LandSummary>>,
    gated: bool,
    parked: VecDeque<oneshot::Sender<()>>,
    bbox_failures: VecDeque<SyncError>,
    bbox_calls: Vec<(GeoBounds, usize)>,
    detail_calls: usize,
    search_calls: Vec<(FilterCriteria, usize)>,
}

impl State {
    fn gate(&mut self) -> Option<oneshot::Receiver<()>> {
        if !self.gated {
            return None;
        }
        let (release, parked) = oneshot::channel();
        self.parked.push_back(release);
        Some(parked)
    }
}

async fn released(gate: Option<oneshot::Receiver<()>>) -> Result<()> {
    if let Some(gate) = gate {
        gate.await
            .map_err(|_| SyncError::Network("request abandoned".to_string()))?;
    }
    Ok(())
}

/// In-memory land service. Answers are computed when a call is made; when
/// gated, each call then waits until the test releases it.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    state: Mutex<State>,
}

impl ScriptedSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_features(features: Vec<Feature>) -> Self {
        let source = Self::new();
        for feature in features {
            source.add_feature(feature);
        }
        source
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub(crate) fn add_feature(&self, feature: Feature) {
        let mut state = self.lock();
        state.details.insert(feature.id, feature.clone());
        state.features.push(feature);
    }

    pub(crate) fn add_detail(&self, feature: Feature) {
        self.lock().details.insert(feature.id, feature);
    }

    pub(crate) fn set_search_rows(&self, rows: Vec<LandSummary>) {
        self.lock().search_rows = Some(rows);
    }

    /// From now on every call parks until released.
    pub(crate) fn gate(&self) {
        self.lock().gated = true;
    }

    pub(crate) fn fail_next_bbox(&self, err: SyncError) {
        self.lock().bbox_failures.push_back(err);
    }

    /// Lets the oldest parked call complete.
    pub(crate) fn release_next(&self) -> bool {
        match self.lock().parked.pop_front() {
            Some(release) => release.send(()).is_ok(),
            None => false,
        }
    }

    pub(crate) fn parked_len(&self) -> usize {
        self.lock().parked.len()
    }

    pub(crate) fn bbox_calls(&self) -> Vec<(GeoBounds, usize)> {
        self.lock().bbox_calls.clone()
    }

    pub(crate) fn detail_calls(&self) -> usize {
        self.lock().detail_calls
    }

    pub(crate) fn search_calls(&self) -> Vec<(FilterCriteria, usize)> {
        self.lock().search_calls.clone()
    }
}

impl LandSource for ScriptedSource {
    fn lands_in_bbox(&self, bounds: GeoBounds, limit: usize) -> BoxFuture<'_, Result<FeatureCollection>> {
        let (response, gate) = {
            let mut state = self.lock();
            state.bbox_calls.push((bounds, limit));
            let response: Result<FeatureCollection> = match state.bbox_failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(state
                    .features
                    .iter()
                    .filter(|feature| feature.bounds().is_ok_and(|b| b.intersects(&bounds)))
                    .take(limit)
                    .cloned()
                    .collect()),
            };
            (response, state.gate())
        };
        Box::pin(async move {
            released(gate).await?;
            response
        })
    }

    fn land(&self, id: LandId) -> BoxFuture<'_, Result<Feature>> {
        let (response, gate) = {
            let mut state = self.lock();
            state.detail_calls += 1;
            let response = state.details.get(&id).cloned().ok_or(SyncError::Status(404));
            (response, state.gate())
        };
        Box::pin(async move {
            released(gate).await?;
            response
        })
    }

    fn search(&self, criteria: FilterCriteria, limit: usize) -> BoxFuture<'_, Result<Vec<LandSummary>>> {
        let (response, gate) = {
            let mut state = self.lock();
            state.search_calls.push((criteria, limit));
            let response = state.search_rows.clone().ok_or(SyncError::Status(500));
            (response, state.gate())
        };
        Box::pin(async move {
            released(gate).await?;
            response
        })
    }

    fn cities(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async { Ok(vec!["臺北市".to_string(), "新北市".to_string()]) })
    }

    fn districts(&self, _city: Option<String>) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async { Ok(vec!["大安區".to_string()]) })
    }

    fn sections(&self, _city: Option<String>, _district: Option<String>) -> BoxFuture<'_, Result<Vec<Section>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn stats_summary(&self) -> BoxFuture<'_, Result<StatsSummary>> {
        Box::pin(async { Ok(StatsSummary::fallback()) })
    }
}

/// Map that remembers every camera move it was asked for.
pub(crate) struct RecordingMap {
    viewport: Mutex<Viewport>,
    views: Mutex<Vec<CameraTarget>>,
}

impl RecordingMap {
    pub(crate) fn views(&self) -> Vec<CameraTarget> {
        self.views.lock().unwrap().clone()
    }
}

impl Default for RecordingMap {
    fn default() -> Self {
        Self {
            viewport: Mutex::new(Viewport::new(GeoBounds::new(121.5, 25.0, 121.6, 25.1), 15)),
            views: Mutex::new(Vec::new()),
        }
    }
}

impl MapHandle for RecordingMap {
    fn bounds(&self) -> GeoBounds {
        self.viewport.lock().unwrap().bounds
    }

    fn zoom(&self) -> u8 {
        self.viewport.lock().unwrap().zoom
    }

    fn set_view(&self, target: CameraTarget) {
        self.views.lock().unwrap().push(target);
    }
}
