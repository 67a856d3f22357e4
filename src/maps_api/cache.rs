use std::num::NonZeroUsize;
use std::sync::Mutex;

use futures::future::BoxFuture;
use lru::LruCache;

use super::land_api::{LandSource, Section, StatsSummary};
use crate::error::Result;
use crate::map::feature::{Feature, FeatureCollection, LandId, LandSummary};
use crate::map::geo::GeoBounds;
use crate::sync::filter::FilterCriteria;

/// Memoizes parcel details; every other call goes straight through.
///
/// Bbox queries are never cached since the collection is replaced on every
/// settled viewport anyway.
pub struct CachedLandSource<S> {
    inner: S,
    details: Mutex<LruCache<LandId, Feature>>,
}

impl<S: LandSource> CachedLandSource<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            details: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cached_len(&self) -> usize {
        self.details.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    fn cached(&self, id: LandId) -> Option<Feature> {
        self.details.lock().ok()?.get(&id).cloned()
    }

    fn remember(&self, feature: &Feature) {
        if let Ok(mut cache) = self.details.lock() {
            cache.put(feature.id, feature.clone());
        }
    }
}

impl<S: LandSource> LandSource for CachedLandSource<S> {
    fn lands_in_bbox(&self, bounds: GeoBounds, limit: usize) -> BoxFuture<'_, Result<FeatureCollection>> {
        self.inner.lands_in_bbox(bounds, limit)
    }

    fn land(&self, id: LandId) -> BoxFuture<'_, Result<Feature>> {
        Box::pin(async move {
            if let Some(feature) = self.cached(id) {
                log::debug!("Detail cache hit for land {}", id);
                return Ok(feature);
            }

            let feature = self.inner.land(id).await?;
            self.remember(&feature);
            Ok(feature)
        })
    }

    fn search(&self, criteria: FilterCriteria, limit: usize) -> BoxFuture<'_, Result<Vec<LandSummary>>> {
        self.inner.search(criteria, limit)
    }

    fn cities(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        self.inner.cities()
    }

    fn districts(&self, city: Option<String>) -> BoxFuture<'_, Result<Vec<String>>> {
        self.inner.districts(city)
    }

    fn sections(&self, city: Option<String>, district: Option<String>) -> BoxFuture<'_, Result<Vec<Section>>> {
        self.inner.sections(city, district)
    }

    fn stats_summary(&self) -> BoxFuture<'_, Result<StatsSummary>> {
        self.inner.stats_summary()
    }
}
