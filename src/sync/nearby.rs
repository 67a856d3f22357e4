use crate::error::Result;
use crate::map::feature::{Feature, FeatureCollection, LandId};
use crate::map::geo::GeoBounds;

use super::loading::{Generation, LoadDomain, Settlement};

pub const DEFAULT_NEARBY_LIMIT: usize = 100;
/// Extra span added around the selected parcel, as a fraction of its own span.
pub const DEFAULT_NEARBY_PADDING: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct NearbyRequest {
    pub selected: LandId,
    pub bounds: GeoBounds,
    pub limit: usize,
    pub generation: Generation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NearbyOutcome {
    /// Surrounding parcels for the current selection, selection itself excluded.
    Applied(FeatureCollection),
    /// Logged and otherwise ignored.
    Failed,
    Stale,
}

/// Loads the parcels around the selection for the detail panel.
///
/// Has its own load domain, so it neither waits on nor holds up the main
/// viewport fetch.
#[derive(Debug)]
pub struct NearbyContextLoader {
    domain: LoadDomain,
    limit: usize,
    padding: f64,
    selected: Option<Feature>,
    needs_load: bool,
    in_flight: Option<NearbyRequest>,
    context: FeatureCollection,
}

impl NearbyContextLoader {
    pub fn new(limit: usize, padding: f64) -> Self {
        Self {
            domain: LoadDomain::new("nearby"),
            limit,
            padding,
            selected: None,
            needs_load: false,
            in_flight: None,
            context: FeatureCollection::default(),
        }
    }

    pub fn context_bounds(&self, feature: &Feature) -> Result<GeoBounds> {
        Ok(feature.bounds()?.padded(self.padding))
    }

    pub fn selected(&self) -> Option<&Feature> {
        self.selected.as_ref()
    }

    pub fn context(&self) -> &FeatureCollection {
        &self.context
    }

    pub fn is_loading(&self) -> bool {
        self.domain.is_loading()
    }

    /// New selection. Whatever is in flight for the previous one becomes
    /// stale; returns the request to dispatch if the domain is free.
    pub fn select(&mut self, feature: Feature) -> Option<NearbyRequest> {
        self.domain.invalidate();
        self.context = FeatureCollection::default();
        self.selected = Some(feature);
        self.needs_load = true;
        self.resume()
    }

    /// Deselect. Drops the context and anything in flight.
    pub fn clear(&mut self) {
        self.domain.invalidate();
        self.selected = None;
        self.needs_load = false;
        self.context = FeatureCollection::default();
    }

    /// Starts the load for the current selection if one is still owed and
    /// nothing is outstanding.
    pub fn resume(&mut self) -> Option<NearbyRequest> {
        if !self.needs_load || self.domain.is_loading() {
            return None;
        }
        let feature = self.selected.as_ref()?;

        let bounds = match self.context_bounds(feature) {
            Ok(bounds) => bounds,
            Err(err) => {
                log::debug!("No nearby context for land {}: {}", feature.id, err);
                self.needs_load = false;
                return None;
            }
        };
        let selected = feature.id;

        let generation = self.domain.try_begin()?;
        self.needs_load = false;
        let request = NearbyRequest {
            selected,
            bounds,
            limit: self.limit,
            generation,
        };
        self.in_flight = Some(request.clone());
        Some(request)
    }

    pub fn settle(&mut self, generation: Generation, result: Result<FeatureCollection>) -> NearbyOutcome {
        let answers_in_flight = self
            .in_flight
            .as_ref()
            .is_some_and(|request| request.generation == generation);
        let request = if answers_in_flight { self.in_flight.take() } else { None };

        let settlement = self.domain.settle(generation, result.is_ok());
        let (Settlement::Current(_), Some(request)) = (settlement, request) else {
            return NearbyOutcome::Stale;
        };

        match result {
            Ok(collection) => {
                self.context = collection.without(request.selected);
                NearbyOutcome::Applied(self.context.clone())
            }
            Err(err) => {
                // Best effort: the selection itself is already on screen
                log::warn!("Failed to load parcels near land {}: {}", request.selected, err);
                NearbyOutcome::Failed
            }
        }
    }

    pub fn close(&mut self) {
        self.domain.close();
        self.needs_load = false;
    }
}

impl Default for NearbyContextLoader {
    fn default() -> Self {
        Self::new(DEFAULT_NEARBY_LIMIT, DEFAULT_NEARBY_PADDING)
    }
}
