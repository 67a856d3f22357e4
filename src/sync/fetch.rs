use crate::error::{Notice, Result, SyncError};
use crate::map::feature::FeatureCollection;
use crate::map::geo::GeoBounds;
use crate::maps_api::LandSource;

use super::filter::{apply_filter, FilterCriteria};
use super::loading::{Generation, LoadDomain, Settlement};

/// One bbox query as dispatched to the land service.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub bounds: GeoBounds,
    pub limit: usize,
    /// Criteria in force when the request was made. Applied to its response.
    pub filter: Option<FilterCriteria>,
    pub generation: Generation,
}

impl FetchRequest {
    /// Whether this request already answers `(bounds, filter)`.
    pub fn covers(&self, bounds: &GeoBounds, filter: Option<&FilterCriteria>) -> bool {
        self.bounds == *bounds && self.filter.as_ref() == filter
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    /// Page size with no filter active.
    pub base: usize,
    /// Page size while a filter is active. Filtering happens after the fetch,
    /// so a small page would hide matches.
    pub filtered: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            base: 500,
            filtered: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// New collection to render, with notices for the user.
    Applied {
        collection: FeatureCollection,
        notices: Vec<Notice>,
    },
    /// The fetch failed; the rendered collection is unchanged.
    Failed(SyncError),
    /// Superseded response, discarded.
    Stale,
}

/// Single-flight executor for main-viewport bbox queries.
///
/// Owns the rendered collection: it is replaced only by a current, successful
/// response and never touched by a failure.
#[derive(Debug)]
pub struct FetchCoordinator {
    domain: LoadDomain,
    limits: FetchLimits,
    in_flight: Option<FetchRequest>,
    last_settled: Option<FetchRequest>,
    rendered: FeatureCollection,
}

impl FetchCoordinator {
    pub fn new(limits: FetchLimits) -> Self {
        Self {
            domain: LoadDomain::new("viewport"),
            limits,
            in_flight: None,
            last_settled: None,
            rendered: FeatureCollection::default(),
        }
    }

    pub fn limit_for(&self, filter: Option<&FilterCriteria>) -> usize {
        match filter {
            Some(criteria) if criteria.is_active() => self.limits.filtered,
            _ => self.limits.base,
        }
    }

    /// Starts a request, or returns `None` if one is already outstanding.
    pub fn begin(&mut self, bounds: GeoBounds, filter: Option<&FilterCriteria>) -> Option<FetchRequest> {
        let filter = filter.map(FilterCriteria::normalized).filter(FilterCriteria::is_active);
        let limit = self.limit_for(filter.as_ref());
        let generation = self.domain.try_begin()?;

        let request = FetchRequest {
            bounds,
            limit,
            filter,
            generation,
        };
        log::debug!(
            "Fetching parcels in {:?} (limit {}, generation {})",
            request.bounds,
            request.limit,
            generation.0
        );
        self.in_flight = Some(request.clone());
        Some(request)
    }

    /// Applies the response for `generation`.
    pub fn settle(&mut self, generation: Generation, result: Result<FeatureCollection>) -> FetchOutcome {
        let answers_in_flight = self
            .in_flight
            .as_ref()
            .is_some_and(|request| request.generation == generation);
        let request = if answers_in_flight { self.in_flight.take() } else { None };

        let settlement = self.domain.settle(generation, result.is_ok());
        let (Settlement::Current(_), Some(request)) = (settlement, request) else {
            return FetchOutcome::Stale;
        };

        let raw = match result {
            Ok(raw) => raw,
            Err(err) => {
                log::error!("Failed to load parcels for {:?}: {}", request.bounds, err);
                self.last_settled = Some(request);
                return FetchOutcome::Failed(err);
            }
        };

        let mut notices = Vec::new();
        if raw.len() >= request.limit {
            notices.push(Notice::LimitReached {
                count: raw.len(),
                limit: request.limit,
            });
        }

        let collection = match &request.filter {
            Some(criteria) => apply_filter(&raw, criteria),
            None => raw,
        };
        if collection.is_empty() {
            notices.push(Notice::EmptyResult);
        }

        log::info!(
            "Loaded {} parcels (generation {})",
            collection.len(),
            generation.0
        );
        self.rendered = collection.clone();
        self.last_settled = Some(request);
        FetchOutcome::Applied {
            collection,
            notices,
        }
    }

    /// `begin`, await the service, `settle`. Holding `&mut self` across the
    /// await makes overlapping calls impossible for a single owner.
    pub async fn request(
        &mut self,
        source: &dyn LandSource,
        bounds: GeoBounds,
        filter: Option<&FilterCriteria>,
    ) -> Option<FetchOutcome> {
        let request = self.begin(bounds, filter)?;
        let result = source.lands_in_bbox(request.bounds, request.limit).await;
        Some(self.settle(request.generation, result))
    }

    /// Turns the outstanding response, if any, into a stale one.
    pub fn invalidate(&mut self) {
        self.domain.invalidate();
    }

    pub fn close(&mut self) {
        self.domain.close();
    }

    pub fn is_loading(&self) -> bool {
        self.domain.is_loading()
    }

    pub fn in_flight(&self) -> Option<&FetchRequest> {
        self.in_flight.as_ref()
    }

    /// Latest request answered as current, successfully or not.
    pub fn last_settled(&self) -> Option<&FetchRequest> {
        self.last_settled.as_ref()
    }

    pub fn rendered(&self) -> &FeatureCollection {
        &self.rendered
    }

    pub fn domain(&self) -> &LoadDomain {
        &self.domain
    }
}
