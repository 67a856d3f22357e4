use crate::error::{Notice, Result};
use crate::map::feature::{Feature, LandId, LandSummary};

use super::filter::{key_is_set, FilterCriteria};
use super::loading::{Generation, LoadDomain, Settlement};
use super::selection::CameraPurpose;

/// Row cap for a criteria search. Narrower criteria are allowed more rows.
pub fn search_limit(criteria: &FilterCriteria) -> usize {
    if key_is_set(&criteria.district) {
        5000
    } else if key_is_set(&criteria.city) {
        2000
    } else if key_is_set(&criteria.parcel_no) || key_is_set(&criteria.owner_name) {
        1000
    } else {
        100
    }
}

/// The one notice shown after a search returns `count` rows.
pub fn classify(count: usize, limit: usize) -> Notice {
    if count == 0 {
        Notice::EmptyResult
    } else if count >= limit {
        Notice::LimitReached { count, limit }
    } else {
        Notice::SearchFound(count)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub criteria: FilterCriteria,
    pub limit: usize,
    pub generation: Generation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailRequest {
    pub id: LandId,
    pub purpose: CameraPurpose,
    pub generation: Generation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found {
        criteria: FilterCriteria,
        rows: Vec<LandSummary>,
        notice: Notice,
    },
    Failed,
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetailOutcome {
    Loaded { feature: Feature, purpose: CameraPurpose },
    Failed(CameraPurpose),
    Stale,
}

/// Criteria search and `/lands/{id}` lookups for the search panel.
///
/// Both run in their own load domains. A newer submission supersedes an
/// outstanding one: the old response is discarded and the newer one is
/// dispatched once the slot frees up.
#[derive(Debug)]
pub struct SearchController {
    search: LoadDomain,
    detail: LoadDomain,
    wanted_search: Option<FilterCriteria>,
    wanted_detail: Option<(LandId, CameraPurpose)>,
    in_flight: Option<SearchRequest>,
    detail_in_flight: Option<DetailRequest>,
    results: Vec<LandSummary>,
}

impl SearchController {
    pub fn new() -> Self {
        Self {
            search: LoadDomain::new("search"),
            detail: LoadDomain::new("detail"),
            wanted_search: None,
            wanted_detail: None,
            in_flight: None,
            detail_in_flight: None,
            results: Vec::new(),
        }
    }

    pub fn results(&self) -> &[LandSummary] {
        &self.results
    }

    pub fn is_searching(&self) -> bool {
        self.search.is_loading()
    }

    pub fn submit(&mut self, criteria: FilterCriteria) -> Option<SearchRequest> {
        self.search.invalidate();
        self.wanted_search = Some(criteria.normalized());
        self.resume_search()
    }

    pub fn resume_search(&mut self) -> Option<SearchRequest> {
        if self.wanted_search.is_none() || self.search.is_loading() {
            return None;
        }
        let generation = self.search.try_begin()?;
        let criteria = self.wanted_search.take()?;
        let request = SearchRequest {
            limit: search_limit(&criteria),
            criteria,
            generation,
        };
        log::debug!("Searching {:?} (limit {})", request.criteria, request.limit);
        self.in_flight = Some(request.clone());
        Some(request)
    }

    pub fn settle_search(&mut self, generation: Generation, result: Result<Vec<LandSummary>>) -> SearchOutcome {
        let answers_in_flight = self
            .in_flight
            .as_ref()
            .is_some_and(|request| request.generation == generation);
        let request = if answers_in_flight { self.in_flight.take() } else { None };

        let settlement = self.search.settle(generation, result.is_ok());
        let (Settlement::Current(_), Some(request)) = (settlement, request) else {
            return SearchOutcome::Stale;
        };

        match result {
            Ok(rows) => {
                let notice = classify(rows.len(), request.limit);
                log::info!("Search returned {} parcels", rows.len());
                self.results = rows.clone();
                SearchOutcome::Found {
                    criteria: request.criteria,
                    rows,
                    notice,
                }
            }
            Err(err) => {
                log::error!("Search for {:?} failed: {}", request.criteria, err);
                SearchOutcome::Failed
            }
        }
    }

    /// Looks up a parcel so the camera can move to it.
    pub fn lookup(&mut self, id: LandId, purpose: CameraPurpose) -> Option<DetailRequest> {
        self.detail.invalidate();
        self.wanted_detail = Some((id, purpose));
        self.resume_detail()
    }

    pub fn resume_detail(&mut self) -> Option<DetailRequest> {
        if self.wanted_detail.is_none() || self.detail.is_loading() {
            return None;
        }
        let generation = self.detail.try_begin()?;
        let (id, purpose) = self.wanted_detail.take()?;
        let request = DetailRequest { id, purpose, generation };
        self.detail_in_flight = Some(request.clone());
        Some(request)
    }

    pub fn settle_detail(&mut self, generation: Generation, result: Result<Feature>) -> DetailOutcome {
        let answers_in_flight = self
            .detail_in_flight
            .as_ref()
            .is_some_and(|request| request.generation == generation);
        let request = if answers_in_flight { self.detail_in_flight.take() } else { None };

        let settlement = self.detail.settle(generation, result.is_ok());
        let (Settlement::Current(_), Some(request)) = (settlement, request) else {
            return DetailOutcome::Stale;
        };

        match result {
            Ok(feature) => DetailOutcome::Loaded {
                feature,
                purpose: request.purpose,
            },
            Err(err) => {
                log::error!("Failed to load land {}: {}", request.id, err);
                DetailOutcome::Failed(request.purpose)
            }
        }
    }

    /// Forgets results and anything still pending.
    pub fn reset(&mut self) {
        self.search.invalidate();
        self.detail.invalidate();
        self.wanted_search = None;
        self.wanted_detail = None;
        self.results.clear();
    }

    pub fn close(&mut self) {
        self.reset();
        self.search.close();
        self.detail.close();
    }
}

impl Default for SearchController {
    fn default() -> Self {
        Self::new()
    }
}
