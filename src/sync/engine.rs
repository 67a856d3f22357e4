use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::error::{Notice, Result, SyncError};
use crate::map::feature::{Feature, FeatureCollection};
use crate::map::handle::MapHandle;
use crate::map::index::FeatureIndex;
use crate::maps_api::LandSource;

use super::events::{Completion, Input, SyncEvent, SyncHandle};
use super::fetch::{FetchCoordinator, FetchOutcome};
use super::filter::FilterCriteria;
use super::loading::Generation;
use super::nearby::{NearbyContextLoader, NearbyOutcome, NearbyRequest};
use super::search::{DetailOutcome, DetailRequest, SearchController, SearchOutcome, SearchRequest};
use super::selection::{CameraPurpose, SelectionCenterController};
use super::viewport::{DebounceTimer, TrackerSignal, ViewportTracker};

enum Step {
    Input(Input),
    Completion(Completion),
    TimerFired,
    Stop,
}

/// Owns all synchronization state and mutates it from a single loop.
///
/// Network calls run as spawned tasks that post a [`Completion`] back, so the
/// loop never waits on the service. Build with [`SyncEngine::new`], then
/// `tokio::spawn(engine.run())`.
pub struct SyncEngine {
    source: Arc<dyn LandSource>,
    tracker: ViewportTracker,
    fetch: FetchCoordinator,
    nearby: NearbyContextLoader,
    search: SearchController,
    camera: SelectionCenterController,
    index: FeatureIndex,
    filter: Option<FilterCriteria>,
    selection: Option<Feature>,
    loading: bool,
    nearby_loading: bool,
    inputs: mpsc::UnboundedReceiver<Input>,
    completions: mpsc::UnboundedReceiver<Completion>,
    completion_sender: mpsc::UnboundedSender<Completion>,
    events: mpsc::UnboundedSender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        config: &SyncConfig,
        source: Arc<dyn LandSource>,
        map: Arc<dyn MapHandle>,
    ) -> (Self, SyncHandle, mpsc::UnboundedReceiver<SyncEvent>) {
        let (input_sender, inputs) = mpsc::unbounded_channel();
        let (completion_sender, completions) = mpsc::unbounded_channel();
        let (events, event_receiver) = mpsc::unbounded_channel();

        let engine = Self {
            source,
            tracker: ViewportTracker::new(config.min_zoom_for_data, config.debounce),
            fetch: FetchCoordinator::new(config.fetch_limits()),
            nearby: NearbyContextLoader::new(config.nearby_limit, config.nearby_padding),
            search: SearchController::new(),
            camera: SelectionCenterController::new(map),
            index: FeatureIndex::empty(),
            filter: None,
            selection: None,
            loading: false,
            nearby_loading: false,
            inputs,
            completions,
            completion_sender,
            events,
        };
        (engine, SyncHandle::new(input_sender), event_receiver)
    }

    pub async fn run(mut self) {
        log::info!("Sync engine started");
        loop {
            let deadline = self.tracker.timer().deadline();
            let step = tokio::select! {
                input = self.inputs.recv() => match input {
                    Some(Input::Teardown) | None => Step::Stop,
                    Some(input) => Step::Input(input),
                },
                Some(completion) = self.completions.recv() => Step::Completion(completion),
                _ = DebounceTimer::wait(deadline) => Step::TimerFired,
            };

            match step {
                Step::Input(input) => self.handle_input(input),
                Step::Completion(completion) => self.handle_completion(completion),
                Step::TimerFired => {
                    let signals = self.tracker.timer_fired(Instant::now());
                    self.apply_signals(signals);
                }
                Step::Stop => break,
            }
        }
        self.teardown();
    }

    fn emit(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            log::trace!("Event receiver dropped");
        }
    }

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::MoveEnded(viewport) => self.tracker.move_ended(viewport),
            Input::ZoomEnded(viewport) | Input::ViewportSettled(viewport) => {
                let signals = self.tracker.zoom_ended(viewport);
                self.apply_signals(signals);
            }
            Input::MapSettled => {
                let viewport = self.camera.map().viewport();
                let signals = self.tracker.zoom_ended(viewport);
                self.apply_signals(signals);
            }
            Input::FilterChanged(filter) => self.set_filter(filter),
            Input::SelectionChanged(selection) => self.select(selection),
            Input::MapClicked(at) => match self.index.hit_test(at).cloned() {
                Some(feature) => self.select(Some(feature)),
                None => log::debug!("No parcel at {:?}", at),
            },
            Input::Search(criteria) => {
                if let Some(request) = self.search.submit(criteria) {
                    self.dispatch_search(request);
                }
            }
            Input::ResetSearch => {
                self.search.reset();
                self.emit(SyncEvent::SearchResults(Vec::new()));
                self.set_filter(None);
            }
            Input::OpenResult(id) => {
                if let Some(request) = self.search.lookup(id, CameraPurpose::Selection) {
                    self.dispatch_detail(request);
                }
            }
            Input::Teardown => {}
        }
    }

    fn apply_signals(&mut self, signals: Vec<TrackerSignal>) {
        for signal in signals {
            match signal {
                TrackerSignal::BelowZoomThreshold(below) => self.emit(SyncEvent::BelowZoomThreshold(below)),
                TrackerSignal::BoundsChanged(_) => self.refresh_viewport(),
            }
        }
    }

    /// Fetches for the tracker's current viewport. Nothing happens before the
    /// first gesture or below the zoom gate.
    fn refresh_viewport(&mut self) {
        let Some(viewport) = self.tracker.current() else {
            return;
        };
        if !self.tracker.allows(viewport.zoom) {
            return;
        }
        if let Some(request) = self.fetch.begin(viewport.bounds, self.filter.as_ref()) {
            let (bounds, limit) = (request.bounds, request.limit);
            self.spawn_task(request.generation, Completion::Viewport, move |source| {
                source.lands_in_bbox(bounds, limit)
            });
            self.set_loading(true);
        }
    }

    /// Whether the rendered parcels answer something other than what the
    /// current viewport and filter ask for.
    fn viewport_outdated(&self) -> bool {
        let Some(viewport) = self.tracker.current() else {
            return false;
        };
        if !self.tracker.allows(viewport.zoom) {
            return false;
        }
        match self.fetch.last_settled() {
            Some(request) => !request.covers(&viewport.bounds, self.filter.as_ref()),
            None => true,
        }
    }

    fn set_filter(&mut self, filter: Option<FilterCriteria>) {
        let filter = filter
            .map(|criteria| criteria.normalized())
            .filter(FilterCriteria::is_active);
        if filter == self.filter {
            log::debug!("Filter unchanged, not reloading");
            return;
        }
        self.filter = filter;
        log::debug!("Active filter: {:?}", self.filter);

        // The outstanding response was built for the old filter
        self.fetch.invalidate();
        self.refresh_viewport();
    }

    fn select(&mut self, selection: Option<Feature>) {
        self.selection = selection.clone();
        self.emit(SyncEvent::SelectionChanged(selection.clone()));

        match selection {
            Some(feature) => {
                self.camera.center_on(&feature, CameraPurpose::Selection);
                // Context of the previous selection may hold this parcel
                self.emit(SyncEvent::NearbyFeaturesUpdated(FeatureCollection::default()));
                if let Some(request) = self.nearby.select(feature) {
                    self.dispatch_nearby(request);
                }
            }
            None => {
                self.nearby.clear();
                self.emit(SyncEvent::NearbyFeaturesUpdated(FeatureCollection::default()));
            }
        }
        self.set_nearby_loading(self.nearby.is_loading());
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Viewport(generation, result) => {
                match self.fetch.settle(generation, result) {
                    FetchOutcome::Applied { collection, notices } => {
                        self.index = FeatureIndex::build(&collection);
                        self.emit(SyncEvent::FeaturesUpdated(collection));
                        for notice in notices {
                            self.emit(SyncEvent::Notice(notice));
                        }
                    }
                    FetchOutcome::Failed(_) => self.emit(SyncEvent::Notice(Notice::FetchFailed)),
                    FetchOutcome::Stale => {}
                }
                if self.viewport_outdated() {
                    self.refresh_viewport();
                }
                self.set_loading(self.fetch.is_loading());
            }
            Completion::Nearby(generation, result) => {
                if let NearbyOutcome::Applied(context) = self.nearby.settle(generation, result) {
                    self.emit(SyncEvent::NearbyFeaturesUpdated(context));
                }
                if let Some(request) = self.nearby.resume() {
                    self.dispatch_nearby(request);
                }
                self.set_nearby_loading(self.nearby.is_loading());
            }
            Completion::Search(generation, result) => {
                match self.search.settle_search(generation, result) {
                    SearchOutcome::Found { criteria, rows, notice } => {
                        let first = rows.first().map(|row| row.id);
                        self.emit(SyncEvent::SearchResults(rows));
                        self.emit(SyncEvent::Notice(notice));
                        self.set_filter(Some(criteria));
                        if let Some(request) = first.and_then(|id| self.search.lookup(id, CameraPurpose::SearchResult)) {
                            self.dispatch_detail(request);
                        }
                    }
                    SearchOutcome::Failed => self.emit(SyncEvent::Notice(Notice::SearchFailed)),
                    SearchOutcome::Stale => {}
                }
                if let Some(request) = self.search.resume_search() {
                    self.dispatch_search(request);
                }
            }
            Completion::Detail(generation, result) => {
                match self.search.settle_detail(generation, result) {
                    DetailOutcome::Loaded { feature, purpose } => match purpose {
                        CameraPurpose::SearchResult => {
                            self.camera.center_on(&feature, purpose);
                        }
                        CameraPurpose::Selection => self.select(Some(feature)),
                    },
                    DetailOutcome::Failed(CameraPurpose::Selection) => {
                        self.emit(SyncEvent::Notice(Notice::DetailFailed))
                    }
                    // Centering on the first search hit is best effort
                    DetailOutcome::Failed(CameraPurpose::SearchResult) => {}
                    DetailOutcome::Stale => {}
                }
                if let Some(request) = self.search.resume_detail() {
                    self.dispatch_detail(request);
                }
            }
        }
    }

    fn dispatch_nearby(&self, request: NearbyRequest) {
        let (bounds, limit) = (request.bounds, request.limit);
        self.spawn_task(request.generation, Completion::Nearby, move |source| {
            source.lands_in_bbox(bounds, limit)
        });
    }

    fn dispatch_search(&self, request: SearchRequest) {
        let SearchRequest {
            criteria,
            limit,
            generation,
        } = request;
        self.spawn_task(generation, Completion::Search, move |source| source.search(criteria, limit));
    }

    fn dispatch_detail(&self, request: DetailRequest) {
        let id = request.id;
        self.spawn_task(request.generation, Completion::Detail, move |source| source.land(id));
    }

    /// Runs one service call on the runtime and posts its result back. A
    /// panicking call is reported as a network failure so its domain still
    /// settles.
    fn spawn_task<T, F>(&self, generation: Generation, complete: fn(Generation, Result<T>) -> Completion, call: F)
    where
        T: Send + 'static,
        F: for<'a> FnOnce(&'a dyn LandSource) -> BoxFuture<'a, Result<T>> + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let sender = self.completion_sender.clone();

        tokio::spawn(async move {
            let result = AssertUnwindSafe(call(source.as_ref()))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(SyncError::Network("request task panicked".to_string())));
            // Fails only after teardown, when the answer is no longer wanted
            let _ = sender.send(complete(generation, result));
        });
    }

    fn set_loading(&mut self, loading: bool) {
        if self.loading != loading {
            self.loading = loading;
            self.emit(SyncEvent::LoadingChanged(loading));
        }
    }

    fn set_nearby_loading(&mut self, loading: bool) {
        if self.nearby_loading != loading {
            self.nearby_loading = loading;
            self.emit(SyncEvent::NearbyLoadingChanged(loading));
        }
    }

    fn teardown(&mut self) {
        self.tracker.teardown();
        self.fetch.close();
        self.nearby.close();
        self.search.close();
        self.inputs.close();
        self.set_loading(false);
        self.set_nearby_loading(false);
        log::info!("Sync engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::map::feature::{LandId, LandProperties, LandSummary};
    use crate::map::geo::{Coordinate, GeoBounds, Viewport};
    use crate::testing::{parcel, parcel_in, RecordingMap, ScriptedSource};
    use tokio::time::sleep;

    struct Harness {
        source: Arc<ScriptedSource>,
        map: Arc<RecordingMap>,
        handle: SyncHandle,
        events: mpsc::UnboundedReceiver<SyncEvent>,
        task: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        fn start(source: ScriptedSource) -> Self {
            let source = Arc::new(source);
            let map = Arc::new(RecordingMap::default());
            let (engine, handle, events) = SyncEngine::new(&SyncConfig::default(), source.clone(), map.clone());
            let task = tokio::spawn(engine.run());
            Self {
                source,
                map,
                handle,
                events,
                task,
            }
        }

        fn drain(&mut self) -> Vec<SyncEvent> {
            let mut drained = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                drained.push(event);
            }
            drained
        }
    }

    /// Lets the engine and its tasks run until idle.
    async fn idle() {
        sleep(Duration::from_millis(1)).await;
    }

    fn area(offset: f64) -> GeoBounds {
        GeoBounds::new(121.5 + offset, 25.0, 121.6 + offset, 25.1)
    }

    fn seeded() -> ScriptedSource {
        ScriptedSource::with_features((0..4).map(|step| parcel_in(step + 1, &area(step as f64))).collect())
    }

    fn features(events: &[SyncEvent]) -> Vec<FeatureCollection> {
        events
            .iter()
            .filter_map(|event| match event {
                SyncEvent::FeaturesUpdated(collection) => Some(collection.clone()),
                _ => None,
            })
            .collect()
    }

    fn nearby(events: &[SyncEvent]) -> Vec<FeatureCollection> {
        events
            .iter()
            .filter_map(|event| match event {
                SyncEvent::NearbyFeaturesUpdated(context) => Some(context.clone()),
                _ => None,
            })
            .collect()
    }

    fn loading(events: &[SyncEvent]) -> Vec<bool> {
        events
            .iter()
            .filter_map(|event| match event {
                SyncEvent::LoadingChanged(loading) => Some(*loading),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_fetched_on_mount() {
        let mut harness = Harness::start(seeded());
        sleep(Duration::from_secs(5)).await;

        assert!(harness.source.bbox_calls().is_empty());
        assert!(harness.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn pan_burst_fetches_once_for_the_final_position() {
        let mut harness = Harness::start(seeded());

        for step in 0..4 {
            harness.handle.move_ended(Viewport::new(area(step as f64), 15));
            sleep(Duration::from_millis(300)).await;
        }
        assert!(harness.source.bbox_calls().is_empty());

        sleep(Duration::from_millis(300)).await;
        assert_eq!(harness.source.bbox_calls(), vec![(area(3.0), 500)]);

        let events = harness.drain();
        assert_eq!(events[0], SyncEvent::BelowZoomThreshold(false));
        assert_eq!(loading(&events), vec![true, false]);
        let ids: Vec<_> = features(&events)[0].iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![LandId(4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn zoom_end_fetches_immediately_and_drops_pending_pan() {
        let harness = Harness::start(seeded());

        harness.handle.move_ended(Viewport::new(area(0.0), 15));
        harness.handle.zoom_ended(Viewport::new(area(1.0), 16));
        idle().await;
        assert_eq!(harness.source.bbox_calls(), vec![(area(1.0), 500)]);

        sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.source.bbox_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zoomed_out_view_never_fetches() {
        let mut harness = Harness::start(seeded());

        harness.handle.zoom_ended(Viewport::new(area(0.0), 12));
        harness.handle.move_ended(Viewport::new(area(1.0), 10));
        sleep(Duration::from_secs(1)).await;

        assert!(harness.source.bbox_calls().is_empty());
        assert_eq!(harness.drain(), vec![SyncEvent::BelowZoomThreshold(true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_request_is_dropped_then_retriggered() {
        let source = seeded();
        source.gate();
        let mut harness = Harness::start(source);

        harness.handle.zoom_ended(Viewport::new(area(0.0), 15));
        harness.handle.zoom_ended(Viewport::new(area(2.0), 15));
        idle().await;
        assert_eq!(harness.source.bbox_calls(), vec![(area(0.0), 500)]);
        assert_eq!(harness.source.parked_len(), 1);

        // Once the first settles the latest viewport is fetched
        assert!(harness.source.release_next());
        idle().await;
        assert_eq!(harness.source.bbox_calls().len(), 2);
        assert_eq!(harness.source.bbox_calls()[1].0, area(2.0));

        assert!(harness.source.release_next());
        idle().await;
        let events = harness.drain();
        assert_eq!(features(&events).len(), 2);
        assert_eq!(loading(&events), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_parcels_and_clears_loading() {
        let mut harness = Harness::start(seeded());
        harness.handle.zoom_ended(Viewport::new(area(0.0), 15));
        idle().await;
        harness.drain();

        harness.source.fail_next_bbox(SyncError::Network("timed out".into()));
        harness.handle.zoom_ended(Viewport::new(area(1.0), 15));
        idle().await;

        let events = harness.drain();
        assert!(features(&events).is_empty());
        assert_eq!(loading(&events), vec![true, false]);
        assert!(events.contains(&SyncEvent::Notice(Notice::FetchFailed)));
        assert_eq!(harness.source.bbox_calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn response_for_old_filter_is_discarded_and_refetched() {
        let source = ScriptedSource::new();
        for (id, city) in [(1, "臺北市"), (2, "新北市")] {
            let mut feature = parcel_in(id, &area(0.0));
            feature.properties.city = Some(city.to_string());
            source.add_feature(feature);
        }
        source.gate();
        let mut harness = Harness::start(source);

        harness.handle.zoom_ended(Viewport::new(area(0.0), 15));
        idle().await;
        harness.handle.filter_changed(Some(FilterCriteria::new().city("臺北市")));
        idle().await;

        harness.source.release_next();
        idle().await;
        assert!(features(&harness.drain()).is_empty());
        assert_eq!(harness.source.bbox_calls()[1], (area(0.0), 2000));

        harness.source.release_next();
        idle().await;
        let updates = features(&harness.drain());
        assert_eq!(updates.len(), 1);
        let ids: Vec<_> = updates[0].iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![LandId(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn filter_change_refetches_without_debounce() {
        let harness = Harness::start(seeded());
        harness.handle.zoom_ended(Viewport::new(area(0.0), 15));
        idle().await;

        harness.handle.filter_changed(Some(FilterCriteria::new().owner_name("王")));
        idle().await;
        assert_eq!(harness.source.bbox_calls()[1], (area(0.0), 2000));
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_with_pending_timer_never_fetches() {
        let mut harness = Harness::start(seeded());
        harness.handle.move_ended(Viewport::new(area(0.0), 15));
        harness.handle.teardown();

        sleep(Duration::from_secs(2)).await;
        assert!(harness.source.bbox_calls().is_empty());
        assert!(harness.task.is_finished());
        assert!(!harness.handle.move_ended(Viewport::new(area(0.0), 15)));
        assert!(harness.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn click_selects_centers_and_loads_context() {
        let source = ScriptedSource::new();
        source.add_feature(parcel(1, 121.50, 25.00, 0.01));
        source.add_feature(parcel(2, 121.52, 25.00, 0.01));
        source.add_feature(parcel(3, 121.511, 25.00, 0.005));
        let mut harness = Harness::start(source);

        harness.handle.zoom_ended(Viewport::new(GeoBounds::new(121.4, 24.9, 121.7, 25.2), 15));
        idle().await;
        harness.drain();

        harness.handle.map_clicked(Coordinate::new(25.005, 121.505));
        idle().await;
        let events = harness.drain();

        let Some(SyncEvent::SelectionChanged(Some(selected))) = events.first() else {
            panic!("expected a selection, got {:?}", events);
        };
        assert_eq!(selected.id, LandId(1));
        assert_eq!(harness.map.views().len(), 1);
        assert_eq!(harness.map.views()[0].zoom, 16);

        // Previous context is cleared first, then replaced
        let updates = nearby(&events);
        assert_eq!(updates.len(), 2);
        assert!(updates[0].is_empty());
        let context = &updates[1];
        assert!(!context.contains_id(LandId(1)));
        assert!(context.contains_id(LandId(3)));
        assert_eq!(harness.source.bbox_calls()[1].1, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn click_on_empty_ground_selects_nothing() {
        let mut harness = Harness::start(seeded());
        harness.handle.zoom_ended(Viewport::new(area(0.0), 15));
        idle().await;
        harness.drain();

        harness.handle.map_clicked(Coordinate::new(10.0, 100.0));
        idle().await;
        assert!(harness.drain().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn nearby_runs_alongside_the_viewport_fetch() {
        let source = seeded();
        source.gate();
        let mut harness = Harness::start(source);

        harness.handle.zoom_ended(Viewport::new(area(0.0), 15));
        harness.handle.selection_changed(Some(parcel(9, 121.55, 25.05, 0.01)));
        idle().await;
        assert_eq!(harness.source.parked_len(), 2);

        harness.handle.selection_changed(None);
        idle().await;
        let events = harness.drain();
        assert!(events.contains(&SyncEvent::NearbyFeaturesUpdated(FeatureCollection::default())));
        assert!(events.contains(&SyncEvent::LoadingChanged(true)));
    }

    #[tokio::test(start_paused = true)]
    async fn search_adopts_filter_and_centers_on_first_result() {
        let source = ScriptedSource::new();
        source.add_detail(parcel(5, 121.50, 25.00, 0.01));
        source.set_search_rows(vec![LandSummary {
            id: LandId(5),
            properties: LandProperties::default(),
        }]);
        let mut harness = Harness::start(source);
        harness.handle.zoom_ended(Viewport::new(area(0.0), 15));
        idle().await;
        harness.drain();

        harness.handle.search(FilterCriteria::new().city("臺北市"));
        idle().await;

        assert_eq!(harness.source.search_calls()[0].1, 2000);
        let events = harness.drain();
        assert!(events.contains(&SyncEvent::Notice(Notice::SearchFound(1))));
        assert!(matches!(&events[0], SyncEvent::SearchResults(rows) if rows.len() == 1));
        // Filter adoption refetches the viewport with the filtered page size
        assert_eq!(harness.source.bbox_calls()[1].1, 2000);

        let views = harness.map.views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].zoom, 13);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_search_leaves_filter_alone() {
        let mut harness = Harness::start(seeded());
        harness.handle.search(FilterCriteria::new().owner_name("林"));
        idle().await;

        assert_eq!(harness.drain(), vec![SyncEvent::Notice(Notice::SearchFailed)]);
        assert!(harness.source.bbox_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn opening_a_result_selects_it() {
        let source = ScriptedSource::new();
        source.add_detail(parcel(8, 121.50, 25.00, 0.01));
        let mut harness = Harness::start(source);

        harness.handle.open_result(LandId(8));
        idle().await;
        let events = harness.drain();
        assert!(matches!(&events[0], SyncEvent::SelectionChanged(Some(feature)) if feature.id == LandId(8)));
        assert_eq!(harness.map.views()[0].zoom, 16);

        harness.handle.open_result(LandId(99));
        idle().await;
        assert!(harness.drain().contains(&SyncEvent::Notice(Notice::DetailFailed)));
    }

    #[tokio::test(start_paused = true)]
    async fn reselect_never_leaves_stale_context_on_screen() {
        let source = ScriptedSource::new();
        source.add_feature(parcel(1, 121.50, 25.00, 0.01));
        source.add_feature(parcel(2, 121.511, 25.00, 0.005));
        let mut harness = Harness::start(source);

        harness.handle.selection_changed(Some(parcel(1, 121.50, 25.00, 0.01)));
        idle().await;
        let context = nearby(&harness.drain()).pop().unwrap();
        assert!(context.contains_id(LandId(2)));

        // The context for parcel 2 fails to load
        harness.source.fail_next_bbox(SyncError::Network("connection reset".into()));
        harness.handle.selection_changed(Some(parcel(2, 121.511, 25.00, 0.005)));
        idle().await;
        let events = harness.drain();
        let last = nearby(&events).pop().unwrap();
        assert!(!last.contains_id(LandId(2)));
        assert!(last.is_empty());
        assert!(!events.iter().any(|event| matches!(event, SyncEvent::Notice(_))));

        // Nothing to load around a parcel without geometry
        harness.handle.selection_changed(Some(parcel(1, 121.50, 25.00, 0.01)));
        idle().await;
        harness.drain();
        harness.handle.selection_changed(Some(Feature::new(LandId(2), None, LandProperties::default())));
        idle().await;
        let last = nearby(&harness.drain()).pop().unwrap();
        assert!(last.is_empty());
        assert_eq!(harness.source.bbox_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_filter_does_not_reload() {
        let harness = Harness::start(seeded());
        harness.handle.zoom_ended(Viewport::new(area(0.0), 15));
        idle().await;

        harness.handle.filter_changed(Some(FilterCriteria::new().city("臺北市")));
        idle().await;
        harness.handle.filter_changed(Some(FilterCriteria::new().city("臺北市").district("")));
        idle().await;
        assert_eq!(harness.source.bbox_calls().len(), 2);

        harness.handle.filter_changed(None);
        idle().await;
        harness.handle.filter_changed(Some(FilterCriteria::new()));
        idle().await;
        assert_eq!(harness.source.bbox_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_first_result_detail_is_not_reported() {
        let source = ScriptedSource::new();
        source.set_search_rows(vec![LandSummary {
            id: LandId(77),
            properties: LandProperties::default(),
        }]);
        let mut harness = Harness::start(source);

        harness.handle.search(FilterCriteria::new().parcel_no("17"));
        idle().await;

        assert_eq!(harness.source.detail_calls(), 1);
        let events = harness.drain();
        assert!(events.contains(&SyncEvent::Notice(Notice::SearchFound(1))));
        assert!(!events.contains(&SyncEvent::Notice(Notice::DetailFailed)));
        assert!(harness.map.views().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn map_settled_reads_the_map_handle() {
        let harness = Harness::start(seeded());
        harness.handle.map_settled();
        idle().await;

        let expected = GeoBounds::new(121.5, 25.0, 121.6, 25.1);
        assert_eq!(harness.source.bbox_calls(), vec![(expected, 500)]);
    }
}
