use tokio::sync::mpsc;

use crate::error::{Notice, Result};
use crate::map::feature::{Feature, FeatureCollection, LandId, LandSummary};
use crate::map::geo::{Coordinate, Viewport};

use super::filter::FilterCriteria;
use super::loading::Generation;

/// What the engine tells the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A new collection to render, replacing the previous one.
    FeaturesUpdated(FeatureCollection),
    LoadingChanged(bool),
    /// `true` while the map is zoomed out too far to load parcels.
    BelowZoomThreshold(bool),
    /// Context around the selection. Empty after a deselect.
    NearbyFeaturesUpdated(FeatureCollection),
    NearbyLoadingChanged(bool),
    SelectionChanged(Option<Feature>),
    SearchResults(Vec<LandSummary>),
    Notice(Notice),
}

#[derive(Debug, Clone)]
pub(crate) enum Input {
    MoveEnded(Viewport),
    ZoomEnded(Viewport),
    ViewportSettled(Viewport),
    MapSettled,
    FilterChanged(Option<FilterCriteria>),
    SelectionChanged(Option<Feature>),
    MapClicked(Coordinate),
    Search(FilterCriteria),
    ResetSearch,
    OpenResult(LandId),
    Teardown,
}

/// A finished network task, posted back to the engine loop.
#[derive(Debug)]
pub(crate) enum Completion {
    Viewport(Generation, Result<FeatureCollection>),
    Nearby(Generation, Result<FeatureCollection>),
    Search(Generation, Result<Vec<LandSummary>>),
    Detail(Generation, Result<Feature>),
}

/// Cloneable entry point for the host. Every method returns `false` once the
/// engine has stopped.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    sender: mpsc::UnboundedSender<Input>,
}

impl SyncHandle {
    pub(crate) fn new(sender: mpsc::UnboundedSender<Input>) -> Self {
        Self { sender }
    }

    fn send(&self, input: Input) -> bool {
        self.sender.send(input).is_ok()
    }

    /// End of a pan. Debounced.
    pub fn move_ended(&self, viewport: Viewport) -> bool {
        self.send(Input::MoveEnded(viewport))
    }

    /// End of a zoom. Evaluated right away.
    pub fn zoom_ended(&self, viewport: Viewport) -> bool {
        self.send(Input::ZoomEnded(viewport))
    }

    /// A viewport the host already considers settled. Evaluated right away.
    pub fn viewport_settled(&self, viewport: Viewport) -> bool {
        self.send(Input::ViewportSettled(viewport))
    }

    /// The map handle's current extent is settled. Read from the handle and
    /// evaluated right away.
    pub fn map_settled(&self) -> bool {
        self.send(Input::MapSettled)
    }

    pub fn filter_changed(&self, filter: Option<FilterCriteria>) -> bool {
        self.send(Input::FilterChanged(filter))
    }

    pub fn selection_changed(&self, selection: Option<Feature>) -> bool {
        self.send(Input::SelectionChanged(selection))
    }

    pub fn map_clicked(&self, at: Coordinate) -> bool {
        self.send(Input::MapClicked(at))
    }

    pub fn search(&self, criteria: FilterCriteria) -> bool {
        self.send(Input::Search(criteria))
    }

    pub fn reset_search(&self) -> bool {
        self.send(Input::ResetSearch)
    }

    pub fn open_result(&self, id: LandId) -> bool {
        self.send(Input::OpenResult(id))
    }

    pub fn teardown(&self) -> bool {
        self.send(Input::Teardown)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
