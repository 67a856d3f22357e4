use std::sync::Arc;

use crate::error::Result;
use crate::map::feature::Feature;
use crate::map::geo::Coordinate;
use crate::map::handle::{CameraTarget, MapHandle};

/// Island-wide view used when a parcel has nothing to center on.
pub const DEFAULT_CENTER: Coordinate = Coordinate {
    latitude: 23.5,
    longitude: 121.0,
};
pub const DEFAULT_ZOOM: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraPurpose {
    /// Coarse jump to the first hit of a search.
    SearchResult,
    /// The user picked this parcel.
    Selection,
}

impl CameraPurpose {
    pub fn zoom(self) -> u8 {
        match self {
            CameraPurpose::SearchResult => 13,
            CameraPurpose::Selection => 16,
        }
    }
}

/// Center of the outer ring's bounding box at the zoom for `purpose`.
pub fn camera_target(feature: &Feature, purpose: CameraPurpose) -> Result<CameraTarget> {
    let bounds = feature.bounds()?;
    Ok(CameraTarget::animated(bounds.center(), purpose.zoom()))
}

/// Moves the main map's camera onto a parcel.
pub struct SelectionCenterController {
    map: Arc<dyn MapHandle>,
    last_target: Option<CameraTarget>,
}

impl SelectionCenterController {
    pub fn new(map: Arc<dyn MapHandle>) -> Self {
        Self {
            map,
            last_target: None,
        }
    }

    pub fn map(&self) -> &Arc<dyn MapHandle> {
        &self.map
    }

    pub fn last_target(&self) -> Option<CameraTarget> {
        self.last_target
    }

    /// Issues the camera move. Parcels with missing or malformed geometry
    /// leave the camera where it is.
    pub fn center_on(&mut self, feature: &Feature, purpose: CameraPurpose) -> Option<CameraTarget> {
        match camera_target(feature, purpose) {
            Ok(target) => {
                self.map.set_view(target);
                self.last_target = Some(target);
                Some(target)
            }
            Err(err) => {
                log::debug!("Not centering on land {}: {}", feature.id, err);
                None
            }
        }
    }

    /// View for the detail panel's map: the parcel at selection zoom, or the
    /// default view when its geometry can't be used.
    pub fn detail_view(feature: &Feature) -> CameraTarget {
        camera_target(feature, CameraPurpose::Selection)
            .unwrap_or_else(|_| CameraTarget::animated(DEFAULT_CENTER, DEFAULT_ZOOM))
    }
}
