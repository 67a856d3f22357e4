use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::geo::{Coordinate, GeoBounds, Viewport};

/// Where the camera should go and how.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CameraTarget {
    pub center: Coordinate,
    pub zoom: u8,
    pub animate: bool,
}

impl CameraTarget {
    pub fn animated(center: Coordinate, zoom: u8) -> Self {
        Self {
            center,
            zoom,
            animate: true,
        }
    }
}

/// The live map the engine drives. Implemented by whatever renders the tiles.
pub trait MapHandle: Send + Sync {
    fn bounds(&self) -> GeoBounds;

    fn zoom(&self) -> u8;

    fn set_view(&self, target: CameraTarget);

    fn viewport(&self) -> Viewport {
        Viewport::new(self.bounds(), self.zoom())
    }
}

/// A map with no screen. Tracks the viewport it is told about and moves its
/// camera on `set_view`, keeping the current extent's span.
#[derive(Debug)]
pub struct HeadlessMap {
    state: Mutex<Viewport>,
}

impl HeadlessMap {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: Mutex::new(viewport),
        }
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        if let Ok(mut state) = self.state.lock() {
            *state = viewport;
        }
    }

    fn current(&self) -> Viewport {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl MapHandle for HeadlessMap {
    fn bounds(&self) -> GeoBounds {
        self.current().bounds
    }

    fn zoom(&self) -> u8 {
        self.current().zoom
    }

    fn set_view(&self, target: CameraTarget) {
        let current = self.current();
        // Each zoom level halves the visible span
        let scale = 2f64.powi(i32::from(current.zoom) - i32::from(target.zoom));
        let (lng_span, lat_span) = current.bounds.span();
        let half_lng = lng_span * scale / 2.0;
        let half_lat = lat_span * scale / 2.0;
        let bounds = GeoBounds::new(
            target.center.longitude - half_lng,
            target.center.latitude - half_lat,
            target.center.longitude + half_lng,
            target.center.latitude + half_lat,
        );
        log::info!(
            "Camera -> ({:.5}, {:.5}) zoom {}",
            target.center.latitude,
            target.center.longitude,
            target.zoom
        );
        self.set_viewport(Viewport::new(bounds, target.zoom));
    }
}
