use serde::{Deserialize, Serialize};

/// Axis-aligned geographic rectangle in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GeoBounds {
    pub min_lng: f64, // west
    pub min_lat: f64, // south
    pub max_lng: f64, // east
    pub max_lat: f64, // north
}

impl GeoBounds {
    pub fn new(min_lng: f64, min_lat: f64, max_lng: f64, max_lat: f64) -> Self {
        Self {
            min_lng,
            min_lat,
            max_lng,
            max_lat,
        }
    }

    /// Smallest bounds containing every `(lng, lat)` pair, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (lng, lat) = iter.next()?;
        let mut bounds = GeoBounds::new(lng, lat, lng, lat);
        for (lng, lat) in iter {
            bounds.min_lng = bounds.min_lng.min(lng);
            bounds.max_lng = bounds.max_lng.max(lng);
            bounds.min_lat = bounds.min_lat.min(lat);
            bounds.max_lat = bounds.max_lat.max(lat);
        }
        Some(bounds)
    }

    /// (longitude span, latitude span)
    pub fn span(&self) -> (f64, f64) {
        (self.max_lng - self.min_lng, self.max_lat - self.min_lat)
    }

    pub fn center(&self) -> Coordinate {
        Coordinate {
            latitude: (self.min_lat + self.max_lat) / 2.0,
            longitude: (self.min_lng + self.max_lng) / 2.0,
        }
    }

    /// Grows the bounds by `factor` times its span on each axis, split evenly
    /// between the two sides.
    pub fn padded(&self, factor: f64) -> GeoBounds {
        let (lng_span, lat_span) = self.span();
        let lng_pad = lng_span * factor / 2.0;
        let lat_pad = lat_span * factor / 2.0;
        GeoBounds {
            min_lng: self.min_lng - lng_pad,
            min_lat: self.min_lat - lat_pad,
            max_lng: self.max_lng + lng_pad,
            max_lat: self.max_lat + lat_pad,
        }
    }

    pub fn contains_point(&self, point: Coordinate) -> bool {
        self.min_lng <= point.longitude
            && point.longitude <= self.max_lng
            && self.min_lat <= point.latitude
            && point.latitude <= self.max_lat
    }

    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lng <= other.max_lng
            && self.max_lng >= other.min_lng
    }

    pub fn is_finite(&self) -> bool {
        [self.min_lng, self.min_lat, self.max_lng, self.max_lat]
            .iter()
            .all(|v| v.is_finite())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// What the user is looking at: the visible extent plus the integer zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Viewport {
    pub bounds: GeoBounds,
    pub zoom: u8,
}

impl Viewport {
    pub fn new(bounds: GeoBounds, zoom: u8) -> Self {
        Self { bounds, zoom }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn bounds_from_ring_points() {
        let ring = [(121.5, 25.0), (121.6, 25.0), (121.6, 25.1), (121.5, 25.1)];
        let bounds = GeoBounds::from_points(ring).unwrap();
        assert_eq!(bounds, GeoBounds::new(121.5, 25.0, 121.6, 25.1));

        let center = bounds.center();
        assert_relative_eq!(center.latitude, 25.05, epsilon = 1e-9);
        assert_relative_eq!(center.longitude, 121.55, epsilon = 1e-9);
    }

    #[test]
    fn no_points_no_bounds() {
        assert!(GeoBounds::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn padding_splits_evenly_and_keeps_center() {
        let bounds = GeoBounds::new(121.0, 25.0, 121.2, 25.1);
        let padded = bounds.padded(1.5);

        assert_relative_eq!(padded.min_lng, 120.85, epsilon = 1e-9);
        assert_relative_eq!(padded.max_lng, 121.35, epsilon = 1e-9);
        assert_relative_eq!(padded.min_lat, 24.925, epsilon = 1e-9);
        assert_relative_eq!(padded.max_lat, 25.175, epsilon = 1e-9);

        let (lng_span, lat_span) = padded.span();
        assert_relative_eq!(lng_span, 0.5, epsilon = 1e-9);
        assert_relative_eq!(lat_span, 0.25, epsilon = 1e-9);
        assert_relative_eq!(padded.center().longitude, bounds.center().longitude, epsilon = 1e-9);
    }

    #[test]
    fn point_containment_is_inclusive() {
        let bounds = GeoBounds::new(0.0, 0.0, 1.0, 1.0);
        assert!(bounds.contains_point(Coordinate::new(1.0, 0.0)));
        assert!(!bounds.contains_point(Coordinate::new(1.5, 0.5)));
        assert!(bounds.intersects(&GeoBounds::new(0.5, 0.5, 2.0, 2.0)));
        assert!(!bounds.intersects(&GeoBounds::new(1.5, 1.5, 2.0, 2.0)));
    }
}
