pub mod feature;
pub mod geo;
pub mod handle;
pub mod index;

pub use feature::{Feature, FeatureCollection, Geometry, LandDetail, LandId, LandProperties, LandSummary};
pub use geo::{Coordinate, GeoBounds, Viewport};
pub use handle::{CameraTarget, HeadlessMap, MapHandle};
pub use index::FeatureIndex;
