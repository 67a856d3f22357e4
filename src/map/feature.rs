use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::geo::{Coordinate, GeoBounds};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct LandId(pub i64);

impl std::fmt::Display for LandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `[lng, lat, ...]` as it appears on the wire. Validated lazily.
pub type Position = Vec<f64>;
pub type Ring = Vec<Position>;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
}

impl Geometry {
    /// Outer ring(s) as `(lng, lat)` pairs. For a multipolygon the outer rings
    /// of every member are concatenated.
    pub fn outer_ring(&self) -> Result<Vec<(f64, f64)>, SyncError> {
        let rings: Vec<&Ring> = match self {
            Geometry::Polygon { coordinates } => coordinates.first().into_iter().collect(),
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().filter_map(|polygon| polygon.first()).collect()
            }
        };

        let mut points = Vec::new();
        for ring in rings {
            for position in ring {
                points.push(lng_lat(position)?);
            }
        }

        if points.is_empty() {
            return Err(SyncError::MalformedGeometry("empty outer ring"));
        }
        Ok(points)
    }

    pub fn bounds(&self) -> Result<GeoBounds, SyncError> {
        GeoBounds::from_points(self.outer_ring()?)
            .ok_or(SyncError::MalformedGeometry("empty outer ring"))
    }

    /// Even-odd containment test. Holes are honored; malformed rings never contain anything.
    pub fn contains(&self, point: Coordinate) -> bool {
        let polygons: Vec<&Vec<Ring>> = match self {
            Geometry::Polygon { coordinates } => vec![coordinates],
            Geometry::MultiPolygon { coordinates } => coordinates.iter().collect(),
        };

        polygons.into_iter().any(|rings| {
            let mut rings = rings.iter();
            let Some(outer) = rings.next() else {
                return false;
            };
            ring_contains(outer, point) && !rings.any(|hole| ring_contains(hole, point))
        })
    }
}

fn lng_lat(position: &Position) -> Result<(f64, f64), SyncError> {
    match position.as_slice() {
        [lng, lat, ..] if lng.is_finite() && lat.is_finite() => Ok((*lng, *lat)),
        _ => Err(SyncError::MalformedGeometry("position needs a longitude and a latitude")),
    }
}

fn ring_contains(ring: &Ring, point: Coordinate) -> bool {
    let Ok(vertices) = ring.iter().map(lng_lat).collect::<Result<Vec<_>, _>>() else {
        return false;
    };
    if vertices.len() < 3 {
        return false;
    }

    let (x, y) = (point.longitude, point.latitude);
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Parcel attributes. Every field the engine looks at is explicit; anything
/// else the service sends is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LandProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<LandId>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub section_name: Option<String>,
    pub parcel_no: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub area: Option<f64>,
    pub announced_value: Option<i64>,
    pub announced_land_price: Option<i64>,
    pub owner_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Decimal columns come back as strings from the detail endpoint.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(value)) => Some(value),
        Some(Raw::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
enum FeatureCollectionTag {
    #[default]
    FeatureCollection,
}

/// Wire form of a GeoJSON feature; the service puts the id in `properties`.
#[derive(Deserialize, Serialize)]
struct RawFeature {
    #[serde(rename = "type", default)]
    kind: FeatureTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<LandId>,
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(default)]
    properties: LandProperties,
}

/// A parcel: polygon geometry plus typed attributes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "RawFeature", into = "RawFeature")]
pub struct Feature {
    pub id: LandId,
    pub geometry: Option<Geometry>,
    pub properties: LandProperties,
}

impl Feature {
    pub fn new(id: LandId, geometry: Option<Geometry>, mut properties: LandProperties) -> Self {
        properties.id = Some(id);
        Self {
            id,
            geometry,
            properties,
        }
    }

    pub fn bounds(&self) -> Result<GeoBounds, SyncError> {
        self.geometry
            .as_ref()
            .ok_or(SyncError::MalformedGeometry("feature has no geometry"))?
            .bounds()
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        self.geometry.as_ref().is_some_and(|geometry| geometry.contains(point))
    }
}

fn parse_geometry(value: Option<Value>) -> Option<Geometry> {
    match value {
        Some(Value::Null) | None => None,
        Some(value) => match serde_json::from_value(value) {
            Ok(geometry) => Some(geometry),
            Err(e) => {
                log::debug!("Ignoring unsupported geometry: {}", e);
                None
            }
        },
    }
}

impl TryFrom<RawFeature> for Feature {
    type Error = String;

    fn try_from(raw: RawFeature) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.properties.id)
            .ok_or_else(|| "feature has no id".to_string())?;
        Ok(Feature::new(id, parse_geometry(raw.geometry), raw.properties))
    }
}

impl From<Feature> for RawFeature {
    fn from(feature: Feature) -> Self {
        RawFeature {
            kind: FeatureTag::Feature,
            id: Some(feature.id),
            geometry: feature.geometry.and_then(|g| serde_json::to_value(g).ok()),
            properties: feature.properties,
        }
    }
}

/// Ordered parcels from one fetch. Always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    kind: FeatureCollectionTag,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: FeatureCollectionTag::FeatureCollection,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn get(&self, id: LandId) -> Option<&Feature> {
        self.features.iter().find(|feature| feature.id == id)
    }

    pub fn contains_id(&self, id: LandId) -> bool {
        self.get(id).is_some()
    }

    /// Same collection with every feature carrying `id` removed.
    pub fn without(self, id: LandId) -> Self {
        Self::new(
            self.features
                .into_iter()
                .filter(|feature| feature.id != id && feature.properties.id != Some(id))
                .collect(),
        )
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// `/lands/{id}`: every attribute flat, geometry alongside.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LandDetail {
    pub id: LandId,
    #[serde(default)]
    geometry: Option<Value>,
    #[serde(flatten)]
    pub properties: LandProperties,
}

impl LandDetail {
    pub fn into_feature(self) -> Feature {
        Feature::new(self.id, parse_geometry(self.geometry), self.properties)
    }
}

/// A `/search` row. No geometry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LandSummary {
    pub id: LandId,
    #[serde(flatten)]
    pub properties: LandProperties,
}
