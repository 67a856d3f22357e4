use serde::{Deserialize, Serialize};

use crate::map::feature::{FeatureCollection, LandProperties};

/// Search criteria applied on the client after a bbox fetch.
///
/// A `None` or empty key places no constraint on that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub city: Option<String>,
    pub district: Option<String>,
    pub parcel_no: Option<String>,
    pub owner_name: Option<String>,
}

fn key(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

pub(crate) fn key_is_set(value: &Option<String>) -> bool {
    key(value).is_some()
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn parcel_no(mut self, parcel_no: impl Into<String>) -> Self {
        self.parcel_no = Some(parcel_no.into());
        self
    }

    pub fn owner_name(mut self, owner_name: impl Into<String>) -> Self {
        self.owner_name = Some(owner_name.into());
        self
    }

    pub fn is_active(&self) -> bool {
        key(&self.city).is_some()
            || key(&self.district).is_some()
            || key(&self.parcel_no).is_some()
            || key(&self.owner_name).is_some()
    }

    /// Empty strings dropped to `None`.
    pub fn normalized(&self) -> Self {
        Self {
            city: key(&self.city).map(str::to_string),
            district: key(&self.district).map(str::to_string),
            parcel_no: key(&self.parcel_no).map(str::to_string),
            owner_name: key(&self.owner_name).map(str::to_string),
        }
    }

    /// Only the constraining keys, in the service's parameter names.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("city", key(&self.city)),
            ("district", key(&self.district)),
            ("parcel_no", key(&self.parcel_no)),
            ("owner_name", key(&self.owner_name)),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v.to_string())))
        .collect()
    }

    /// `city` and `district` must be present and equal. `parcel_no` and
    /// `owner_name` are substring matches that let a parcel through when the
    /// parcel itself has no value for the field.
    ///
    /// It is unclear whether the asymmetry for missing values is intended.
    /// It is preserved as-is; see DESIGN.md.
    pub fn matches(&self, properties: &LandProperties) -> bool {
        if let Some(city) = key(&self.city) {
            if properties.city.as_deref() != Some(city) {
                return false;
            }
        }

        if let Some(district) = key(&self.district) {
            if properties.district.as_deref() != Some(district) {
                return false;
            }
        }

        if let (Some(term), Some(parcel_no)) = (key(&self.parcel_no), properties.parcel_no.as_deref()) {
            if !parcel_no.contains(term) {
                return false;
            }
        }

        if let (Some(term), Some(owner)) = (key(&self.owner_name), properties.owner_name.as_deref()) {
            if !owner.contains(term) {
                return false;
            }
        }

        true
    }
}

/// Keeps the features matching `criteria`, in their original order.
pub fn apply_filter(collection: &FeatureCollection, criteria: &FilterCriteria) -> FeatureCollection {
    if !criteria.is_active() {
        return collection.clone();
    }

    collection
        .iter()
        .filter(|feature| criteria.matches(&feature.properties))
        .cloned()
        .collect()
}
