use std::time::Duration;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::map::feature::{Feature, FeatureCollection, LandDetail, LandId, LandSummary};
use crate::map::geo::GeoBounds;
use crate::sync::filter::FilterCriteria;

const NO_QUERY: &[(&str, &str)] = &[];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Section {
    pub section_code: String,
    pub section_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StatsSummary {
    pub total_lands: u64,
    pub total_area: f64,
    pub cities_count: u32,
    pub districts_count: u32,
    #[serde(default)]
    pub avg_announced_value: Option<f64>,
}

impl StatsSummary {
    /// Figures shown by the UI without hitting the slow aggregate endpoint.
    pub fn fallback() -> Self {
        Self {
            total_lands: 381_344,
            total_area: 762_680_401.21,
            cities_count: 22,
            districts_count: 334,
            avg_announced_value: None,
        }
    }
}

/// The land service as seen by the engine.
///
/// Methods return boxed futures so the trait stays object safe and a source
/// can be shared as `Arc<dyn LandSource>` across spawned fetch tasks.
pub trait LandSource: Send + Sync {
    /// Parcels intersecting `bounds`, truncated at `limit`.
    fn lands_in_bbox(&self, bounds: GeoBounds, limit: usize) -> BoxFuture<'_, Result<FeatureCollection>>;

    /// One parcel with its geometry.
    fn land(&self, id: LandId) -> BoxFuture<'_, Result<Feature>>;

    fn search(&self, criteria: FilterCriteria, limit: usize) -> BoxFuture<'_, Result<Vec<LandSummary>>>;

    fn cities(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    fn districts(&self, city: Option<String>) -> BoxFuture<'_, Result<Vec<String>>>;

    fn sections(&self, city: Option<String>, district: Option<String>) -> BoxFuture<'_, Result<Vec<Section>>>;

    fn stats_summary(&self) -> BoxFuture<'_, Result<StatsSummary>>;
}

/// REST client for the land service.
#[derive(Debug, Clone)]
pub struct LandApi {
    client: reqwest::Client,
    base_url: String,
}

impl LandApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).query(query).send().await?;

        // Anything but 2xx is a failed call, same as a dropped connection
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Status(status.as_u16()));
        }

        Ok(response.json::<T>().await?)
    }
}

impl LandSource for LandApi {
    fn lands_in_bbox(&self, bounds: GeoBounds, limit: usize) -> BoxFuture<'_, Result<FeatureCollection>> {
        Box::pin(async move {
            let query = [
                ("min_lng", bounds.min_lng.to_string()),
                ("min_lat", bounds.min_lat.to_string()),
                ("max_lng", bounds.max_lng.to_string()),
                ("max_lat", bounds.max_lat.to_string()),
                ("limit", limit.to_string()),
            ];
            self.get_json("/lands/bbox", &query).await
        })
    }

    fn land(&self, id: LandId) -> BoxFuture<'_, Result<Feature>> {
        Box::pin(async move {
            let detail: LandDetail = self.get_json(&format!("/lands/{}", id), NO_QUERY).await?;
            Ok(detail.into_feature())
        })
    }

    fn search(&self, criteria: FilterCriteria, limit: usize) -> BoxFuture<'_, Result<Vec<LandSummary>>> {
        Box::pin(async move {
            let mut query = criteria.query_pairs();
            query.push(("limit", limit.to_string()));
            self.get_json("/search/", &query).await
        })
    }

    fn cities(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move { self.get_json("/search/cities", NO_QUERY).await })
    }

    fn districts(&self, city: Option<String>) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            let query: Vec<(&str, String)> = city.into_iter().map(|c| ("city", c)).collect();
            self.get_json("/search/districts", &query).await
        })
    }

    fn sections(&self, city: Option<String>, district: Option<String>) -> BoxFuture<'_, Result<Vec<Section>>> {
        Box::pin(async move {
            let query: Vec<(&str, String)> = city
                .map(|c| ("city", c))
                .into_iter()
                .chain(district.map(|d| ("district", d)))
                .collect();
            self.get_json("/search/sections", &query).await
        })
    }

    fn stats_summary(&self) -> BoxFuture<'_, Result<StatsSummary>> {
        Box::pin(async move { self.get_json("/stats/summary", NO_QUERY).await })
    }
}
