use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use crate::sync::fetch::FetchLimits;

pub const API_URL_VAR: &str = "PARCEL_API_URL";
pub const TIMEOUT_VAR: &str = "PARCEL_TIMEOUT_SECS";
pub const DEBOUNCE_VAR: &str = "PARCEL_DEBOUNCE_MS";
pub const MIN_ZOOM_VAR: &str = "PARCEL_MIN_ZOOM";
pub const BBOX_LIMIT_VAR: &str = "PARCEL_BBOX_LIMIT";
pub const FILTERED_LIMIT_VAR: &str = "PARCEL_FILTERED_LIMIT";
pub const NEARBY_LIMIT_VAR: &str = "PARCEL_NEARBY_LIMIT";

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub api_base_url: String,
    /// Client-side cap on every request. A timeout counts as a network error.
    pub request_timeout: Duration,
    /// Quiet window after the last pan before the viewport is evaluated.
    pub debounce: Duration,
    /// Below this zoom no parcels are loaded.
    pub min_zoom_for_data: u8,
    pub base_limit: usize,
    pub filtered_limit: usize,
    pub nearby_limit: usize,
    pub nearby_padding: f64,
    pub detail_cache_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            request_timeout: Duration::from_secs(30),
            debounce: Duration::from_millis(500),
            min_zoom_for_data: 13,
            base_limit: 500,
            filtered_limit: 2000,
            nearby_limit: 100,
            nearby_padding: 1.5,
            detail_cache_capacity: 256,
        }
    }
}

fn parsed<T, F>(lookup: &F, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => {
            let parsed = value
                .trim()
                .parse()
                .with_context(|| format!("{} has an invalid value: {:?}", name, value))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

impl SyncConfig {
    /// Defaults overridden by the process environment and a `.env` file, if
    /// one exists.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Err(err) = dotenv::dotenv() {
            log::debug!("No .env loaded: {}", err);
        }
        Self::from_lookup(|name| dotenv::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_VAR).filter(|url| !url.trim().is_empty()) {
            config.api_base_url = url.trim().to_string();
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, TIMEOUT_VAR)? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(millis) = parsed::<u64, _>(&lookup, DEBOUNCE_VAR)? {
            config.debounce = Duration::from_millis(millis);
        }
        if let Some(zoom) = parsed(&lookup, MIN_ZOOM_VAR)? {
            config.min_zoom_for_data = zoom;
        }
        if let Some(limit) = parsed(&lookup, BBOX_LIMIT_VAR)? {
            config.base_limit = limit;
        }
        if let Some(limit) = parsed(&lookup, FILTERED_LIMIT_VAR)? {
            config.filtered_limit = limit;
        }
        if let Some(limit) = parsed(&lookup, NEARBY_LIMIT_VAR)? {
            config.nearby_limit = limit;
        }

        Ok(config)
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            base: self.base_limit,
            filtered: self.filtered_limit,
        }
    }
}
