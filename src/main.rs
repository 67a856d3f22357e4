#![warn(clippy::all, rust_2018_idioms)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use parcel_sync::map::{GeoBounds, HeadlessMap, Viewport};
use parcel_sync::maps_api::{CachedLandSource, LandApi, LandSource, StatsSummary};
use parcel_sync::sync::FilterCriteria;
use parcel_sync::{Notice, SyncConfig, SyncEngine, SyncEvent};

fn parse_bounds(value: &str) -> Result<GeoBounds, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;
    match parts[..] {
        [min_lng, min_lat, max_lng, max_lat] => Ok(GeoBounds::new(min_lng, min_lat, max_lng, max_lat)),
        _ => Err("expected min_lng,min_lat,max_lng,max_lat".to_string()),
    }
}

/// Loads the parcels for one map view (or one search) and prints them.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// View extent as min_lng,min_lat,max_lng,max_lat
    #[arg(long, value_parser = parse_bounds, default_value = "121.50,25.03,121.52,25.05")]
    bbox: GeoBounds,

    #[arg(long, default_value_t = 16)]
    zoom: u8,

    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    district: Option<String>,

    #[arg(long)]
    parcel_no: Option<String>,

    #[arg(long)]
    owner_name: Option<String>,

    /// Run the criteria as a search instead of filtering the view
    #[arg(long)]
    search: bool,

    /// Print the land statistics summary first
    #[arg(long)]
    stats: bool,

    /// Overrides PARCEL_API_URL
    #[arg(long)]
    api_url: Option<String>,
}

impl Args {
    fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            city: self.city.clone(),
            district: self.district.clone(),
            parcel_no: self.parcel_no.clone(),
            owner_name: self.owner_name.clone(),
        }
        .normalized()
    }
}

async fn print_stats(source: &dyn LandSource) {
    let stats = match source.stats_summary().await {
        Ok(stats) => stats,
        Err(err) => {
            log::warn!("Stats unavailable, using published totals: {}", err);
            StatsSummary::fallback()
        }
    };
    println!(
        "{} parcels, {:.2} m², {} cities, {} districts",
        stats.total_lands, stats.total_area, stats.cities_count, stats.districts_count
    );
}

/// Whether the run is over after `event`.
fn report(event: &SyncEvent, searching: bool) -> anyhow::Result<bool> {
    match event {
        SyncEvent::FeaturesUpdated(collection) => {
            log::info!("{} parcels in view", collection.len());
            println!("{}", serde_json::to_string_pretty(collection)?);
        }
        SyncEvent::SearchResults(rows) => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        SyncEvent::Notice(notice) if notice.is_warning() => log::warn!("{:?}", notice),
        other => log::info!("{:?}", other),
    }

    Ok(match event {
        SyncEvent::Notice(Notice::SearchFailed) => true,
        SyncEvent::Notice(Notice::EmptyResult | Notice::SearchFound(_) | Notice::LimitReached { .. }) => searching,
        SyncEvent::LoadingChanged(false) | SyncEvent::BelowZoomThreshold(true) => !searching,
        _ => false,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse();
    let mut config = SyncConfig::from_env().context("Failed to load configuration")?;
    if let Some(url) = &args.api_url {
        config.api_base_url = url.clone();
    }

    let api = LandApi::new(config.api_base_url.clone(), config.request_timeout)
        .context("Failed to build HTTP client")?;
    let source = Arc::new(CachedLandSource::new(api, config.detail_cache_capacity));

    if args.stats {
        print_stats(source.as_ref()).await;
    }

    let viewport = Viewport::new(args.bbox, args.zoom);
    let map = Arc::new(HeadlessMap::new(viewport));
    let (engine, handle, mut events) = SyncEngine::new(&config, source, map);
    let engine_task = tokio::spawn(engine.run());

    let criteria = args.criteria();
    if args.search {
        handle.search(criteria);
    } else {
        if criteria.is_active() {
            handle.filter_changed(Some(criteria));
        }
        handle.map_settled();
    }

    // Every request is bounded by the client timeout, so one settlement
    // arrives well within two of them.
    let wait = config.request_timeout * 2 + Duration::from_secs(1);
    let outcome = tokio::time::timeout(wait, async {
        while let Some(event) = events.recv().await {
            if report(&event, args.search)? {
                break;
            }
        }
        anyhow::Ok(())
    })
    .await;

    handle.teardown();
    engine_task.await.context("Sync engine task failed")?;

    match outcome {
        Ok(result) => result,
        Err(_) => anyhow::bail!("No settlement within {:?}", wait),
    }
}
