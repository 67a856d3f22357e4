pub mod cache;
pub mod land_api;

pub use cache::CachedLandSource;
pub use land_api::{LandApi, LandSource, Section, StatsSummary};
