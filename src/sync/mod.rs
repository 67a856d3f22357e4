pub mod engine;
pub mod events;
pub mod fetch;
pub mod filter;
pub mod loading;
pub mod nearby;
pub mod search;
pub mod selection;
pub mod viewport;

pub use engine::SyncEngine;
pub use events::{SyncEvent, SyncHandle};
pub use fetch::{FetchCoordinator, FetchLimits, FetchOutcome, FetchRequest};
pub use filter::{apply_filter, FilterCriteria};
pub use loading::{Generation, LoadDomain, LoadPhase};
pub use nearby::NearbyContextLoader;
pub use search::{search_limit, SearchController};
pub use selection::{CameraPurpose, SelectionCenterController};
pub use viewport::{DebounceTimer, ViewportTracker};
