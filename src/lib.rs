#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod map;
pub mod maps_api;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use config::SyncConfig;
pub use error::{Notice, SyncError};
pub use sync::{SyncEngine, SyncEvent, SyncHandle};
