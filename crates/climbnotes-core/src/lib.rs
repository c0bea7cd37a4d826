//! climbnotes-core - Core library for Climbing Notes
//!
//! This crate holds the record model, the wire-row normalizer, the
//! newest-wins merge with tombstone propagation, local persistence and the
//! push/pull sync engine used by every Climbing Notes front end.

pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Attempt, DataStore, Gym, Route, SyncRow};
pub use state::SyncState;
