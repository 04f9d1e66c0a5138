//! shavtzak-core - roster state, status mapping, cache and backend clients
//! shared by the shavtzak front ends.

pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod notify;
pub mod registration;
pub mod report;
pub mod roster;
pub mod sheets;
pub mod status;
pub mod store;
pub mod utils;

pub use config::Config;
pub use roster::{Roster, RosterError, StatusCounts};
pub use status::{map_raw_status_to_structured, map_structured_status_to_raw, Status, StructuredStatus};
