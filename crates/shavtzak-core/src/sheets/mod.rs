//! Google Sheets backend for the roster.
//!
//! The spreadsheet is the system of record: soldiers are read from one
//! tab and changed rows are written back in place.

pub mod client;
pub mod error;
pub mod rows;

pub use client::{SheetsClient, SyncSummary};
pub use error::SheetsError;
