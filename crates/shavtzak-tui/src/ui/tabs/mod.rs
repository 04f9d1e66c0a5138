//! Tab-specific content rendering.

pub mod equipment;
pub mod report;
pub mod roster;
pub mod users;
