//! Data models for roster entities.
//!
//! - `Soldier`, `SoldierForm`, `FormErrors`: roster records and their validation
//! - `FilterState`, `ReportSettings`: roster view and report configuration
//! - `EquipmentTemplate`, `EquipmentItem`: packing-list templates
//! - `User`, `UserRole`: application accounts

pub mod equipment;
pub mod soldier;
pub mod user;

pub use equipment::{EquipmentItem, EquipmentTemplate};
pub use soldier::{
    full_name, is_valid_personal_number, FilterState, FormErrors, ReportSettings, Soldier,
    SoldierForm, PERSONAL_NUMBER_LENGTH,
};
pub use user::{User, UserRole};
