use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::format_phone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Commander,
    Soldier,
}

impl UserRole {
    pub fn title(&self) -> &'static str {
        match self {
            UserRole::Admin => "Admin",
            UserRole::Commander => "Commander",
            UserRole::Soldier => "Soldier",
        }
    }

    /// Get the next role (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            UserRole::Admin => UserRole::Commander,
            UserRole::Commander => UserRole::Soldier,
            UserRole::Soldier => UserRole::Admin,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title())
    }
}

/// Application user document. `uid` is the Firebase account id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
    #[serde(rename = "personalNumber")]
    pub personal_number: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platoon: Option<String>,
    pub role: UserRole,
    #[serde(rename = "isActive", default)]
    pub is_active: bool,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    pub fn phone_display(&self) -> Option<String> {
        self.phone.as_deref().map(format_phone)
    }

    /// Inactive accounts are waiting for an admin and have no permissions.
    pub fn can_edit_roster(&self) -> bool {
        self.is_active && matches!(self.role, UserRole::Admin | UserRole::Commander)
    }

    pub fn can_manage_users(&self) -> bool {
        self.is_active && self.role == UserRole::Admin
    }

    pub fn status_display(&self) -> &'static str {
        if self.is_active {
            "Active"
        } else {
            "Pending"
        }
    }
}
