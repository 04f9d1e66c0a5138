use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::status::{map_structured_status_to_raw, Status, StructuredStatus};
use crate::utils::contains_ignore_case;

/// Personal numbers are exactly this many digits.
pub const PERSONAL_NUMBER_LENGTH: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Soldier {
    /// Personal number
    pub id: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub name: String,
    pub platoon: String,
    pub status: Status,
    #[serde(rename = "customStatus", default, skip_serializing_if = "Option::is_none")]
    pub custom_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "isSelected", default)]
    pub is_selected: bool,
    #[serde(rename = "isManuallyAdded", default, skip_serializing_if = "Option::is_none")]
    pub is_manually_added: Option<bool>,
}

impl Soldier {
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        platoon: impl Into<String>,
        status: StructuredStatus,
    ) -> Self {
        let first_name = first_name.into();
        let last_name = last_name.into();
        Self {
            id: id.into(),
            name: full_name(&first_name, &last_name),
            first_name,
            last_name,
            platoon: platoon.into(),
            status: status.status,
            custom_status: status.custom_status,
            notes: None,
            is_selected: false,
            is_manually_added: None,
        }
    }

    /// Identity used when diffing against the baseline snapshot.
    pub fn identity(&self) -> (&str, &str) {
        (&self.id, &self.name)
    }

    /// The value written to the sheet's status column.
    pub fn raw_status(&self) -> String {
        map_structured_status_to_raw(self.status, self.custom_status.as_deref())
    }

    pub fn set_status(&mut self, status: Status, custom_status: Option<String>) {
        self.status = status;
        self.custom_status = match status {
            Status::Other => custom_status,
            _ => None,
        };
    }

    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name, self.first_name)
    }

    pub fn notes_display(&self) -> &str {
        self.notes.as_deref().unwrap_or("")
    }

    pub fn manually_added(&self) -> bool {
        self.is_manually_added.unwrap_or(false)
    }

    /// True when any persisted field differs. Selection is UI state and ignored.
    pub fn differs_from(&self, other: &Soldier) -> bool {
        self.first_name != other.first_name
            || self.last_name != other.last_name
            || self.platoon != other.platoon
            || self.status != other.status
            || self.custom_status != other.custom_status
            || normalized_notes(&self.notes) != normalized_notes(&other.notes)
    }
}

fn normalized_notes(notes: &Option<String>) -> &str {
    notes.as_deref().map(str::trim).unwrap_or("")
}

pub fn full_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name.trim(), last_name.trim())
        .trim()
        .to_string()
}

pub fn is_valid_personal_number(value: &str) -> bool {
    value.len() == PERSONAL_NUMBER_LENGTH && value.chars().all(|c| c.is_ascii_digit())
}

// ============================================================================
// Form
// ============================================================================

/// Input for adding or editing a soldier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoldierForm {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub platoon: String,
    pub status: Option<Status>,
    pub custom_status: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub platoon: Option<String>,
    pub custom_status: Option<String>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.platoon.is_none()
            && self.custom_status.is_none()
    }

    /// All messages, in field order.
    pub fn messages(&self) -> Vec<&str> {
        [
            &self.id,
            &self.first_name,
            &self.last_name,
            &self.platoon,
            &self.custom_status,
        ]
        .into_iter()
        .filter_map(|m| m.as_deref())
        .collect()
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.messages().join("; "))
    }
}

impl SoldierForm {
    pub fn from_soldier(soldier: &Soldier) -> Self {
        Self {
            id: soldier.id.clone(),
            first_name: soldier.first_name.clone(),
            last_name: soldier.last_name.clone(),
            platoon: soldier.platoon.clone(),
            status: Some(soldier.status),
            custom_status: soldier.custom_status.clone().unwrap_or_default(),
            notes: soldier.notes.clone().unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> FormErrors {
        let mut errors = FormErrors::default();

        let id = self.id.trim();
        if id.is_empty() {
            errors.id = Some("Personal number is required".to_string());
        } else if !is_valid_personal_number(id) {
            errors.id = Some(format!(
                "Personal number must be {} digits",
                PERSONAL_NUMBER_LENGTH
            ));
        }

        if self.first_name.trim().is_empty() {
            errors.first_name = Some("First name is required".to_string());
        }
        if self.last_name.trim().is_empty() {
            errors.last_name = Some("Last name is required".to_string());
        }
        if self.platoon.trim().is_empty() {
            errors.platoon = Some("Platoon is required".to_string());
        }
        if self.status == Some(Status::Other) && self.custom_status.trim().is_empty() {
            errors.custom_status = Some("Describe the status when choosing אחר".to_string());
        }

        errors
    }

    /// Build a soldier from a validated form. Fields are trimmed.
    pub fn to_soldier(&self) -> Soldier {
        let status = self.status.unwrap_or(Status::Home);
        let custom = match status {
            Status::Other => Some(self.custom_status.trim().to_string()),
            _ => None,
        };
        let mut soldier = Soldier::new(
            self.id.trim(),
            self.first_name.trim(),
            self.last_name.trim(),
            self.platoon.trim(),
            StructuredStatus {
                status,
                custom_status: custom,
            },
        );
        let notes = self.notes.trim();
        soldier.notes = (!notes.is_empty()).then(|| notes.to_string());
        soldier
    }
}

// ============================================================================
// Filter and report settings
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub search: String,
    pub platoon: Option<String>,
    pub status: Option<Status>,
}

impl FilterState {
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || self.platoon.is_some() || self.status.is_some()
    }

    pub fn matches(&self, soldier: &Soldier) -> bool {
        if let Some(ref platoon) = self.platoon {
            if &soldier.platoon != platoon {
                return false;
            }
        }
        if let Some(status) = self.status {
            if soldier.status != status {
                return false;
            }
        }

        let query = self.search.trim();
        if query.is_empty() {
            return true;
        }

        contains_ignore_case(&soldier.name, query)
            || soldier.id.contains(query)
            || contains_ignore_case(&soldier.platoon, query)
            || soldier
                .notes
                .as_deref()
                .map(|n| contains_ignore_case(n, query))
                .unwrap_or(false)
            || soldier
                .custom_status
                .as_deref()
                .map(|c| contains_ignore_case(c, query))
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    pub title: String,
    pub date: NaiveDate,
    #[serde(rename = "groupByPlatoon")]
    pub group_by_platoon: bool,
    #[serde(rename = "includeNotes")]
    pub include_notes: bool,
    #[serde(rename = "includeHome")]
    pub include_home: bool,
}

impl ReportSettings {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            title: "שבצ״ק".to_string(),
            date,
            group_by_platoon: true,
            include_notes: true,
            include_home: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::map_raw_status_to_structured;

    fn soldier(id: &str, first: &str, last: &str, platoon: &str, raw: &str) -> Soldier {
        Soldier::new(id, first, last, platoon, map_raw_status_to_structured(raw))
    }

    #[test]
    fn test_soldier_name_and_status() {
        let s = soldier("1234567", "Dana", "Levi", "1", "קורס");
        assert_eq!(s.name, "Dana Levi");
        assert_eq!(s.status, Status::Other);
        assert_eq!(s.raw_status(), "קורס");
        assert_eq!(s.identity(), ("1234567", "Dana Levi"));
        assert_eq!(s.display_name(), "Levi, Dana");
    }

    #[test]
    fn test_set_status_drops_custom_for_fixed_values() {
        let mut s = soldier("1234567", "Dana", "Levi", "1", "קורס");
        s.set_status(Status::Guard, Some("leftover".to_string()));
        assert_eq!(s.custom_status, None);
        assert_eq!(s.raw_status(), "משמר");
    }

    #[test]
    fn test_differs_ignores_selection_and_blank_notes() {
        let a = soldier("1234567", "Dana", "Levi", "1", "בית");
        let mut b = a.clone();
        b.is_selected = true;
        b.notes = Some("  ".to_string());
        assert!(!a.differs_from(&b));

        b.notes = Some("late".to_string());
        assert!(a.differs_from(&b));
    }

    #[test]
    fn test_soldier_json_uses_camel_case() {
        let mut s = soldier("1234567", "Dana", "Levi", "1", "אחר");
        s.is_manually_added = Some(true);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["firstName"], "Dana");
        assert_eq!(json["customStatus"], "אחר");
        assert_eq!(json["isManuallyAdded"], true);
        assert!(json.get("notes").is_none());

        let parsed: Soldier = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, s);
    }

    #[test]
    fn test_form_validation_errors() {
        let form = SoldierForm {
            id: "12a".to_string(),
            status: Some(Status::Other),
            ..Default::default()
        };
        let errors = form.validate();
        assert!(errors.id.is_some());
        assert!(errors.first_name.is_some());
        assert!(errors.last_name.is_some());
        assert!(errors.platoon.is_some());
        assert!(errors.custom_status.is_some());
        assert_eq!(errors.messages().len(), 5);
    }

    #[test]
    fn test_valid_form_builds_trimmed_soldier() {
        let form = SoldierForm {
            id: " 7654321 ".to_string(),
            first_name: "Noa ".to_string(),
            last_name: " Cohen".to_string(),
            platoon: "2".to_string(),
            status: Some(Status::Guard),
            custom_status: "ignored".to_string(),
            notes: "".to_string(),
        };
        assert!(form.validate().is_empty());

        let s = form.to_soldier();
        assert_eq!(s.id, "7654321");
        assert_eq!(s.name, "Noa Cohen");
        assert_eq!(s.custom_status, None);
        assert_eq!(s.notes, None);
        assert_eq!(SoldierForm::from_soldier(&s).status, Some(Status::Guard));
    }

    #[test]
    fn test_filter_matches() {
        let mut s = soldier("1234567", "Dana", "Levi", "Alpha", "גימלים");
        s.notes = Some("Returns Sunday".to_string());

        assert!(FilterState::default().matches(&s));
        assert!(!FilterState::default().is_active());

        let by_name = FilterState { search: "levi".to_string(), ..Default::default() };
        assert!(by_name.matches(&s));

        let by_id = FilterState { search: "3456".to_string(), ..Default::default() };
        assert!(by_id.matches(&s));

        let by_notes = FilterState { search: "sunday".to_string(), ..Default::default() };
        assert!(by_notes.matches(&s));

        let by_custom = FilterState { search: "גימלים".to_string(), ..Default::default() };
        assert!(by_custom.matches(&s));

        let wrong_platoon = FilterState { platoon: Some("Bravo".to_string()), ..Default::default() };
        assert!(!wrong_platoon.matches(&s));

        let wrong_status = FilterState { status: Some(Status::Home), ..Default::default() };
        assert!(!wrong_status.matches(&s));
        assert!(wrong_status.is_active());
    }

    #[test]
    fn test_personal_number_validation() {
        assert!(is_valid_personal_number("1234567"));
        assert!(!is_valid_personal_number("123456"));
        assert!(!is_valid_personal_number("12345678"));
        assert!(!is_valid_personal_number("12345a7"));
    }
}
