//! Mapping between the free-text status cell of the roster sheet and the
//! structured status used everywhere else.
//!
//! The sheet stores one of `בית`, `משמר`, or any other text. Anything that
//! is not one of the two fixed values is treated as `אחר` with the original
//! text kept as the custom status, so converting back is lossless.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const HOME_LABEL: &str = "בית";
pub const GUARD_LABEL: &str = "משמר";
pub const OTHER_LABEL: &str = "אחר";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "בית")]
    Home,
    #[serde(rename = "משמר")]
    Guard,
    #[serde(rename = "אחר")]
    Other,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Home, Status::Guard, Status::Other];

    pub fn label(&self) -> &'static str {
        match self {
            Status::Home => HOME_LABEL,
            Status::Guard => GUARD_LABEL,
            Status::Other => OTHER_LABEL,
        }
    }

    /// Parse one of the three fixed labels. Free text is not a label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            HOME_LABEL => Some(Status::Home),
            GUARD_LABEL => Some(Status::Guard),
            OTHER_LABEL => Some(Status::Other),
            _ => None,
        }
    }

    /// Get the next status (wrapping around)
    pub fn next(&self) -> Self {
        match self {
            Status::Home => Status::Guard,
            Status::Guard => Status::Other,
            Status::Other => Status::Home,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredStatus {
    pub status: Status,
    pub custom_status: Option<String>,
}

impl StructuredStatus {
    /// Text shown to the user: the custom text for `אחר`, otherwise the label.
    pub fn display(&self) -> String {
        map_structured_status_to_raw(self.status, self.custom_status.as_deref())
    }
}

/// Convert a raw sheet cell into a structured status.
pub fn map_raw_status_to_structured(raw: &str) -> StructuredStatus {
    match raw {
        HOME_LABEL => StructuredStatus {
            status: Status::Home,
            custom_status: None,
        },
        GUARD_LABEL => StructuredStatus {
            status: Status::Guard,
            custom_status: None,
        },
        other => StructuredStatus {
            status: Status::Other,
            custom_status: Some(other.to_string()),
        },
    }
}

/// Convert a structured status back into the raw sheet cell.
pub fn map_structured_status_to_raw(status: Status, custom_status: Option<&str>) -> String {
    match status {
        Status::Other => custom_status.unwrap_or(OTHER_LABEL).to_string(),
        fixed => fixed.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_values_map_to_their_status() {
        let home = map_raw_status_to_structured("בית");
        assert_eq!(home.status, Status::Home);
        assert_eq!(home.custom_status, None);

        let guard = map_raw_status_to_structured("משמר");
        assert_eq!(guard.status, Status::Guard);
        assert_eq!(guard.custom_status, None);
    }

    #[test]
    fn test_free_text_becomes_other() {
        let sick = map_raw_status_to_structured("גימלים");
        assert_eq!(sick.status, Status::Other);
        assert_eq!(sick.custom_status.as_deref(), Some("גימלים"));
    }

    #[test]
    fn test_other_label_is_kept_as_custom_text() {
        let other = map_raw_status_to_structured("אחר");
        assert_eq!(other.status, Status::Other);
        assert_eq!(other.custom_status.as_deref(), Some("אחר"));
    }

    #[test]
    fn test_whitespace_is_not_trimmed() {
        let padded = map_raw_status_to_structured(" בית");
        assert_eq!(padded.status, Status::Other);
        assert_eq!(padded.custom_status.as_deref(), Some(" בית"));
    }

    #[test]
    fn test_structured_to_raw() {
        assert_eq!(map_structured_status_to_raw(Status::Home, None), "בית");
        assert_eq!(map_structured_status_to_raw(Status::Guard, Some("ignored")), "משמר");
        assert_eq!(map_structured_status_to_raw(Status::Other, Some("קורס")), "קורס");
        assert_eq!(map_structured_status_to_raw(Status::Other, None), "אחר");
        assert_eq!(map_structured_status_to_raw(Status::Other, Some("")), "");
    }

    #[test]
    fn test_round_trip_preserves_raw_value() {
        let samples = ["בית", "משמר", "אחר", "", " ", "חופש מחלה", "בית ", "BASE", "🙂"];
        for raw in samples {
            let structured = map_raw_status_to_structured(raw);
            let back =
                map_structured_status_to_raw(structured.status, structured.custom_status.as_deref());
            assert_eq!(back, raw, "round trip failed for {:?}", raw);
        }
    }

    #[test]
    fn test_status_cycle_and_labels() {
        assert_eq!(Status::Home.next(), Status::Guard);
        assert_eq!(Status::Other.next(), Status::Home);
        for status in Status::ALL {
            assert_eq!(Status::from_label(status.label()), Some(status));
        }
        assert_eq!(Status::from_label("קורס"), None);
    }

    #[test]
    fn test_status_serializes_as_hebrew_label() {
        let json = serde_json::to_string(&Status::Guard).unwrap();
        assert_eq!(json, "\"משמר\"");
        let parsed: Status = serde_json::from_str("\"אחר\"").unwrap();
        assert_eq!(parsed, Status::Other);
    }
}
