use std::cmp::Ordering;

/// Format an Israeli phone number for display.
/// Handles local (05XXXXXXXX) and international (9725XXXXXXXX) forms and
/// normalizes to 05X-XXX-XXXX.
pub fn format_phone(phone: &str) -> String {
    // Extract just the digits
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let local = match digits.len() {
        10 if digits.starts_with('0') => digits,
        12 if digits.starts_with("972") => format!("0{}", &digits[3..]),
        _ => return phone.to_string(), // Return original if can't format
    };

    format!("{}-{}-{}", &local[0..3], &local[3..6], &local[6..10])
}

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Loose email shape check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("0521234567"), "052-123-4567");
        assert_eq!(format_phone("052-123-4567"), "052-123-4567");
        assert_eq!(format_phone("+972 52 123 4567"), "052-123-4567");
        assert_eq!(format_phone("123"), "123"); // Too short, return as-is
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        // Counts characters, not bytes
        assert_eq!(truncate_string("משמר", 4), "משמר");
        assert_eq!(truncate_string("חופשת מחלה", 6), "חופ...");
    }

    #[test]
    fn test_ignore_case_helpers() {
        assert!(contains_ignore_case("Platoon Alpha", "alpha"));
        assert!(!contains_ignore_case("Platoon Alpha", "bravo"));
        assert_eq!(cmp_ignore_case("alpha", "Bravo"), Ordering::Less);
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("soldier@unit.idf.il"));
        assert!(!is_valid_email("soldier.unit.il"));
        assert!(!is_valid_email("@unit.il"));
        assert!(!is_valid_email("a@b@c.il"));
        assert!(!is_valid_email("a b@c.il"));
        assert!(!is_valid_email("a@il."));
    }
}
