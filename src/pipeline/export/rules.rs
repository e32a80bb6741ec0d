//! Row rules: which value lands in the "Tracking Number" column.

use crate::models::{FAIL_VALUE, NONE_VALUE};

/// `CON` tracking numbers shorter than this are partial reads.
pub const MIN_CON_TRACKING_LEN: usize = 19;

/// Treat the failure sentinel as "not found".
pub fn normalize(value: &str) -> &str {
    if value == FAIL_VALUE {
        NONE_VALUE
    } else {
        value
    }
}

pub fn is_valid_tracking(tracking: &str) -> bool {
    let con_too_short =
        tracking.starts_with("CON") && tracking.chars().count() < MIN_CON_TRACKING_LEN;
    tracking != NONE_VALUE && !con_too_short
}

/// Valid tracking number, else the phone number, else `NONE`.
pub fn final_value<'a>(tracking: &'a str, phone: &'a str) -> &'a str {
    let tracking = normalize(tracking);
    let phone = normalize(phone);

    if is_valid_tracking(tracking) {
        tracking
    } else if phone != NONE_VALUE {
        phone
    } else {
        NONE_VALUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_normalizes_to_none() {
        assert_eq!(normalize("FAIL"), "NONE");
        assert_eq!(normalize("1Z999"), "1Z999");
    }

    #[test]
    fn short_con_numbers_are_invalid() {
        assert!(!is_valid_tracking("CON12345"));
        assert!(!is_valid_tracking("CON123456789012345"), "18 chars");
        assert!(is_valid_tracking("CON1234567890123456"), "19 chars");
        assert!(is_valid_tracking("CON123456789012345678"));
    }

    #[test]
    fn other_carriers_are_valid_at_any_length() {
        assert!(is_valid_tracking("1Z999AA10123456784"));
        assert!(is_valid_tracking("5904"));
        assert!(is_valid_tracking("DOM1"));
        assert!(!is_valid_tracking("NONE"));
    }

    #[test]
    fn phone_is_the_fallback() {
        assert_eq!(final_value("NONE", "(555) 123-4567"), "(555) 123-4567");
        assert_eq!(final_value("CON12345", "5551234567"), "5551234567");
        assert_eq!(final_value("NONE", "NONE"), "NONE");
        assert_eq!(final_value("CON12345", "NONE"), "NONE");
    }

    #[test]
    fn failed_results_export_as_none() {
        assert_eq!(final_value("FAIL", "FAIL"), "NONE");
    }

    #[test]
    fn valid_tracking_wins_over_phone() {
        assert_eq!(final_value("1Z999AA10123456784", "5551234567"), "1Z999AA10123456784");
    }
}
