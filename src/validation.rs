//! Input checks shared by the public forms and the admin API.

use std::sync::LazyLock;

use regex::Regex;

pub const MAX_LICENSE_PLATE_LEN: usize = 20;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\+62|08)[0-9]{9,}$").expect("phone pattern compiles"));

/// `local@domain.tld` with no whitespace and a single `@`.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Indonesian mobile numbers: `+62` or `08` followed by at least nine digits.
/// Spaces and dashes are ignored.
pub fn is_valid_phone(phone: &str) -> bool {
    let compact: String = phone.chars().filter(|c| *c != ' ' && *c != '-').collect();
    PHONE_RE.is_match(&compact)
}

pub fn is_valid_license_plate(plate: &str) -> bool {
    let plate = plate.trim();
    !plate.is_empty() && plate.chars().count() <= MAX_LICENSE_PLATE_LEN
}

/// Trims and lower-cases an address before it is stored or looked up.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Returns the trimmed value, or `None` when nothing is left.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}
