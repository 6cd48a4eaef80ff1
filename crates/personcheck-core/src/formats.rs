//! String formats shared by the structural validator and business rules

use std::sync::LazyLock;

use regex::Regex;

static ISO_FULL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])").expect("static regex")
});

/// Regex source for phone numbers in E.164 form (leading `+` optional).
pub const E164_PATTERN: &str = r"^\+?[1-9]\d{1,14}$";

static E164_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(E164_PATTERN).expect("static regex"));

/// `true` if `value` starts with an ISO 8601 full date (`YYYY-MM-DD`).
///
/// Anything may follow the date, so date-time values pass as well.
#[must_use]
pub fn is_iso_date(value: &str) -> bool {
    ISO_FULL_DATE.is_match(value)
}

/// The `YYYY-MM-DD` prefix of an ISO date, if present.
#[must_use]
pub fn date_prefix(value: &str) -> Option<&str> {
    ISO_FULL_DATE.find(value).map(|m| m.as_str())
}

/// Compiled [`E164_PATTERN`], for rules that carry their own regex.
#[must_use]
pub fn e164_regex() -> Regex {
    E164_PHONE.clone()
}
