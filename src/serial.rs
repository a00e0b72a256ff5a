/// Canonical form of a card serial: surrounding whitespace trimmed, uppercased.
///
/// Every path that produces a serial (typed input, scan result, provisioning)
/// goes through this before the value is compared or sent anywhere.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Canonical form of a customer mobile number.
///
/// Drops surrounding whitespace and the separators people type by habit
/// (spaces, dashes, dots, parentheses). A leading `+` is kept.
pub fn normalize_mobile(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')' | '\t'))
        .collect()
}
