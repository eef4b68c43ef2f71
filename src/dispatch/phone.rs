use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Country code assumed for numbers written in national form.
pub const DEFAULT_COUNTRY_CODE: &str = "90";

// Longest number still read as national when it carries no prefix.
const NATIONAL_MAX_DIGITS: usize = 10;

// Everything except the unreserved marks `encodeURIComponent` leaves alone.
// The apostrophe is escaped as well so the result survives URL parsers that
// re-encode it in query strings.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'(')
    .remove(b')');

/// Normalize a phone number to `+<country><national>`.
///
/// Input with no digits at all is returned trimmed but otherwise untouched;
/// the hand-off simply goes nowhere in that case.
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let trimmed = raw.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return trimmed.to_string();
    }
    let cc = country_code.trim().trim_start_matches('+');

    if trimmed.starts_with('+') {
        return format!("+{digits}");
    }
    if let Some(rest) = digits.strip_prefix("00") {
        return format!("+{rest}");
    }
    if let Some(rest) = digits.strip_prefix('0') {
        return format!("+{cc}{rest}");
    }
    if cc.is_empty() || (digits.len() > NATIONAL_MAX_DIGITS && digits.starts_with(cc)) {
        return format!("+{digits}");
    }
    format!("+{cc}{digits}")
}

/// Digits only, as WhatsApp expects in its `phone` parameter.
pub fn whatsapp_digits(raw: &str, country_code: &str) -> String {
    normalize_phone(raw, country_code)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}

/// Percent-encode a message body for use inside a URI.
pub fn encode_body(body: &str) -> String {
    utf8_percent_encode(body, COMPONENT).to_string()
}
