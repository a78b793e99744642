//! Payload redaction for diagnostics.

use crate::extraction::form::Payload;
use crate::extraction::inference::PASS_FIELD_TERMS;

/// Marker rendered in place of a secret value.
pub const REDACTED: &str = "***";

/// Whether a field name is a known password field (case-insensitive).
pub fn is_secret_field(name: &str) -> bool {
    PASS_FIELD_TERMS
        .iter()
        .any(|term| term.eq_ignore_ascii_case(name))
}

/// Copy of `payload` with every password-dictionary field masked.
pub fn redact_payload(payload: &Payload) -> Payload {
    redact_payload_with(payload, None)
}

/// Like [`redact_payload`], also masking `pass_field` whatever its name.
pub fn redact_payload_with(payload: &Payload, pass_field: Option<&str>) -> Payload {
    payload
        .iter()
        .map(|(k, v)| {
            let secret = is_secret_field(k) || pass_field.is_some_and(|p| p == k);
            let value = if secret { REDACTED } else { v.as_str() };
            (k, value)
        })
        .collect()
}
