//! Credential handling: the credential type and payload redaction.

pub mod credentials;
pub mod redact;
