//! Login form extraction and credential-field inference.

pub mod form;
pub mod inference;
