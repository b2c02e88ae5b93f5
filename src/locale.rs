//! Language code helpers shared by the engine and the backends
//!
//! Target languages arrive from an untrusted panel message, so they are
//! validated before they reach a backend. Backends that only understand the
//! base language use [`normalize_locale`].

use crate::error::{EngineError, EngineResult};

/// Source language marker asking the backend to detect the language itself
pub const AUTO_DETECT: &str = "auto";

/// Normalize a locale code by stripping region and script information
///
/// - `en-US` → `en`
/// - `zh-Hans` → `zh`
/// - `pt_BR` → `pt`
pub fn normalize_locale(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_lowercase()
}

/// Validate that a locale code is in acceptable format
///
/// Accepts ASCII alphanumerics, hyphens and underscores. The special
/// [`AUTO_DETECT`] marker is accepted as well.
pub fn validate_locale(locale: &str) -> EngineResult<()> {
    if locale.trim().is_empty() {
        return Err(EngineError::InvalidRequest(
            "Target language is required".to_string(),
        ));
    }

    if !locale
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(EngineError::InvalidRequest(format!(
            "Invalid characters in locale code: {}",
            locale
        )));
    }

    Ok(())
}
