//! Semantic version utilities for installer preconditions
//!
//! Parses loosely formatted version strings ("v1.2.3", "1.2", "1") and
//! answers the single question the preparation phase cares about: is the
//! running installer at least as new as the version a template bundle
//! requires?
//!
//! ## Examples
//!
//! ```rust
//! use moai_core::semver_utils;
//!
//! assert!(semver_utils::parse_version("v1.2.3").is_some());
//! assert!(semver_utils::meets_minimum("1.4.0", "1.2").unwrap());
//! ```

use crate::errors::PreflightError;
use semver::Version;

/// Parse a semantic version from a loosely formatted string
///
/// Handles "v1.2.3", "1.2.3", "1.2" and "1".
///
/// # Examples
///
/// ```rust
/// use moai_core::semver_utils::parse_version;
///
/// assert!(parse_version("1.2.3").is_some());
/// assert!(parse_version("v1.2.3").is_some());
/// assert!(parse_version("1.2").is_some());
/// assert!(parse_version("1").is_some());
/// assert!(parse_version("invalid").is_none());
/// ```
pub fn parse_version(value: &str) -> Option<Version> {
    let version_str = value.trim();
    let version_str = version_str.strip_prefix('v').unwrap_or(version_str);

    if let Ok(version) = Version::parse(version_str) {
        return Some(version);
    }

    // major.minor
    if let Ok(version) = Version::parse(&format!("{}.0", version_str)) {
        return Some(version);
    }

    // major
    if let Ok(version) = Version::parse(&format!("{}.0.0", version_str)) {
        return Some(version);
    }

    None
}

/// Check that `current` is greater than or equal to `minimum`
///
/// Both sides must parse; an unparseable version is a preflight error rather
/// than a silent pass.
pub fn meets_minimum(current: &str, minimum: &str) -> Result<bool, PreflightError> {
    let current_version = parse_version(current).ok_or_else(|| PreflightError::InvalidVersion {
        value: current.to_string(),
    })?;
    let minimum_version = parse_version(minimum).ok_or_else(|| PreflightError::InvalidVersion {
        value: minimum.to_string(),
    })?;

    Ok(current_version >= minimum_version)
}

/// Version of the running installer
pub fn installer_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
