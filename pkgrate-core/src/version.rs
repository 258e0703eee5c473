//! Version specifiers: exact, caret, tilde and bounded range.
//!
//! The mode is chosen by scanning for operator characters in a fixed
//! precedence: `-` (bounded range), then `^`, then `~`, otherwise exact.

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};

use crate::error::{PkgRateError, Result};

/// A parsed version specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// String equality against the stored version.
    Exact(String),
    /// Same major version, at or above the given version.
    Caret(VersionReq),
    /// Same major.minor, patch at or above the given version.
    Tilde(VersionReq),
    /// Strictly between two versions, both bounds excluded.
    Bounded {
        /// Exclusive lower bound.
        lower: Version,
        /// Exclusive upper bound.
        upper: Version,
    },
}

impl VersionConstraint {
    /// Parse a specifier. Fails with `MalformedInput` when an operator is
    /// present but its operand is not a version.
    pub fn parse(specifier: &str) -> Result<Self> {
        let specifier = specifier.trim();
        if let Some((lower, upper)) = specifier.split_once('-') {
            let lower = parse_lenient_version(lower).ok_or_else(|| malformed(specifier))?;
            let upper = parse_lenient_version(upper).ok_or_else(|| malformed(specifier))?;
            return Ok(VersionConstraint::Bounded { lower, upper });
        }
        if specifier.contains('^') {
            let req = VersionReq::parse(specifier).map_err(|_| malformed(specifier))?;
            return Ok(VersionConstraint::Caret(req));
        }
        if specifier.contains('~') {
            let req = VersionReq::parse(specifier).map_err(|_| malformed(specifier))?;
            return Ok(VersionConstraint::Tilde(req));
        }
        Ok(VersionConstraint::Exact(specifier.to_string()))
    }

    /// Whether `version` satisfies this constraint. A version that does not
    /// parse never matches a range.
    pub fn matches(&self, version: &str) -> bool {
        match self {
            VersionConstraint::Exact(expected) => version.trim() == expected,
            VersionConstraint::Caret(req) | VersionConstraint::Tilde(req) => {
                parse_lenient_version(version).is_some_and(|candidate| req.matches(&candidate))
            }
            VersionConstraint::Bounded { lower, upper } => parse_lenient_version(version)
                .is_some_and(|candidate| &candidate > lower && &candidate < upper),
        }
    }

    /// Short label for the matching mode.
    pub fn mode(&self) -> &'static str {
        match self {
            VersionConstraint::Exact(_) => "exact",
            VersionConstraint::Caret(_) => "caret",
            VersionConstraint::Tilde(_) => "tilde",
            VersionConstraint::Bounded { .. } => "bounded",
        }
    }
}

impl FromStr for VersionConstraint {
    type Err = PkgRateError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Exact(version) => f.write_str(version),
            VersionConstraint::Caret(req) | VersionConstraint::Tilde(req) => write!(f, "{req}"),
            VersionConstraint::Bounded { lower, upper } => write!(f, "{lower}-{upper}"),
        }
    }
}

fn malformed(specifier: &str) -> PkgRateError {
    PkgRateError::MalformedInput(format!("invalid version specifier `{specifier}`"))
}

/// Parse a concrete version, accepting a leading `v` and missing minor or
/// patch components (`1.2` reads as `1.2.0`).
pub fn parse_lenient_version(raw: &str) -> Option<Version> {
    let raw = raw.trim();
    let raw = raw.strip_prefix(['v', 'V']).unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }
    if let Ok(version) = Version::parse(raw) {
        return Some(version);
    }
    let components: Vec<&str> = raw.split('.').collect();
    if components.len() > 3 {
        return None;
    }
    let mut numbers = [0u64; 3];
    for (slot, component) in numbers.iter_mut().zip(&components) {
        *slot = component.parse().ok()?;
    }
    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint(specifier: &str) -> VersionConstraint {
        VersionConstraint::parse(specifier).expect("specifier parses")
    }

    #[test]
    fn bounded_range_excludes_both_ends() {
        let range = constraint("1.2.0-2.0.0");
        assert_eq!(range.mode(), "bounded");
        assert!(range.matches("1.5.0"));
        assert!(range.matches("1.2.1"));
        assert!(!range.matches("2.0.0"));
        assert!(!range.matches("1.2.0"));
        assert!(!range.matches("0.9.0"));
    }

    #[test]
    fn caret_stays_within_major() {
        let caret = constraint("^1.2.0");
        assert_eq!(caret.mode(), "caret");
        assert!(caret.matches("1.9.9"));
        assert!(caret.matches("1.2.0"));
        assert!(!caret.matches("2.0.0"));
        assert!(!caret.matches("1.1.9"));
    }

    #[test]
    fn tilde_stays_within_minor() {
        let tilde = constraint("~1.2.0");
        assert_eq!(tilde.mode(), "tilde");
        assert!(tilde.matches("1.2.9"));
        assert!(!tilde.matches("1.3.0"));
        assert!(!tilde.matches("1.1.0"));
    }

    #[test]
    fn exact_is_string_equality() {
        let exact = constraint("1.2.0");
        assert_eq!(exact.mode(), "exact");
        assert!(exact.matches("1.2.0"));
        assert!(!exact.matches("1.2.1"));
        assert!(!exact.matches("1.2"));
    }

    #[test]
    fn dash_takes_precedence_over_other_operators() {
        assert!(matches!(
            VersionConstraint::parse("^1.0.0-2.0.0"),
            Err(PkgRateError::MalformedInput(_))
        ));
        assert_eq!(constraint("1.0-2").mode(), "bounded");
    }

    #[test]
    fn malformed_specifiers_are_rejected() {
        for specifier in ["1.x-2.0.0", "1.0.0-", "^banana", "~"] {
            assert!(
                matches!(
                    VersionConstraint::parse(specifier),
                    Err(PkgRateError::MalformedInput(_))
                ),
                "{specifier}"
            );
        }
    }

    #[test]
    fn malformed_stored_versions_never_match_ranges() {
        assert!(!constraint("^1.0.0").matches("not-a-version"));
        assert!(!constraint("~1.0.0").matches(""));
        assert!(!constraint("1.0.0-3.0.0").matches("two"));
    }

    #[test]
    fn lenient_versions_fill_missing_components() {
        assert_eq!(parse_lenient_version("1.2"), Some(Version::new(1, 2, 0)));
        assert_eq!(parse_lenient_version("v3"), Some(Version::new(3, 0, 0)));
        assert_eq!(parse_lenient_version("1.2.3"), Some(Version::new(1, 2, 3)));
        assert_eq!(parse_lenient_version("1.2.3.4"), None);
        assert_eq!(parse_lenient_version("1..2"), None);
        assert_eq!(parse_lenient_version(""), None);
    }

    #[test]
    fn parses_through_from_str_and_displays() {
        let range: VersionConstraint = "1.0.0-2.0.0".parse().expect("range");
        assert_eq!(range.to_string(), "1.0.0-2.0.0");
        assert_eq!(constraint("1.4.2").to_string(), "1.4.2");
    }
}
