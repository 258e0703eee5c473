//! License compatibility checks.

use regex::{RegexSet, RegexSetBuilder};

use crate::error::{PkgRateError, Result};

/// Decides whether a piece of license or README text names an accepted
/// license.
pub trait LicenseMatcher: Send + Sync {
    /// Returns true when `text` names an accepted license.
    fn matches(&self, text: &str) -> bool;
}

/// Allow-list of case-insensitive license patterns.
#[derive(Debug, Clone)]
pub struct AllowListMatcher {
    patterns: RegexSet,
}

impl AllowListMatcher {
    /// Compile an allow-list. Invalid patterns are reported, not skipped.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()
            .map_err(|err| PkgRateError::MalformedInput(format!("license allow-list: {err}")))?;
        Ok(Self { patterns })
    }

    /// Number of compiled patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the allow-list is empty.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl LicenseMatcher for AllowListMatcher {
    fn matches(&self, text: &str) -> bool {
        self.patterns.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::PERMISSIVE_LICENSE_PATTERNS;

    fn default_matcher() -> AllowListMatcher {
        AllowListMatcher::new(PERMISSIVE_LICENSE_PATTERNS).expect("allow-list compiles")
    }

    #[test]
    fn accepts_structured_license_keys() {
        let matcher = default_matcher();
        for key in [
            "mit",
            "MIT",
            "apache-2.0",
            "Apache License 2.0",
            "bsd-3-clause",
            "BSD-2-Clause",
            "isc",
            "zlib",
            "bsl-1.0",
            "unlicense",
            "cecill-2.1",
            "Artistic-2.0",
        ] {
            assert!(matcher.matches(key), "expected {key} to be accepted");
        }
    }

    #[test]
    fn rejects_copyleft_and_unrelated_text() {
        let matcher = default_matcher();
        for key in ["gpl-3.0", "agpl-3.0", "proprietary", "commit often", "submit"] {
            assert!(!matcher.matches(key), "expected {key} to be rejected");
        }
    }

    #[test]
    fn finds_license_names_inside_readme_text() {
        let matcher = default_matcher();
        let readme = "# Widget\n\n## License\n\nReleased under the Apache License, Version 2.0.";
        assert!(matcher.matches(readme));
    }

    #[test]
    fn reports_invalid_patterns() {
        assert!(AllowListMatcher::new(["(unclosed"]).is_err());
        let matcher = AllowListMatcher::new(Vec::<String>::new()).expect("empty");
        assert!(matcher.is_empty());
        assert!(!matcher.matches("MIT"));
    }
}
