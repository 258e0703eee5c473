//! Version-query resolution over the stored package corpus.

use std::cmp::Ordering;
use std::collections::HashSet;

use log::{debug, warn};
use regex::RegexBuilder;

use crate::domain::{Metadata, PackageQuery};
use crate::error::{PkgRateError, Result};
use crate::version::{VersionConstraint, parse_lenient_version};

/// Packages returned per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Query name that enumerates the whole corpus.
pub const WILDCARD: &str = "*";

const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// One stored package as seen by the resolver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusEntry {
    /// Stored metadata.
    pub metadata: Metadata,
    /// README text captured at ingestion, when there was one.
    pub readme: Option<String>,
}

impl CorpusEntry {
    /// Entry without README text.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            readme: None,
        }
    }
}

/// Read access to the stored packages.
///
/// A snapshot may miss packages created while it is taken; callers treat the
/// scan as eventually consistent.
#[cfg_attr(test, mockall::automock)]
pub trait PackageCorpus: Send + Sync {
    /// Every stored package, in storage order.
    fn snapshot(&self) -> Vec<CorpusEntry>;
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    /// Matching packages on the requested page.
    pub packages: Vec<Metadata>,
    /// Offset the caller should request next. Stays put past the last page.
    pub next_offset: u32,
}

/// Resolves `(name, specifier)` queries with 1-based page offsets.
#[derive(Debug, Clone, Copy)]
pub struct QueryResolver {
    page_size: usize,
}

impl Default for QueryResolver {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl QueryResolver {
    /// Resolver with the given page size (at least 1).
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Packages per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Resolve `queries` against `corpus` and return page `offset`.
    pub fn resolve(
        &self,
        corpus: &dyn PackageCorpus,
        queries: &[PackageQuery],
        offset: u32,
    ) -> Result<QueryPage> {
        if queries.is_empty() {
            return Err(PkgRateError::MalformedInput(
                "at least one package query is required".to_string(),
            ));
        }
        let offset = offset.max(1);
        let entries = corpus.snapshot();
        let matched = if is_enumeration(queries) {
            enumerate_all(entries)
        } else {
            union_of_matches(&entries, queries)
        };
        let start = (offset as usize - 1).saturating_mul(self.page_size);
        let packages: Vec<Metadata> = matched
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect();
        let next_offset = if packages.is_empty() {
            offset
        } else {
            offset.saturating_add(1)
        };
        debug!(
            "resolved {} queries: {} packages on page {offset}",
            queries.len(),
            packages.len()
        );
        Ok(QueryPage {
            packages,
            next_offset,
        })
    }
}

fn is_enumeration(queries: &[PackageQuery]) -> bool {
    matches!(queries, [only] if only.name == WILDCARD)
}

fn enumerate_all(entries: Vec<CorpusEntry>) -> Vec<Metadata> {
    let mut all: Vec<Metadata> = entries.into_iter().map(|entry| entry.metadata).collect();
    all.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| compare_versions(&a.version, &b.version))
    });
    all
}

/// Parseable versions in semantic order, then the rest in text order.
fn compare_versions(left: &str, right: &str) -> Ordering {
    match (parse_lenient_version(left), parse_lenient_version(right)) {
        (Some(left_version), Some(right_version)) => left_version
            .cmp(&right_version)
            .then_with(|| left.cmp(right)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => left.cmp(right),
    }
}

fn union_of_matches(entries: &[CorpusEntry], queries: &[PackageQuery]) -> Vec<Metadata> {
    let mut seen = HashSet::new();
    let mut matched = Vec::new();
    for query in queries {
        let constraint = match VersionConstraint::parse(&query.version) {
            Ok(constraint) => constraint,
            Err(err) => {
                warn!("skipping query for {}: {err}", query.name);
                continue;
            }
        };
        for entry in entries {
            let metadata = &entry.metadata;
            if metadata.name != query.name || !constraint.matches(&metadata.version) {
                continue;
            }
            let identity = if metadata.id.is_empty() {
                format!("{}@{}", metadata.name, metadata.version)
            } else {
                metadata.id.clone()
            };
            if seen.insert(identity) {
                matched.push(metadata.clone());
            }
        }
    }
    matched
}

/// Packages whose name or README matches `pattern`.
pub fn search_by_regex(entries: &[CorpusEntry], pattern: &str) -> Result<Vec<PackageQuery>> {
    let regex = RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|err| PkgRateError::MalformedInput(format!("invalid regular expression: {err}")))?;
    let found: Vec<PackageQuery> = entries
        .iter()
        .filter(|entry| {
            regex.is_match(&entry.metadata.name)
                || entry
                    .readme
                    .as_deref()
                    .is_some_and(|readme| regex.is_match(readme))
        })
        .map(|entry| PackageQuery::new(&entry.metadata.name, &entry.metadata.version))
        .collect();
    if found.is_empty() {
        return Err(PkgRateError::NotFound(format!(
            "no package matches `{pattern}`"
        )));
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCorpus(Vec<CorpusEntry>);

    impl PackageCorpus for FixedCorpus {
        fn snapshot(&self) -> Vec<CorpusEntry> {
            self.0.clone()
        }
    }

    fn entry(name: &str, version: &str, id: &str) -> CorpusEntry {
        CorpusEntry::new(Metadata {
            name: name.to_string(),
            version: version.to_string(),
            id: id.to_string(),
            repository: String::new(),
        })
    }

    fn corpus() -> FixedCorpus {
        FixedCorpus(vec![
            entry("zeta", "1.0.0", "z1"),
            entry("alpha", "1.2.0", "a1"),
            entry("alpha", "1.5.0", "a2"),
            entry("alpha", "2.0.0", "a3"),
            entry("beta", "0.3.1", "b1"),
        ])
    }

    fn names(page: &QueryPage) -> Vec<(String, String)> {
        page.packages
            .iter()
            .map(|m| (m.name.clone(), m.version.clone()))
            .collect()
    }

    #[test]
    fn wildcard_lists_everything_by_name() {
        let page = QueryResolver::default()
            .resolve(&corpus(), &[PackageQuery::new("*", "")], 1)
            .expect("page");
        let listed: Vec<String> = page.packages.iter().map(|m| m.name.clone()).collect();
        assert_eq!(listed, vec!["alpha", "alpha", "alpha", "beta", "zeta"]);
        assert_eq!(page.next_offset, 2);
    }

    #[test]
    fn wildcard_orders_versions_numerically() {
        let corpus = FixedCorpus(vec![
            entry("gamma", "10.0.0", "g3"),
            entry("gamma", "9.0.0", "g2"),
            entry("gamma", "v1.2", "g1"),
            entry("gamma", "next", "g4"),
        ]);
        let page = QueryResolver::new(10)
            .resolve(&corpus, &[PackageQuery::new("*", "")], 1)
            .expect("page");
        let versions: Vec<String> = page.packages.iter().map(|m| m.version.clone()).collect();
        assert_eq!(versions, vec!["v1.2", "9.0.0", "10.0.0", "next"]);
    }

    #[test]
    fn wildcard_ignores_the_version_field() {
        let resolver = QueryResolver::default();
        let with_version = resolver
            .resolve(&corpus(), &[PackageQuery::new("*", "^9.0.0")], 1)
            .expect("page");
        let without = resolver
            .resolve(&corpus(), &[PackageQuery::new("*", "")], 1)
            .expect("page");
        assert_eq!(with_version, without);
    }

    #[test]
    fn queries_are_a_union_without_duplicates() {
        let queries = [
            PackageQuery::new("alpha", "^1.0.0"),
            PackageQuery::new("beta", "0.3.1"),
            PackageQuery::new("alpha", "1.5.0"),
        ];
        let page = QueryResolver::default()
            .resolve(&corpus(), &queries, 1)
            .expect("page");
        assert_eq!(
            names(&page),
            vec![
                ("alpha".to_string(), "1.2.0".to_string()),
                ("alpha".to_string(), "1.5.0".to_string()),
                ("beta".to_string(), "0.3.1".to_string()),
            ]
        );
    }

    #[test]
    fn bounded_queries_exclude_endpoints() {
        let page = QueryResolver::default()
            .resolve(&corpus(), &[PackageQuery::new("alpha", "1.2.0-2.0.0")], 1)
            .expect("page");
        assert_eq!(
            names(&page),
            vec![("alpha".to_string(), "1.5.0".to_string())]
        );
    }

    #[test]
    fn pages_advance_and_stop_at_the_end() {
        let resolver = QueryResolver::new(2);
        let query = [PackageQuery::new("alpha", "^1.0.0 || 2.0.0")];
        // `||` is not a supported operator; the query matches nothing.
        let empty = resolver.resolve(&corpus(), &query, 1).expect("page");
        assert!(empty.packages.is_empty());
        assert_eq!(empty.next_offset, 1);

        let all = [PackageQuery::new("*", "")];
        let first = resolver.resolve(&corpus(), &all, 1).expect("page");
        assert_eq!(first.packages.len(), 2);
        assert_eq!(first.next_offset, 2);
        let third = resolver.resolve(&corpus(), &all, 3).expect("page");
        assert_eq!(third.packages.len(), 1);
        assert_eq!(third.next_offset, 4);
        let past_end = resolver.resolve(&corpus(), &all, 4).expect("page");
        assert!(past_end.packages.is_empty());
        assert_eq!(past_end.next_offset, 4);
    }

    #[test]
    fn offset_zero_reads_as_first_page() {
        let page = QueryResolver::new(1)
            .resolve(&corpus(), &[PackageQuery::new("*", "")], 0)
            .expect("page");
        assert_eq!(page.packages[0].name, "alpha");
        assert_eq!(page.next_offset, 2);
    }

    #[test]
    fn malformed_specifier_skips_only_that_query() {
        let queries = [
            PackageQuery::new("alpha", "^not.a.version"),
            PackageQuery::new("zeta", "1.0.0"),
        ];
        let page = QueryResolver::default()
            .resolve(&corpus(), &queries, 1)
            .expect("page");
        assert_eq!(names(&page), vec![("zeta".to_string(), "1.0.0".to_string())]);
    }

    #[test]
    fn empty_query_list_is_malformed() {
        let mut corpus = MockPackageCorpus::new();
        corpus.expect_snapshot().never();
        assert!(matches!(
            QueryResolver::default().resolve(&corpus, &[], 1),
            Err(PkgRateError::MalformedInput(_))
        ));
    }

    #[test]
    fn resolver_reads_one_snapshot_per_call() {
        let mut corpus = MockPackageCorpus::new();
        corpus
            .expect_snapshot()
            .times(1)
            .returning(|| vec![entry("gamma", "3.1.4", "g1")]);
        let page = QueryResolver::default()
            .resolve(&corpus, &[PackageQuery::new("gamma", "~3.1.0")], 1)
            .expect("page");
        assert_eq!(page.packages.len(), 1);
    }

    #[test]
    fn regex_matches_names_and_readmes() {
        let mut entries = corpus().0;
        entries[4].readme = Some("A tiny HTTP client".to_string());
        let found = search_by_regex(&entries, "^zet").expect("matches");
        assert_eq!(found, vec![PackageQuery::new("zeta", "1.0.0")]);
        let by_readme = search_by_regex(&entries, "(?i)http").expect("matches");
        assert_eq!(by_readme, vec![PackageQuery::new("beta", "0.3.1")]);
    }

    #[test]
    fn regex_errors_are_classified() {
        let entries = corpus().0;
        assert!(matches!(
            search_by_regex(&entries, "(unclosed"),
            Err(PkgRateError::MalformedInput(_))
        ));
        assert!(matches!(
            search_by_regex(&entries, "^nothing$"),
            Err(PkgRateError::NotFound(_))
        ));
    }
}
