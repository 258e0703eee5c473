//! npm package pages and registry documents.

use serde::Deserialize;

use crate::error::{PkgRateError, Result};
use crate::manifest::RepositoryField;

/// Package name from an `npmjs.com/package/<name>` page URL. Scoped names
/// keep their scope; trailing `/v/<version>` segments are dropped.
pub fn package_name_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("npmjs.com/package/")?;
    let rest = rest.split(['?', '#']).next().unwrap_or(rest);
    let mut segments = rest.split('/').filter(|segment| !segment.is_empty());
    let first = segments.next()?;
    if first.starts_with('@') {
        let name = segments.next()?;
        return Some(format!("{first}/{name}"));
    }
    Some(first.to_string())
}

/// Registry path segment for a package; scoped names escape their slash.
pub fn registry_path(package: &str) -> String {
    package.replacen('/', "%2f", 1)
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    repository: Option<RepositoryField>,
    #[serde(default)]
    homepage: Option<String>,
}

/// Source repository URL recorded in a registry document.
pub fn repository_from_document(package: &str, body: &str) -> Result<String> {
    let document: RegistryDocument = serde_json::from_str(body).map_err(|err| {
        PkgRateError::UpstreamUnavailable(format!("npm registry document for {package}: {err}"))
    })?;
    document
        .repository
        .as_ref()
        .map(|field| field.url().trim().to_string())
        .filter(|url| !url.is_empty())
        .or(document.homepage.filter(|homepage| homepage.contains("github.com")))
        .ok_or_else(|| {
            PkgRateError::MalformedInput(format!("npm package {package} declares no repository"))
        })
}
