//! `package.json` decoding and uploaded-archive introspection.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::error::{PkgRateError, Result};

/// Manifest file name.
pub const MANIFEST_FILE: &str = "package.json";

/// `repository` field of a manifest: a bare URL or an object with one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RepositoryField {
    /// `"repository": "https://github.com/o/r"`
    Url(String),
    /// `"repository": {"type": "git", "url": "..."}`
    Object {
        /// Repository URL.
        #[serde(default)]
        url: String,
    },
}

impl RepositoryField {
    /// The URL, whichever form was used.
    pub fn url(&self) -> &str {
        match self {
            RepositoryField::Url(url) => url,
            RepositoryField::Object { url } => url,
        }
    }
}

/// The subset of `package.json` the registry reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Package name.
    #[serde(default)]
    pub name: String,
    /// Package version.
    #[serde(default)]
    pub version: String,
    /// Source repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryField>,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    /// Runtime dependencies, name to version specifier.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    /// Decode a manifest body.
    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Source repository URL, falling back to a GitHub homepage.
    pub fn repository_url(&self) -> Option<String> {
        self.repository
            .as_ref()
            .map(|field| field.url().trim().to_string())
            .filter(|url| !url.is_empty())
            .or_else(|| {
                self.homepage
                    .as_ref()
                    .filter(|homepage| homepage.contains("github.com"))
                    .cloned()
            })
    }
}

/// README file names recognized inside an upload, compared ignoring case.
pub const ARCHIVE_README_NAMES: [&str; 4] = ["readme.md", "readme.markdown", "readme", "readme.txt"];

/// Decode a base64 zip upload and return its shallowest `package.json`.
pub fn manifest_from_archive(content: &str) -> Result<PackageManifest> {
    let mut archive = open_archive(content)?;
    let index = candidates(&mut archive, |file_name| file_name == MANIFEST_FILE)?
        .into_iter()
        .next()
        .ok_or_else(|| {
            PkgRateError::MalformedInput(format!("archive contains no {MANIFEST_FILE}"))
        })?;
    let body = String::from_utf8(read_entry(&mut archive, index)?).map_err(|err| {
        PkgRateError::MalformedInput(format!("{MANIFEST_FILE} is not UTF-8 text: {err}"))
    })?;
    PackageManifest::from_json(&body)
}

/// Decode a base64 zip upload and return its shallowest README text, if
/// any. Entries that are not UTF-8 are skipped.
pub fn readme_from_archive(content: &str) -> Result<Option<String>> {
    let mut archive = open_archive(content)?;
    let found = candidates(&mut archive, |file_name| {
        let lowered = file_name.to_ascii_lowercase();
        ARCHIVE_README_NAMES.contains(&lowered.as_str())
    })?;
    for index in found {
        match String::from_utf8(read_entry(&mut archive, index)?) {
            Ok(body) => return Ok(Some(body)),
            Err(err) => debug!("skipping archive entry {index} as README: {err}"),
        }
    }
    Ok(None)
}

fn open_archive(content: &str) -> Result<ZipArchive<Cursor<Vec<u8>>>> {
    let bytes = STANDARD
        .decode(content.trim())
        .map_err(|err| PkgRateError::MalformedInput(format!("package content is not base64: {err}")))?;
    ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| PkgRateError::MalformedInput(format!("package content is not a zip archive: {err}")))
}

fn unreadable(err: impl std::fmt::Display) -> PkgRateError {
    PkgRateError::MalformedInput(format!("unreadable archive entry: {err}"))
}

/// Indices of files whose name satisfies `wanted`, shallowest first.
fn candidates<F>(archive: &mut ZipArchive<Cursor<Vec<u8>>>, wanted: F) -> Result<Vec<usize>>
where
    F: Fn(&str) -> bool,
{
    let mut found: Vec<(usize, usize)> = Vec::new();
    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(unreadable)?;
        if entry.is_dir() {
            continue;
        }
        let path = entry.name().trim_end_matches('/');
        let file_name = path.rsplit('/').next().unwrap_or(path);
        if wanted(file_name) {
            found.push((path.matches('/').count(), index));
        }
    }
    found.sort_unstable();
    Ok(found.into_iter().map(|(_, index)| index).collect())
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, index: usize) -> Result<Vec<u8>> {
    let mut entry = archive.by_index(index).map_err(unreadable)?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).map_err(unreadable)?;
    Ok(bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    /// Base64 zip with the given `(path, bytes)` entries.
    fn encoded_binary_archive(entries: &[(&str, &[u8])]) -> String {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, body) in entries {
            writer
                .start_file(*path, FileOptions::default())
                .expect("start entry");
            writer.write_all(body).expect("write entry");
        }
        let cursor = writer.finish().expect("finish archive");
        STANDARD.encode(cursor.into_inner())
    }

    /// Base64 zip with the given `(path, body)` entries.
    pub(crate) fn encoded_archive(entries: &[(&str, &str)]) -> String {
        let entries: Vec<(&str, &[u8])> = entries
            .iter()
            .map(|(path, body)| (*path, body.as_bytes()))
            .collect();
        encoded_binary_archive(&entries)
    }

    #[test]
    fn repository_accepts_string_and_object_forms() {
        let plain = PackageManifest::from_json(
            r#"{"name": "left-pad", "version": "1.3.0", "repository": "https://github.com/stevemao/left-pad"}"#,
        )
        .expect("manifest");
        assert_eq!(
            plain.repository_url().as_deref(),
            Some("https://github.com/stevemao/left-pad")
        );
        let object = PackageManifest::from_json(
            r#"{"name": "express", "repository": {"type": "git", "url": "git+https://github.com/expressjs/express.git"}}"#,
        )
        .expect("manifest");
        assert_eq!(
            object.repository_url().as_deref(),
            Some("git+https://github.com/expressjs/express.git")
        );
        assert!(object.dependencies.is_empty());
    }

    #[test]
    fn homepage_fills_in_for_missing_repository() {
        let manifest = PackageManifest::from_json(
            r#"{"name": "a", "homepage": "https://github.com/acme/a#readme"}"#,
        )
        .expect("manifest");
        assert_eq!(
            manifest.repository_url().as_deref(),
            Some("https://github.com/acme/a#readme")
        );
        let elsewhere =
            PackageManifest::from_json(r#"{"homepage": "https://acme.dev"}"#).expect("manifest");
        assert!(elsewhere.repository_url().is_none());
    }

    #[test]
    fn reads_the_shallowest_manifest() {
        let archive = encoded_archive(&[
            ("widget/node_modules/dep/package.json", r#"{"name": "dep"}"#),
            (
                "widget/package.json",
                r#"{"name": "widget", "version": "2.1.0", "dependencies": {"dep": "1.0.0"}}"#,
            ),
            ("widget/README.md", "# Widget"),
        ]);
        let manifest = manifest_from_archive(&archive).expect("manifest");
        assert_eq!(manifest.name, "widget");
        assert_eq!(manifest.version, "2.1.0");
        assert_eq!(manifest.dependencies.get("dep").map(String::as_str), Some("1.0.0"));
        assert_eq!(
            readme_from_archive(&archive).expect("readme").as_deref(),
            Some("# Widget")
        );
    }

    #[test]
    fn rejects_bad_uploads() {
        assert!(matches!(
            manifest_from_archive("%%% not base64 %%%"),
            Err(PkgRateError::MalformedInput(_))
        ));
        assert!(matches!(
            manifest_from_archive(&STANDARD.encode(b"plain text")),
            Err(PkgRateError::MalformedInput(_))
        ));
        let no_manifest = encoded_archive(&[("src/index.js", "module.exports = 1;")]);
        assert!(matches!(
            manifest_from_archive(&no_manifest),
            Err(PkgRateError::MalformedInput(_))
        ));
        assert_eq!(readme_from_archive(&no_manifest).expect("readme"), None);
    }

    #[test]
    fn readme_ignores_binary_and_non_text_names() {
        let png: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0xFF, 0xFE];
        let archive = encoded_binary_archive(&[
            ("widget/package.json", &br#"{"name": "widget", "version": "1.0.0"}"#[..]),
            ("widget/README.md", &b"# Widget"[..]),
            ("readme-banner.png", png),
        ]);
        assert_eq!(manifest_from_archive(&archive).expect("manifest").name, "widget");
        assert_eq!(
            readme_from_archive(&archive).expect("readme").as_deref(),
            Some("# Widget")
        );
    }

    #[test]
    fn undecodable_readme_is_skipped_for_a_deeper_one() {
        let archive = encoded_binary_archive(&[
            ("README", &[0xFFu8, 0xFE, 0x00][..]),
            ("docs/readme.txt", &b"plain notes"[..]),
        ]);
        assert_eq!(
            readme_from_archive(&archive).expect("readme").as_deref(),
            Some("plain notes")
        );
        let only_binary = encoded_binary_archive(&[("README.md", &[0xC3u8, 0x28][..])]);
        assert_eq!(readme_from_archive(&only_binary).expect("readme"), None);
    }
}
