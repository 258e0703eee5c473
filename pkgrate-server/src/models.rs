//! Request and response payloads for the registry API.

use pkgrate_core::{MAX_REVIEW_STARS, Metadata, PkgRateError, Result, Review};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

/// Package payload: either an encoded archive or a repository URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PackageData {
    /// Base64-encoded zip archive of the package.
    #[serde(rename = "Content", default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Repository or npm page URL.
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Install-time script shipped with the package.
    #[serde(rename = "JSProgram", default, skip_serializing_if = "Option::is_none")]
    pub js_program: Option<String>,
}

/// Where a submitted package comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageSource<'a> {
    /// Base64 zip archive.
    Content(&'a str),
    /// Repository URL to be rated.
    Url(&'a str),
}

impl PackageData {
    /// The single source carried by this payload.
    pub fn source(&self) -> Result<PackageSource<'_>> {
        let content = non_blank(self.content.as_deref());
        let url = non_blank(self.url.as_deref());
        match (content, url) {
            (Some(content), None) => Ok(PackageSource::Content(content)),
            (None, Some(url)) => Ok(PackageSource::Url(url)),
            (Some(_), Some(_)) => Err(PkgRateError::MalformedInput(
                "provide either Content or URL, not both".to_string(),
            )),
            (None, None) => Err(PkgRateError::MalformedInput(
                "one of Content or URL is required".to_string(),
            )),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// A stored package as exchanged with clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PackageInfo {
    /// Package identity.
    pub metadata: Metadata,
    /// Package payload.
    pub data: PackageData,
}

/// Body of a regex search.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegexRequest {
    /// Pattern matched against package names and READMEs.
    #[serde(rename = "RegEx")]
    pub regex: String,
}

/// Popularity of one package.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PopularityResponse {
    /// Package name.
    #[serde(rename = "Name")]
    pub name: String,
    /// Score in `[0, 10]`.
    #[serde(rename = "Popularity")]
    pub popularity: f64,
}

/// Body of a review submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    /// Reviewer.
    pub user_name: String,
    /// Reviewed package.
    pub package_name: String,
    /// Rating between 0 and 5, as a number or a numeric string.
    #[serde(deserialize_with = "stars_from_number_or_text")]
    pub stars: i64,
    /// Free-text review.
    #[serde(default)]
    pub review: String,
}

impl ReviewRequest {
    /// Validate into a stored review.
    pub fn into_review(self) -> Result<Review> {
        let stars = u8::try_from(self.stars)
            .ok()
            .filter(|stars| *stars <= MAX_REVIEW_STARS)
            .ok_or_else(|| {
                PkgRateError::MalformedInput(format!(
                    "stars must be between 0 and {MAX_REVIEW_STARS}, got {}",
                    self.stars
                ))
            })?;
        Review::new(self.user_name, self.package_name, stars, self.review)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StarsInput {
    Number(i64),
    Text(String),
}

fn stars_from_number_or_text<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match StarsInput::deserialize(deserializer)? {
        StarsInput::Number(stars) => Ok(stars),
        StarsInput::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("stars is not a number: {text}"))),
    }
}

/// Identifies one review.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewKey {
    /// Reviewer.
    pub user_name: String,
    /// Reviewed package.
    pub package_name: String,
}

/// Query-string parameters of the package listing.
#[derive(Debug, Deserialize)]
pub struct OffsetParams {
    /// 1-based page number.
    pub offset: Option<String>,
}

impl OffsetParams {
    /// Requested page; absent or unparseable values mean the first page.
    pub fn page(&self) -> u32 {
        self.offset
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(1)
    }
}
