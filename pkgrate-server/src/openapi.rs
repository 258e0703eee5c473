//! OpenAPI specification for the pkgrate server.

use utoipa::OpenApi;

use pkgrate_core::{ActionEntry, ActionKind, Metadata, Metric, PackageQuery, Review};

use crate::models::{
    PackageData, PackageInfo, PopularityResponse, RegexRequest, ReviewKey, ReviewRequest,
};
use crate::routes::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::create_package,
        crate::routes::download_package,
        crate::routes::update_package,
        crate::routes::delete_package,
        crate::routes::rate_package,
        crate::routes::package_history,
        crate::routes::delete_package_by_name,
        crate::routes::search_packages,
        crate::routes::list_packages,
        crate::routes::package_popularity,
        crate::routes::create_review,
        crate::routes::delete_review,
        crate::routes::reset_registry,
        crate::routes::openapi_json
    ),
    components(
        schemas(
            PackageData,
            PackageInfo,
            Metadata,
            Metric,
            PackageQuery,
            ActionEntry,
            ActionKind,
            Review,
            ReviewRequest,
            ReviewKey,
            RegexRequest,
            PopularityResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "package", description = "Package registry"),
        (name = "popularity", description = "Popularity scoring"),
        (name = "review", description = "User reviews"),
        (name = "system", description = "System endpoints")
    )
)]
/// OpenAPI specification for the pkgrate server.
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::ApiDoc;
    use utoipa::OpenApi;

    #[test]
    fn openapi_includes_expected_paths() {
        let doc = ApiDoc::openapi();
        let paths = doc.paths.paths;

        assert!(paths.contains_key("/package"));
        assert!(paths.contains_key("/package/{id}"));
        assert!(paths.contains_key("/package/{id}/rate"));
        assert!(paths.contains_key("/package/byName/{name}"));
        assert!(paths.contains_key("/package/byRegEx"));
        assert!(paths.contains_key("/packages"));
        assert!(paths.contains_key("/popularity/{name}"));
        assert!(paths.contains_key("/review"));
        assert!(paths.contains_key("/reset"));
        assert!(paths.contains_key("/openapi.json"));
    }
}
