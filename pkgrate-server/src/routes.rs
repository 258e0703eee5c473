//! HTTP handlers for the pkgrate registry.

use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use log::{debug, info, warn};
use pkgrate_core::manifest::MANIFEST_FILE;
use pkgrate_core::{
    ActionEntry, ActionKind, Assessment, Metadata, Metric, PackageCorpus, PackageQuery,
    PkgRateError, PopularityScorer, PopularityWeights, QueryResolver, Rater, RepositoryHost, Result,
    Review, manifest_from_archive, readme_from_archive, search_by_regex,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::models::{
    OffsetParams, PackageData, PackageInfo, PackageSource, PopularityResponse, RegexRequest,
    ReviewKey, ReviewRequest,
};
use crate::openapi::ApiDoc;
use crate::store::RegistryStore;

/// Response header carrying the next page number of a listing.
pub const OFFSET_HEADER: &str = "offset";

#[derive(Clone)]
/// Shared application state for handlers.
pub struct AppState {
    /// Packages, audit history and reviews.
    pub store: RegistryStore,
    /// Scores repositories against the upstream host.
    pub rater: Rater<dyn RepositoryHost>,
    /// Paginated version-specifier search.
    pub resolver: QueryResolver,
    /// Popularity blend.
    pub popularity: PopularityWeights,
}

/// Error response payload.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub message: String,
}

fn error_response(err: PkgRateError) -> HttpResponse {
    let message = err.to_string();
    match err {
        PkgRateError::IngestionRejected(metric) => HttpResponse::FailedDependency().json(*metric),
        PkgRateError::MalformedInput(_) => HttpResponse::BadRequest().json(ErrorResponse { message }),
        PkgRateError::NotFound(_) => HttpResponse::NotFound().json(ErrorResponse { message }),
        PkgRateError::Conflict(_) => HttpResponse::Conflict().json(ErrorResponse { message }),
        PkgRateError::UpstreamRateLimited(_) => {
            warn!("{message}");
            HttpResponse::TooManyRequests().json(ErrorResponse { message })
        }
        PkgRateError::UpstreamUnavailable(_) => {
            warn!("{message}");
            HttpResponse::BadGateway().json(ErrorResponse { message })
        }
        PkgRateError::Io(_) => {
            warn!("{message}");
            HttpResponse::InternalServerError().json(ErrorResponse { message })
        }
    }
}

fn metadata_from_assessment(assessment: Assessment) -> Result<(Metadata, Option<String>)> {
    let Assessment { repo, signals, .. } = assessment;
    let manifest = signals.manifest.ok_or_else(|| {
        PkgRateError::MalformedInput(format!("{repo} has no readable {MANIFEST_FILE}"))
    })?;
    let metadata = Metadata {
        name: manifest.name,
        version: manifest.version,
        id: String::new(),
        repository: repo.url(),
    };
    Ok((metadata, signals.readme))
}

fn metadata_from_archive(content: &str) -> Result<(Metadata, Option<String>)> {
    let manifest = manifest_from_archive(content)?;
    let readme = readme_from_archive(content)?;
    let repository = manifest.repository_url().unwrap_or_default();
    let metadata = Metadata {
        name: manifest.name,
        version: manifest.version,
        id: String::new(),
        repository,
    };
    Ok((metadata, readme))
}

async fn ingest(state: &AppState, data: PackageData) -> Result<PackageInfo> {
    let (metadata, readme) = match data.source()? {
        PackageSource::Url(url) => {
            let assessment = state.rater.assess_for_ingestion(url).await?;
            debug!(
                "{url} passed ingestion with net score {}",
                assessment.metric.net_score
            );
            metadata_from_assessment(assessment)?
        }
        PackageSource::Content(content) => metadata_from_archive(content)?,
    };
    let metadata = state.store.create(metadata, data.clone(), readme)?;
    Ok(PackageInfo { metadata, data })
}

#[utoipa::path(
    post,
    path = "/package",
    request_body = PackageData,
    responses(
        (status = 201, description = "Package stored", body = PackageInfo),
        (status = 400, description = "Invalid submission", body = ErrorResponse),
        (status = 409, description = "Package already exists", body = ErrorResponse),
        (status = 424, description = "Package failed the ingestion gate", body = Metric),
        (status = 429, description = "Upstream rate limit hit", body = ErrorResponse),
        (status = 502, description = "Upstream unavailable", body = ErrorResponse)
    ),
    tag = "package"
)]
#[post("/package")]
/// Upload an archive or ingest a repository URL.
pub async fn create_package(
    state: web::Data<AppState>,
    payload: web::Json<PackageData>,
) -> impl Responder {
    match ingest(&state, payload.into_inner()).await {
        Ok(info) => HttpResponse::Created().json(info),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    get,
    path = "/package/{id}",
    params(
        ("id" = String, Path, description = "Package identifier")
    ),
    responses(
        (status = 200, description = "Package", body = PackageInfo),
        (status = 404, description = "Package not found", body = ErrorResponse)
    ),
    tag = "package"
)]
#[get("/package/{id}")]
/// Download a package.
pub async fn download_package(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    match state.store.download(&path.into_inner()) {
        Ok(package) => HttpResponse::Ok().json(package.info()),
        Err(err) => error_response(err),
    }
}

fn apply_update(state: &AppState, id: &str, info: PackageInfo) -> Result<PackageInfo> {
    let PackageInfo { metadata, data } = info;
    let (repository, readme) = match data.source()? {
        PackageSource::Url(url) => (url.to_string(), None),
        PackageSource::Content(content) => {
            let manifest = manifest_from_archive(content)?;
            (
                manifest.repository_url().unwrap_or_default(),
                readme_from_archive(content)?,
            )
        }
    };
    let metadata = state
        .store
        .update(id, &metadata, data.clone(), readme, repository)?;
    info!("updated {}@{}", metadata.name, metadata.version);
    Ok(PackageInfo { metadata, data })
}

#[utoipa::path(
    put,
    path = "/package/{id}",
    params(
        ("id" = String, Path, description = "Package identifier")
    ),
    request_body = PackageInfo,
    responses(
        (status = 200, description = "Package updated", body = PackageInfo),
        (status = 400, description = "Invalid submission", body = ErrorResponse),
        (status = 404, description = "No package with this identity", body = ErrorResponse)
    ),
    tag = "package"
)]
#[put("/package/{id}")]
/// Replace the contents of a package version.
pub async fn update_package(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<PackageInfo>,
) -> impl Responder {
    match apply_update(&state, &path.into_inner(), payload.into_inner()) {
        Ok(info) => HttpResponse::Ok().json(info),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    delete,
    path = "/package/{id}",
    params(
        ("id" = String, Path, description = "Package identifier")
    ),
    responses(
        (status = 200, description = "Package deleted"),
        (status = 404, description = "Package not found", body = ErrorResponse)
    ),
    tag = "package"
)]
#[delete("/package/{id}")]
/// Delete one package version.
pub async fn delete_package(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    match state.store.delete(&path.into_inner()) {
        Ok(metadata) => {
            info!("deleted {}@{}", metadata.name, metadata.version);
            HttpResponse::Ok().finish()
        }
        Err(err) => error_response(err),
    }
}

async fn rate_stored(state: &AppState, id: &str) -> Result<Metric> {
    let package = state.store.get(id)?;
    let target = if package.metadata.repository.is_empty() {
        package.data.url.clone().unwrap_or_default()
    } else {
        package.metadata.repository.clone()
    };
    if target.trim().is_empty() {
        return Err(PkgRateError::MalformedInput(format!(
            "package {id} has no repository to rate"
        )));
    }
    let metric = state.rater.rate(&target).await?;
    state.store.record(ActionKind::Rate, &package.metadata)?;
    Ok(metric)
}

#[utoipa::path(
    get,
    path = "/package/{id}/rate",
    params(
        ("id" = String, Path, description = "Package identifier")
    ),
    responses(
        (status = 200, description = "Quality metric; zero fields omitted", body = Metric),
        (status = 404, description = "Package not found", body = ErrorResponse),
        (status = 429, description = "Upstream rate limit hit", body = ErrorResponse),
        (status = 502, description = "Upstream unavailable", body = ErrorResponse)
    ),
    tag = "package"
)]
#[get("/package/{id}/rate")]
/// Score a stored package.
pub async fn rate_package(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    match rate_stored(&state, &path.into_inner()).await {
        Ok(metric) => HttpResponse::Ok().json(metric),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    get,
    path = "/package/byName/{name}",
    params(
        ("name" = String, Path, description = "Package name")
    ),
    responses(
        (status = 200, description = "Audit history", body = [ActionEntry]),
        (status = 404, description = "No history for this name", body = ErrorResponse)
    ),
    tag = "package"
)]
#[get("/package/byName/{name}")]
/// Audit history of every version of a package.
pub async fn package_history(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    match state.store.history_by_name(&path.into_inner()) {
        Ok(entries) => HttpResponse::Ok().json(entries),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    delete,
    path = "/package/byName/{name}",
    params(
        ("name" = String, Path, description = "Package name")
    ),
    responses(
        (status = 200, description = "All versions deleted"),
        (status = 404, description = "Package not found", body = ErrorResponse)
    ),
    tag = "package"
)]
#[delete("/package/byName/{name}")]
/// Delete every version of a package.
pub async fn delete_package_by_name(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let name = path.into_inner();
    match state.store.delete_by_name(&name) {
        Ok(removed) => {
            info!("deleted {removed} versions of {name}");
            HttpResponse::Ok().finish()
        }
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/package/byRegEx",
    request_body = RegexRequest,
    responses(
        (status = 200, description = "Matching packages", body = [PackageQuery]),
        (status = 400, description = "Invalid pattern", body = ErrorResponse),
        (status = 404, description = "No package matched", body = ErrorResponse)
    ),
    tag = "package"
)]
#[post("/package/byRegEx")]
/// Search package names and READMEs by regular expression.
pub async fn search_packages(
    state: web::Data<AppState>,
    payload: web::Json<RegexRequest>,
) -> impl Responder {
    let entries = state.store.snapshot();
    match search_by_regex(&entries, &payload.regex) {
        Ok(matches) => HttpResponse::Ok().json(matches),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/packages",
    params(
        ("offset" = Option<String>, Query, description = "1-based page number")
    ),
    request_body = [PackageQuery],
    responses(
        (status = 200, description = "Page of matching packages; the offset header names the next page", body = [Metadata]),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    ),
    tag = "package"
)]
#[post("/packages")]
/// List packages matching name and version-specifier queries.
pub async fn list_packages(
    state: web::Data<AppState>,
    params: web::Query<OffsetParams>,
    payload: web::Json<Vec<PackageQuery>>,
) -> impl Responder {
    match state
        .resolver
        .resolve(&state.store, &payload, params.page())
    {
        Ok(page) => HttpResponse::Ok()
            .insert_header((OFFSET_HEADER, page.next_offset.to_string()))
            .json(page.packages),
        Err(err) => error_response(err),
    }
}

async fn popularity_of(state: &AppState, name: &str) -> Result<PopularityResponse> {
    let metadata = state.store.package_named(name)?;
    let stars = if metadata.repository.is_empty() {
        0
    } else {
        match state.rater.locate(&metadata.repository).await {
            Ok(repo) => match state.rater.collector().host().stargazers(&repo).await {
                Ok(stars) => stars,
                Err(PkgRateError::NotFound(message)) => {
                    warn!("no star count for {name}: {message}");
                    0
                }
                Err(err) => return Err(err),
            },
            Err(PkgRateError::MalformedInput(message)) => {
                warn!("no star count for {name}: {message}");
                0
            }
            Err(err) => return Err(err),
        }
    };
    let popularity = PopularityScorer::new(&state.store, &state.store)
        .with_weights(state.popularity)
        .score(name, stars);
    Ok(PopularityResponse {
        name: name.to_string(),
        popularity,
    })
}

#[utoipa::path(
    get,
    path = "/popularity/{name}",
    params(
        ("name" = String, Path, description = "Package name")
    ),
    responses(
        (status = 200, description = "Popularity score", body = PopularityResponse),
        (status = 404, description = "Package not found", body = ErrorResponse),
        (status = 502, description = "Upstream unavailable", body = ErrorResponse)
    ),
    tag = "popularity"
)]
#[get("/popularity/{name}")]
/// Popularity blended from stars, reviews and downloads.
pub async fn package_popularity(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    match popularity_of(&state, &path.into_inner()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    post,
    path = "/review",
    request_body = ReviewRequest,
    responses(
        (status = 201, description = "Review stored", body = Review),
        (status = 400, description = "Invalid review", body = ErrorResponse),
        (status = 404, description = "Package not found", body = ErrorResponse),
        (status = 409, description = "User already reviewed this package", body = ErrorResponse)
    ),
    tag = "review"
)]
#[post("/review")]
/// Review a package.
pub async fn create_review(
    state: web::Data<AppState>,
    payload: web::Json<ReviewRequest>,
) -> impl Responder {
    let stored = payload.into_inner().into_review().and_then(|review| {
        state.store.add_review(review.clone())?;
        Ok(review)
    });
    match stored {
        Ok(review) => HttpResponse::Created().json(review),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    delete,
    path = "/review",
    request_body = ReviewKey,
    responses(
        (status = 200, description = "Review removed", body = Review),
        (status = 404, description = "Review not found", body = ErrorResponse)
    ),
    tag = "review"
)]
#[delete("/review")]
/// Withdraw a review.
pub async fn delete_review(
    state: web::Data<AppState>,
    payload: web::Json<ReviewKey>,
) -> impl Responder {
    match state
        .store
        .remove_review(&payload.user_name, &payload.package_name)
    {
        Ok(review) => HttpResponse::Ok().json(review),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    delete,
    path = "/reset",
    responses(
        (status = 200, description = "Registry cleared"),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "system"
)]
#[delete("/reset")]
/// Clear packages, history and reviews.
pub async fn reset_registry(state: web::Data<AppState>) -> impl Responder {
    match state.store.reset() {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => error_response(err),
    }
}

#[utoipa::path(
    get,
    path = "/openapi.json",
    responses(
        (status = 200, description = "OpenAPI specification")
    ),
    tag = "system"
)]
#[get("/openapi.json")]
/// Serve the OpenAPI specification.
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Register every registry route on `config`.
pub fn configure(config: &mut web::ServiceConfig) {
    config
        .service(create_package)
        .service(search_packages)
        .service(package_history)
        .service(delete_package_by_name)
        .service(rate_package)
        .service(download_package)
        .service(update_package)
        .service(delete_package)
        .service(list_packages)
        .service(package_popularity)
        .service(create_review)
        .service(delete_review)
        .service(reset_registry)
        .service(openapi_json);
}
