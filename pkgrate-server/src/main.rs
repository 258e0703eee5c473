#![deny(missing_docs)]
//! pkgrate server executable.
//!
//! Hosts the package registry API: ingestion gated by quality scores,
//! version-specifier search, popularity and reviews.

mod models;
mod openapi;
mod routes;
mod store;

#[cfg(not(test))]
use actix_cors::Cors;
#[cfg(not(test))]
use actix_web::{App, HttpServer, http::header, web};
#[cfg(not(test))]
use dotenvy::dotenv;

#[allow(unused_imports)]
use std::str::FromStr;

#[cfg(not(test))]
use std::{io, path::Path, sync::Arc};

#[cfg(not(test))]
use pkgrate_core::{
    DEFAULT_PAGE_SIZE, FormulaConfig, GitHubClient, HostConfig, PopularityWeights, QueryResolver,
    Rater, RepositoryHost,
};

#[cfg(not(test))]
use crate::routes::{AppState, configure};
#[cfg(not(test))]
use crate::store::RegistryStore;

#[cfg(not(test))]
fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::other(err.to_string())
}

#[cfg(not(test))]
fn load_formula() -> io::Result<FormulaConfig> {
    match std::env::var("PKGRATE_FORMULA_PATH") {
        Ok(path) if !path.trim().is_empty() => {
            log::info!("loading scoring formula from {path}");
            FormulaConfig::from_path(Path::new(path.trim())).map_err(startup_error)
        }
        _ => Ok(FormulaConfig::current()),
    }
}

#[cfg(not(test))]
fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let host_config = HostConfig::from_env();
    let deadline = host_config.scoring_deadline;
    let host: Arc<dyn RepositoryHost> =
        Arc::new(GitHubClient::new(host_config).map_err(startup_error)?);
    let rater = Rater::new(host, load_formula()?, deadline).map_err(startup_error)?;

    let page_size = match std::env::var("PKGRATE_PAGE_SIZE") {
        Ok(raw) => usize::from_str(raw.trim())
            .ok()
            .filter(|size| *size > 0)
            .ok_or_else(|| startup_error("PKGRATE_PAGE_SIZE must be a positive number"))?,
        Err(_) => DEFAULT_PAGE_SIZE,
    };

    let state = web::Data::new(AppState {
        store: RegistryStore::new(),
        rater,
        resolver: QueryResolver::new(page_size),
        popularity: PopularityWeights::default(),
    });

    let origins = std::env::var("PKGRATE_UI_ORIGINS")
        .unwrap_or_else(|_| "http://127.0.0.1:4200,http://localhost:4200".to_string());
    let allowed_origins: Vec<String> = origins
        .split(',')
        .map(|value| value.trim())
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect();

    let listen_addr = std::env::var("PKGRATE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listen_port =
        u16::from_str(&std::env::var("PKGRATE_PORT").unwrap_or_else(|_| "8080".to_string()))
            .map_err(|_| startup_error("PKGRATE_PORT must be a u16 number"))?;
    log::info!("listening on {listen_addr}:{listen_port}");

    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
                .expose_headers(vec![routes::OFFSET_HEADER])
                .max_age(3600);
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            App::new()
                .wrap(actix_web::middleware::Logger::default())
                .wrap(cors)
                .app_data(state.clone())
                .configure(configure)
        })
        .bind((listen_addr, listen_port))?
        .run()
        .await
    })
}

#[cfg(test)]
fn main() {}
