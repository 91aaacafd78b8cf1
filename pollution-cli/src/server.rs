//! HTTP surface: `GET /cities` and `GET /health`.

use actix_web::{
    App, HttpResponse, HttpServer, ResponseError, http::StatusCode, middleware, web,
};
use anyhow::Context;
use pollution_core::{
    Caches, CitiesQuery, CitiesService, Config, Error, ValidationError,
};
use serde::Deserialize;
use serde_json::json;
use std::{fmt, time::Duration};
use tracing::{error, info};

pub struct AppState {
    pub service: CitiesService,
    pub default_limit: u32,
}

/// Query parameters are taken as strings so malformed numbers become a 400
/// with a readable message instead of an extractor error.
#[derive(Debug, Deserialize)]
pub struct CitiesParams {
    country: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug)]
pub struct ApiError(Error);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Error::Validation(e) => write!(f, "{e}"),
            Error::Upstream(_) => f.write_str("Failed to fetch pollution data"),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError(err.into())
    }
}

pub fn parse_positive(
    raw: Option<&str>,
    default: u32,
    name: &str,
) -> Result<u32, ValidationError> {
    let Some(raw) = raw.map(str::trim) else {
        return Ok(default);
    };

    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ValidationError::BadPagination(format!(
            "{name} must be a positive integer, got '{raw}'"
        ))),
    }
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

pub async fn cities(
    state: web::Data<AppState>,
    params: web::Query<CitiesParams>,
) -> Result<HttpResponse, ApiError> {
    let params = params.into_inner();
    let page = parse_positive(params.page.as_deref(), 1, "page")?;
    let limit = parse_positive(params.limit.as_deref(), state.default_limit, "limit")?;
    let query = CitiesQuery::new(params.country, page, limit)?;

    match state.service.cities(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(response)),
        Err(err) => {
            error!(error = %err, "Cities request failed");
            Err(err.into())
        }
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/cities", web::get().to(cities));
}

/// Drops every cached token, pollution page and description once per `period`.
pub fn spawn_cache_clearer(caches: Caches, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            caches.clear_all();
            info!("Cleared all caches");
        }
    });
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    config.ensure_credentials()?;

    let service = CitiesService::from_config(&config)?;
    if let Some(period) = config.cache.clear_interval() {
        spawn_cache_clearer(service.caches().clone(), period);
    }

    let state = web::Data::new(AppState {
        service,
        default_limit: config.upstream.default_limit.max(1),
    });

    let bind_addr = config.server.bind_addr.clone();
    let port = config.server.port;
    info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(routes)
    })
    .bind((bind_addr.as_str(), port))
    .with_context(|| format!("Failed to bind {bind_addr}:{port}"))?
    .run()
    .await
    .context("HTTP server terminated with an error")
}
