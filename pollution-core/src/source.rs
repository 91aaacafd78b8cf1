//! Abstractions over the two external services the pipeline talks to.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;

use crate::{
    error::{AuthError, UpstreamError},
    model::{Country, RawCityRecord},
};

pub mod pollution_api;
pub mod wikipedia;

pub use pollution_api::PollutionApiClient;
pub use wikipedia::WikipediaClient;

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body of a login response. Both fields are optional so the authenticator
/// can report a malformed response instead of a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(rename = "expiresIn", default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    #[serde(rename = "totalPages", default)]
    pub total_pages: Option<u64>,
}

/// One upstream page of readings for a single country.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CountryPage {
    #[serde(default)]
    pub meta: PageMeta,
    #[serde(default)]
    pub results: Vec<RawCityRecord>,
}

/// The pollution readings API.
#[async_trait]
pub trait PollutionSource: Send + Sync + Debug {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, AuthError>;

    async fn fetch_country_page(
        &self,
        token: &str,
        country: Country,
        page: u32,
        limit: u32,
    ) -> Result<CountryPage, UpstreamError>;
}

/// Introductory text of an encyclopedia article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExtract {
    pub title: String,
    pub extract: String,
}

/// The text lookup service used to describe cities.
#[async_trait]
pub trait LookupService: Send + Sync + Debug {
    /// Best-matching article title for a free-text query.
    async fn search_title(&self, query: &str) -> anyhow::Result<Option<String>>;

    /// Introductory extract for an exact title; `None` when the page is missing.
    async fn fetch_extract(&self, title: &str) -> anyhow::Result<Option<PageExtract>>;
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
