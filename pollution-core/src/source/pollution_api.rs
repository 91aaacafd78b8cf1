use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use crate::{
    error::{AuthError, UpstreamError},
    model::Country,
};

use super::{CountryPage, Credentials, LoginResponse, PollutionSource, truncate_body};

/// HTTP client for the pollution readings API.
#[derive(Debug, Clone)]
pub struct PollutionApiClient {
    base_url: String,
    http: Client,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

impl PollutionApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl PollutionSource for PollutionApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, AuthError> {
        let res = self
            .http
            .post(self.url("auth/login"))
            .json(&LoginRequest {
                username: &credentials.username,
                password: &credentials.password,
            })
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| AuthError::Transport(format!("failed to read login body: {e}")))?;

        parse_login(status, &body)
    }

    async fn fetch_country_page(
        &self,
        token: &str,
        country: Country,
        page: u32,
        limit: u32,
    ) -> Result<CountryPage, UpstreamError> {
        debug!(%country, page, limit, "Fetching pollution page");

        let page_param = page.to_string();
        let limit_param = limit.to_string();

        let res = self
            .http
            .get(self.url("pollution"))
            .bearer_auth(token)
            .query(&[
                ("country", country.code()),
                ("page", page_param.as_str()),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| UpstreamError::NetworkFailure(format!("{country}: {e}")))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| {
            UpstreamError::NetworkFailure(format!("{country}: failed to read response body: {e}"))
        })?;

        parse_country_page(country, status, &body)
    }
}

/// Maps a login response to a parsed body or an [`AuthError`].
fn parse_login(status: StatusCode, body: &str) -> Result<LoginResponse, AuthError> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(AuthError::InvalidCredentials);
    }

    if !status.is_success() {
        return Err(AuthError::Transport(format!(
            "login returned status {}: {}",
            status,
            truncate_body(body)
        )));
    }

    serde_json::from_str(body)
        .map_err(|e| AuthError::MalformedResponse(format!("invalid login JSON: {e}")))
}

/// Maps a pollution page response to a parsed body or an [`UpstreamError`].
fn parse_country_page(
    country: Country,
    status: StatusCode,
    body: &str,
) -> Result<CountryPage, UpstreamError> {
    match status {
        s if s.is_success() => serde_json::from_str(body).map_err(|e| {
            UpstreamError::NetworkFailure(format!("{country}: invalid pollution JSON: {e}"))
        }),
        StatusCode::UNAUTHORIZED => Err(UpstreamError::Unauthorized(format!(
            "{country}: token was rejected, check the configured credentials"
        ))),
        StatusCode::BAD_REQUEST => Err(UpstreamError::BadRequest(format!(
            "{country}: {}",
            truncate_body(body)
        ))),
        s => Err(UpstreamError::NetworkFailure(format!(
            "{country}: status {s}: {}",
            truncate_body(body)
        ))),
    }
}
