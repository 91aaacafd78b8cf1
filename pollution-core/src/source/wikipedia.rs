use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use super::{LookupService, PageExtract, truncate_body};

/// MediaWiki API client used as the city description source.
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    api_url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    query: Option<ExtractQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, ExtractPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractPage {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    missing: Option<serde_json::Value>,
}

impl WikipediaClient {
    pub fn new(api_url: impl Into<String>, user_agent: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .build()
            .context("Failed to build lookup HTTP client")?;

        Ok(Self {
            api_url: api_url.into(),
            http,
        })
    }

    async fn query<T>(&self, params: &[(&str, &str)]) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let res = self
            .http
            .get(&self.api_url)
            .query(&[("action", "query"), ("format", "json")])
            .query(params)
            .send()
            .await
            .context("Failed to send request to lookup service")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read lookup service response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Lookup service request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body).context("Failed to parse lookup service JSON")
    }
}

/// Picks the first present page with a non-empty extract. Pages are keyed by
/// id and a missing page is reported under a negative id.
fn first_extract(response: ExtractResponse) -> Option<PageExtract> {
    response
        .query?
        .pages
        .into_values()
        .filter(|page| page.missing.is_none())
        .find_map(|page| {
            let extract = page.extract?.trim().to_string();
            (!extract.is_empty()).then_some(PageExtract {
                title: page.title,
                extract,
            })
        })
}

#[async_trait]
impl LookupService for WikipediaClient {
    async fn search_title(&self, query: &str) -> Result<Option<String>> {
        let parsed: SearchResponse = self
            .query(&[("list", "search"), ("srsearch", query), ("srlimit", "1")])
            .await?;

        Ok(parsed
            .query
            .and_then(|q| q.search.into_iter().next())
            .map(|hit| hit.title))
    }

    async fn fetch_extract(&self, title: &str) -> Result<Option<PageExtract>> {
        let parsed: ExtractResponse = self
            .query(&[
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
            ])
            .await?;

        Ok(first_extract(parsed))
    }
}
